//! Block table of contents (id 5). Lists the names of the data
//! blocks present in a frame set.

use std::io::Cursor;

use binrw::BinReaderExt;

use crate::TngError;

use super::{read_string, write_string};

/// Block table of contents (id 5).
#[derive(Debug, Clone, Default)]
pub struct TableOfContents {
    pub(crate) block_names: Vec<String>,
}

impl TableOfContents {
    pub fn new(block_names: Vec<String>) -> Self {
        Self { block_names }
    }

    pub fn len(&self) -> usize {
        self.block_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.block_names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.block_names.iter().any(|n| n == name)
    }

    pub fn block_names(&self) -> &[String] {
        &self.block_names
    }

    pub(crate) fn decode(crs: &mut Cursor<Vec<u8>>, max_str_len: u64) -> Result<Self, TngError> {
        let n_blocks = crs.read_le::<i64>()?;
        if n_blocks < 0 {
            return Err(TngError::SchemaMismatch(format!(
                "negative table of contents length {n_blocks}"
            )));
        }
        let mut block_names = Vec::with_capacity(n_blocks as usize);
        for _ in 0..n_blocks {
            block_names.push(read_string(crs, max_str_len)?);
        }
        Ok(Self { block_names })
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.block_names.len() as i64).to_le_bytes());
        for name in &self.block_names {
            write_string(&mut buf, name);
        }
        buf
    }
}
