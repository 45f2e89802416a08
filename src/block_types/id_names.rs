//! Trajectory ids and names block (id 3). The mapping from numeric
//! block id to human readable name, used when printing TOC entries.

use std::io::Cursor;

use binrw::BinReaderExt;

use crate::TngError;

use super::{read_string, write_string};

/// Trajectory ids and names block (id 3).
#[derive(Debug, Clone, Default)]
pub struct IdsAndNames {
    pub(crate) pairs: Vec<(i64, String)>,
}

impl IdsAndNames {
    pub fn new(pairs: Vec<(i64, String)>) -> Self {
        Self { pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Returns the registered name for `id`, if any.
    pub fn name_of(&self, id: i64) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(pair_id, _)| *pair_id == id)
            .map(|(_, name)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(i64, String)> {
        self.pairs.iter()
    }

    pub(crate) fn decode(crs: &mut Cursor<Vec<u8>>, max_str_len: u64) -> Result<Self, TngError> {
        let n_pairs = crs.read_le::<i64>()?;
        if n_pairs < 0 {
            return Err(TngError::SchemaMismatch(format!(
                "negative id-name pair count {n_pairs}"
            )));
        }
        let mut pairs = Vec::with_capacity(n_pairs as usize);
        for _ in 0..n_pairs {
            let id = crs.read_le::<i64>()?;
            let name = read_string(crs, max_str_len)?;
            pairs.push((id, name));
        }
        Ok(Self { pairs })
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.pairs.len() as i64).to_le_bytes());
        for (id, name) in &self.pairs {
            buf.extend_from_slice(&id.to_le_bytes());
            write_string(&mut buf, name);
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_and_lookup() {
        let table = IdsAndNames::new(vec![
            (10000, "BOX SHAPE".into()),
            (10001, "POSITIONS".into()),
        ]);
        let mut crs = Cursor::new(table.encode());
        let decoded = IdsAndNames::decode(&mut crs, 1024).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.name_of(10001), Some("POSITIONS"));
        assert_eq!(decoded.name_of(42), None);
    }
}
