//! Typed schemas for the known block ids. Decoders consume a payload
//! cursor and return typed records; encoders serialize typed records
//! back into payload bytes. Schemas carry no logic beyond field
//! layout and count cross-checks.

pub mod byte_order;
pub mod data;
pub mod frame_set;
pub mod general_info;
pub mod id_names;
pub mod mapping;
pub mod molecules;
pub mod toc;

pub use byte_order::{ByteOrder, Endianness32, Endianness64};
pub use data::{DataBlock, DataBlockHeader, DataType, DataValues};
pub use frame_set::FrameSetHeader;
pub use general_info::GeneralInfo;
pub use id_names::IdsAndNames;
pub use mapping::ParticleMapping;
pub use molecules::{Atom, Bond, Chain, Molecule, Molecules, Residue};
pub use toc::TableOfContents;

use std::io::{Cursor, Read};

use binrw::BinReaderExt;

use crate::TngError;

/// Reads a length-prefixed UTF-8 string from a payload cursor.
pub(crate) fn read_string(crs: &mut Cursor<Vec<u8>>, max_len: u64) -> Result<String, TngError> {
    let n = crs.read_le::<u64>()?;
    if n > max_len {
        return Err(TngError::SchemaMismatch(format!(
            "string length {n} exceeds declared maximum {max_len}"
        )));
    }
    let remaining = crs.get_ref().len() as u64 - crs.position();
    if remaining < n {
        return Err(TngError::ShortRead {
            got: remaining,
            expected: n,
        });
    }
    let mut buf = vec![0_u8; n as usize];
    crs.read_exact(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Appends a length-prefixed UTF-8 string to a payload buffer.
pub(crate) fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u64).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}
