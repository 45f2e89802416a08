//! Endianness & string length block (id 0). Must be the very first
//! block of a file. Two probe patterns establish the byte order of
//! 32 and 64 bit words; a third word bounds every string length that
//! follows in the file.
//!
//! The canonical on-disk order is little-endian. Classification of
//! the probe bytes exists to reject foreign byte orders with a
//! precise error rather than to decode them.

use std::io::{Cursor, Read};

use crate::{
    consts::{MAGIC_32, MAGIC_64},
    TngError,
};

/// Observed byte order of 32-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness32 {
    Little,
    /// Full byte swap.
    Big,
    /// The two byte pairs swapped within the word.
    BytePairSwap,
}

/// Observed byte order of 64-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness64 {
    Little,
    /// Full byte swap.
    Big,
    /// The two 32-bit halves swapped.
    QuadSwap,
    /// 16-bit pairs swapped within each half.
    BytePairSwap,
    /// Adjacent bytes swapped.
    ByteSwap,
}

/// Decoded endianness & string length block.
#[derive(Debug, Clone, Copy)]
pub struct ByteOrder {
    pub(crate) endianness_32: Endianness32,
    pub(crate) endianness_64: Endianness64,
    /// Upper bound for on-wire string lengths in this file.
    pub(crate) max_str_len: u64,
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self {
            endianness_32: Endianness32::Little,
            endianness_64: Endianness64::Little,
            max_str_len: crate::consts::MAX_STR_LEN,
        }
    }
}

impl ByteOrder {
    pub fn endianness_32(&self) -> Endianness32 {
        self.endianness_32
    }

    pub fn endianness_64(&self) -> Endianness64 {
        self.endianness_64
    }

    pub fn max_str_len(&self) -> u64 {
        self.max_str_len
    }

    /// Errors unless both probe patterns read back little-endian.
    pub fn require_little(&self) -> Result<(), TngError> {
        match (self.endianness_32, self.endianness_64) {
            (Endianness32::Little, Endianness64::Little) => Ok(()),
            (Endianness32::Big, _) | (_, Endianness64::Big) => {
                Err(TngError::UnsupportedByteOrder("big-endian"))
            }
            (Endianness32::BytePairSwap, _) | (_, Endianness64::BytePairSwap) => {
                Err(TngError::UnsupportedByteOrder("byte-pair swapped"))
            }
            (_, Endianness64::QuadSwap) => Err(TngError::UnsupportedByteOrder("quad swapped")),
            (_, Endianness64::ByteSwap) => Err(TngError::UnsupportedByteOrder("byte swapped")),
        }
    }

    pub(crate) fn decode(crs: &mut Cursor<Vec<u8>>) -> Result<Self, TngError> {
        let mut probe_32 = [0_u8; 4];
        crs.read_exact(&mut probe_32)?;
        let mut probe_64 = [0_u8; 8];
        crs.read_exact(&mut probe_64)?;

        let endianness_32 = classify_32(&probe_32)?;
        let endianness_64 = classify_64(&probe_64)?;

        let mut len = [0_u8; 8];
        crs.read_exact(&mut len)?;
        // the length bound shares the byte order of other 64-bit words
        let max_str_len = match endianness_64 {
            Endianness64::Big => u64::from_be_bytes(len),
            _ => u64::from_le_bytes(len),
        };
        if max_str_len == 0 {
            return Err(TngError::SchemaMismatch(
                "declared maximum string length is 0".into(),
            ));
        }

        Ok(Self {
            endianness_32,
            endianness_64,
            max_str_len,
        })
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(20);
        buf.extend_from_slice(&MAGIC_32.to_le_bytes());
        buf.extend_from_slice(&MAGIC_64.to_le_bytes());
        buf.extend_from_slice(&self.max_str_len.to_le_bytes());
        buf
    }
}

/// Classifies how the 32-bit probe pattern was permuted on disk.
fn classify_32(probe: &[u8; 4]) -> Result<Endianness32, TngError> {
    match probe {
        [1, 2, 3, 4] => Ok(Endianness32::Little),
        [4, 3, 2, 1] => Ok(Endianness32::Big),
        [2, 1, 4, 3] => Ok(Endianness32::BytePairSwap),
        _ => Err(TngError::SchemaMismatch(format!(
            "unrecognized 32-bit byte order probe {probe:?}"
        ))),
    }
}

/// Classifies how the 64-bit probe pattern was permuted on disk.
fn classify_64(probe: &[u8; 8]) -> Result<Endianness64, TngError> {
    match probe {
        [1, 2, 3, 4, 5, 6, 7, 8] => Ok(Endianness64::Little),
        [8, 7, 6, 5, 4, 3, 2, 1] => Ok(Endianness64::Big),
        [5, 6, 7, 8, 1, 2, 3, 4] => Ok(Endianness64::QuadSwap),
        [3, 4, 1, 2, 7, 8, 5, 6] => Ok(Endianness64::BytePairSwap),
        [2, 1, 4, 3, 6, 5, 8, 7] => Ok(Endianness64::ByteSwap),
        _ => Err(TngError::SchemaMismatch(format!(
            "unrecognized 64-bit byte order probe {probe:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_round_trip() {
        let bo = ByteOrder::default();
        let mut crs = Cursor::new(bo.encode());
        let decoded = ByteOrder::decode(&mut crs).unwrap();
        assert_eq!(decoded.endianness_32(), Endianness32::Little);
        assert_eq!(decoded.endianness_64(), Endianness64::Little);
        assert_eq!(decoded.max_str_len(), crate::consts::MAX_STR_LEN);
        assert!(decoded.require_little().is_ok());
    }

    #[test]
    fn big_endian_detected_and_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC_32.to_be_bytes());
        buf.extend_from_slice(&MAGIC_64.to_be_bytes());
        buf.extend_from_slice(&1024_u64.to_be_bytes());
        let decoded = ByteOrder::decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded.endianness_32(), Endianness32::Big);
        assert_eq!(decoded.endianness_64(), Endianness64::Big);
        assert!(matches!(
            decoded.require_little(),
            Err(TngError::UnsupportedByteOrder("big-endian"))
        ));
    }

    #[test]
    fn quad_swap_detected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[1, 2, 3, 4]);
        buf.extend_from_slice(&[5, 6, 7, 8, 1, 2, 3, 4]);
        buf.extend_from_slice(&1024_u64.to_le_bytes());
        let decoded = ByteOrder::decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded.endianness_64(), Endianness64::QuadSwap);
        assert!(decoded.require_little().is_err());
    }

    #[test]
    fn garbage_probe_is_schema_mismatch() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[9, 9, 9, 9]);
        buf.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        buf.extend_from_slice(&1024_u64.to_le_bytes());
        assert!(matches!(
            ByteOrder::decode(&mut Cursor::new(buf)),
            Err(TngError::SchemaMismatch(_))
        ));
    }
}
