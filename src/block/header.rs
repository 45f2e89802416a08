use std::ops::Range;

use crate::{
    block_id::BlockId,
    consts::{HASH_LEN, HEADER_FIXED_LEN},
};

/// Block header.
/// `40 + name_len` bytes on the wire, all little-endian:
///
/// ```ignore
/// | header_size:u64 | block_contents_size:u64 | block_id:u64 |
/// | hash[16] | name_len:u64 | name[name_len] | block_version:u64 |
/// ```
///
/// `header_size` counts from the start of the header to the start of
/// the payload and is redundant with `name_len`; the reader
/// cross-checks it on every block.
#[derive(Debug, Clone, Default)]
pub struct BlockHeader {
    /// Size of this header in bytes, up to the start of the payload.
    pub(crate) header_size: u64,
    /// Size of the payload in bytes (`block_contents_size` on the wire).
    pub(crate) payload_size: u64,
    /// Numeric block id. Ids ≥ 10000 belong to the trajectory family.
    pub(crate) id: u64,
    /// MD5 of the payload. All-zero means "no hash".
    pub(crate) hash: [u8; HASH_LEN],
    /// Human readable block name.
    pub(crate) name: String,
    /// Version of the format that wrote the block.
    pub(crate) version: u64,
    /// Absolute byte offset of the start of this header in the file.
    pub(crate) offset: u64,
}

impl BlockHeader {
    /// New header for writing. `payload_size` and `hash` are filled
    /// in by the framer once the payload is serialized.
    pub fn new(id: BlockId, version: u64) -> Self {
        let name = id.name().to_owned();
        Self {
            header_size: HEADER_FIXED_LEN + name.len() as u64,
            payload_size: 0,
            id: id.to_u64(),
            hash: [0; HASH_LEN],
            name,
            version,
            offset: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn block_id(&self) -> BlockId {
        BlockId::from_u64(self.id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn payload_size(&self) -> u64 {
        self.payload_size
    }

    /// `true` if the stored hash is all-zero, i.e. verification
    /// is to be skipped.
    pub fn has_hash(&self) -> bool {
        self.hash.iter().any(|b| *b != 0)
    }

    pub fn is_trajectory(&self) -> bool {
        self.block_id().is_trajectory()
    }

    pub fn start(&self) -> u64 {
        self.offset
    }

    pub fn end(&self) -> u64 {
        self.offset + self.header_size + self.payload_size
    }

    /// Absolute offset of the payload.
    pub fn data_offset(&self) -> u64 {
        self.offset + self.header_size
    }

    /// Absolute offset of the next block header.
    pub fn offset_next_abs(&self) -> u64 {
        self.end()
    }

    /// Returns start, end offset range for the block.
    pub fn bounds(&self) -> Range<u64> {
        self.offset..self.end()
    }

    /// `true` if absolute offset `pos` falls within the block.
    /// Inclusive lower bound, exclusive upper bound.
    pub fn contains(&self, pos: u64) -> bool {
        self.offset <= pos && self.end() > pos
    }
}
