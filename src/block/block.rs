//! A framed block: header plus an in-memory cursor over its payload.

use std::io::{Cursor, Seek, SeekFrom};

use binrw::{BinRead, BinReaderExt};

use crate::{
    block_types::{
        ByteOrder, DataBlock, FrameSetHeader, GeneralInfo, IdsAndNames, Molecules,
        ParticleMapping, TableOfContents,
    },
    consts::HASH_LEN,
    errors::TngError,
    reader::TngReader,
};

use super::BlockHeader;

/// TNG block.
pub struct Block {
    /// Header.
    pub header: BlockHeader,
    /// Raw payload, excluding the header.
    pub cursor: Cursor<Vec<u8>>,
    /// String length bound inherited from the file's leading block.
    pub(crate) max_str_len: u64,
}

impl Block {
    /// Reads the payload for `header` from `reader` and wraps it.
    /// Assumes the reader is positioned at the payload.
    pub(crate) fn new(
        header: BlockHeader,
        reader: &mut TngReader,
    ) -> Result<Self, TngError> {
        let cursor = reader.payload(&header)?;
        Ok(Self {
            header,
            cursor,
            max_str_len: reader.max_str_len,
        })
    }

    /// Recomputes the payload MD5 and compares against the stored
    /// hash. An all-zero stored hash skips verification.
    pub fn verify(&self) -> Result<(), TngError> {
        if !self.header.has_hash() {
            return Ok(());
        }
        let digest = md5::compute(self.cursor.get_ref());
        if digest.0 != self.header.hash {
            return Err(TngError::HashMismatch {
                id: self.header.id,
                offset: self.header.offset,
            });
        }
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.header.payload_size
    }

    pub fn pos(&self) -> u64 {
        self.cursor.position()
    }

    /// Set payload cursor position to start of payload.
    pub fn reset(&mut self) {
        self.cursor.set_position(0)
    }

    /// Seek from current payload position.
    pub fn seek(&mut self, offset_from_current: i64) -> Result<u64, TngError> {
        Ok(self.cursor.seek(SeekFrom::Current(offset_from_current))?)
    }

    /// Read a single little-endian value.
    pub fn read<T>(&mut self) -> Result<T, TngError>
    where
        T: BinRead,
        <T as BinRead>::Args<'static>: Sized + Clone + Default,
    {
        Ok(self.cursor.read_le::<T>()?)
    }

    /// Ensures the caller-requested id matches that of this block.
    fn match_id(&self, id: u64) -> Result<(), TngError> {
        if self.header.id != id {
            return Err(TngError::BlockMismatch {
                got: self.header.id,
                expected: id,
            });
        }
        Ok(())
    }

    /// A schema decoder must consume the payload exactly; trailing
    /// bytes mean the declared payload size and the decoded fields
    /// disagree.
    fn consumed(&self) -> Result<(), TngError> {
        let len = self.cursor.get_ref().len() as u64;
        let pos = self.cursor.position();
        if pos != len {
            return Err(TngError::SchemaMismatch(format!(
                "block {} payload has {} undecoded trailing bytes",
                self.header.id,
                len - pos
            )));
        }
        Ok(())
    }

    /// Parse into `ByteOrder` if the block id is 0.
    pub fn byte_order(&mut self) -> Result<ByteOrder, TngError> {
        self.match_id(0)?;
        let decoded = ByteOrder::decode(&mut self.cursor)?;
        self.consumed()?;
        Ok(decoded)
    }

    /// Parse into `GeneralInfo` if the block id is 1.
    pub fn general_info(&mut self) -> Result<GeneralInfo, TngError> {
        self.match_id(1)?;
        let decoded = GeneralInfo::decode(&mut self.cursor, self.max_str_len)?;
        self.consumed()?;
        Ok(decoded)
    }

    /// Parse into `Molecules` if the block id is 2.
    pub fn molecules(&mut self) -> Result<Molecules, TngError> {
        self.match_id(2)?;
        let decoded = Molecules::decode(&mut self.cursor, self.max_str_len)?;
        self.consumed()?;
        Ok(decoded)
    }

    /// Parse into `IdsAndNames` if the block id is 3.
    pub fn ids_and_names(&mut self) -> Result<IdsAndNames, TngError> {
        self.match_id(3)?;
        let decoded = IdsAndNames::decode(&mut self.cursor, self.max_str_len)?;
        self.consumed()?;
        Ok(decoded)
    }

    /// Parse into `FrameSetHeader` if the block id is 4.
    pub fn frame_set(&mut self) -> Result<FrameSetHeader, TngError> {
        self.match_id(4)?;
        let decoded = FrameSetHeader::decode(&mut self.cursor)?;
        self.consumed()?;
        Ok(decoded)
    }

    /// Parse into `TableOfContents` if the block id is 5.
    pub fn table_of_contents(&mut self) -> Result<TableOfContents, TngError> {
        self.match_id(5)?;
        let decoded = TableOfContents::decode(&mut self.cursor, self.max_str_len)?;
        self.consumed()?;
        Ok(decoded)
    }

    /// Parse into `ParticleMapping` if the block id is 6.
    pub fn particle_mapping(&mut self) -> Result<ParticleMapping, TngError> {
        self.match_id(6)?;
        let decoded = ParticleMapping::read(&mut self.cursor)?;
        self.consumed()?;
        Ok(decoded)
    }

    /// Parse a trajectory data block (id ≥ 10000). The codec payload
    /// is kept as raw bytes; decompression happens on demand.
    pub fn data(&mut self) -> Result<DataBlock, TngError> {
        if !self.header.is_trajectory() {
            return Err(TngError::BlockMismatch {
                got: self.header.id,
                expected: 10000,
            });
        }
        DataBlock::decode(&self.header, &mut self.cursor)
    }
}

/// Serializes a complete block (header + payload) into one buffer
/// for a single atomic emit, computing the payload MD5 unless
/// `with_hash` is unset.
pub(crate) fn serialize(
    header: &BlockHeader,
    payload: &[u8],
    with_hash: bool,
) -> Vec<u8> {
    let hash: [u8; HASH_LEN] = match with_hash {
        true => md5::compute(payload).0,
        false => [0; HASH_LEN],
    };

    let header_size = crate::consts::HEADER_FIXED_LEN + header.name.len() as u64;
    let mut buf = Vec::with_capacity(header_size as usize + payload.len());
    buf.extend_from_slice(&header_size.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(&header.id.to_le_bytes());
    buf.extend_from_slice(&hash);
    buf.extend_from_slice(&(header.name.len() as u64).to_le_bytes());
    buf.extend_from_slice(header.name.as_bytes());
    buf.extend_from_slice(&header.version.to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}
