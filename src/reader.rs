use std::{
    fs::File,
    io::{BufReader, Cursor, Read, Seek, SeekFrom},
};

use binrw::{BinRead, BinReaderExt};

use crate::{
    block::BlockHeader,
    consts::{HASH_LEN, HEADER_FIXED_LEN, MAX_STR_LEN},
    TngError,
};

/// `BufReader` over a TNG file, with block-aware positioning.
///
/// All multi-byte reads convert from the file's canonical
/// little-endian representation; the leading byte-order block is
/// validated before anything else is interpreted (see
/// [`crate::block_types::ByteOrder`]).
#[derive(Debug)]
pub(crate) struct TngReader {
    /// File size.
    pub(crate) len: u64,
    /// Reader over the full TNG file.
    pub(crate) inner: BufReader<File>,
    /// Upper bound for on-wire string lengths,
    /// declared by the leading block.
    pub(crate) max_str_len: u64,
}

impl TngReader {
    /// Creates a `BufReader` with default capacity (8KiB)
    /// over the full TNG file.
    ///
    /// Use `TngReader::with_capacity()` for custom buffer sizes
    /// (frame sets of large trajectories routinely exceed the
    /// default 8KiB).
    pub(crate) fn new(file: File) -> Result<Self, TngError> {
        Self::with_capacity(file, None)
    }

    pub(crate) fn with_capacity(file: File, capacity: Option<usize>) -> Result<Self, TngError> {
        let len = file.metadata()?.len();
        let inner = match capacity {
            Some(cap) => BufReader::with_capacity(cap, file),
            None => BufReader::new(file),
        };
        Ok(Self {
            len,
            inner,
            max_str_len: MAX_STR_LEN,
        })
    }

    /// Returns current position/byte offset in the file.
    pub(crate) fn pos(&mut self) -> Result<u64, TngError> {
        Ok(self.inner.stream_position()?)
    }

    /// Seeks to `pos`.
    pub(crate) fn seek(&mut self, pos: SeekFrom) -> Result<u64, TngError> {
        Ok(self.inner.seek(pos)?)
    }

    /// Seek to start of file.
    pub(crate) fn reset(&mut self) -> Result<u64, TngError> {
        self.seek(SeekFrom::Start(0))
    }

    pub(crate) fn eof(&mut self) -> Result<bool, TngError> {
        Ok(self.pos()? >= self.len)
    }

    /// Read a single little-endian type `T` at current position.
    pub(crate) fn read_one<T>(&mut self) -> Result<T, TngError>
    where
        T: BinRead,
        <T as BinRead>::Args<'static>: Sized + Clone + Default,
    {
        Ok(self.inner.read_le::<T>()?)
    }

    /// Read exactly `n` raw bytes.
    pub(crate) fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, TngError> {
        let remaining = self.len.saturating_sub(self.pos()?);
        if remaining < n as u64 {
            return Err(TngError::ShortRead {
                got: remaining,
                expected: n as u64,
            });
        }
        let mut buf = vec![0_u8; n];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads a length-prefixed UTF-8 string
    /// (`u64` byte count, no NUL terminator).
    pub(crate) fn read_string(&mut self) -> Result<String, TngError> {
        let n = self.read_one::<u64>()?;
        if n > self.max_str_len {
            return Err(TngError::SchemaMismatch(format!(
                "string length {n} exceeds declared maximum {}",
                self.max_str_len
            )));
        }
        let buf = self.read_bytes(n as usize)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Returns the block header at current position.
    ///
    /// Does not verify that current position is at a block boundary.
    /// Leaves the reader positioned at the start of the payload.
    pub(crate) fn header(&mut self, pos: Option<SeekFrom>) -> Result<BlockHeader, TngError> {
        if let Some(p) = pos {
            self.seek(p)?;
        }

        let offset = self.pos()?;
        let header_size = self.read_one::<u64>()?;
        let payload_size = self.read_one::<u64>()?;
        let id = self.read_one::<u64>()?;
        let hash_bytes = self.read_bytes(HASH_LEN)?;
        let mut hash = [0_u8; HASH_LEN];
        hash.copy_from_slice(&hash_bytes);
        let name = self.read_string()?;
        let version = self.read_one::<u64>()?;

        let header = BlockHeader {
            header_size,
            payload_size,
            id,
            hash,
            name,
            version,
            offset,
        };

        // header_size is redundant with the name length;
        // a disagreement means the stream is not at a block boundary.
        let computed = HEADER_FIXED_LEN + header.name.len() as u64;
        if header_size != computed {
            return Err(TngError::BadHeader {
                got: header_size,
                expected: computed,
            });
        }

        Ok(header)
    }

    /// `next` method for iterating over block headers.
    ///
    /// With `seek_next` set the reader is positioned at the start of
    /// the next block header, otherwise at the payload.
    pub(crate) fn next_header(&mut self, seek_next: bool) -> Result<BlockHeader, TngError> {
        let header = self.header(None)?;
        if seek_next {
            self.seek(SeekFrom::Start(header.offset_next_abs()))?;
        }
        Ok(header)
    }

    /// Finds the first block header with specified id, scanning
    /// forward from current position (or from the start of the file
    /// if `reset` is set).
    ///
    /// If found, the reader is left at the block's payload.
    pub(crate) fn find_header(&mut self, id: u64, reset: bool) -> Result<Option<BlockHeader>, TngError> {
        if reset {
            self.reset()?;
        }

        while self.pos()? < self.len {
            let header = self.next_header(false)?;
            if header.id == id {
                return Ok(Some(header));
            }
            self.seek(SeekFrom::Start(header.offset_next_abs()))?;
        }
        Ok(None)
    }

    /// Reads the payload of `header` into an in-memory cursor of
    /// exactly `payload_size` bytes.
    ///
    /// Assumes the reader is positioned at the payload.
    pub(crate) fn payload(&mut self, header: &BlockHeader) -> Result<Cursor<Vec<u8>>, TngError> {
        let remaining = self.len.saturating_sub(self.pos()?);
        if remaining < header.payload_size {
            return Err(TngError::TruncatedPayload {
                id: header.id,
                remaining,
                expected: header.payload_size,
            });
        }
        let mut buf = vec![0_u8; header.payload_size as usize];
        self.inner.read_exact(&mut buf)?;
        Ok(Cursor::new(buf))
    }

    /// Seek past the payload of `header`. Assumes the reader is
    /// positioned at the payload.
    pub(crate) fn skip_payload(&mut self, header: &BlockHeader) -> Result<u64, TngError> {
        self.seek(SeekFrom::Start(header.offset_next_abs()))
    }
}
