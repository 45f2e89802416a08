//! Various TNG-related errors.

use std::fmt;

/// Read/parse/write errors for TNG trajectory files.
#[derive(Debug)]
pub enum TngError {
    /// IO error.
    IOError(std::io::Error),
    /// Converted `binrw` error.
    BinReadError(binrw::Error),
    /// Converted `Utf8Error`.
    Utf8Error(std::string::FromUtf8Error),
    /// EOF before a requested width could be read.
    ShortRead{got: u64, expected: u64},
    /// The redundant `header_size` word disagrees with the
    /// rest of the block header.
    BadHeader{got: u64, expected: u64},
    /// Fewer payload bytes remain than the header declares.
    TruncatedPayload{id: u64, remaining: u64, expected: u64},
    /// Recomputed MD5 differs from the stored hash.
    HashMismatch{id: u64, offset: u64},
    /// Block at current position has a different id than requested.
    BlockMismatch{got: u64, expected: u64},
    /// No block with the requested id exists in the file.
    NoSuchBlock(u64),
    /// The requested data kind is not stored in the trajectory.
    NotPresent(&'static str),
    /// Requested frame index beyond either end of the trajectory.
    FrameOutOfRange{frame: i64, n_frames: i64},
    /// The requested frame range spans no stored frame.
    /// Carries the stride of the underlying data block, since the
    /// stride is known even when the range itself is unusable.
    NoDataInRange{start: i64, end: i64, stride_length: i64},
    /// A schema count cross-check failed while decoding or encoding
    /// a typed block.
    SchemaMismatch(String),
    /// Corrupt codec payload: bad sub-codec tag, broken Huffman
    /// table, or a non-positive quantization multiplier.
    CodecMalformed(String),
    /// Run-length expansion would exceed the declared output length.
    RleOverrun{have: usize, max: usize},
    /// The leading block's probe patterns indicate a byte order
    /// this implementation does not decode.
    UnsupportedByteOrder(&'static str),
    /// The non-trajectory block table is limited to 32 entries.
    BlockTableFull,
    /// Two non-trajectory blocks share an id.
    DuplicateBlockId(u64),
    /// Writer-side schema cross-check failed.
    InvariantBroken(String),
    /// Fewer bytes were written than serialized.
    WriteShort{got: u64, expected: u64},
}

/// Three-valued status mirroring the classic TNG API surface.
/// Obtained from an error via [`TngError::status`]; a call that
/// returns `Ok` is `Success` by definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    /// Recoverable: the handle remains usable.
    Failure,
    /// Unrecoverable: the handle should be closed.
    Critical,
}

impl TngError {
    /// Classifies the error as recoverable (`Failure`) or
    /// unrecoverable (`Critical`).
    pub fn status(&self) -> Status {
        match self {
            TngError::NotPresent(_)
            | TngError::FrameOutOfRange{..}
            | TngError::NoDataInRange{..}
            | TngError::NoSuchBlock(_) => Status::Failure,
            _ => Status::Critical,
        }
    }

    /// Convenience check for `Status::Failure` errors.
    pub fn is_recoverable(&self) -> bool {
        self.status() == Status::Failure
    }
}

impl std::error::Error for TngError {}

impl fmt::Display for TngError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TngError::IOError(err) => write!(f, "IO error: {err}"),
            TngError::BinReadError(err) => write!(f, "{err}"),
            TngError::Utf8Error(err) => write!(f, "{err}"),
            TngError::ShortRead{got, expected} => write!(f, "Read {got} bytes, expected {expected} bytes."),
            TngError::BadHeader{got, expected} => write!(f, "Block header size {got} disagrees with computed size {expected}."),
            TngError::TruncatedPayload{id, remaining, expected} => write!(f, "Block {id} declares {expected} payload bytes but only {remaining} remain."),
            TngError::HashMismatch{id, offset} => write!(f, "MD5 mismatch for block {id} @ offset {offset}."),
            TngError::BlockMismatch{got, expected} => write!(f, "Block mismatch. Expected id {expected}, got {got}."),
            TngError::NoSuchBlock(id) => write!(f, "No such block {id}."),
            TngError::NotPresent(kind) => write!(f, "No {kind} data in this trajectory."),
            TngError::FrameOutOfRange{frame, n_frames} => write!(f, "Frame {frame} out of range for trajectory with {n_frames} frames."),
            TngError::NoDataInRange{start, end, stride_length} => write!(f, "No stored frame in range [{start}, {end}] with stride {stride_length}."),
            TngError::SchemaMismatch(msg) => write!(f, "Schema mismatch: {msg}"),
            TngError::CodecMalformed(msg) => write!(f, "Malformed codec payload: {msg}"),
            TngError::RleOverrun{have, max} => write!(f, "RLE expansion to {have} values exceeds declared length {max}."),
            TngError::UnsupportedByteOrder(order) => write!(f, "Unsupported byte order: {order}."),
            TngError::BlockTableFull => write!(f, "Non-trajectory block table holds at most 32 entries."),
            TngError::DuplicateBlockId(id) => write!(f, "Duplicate non-trajectory block id {id}."),
            TngError::InvariantBroken(msg) => write!(f, "Invariant broken at encode time: {msg}"),
            TngError::WriteShort{got, expected} => write!(f, "Wrote {got} bytes, expected to write {expected} bytes."),
        }
    }
}

/// Converts std::io::Error to TngError
impl From<std::io::Error> for TngError {
    fn from(err: std::io::Error) -> Self {
        TngError::IOError(err)
    }
}

/// Converts std::string::FromUtf8Error to TngError
/// (`&str` requires `std::str::Utf8Error`)
impl From<std::string::FromUtf8Error> for TngError {
    fn from(err: std::string::FromUtf8Error) -> TngError {
        TngError::Utf8Error(err)
    }
}

/// Converts binrw::Error to TngError
impl From<binrw::Error> for TngError {
    fn from(err: binrw::Error) -> TngError {
        TngError::BinReadError(err)
    }
}

/// Converts TngError to std::io::Error
impl From<TngError> for std::io::Error {
    fn from(err: TngError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, err)
    }
}
