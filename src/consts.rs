//! Format-level constants: well-known block ids and names,
//! byte-order probe patterns, and structural limits.

/// Format version written into every block header.
pub const TNG_VERSION: u64 = 1;

/// Length in bytes of the MD5 hash stored in each block header.
pub const HASH_LEN: usize = 16;

/// Sentinel for "no such offset" in frame-set links and
/// the general-info frame-set offsets.
pub const OFFSET_NONE: i64 = -1;

/// Fixed part of a block header on the wire:
/// `header_size`, `block_contents_size` and `block_id` (3 × u64),
/// the 16 byte hash, the name length word and the version word.
pub const HEADER_FIXED_LEN: u64 = 8 + 8 + 8 + 16 + 8 + 8;

/// 32-bit byte-order probe pattern stored in the leading block.
/// Reads back as `[0x01, 0x02, 0x03, 0x04]` from a little-endian file.
pub const MAGIC_32: u32 = 0x0403_0201;

/// 64-bit byte-order probe pattern stored in the leading block.
pub const MAGIC_64: u64 = 0x0807_0605_0403_0201;

/// Default upper bound for on-wire string lengths. A file may
/// declare a different bound in its leading block.
pub const MAX_STR_LEN: u64 = 1024;

/// Maximum number of entries in the non-trajectory block table.
pub const MAX_NON_TRAJECTORY_BLOCKS: usize = 32;

/// First block id belonging to the trajectory family.
/// Ids below this are non-trajectory blocks held in the bounded table.
pub const FIRST_TRAJECTORY_ID: u64 = 10_000;

/// Shortest repetition the run-length stage encodes as a run.
pub const MIN_RLE: usize = 4;

/// Canonical names for the well-known blocks, as stored in block
/// headers and the trajectory-ids-and-names table.
pub mod block_names {
    pub const BYTE_ORDER: &str = "ENDIANNESS AND STRING LENGTH";
    pub const GENERAL_INFO: &str = "GENERAL INFO";
    pub const MOLECULES: &str = "MOLECULES";
    pub const ID_NAMES: &str = "TRAJECTORY IDS AND NAMES";
    pub const FRAME_SET: &str = "TRAJECTORY FRAME SET";
    pub const TOC: &str = "BLOCK TABLE OF CONTENTS";
    pub const PARTICLE_MAPPING: &str = "PARTICLE MAPPING";
    pub const BOX_SHAPE: &str = "BOX SHAPE";
    pub const POSITIONS: &str = "POSITIONS";
    pub const VELOCITIES: &str = "VELOCITIES";
    pub const FORCES: &str = "FORCES";
}
