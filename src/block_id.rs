//! TNG block ids. The non-trajectory family (0–6) describes the file
//! itself; the trajectory family (≥ 10000) carries per-frame data and
//! is chained through frame sets.

use std::fmt::Display;

use crate::consts::{block_names, FIRST_TRAJECTORY_ID};

/// Well-known TNG block id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockId {
    /// Endianness & string length. Must be the very first block.
    ByteOrder,
    GeneralInfo,
    Molecules,
    /// Mapping from block id to human readable name.
    IdsAndNames,
    /// Frame-set header, doubly linked to its neighbours.
    FrameSet,
    /// Table of contents for one frame set.
    TableOfContents,
    /// Dense-index to real-particle-id translation.
    ParticleMapping,
    /// Simulation box shape, frame dependent only.
    BoxShape,
    Positions,
    Velocities,
    Forces,

    Custom(u64),
}

impl Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_u64())
    }
}

impl BlockId {
    pub fn from_u64(id: u64) -> Self {
        match id {
            0 => Self::ByteOrder,
            1 => Self::GeneralInfo,
            2 => Self::Molecules,
            3 => Self::IdsAndNames,
            4 => Self::FrameSet,
            5 => Self::TableOfContents,
            6 => Self::ParticleMapping,
            10000 => Self::BoxShape,
            10001 => Self::Positions,
            10002 => Self::Velocities,
            10003 => Self::Forces,
            other => Self::Custom(other),
        }
    }

    pub fn to_u64(&self) -> u64 {
        match self {
            Self::ByteOrder => 0,
            Self::GeneralInfo => 1,
            Self::Molecules => 2,
            Self::IdsAndNames => 3,
            Self::FrameSet => 4,
            Self::TableOfContents => 5,
            Self::ParticleMapping => 6,
            Self::BoxShape => 10000,
            Self::Positions => 10001,
            Self::Velocities => 10002,
            Self::Forces => 10003,
            Self::Custom(id) => *id,
        }
    }

    /// Canonical block name for the well-known ids.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ByteOrder => block_names::BYTE_ORDER,
            Self::GeneralInfo => block_names::GENERAL_INFO,
            Self::Molecules => block_names::MOLECULES,
            Self::IdsAndNames => block_names::ID_NAMES,
            Self::FrameSet => block_names::FRAME_SET,
            Self::TableOfContents => block_names::TOC,
            Self::ParticleMapping => block_names::PARTICLE_MAPPING,
            Self::BoxShape => block_names::BOX_SHAPE,
            Self::Positions => block_names::POSITIONS,
            Self::Velocities => block_names::VELOCITIES,
            Self::Forces => block_names::FORCES,
            Self::Custom(_) => "CUSTOM",
        }
    }

    /// `true` for ids chained via frame sets (id ≥ 10000).
    pub fn is_trajectory(&self) -> bool {
        self.to_u64() >= FIRST_TRAJECTORY_ID
    }
}
