//! Read and write TNG binary trajectory files and find specific
//! blocks via their numeric block id. Does not and will not support
//! any molecular analysis on top of the decoded arrays.
//!
//! ```rs
//! use tngiter::{Kind, Tng};
//! use std::path::Path;
//!
//! fn main() -> std::io::Result<()> {
//!     let mut tng = Tng::new(Path::new("TRAJECTORY.tng"))?;
//!
//!     println!("{} particles over {} frames", tng.num_particles(), tng.num_frames());
//!
//!     // Positions for all stored frames, mapped to real particle order.
//!     let positions = tng.read_all(Kind::Positions)?;
//!     println!("stride {}, {} frames read", positions.stride_length, positions.n_frames_read);
//!
//!     // Iterate over block headers
//!     for header in tng.into_iter() {
//!         println!("{header:?}")
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod block;
pub mod block_id;
pub mod block_types;
pub mod codec;
pub mod consts;
pub mod errors;
pub mod frame;
pub mod tng;
pub mod writer;
pub mod tests;

// Internal reader
pub(crate) mod reader;

pub use block::{Block, BlockHeader};
pub use block_id::BlockId;
pub use block_types::{
    Atom,
    Bond,
    ByteOrder,
    Chain,
    DataBlockHeader,
    DataType,
    DataValues,
    FrameSetHeader,
    GeneralInfo,
    IdsAndNames,
    Molecule,
    Molecules,
    ParticleMapping,
    Residue,
    TableOfContents,
};
pub use codec::CodecId;
pub use errors::{Status, TngError};
pub use frame::{FrameData, Kind};
pub use tng::Tng;
pub use writer::TngWriter;
