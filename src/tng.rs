//! Core TNG struct and methods.
//!
//! ```rs
//! use tngiter::{Kind, Tng};
//! use std::path::Path;
//!
//! fn main() -> std::io::Result<()> {
//!     let mut tng = Tng::new(Path::new("TRAJECTORY.tng"))?;
//!
//!     println!("{} particles, {} frames", tng.num_particles(), tng.num_frames());
//!
//!     // All stored positions, real particle order, flat row-major buffer.
//!     let positions = tng.read_all(Kind::Positions)?;
//!     println!("stride {}", positions.stride_length);
//!
//!     // Iterate over block headers
//!     for header in tng.into_iter() {
//!         println!("{header:?}")
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::{
    fs::File,
    io::SeekFrom,
    path::{Path, PathBuf},
};

use log::{debug, trace};
use time::OffsetDateTime;

use crate::{
    block::{Block, BlockHeader},
    block_id::BlockId,
    block_types::{
        ByteOrder, DataBlock, DataValues, FrameSetHeader, GeneralInfo, IdsAndNames, Molecule,
        Molecules, ParticleMapping, TableOfContents,
    },
    consts::{MAX_NON_TRAJECTORY_BLOCKS, OFFSET_NONE},
    frame::{FrameData, Kind},
    reader::TngReader,
    TngError,
};

/// One loaded frame set: header, table of contents, particle
/// mappings and the (still compressed) data blocks.
#[derive(Debug)]
pub(crate) struct FrameSet {
    pub(crate) offset: u64,
    pub(crate) header: FrameSetHeader,
    pub(crate) toc: Option<TableOfContents>,
    pub(crate) mappings: Vec<ParticleMapping>,
    pub(crate) data_blocks: Vec<DataBlock>,
}

impl FrameSet {
    /// The data block with the given numeric id, if present.
    pub(crate) fn data_block(&self, id: u64) -> Option<&DataBlock> {
        self.data_blocks.iter().find(|db| db.header.block_id == id)
    }

    /// Dense-index → real-particle-id table, or `None` for the
    /// identity mapping (no mapping blocks in this set).
    pub(crate) fn dense_map(&self) -> Option<Vec<i64>> {
        if self.mappings.is_empty() {
            return None;
        }
        let total: usize = self.mappings.iter().map(|m| m.len()).sum();
        let mut table = vec![0_i64; total];
        for mapping in &self.mappings {
            for (local, real) in mapping.real_particle_numbers.iter().enumerate() {
                let dense = mapping.num_first_particle as usize + local;
                table[dense] = *real;
            }
        }
        Some(table)
    }
}

/// TNG trajectory reader.
///
/// Owns the file handle exclusively. The leading non-trajectory
/// blocks are parsed at open; frame sets are loaded on demand while
/// navigating and discarded when the next one is loaded.
#[derive(Debug)]
pub struct Tng {
    /// Path.
    path: PathBuf,
    reader: TngReader,
    byte_order: ByteOrder,
    info: GeneralInfo,
    molecules: Molecules,
    id_names: IdsAndNames,
    /// Headers of the non-trajectory blocks, in file order.
    /// Bounded to 32 entries, unique by id.
    block_table: Vec<BlockHeader>,
    /// Offset of the first frame set, if any.
    first_frame_set: Option<u64>,
    /// The currently loaded frame set.
    current: Option<FrameSet>,
    /// Total frame count, derived from the last frame set at open.
    n_frames: i64,
}

impl Iterator for Tng {
    type Item = BlockHeader;

    /// 'Next' function for non-fallible iteration over block headers
    /// from the current position. Returns `None` on errors, i.e.
    /// iteration simply ends.
    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.eof().ok()? {
            return None;
        }
        self.reader.next_header(true).ok()
    }
}

impl Tng {
    /// New `Tng` from path.
    ///
    /// Parses the leading endianness/string-length block plus the
    /// general info, molecules and trajectory-ids-and-names blocks.
    /// Frame sets are left on disk until navigated to.
    pub fn new(path: &Path) -> Result<Self, TngError> {
        let file = File::open(path)?;
        Self::with_reader(path, TngReader::new(file)?)
    }

    /// New `Tng` with a custom buffer size for the underlying
    /// `BufReader` over the file.
    pub fn with_capacity(path: &Path, capacity: usize) -> Result<Self, TngError> {
        let file = File::open(path)?;
        Self::with_reader(path, TngReader::with_capacity(file, Some(capacity))?)
    }

    fn with_reader(path: &Path, mut reader: TngReader) -> Result<Self, TngError> {
        // The endianness & string length block must come first;
        // nothing else can be interpreted before it.
        let header = reader.header(Some(SeekFrom::Start(0)))?;
        if header.block_id() != BlockId::ByteOrder {
            return Err(TngError::SchemaMismatch(format!(
                "file starts with block id {}, expected the endianness block",
                header.id()
            )));
        }
        let mut block = Block::new(header, &mut reader)?;
        block.verify()?;
        let byte_order = block.byte_order()?;
        byte_order.require_little()?;
        reader.max_str_len = byte_order.max_str_len();

        let mut info: Option<GeneralInfo> = None;
        let mut molecules = Molecules::default();
        let mut id_names = IdsAndNames::default();
        let mut block_table = vec![block.header.clone()];
        let mut first_frame_set = None;

        while !reader.eof()? {
            let header = reader.header(None)?;
            if header.block_id() == BlockId::FrameSet {
                first_frame_set = Some(header.offset);
                break;
            }
            if header.is_trajectory() {
                // trajectory data outside a frame set is unreachable
                // through the index; leave it on disk
                reader.skip_payload(&header)?;
                continue;
            }
            if block_table.len() >= MAX_NON_TRAJECTORY_BLOCKS {
                return Err(TngError::BlockTableFull);
            }
            if block_table.iter().any(|h| h.id() == header.id()) {
                return Err(TngError::DuplicateBlockId(header.id()));
            }

            let mut block = Block::new(header, &mut reader)?;
            block.verify()?;
            match block.header.block_id() {
                BlockId::GeneralInfo => info = Some(block.general_info()?),
                BlockId::Molecules => molecules = block.molecules()?,
                BlockId::IdsAndNames => id_names = block.ids_and_names()?,
                _ => {}
            }
            block_table.push(block.header.clone());
        }

        let info = info.ok_or_else(|| {
            TngError::SchemaMismatch("no general info block before the first frame set".into())
        })?;
        if info.first_frame_set_offset != OFFSET_NONE {
            first_frame_set = Some(info.first_frame_set_offset as u64);
        }

        let mut tng = Self {
            path: path.to_owned(),
            reader,
            byte_order,
            info,
            molecules,
            id_names,
            block_table,
            first_frame_set,
            current: None,
            n_frames: 0,
        };
        tng.n_frames = tng.derive_num_frames()?;

        debug!(
            "opened {}: {} non-trajectory blocks, {} particles, {} frames",
            path.display(),
            tng.block_table.len(),
            tng.num_particles(),
            tng.n_frames
        );

        Ok(tng)
    }

    /// Total frame count: `first_frame + n_frames` of the last frame
    /// set, located via the general-info offset or by walking links.
    fn derive_num_frames(&mut self) -> Result<i64, TngError> {
        let mut offset = match self.info.last_frame_set_offset {
            OFFSET_NONE => match self.first_frame_set {
                Some(first) => first,
                None => return Ok(0),
            },
            last => last as u64,
        };
        let mut seen = std::collections::HashSet::new();
        loop {
            if !seen.insert(offset) {
                return Err(TngError::SchemaMismatch(
                    "frame-set links form a cycle".into(),
                ));
            }
            let header = self.frame_set_header_at(offset)?;
            match header.next {
                OFFSET_NONE => return Ok(header.first_frame + header.n_frames),
                next => offset = next as u64,
            }
        }
    }

    /// Reads and verifies the frame-set header block at `offset`.
    fn frame_set_header_at(&mut self, offset: u64) -> Result<FrameSetHeader, TngError> {
        let header = self.reader.header(Some(SeekFrom::Start(offset)))?;
        if header.block_id() != BlockId::FrameSet {
            // a frame-set link must resolve to a frame-set block
            return Err(TngError::BlockMismatch {
                got: header.id(),
                expected: BlockId::FrameSet.to_u64(),
            });
        }
        let mut block = Block::new(header, &mut self.reader)?;
        block.verify()?;
        block.frame_set()
    }

    /// Tng file size in bytes.
    pub fn len(&self) -> u64 {
        self.reader.len
    }

    /// Tng file path.
    pub fn path(&self) -> PathBuf {
        self.path.to_owned()
    }

    /// Seek to start of TNG file.
    pub fn reset(&mut self) -> Result<(), TngError> {
        self.reader.reset()?;
        Ok(())
    }

    pub fn byte_order(&self) -> &ByteOrder {
        &self.byte_order
    }

    pub fn general_info(&self) -> &GeneralInfo {
        &self.info
    }

    pub fn molecules(&self) -> &Molecules {
        &self.molecules
    }

    /// Headers of the non-trajectory blocks read at open.
    pub fn block_table(&self) -> &[BlockHeader] {
        &self.block_table
    }

    /// Human readable name for a block id, from the file's
    /// trajectory-ids-and-names table with the well-known names as
    /// fallback.
    pub fn block_name(&self, id: u64) -> &str {
        self.id_names
            .name_of(id as i64)
            .unwrap_or_else(|| BlockId::from_u64(id).name())
    }

    /// Total number of particles/atoms, from the expanded topology
    /// (or from the current frame set if the file carries no
    /// molecules block).
    pub fn num_particles(&self) -> i64 {
        match self.molecules.is_empty() {
            false => self.molecules.n_particles(),
            true => self
                .current
                .as_ref()
                .map(|fs| fs.header.n_particles)
                .unwrap_or(0),
        }
    }

    /// Total number of frames across all frame sets.
    pub fn num_frames(&self) -> i64 {
        self.n_frames
    }

    /// Number of different kinds of molecules.
    pub fn num_molecule_types(&self) -> i64 {
        self.molecules.n_molecule_types()
    }

    /// Total number of molecule instances.
    pub fn num_molecules(&self) -> i64 {
        self.molecules.n_molecules()
    }

    /// Returns the first molecule type with the specified name.
    pub fn find_molecule(&self, name: &str) -> Option<&Molecule> {
        self.molecules.find(name)
    }

    /// Creation time of the trajectory, from the general info block.
    pub fn creation_time(&self) -> Result<OffsetDateTime, TngError> {
        self.info.creation_time()
    }

    pub fn creation_time_str(&self) -> Result<String, TngError> {
        self.info.creation_time_str()
    }

    /// Finds the first block header with specified numeric id,
    /// scanning forward from the current position.
    ///
    /// If `reset` is set, the search starts from the beginning of
    /// the file.
    pub fn find_header(&mut self, id: u64, reset: bool) -> Result<Option<BlockHeader>, TngError> {
        self.reader.find_header(id, reset)
    }

    /// Returns the first block with specified numeric id, payload
    /// read into memory and positioned at its start.
    ///
    /// Note that trajectory block ids occur once per frame set.
    pub fn find_block(&mut self, id: u64, reset: bool) -> Result<Block, TngError> {
        match self.reader.find_header(id, reset)? {
            Some(header) => Block::new(header, &mut self.reader),
            None => Err(TngError::NoSuchBlock(id)),
        }
    }

    /// Table of contents of the currently loaded frame set, if one
    /// is loaded and carries a TOC block.
    pub fn current_toc(&self) -> Option<&TableOfContents> {
        self.current.as_ref().and_then(|fs| fs.toc.as_ref())
    }

    /// Returns all block headers from the current position.
    pub fn headers(&mut self) -> Result<Vec<BlockHeader>, TngError> {
        let mut hdrs: Vec<BlockHeader> = Vec::new();
        while !self.reader.eof()? {
            hdrs.push(self.reader.next_header(true)?);
        }
        Ok(hdrs)
    }

    pub fn eof(&mut self) -> Result<bool, TngError> {
        self.reader.eof()
    }

    // ---------------
    // Frame-set index
    // ---------------

    /// Loads the frame set at `offset`, replacing the current one.
    /// Reads the header block plus every following TOC, mapping and
    /// data block up to the next frame set.
    fn load_frame_set(&mut self, offset: u64) -> Result<(), TngError> {
        if let Some(current) = &self.current {
            if current.offset == offset {
                return Ok(());
            }
        }
        trace!("loading frame set @ {offset}");

        let header = self.frame_set_header_at(offset)?;

        let mut toc = None;
        let mut mappings = Vec::new();
        let mut data_blocks = Vec::new();
        while !self.reader.eof()? {
            let block_header = self.reader.header(None)?;
            match block_header.block_id() {
                BlockId::FrameSet => {
                    // rewind to the boundary so navigation can
                    // pick this header up again
                    self.reader.seek(SeekFrom::Start(block_header.offset))?;
                    break;
                }
                BlockId::TableOfContents => {
                    let mut block = Block::new(block_header, &mut self.reader)?;
                    block.verify()?;
                    toc = Some(block.table_of_contents()?);
                }
                BlockId::ParticleMapping => {
                    let mut block = Block::new(block_header, &mut self.reader)?;
                    block.verify()?;
                    let mapping = block.particle_mapping()?;
                    mapping.validate()?;
                    mappings.push(mapping);
                }
                id if id.is_trajectory() => {
                    let mut block = Block::new(block_header, &mut self.reader)?;
                    block.verify()?;
                    data_blocks.push(block.data()?);
                }
                _ => {
                    self.reader.skip_payload(&block_header)?;
                }
            }
        }

        // data must sit on the frame set's stride grid
        for db in &data_blocks {
            if db.header.is_frame_dependent() {
                let lead = db.header.first_frame_with_data - header.first_frame;
                if lead < 0 || lead % db.header.stride_length != 0 {
                    return Err(TngError::SchemaMismatch(format!(
                        "block '{}' starts at frame {} outside frame set grid starting at {}",
                        db.header.block_name, db.header.first_frame_with_data, header.first_frame
                    )));
                }
            }
        }

        let n_particles = match header.n_particles {
            0 => self.molecules.n_particles(),
            n => n,
        };
        if !mappings.is_empty() {
            validate_mappings(&mappings, n_particles)?;
        }

        self.current = Some(FrameSet {
            offset,
            header,
            toc,
            mappings,
            data_blocks,
        });
        Ok(())
    }

    /// Locates and loads the frame set containing global frame
    /// `frame`. Follows long-stride links while the distance exceeds
    /// one long stride of frames, short links otherwise.
    fn locate_frame_set(&mut self, frame: i64) -> Result<(), TngError> {
        if frame < 0 || frame >= self.n_frames {
            return Err(TngError::FrameOutOfRange {
                frame,
                n_frames: self.n_frames,
            });
        }
        if self.current.is_none() {
            let first = self.first_frame_set.ok_or(TngError::FrameOutOfRange {
                frame,
                n_frames: self.n_frames,
            })?;
            self.load_frame_set(first)?;
        }

        let long_span = self
            .info
            .long_stride_length
            .saturating_mul(self.info.frame_set_n_frames);

        loop {
            let (first, last, next, prev, long_next, long_prev) = match &self.current {
                Some(fs) => (
                    fs.header.first_frame,
                    fs.header.last_frame(),
                    fs.header.next,
                    fs.header.prev,
                    fs.header.long_next,
                    fs.header.long_prev,
                ),
                None => {
                    return Err(TngError::FrameOutOfRange {
                        frame,
                        n_frames: self.n_frames,
                    })
                }
            };

            if first <= frame && frame <= last {
                return Ok(());
            }

            let link = match frame > last {
                true => match long_next != OFFSET_NONE && frame - last > long_span {
                    true => long_next,
                    false => next,
                },
                false => match long_prev != OFFSET_NONE && first - frame > long_span {
                    true => long_prev,
                    false => prev,
                },
            };
            if link == OFFSET_NONE {
                return Err(TngError::FrameOutOfRange {
                    frame,
                    n_frames: self.n_frames,
                });
            }
            self.load_frame_set(link as u64)?;
        }
    }

    /// Walks every frame set from the first, returning the headers
    /// in file order. Mainly useful for integrity checks.
    pub fn frame_set_headers(&mut self) -> Result<Vec<FrameSetHeader>, TngError> {
        let mut out = Vec::new();
        let mut offset = match self.first_frame_set {
            Some(first) => first,
            None => return Ok(out),
        };
        let mut seen = std::collections::HashSet::new();
        loop {
            if !seen.insert(offset) {
                return Err(TngError::SchemaMismatch(
                    "frame-set links form a cycle".into(),
                ));
            }
            let header = self.frame_set_header_at(offset)?;
            let next = header.next;
            out.push(header);
            match next {
                OFFSET_NONE => return Ok(out),
                n => offset = n as u64,
            }
        }
    }

    // -----------------
    // High-level reader
    // -----------------

    /// Native stride of the data blocks of `kind`, from the first
    /// frame set (or the currently loaded one).
    pub fn stride(&mut self, kind: Kind) -> Result<i64, TngError> {
        if self.current.is_none() {
            let first = self
                .first_frame_set
                .ok_or(TngError::NotPresent(kind.label()))?;
            self.load_frame_set(first)?;
        }
        let fs = match &self.current {
            Some(fs) => fs,
            None => return Err(TngError::NotPresent(kind.label())),
        };
        match fs.data_block(kind.block_id().to_u64()) {
            Some(db) => Ok(db.header.stride_length),
            None => Err(TngError::NotPresent(kind.label())),
        }
    }

    /// Shorthand for [`Tng::read_range`] over all frames.
    pub fn read_all(&mut self, kind: Kind) -> Result<FrameData, TngError> {
        match self.n_frames {
            0 => Err(TngError::NotPresent(kind.label())),
            n => self.read_range(kind, 0, n - 1),
        }
    }

    /// Reads `kind` over the inclusive global frame range
    /// `[start_frame, end_frame]`, assembling one contiguous
    /// row-major buffer across all touched frame sets.
    ///
    /// `end_frame` is clamped to the last frame of the trajectory.
    /// Only frames actually on the stride grid are returned;
    /// a range spanning no stored frame is an error that still
    /// reports the stride (`TngError::NoDataInRange`).
    ///
    /// Particle rows are returned in real particle order, i.e.
    /// mapping blocks are applied.
    pub fn read_range(
        &mut self,
        kind: Kind,
        start_frame: i64,
        end_frame: i64,
    ) -> Result<FrameData, TngError> {
        if start_frame < 0 || start_frame > end_frame || start_frame >= self.n_frames {
            return Err(TngError::FrameOutOfRange {
                frame: start_frame,
                n_frames: self.n_frames,
            });
        }
        let end_frame = end_frame.min(self.n_frames - 1);
        let id = kind.block_id().to_u64();

        self.locate_frame_set(start_frame)?;

        // template attributes from the first touched set; later sets
        // must agree
        let (stride, data_type, n_values_per_frame, particle_dependent) = {
            let fs = self.current_set()?;
            let db = fs
                .data_block(id)
                .ok_or(TngError::NotPresent(kind.label()))?;
            (
                db.header.stride_length,
                db.header.data_type,
                db.header.n_values_per_frame,
                db.header.is_particle_dependent(),
            )
        };
        let n_particles = self.num_particles();
        trace!(
            "read_range {} [{start_frame}, {end_frame}] stride {stride}",
            kind.label()
        );

        let mut out = DataValues::zeroed(data_type, 0);
        let mut n_rows = 0_i64;
        let mut first_frame_read = None;

        loop {
            let (set_last, set_next) = {
                let fs = self.current_set()?;
                let db = fs
                    .data_block(id)
                    .ok_or(TngError::NotPresent(kind.label()))?;
                if db.header.stride_length != stride
                    || db.header.data_type != data_type
                    || db.header.n_values_per_frame != n_values_per_frame
                {
                    return Err(TngError::SchemaMismatch(format!(
                        "'{}' changes layout between frame sets",
                        db.header.block_name
                    )));
                }

                let values = db.values()?;
                let dense_map = fs.dense_map();
                if particle_dependent && dense_map.is_none() && db.header.n_particles != n_particles
                {
                    return Err(TngError::SchemaMismatch(format!(
                        "frame set stores {} of {} particles without mapping blocks",
                        db.header.n_particles, n_particles
                    )));
                }
                let row = db.header.row_values() as usize;
                let out_row = match particle_dependent {
                    true => (n_particles * n_values_per_frame) as usize,
                    false => n_values_per_frame as usize,
                };
                let nvpf = n_values_per_frame as usize;

                for k in 0..db.header.n_stored_frames() {
                    let frame = db.header.first_frame_with_data + k * stride;
                    if frame < start_frame || frame > end_frame {
                        continue;
                    }
                    let src_base = k as usize * row;
                    match (&dense_map, particle_dependent) {
                        (Some(map), true) => {
                            // reorder dense rows into real particle order
                            let mut stage = DataValues::zeroed(data_type, out_row);
                            for (dense, real) in map.iter().enumerate() {
                                stage.copy_from(
                                    *real as usize * nvpf,
                                    &values,
                                    src_base + dense * nvpf,
                                    nvpf,
                                )?;
                            }
                            out.append(&stage)?;
                        }
                        _ => out.append_from(&values, src_base, row)?,
                    }
                    if first_frame_read.is_none() {
                        first_frame_read = Some(frame);
                    }
                    n_rows += 1;
                }

                (fs.header.last_frame(), fs.header.next)
            };

            if set_last >= end_frame || set_next == OFFSET_NONE {
                break;
            }
            self.load_frame_set(set_next as u64)?;
        }

        if n_rows == 0 {
            return Err(TngError::NoDataInRange {
                start: start_frame,
                end: end_frame,
                stride_length: stride,
            });
        }

        Ok(FrameData {
            values: out,
            stride_length: stride,
            n_frames_read: n_rows,
            first_frame_read: first_frame_read.unwrap_or(start_frame),
            n_values_per_frame,
            n_particles: match particle_dependent {
                true => n_particles,
                false => 0,
            },
        })
    }

    fn current_set(&self) -> Result<&FrameSet, TngError> {
        self.current.as_ref().ok_or(TngError::FrameOutOfRange {
            frame: 0,
            n_frames: self.n_frames,
        })
    }
}

/// The mapping blocks of a frame set must partition the dense index
/// space and permute `[0, n_particles)`.
fn validate_mappings(mappings: &[ParticleMapping], n_particles: i64) -> Result<(), TngError> {
    let total: usize = mappings.iter().map(|m| m.len()).sum();
    if total as i64 != n_particles {
        return Err(TngError::SchemaMismatch(format!(
            "mapping blocks cover {total} particles of {n_particles}"
        )));
    }

    let mut dense_seen = vec![false; total];
    let mut real_seen = vec![false; total];
    for mapping in mappings {
        let (first, end) = mapping.dense_range();
        if first < 0 || end as usize > total {
            return Err(TngError::SchemaMismatch(format!(
                "mapping dense range [{first}, {end}) outside [0, {total})"
            )));
        }
        for dense in first..end {
            if dense_seen[dense as usize] {
                return Err(TngError::SchemaMismatch(format!(
                    "dense particle index {dense} mapped twice"
                )));
            }
            dense_seen[dense as usize] = true;
        }
        for real in &mapping.real_particle_numbers {
            if *real < 0 || *real as usize >= total {
                return Err(TngError::SchemaMismatch(format!(
                    "real particle number {real} outside [0, {total})"
                )));
            }
            if real_seen[*real as usize] {
                return Err(TngError::SchemaMismatch(format!(
                    "real particle number {real} mapped twice"
                )));
            }
            real_seen[*real as usize] = true;
        }
    }
    Ok(())
}
