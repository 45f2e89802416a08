//! TNG writer: emits the leading non-trajectory blocks, then appends
//! frame sets one at a time. Each frame set is serialized into
//! memory first (payload sizes precede payloads on the wire), then
//! emitted at EOF, after which the neighbour links of the already
//! written sets and the general-info offsets are patched in place.
//! Patches rewrite whole blocks, so the stored hashes stay valid.

use std::{
    fs::File,
    io::{BufWriter, Cursor, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use binrw::BinWrite;
use log::debug;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::{
    block::{self, BlockHeader},
    block_id::BlockId,
    block_types::{
        data::{FRAME_DEPENDENT, PARTICLE_DEPENDENT},
        DataBlock, DataBlockHeader, DataValues, FrameSetHeader, GeneralInfo, IdsAndNames,
        Molecules, ParticleMapping, TableOfContents,
    },
    codec::CodecId,
    consts::{block_names, OFFSET_NONE, TNG_VERSION},
    frame::Kind,
    TngError,
};

/// A data block queued on the pending frame set.
struct PendingDataBlock {
    id: BlockId,
    header: DataBlockHeader,
    values: DataValues,
}

/// The frame set currently being assembled.
struct PendingFrameSet {
    header: FrameSetHeader,
    mappings: Vec<ParticleMapping>,
    blocks: Vec<PendingDataBlock>,
}

/// TNG trajectory writer. Owns the output file exclusively.
pub struct TngWriter {
    path: PathBuf,
    out: BufWriter<File>,
    info: GeneralInfo,
    molecules: Molecules,
    /// Offset and serialized length of the general info block,
    /// for in-place patching of the frame-set offsets.
    info_offset: u64,
    info_block_len: u64,
    /// Offset, header and serialized length of every written frame
    /// set, for link patching.
    frame_sets: Vec<(u64, FrameSetHeader, u64)>,
    pending: Option<PendingFrameSet>,
}

impl TngWriter {
    /// Creates `path` and writes the leading blocks: byte order,
    /// general info, molecules, trajectory ids and names.
    ///
    /// The frame-set offsets in `info` are managed by the writer and
    /// need not be set by the caller.
    pub fn create(
        path: &Path,
        info: GeneralInfo,
        molecules: Molecules,
    ) -> Result<Self, TngError> {
        let file = File::create(path)?;
        let mut writer = Self {
            path: path.to_owned(),
            out: BufWriter::new(file),
            info,
            molecules,
            info_offset: 0,
            info_block_len: 0,
            frame_sets: Vec::new(),
            pending: None,
        };
        writer.info.first_frame_set_offset = OFFSET_NONE;
        writer.info.last_frame_set_offset = OFFSET_NONE;

        let byte_order = crate::block_types::ByteOrder::default();
        writer.write_block(BlockId::ByteOrder, &byte_order.encode())?;

        let (info_offset, info_block_len) =
            writer.write_block(BlockId::GeneralInfo, &writer.info.encode())?;
        writer.info_offset = info_offset;
        writer.info_block_len = info_block_len;

        writer.write_block(BlockId::Molecules, &writer.molecules.encode())?;

        let id_names = IdsAndNames::new(vec![
            (BlockId::BoxShape.to_u64() as i64, block_names::BOX_SHAPE.into()),
            (BlockId::Positions.to_u64() as i64, block_names::POSITIONS.into()),
            (BlockId::Velocities.to_u64() as i64, block_names::VELOCITIES.into()),
            (BlockId::Forces.to_u64() as i64, block_names::FORCES.into()),
        ]);
        writer.write_block(BlockId::IdsAndNames, &id_names.encode())?;

        debug!("created {} with {} molecule types", path.display(), writer.molecules.n_molecule_types());

        Ok(writer)
    }

    pub fn path(&self) -> PathBuf {
        self.path.to_owned()
    }

    /// Number of frame sets written so far (excluding the pending one).
    pub fn num_frame_sets(&self) -> usize {
        self.frame_sets.len()
    }

    /// Starts a new frame set covering
    /// `[first_frame, first_frame + n_frames)`.
    /// Flushes the pending frame set to disk first.
    pub fn new_frame_set(&mut self, first_frame: i64, n_frames: i64) -> Result<(), TngError> {
        if first_frame < 0 || n_frames <= 0 {
            return Err(TngError::InvariantBroken(format!(
                "frame set [{first_frame}, +{n_frames}) is empty or negative"
            )));
        }
        self.flush_frame_set()?;
        if let Some((_, last, _)) = self.frame_sets.last() {
            let prev_end = last.first_frame + last.n_frames;
            if first_frame < prev_end {
                return Err(TngError::InvariantBroken(format!(
                    "frame set starting at {first_frame} overlaps previous set ending at {prev_end}"
                )));
            }
        }
        self.pending = Some(PendingFrameSet {
            header: FrameSetHeader::new(first_frame, n_frames),
            mappings: Vec::new(),
            blocks: Vec::new(),
        });
        Ok(())
    }

    /// Adds a particle mapping block to the pending frame set.
    /// `real_particle_numbers[i]` is the real particle id of dense
    /// index `num_first_particle + i`.
    pub fn add_mapping(
        &mut self,
        num_first_particle: i64,
        real_particle_numbers: Vec<i64>,
    ) -> Result<(), TngError> {
        let pending = self.pending.as_mut().ok_or_else(|| {
            TngError::InvariantBroken("no open frame set to add a mapping to".into())
        })?;
        pending
            .mappings
            .push(ParticleMapping::new(num_first_particle, real_particle_numbers));
        Ok(())
    }

    /// Queues a particle-dependent data block (positions, velocities,
    /// forces) on the pending frame set. `values` is row-major
    /// `[stored frame][particle][value]`, one row per stride step.
    pub fn add_particle_data(
        &mut self,
        kind: Kind,
        values: DataValues,
        n_values_per_frame: i64,
        stride_length: i64,
        codec: CodecId,
        multiplier: f64,
    ) -> Result<(), TngError> {
        let n_particles = self.pending_particle_count()?;
        self.queue_block(
            kind,
            values,
            n_values_per_frame,
            stride_length,
            codec,
            multiplier,
            PARTICLE_DEPENDENT | FRAME_DEPENDENT,
            n_particles,
        )
    }

    /// Queues a particle-independent data block (box shape) on the
    /// pending frame set.
    pub fn add_data(
        &mut self,
        kind: Kind,
        values: DataValues,
        n_values_per_frame: i64,
        stride_length: i64,
        codec: CodecId,
        multiplier: f64,
    ) -> Result<(), TngError> {
        self.queue_block(
            kind,
            values,
            n_values_per_frame,
            stride_length,
            codec,
            multiplier,
            FRAME_DEPENDENT,
            0,
        )
    }

    /// Flushes the pending frame set, patches the general-info
    /// offsets and flushes buffers. With `sync` set the file is
    /// fsynced; the format itself does not mandate durability.
    pub fn finish(mut self, sync: bool) -> Result<(), TngError> {
        self.flush_frame_set()?;
        self.rewrite_general_info()?;
        self.out.flush()?;
        if sync {
            self.out.get_ref().sync_all()?;
        }
        debug!(
            "finished {}: {} frame sets",
            self.path.display(),
            self.frame_sets.len()
        );
        Ok(())
    }

    /// Particle count the pending set's data rows must match:
    /// the mapped count when mappings are queued, the expanded
    /// topology count otherwise.
    fn pending_particle_count(&self) -> Result<i64, TngError> {
        let pending = self.pending.as_ref().ok_or_else(|| {
            TngError::InvariantBroken("no open frame set to add data to".into())
        })?;
        match pending.mappings.is_empty() {
            false => Ok(pending.mappings.iter().map(|m| m.len() as i64).sum()),
            true => match self.molecules.n_particles() {
                0 => Err(TngError::InvariantBroken(
                    "particle data without molecules or mapping blocks".into(),
                )),
                n => Ok(n),
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn queue_block(
        &mut self,
        kind: Kind,
        values: DataValues,
        n_values_per_frame: i64,
        stride_length: i64,
        codec: CodecId,
        multiplier: f64,
        dependency: u8,
        n_particles: i64,
    ) -> Result<(), TngError> {
        if stride_length < 1 {
            return Err(TngError::InvariantBroken(format!(
                "stride length must be at least 1, got {stride_length}"
            )));
        }
        if codec.quantizes() && !(multiplier.is_finite() && multiplier > 0.0) {
            return Err(TngError::InvariantBroken(format!(
                "quantizing codec with multiplier {multiplier}"
            )));
        }
        let id = kind.block_id();
        let pending = self.pending.as_mut().ok_or_else(|| {
            TngError::InvariantBroken("no open frame set to add data to".into())
        })?;
        if pending.blocks.iter().any(|b| b.id == id) {
            return Err(TngError::InvariantBroken(format!(
                "frame set already holds a '{}' block",
                id.name()
            )));
        }

        let header = DataBlockHeader {
            block_id: id.to_u64(),
            block_name: id.name().to_owned(),
            data_type: values.data_type(),
            dependency,
            n_values_per_frame,
            codec_id: codec.to_i64(),
            compression_multiplier: multiplier,
            first_frame_with_data: pending.header.first_frame,
            n_frames: pending.header.n_frames,
            stride_length,
            num_first_particle: 0,
            n_particles,
        };
        if values.len() as i64 != header.total_values() {
            return Err(TngError::InvariantBroken(format!(
                "'{}' holds {} values, layout demands {}",
                id.name(),
                values.len(),
                header.total_values()
            )));
        }

        pending.blocks.push(PendingDataBlock { id, header, values });
        Ok(())
    }

    /// Serializes and appends the pending frame set, then patches
    /// the links of its predecessors.
    fn flush_frame_set(&mut self) -> Result<(), TngError> {
        let mut pending = match self.pending.take() {
            Some(p) => p,
            None => return Ok(()),
        };

        // compress the independent data payloads in parallel before
        // any bytes hit the file
        let payloads = pending
            .blocks
            .par_iter()
            .map(|b| DataBlock::encode(&b.header, &b.values))
            .collect::<Result<Vec<Vec<u8>>, TngError>>()?;

        let index = self.frame_sets.len();
        let long_stride = self.info.long_stride_length as usize;

        pending.header.prev = match self.frame_sets.last() {
            Some((offset, _, _)) => *offset as i64,
            None => OFFSET_NONE,
        };
        pending.header.long_prev = match index >= long_stride {
            true => self.frame_sets[index - long_stride].0 as i64,
            false => OFFSET_NONE,
        };
        let mapped: i64 = pending.mappings.iter().map(|m| m.len() as i64).sum();
        if !pending.mappings.is_empty() && mapped != self.molecules.n_particles() {
            pending.header.n_particles = mapped;
        }

        let offset = self.out.seek(SeekFrom::End(0))?;
        let (_, block_len) = self.write_block(BlockId::FrameSet, &pending.header.encode())?;

        let toc = TableOfContents::new(
            pending
                .blocks
                .iter()
                .map(|b| b.id.name().to_owned())
                .collect(),
        );
        self.write_block(BlockId::TableOfContents, &toc.encode())?;

        for mapping in &pending.mappings {
            let mut crs = Cursor::new(Vec::new());
            mapping.write(&mut crs)?;
            self.write_block(BlockId::ParticleMapping, &crs.into_inner())?;
        }

        for (block, payload) in pending.blocks.iter().zip(payloads.iter()) {
            self.write_block(block.id, payload)?;
        }

        self.frame_sets.push((offset, pending.header, block_len));

        // patch the short link of the direct predecessor and the
        // long link of the set one long stride behind
        if index > 0 {
            self.frame_sets[index - 1].1.next = offset as i64;
            self.rewrite_frame_set(index - 1)?;
        }
        if index >= long_stride {
            self.frame_sets[index - long_stride].1.long_next = offset as i64;
            self.rewrite_frame_set(index - long_stride)?;
        }

        if index == 0 {
            self.info.first_frame_set_offset = offset as i64;
        }
        self.info.last_frame_set_offset = offset as i64;

        Ok(())
    }

    /// Serializes one block and appends it at the current position.
    fn write_block(&mut self, id: BlockId, payload: &[u8]) -> Result<(u64, u64), TngError> {
        let header = BlockHeader::new(id, TNG_VERSION);
        let bytes = block::block::serialize(&header, payload, true);
        let offset = self.out.stream_position()?;
        self.out.write_all(&bytes)?;
        Ok((offset, bytes.len() as u64))
    }

    /// Rewrites the frame-set block at `index` in place with its
    /// patched links, recomputing the hash. Link patches never move
    /// bytes, so the rewrite must land on the original length.
    fn rewrite_frame_set(&mut self, index: usize) -> Result<(), TngError> {
        let (offset, header, block_len) = &self.frame_sets[index];
        let block_header = BlockHeader::new(BlockId::FrameSet, TNG_VERSION);
        let bytes = block::block::serialize(&block_header, &header.encode(), true);
        if bytes.len() as u64 != *block_len {
            return Err(TngError::WriteShort {
                got: bytes.len() as u64,
                expected: *block_len,
            });
        }
        let offset = *offset;
        self.out.seek(SeekFrom::Start(offset))?;
        self.out.write_all(&bytes)?;
        self.out.seek(SeekFrom::End(0))?;
        Ok(())
    }

    /// Rewrites the general info block in place with the final
    /// first/last frame-set offsets.
    fn rewrite_general_info(&mut self) -> Result<(), TngError> {
        let block_header = BlockHeader::new(BlockId::GeneralInfo, TNG_VERSION);
        let bytes = block::block::serialize(&block_header, &self.info.encode(), true);
        if bytes.len() as u64 != self.info_block_len {
            return Err(TngError::WriteShort {
                got: bytes.len() as u64,
                expected: self.info_block_len,
            });
        }
        self.out.seek(SeekFrom::Start(self.info_offset))?;
        self.out.write_all(&bytes)?;
        self.out.seek(SeekFrom::End(0))?;
        Ok(())
    }
}
