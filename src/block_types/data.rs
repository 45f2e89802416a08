//! Trajectory data blocks (ids ≥ 10000). A shared header describes
//! the stored series (datatype, frame span, stride, values per
//! frame, codec) followed by the codec payload. Values are laid out
//! row-major `[frame][particle][value]`.

use std::io::{Cursor, Read};

use binrw::BinReaderExt;

use crate::{block::BlockHeader, codec, codec::CodecId, TngError};

/// The data block covers per-particle rows.
pub const PARTICLE_DEPENDENT: u8 = 1;
/// The data block covers a frame range (with a stride).
pub const FRAME_DEPENDENT: u8 = 2;

/// Element type of a data block. Tag byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Char = 0,
    Int = 1,
    Float = 2,
    Double = 3,
}

impl DataType {
    pub fn from_u8(tag: u8) -> Result<Self, TngError> {
        match tag {
            0 => Ok(Self::Char),
            1 => Ok(Self::Int),
            2 => Ok(Self::Float),
            3 => Ok(Self::Double),
            other => Err(TngError::SchemaMismatch(format!(
                "unknown datatype tag {other}"
            ))),
        }
    }

    pub fn to_u8(&self) -> u8 {
        *self as u8
    }

    /// Serialized width of one value in bytes.
    pub fn size_of(&self) -> usize {
        match self {
            Self::Char => 1,
            Self::Int => 4,
            Self::Float => 4,
            Self::Double => 8,
        }
    }
}

/// Decoded values of a data block. A sum type over the four element
/// kinds; access paths are monomorphic per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValues {
    Char(Vec<u8>),
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl DataValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Char(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Char(_) => DataType::Char,
            Self::Int(_) => DataType::Int,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
        }
    }

    /// Zero-filled values of the given type and length.
    pub(crate) fn zeroed(data_type: DataType, n: usize) -> Self {
        match data_type {
            DataType::Char => Self::Char(vec![0; n]),
            DataType::Int => Self::Int(vec![0; n]),
            DataType::Float => Self::Float(vec![0.0; n]),
            DataType::Double => Self::Double(vec![0.0; n]),
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            Self::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            Self::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            Self::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Char(v) => Some(v),
            _ => None,
        }
    }

    /// Appends `n` values starting at `src_base` in `src`.
    /// Both sides must hold the same kind.
    pub(crate) fn append_from(
        &mut self,
        src: &DataValues,
        src_base: usize,
        n: usize,
    ) -> Result<(), TngError> {
        match (self, src) {
            (Self::Char(d), Self::Char(s)) => d.extend_from_slice(&s[src_base..src_base + n]),
            (Self::Int(d), Self::Int(s)) => d.extend_from_slice(&s[src_base..src_base + n]),
            (Self::Float(d), Self::Float(s)) => d.extend_from_slice(&s[src_base..src_base + n]),
            (Self::Double(d), Self::Double(s)) => d.extend_from_slice(&s[src_base..src_base + n]),
            (dst, src) => {
                return Err(TngError::SchemaMismatch(format!(
                    "datatype changed between frame sets: {:?} vs {:?}",
                    dst.data_type(),
                    src.data_type()
                )))
            }
        }
        Ok(())
    }

    pub(crate) fn append(&mut self, src: &DataValues) -> Result<(), TngError> {
        self.append_from(src, 0, src.len())
    }

    /// Copies `n` values from `src[src_base..]` into
    /// `self[dst_base..]`. Both sides must hold the same kind.
    pub(crate) fn copy_from(
        &mut self,
        dst_base: usize,
        src: &DataValues,
        src_base: usize,
        n: usize,
    ) -> Result<(), TngError> {
        match (self, src) {
            (Self::Char(d), Self::Char(s)) => {
                d[dst_base..dst_base + n].copy_from_slice(&s[src_base..src_base + n])
            }
            (Self::Int(d), Self::Int(s)) => {
                d[dst_base..dst_base + n].copy_from_slice(&s[src_base..src_base + n])
            }
            (Self::Float(d), Self::Float(s)) => {
                d[dst_base..dst_base + n].copy_from_slice(&s[src_base..src_base + n])
            }
            (Self::Double(d), Self::Double(s)) => {
                d[dst_base..dst_base + n].copy_from_slice(&s[src_base..src_base + n])
            }
            (dst, src) => {
                return Err(TngError::SchemaMismatch(format!(
                    "datatype changed between frame sets: {:?} vs {:?}",
                    dst.data_type(),
                    src.data_type()
                )))
            }
        }
        Ok(())
    }
}

/// Shared header of a trajectory data block.
#[derive(Debug, Clone)]
pub struct DataBlockHeader {
    /// Numeric id of the owning block.
    pub block_id: u64,
    /// Name of the owning block.
    pub block_name: String,
    pub data_type: DataType,
    /// Bitwise or of [`PARTICLE_DEPENDENT`] and [`FRAME_DEPENDENT`].
    pub dependency: u8,
    pub n_values_per_frame: i64,
    pub codec_id: i64,
    /// Scale used to map floats to integers before entropy coding.
    /// 1.0 for non-quantizing codecs.
    pub compression_multiplier: f64,
    /// First global frame with stored data.
    pub first_frame_with_data: i64,
    /// Frame span covered by this block.
    pub n_frames: i64,
    /// Sampling period in frames.
    pub stride_length: i64,
    /// Dense index of the first particle (particle dependent only).
    pub num_first_particle: i64,
    /// Particle count (particle dependent only).
    pub n_particles: i64,
}

impl DataBlockHeader {
    pub fn is_particle_dependent(&self) -> bool {
        self.dependency & PARTICLE_DEPENDENT != 0
    }

    pub fn is_frame_dependent(&self) -> bool {
        self.dependency & FRAME_DEPENDENT != 0
    }

    /// Number of frames actually stored, after applying the stride.
    pub fn n_stored_frames(&self) -> i64 {
        match self.is_frame_dependent() {
            true => (self.n_frames + self.stride_length - 1) / self.stride_length,
            false => 1,
        }
    }

    /// Values per stored frame row.
    pub fn row_values(&self) -> i64 {
        match self.is_particle_dependent() {
            true => self.n_particles * self.n_values_per_frame,
            false => self.n_values_per_frame,
        }
    }

    /// Total number of stored values across all rows.
    pub fn total_values(&self) -> i64 {
        self.n_stored_frames() * self.row_values()
    }
}

/// A trajectory data block with its codec payload still compressed.
/// Decompression happens on demand via [`DataBlock::values`].
#[derive(Debug, Clone)]
pub struct DataBlock {
    pub header: DataBlockHeader,
    pub(crate) payload: Vec<u8>,
}

impl DataBlock {
    pub(crate) fn decode(
        block_header: &BlockHeader,
        crs: &mut Cursor<Vec<u8>>,
    ) -> Result<Self, TngError> {
        let data_type = DataType::from_u8(crs.read_le::<u8>()?)?;
        let dependency = crs.read_le::<u8>()?;
        let n_values_per_frame = crs.read_le::<i64>()?;
        let codec_id = crs.read_le::<i64>()?;
        let compression_multiplier = crs.read_le::<f64>()?;

        let (first_frame_with_data, n_frames, stride_length) = match dependency & FRAME_DEPENDENT {
            0 => (0, 1, 1),
            _ => (
                crs.read_le::<i64>()?,
                crs.read_le::<i64>()?,
                crs.read_le::<i64>()?,
            ),
        };
        let (num_first_particle, n_particles) = match dependency & PARTICLE_DEPENDENT {
            0 => (0, 0),
            _ => (crs.read_le::<i64>()?, crs.read_le::<i64>()?),
        };

        if n_values_per_frame <= 0 {
            return Err(TngError::SchemaMismatch(format!(
                "n_values_per_frame must be positive, got {n_values_per_frame}"
            )));
        }
        if stride_length < 1 {
            return Err(TngError::SchemaMismatch(format!(
                "stride_length must be at least 1, got {stride_length}"
            )));
        }
        if dependency & PARTICLE_DEPENDENT != 0 && n_particles <= 0 {
            return Err(TngError::SchemaMismatch(format!(
                "particle dependent block with particle count {n_particles}"
            )));
        }

        let mut payload = Vec::new();
        crs.read_to_end(&mut payload)?;

        Ok(Self {
            header: DataBlockHeader {
                block_id: block_header.id(),
                block_name: block_header.name().to_owned(),
                data_type,
                dependency,
                n_values_per_frame,
                codec_id,
                compression_multiplier,
                first_frame_with_data,
                n_frames,
                stride_length,
                num_first_particle,
                n_particles,
            },
            payload,
        })
    }

    /// Serializes the data-block payload: the shared header followed
    /// by the codec-compressed values.
    pub(crate) fn encode(
        header: &DataBlockHeader,
        values: &DataValues,
    ) -> Result<Vec<u8>, TngError> {
        if values.len() as i64 != header.total_values() {
            return Err(TngError::InvariantBroken(format!(
                "{} values passed for a block of {} stored values",
                values.len(),
                header.total_values()
            )));
        }
        if values.data_type() != header.data_type {
            return Err(TngError::InvariantBroken(format!(
                "values of type {:?} for a block declaring {:?}",
                values.data_type(),
                header.data_type
            )));
        }

        let codec = CodecId::from_i64(header.codec_id)?;
        let compressed = codec::compress(
            codec,
            values,
            header.compression_multiplier,
            header.row_values() as usize,
        )?;

        let mut buf = Vec::with_capacity(compressed.len() + 64);
        buf.push(header.data_type.to_u8());
        buf.push(header.dependency);
        buf.extend_from_slice(&header.n_values_per_frame.to_le_bytes());
        buf.extend_from_slice(&header.codec_id.to_le_bytes());
        buf.extend_from_slice(&header.compression_multiplier.to_le_bytes());
        if header.is_frame_dependent() {
            buf.extend_from_slice(&header.first_frame_with_data.to_le_bytes());
            buf.extend_from_slice(&header.n_frames.to_le_bytes());
            buf.extend_from_slice(&header.stride_length.to_le_bytes());
        }
        if header.is_particle_dependent() {
            buf.extend_from_slice(&header.num_first_particle.to_le_bytes());
            buf.extend_from_slice(&header.n_particles.to_le_bytes());
        }
        buf.extend_from_slice(&compressed);
        Ok(buf)
    }

    /// Runs the reverse codec pipeline over the stored payload.
    pub fn values(&self) -> Result<DataValues, TngError> {
        let codec = CodecId::from_i64(self.header.codec_id)?;
        codec::decompress(
            codec,
            self.header.data_type,
            &self.payload,
            self.header.compression_multiplier,
            self.header.row_values() as usize,
            self.header.total_values() as usize,
        )
    }
}
