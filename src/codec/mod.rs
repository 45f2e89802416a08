//! Numeric compression pipelines for trajectory data. A codec id on
//! a data block names a fixed, ordered pipeline of pure kernels;
//! decoding runs the mirror image. No kernel performs I/O.
//!
//! | id | pipeline (encode order) |
//! |---|---|
//! | 0 | raw little-endian values |
//! | 1 | quantize → triplet delta |
//! | 2 | quantize → triplet delta → RLE → Huffman |
//! | 3 | quantize → Huffman |
//! | 4 | quantize → Huffman |
//!
//! Signed residuals are zigzag-mapped to unsigned symbols at the
//! boundary between the delta/quantize stages and the integer
//! stream stages.

pub mod delta;
pub mod huffman;
pub mod quantize;
pub mod rle;

use crate::{
    block_types::{DataType, DataValues},
    consts::MIN_RLE,
    TngError,
};

/// Numeric selector naming a fixed compression pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecId {
    /// Raw values, byte order already normalized by the reader.
    Uncompressed = 0,
    /// XTC-style quantized deltas without an entropy stage.
    Xtc = 1,
    /// Full positions pipeline.
    TngPositions = 2,
    TngVelocities = 3,
    TngForces = 4,
}

impl CodecId {
    pub fn from_i64(id: i64) -> Result<Self, TngError> {
        match id {
            0 => Ok(Self::Uncompressed),
            1 => Ok(Self::Xtc),
            2 => Ok(Self::TngPositions),
            3 => Ok(Self::TngVelocities),
            4 => Ok(Self::TngForces),
            other => Err(TngError::CodecMalformed(format!("unknown codec id {other}"))),
        }
    }

    pub fn to_i64(&self) -> i64 {
        *self as i64
    }

    /// `true` if the pipeline maps floats through integers.
    pub fn quantizes(&self) -> bool {
        !matches!(self, Self::Uncompressed)
    }

    /// The ordered stage list of this pipeline.
    pub(crate) fn stages(&self) -> &'static [Stage] {
        match self {
            Self::Uncompressed => &[],
            Self::Xtc => &[Stage::Quantize, Stage::TripletDelta],
            Self::TngPositions => &[
                Stage::Quantize,
                Stage::TripletDelta,
                Stage::Rle,
                Stage::Huffman,
            ],
            Self::TngVelocities | Self::TngForces => &[Stage::Quantize, Stage::Huffman],
        }
    }
}

/// Element kind flowing between pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ElementKind {
    Float,
    Integer,
    Bytes,
}

/// One stage of a codec pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Quantize,
    TripletDelta,
    Rle,
    Huffman,
}

impl Stage {
    pub(crate) fn input_kind(&self) -> ElementKind {
        match self {
            Self::Quantize => ElementKind::Float,
            Self::TripletDelta | Self::Rle | Self::Huffman => ElementKind::Integer,
        }
    }

    pub(crate) fn output_kind(&self) -> ElementKind {
        match self {
            Self::Quantize | Self::TripletDelta | Self::Rle => ElementKind::Integer,
            Self::Huffman => ElementKind::Bytes,
        }
    }
}

/// A pipeline is well-formed only if adjacent stages agree on the
/// element kind crossing between them.
pub(crate) fn check_pipeline(stages: &[Stage]) -> Result<(), TngError> {
    for pair in stages.windows(2) {
        if pair[0].output_kind() != pair[1].input_kind() {
            return Err(TngError::CodecMalformed(format!(
                "stage {:?} feeds {:?} but {:?} consumes {:?}",
                pair[0],
                pair[0].output_kind(),
                pair[1],
                pair[1].input_kind()
            )));
        }
    }
    Ok(())
}

/// Zigzag map: small signed residuals become small unsigned symbols.
fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

fn unzigzag(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}

/// Runs the forward pipeline of `codec` over `values`.
/// `row_len` is the number of values per stored frame.
pub(crate) fn compress(
    codec: CodecId,
    values: &DataValues,
    multiplier: f64,
    row_len: usize,
) -> Result<Vec<u8>, TngError> {
    check_pipeline(codec.stages())?;
    match codec {
        CodecId::Uncompressed => Ok(raw_encode(values)),
        CodecId::Xtc => {
            let quantized = quantize::quantize(values, multiplier)?;
            let deltas = delta::encode(&quantized, row_len)?;
            let mut buf = Vec::with_capacity(deltas.len() * 8);
            for d in &deltas {
                buf.extend_from_slice(&d.to_le_bytes());
            }
            Ok(buf)
        }
        CodecId::TngPositions => {
            let quantized = quantize::quantize(values, multiplier)?;
            let deltas = delta::encode(&quantized, row_len)?;
            let symbols: Vec<u64> = deltas.iter().map(|d| zigzag(*d)).collect();
            let runs = rle::encode(&symbols, MIN_RLE);
            huffman::encode(&runs)
        }
        CodecId::TngVelocities | CodecId::TngForces => {
            let quantized = quantize::quantize(values, multiplier)?;
            let symbols: Vec<u64> = quantized.iter().map(|q| zigzag(*q)).collect();
            huffman::encode(&symbols)
        }
    }
}

/// Runs the reverse pipeline of `codec` over `payload`, expecting
/// exactly `n_values` values of `data_type`.
pub(crate) fn decompress(
    codec: CodecId,
    data_type: DataType,
    payload: &[u8],
    multiplier: f64,
    row_len: usize,
    n_values: usize,
) -> Result<DataValues, TngError> {
    check_pipeline(codec.stages())?;
    match codec {
        CodecId::Uncompressed => raw_decode(data_type, payload, n_values),
        CodecId::Xtc => {
            if payload.len() != n_values * 8 {
                return Err(TngError::CodecMalformed(format!(
                    "XTC payload of {} bytes for {n_values} values",
                    payload.len()
                )));
            }
            let deltas: Vec<i64> = payload
                .chunks_exact(8)
                .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect();
            let quantized = delta::decode(&deltas, row_len)?;
            quantize::dequantize(data_type, &quantized, multiplier)
        }
        CodecId::TngPositions => {
            // the run-length stream may hold up to three entries per
            // expanded value (escaped marker runs of length one)
            let runs = huffman::decode(payload, n_values.saturating_mul(3))?;
            let symbols = rle::decode(&runs, n_values)?;
            let deltas: Vec<i64> = symbols.iter().map(|s| unzigzag(*s)).collect();
            let quantized = delta::decode(&deltas, row_len)?;
            quantize::dequantize(data_type, &quantized, multiplier)
        }
        CodecId::TngVelocities | CodecId::TngForces => {
            let symbols = huffman::decode(payload, n_values)?;
            if symbols.len() != n_values {
                return Err(TngError::CodecMalformed(format!(
                    "bit stream decoded to {} of {n_values} declared values",
                    symbols.len()
                )));
            }
            let quantized: Vec<i64> = symbols.iter().map(|s| unzigzag(*s)).collect();
            quantize::dequantize(data_type, &quantized, multiplier)
        }
    }
}

/// Codec 0: values serialized little-endian, nothing else.
fn raw_encode(values: &DataValues) -> Vec<u8> {
    match values {
        DataValues::Char(v) => v.clone(),
        DataValues::Int(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        DataValues::Float(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        DataValues::Double(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
    }
}

fn raw_decode(data_type: DataType, payload: &[u8], n_values: usize) -> Result<DataValues, TngError> {
    let expected = n_values * data_type.size_of();
    if payload.len() != expected {
        return Err(TngError::CodecMalformed(format!(
            "raw payload of {} bytes for {n_values} {data_type:?} values",
            payload.len()
        )));
    }
    Ok(match data_type {
        DataType::Char => DataValues::Char(payload.to_vec()),
        DataType::Int => DataValues::Int(
            payload
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        DataType::Float => DataValues::Float(
            payload
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        DataType::Double => DataValues::Double(
            payload
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drifting_positions(n_frames: usize, n_particles: usize) -> Vec<f32> {
        // deterministic pseudo-trajectory: slow per-particle drift
        let mut out = Vec::with_capacity(n_frames * n_particles * 3);
        for frame in 0..n_frames {
            for particle in 0..n_particles {
                for component in 0..3 {
                    let base = (particle * 3 + component) as f32 * 0.1;
                    let drift = frame as f32 * 0.001 * ((particle % 7) as f32 - 3.0);
                    out.push(base + drift);
                }
            }
        }
        out
    }

    #[test]
    fn pipelines_are_well_formed() {
        for codec in [
            CodecId::Uncompressed,
            CodecId::Xtc,
            CodecId::TngPositions,
            CodecId::TngVelocities,
            CodecId::TngForces,
        ] {
            assert!(check_pipeline(codec.stages()).is_ok());
        }
    }

    #[test]
    fn mismatched_stages_rejected() {
        assert!(matches!(
            check_pipeline(&[Stage::Huffman, Stage::Quantize]),
            Err(TngError::CodecMalformed(_))
        ));
    }

    #[test]
    fn zigzag_round_trip() {
        for v in [0_i64, 1, -1, 2, -2, 1_000_000, -1_000_000, i64::MAX, i64::MIN] {
            assert_eq!(unzigzag(zigzag(v)), v);
        }
        // small magnitudes map to small symbols
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
    }

    #[test]
    fn raw_round_trip_all_types() {
        let cases = [
            DataValues::Char(vec![0, 1, 255]),
            DataValues::Int(vec![-5, 0, 123456]),
            DataValues::Float(vec![1.5, -2.25, 0.0]),
            DataValues::Double(vec![3.6014, 0.0, -1.0]),
        ];
        for values in cases {
            let payload = compress(CodecId::Uncompressed, &values, 1.0, 3).unwrap();
            let back = decompress(
                CodecId::Uncompressed,
                values.data_type(),
                &payload,
                1.0,
                3,
                values.len(),
            )
            .unwrap();
            assert_eq!(back, values);
        }
    }

    #[test]
    fn positions_pipeline_round_trip_within_bound() {
        let multiplier = 10_000.0;
        let original = drifting_positions(20, 12);
        let values = DataValues::Float(original.clone());
        let row_len = 12 * 3;
        let payload = compress(CodecId::TngPositions, &values, multiplier, row_len).unwrap();
        // residual coding should beat the raw form on drift data
        assert!(payload.len() < original.len() * 4);
        let back = decompress(
            CodecId::TngPositions,
            DataType::Float,
            &payload,
            multiplier,
            row_len,
            original.len(),
        )
        .unwrap();
        let back = back.as_f32().unwrap();
        for (a, b) in original.iter().zip(back.iter()) {
            assert!(((a - b).abs() as f64) <= 0.5 / multiplier, "{a} vs {b}");
        }
    }

    #[test]
    fn velocities_pipeline_round_trip_within_bound() {
        let multiplier = 100_000.0;
        let original: Vec<f32> = (0..300).map(|i| ((i % 17) as f32 - 8.0) * 0.125).collect();
        let values = DataValues::Float(original.clone());
        let payload = compress(CodecId::TngVelocities, &values, multiplier, 30).unwrap();
        let back = decompress(
            CodecId::TngVelocities,
            DataType::Float,
            &payload,
            multiplier,
            30,
            original.len(),
        )
        .unwrap();
        let back = back.as_f32().unwrap();
        for (a, b) in original.iter().zip(back.iter()) {
            assert!(((a - b).abs() as f64) <= 0.5 / multiplier);
        }
    }

    #[test]
    fn xtc_round_trip_within_bound() {
        let multiplier = 1000.0;
        let original = drifting_positions(4, 5);
        let values = DataValues::Float(original.clone());
        let payload = compress(CodecId::Xtc, &values, multiplier, 15).unwrap();
        let back = decompress(CodecId::Xtc, DataType::Float, &payload, multiplier, 15, original.len()).unwrap();
        let back = back.as_f32().unwrap();
        for (a, b) in original.iter().zip(back.iter()) {
            assert!(((a - b).abs() as f64) <= 0.5 / multiplier);
        }
    }

    #[test]
    fn double_values_survive_quantized_pipelines() {
        let multiplier = 1000.0;
        let original: Vec<f64> = (0..60).map(|i| i as f64 * 0.017).collect();
        let values = DataValues::Double(original.clone());
        let payload = compress(CodecId::TngPositions, &values, multiplier, 6).unwrap();
        let back = decompress(
            CodecId::TngPositions,
            DataType::Double,
            &payload,
            multiplier,
            6,
            original.len(),
        )
        .unwrap();
        let back = back.as_f64().unwrap();
        for (a, b) in original.iter().zip(back.iter()) {
            assert!((a - b).abs() <= 0.5 / multiplier);
        }
    }

    #[test]
    fn quantizing_codec_rejects_integer_data() {
        let values = DataValues::Int(vec![1, 2, 3]);
        assert!(matches!(
            compress(CodecId::TngPositions, &values, 1000.0, 3),
            Err(TngError::CodecMalformed(_))
        ));
    }

    #[test]
    fn bad_multiplier_rejected_by_every_quantizing_codec() {
        let values = DataValues::Float(vec![1.0, 2.0, 3.0]);
        for codec in [CodecId::Xtc, CodecId::TngPositions, CodecId::TngVelocities] {
            assert!(matches!(
                compress(codec, &values, 0.0, 3),
                Err(TngError::CodecMalformed(_))
            ));
        }
    }

    #[test]
    fn raw_length_mismatch_rejected() {
        assert!(matches!(
            raw_decode(DataType::Float, &[0_u8; 10], 3),
            Err(TngError::CodecMalformed(_))
        ));
    }
}
