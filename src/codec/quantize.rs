//! Quantization: maps floating-point values to integers by a stored
//! multiplier, `q = round(v · multiplier)`. Lossy by design; the
//! round-trip error is bounded by `0.5 / multiplier` per component.

use crate::{
    block_types::{DataType, DataValues},
    TngError,
};

/// A quantizing codec demands a positive, finite multiplier.
pub(crate) fn check_multiplier(multiplier: f64) -> Result<(), TngError> {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Err(TngError::CodecMalformed(format!(
            "quantization multiplier must be positive, got {multiplier}"
        )));
    }
    Ok(())
}

/// Maps float values to quantized integers.
pub(crate) fn quantize(values: &DataValues, multiplier: f64) -> Result<Vec<i64>, TngError> {
    check_multiplier(multiplier)?;
    match values {
        DataValues::Float(v) => Ok(v
            .iter()
            .map(|x| (*x as f64 * multiplier).round() as i64)
            .collect()),
        DataValues::Double(v) => Ok(v.iter().map(|x| (x * multiplier).round() as i64).collect()),
        other => Err(TngError::CodecMalformed(format!(
            "quantizing codec applied to {:?} data",
            other.data_type()
        ))),
    }
}

/// Maps quantized integers back to float values of `data_type`.
pub(crate) fn dequantize(
    data_type: DataType,
    quantized: &[i64],
    multiplier: f64,
) -> Result<DataValues, TngError> {
    check_multiplier(multiplier)?;
    match data_type {
        DataType::Float => Ok(DataValues::Float(
            quantized.iter().map(|q| (*q as f64 / multiplier) as f32).collect(),
        )),
        DataType::Double => Ok(DataValues::Double(
            quantized.iter().map(|q| *q as f64 / multiplier).collect(),
        )),
        other => Err(TngError::CodecMalformed(format!(
            "quantizing codec applied to {other:?} data"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_error_is_bounded() {
        let multiplier = 1000.0;
        let original = vec![2.533_f32, 1.244, 3.506, -0.830, 0.0, 0.0005];
        let q = quantize(&DataValues::Float(original.clone()), multiplier).unwrap();
        let back = dequantize(DataType::Float, &q, multiplier).unwrap();
        let back = back.as_f32().unwrap();
        for (a, b) in original.iter().zip(back.iter()) {
            assert!((a - b).abs() as f64 <= 0.5 / multiplier, "{a} vs {b}");
        }
    }

    #[test]
    fn non_positive_multiplier_rejected() {
        let vals = DataValues::Float(vec![1.0]);
        assert!(matches!(
            quantize(&vals, 0.0),
            Err(TngError::CodecMalformed(_))
        ));
        assert!(matches!(
            quantize(&vals, -3.0),
            Err(TngError::CodecMalformed(_))
        ));
    }

    #[test]
    fn integer_data_rejected() {
        assert!(matches!(
            quantize(&DataValues::Int(vec![1, 2]), 10.0),
            Err(TngError::CodecMalformed(_))
        ));
    }
}
