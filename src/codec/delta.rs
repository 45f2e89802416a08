//! Frame-delta transform over quantized triplets. The first frame's
//! values pass through verbatim; every later value is stored as the
//! difference from the same particle component one stored frame
//! earlier. Under small time steps the differences cluster near 0,
//! which is what the entropy stages feed on.

use crate::TngError;

/// Forward transform. `row_len` is the number of values per stored
/// frame (particles × components).
pub(crate) fn encode(values: &[i64], row_len: usize) -> Result<Vec<i64>, TngError> {
    check_row_len(values.len(), row_len)?;
    let mut out = Vec::with_capacity(values.len());
    for (i, v) in values.iter().enumerate() {
        match i < row_len {
            true => out.push(*v),
            false => out.push(v.wrapping_sub(values[i - row_len])),
        }
    }
    Ok(out)
}

/// Inverse transform: running per-component sum.
pub(crate) fn decode(deltas: &[i64], row_len: usize) -> Result<Vec<i64>, TngError> {
    check_row_len(deltas.len(), row_len)?;
    let mut out: Vec<i64> = Vec::with_capacity(deltas.len());
    for (i, d) in deltas.iter().enumerate() {
        match i < row_len {
            true => out.push(*d),
            false => {
                let prev = out[i - row_len];
                out.push(prev.wrapping_add(*d));
            }
        }
    }
    Ok(out)
}

fn check_row_len(n_values: usize, row_len: usize) -> Result<(), TngError> {
    if row_len == 0 {
        return Err(TngError::CodecMalformed("delta row length is 0".into()));
    }
    if n_values % row_len != 0 {
        return Err(TngError::CodecMalformed(format!(
            "{n_values} values do not divide into rows of {row_len}"
        )));
    }
    Ok(())
}
