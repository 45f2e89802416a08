//! Run-length coding over zigzagged integer streams. Delta residuals
//! of near-frozen coordinates produce long zero runs; those collapse
//! to `[marker, length, symbol]` triples. Repetitions shorter than
//! `min_rle` pass through verbatim, except for literal occurrences of
//! the marker value itself, which are always escaped as a run.

use crate::TngError;

/// Literal marker preceding a `(length, symbol)` pair. `u64::MAX`
/// never occurs as a zigzagged delta of a quantized value.
pub(crate) const MARKER: u64 = u64::MAX;

pub(crate) fn encode(values: &[u64], min_rle: usize) -> Vec<u64> {
    let mut out = Vec::with_capacity(values.len());
    let mut i = 0;
    while i < values.len() {
        let symbol = values[i];
        let mut run = 1;
        while i + run < values.len() && values[i + run] == symbol {
            run += 1;
        }
        if run >= min_rle || symbol == MARKER {
            out.push(MARKER);
            out.push(run as u64);
            out.push(symbol);
        } else {
            out.extend(std::iter::repeat(symbol).take(run));
        }
        i += run;
    }
    out
}

/// Expands a run-length stream into exactly `n_values` values.
pub(crate) fn decode(rle: &[u64], n_values: usize) -> Result<Vec<u64>, TngError> {
    let mut out = Vec::with_capacity(n_values);
    let mut i = 0;
    while i < rle.len() {
        if rle[i] == MARKER {
            if i + 2 >= rle.len() {
                return Err(TngError::CodecMalformed(
                    "run marker without length and symbol".into(),
                ));
            }
            let run = rle[i + 1] as usize;
            let symbol = rle[i + 2];
            if out.len() + run > n_values {
                return Err(TngError::RleOverrun {
                    have: out.len() + run,
                    max: n_values,
                });
            }
            out.extend(std::iter::repeat(symbol).take(run));
            i += 3;
        } else {
            if out.len() + 1 > n_values {
                return Err(TngError::RleOverrun {
                    have: out.len() + 1,
                    max: n_values,
                });
            }
            out.push(rle[i]);
            i += 1;
        }
    }
    if out.len() != n_values {
        return Err(TngError::CodecMalformed(format!(
            "run-length stream expanded to {} of {} declared values",
            out.len(),
            n_values
        )));
    }
    Ok(out)
}
