//! Entropy coding of integer residual streams. A leading tag byte
//! selects the sub-codec:
//!
//! - `0`: canonical Huffman. The code table is serialized as
//!   `(symbol, code_length)` pairs ahead of an MSB-first bit stream;
//!   decoding uses a bounded per-length canonical lookup.
//! - `1`: integer dictionary. When the residual alphabet is small
//!   and the direct form is shorter, the block stores the distinct
//!   symbols and one index byte per value.
//! - `2`: single-symbol stream (an alphabet of one has no code).
//!
//! The encoder picks whichever form is smaller for the block at hand.

use std::collections::{BinaryHeap, HashMap};

use crate::TngError;

const TAG_HUFFMAN: u8 = 0;
const TAG_DICT: u8 = 1;
const TAG_SINGLE: u8 = 2;

const MAX_CODE_LEN: usize = 64;

/// Encodes `symbols` into a tagged payload.
pub(crate) fn encode(symbols: &[u64]) -> Result<Vec<u8>, TngError> {
    if symbols.is_empty() {
        let mut buf = vec![TAG_HUFFMAN];
        buf.extend_from_slice(&0_u32.to_le_bytes());
        buf.extend_from_slice(&0_u64.to_le_bytes());
        return Ok(buf);
    }

    let mut freqs: HashMap<u64, u64> = HashMap::new();
    for s in symbols {
        *freqs.entry(*s).or_insert(0) += 1;
    }

    if freqs.len() == 1 {
        let mut buf = vec![TAG_SINGLE];
        buf.extend_from_slice(&symbols[0].to_le_bytes());
        buf.extend_from_slice(&(symbols.len() as u64).to_le_bytes());
        return Ok(buf);
    }

    let mut freq_pairs: Vec<(u64, u64)> = freqs.into_iter().collect();
    freq_pairs.sort_unstable();
    let lengths = code_lengths(&freq_pairs)?;
    let canonical = canonical_codes(&lengths)?;

    let len_of: HashMap<u64, (u8, u64)> = canonical
        .iter()
        .map(|(sym, len, code)| (*sym, (*len, *code)))
        .collect();

    let huff_bits: u64 = freq_pairs
        .iter()
        .map(|(sym, count)| count * len_of[sym].0 as u64)
        .sum();
    let n_distinct = canonical.len();
    let huff_size = 1 + 4 + 9 * n_distinct as u64 + 8 + (huff_bits + 7) / 8;
    let dict_size = 1 + 4 + 8 * n_distinct as u64 + 8 + symbols.len() as u64;

    if n_distinct <= 256 && dict_size < huff_size {
        return encode_dict(symbols, &freq_pairs);
    }

    let mut buf = Vec::with_capacity(huff_size as usize);
    buf.push(TAG_HUFFMAN);
    buf.extend_from_slice(&(n_distinct as u32).to_le_bytes());
    for (sym, len, _) in &canonical {
        buf.extend_from_slice(&sym.to_le_bytes());
        buf.push(*len);
    }
    buf.extend_from_slice(&(symbols.len() as u64).to_le_bytes());

    let mut bits = BitWriter::new();
    for s in symbols {
        let (len, code) = len_of[s];
        bits.push(code, len);
    }
    buf.extend_from_slice(&bits.finish());
    Ok(buf)
}

/// Decodes a tagged payload produced by [`encode`]. `max_symbols`
/// bounds the declared symbol count against the caller's knowledge
/// of the output length, so corrupt counts fail early.
pub(crate) fn decode(payload: &[u8], max_symbols: usize) -> Result<Vec<u64>, TngError> {
    let mut rdr = ByteReader::new(payload);
    match rdr.u8()? {
        TAG_HUFFMAN => decode_huffman(&mut rdr, max_symbols),
        TAG_DICT => decode_dict(&mut rdr, max_symbols),
        TAG_SINGLE => {
            let symbol = rdr.u64_le()?;
            let count = rdr.u64_le()? as usize;
            if count > max_symbols {
                return Err(TngError::CodecMalformed(format!(
                    "single-symbol stream declares {count} values, at most {max_symbols} expected"
                )));
            }
            Ok(vec![symbol; count])
        }
        tag => Err(TngError::CodecMalformed(format!(
            "unknown entropy sub-codec tag {tag}"
        ))),
    }
}

fn encode_dict(symbols: &[u64], freq_pairs: &[(u64, u64)]) -> Result<Vec<u8>, TngError> {
    let index_of: HashMap<u64, u8> = freq_pairs
        .iter()
        .enumerate()
        .map(|(i, (sym, _))| (*sym, i as u8))
        .collect();

    let mut buf = Vec::with_capacity(13 + 8 * freq_pairs.len() + symbols.len());
    buf.push(TAG_DICT);
    buf.extend_from_slice(&(freq_pairs.len() as u32).to_le_bytes());
    for (sym, _) in freq_pairs {
        buf.extend_from_slice(&sym.to_le_bytes());
    }
    buf.extend_from_slice(&(symbols.len() as u64).to_le_bytes());
    for s in symbols {
        buf.push(index_of[s]);
    }
    Ok(buf)
}

fn decode_dict(rdr: &mut ByteReader, max_symbols: usize) -> Result<Vec<u64>, TngError> {
    let n_dict = rdr.u32_le()? as usize;
    if n_dict > 256 {
        return Err(TngError::CodecMalformed(format!(
            "dictionary with {n_dict} entries exceeds the one-byte index space"
        )));
    }
    let mut dict = Vec::with_capacity(n_dict);
    for _ in 0..n_dict {
        dict.push(rdr.u64_le()?);
    }
    let n_symbols = rdr.u64_le()? as usize;
    if n_symbols > max_symbols {
        return Err(TngError::CodecMalformed(format!(
            "dictionary stream declares {n_symbols} values, at most {max_symbols} expected"
        )));
    }
    let mut out = Vec::with_capacity(n_symbols);
    for _ in 0..n_symbols {
        let idx = rdr.u8()? as usize;
        match dict.get(idx) {
            Some(sym) => out.push(*sym),
            None => {
                return Err(TngError::CodecMalformed(format!(
                    "dictionary index {idx} out of range for {n_dict} entries"
                )))
            }
        }
    }
    Ok(out)
}

fn decode_huffman(rdr: &mut ByteReader, max_symbols: usize) -> Result<Vec<u64>, TngError> {
    let n_distinct = rdr.u32_le()? as usize;
    let mut lengths = Vec::with_capacity(n_distinct);
    for _ in 0..n_distinct {
        let sym = rdr.u64_le()?;
        let len = rdr.u8()?;
        if len == 0 || len as usize > MAX_CODE_LEN {
            return Err(TngError::CodecMalformed(format!(
                "code length {len} outside 1..=64"
            )));
        }
        lengths.push((sym, len));
    }
    let n_symbols = rdr.u64_le()? as usize;
    if n_symbols > max_symbols {
        return Err(TngError::CodecMalformed(format!(
            "bit stream declares {n_symbols} values, at most {max_symbols} expected"
        )));
    }
    if n_symbols == 0 {
        return Ok(Vec::new());
    }
    if n_distinct < 2 {
        return Err(TngError::CodecMalformed(
            "bit stream without a usable code table".into(),
        ));
    }

    let canonical = canonical_codes(&lengths)?;

    // Per-length canonical tables for bounded lookup:
    // first code, symbol count and offset into the canonical order.
    let max_len = canonical.iter().map(|(_, len, _)| *len as usize).max().unwrap_or(0);
    let mut first_code = vec![0_u64; max_len + 1];
    let mut count = vec![0_u64; max_len + 1];
    let mut offset = vec![0_usize; max_len + 1];
    let syms: Vec<u64> = canonical.iter().map(|(sym, _, _)| *sym).collect();
    for (i, (_, len, code)) in canonical.iter().enumerate() {
        let l = *len as usize;
        if count[l] == 0 {
            first_code[l] = *code;
            offset[l] = i;
        }
        count[l] += 1;
    }

    let mut bits = BitReader::new(rdr.rest());
    let mut out = Vec::with_capacity(n_symbols);
    for _ in 0..n_symbols {
        let mut code = 0_u64;
        let mut len = 0_usize;
        loop {
            code = (code << 1) | bits.read_bit()?;
            len += 1;
            if len > max_len {
                return Err(TngError::CodecMalformed(
                    "bit pattern resolves to no code".into(),
                ));
            }
            if count[len] > 0 && code >= first_code[len] && code - first_code[len] < count[len] {
                out.push(syms[offset[len] + (code - first_code[len]) as usize]);
                break;
            }
        }
    }
    Ok(out)
}

/// Huffman code lengths for `freqs` (symbol, count) via the usual
/// two-least-frequent merge. Requires at least two distinct symbols.
fn code_lengths(freqs: &[(u64, u64)]) -> Result<Vec<(u64, u8)>, TngError> {
    use std::cmp::Reverse;

    let n = freqs.len();
    let mut weight: Vec<u64> = freqs.iter().map(|(_, c)| *c).collect();
    let mut parent: Vec<Option<usize>> = vec![None; n];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> =
        (0..n).map(|i| Reverse((weight[i], i))).collect();

    while heap.len() > 1 {
        let (a, b) = match (heap.pop(), heap.pop()) {
            (Some(Reverse((_, a))), Some(Reverse((_, b)))) => (a, b),
            _ => break,
        };
        let merged = weight.len();
        weight.push(weight[a].saturating_add(weight[b]));
        parent.push(None);
        parent[a] = Some(merged);
        parent[b] = Some(merged);
        heap.push(Reverse((weight[merged], merged)));
    }

    let mut out = Vec::with_capacity(n);
    for (i, (sym, _)) in freqs.iter().enumerate() {
        let mut len = 0_usize;
        let mut node = i;
        while let Some(p) = parent[node] {
            node = p;
            len += 1;
            if len > MAX_CODE_LEN {
                return Err(TngError::CodecMalformed(
                    "code length exceeds 64 bits".into(),
                ));
            }
        }
        out.push((*sym, len as u8));
    }
    Ok(out)
}

/// Canonical code assignment over `(symbol, length)` pairs, sorted
/// by (length, symbol). Errors if the lengths oversubscribe the code
/// space (corrupt table).
fn canonical_codes(lengths: &[(u64, u8)]) -> Result<Vec<(u64, u8, u64)>, TngError> {
    let mut sorted = lengths.to_vec();
    sorted.sort_unstable_by(|a, b| (a.1, a.0).cmp(&(b.1, b.0)));

    let mut out = Vec::with_capacity(sorted.len());
    let mut code = 0_u64;
    let mut prev_len = 0_u8;
    for (i, (sym, len)) in sorted.iter().enumerate() {
        if i == 0 {
            code = 0;
        } else {
            code += 1;
            code <<= len - prev_len;
        }
        if (*len as usize) < MAX_CODE_LEN && code >> len != 0 {
            return Err(TngError::CodecMalformed(
                "code table oversubscribes the code space".into(),
            ));
        }
        out.push((*sym, *len, code));
        prev_len = *len;
    }
    Ok(out)
}

/// MSB-first bit accumulator.
struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    n_bits: u8,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            current: 0,
            n_bits: 0,
        }
    }

    fn push(&mut self, code: u64, len: u8) {
        for i in (0..len).rev() {
            let bit = ((code >> i) & 1) as u8;
            self.current = (self.current << 1) | bit;
            self.n_bits += 1;
            if self.n_bits == 8 {
                self.bytes.push(self.current);
                self.current = 0;
                self.n_bits = 0;
            }
        }
    }

    /// Pads the final partial byte with zero bits.
    fn finish(mut self) -> Vec<u8> {
        if self.n_bits > 0 {
            self.current <<= 8 - self.n_bits;
            self.bytes.push(self.current);
        }
        self.bytes
    }
}

/// MSB-first bit reader.
struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_bit(&mut self) -> Result<u64, TngError> {
        let byte = self.pos / 8;
        if byte >= self.data.len() {
            return Err(TngError::CodecMalformed("bit stream exhausted".into()));
        }
        let shift = 7 - (self.pos % 8);
        self.pos += 1;
        Ok(((self.data[byte] >> shift) & 1) as u64)
    }
}

/// Byte-level reader over a codec payload.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TngError> {
        if self.pos + n > self.data.len() {
            return Err(TngError::CodecMalformed(
                "entropy payload ends mid-field".into(),
            ));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, TngError> {
        Ok(self.take(1)?[0])
    }

    fn u32_le(&mut self) -> Result<u32, TngError> {
        let mut b = [0_u8; 4];
        b.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(b))
    }

    fn u64_le(&mut self) -> Result<u64, TngError> {
        let mut b = [0_u8; 8];
        b.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(b))
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_round_trip() {
        let payload = encode(&[]).unwrap();
        assert_eq!(decode(&payload, 0).unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn single_symbol_round_trip() {
        let symbols = vec![42_u64; 1000];
        let payload = encode(&symbols).unwrap();
        assert_eq!(payload[0], TAG_SINGLE);
        assert_eq!(payload.len(), 17);
        assert_eq!(decode(&payload, 1000).unwrap(), symbols);
    }

    #[test]
    fn skewed_alphabet_round_trip() {
        // residual-like distribution: mostly zeros, a few outliers
        let mut symbols = vec![0_u64; 500];
        symbols.extend([2, 4, 2, 6, 2, 8, 1_000_000, 4]);
        symbols.extend(vec![1_u64; 120]);
        let payload = encode(&symbols).unwrap();
        assert_eq!(payload[0], TAG_HUFFMAN);
        assert_eq!(decode(&payload, symbols.len()).unwrap(), symbols);
    }

    #[test]
    fn dictionary_chosen_for_short_wide_streams() {
        let symbols: Vec<u64> = (0..10).map(|i| i * 1000).collect();
        let payload = encode(&symbols).unwrap();
        assert_eq!(payload[0], TAG_DICT);
        assert_eq!(decode(&payload, symbols.len()).unwrap(), symbols);
    }

    #[test]
    fn two_symbol_round_trip() {
        let symbols = vec![7, 9, 7, 7, 9, 7, 7, 7, 9];
        let payload = encode(&symbols).unwrap();
        assert_eq!(decode(&payload, symbols.len()).unwrap(), symbols);
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(matches!(
            decode(&[99, 0, 0], 10),
            Err(TngError::CodecMalformed(_))
        ));
    }

    #[test]
    fn truncated_bit_stream_rejected() {
        let symbols = vec![0_u64, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3];
        let mut payload = encode(&symbols).unwrap();
        assert_eq!(payload[0], TAG_HUFFMAN);
        payload.truncate(payload.len() - 1);
        assert!(matches!(
            decode(&payload, symbols.len()),
            Err(TngError::CodecMalformed(_))
        ));
    }

    #[test]
    fn corrupt_declared_count_rejected() {
        let symbols = vec![5_u64; 20];
        let mut payload = encode(&symbols).unwrap();
        // inflate the count field of the single-symbol form
        payload[9..17].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(
            decode(&payload, 20),
            Err(TngError::CodecMalformed(_))
        ));
    }
}
