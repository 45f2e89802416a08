//! Frame-set header block (id 4). Declares the contiguous frame range
//! `[first_frame, first_frame + n_frames)` the set covers and links
//! the set into the doubly-linked index: short links to the adjacent
//! sets and long-stride links skipping `long_stride_length` sets.

use std::io::Cursor;

use binrw::BinReaderExt;

use crate::{consts::OFFSET_NONE, TngError};

/// Frame-set header block (id 4). All offsets are absolute file
/// positions; `-1` means "no such neighbour".
#[derive(Debug, Clone)]
pub struct FrameSetHeader {
    /// First global frame of this set.
    pub first_frame: i64,
    /// Number of frames in this set.
    pub n_frames: i64,
    /// Particle count of this set; 0 means the constant, file-global
    /// count applies.
    pub n_particles: i64,
    /// Instance count per molecule type. Only present when the file
    /// declares a variable atom count.
    pub molecule_cnt_list: Vec<i64>,
    pub next: i64,
    pub prev: i64,
    /// Offset of the set one long stride ahead.
    pub long_next: i64,
    /// Offset of the set one long stride behind.
    pub long_prev: i64,
}

impl FrameSetHeader {
    pub fn new(first_frame: i64, n_frames: i64) -> Self {
        Self {
            first_frame,
            n_frames,
            n_particles: 0,
            molecule_cnt_list: Vec::new(),
            next: OFFSET_NONE,
            prev: OFFSET_NONE,
            long_next: OFFSET_NONE,
            long_prev: OFFSET_NONE,
        }
    }

    /// Last global frame of this set (inclusive).
    pub fn last_frame(&self) -> i64 {
        self.first_frame + self.n_frames - 1
    }

    /// `true` if global frame `frame` falls within this set.
    pub fn contains(&self, frame: i64) -> bool {
        self.first_frame <= frame && frame < self.first_frame + self.n_frames
    }

    pub(crate) fn decode(crs: &mut Cursor<Vec<u8>>) -> Result<Self, TngError> {
        let first_frame = crs.read_le::<i64>()?;
        let n_frames = crs.read_le::<i64>()?;
        let n_particles = crs.read_le::<i64>()?;
        let n_cnts = crs.read_le::<i64>()?;
        if n_cnts < 0 {
            return Err(TngError::SchemaMismatch(format!(
                "negative molecule count list length {n_cnts}"
            )));
        }
        let mut molecule_cnt_list = Vec::with_capacity(n_cnts as usize);
        for _ in 0..n_cnts {
            molecule_cnt_list.push(crs.read_le::<i64>()?);
        }
        let next = crs.read_le::<i64>()?;
        let prev = crs.read_le::<i64>()?;
        let long_next = crs.read_le::<i64>()?;
        let long_prev = crs.read_le::<i64>()?;

        if n_frames <= 0 {
            return Err(TngError::SchemaMismatch(format!(
                "frame set must hold at least one frame, got {n_frames}"
            )));
        }
        if first_frame < 0 {
            return Err(TngError::SchemaMismatch(format!(
                "negative first frame {first_frame}"
            )));
        }

        Ok(Self {
            first_frame,
            n_frames,
            n_particles,
            molecule_cnt_list,
            next,
            prev,
            long_next,
            long_prev,
        })
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.first_frame.to_le_bytes());
        buf.extend_from_slice(&self.n_frames.to_le_bytes());
        buf.extend_from_slice(&self.n_particles.to_le_bytes());
        buf.extend_from_slice(&(self.molecule_cnt_list.len() as i64).to_le_bytes());
        for cnt in &self.molecule_cnt_list {
            buf.extend_from_slice(&cnt.to_le_bytes());
        }
        buf.extend_from_slice(&self.next.to_le_bytes());
        buf.extend_from_slice(&self.prev.to_le_bytes());
        buf.extend_from_slice(&self.long_next.to_le_bytes());
        buf.extend_from_slice(&self.long_prev.to_le_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_and_containment() {
        let mut header = FrameSetHeader::new(5000, 5000);
        header.next = 4096;
        header.prev = 128;
        let mut crs = Cursor::new(header.encode());
        let decoded = FrameSetHeader::decode(&mut crs).unwrap();
        assert_eq!(decoded.first_frame, 5000);
        assert_eq!(decoded.last_frame(), 9999);
        assert!(decoded.contains(5000));
        assert!(decoded.contains(9999));
        assert!(!decoded.contains(10000));
        assert!(!decoded.contains(4999));
        assert_eq!(decoded.next, 4096);
        assert_eq!(decoded.long_next, OFFSET_NONE);
    }

    #[test]
    fn empty_set_rejected() {
        let header = FrameSetHeader::new(0, 0);
        let mut crs = Cursor::new(header.encode());
        assert!(matches!(
            FrameSetHeader::decode(&mut crs),
            Err(TngError::SchemaMismatch(_))
        ));
    }
}
