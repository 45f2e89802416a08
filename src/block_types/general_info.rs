//! General info block (id 1). Names the producing program and user,
//! carries the creation time, and anchors the frame-set index: the
//! file offsets of the first and last frame sets live here, as do the
//! frame-set sizing parameters used for long-stride navigation.

use std::io::Cursor;

use binrw::BinReaderExt;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{consts::OFFSET_NONE, TngError};

use super::{read_string, write_string};

/// General info block (id 1).
#[derive(Debug, Clone)]
pub struct GeneralInfo {
    /// Name of the program that produced the trajectory.
    pub program_name: String,
    /// Forcefield used in the simulation.
    pub forcefield_name: String,
    /// Name of the user running the simulation.
    pub user_name: String,
    /// Name of the computer the simulation ran on.
    pub computer_name: String,
    /// PGP signature of the user creating the file.
    pub pgp_signature: String,
    /// Creation time, seconds since the Unix epoch.
    pub time: i64,
    /// Set if the particle count may vary between frame sets.
    pub var_num_atoms: bool,
    /// Target number of frames per frame set. Individual frame sets
    /// may hold fewer.
    pub frame_set_n_frames: i64,
    /// Number of frame sets one long-stride link skips.
    pub long_stride_length: i64,
    /// File offset of the first frame set, -1 if none written yet.
    pub first_frame_set_offset: i64,
    /// File offset of the last frame set, -1 if none written yet.
    pub last_frame_set_offset: i64,
}

impl Default for GeneralInfo {
    fn default() -> Self {
        Self {
            program_name: String::new(),
            forcefield_name: String::new(),
            user_name: String::new(),
            computer_name: String::new(),
            pgp_signature: String::new(),
            time: 0,
            var_num_atoms: false,
            frame_set_n_frames: 100,
            long_stride_length: 100,
            first_frame_set_offset: OFFSET_NONE,
            last_frame_set_offset: OFFSET_NONE,
        }
    }
}

impl GeneralInfo {
    /// Creation time as a UTC datetime.
    pub fn creation_time(&self) -> Result<OffsetDateTime, TngError> {
        OffsetDateTime::from_unix_timestamp(self.time)
            .map_err(|_| TngError::SchemaMismatch(format!("creation time {} out of range", self.time)))
    }

    /// Creation time formatted as RFC 3339.
    pub fn creation_time_str(&self) -> Result<String, TngError> {
        self.creation_time()?
            .format(&Rfc3339)
            .map_err(|_| TngError::SchemaMismatch("creation time not formattable".into()))
    }

    pub(crate) fn decode(crs: &mut Cursor<Vec<u8>>, max_str_len: u64) -> Result<Self, TngError> {
        let program_name = read_string(crs, max_str_len)?;
        let forcefield_name = read_string(crs, max_str_len)?;
        let user_name = read_string(crs, max_str_len)?;
        let computer_name = read_string(crs, max_str_len)?;
        let pgp_signature = read_string(crs, max_str_len)?;
        let time = crs.read_le::<i64>()?;
        let var_num_atoms = crs.read_le::<u8>()? != 0;
        let frame_set_n_frames = crs.read_le::<i64>()?;
        let long_stride_length = crs.read_le::<i64>()?;
        let first_frame_set_offset = crs.read_le::<i64>()?;
        let last_frame_set_offset = crs.read_le::<i64>()?;

        if frame_set_n_frames <= 0 {
            return Err(TngError::SchemaMismatch(format!(
                "frame_set_n_frames must be positive, got {frame_set_n_frames}"
            )));
        }
        if long_stride_length <= 0 {
            return Err(TngError::SchemaMismatch(format!(
                "long_stride_length must be positive, got {long_stride_length}"
            )));
        }

        Ok(Self {
            program_name,
            forcefield_name,
            user_name,
            computer_name,
            pgp_signature,
            time,
            var_num_atoms,
            frame_set_n_frames,
            long_stride_length,
            first_frame_set_offset,
            last_frame_set_offset,
        })
    }

    /// Serializes the block payload. The two frame-set offsets sit at
    /// fixed positions from the end, so the writer can patch them
    /// without resizing the block.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_string(&mut buf, &self.program_name);
        write_string(&mut buf, &self.forcefield_name);
        write_string(&mut buf, &self.user_name);
        write_string(&mut buf, &self.computer_name);
        write_string(&mut buf, &self.pgp_signature);
        buf.extend_from_slice(&self.time.to_le_bytes());
        buf.push(self.var_num_atoms as u8);
        buf.extend_from_slice(&self.frame_set_n_frames.to_le_bytes());
        buf.extend_from_slice(&self.long_stride_length.to_le_bytes());
        buf.extend_from_slice(&self.first_frame_set_offset.to_le_bytes());
        buf.extend_from_slice(&self.last_frame_set_offset.to_le_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let info = GeneralInfo {
            program_name: "mdrun".into(),
            forcefield_name: "oplsaa".into(),
            user_name: "tester".into(),
            computer_name: "node-07".into(),
            pgp_signature: String::new(),
            time: 1_700_000_000,
            var_num_atoms: false,
            frame_set_n_frames: 5000,
            long_stride_length: 100,
            first_frame_set_offset: 1234,
            last_frame_set_offset: 99999,
        };
        let mut crs = Cursor::new(info.encode());
        let decoded = GeneralInfo::decode(&mut crs, 1024).unwrap();
        assert_eq!(decoded.program_name, "mdrun");
        assert_eq!(decoded.frame_set_n_frames, 5000);
        assert_eq!(decoded.last_frame_set_offset, 99999);
        assert!(!decoded.var_num_atoms);
        assert!(decoded.creation_time_str().unwrap().starts_with("2023-11-14"));
    }

    #[test]
    fn zero_frame_set_size_rejected() {
        let mut info = GeneralInfo::default();
        info.frame_set_n_frames = 0;
        let mut crs = Cursor::new(info.encode());
        assert!(matches!(
            GeneralInfo::decode(&mut crs, 1024),
            Err(TngError::SchemaMismatch(_))
        ));
    }
}
