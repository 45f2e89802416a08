//! Particle mapping block (id 6). Translates the dense in-block
//! particle index of a frame set's data blocks to the real particle
//! number of the trajectory. Required whenever a frame set stores a
//! subset of the particles or a non-identity ordering.

use binrw::{BinRead, BinWrite};

use crate::TngError;

/// Particle mapping block (id 6).
#[derive(Debug, Clone, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct ParticleMapping {
    /// Dense index of the first particle covered by this mapping.
    pub num_first_particle: i64,
    /// Number of particles covered.
    pub n_particles: i64,
    /// Real particle number for each covered dense index.
    #[br(count = n_particles)]
    pub real_particle_numbers: Vec<i64>,
}

impl ParticleMapping {
    pub fn new(num_first_particle: i64, real_particle_numbers: Vec<i64>) -> Self {
        Self {
            num_first_particle,
            n_particles: real_particle_numbers.len() as i64,
            real_particle_numbers,
        }
    }

    pub fn len(&self) -> usize {
        self.real_particle_numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.real_particle_numbers.is_empty()
    }

    /// Dense index range covered by this mapping,
    /// as `(first, one-past-last)`.
    pub fn dense_range(&self) -> (i64, i64) {
        (
            self.num_first_particle,
            self.num_first_particle + self.n_particles,
        )
    }

    /// Real particle number for dense index `dense`,
    /// if covered by this mapping.
    pub fn real(&self, dense: i64) -> Option<i64> {
        if dense < self.num_first_particle {
            return None;
        }
        self.real_particle_numbers
            .get((dense - self.num_first_particle) as usize)
            .copied()
    }

    pub(crate) fn validate(&self) -> Result<(), TngError> {
        if self.n_particles as usize != self.real_particle_numbers.len() {
            return Err(TngError::SchemaMismatch(format!(
                "mapping declares {} particles but lists {}",
                self.n_particles,
                self.real_particle_numbers.len()
            )));
        }
        if self.num_first_particle < 0 {
            return Err(TngError::SchemaMismatch(format!(
                "negative first particle {}",
                self.num_first_particle
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::{BinRead, BinWrite};
    use std::io::Cursor;

    #[test]
    fn round_trip_and_lookup() {
        let mapping = ParticleMapping::new(3, vec![9, 8, 7]);
        let mut out = Cursor::new(Vec::new());
        mapping.write(&mut out).unwrap();
        let decoded = ParticleMapping::read(&mut Cursor::new(out.into_inner())).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded.dense_range(), (3, 6));
        assert_eq!(decoded.real(3), Some(9));
        assert_eq!(decoded.real(5), Some(7));
        assert_eq!(decoded.real(2), None);
        assert_eq!(decoded.real(6), None);
        assert!(decoded.validate().is_ok());
    }
}
