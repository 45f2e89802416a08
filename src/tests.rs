#[cfg(test)]
mod tests {
    use crate::{
        block_types::{DataValues, GeneralInfo, Molecule, Molecules},
        codec::CodecId,
        frame::Kind,
        Status, Tng, TngError, TngWriter,
    };
    use std::{fs, path::PathBuf};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tngiter_{}_{}.tng", name, std::process::id()))
    }

    // ----------------------------------------------------------
    // Argon-like fixture: 1000 single-atom molecules, 5 frame
    // sets, compressed positions and an uncompressed box, both
    // stored every 5th frame.
    // ----------------------------------------------------------

    const ARGON_PARTICLES: usize = 1000;
    const ARGON_STRIDE: i64 = 5;
    const ARGON_MULTIPLIER: f64 = 1000.0;
    /// (first_frame, n_frames) per frame set; 21 frames total.
    const ARGON_SETS: [(i64, i64); 5] = [(0, 5), (5, 5), (10, 5), (15, 5), (20, 1)];

    fn argon_position(frame: i64, particle: usize, component: usize) -> f32 {
        let cell = (particle % 36) as f32 * 0.1;
        let drift = frame as f32 * 0.0002 * ((particle % 7) as f32 - 3.0);
        cell + drift + component as f32 * 0.01
    }

    fn argon_box(frame: i64) -> Vec<f32> {
        let edge = 3.6014 - 0.0001 * frame as f32;
        vec![edge, 0.0, 0.0, 0.0, edge, 0.0, 0.0, 0.0, edge]
    }

    fn build_argon(path: &PathBuf) {
        let mut molecule = Molecule::new(0, "Argon");
        molecule.add_chain(0, "A").unwrap();
        molecule.add_residue(0, "AR").unwrap();
        molecule.add_atom(0, "AR", "Ar").unwrap();
        let molecules = Molecules::new(vec![molecule], vec![ARGON_PARTICLES as i64]).unwrap();

        let mut info = GeneralInfo::default();
        info.program_name = "tngiter test suite".into();
        info.user_name = "ci".into();
        info.time = 1_600_000_000;
        info.frame_set_n_frames = 5;
        info.long_stride_length = 2;

        let mut writer = TngWriter::create(path, info, molecules).unwrap();
        for (first, n_frames) in ARGON_SETS {
            writer.new_frame_set(first, n_frames).unwrap();
            // one stored frame per set at the stride grid point
            let mut positions = Vec::with_capacity(ARGON_PARTICLES * 3);
            for particle in 0..ARGON_PARTICLES {
                for component in 0..3 {
                    positions.push(argon_position(first, particle, component));
                }
            }
            writer
                .add_particle_data(
                    Kind::Positions,
                    DataValues::Float(positions),
                    3,
                    ARGON_STRIDE,
                    CodecId::TngPositions,
                    ARGON_MULTIPLIER,
                )
                .unwrap();
            writer
                .add_data(
                    Kind::BoxShape,
                    DataValues::Float(argon_box(first)),
                    9,
                    ARGON_STRIDE,
                    CodecId::Uncompressed,
                    1.0,
                )
                .unwrap();
        }
        writer.finish(true).unwrap();
    }

    /// Quantization round-trip bound plus a little slack for the
    /// f32 → f64 → f32 conversions around it.
    const ARGON_TOL: f32 = (0.5 / ARGON_MULTIPLIER as f32) * 1.01;

    #[test]
    fn argon_open_and_metadata() {
        let path = temp_path("argon_meta");
        build_argon(&path);

        let tng = Tng::new(&path).unwrap();
        assert_eq!(tng.num_particles(), 1000);
        assert_eq!(tng.num_frames(), 21);
        assert_eq!(tng.num_molecule_types(), 1);
        assert_eq!(tng.num_molecules(), 1000);
        assert!(tng.find_molecule("Argon").is_some());
        assert!(tng.find_molecule("Water").is_none());
        assert_eq!(tng.block_name(10001), "POSITIONS");
        assert!(tng.creation_time_str().unwrap().starts_with("2020-09-13"));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn argon_box_shape_read() {
        let path = temp_path("argon_box");
        build_argon(&path);

        let mut tng = Tng::new(&path).unwrap();
        let data = tng.read_all(Kind::BoxShape).unwrap();
        assert_eq!(data.stride_length, ARGON_STRIDE);
        assert_eq!(data.n_frames_read, 5);
        assert_eq!(data.n_particles, 0);
        assert_eq!(data.len(), 45);

        let values = data.as_f32().unwrap();
        for (i, expected) in argon_box(0).iter().enumerate() {
            assert_eq!(values[i], *expected);
        }
        // last returned row, analogous to indexing the buffer at
        // (n_rows * 9) - 9
        let last = &values[values.len() - 9..];
        for (got, expected) in last.iter().zip(argon_box(20).iter()) {
            assert_eq!(got, expected);
        }

        fs::remove_file(&path).ok();
    }

    #[test]
    fn argon_positions_read_all() {
        let path = temp_path("argon_pos");
        build_argon(&path);

        let mut tng = Tng::new(&path).unwrap();
        let data = tng.read_all(Kind::Positions).unwrap();
        assert_eq!(data.stride_length, ARGON_STRIDE);
        assert_eq!(data.n_frames_read, 5);
        assert_eq!(data.n_particles, 1000);
        assert_eq!(data.len(), 5 * 1000 * 3);

        let values = data.as_f32().unwrap();
        // first 30 values of frame 0
        for particle in 0..10 {
            for component in 0..3 {
                let got = values[particle * 3 + component];
                let expected = argon_position(0, particle, component);
                assert!((got - expected).abs() <= ARGON_TOL, "{got} vs {expected}");
            }
        }
        // last 10 particles of the last stored frame (global frame 20)
        let base = 4 * 1000 * 3;
        for particle in 990..1000 {
            for component in 0..3 {
                let got = values[base + particle * 3 + component];
                let expected = argon_position(20, particle, component);
                assert!((got - expected).abs() <= ARGON_TOL, "{got} vs {expected}");
            }
        }

        fs::remove_file(&path).ok();
    }

    #[test]
    fn argon_positions_range_reads() {
        let path = temp_path("argon_range");
        build_argon(&path);

        let mut tng = Tng::new(&path).unwrap();

        // exactly one stored frame
        let data = tng.read_range(Kind::Positions, 5, 5).unwrap();
        assert_eq!(data.n_frames_read, 1);
        assert_eq!(data.first_frame_read, 5);
        let values = data.as_f32().unwrap();
        let expected = argon_position(5, 0, 0);
        assert!((values[0] - expected).abs() <= ARGON_TOL);

        // irregular bounds spanning three frame sets
        let data = tng.read_range(Kind::Positions, 3, 17).unwrap();
        assert_eq!(data.n_frames_read, 3);
        assert_eq!(data.first_frame_read, 5);

        // end clamped to the trajectory
        let data = tng.read_range(Kind::Positions, 0, 10_000).unwrap();
        assert_eq!(data.n_frames_read, 5);

        // start past the end
        assert!(matches!(
            tng.read_range(Kind::Positions, 21, 30),
            Err(TngError::FrameOutOfRange { .. })
        ));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn argon_absent_kinds_are_recoverable() {
        let path = temp_path("argon_absent");
        build_argon(&path);

        let mut tng = Tng::new(&path).unwrap();
        for kind in [Kind::Velocities, Kind::Forces] {
            let err = tng.read_all(kind).unwrap_err();
            assert!(matches!(err, TngError::NotPresent(_)), "{err}");
            assert_eq!(err.status(), Status::Failure);
        }
        // the handle survives recoverable failures
        assert!(tng.read_all(Kind::Positions).is_ok());

        fs::remove_file(&path).ok();
    }

    #[test]
    fn argon_unaligned_range_fails_but_reports_stride() {
        let path = temp_path("argon_unaligned");
        build_argon(&path);

        let mut tng = Tng::new(&path).unwrap();
        let err = tng.read_range(Kind::Positions, 1, 1).unwrap_err();
        match err {
            TngError::NoDataInRange { stride_length, .. } => {
                assert_eq!(stride_length, ARGON_STRIDE)
            }
            other => panic!("expected NoDataInRange, got {other}"),
        }
        assert_eq!(tng.stride(Kind::Positions).unwrap(), ARGON_STRIDE);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn argon_frame_set_invariants() {
        let path = temp_path("argon_sets");
        build_argon(&path);

        let mut tng = Tng::new(&path).unwrap();
        let headers = tng.frame_set_headers().unwrap();
        assert_eq!(headers.len(), 5);
        // frame counts over all sets sum to the trajectory length
        let total: i64 = headers.iter().map(|h| h.n_frames).sum();
        assert_eq!(total, tng.num_frames());
        // long-stride links skip two sets in both directions:
        // set 0 links forward to set 2, whose offset is also what
        // set 1's short link points at
        assert_ne!(headers[0].long_next, -1);
        assert_eq!(headers[0].long_next, headers[1].next);
        assert_eq!(headers[4].long_prev, headers[1].next);
        assert_eq!(headers[0].prev, -1);
        assert_eq!(headers[0].long_prev, -1);
        assert_eq!(headers[4].next, -1);
        assert_eq!(headers[4].long_next, -1);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn argon_backward_navigation_after_full_read() {
        let path = temp_path("argon_backward");
        build_argon(&path);

        let mut tng = Tng::new(&path).unwrap();
        // leaves the last frame set loaded
        tng.read_all(Kind::Positions).unwrap();
        // walks back through prev/long_prev links
        let data = tng.read_range(Kind::Positions, 0, 0).unwrap();
        assert_eq!(data.n_frames_read, 1);
        assert_eq!(data.first_frame_read, 0);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn argon_block_iteration() {
        let path = temp_path("argon_iter");
        build_argon(&path);

        let mut tng = Tng::new(&path).unwrap();
        tng.reset().unwrap();
        let headers: Vec<_> = tng.into_iter().collect();
        // 4 leading blocks, then header + toc + 2 data blocks per set
        assert_eq!(headers.len(), 4 + 4 * 5);
        assert_eq!(headers[0].id(), 0);
        assert_eq!(headers.iter().filter(|h| h.id() == 4).count(), 5);
        assert_eq!(headers.iter().filter(|h| h.id() == 10001).count(), 5);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn argon_payload_corruption_is_critical() {
        let path = temp_path("argon_corrupt");
        build_argon(&path);

        // find the molecules payload, then flip one byte in it
        let molecules_offset = {
            let tng = Tng::new(&path).unwrap();
            let header = tng
                .block_table()
                .iter()
                .find(|h| h.id() == 2)
                .unwrap()
                .clone();
            header.data_offset()
        };
        let mut bytes = fs::read(&path).unwrap();
        bytes[molecules_offset as usize + 8] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let err = match Tng::new(&path) {
            Err(err) => err,
            Ok(_) => panic!("corrupted file should not open"),
        };
        assert!(matches!(err, TngError::HashMismatch { .. }), "{err}");
        assert_eq!(err.status(), Status::Critical);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn writer_rejects_misuse() {
        let path = temp_path("writer_misuse");
        let molecules = Molecules::new(Vec::new(), Vec::new()).unwrap();
        let mut writer = TngWriter::create(&path, GeneralInfo::default(), molecules).unwrap();

        // data before any frame set
        assert!(matches!(
            writer.add_data(
                Kind::BoxShape,
                DataValues::Float(vec![0.0; 9]),
                9,
                1,
                CodecId::Uncompressed,
                1.0
            ),
            Err(TngError::InvariantBroken(_))
        ));

        // overlapping frame sets
        writer.new_frame_set(0, 5).unwrap();
        assert!(matches!(
            writer.new_frame_set(3, 5),
            Err(TngError::InvariantBroken(_))
        ));

        fs::remove_file(&path).ok();
    }

    // ----------------------------------------------------------
    // Water-like fixture: 5 three-atom molecules, positions plus
    // uncompressed-precision velocities and forces, one stored
    // frame per frame (stride 1), reversed particle mapping.
    // ----------------------------------------------------------

    const WATER_PARTICLES: usize = 15;
    /// Bounds the velocity round-trip error to 5e-6, half the
    /// asserted tolerance.
    const WATER_VEL_MULTIPLIER: f64 = 100_000.0;
    /// Bounds the force round-trip error to 5e-3, half the
    /// asserted tolerance.
    const WATER_FORCE_MULTIPLIER: f64 = 100.0;

    fn water_position(frame: i64, particle: usize, component: usize) -> f32 {
        (particle as f32 * 0.19 + component as f32 * 0.07) + frame as f32 * 0.003
    }

    fn water_velocity(frame: i64, particle: usize, component: usize) -> f32 {
        ((particle * 3 + component) as f32 * 0.01 - 0.2) * (1.0 + frame as f32 * 0.1)
    }

    fn water_force(frame: i64, particle: usize, component: usize) -> f32 {
        ((particle * 3 + component) as f32 * 31.0 - 700.0) - frame as f32 * 13.0
    }

    fn build_water(path: &PathBuf) {
        let mut molecule = Molecule::new(0, "water");
        molecule.add_chain(0, "W").unwrap();
        molecule.add_residue(0, "SOL").unwrap();
        molecule.add_atom(0, "O", "O").unwrap();
        molecule.add_atom(1, "HO1", "H").unwrap();
        molecule.add_atom(2, "HO2", "H").unwrap();
        molecule.add_bond(0, 1);
        molecule.add_bond(0, 2);
        let molecules = Molecules::new(vec![molecule], vec![5]).unwrap();

        let mut info = GeneralInfo::default();
        info.program_name = "tngiter test suite".into();
        info.time = 1_600_000_000;
        info.frame_set_n_frames = 2;
        info.long_stride_length = 100;

        let mut writer = TngWriter::create(path, info, molecules).unwrap();
        for (first, n_frames) in [(0_i64, 2_i64), (2, 2)] {
            writer.new_frame_set(first, n_frames).unwrap();
            // dense index runs in reverse of the real particle order
            writer
                .add_mapping(0, (0..WATER_PARTICLES as i64).rev().collect())
                .unwrap();

            let mut positions = Vec::new();
            let mut velocities = Vec::new();
            let mut forces = Vec::new();
            for frame in first..first + n_frames {
                for dense in 0..WATER_PARTICLES {
                    for component in 0..3 {
                        positions.push(water_position(frame, dense, component));
                        velocities.push(water_velocity(frame, dense, component));
                        forces.push(water_force(frame, dense, component));
                    }
                }
            }
            writer
                .add_particle_data(
                    Kind::Positions,
                    DataValues::Float(positions),
                    3,
                    1,
                    CodecId::Uncompressed,
                    1.0,
                )
                .unwrap();
            writer
                .add_particle_data(
                    Kind::Velocities,
                    DataValues::Float(velocities),
                    3,
                    1,
                    CodecId::TngVelocities,
                    WATER_VEL_MULTIPLIER,
                )
                .unwrap();
            writer
                .add_particle_data(
                    Kind::Forces,
                    DataValues::Float(forces),
                    3,
                    1,
                    CodecId::TngForces,
                    WATER_FORCE_MULTIPLIER,
                )
                .unwrap();
        }
        writer.finish(false).unwrap();
    }

    #[test]
    fn water_open_and_metadata() {
        let path = temp_path("water_meta");
        build_water(&path);

        let tng = Tng::new(&path).unwrap();
        assert_eq!(tng.num_particles(), 15);
        assert_eq!(tng.num_frames(), 4);
        assert_eq!(tng.num_molecule_types(), 1);
        assert_eq!(tng.num_molecules(), 5);
        assert!(tng.find_molecule("water").is_some());

        fs::remove_file(&path).ok();
    }

    #[test]
    fn water_vels_and_forces_decode_in_real_order() {
        let path = temp_path("water_vf");
        build_water(&path);

        let mut tng = Tng::new(&path).unwrap();

        // positions are uncompressed, so mapping application is
        // checked with exact equality: real particle r was written
        // at dense index 14 - r
        let data = tng.read_all(Kind::Positions).unwrap();
        assert_eq!(data.stride_length, 1);
        assert_eq!(data.n_frames_read, 4);
        let values = data.as_f32().unwrap();
        for frame in 0..4_i64 {
            let base = frame as usize * WATER_PARTICLES * 3;
            for real in 0..WATER_PARTICLES {
                let dense = WATER_PARTICLES - 1 - real;
                for component in 0..3 {
                    assert_eq!(
                        values[base + real * 3 + component],
                        water_position(frame, dense, component)
                    );
                }
            }
        }

        let vels = tng.read_all(Kind::Velocities).unwrap();
        let values = vels.as_f32().unwrap();
        for frame in 0..4_i64 {
            let base = frame as usize * WATER_PARTICLES * 3;
            for real in 0..WATER_PARTICLES {
                let dense = WATER_PARTICLES - 1 - real;
                for component in 0..3 {
                    let got = values[base + real * 3 + component];
                    let expected = water_velocity(frame, dense, component);
                    assert!((got - expected).abs() <= 1e-5, "{got} vs {expected}");
                }
            }
        }

        let forces = tng.read_all(Kind::Forces).unwrap();
        let values = forces.as_f32().unwrap();
        for frame in 0..4_i64 {
            let base = frame as usize * WATER_PARTICLES * 3;
            for real in 0..WATER_PARTICLES {
                let dense = WATER_PARTICLES - 1 - real;
                for component in 0..3 {
                    let got = values[base + real * 3 + component];
                    let expected = water_force(frame, dense, component);
                    assert!((got - expected).abs() <= 1e-2, "{got} vs {expected}");
                }
            }
        }

        fs::remove_file(&path).ok();
    }

    #[test]
    fn water_stride_and_single_frame_rows() {
        let path = temp_path("water_rows");
        build_water(&path);

        let mut tng = Tng::new(&path).unwrap();
        assert_eq!(tng.stride(Kind::Velocities).unwrap(), 1);

        let data = tng.read_range(Kind::Velocities, 2, 2).unwrap();
        assert_eq!(data.n_frames_read, 1);
        assert_eq!(data.first_frame_read, 2);
        let row = data.frame(0).unwrap();
        assert_eq!(row.len(), WATER_PARTICLES * 3);
        assert!(data.frame(1).is_none());

        fs::remove_file(&path).ok();
    }
}
