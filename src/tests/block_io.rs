// tests/block_io.rs

use std::time::Duration;

use num_complex::Complex;
use serde_json::json;

use super::scratch_dir;
use crate::error::Error;
use crate::io::{BlockExtent, BlockIo, BlockOrigin, DATASET_NAME};
use crate::math::tensor::Tensor;
use crate::math::{ComplexD, ComplexF};
use crate::NS;

fn entry(t: usize, s: usize, i: usize, j: usize, k: usize) -> ComplexF {
    Complex::new((t * 10000 + s * 1000 + i * 100 + j * 10 + k) as f32, t as f32 - 0.5)
}

#[test]
fn handle_geometry() {
    let io = BlockIo::<ComplexF>::new("out/res.a2a", "meson", 8, 6, 8, 3);
    assert_eq!(io.shape(), [8, NS, 6, 8, 3]);
    assert_eq!(io.size(), 8 * NS * 6 * 8 * 3 * 8);
    assert_eq!(io.dataset_path(), format!("meson/{DATASET_NAME}"));
    assert_eq!(io.chunk_shape(4), [1, NS, 4, 4, 3]);
    assert_eq!(io.chunk_shape(0), [1, NS, 1, 1, 1]);
    assert_eq!(BlockExtent { ns: 2, bi: 3, bj: 4, bk: 5 }.volume(), 120);
}

#[cfg(feature = "io")]
mod with_backend {
    use super::*;
    use crate::io::ChunkedFile;
    use crate::lattice::{CartesianGrid, GridLayout};
    use crate::math::tensor::TensorMap;

    /// Write a full `[nt, NS, n, n, n]` dataset tile by tile through `save_tile`.
    fn write_tiled(io: &BlockIo<ComplexF>, n: usize, b: usize) {
        let nt = io.n_t();
        let next = 2;
        for i in (0..n).step_by(b) {
            for j in (0..n).step_by(b) {
                for k in (0..n).step_by(b) {
                    let (bi, bj, bk) = (b.min(n - i), b.min(n - j), b.min(n - k));
                    // Tile buffer [e, t, s, i, j, k]; only e = 1 carries data.
                    let mut buf = vec![ComplexF::new(-1.0, -1.0); next * nt * NS * bi * bj * bk];
                    let mut q = nt * NS * bi * bj * bk;
                    for t in 0..nt {
                        for s in 0..NS {
                            for ii in 0..bi {
                                for jj in 0..bj {
                                    for kk in 0..bk {
                                        buf[q] = entry(t, s, i + ii, j + jj, k + kk);
                                        q += 1;
                                    }
                                }
                            }
                        }
                    }
                    let m = TensorMap::new(buf.as_slice(), [next, nt, NS, bi, bj, bk]).unwrap();
                    io.save_tile(&m, 1, 0, i, j, k).unwrap();
                }
            }
        }
    }

    #[test]
    fn tiles_round_trip_bit_exact() {
        // Arrange
        let path = scratch_dir("block").join("tiles.a2a");
        let (nt, n, b) = (3, 5, 2);
        let io = BlockIo::<ComplexF>::new(&path, "nucleon", nt, n, n, n);
        io.init_file(&json!({ "gamma": "G5", "mom": [0, 0, 1] }), b).unwrap();

        // Act
        write_tiled(&io, n, b);
        let mut reader = BlockIo::<ComplexF>::new(&path, "nucleon", nt, n, n, n);
        let mut v: Vec<Tensor<ComplexF>> = Vec::new();
        let mut t_read = Duration::from_secs(1000);
        reader.load(&mut v, Some(&mut t_read)).unwrap_err();

        // Assert: 5 is not a multiple of the chunk edge 2, so loading is refused.
        assert!(t_read == Duration::from_secs(1000));
        let file = ChunkedFile::open(&path).unwrap();
        assert_eq!(file.metadata()["gamma"], "G5");
        let mut ds = file.open_dataset(&io.dataset_path()).unwrap();
        let mut all = vec![ComplexF::new(0.0, 0.0); nt * NS * n * n * n];
        ds.read_hyperslab(&[0, 0, 0, 0, 0], &[nt, NS, n, n, n], &mut all).unwrap();
        let mut q = 0;
        for t in 0..nt {
            for s in 0..NS {
                for i in 0..n {
                    for j in 0..n {
                        for k in 0..n {
                            assert_eq!(all[q], entry(t, s, i, j, k), "[{t}, {s}, {i}, {j}, {k}]");
                            q += 1;
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn load_returns_every_time_slice() {
        // Arrange
        let path = scratch_dir("block").join("load.a2a");
        let (nt, n, b) = (2, 4, 2);
        let io = BlockIo::<ComplexF>::new(&path, "nucleon", nt, n, n, n);
        io.init_file(&json!({}), b).unwrap();
        write_tiled(&io, n, b);

        // Act
        let mut reader = BlockIo::<ComplexF>::new(&path, "nucleon", nt, n, n, n);
        let mut v: Vec<Tensor<ComplexD>> = Vec::new();
        let mut t_read = Duration::from_secs(1000);
        reader.load(&mut v, Some(&mut t_read)).unwrap();

        // Assert
        assert!(t_read < Duration::from_secs(1000));
        assert_eq!(v.len(), nt);
        for (t, slice) in v.iter().enumerate() {
            assert_eq!(slice.shape(), &[NS, n, n, n]);
            let expected = entry(t, 3, 1, 2, 3);
            assert_eq!(slice.get(&[3, 1, 2, 3]), Complex::new(expected.re as f64, expected.im as f64));
        }
    }

    #[test]
    fn save_block_places_spin_range() {
        let path = scratch_dir("block").join("spin.a2a");
        let io = BlockIo::<ComplexD>::new(&path, "g", 1, 2, 2, 2);
        io.init_file(&json!({}), 2).unwrap();

        let data = vec![ComplexD::new(1.0, 2.0); 2 * 8];
        io.save_block(&data, BlockOrigin { s: 2, i: 0, j: 0, k: 0 }, BlockExtent { ns: 2, bi: 2, bj: 2, bk: 2 })
            .unwrap();
        let too_wide = BlockOrigin { s: 3, ..Default::default() };
        assert!(io.save_block(&data, too_wide, BlockExtent { ns: 2, bi: 2, bj: 2, bk: 2 }).is_err());

        let mut reader = io.clone();
        let mut v: Vec<Tensor<ComplexD>> = Vec::new();
        reader.load(&mut v, None).unwrap();
        assert_eq!(v[0].get(&[1, 1, 1, 1]), ComplexD::new(0.0, 0.0));
        assert_eq!(v[0].get(&[2, 0, 1, 0]), ComplexD::new(1.0, 2.0));
        assert_eq!(v[0].get(&[3, 1, 1, 1]), ComplexD::new(1.0, 2.0));
    }

    #[test]
    fn chunk_that_does_not_divide_is_reported_with_both_shapes() {
        // Arrange
        let path = scratch_dir("block").join("chunk.a2a");
        let io = BlockIo::<ComplexF>::new(&path, "g", 8, 6, 8, 8);
        io.init_file(&json!({}), 4).unwrap();

        // Act
        let mut reader = BlockIo::<ComplexF>::new(&path, "g", 8, 6, 8, 8);
        let mut v: Vec<Tensor<ComplexF>> = Vec::new();
        let err = reader.load(&mut v, None).unwrap_err();

        // Assert
        match &err {
            Error::SizeMismatch { got, expected, .. } => {
                assert_eq!(got, &[1, 4, 4, 4, 4]);
                assert_eq!(expected, &[8, 4, 6, 8, 8]);
            }
            other => panic!("unexpected error {other}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("[1, 4, 4, 4, 4]") && msg.contains("[8, 4, 6, 8, 8]"), "{msg}");
    }

    #[test]
    fn declared_dims_must_match_file() {
        let path = scratch_dir("block").join("dims.a2a");
        BlockIo::<ComplexF>::new(&path, "g", 2, 4, 4, 4).init_file(&json!({}), 2).unwrap();

        let mut wrong = BlockIo::<ComplexF>::new(&path, "g", 2, 4, 4, 2);
        let mut v: Vec<Tensor<ComplexF>> = Vec::new();
        assert!(matches!(wrong.load(&mut v, None), Err(Error::SizeMismatch { .. })));

        let mut wrong_group = BlockIo::<ComplexF>::new(&path, "h", 2, 4, 4, 4);
        assert!(matches!(wrong_group.load(&mut v, None), Err(Error::Storage { .. })));
    }

    #[test]
    fn zero_dims_are_adopted_from_file() {
        let path = scratch_dir("block").join("adopt.a2a");
        BlockIo::<ComplexF>::new(&path, "g", 2, 4, 2, 4).init_file(&json!({}), 2).unwrap();

        let mut reader = BlockIo::<ComplexF>::new(&path, "g", 0, 0, 0, 0);
        let mut v: Vec<Tensor<ComplexF>> = Vec::new();
        reader.load(&mut v, None).unwrap();

        assert_eq!((reader.n_t(), reader.n_i(), reader.n_j(), reader.n_k()), (2, 4, 2, 4));
        assert_eq!(v.len(), 2);
        assert_eq!(v[1].shape(), &[NS, 4, 2, 4]);
    }

    #[test]
    fn single_precision_file_loads_as_double() {
        let path = scratch_dir("block").join("cast.a2a");
        let io = BlockIo::<ComplexF>::new(&path, "g", 1, 2, 2, 2);
        io.init_file(&json!({}), 2).unwrap();
        let data: Vec<ComplexF> = (0..NS * 8).map(|x| ComplexF::new(x as f32 * 0.25, 1.0)).collect();
        io.save_block(&data, BlockOrigin::default(), BlockExtent { ns: NS, bi: 2, bj: 2, bk: 2 }).unwrap();

        let mut reader = BlockIo::<ComplexF>::new(&path, "g", 1, 2, 2, 2);
        let mut v: Vec<Tensor<ComplexD>> = Vec::new();
        reader.load(&mut v, None).unwrap();
        assert_eq!(v[0].get(&[3, 1, 1, 1]), ComplexD::new(31.0 * 0.25, 1.0));
    }

    #[test]
    fn grid_load_reads_local_time_slices() {
        // Arrange
        let path = scratch_dir("block").join("grid.a2a");
        let (nt, n) = (4, 2);
        let io = BlockIo::<ComplexF>::new(&path, "g", nt, n, n, n);
        io.init_file(&json!({}), n).unwrap();
        let data: Vec<ComplexF> = (0..nt * NS * n * n * n)
            .map(|q| entry(q / (NS * n * n * n), 0, 0, 0, 0) + ComplexF::new(0.0, q as f32))
            .collect();
        io.save_block(&data, BlockOrigin::default(), BlockExtent { ns: NS, bi: n, bj: n, bk: n }).unwrap();
        let grids = CartesianGrid::threaded(GridLayout { global_dims: vec![2, 2, 2, nt], processors: vec![1, 1, 1, 2] })
            .unwrap();

        for (rank, grid) in grids.iter().enumerate() {
            // Act
            let mut reader = BlockIo::<ComplexF>::new(&path, "g", nt, n, n, n);
            let mut v: Vec<Tensor<ComplexF>> = Vec::new();
            reader.load_on_grid(&mut v, grid, None).unwrap();

            // Assert
            assert_eq!(v.len(), 2);
            for (t, slice) in v.iter().enumerate() {
                let global_t = t + 2 * rank;
                assert_eq!(slice.data()[0], data[global_t * NS * n * n * n]);
            }
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = scratch_dir("block").join("absent.a2a");
        let mut reader = BlockIo::<ComplexF>::new(&path, "g", 1, 1, 1, 1);
        let mut v: Vec<Tensor<ComplexF>> = Vec::new();
        assert!(matches!(reader.load(&mut v, None), Err(Error::Io { .. })));
    }

    #[test]
    fn read_only_files_still_load() {
        // Arrange
        let path = scratch_dir("block").join("archived.a2a");
        let (nt, n, b) = (2, 2, 2);
        let io = BlockIo::<ComplexF>::new(&path, "nucleon", nt, n, n, n);
        io.init_file(&json!({}), b).unwrap();
        write_tiled(&io, n, b);
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&path, perms).unwrap();

        // Act
        let mut reader = BlockIo::<ComplexF>::new(&path, "nucleon", nt, n, n, n);
        let mut v: Vec<Tensor<ComplexF>> = Vec::new();
        reader.load(&mut v, None).unwrap();

        // Assert
        assert_eq!(v.len(), nt);
        assert_eq!(v[1].get(&[2, 1, 0, 1]), entry(1, 2, 1, 0, 1));
        let ds = ChunkedFile::open(&path).unwrap().open_dataset(&io.dataset_path()).unwrap();
        assert!(!ds.is_writable());
    }
}

#[cfg(not(feature = "io"))]
#[test]
fn io_calls_fail_without_backend() {
    let path = scratch_dir("block").join("none.a2a");
    let mut io = BlockIo::<ComplexF>::new(&path, "g", 1, 1, 1, 1);
    assert!(matches!(io.init_file(&json!({}), 1), Err(Error::IoUnsupported(_))));
    let mut v: Vec<Tensor<ComplexF>> = Vec::new();
    assert!(matches!(io.load(&mut v, None), Err(Error::IoUnsupported(_))));
    assert!(!path.exists());
}
