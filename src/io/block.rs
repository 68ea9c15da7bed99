// src/io/block.rs
/*!
Per-external-index **result files**.

A [`BlockIo`] handle names one file and the group inside it, plus the declared
extents `(N_t, N_i, N_j, N_k)`; the spin extent is always [`NS`]. The dataset
`<group>/a2aMatrixNucleon` has shape `[N_t, N_s, N_i, N_j, N_k]`, chunks
`[1, N_s, B, B, B]` (each edge clamped to its extent) and the Fletcher-32 filter.

- `init_file(metadata, chunk)`: create/overwrite the file and allocate the dataset.
- `save_block(raw, origin, extent)`: write `[N_t, n_s, b_i, b_j, b_k]` at `[0, s, i, j, k]`.
- `save_tile(m, e, s, i, j, k)`: write external index `e` of an engine tile buffer.
- `load(v, t_read)` / `load_on_grid(v, grid, t_read)`: read per time slice, newest slice first.

The file is opened and closed inside every call. Without the `io` feature every
I/O call fails with [`Error::IoUnsupported`].
*/

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use super::IoScalar;
use crate::error::{Error, Result};
use crate::lattice::Grid;
use crate::math::tensor::{Tensor, TensorMap};
use crate::math::Scalar;
use crate::NS;

/// Name of the result dataset inside its group.
pub const DATASET_NAME: &str = "a2aMatrixNucleon";

/// Dataset coordinate `(s, i, j, k)` of the first element of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockOrigin {
    pub s: usize,
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

/// Block extents along `(s, i, j, k)`; the time axis is always written whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockExtent {
    pub ns: usize,
    pub bi: usize,
    pub bj: usize,
    pub bk: usize,
}

impl BlockExtent {
    #[inline]
    pub fn volume(&self) -> usize {
        self.ns * self.bi * self.bj * self.bk
    }
}

/// Handle on one result file. `T` is the element type written to disk.
#[derive(Debug, Clone)]
pub struct BlockIo<T: IoScalar> {
    filename: PathBuf,
    dataname: String,
    nt: usize,
    ni: usize,
    nj: usize,
    nk: usize,
    _elem: PhantomData<T>,
}

impl<T: IoScalar> BlockIo<T> {
    pub fn new(filename: impl Into<PathBuf>, dataname: impl Into<String>, nt: usize, ni: usize, nj: usize, nk: usize) -> Self {
        Self {
            filename: filename.into(),
            dataname: dataname.into(),
            nt,
            ni,
            nj,
            nk,
            _elem: PhantomData,
        }
    }

    #[inline] pub fn n_t(&self) -> usize { self.nt }
    #[inline] pub fn n_i(&self) -> usize { self.ni }
    #[inline] pub fn n_j(&self) -> usize { self.nj }
    #[inline] pub fn n_k(&self) -> usize { self.nk }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn dataname(&self) -> &str {
        &self.dataname
    }

    /// Full dataset path inside the file.
    pub fn dataset_path(&self) -> String {
        format!("{}/{}", self.dataname, DATASET_NAME)
    }

    /// Bytes of the full dataset.
    pub fn size(&self) -> usize {
        NS * self.nt * self.ni * self.nj * self.nk * std::mem::size_of::<T>()
    }

    /// Declared dataset shape `[N_t, N_s, N_i, N_j, N_k]`.
    pub fn shape(&self) -> [usize; 5] {
        [self.nt, NS, self.ni, self.nj, self.nk]
    }

    /// Chunk shape for an outer block of `chunk_size`.
    pub fn chunk_shape(&self, chunk_size: usize) -> [usize; 5] {
        let edge = |n: usize| chunk_size.clamp(1, n.max(1));
        [1, NS, edge(self.ni), edge(self.nj), edge(self.nk)]
    }

    /// Element offset of external index `e` in a tile buffer `[n_ext, N_t, n_str, b_i, b_j, b_k]`.
    fn tile_offset(&self, m: &TensorMap<'_, T, 6>, e: usize) -> Result<(usize, BlockExtent)> {
        let [next, nt, nstr, bi, bj, bk] = m.shape();
        if nt != self.nt || e >= next {
            return Err(Error::shape("BlockIo::save_tile", &[e + 1, self.nt], &[next, nt]));
        }
        let extent = BlockExtent { ns: nstr, bi, bj, bk };
        Ok((e * nt * extent.volume(), extent))
    }
}

// ======================================================================================
// ----------------------------------- Chunked backend ----------------------------------
// ======================================================================================

#[cfg(feature = "io")]
mod backend {
    use std::time::Instant;

    use num_complex::Complex;
    use tracing::{debug, info};

    use super::*;
    use crate::io::cache::{DEFAULT_CACHE_BYTES, DEFAULT_CACHE_SLOTS};
    use crate::io::container::{ChunkedFile, Dataset};
    use crate::io::Dtype;

    impl<T: IoScalar> BlockIo<T> {
        /// Create (or overwrite) the file, store `metadata` in its group and
        /// allocate the empty dataset.
        pub fn init_file<M: Serialize>(&self, metadata: &M, chunk_size: usize) -> Result<()> {
            let value = serde_json::to_value(metadata)?;
            let mut file = ChunkedFile::create(&self.filename, &self.dataname, value)?;
            let chunk = self.chunk_shape(chunk_size);
            file.create_dataset(DATASET_NAME, T::DTYPE, &self.shape(), Some(&chunk), true)?;
            debug!(file = %self.filename.display(), shape = ?self.shape(), chunk = ?chunk, "result file initialised");
            Ok(())
        }

        /// Write `data` (row-major `[N_t, ns, b_i, b_j, b_k]`) at `[0, s, i, j, k]`.
        pub fn save_block(&self, data: &[T], origin: BlockOrigin, extent: BlockExtent) -> Result<()> {
            if origin.s + extent.ns > NS {
                return Err(Error::shape("BlockIo::save_block", &[NS], &[origin.s + extent.ns]));
            }
            let mut ds = self.open_mut()?;
            let offset = [0, origin.s, origin.i, origin.j, origin.k];
            let count = [self.nt, extent.ns, extent.bi, extent.bj, extent.bk];
            ds.write_hyperslab(&offset, &count, data)
        }

        /// Write external index `e` of the tile buffer `m[e, t, s, i, j, k]` with its
        /// structure axis starting at dataset spin `s` and modes at `(i, j, k)`.
        pub fn save_tile(&self, m: &TensorMap<'_, T, 6>, e: usize, s: usize, i: usize, j: usize, k: usize) -> Result<()> {
            let (offset, extent) = self.tile_offset(m, e)?;
            let len = self.nt * extent.volume();
            let data = &m.as_slice()[offset..offset + len];
            self.save_block(data, BlockOrigin { s, i, j, k }, extent)
        }

        /// Read every time slice into `v[t]` as `[N_s, N_i, N_j, N_k]` tensors.
        pub fn load<U: Scalar>(&mut self, v: &mut Vec<Tensor<U>>, t_read: Option<&mut Duration>) -> Result<()> {
            let nt = self.nt;
            self.load_slices(v, nt, |t| t, t_read)
        }

        /// Read the time slices local to this rank of `grid`. The time axis is the
        /// last grid axis; `v[t]` receives global slice `(t + coor·local_nt) mod N_t`.
        pub fn load_on_grid<U: Scalar>(
            &mut self,
            v: &mut Vec<Tensor<U>>,
            grid: &dyn Grid,
            t_read: Option<&mut Duration>,
        ) -> Result<()> {
            let td = grid.nd() - 1;
            let local_nt = grid.local_dims()[td];
            let global_nt = grid.global_dims()[td];
            let tshift = grid.processor_coor()[td] * local_nt;
            self.load_slices(v, local_nt, |t| (t + tshift) % global_nt, t_read)
        }

        fn open(&self) -> Result<Dataset> {
            ChunkedFile::open(&self.filename)?.open_dataset(&self.dataset_path())
        }

        fn open_mut(&self) -> Result<Dataset> {
            ChunkedFile::open(&self.filename)?.open_dataset_mut(&self.dataset_path())
        }

        /// Check the stored shape against the declared one, adopting declared zeros.
        fn reconcile_shape(&mut self, hdim: &[usize]) -> Result<()> {
            let declared = self.shape();
            let mismatch = |context: &str| Error::SizeMismatch {
                context: format!("{context} in {}", self.filename.display()),
                got: hdim.to_vec(),
                expected: declared.to_vec(),
            };
            if hdim.len() != 5 {
                return Err(mismatch("dataset rank"));
            }
            for d in 0..5 {
                if declared[d] != 0 && declared[d] != hdim[d] {
                    return Err(mismatch("dataset dimensions"));
                }
            }
            self.nt = hdim[0];
            self.ni = hdim[2];
            self.nj = hdim[3];
            self.nk = hdim[4];
            Ok(())
        }

        fn load_slices<U, F>(
            &mut self,
            v: &mut Vec<Tensor<U>>,
            local_nt: usize,
            global_t: F,
            mut t_read: Option<&mut Duration>,
        ) -> Result<()>
        where
            U: Scalar,
            F: Fn(usize) -> usize,
        {
            let mut ds = self.open()?;
            ds.set_chunk_cache(DEFAULT_CACHE_SLOTS, DEFAULT_CACHE_BYTES);
            let hdim = ds.shape().to_vec();
            self.reconcile_shape(&hdim)?;

            if let Some(chunk) = ds.chunk_dims() {
                if (2..5).any(|d| hdim[d] % chunk[d] != 0) {
                    return Err(Error::SizeMismatch {
                        context: format!(
                            "chunk shape is not a divisor of the dataset dimensions in {}",
                            self.filename.display()
                        ),
                        got: chunk.to_vec(),
                        expected: hdim.clone(),
                    });
                }
                let chunk_count: usize = (2..5).map(|d| hdim[d] / chunk[d]).product();
                debug!(chunk = ?chunk, chunk_count, "dataset is chunked");
            }

            let shape = vec![NS, self.ni, self.nj, self.nk];
            let count = [1, NS, self.ni, self.nj, self.nk];
            v.clear();
            v.resize_with(local_nt, || Tensor::new(shape.clone()));
            if let Some(acc) = t_read.as_deref_mut() {
                *acc = Duration::ZERO;
            }

            info!(file = %self.filename.display(), slices = local_nt, "loading time slices");
            for t in (0..local_nt).rev() {
                let offset = [global_t(t), 0, 0, 0, 0];
                debug!(t, global = offset[0], "loading time slice");
                let start = Instant::now();
                let data: Vec<U> = match ds.dtype() {
                    Dtype::Complex64 => read_cast::<Complex<f32>, U>(&mut ds, &offset, &count)?,
                    Dtype::Complex128 => read_cast::<Complex<f64>, U>(&mut ds, &offset, &count)?,
                };
                if let Some(acc) = t_read.as_deref_mut() {
                    *acc += start.elapsed();
                }
                v[t] = Tensor::from_vec(shape.clone(), data)?;
            }
            Ok(())
        }
    }

    fn read_cast<S: IoScalar, U: Scalar>(ds: &mut Dataset, offset: &[usize], count: &[usize]) -> Result<Vec<U>> {
        let mut buf = vec![S::zero(); count.iter().product()];
        ds.read_hyperslab(offset, count, &mut buf)?;
        Ok(buf.into_iter().map(|x| x.cast::<U>()).collect())
    }
}

// ======================================================================================
// ------------------------------------ No backend --------------------------------------
// ======================================================================================

#[cfg(not(feature = "io"))]
impl<T: IoScalar> BlockIo<T> {
    pub fn init_file<M: Serialize>(&self, _metadata: &M, _chunk_size: usize) -> Result<()> {
        Err(Error::IoUnsupported("BlockIo::init_file"))
    }

    pub fn save_block(&self, _data: &[T], _origin: BlockOrigin, _extent: BlockExtent) -> Result<()> {
        Err(Error::IoUnsupported("BlockIo::save_block"))
    }

    pub fn save_tile(&self, m: &TensorMap<'_, T, 6>, e: usize, _s: usize, _i: usize, _j: usize, _k: usize) -> Result<()> {
        self.tile_offset(m, e)?;
        Err(Error::IoUnsupported("BlockIo::save_tile"))
    }

    pub fn load<U: Scalar>(&mut self, _v: &mut Vec<Tensor<U>>, _t_read: Option<&mut Duration>) -> Result<()> {
        Err(Error::IoUnsupported("BlockIo::load"))
    }

    pub fn load_on_grid<U: Scalar>(
        &mut self,
        _v: &mut Vec<Tensor<U>>,
        _grid: &dyn Grid,
        _t_read: Option<&mut Duration>,
    ) -> Result<()> {
        Err(Error::IoUnsupported("BlockIo::load_on_grid"))
    }
}
