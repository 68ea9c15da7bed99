// src/engine/mod.rs
/*!
The **blocked computation engine**.

Mode indices `(i, j, k)` are walked in outer tiles of edge `B` and, inside each
tile, in cache tiles of edge `b`; both are truncated at the remainder edges.
For every cache tile the kernel fills the cache buffer `[e, s, t, iii, jjj, kkk]`,
which is then copy-transposed into the tile buffer `[e, t, s, i, j, k]`. Once an
outer tile is complete it is written to one file per external index `e`.

Both buffers are allocated in the constructor and reused; every element a tile
reads has been written for that tile first, so they are never cleared.

In [`IoMode::Parallel`] each rank writes the external indices returned by
[`owned_externals`] and all ranks meet at a barrier before and after the write
phase.

Kernel and I/O errors are held until the end of the outer tile, where the ranks
vote with [`Grid::all_ok`]; if any rank failed, every rank returns an error from
`execute`. A kernel that uses collectives itself must fail on all ranks alike.
*/

pub mod config;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

pub use config::{EngineConfig, IoMode};

use crate::error::{Error, Result};
use crate::io::{BlockIo, IoScalar};
use crate::kernel::NucleonKernel;
use crate::lattice::Grid;
use crate::math::tensor::{TensorMap, TensorMapMut};
use crate::math::Scalar;
use crate::timer::TimerArray;

/// External indices written by `rank` out of `n_ranks` in parallel I/O: `e mod n_ranks == rank`.
pub fn owned_externals(rank: usize, n_ranks: usize, n_ext: usize) -> Vec<usize> {
    if n_ranks == 0 {
        return Vec::new();
    }
    (rank..n_ext).step_by(n_ranks).collect()
}

/// Extents of one tile along `(i, j, k)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TileDims {
    i: usize,
    j: usize,
    k: usize,
}

impl TileDims {
    #[inline]
    fn volume(&self) -> usize {
        self.i * self.j * self.k
    }
}

fn start_timer(timers: &mut Option<TimerArray>, name: &str) {
    if let Some(t) = timers {
        t.start_timer(name);
    }
}

fn stop_timer(timers: &mut Option<TimerArray>, name: &str) {
    if let Some(t) = timers {
        t.stop_timer(name);
    }
}

/// Every rank fails if any rank failed; ranks without an error of their own get `RankFailed(phase)`.
fn agree(grid: &dyn Grid, result: Result<()>, phase: &'static str) -> Result<()> {
    let all_ok = grid.all_ok(result.is_ok());
    match result {
        Err(err) => Err(err),
        Ok(()) if all_ok => Ok(()),
        Ok(()) => Err(Error::RankFailed(phase)),
    }
}

/// Create the directory holding `filename` on the boss rank, then synchronise.
fn make_file_dir(filename: &Path, grid: &dyn Grid) -> Result<()> {
    let result = match filename.parent().filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) if grid.is_boss() => fs::create_dir_all(dir).map_err(|e| Error::io(dir, e)),
        _ => Ok(()),
    };
    agree(grid, result, "directory creation")
}

/// Copy-transpose cache tile `[e, s, t, iii, jjj, kkk]` into the tile buffer
/// `[e, t, s, ii + iii, jj + jjj, kk + kkk]`, in parallel over `(e, t, s)` slabs.
#[allow(clippy::too_many_arguments)]
fn copy_cache_tile<T: Scalar, TIo: IoScalar>(
    cache: &[T],
    tile: &mut [TIo],
    next: usize,
    nt: usize,
    nstr: usize,
    outer: TileDims,
    inner: TileDims,
    base: (usize, usize, usize),
) {
    let slab = outer.volume();
    let inner_slab = inner.volume();
    let (ii, jj, kk) = base;
    tile[..next * nt * nstr * slab]
        .par_chunks_mut(slab)
        .enumerate()
        .for_each(|(row, dst)| {
            let s = row % nstr;
            let t = (row / nstr) % nt;
            let e = row / (nstr * nt);
            let src = &cache[((e * nstr + s) * nt + t) * inner_slab..][..inner_slab];
            for iii in 0..inner.i {
                for jjj in 0..inner.j {
                    let d0 = ((ii + iii) * outer.j + jj + jjj) * outer.k + kk;
                    let s0 = (iii * inner.j + jjj) * inner.k;
                    for (d, x) in dst[d0..d0 + inner.k].iter_mut().zip(&src[s0..s0 + inner.k]) {
                        *d = x.cast::<TIo>();
                    }
                }
            }
        });
}

// ======================================================================================
// --------------------------------------- Engine ---------------------------------------
// ======================================================================================

/// Tiled driver of a [`NucleonKernel`]; `T` is the compute type, `TIo` the file type.
pub struct BlockComputation<'g, T: Scalar, TIo: IoScalar> {
    grid: &'g dyn Grid,
    orthog_dim: usize,
    nt: usize,
    next: usize,
    nstr: usize,
    block: usize,
    cache_block: usize,
    io_mode: IoMode,
    timers: Option<TimerArray>,
    cache: Vec<T>,
    buf: Vec<TIo>,
}

impl<'g, T: Scalar, TIo: IoScalar> BlockComputation<'g, T, TIo> {
    pub fn new(
        grid: &'g dyn Grid,
        orthog_dim: usize,
        next: usize,
        nstr: usize,
        block: usize,
        cache_block: usize,
    ) -> Result<Self> {
        EngineConfig::new(next, nstr, block, cache_block).validate()?;
        let nt = *grid.global_dims().get(orthog_dim).ok_or_else(|| {
            Error::InvalidConfig(format!("orthogonal dimension {orthog_dim} outside a {}-d grid", grid.nd()))
        })?;
        let per_tile = nt * next * nstr;
        Ok(Self {
            grid,
            orthog_dim,
            nt,
            next,
            nstr,
            block,
            cache_block,
            io_mode: IoMode::default(),
            timers: None,
            cache: vec![T::zero(); per_tile * cache_block.pow(3)],
            buf: vec![TIo::zero(); per_tile * block.pow(3)],
        })
    }

    pub fn from_config(grid: &'g dyn Grid, orthog_dim: usize, cfg: &EngineConfig) -> Result<Self> {
        Ok(Self::new(grid, orthog_dim, cfg.n_ext, cfg.n_str, cfg.block_size, cfg.cache_block_size)?
            .with_io_mode(cfg.io_mode))
    }

    pub fn with_io_mode(mut self, io_mode: IoMode) -> Self {
        self.io_mode = io_mode;
        self
    }

    /// Charge kernel, copy and I/O phases to `timers`.
    pub fn with_timers(mut self, timers: TimerArray) -> Self {
        self.timers = Some(timers);
        self
    }

    pub fn timers(&self) -> Option<&TimerArray> {
        self.timers.as_ref()
    }

    pub fn take_timers(&mut self) -> Option<TimerArray> {
        self.timers.take()
    }

    #[inline] pub fn nt(&self) -> usize { self.nt }
    #[inline] pub fn orthog_dim(&self) -> usize { self.orthog_dim }
    #[inline] pub fn io_mode(&self) -> IoMode { self.io_mode }

    /// Lengths of the cache and tile buffers, in elements.
    pub fn buffer_lens(&self) -> (usize, usize) {
        (self.cache.len(), self.buf.len())
    }

    /// Run `kernel` over every mode triplet and write one file per external index.
    ///
    /// `filename_fn(e)` names the file, `ioname_fn(e)` the group holding the
    /// dataset and `metadata_fn(e)` the record stored with it.
    #[allow(clippy::too_many_arguments)]
    pub fn execute<F, K, M, IoName, FileName, Meta>(
        &mut self,
        left: &[F],
        right: &[F],
        q3: &[F],
        kernel: &mut K,
        ioname_fn: IoName,
        filename_fn: FileName,
        metadata_fn: Meta,
    ) -> Result<()>
    where
        K: NucleonKernel<T, F>,
        M: Serialize,
        IoName: Fn(usize) -> String,
        FileName: Fn(usize) -> String,
        Meta: Fn(usize) -> M,
    {
        let (ni, nj, nk) = (left.len(), right.len(), q3.len());
        let (b_out, b_in) = (self.block, self.cache_block);
        let (next, nt, nstr) = (self.next, self.nt, self.nstr);
        let nodes = self.grid.node_count().max(1) as f64;
        let n_blocks = ni.div_ceil(b_out) * nj.div_ceil(b_out) * nk.div_ceil(b_out);

        make_file_dir(Path::new(&filename_fn(0)), self.grid)?;

        let mut n_block = 0usize;
        for i in (0..ni).step_by(b_out) {
            for j in (0..nj).step_by(b_out) {
                for k in (0..nk).step_by(b_out) {
                    n_block += 1;
                    let outer = TileDims { i: b_out.min(ni - i), j: b_out.min(nj - j), k: b_out.min(nk - k) };
                    info!(
                        "all-to-all matrix block {n_block}/{n_blocks} [{} .. {}, {} .. {}, {} .. {}]",
                        i, i + outer.i - 1, j, j + outer.j - 1, k, k + outer.k - 1
                    );

                    let mut flops = 0.0;
                    let mut bytes = 0.0;
                    let mut t_kernel = Duration::ZERO;
                    let mut computed = Ok(());
                    'cache: for ii in (0..outer.i).step_by(b_in) {
                        for jj in (0..outer.j).step_by(b_in) {
                            for kk in (0..outer.k).step_by(b_in) {
                                let inner = TileDims {
                                    i: b_in.min(outer.i - ii),
                                    j: b_in.min(outer.j - jj),
                                    k: b_in.min(outer.k - kk),
                                };
                                let Self { cache, buf, timers, orthog_dim, .. } = self;

                                start_timer(timers, "kernel");
                                let elapsed = TensorMapMut::new(
                                    cache.as_mut_slice(),
                                    [next, nstr, nt, inner.i, inner.j, inner.k],
                                )
                                .and_then(|mut cache_block| {
                                    kernel.apply(
                                        &mut cache_block,
                                        &left[i + ii..i + ii + inner.i],
                                        &right[j + jj..j + jj + inner.j],
                                        &q3[k + kk..k + kk + inner.k],
                                        *orthog_dim,
                                    )
                                });
                                stop_timer(timers, "kernel");
                                match elapsed {
                                    Ok(dt) => t_kernel += dt,
                                    Err(err) => {
                                        computed = Err(err);
                                        break 'cache;
                                    }
                                }
                                flops += kernel.flops(inner.i, inner.j, inner.k);
                                bytes += kernel.bytes(inner.i, inner.j, inner.k);

                                start_timer(timers, "cache copy");
                                copy_cache_tile(cache.as_slice(), buf.as_mut_slice(), next, nt, nstr, outer, inner, (ii, jj, kk));
                                stop_timer(timers, "cache copy");
                            }
                        }
                    }

                    let secs = t_kernel.as_secs_f64();
                    if computed.is_ok() && secs > 0.0 {
                        info!("kernel perf {:.3} Gflop/s/node", flops / secs / 1.0e9 / nodes);
                        info!("kernel perf {:.3} GB/s/node", bytes / secs / 1024f64.powi(3) / nodes);
                    }

                    let written = self.write_tile(
                        (i, j, k),
                        outer,
                        (ni, nj, nk),
                        computed.is_ok(),
                        &ioname_fn,
                        &filename_fn,
                        &metadata_fn,
                    );
                    agree(self.grid, computed.and(written), "block computation")?;
                }
            }
        }

        if let Some(timers) = &self.timers {
            if self.grid.is_boss() {
                timers.report();
            }
        }
        Ok(())
    }

    /// Write the finished tile at mode origin `origin` to the files this rank owns.
    ///
    /// With `computed == false` nothing is written, but the rank still takes part
    /// in the barriers around the write phase.
    #[allow(clippy::too_many_arguments)]
    fn write_tile<M, IoName, FileName, Meta>(
        &mut self,
        origin: (usize, usize, usize),
        outer: TileDims,
        modes: (usize, usize, usize),
        computed: bool,
        ioname_fn: &IoName,
        filename_fn: &FileName,
        metadata_fn: &Meta,
    ) -> Result<()>
    where
        M: Serialize,
        IoName: Fn(usize) -> String,
        FileName: Fn(usize) -> String,
        Meta: Fn(usize) -> M,
    {
        let (next, nt, nstr) = (self.next, self.nt, self.nstr);
        let grid = self.grid;
        let parallel = self.io_mode == IoMode::Parallel;
        let tasks = if !computed {
            Vec::new()
        } else if parallel {
            owned_externals(grid.this_rank(), grid.rank_count(), next)
        } else {
            (0..next).collect()
        };
        debug!(rank = grid.this_rank(), tasks = ?tasks, "writing block to disk");

        let Self { buf, timers, block, .. } = self;
        let tile = TensorMap::new(buf.as_slice(), [next, nt, nstr, outer.i, outer.j, outer.k])?;
        let first_tile = origin == (0, 0, 0);
        let (i, j, k) = origin;

        if parallel {
            grid.barrier();
        }
        start_timer(timers, "IO: total");
        let mut write_time = Duration::ZERO;
        let mut result = Ok(());
        for &e in &tasks {
            let io = BlockIo::<TIo>::new(PathBuf::from(filename_fn(e)), ioname_fn(e), nt, modes.0, modes.1, modes.2);
            if first_tile {
                start_timer(timers, "IO: file creation");
                let created = io.init_file(&metadata_fn(e), *block);
                stop_timer(timers, "IO: file creation");
                if let Err(err) = created {
                    result = Err(err);
                    break;
                }
            }
            start_timer(timers, "IO: write block");
            let start = Instant::now();
            let saved = io.save_tile(&tile, e, 0, i, j, k);
            write_time += start.elapsed();
            stop_timer(timers, "IO: write block");
            if let Err(err) = saved {
                result = Err(err);
                break;
            }
        }
        if parallel {
            grid.barrier();
        }
        stop_timer(timers, "IO: total");
        result?;

        let size = (tasks.len() * nt * nstr * outer.volume() * std::mem::size_of::<TIo>()) as f64;
        let secs = write_time.as_secs_f64();
        if secs > 0.0 {
            info!(
                "block I/O done {:.1} KiB in {:.3} ms ({:.1} MB/s)",
                size / 1024.0,
                secs * 1.0e3,
                size / secs / 1024.0 / 1024.0
            );
        }
        Ok(())
    }
}
