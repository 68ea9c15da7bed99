// src/lattice/grid.rs
/*!
Processor grids over a 4-D lattice.

A [`Grid`] describes how the global lattice is split into equal local volumes,
which rank this process is, and provides the collectives the engine needs:
a barrier, an all-reduce sum of complex buffers and an all-ranks-succeeded vote
built on top of the sum.

[`CartesianGrid`] provides both a single serial rank and `n` ranks living in
one process (one thread each) that share a barrier. Processor coordinates are
row-major in the rank index, last axis fastest. By convention the last lattice
axis is time: `dims = [Nx, Ny, Nz, Nt]`.
*/

use std::sync::{Arc, Barrier, Mutex, PoisonError};

use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Distributed lattice layout and collectives.
pub trait Grid: Send + Sync {
    fn global_dims(&self) -> &[usize];
    fn local_dims(&self) -> &[usize];
    /// Number of processors along each axis.
    fn processors(&self) -> &[usize];
    /// This rank's coordinate in the processor grid.
    fn processor_coor(&self) -> &[usize];
    fn this_rank(&self) -> usize;
    fn rank_count(&self) -> usize;

    /// Number of physical nodes, used to normalise throughput figures.
    fn node_count(&self) -> usize {
        self.rank_count()
    }

    fn is_boss(&self) -> bool {
        self.this_rank() == 0
    }

    /// Block until every rank of the grid has reached this point.
    fn barrier(&self);

    /// Element-wise sum of `buf` across all ranks; every rank receives the total.
    fn global_sum(&self, buf: &mut [Complex<f64>]);

    /// `true` on every rank iff `ok` is `true` on every rank. Collective: all ranks must call it.
    fn all_ok(&self, ok: bool) -> bool {
        let mut failed = [Complex::new(if ok { 0.0 } else { 1.0 }, 0.0)];
        self.global_sum(&mut failed);
        failed[0].re == 0.0
    }

    fn nd(&self) -> usize {
        self.global_dims().len()
    }

    /// Global coordinate of the first local site along axis `d`.
    fn local_origin(&self, d: usize) -> usize {
        self.processor_coor()[d] * self.local_dims()[d]
    }
}

/// Global extents and processor counts of a Cartesian grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    pub global_dims: Vec<usize>,
    pub processors: Vec<usize>,
}

impl GridLayout {
    /// One processor along every axis.
    pub fn serial(global_dims: Vec<usize>) -> Self {
        let processors = vec![1; global_dims.len()];
        Self { global_dims, processors }
    }

    pub fn rank_count(&self) -> usize {
        self.processors.iter().product()
    }

    fn validate(&self) -> Result<Vec<usize>> {
        if self.global_dims.is_empty() || self.global_dims.len() != self.processors.len() {
            return Err(Error::InvalidConfig(format!(
                "grid dims {:?} and processors {:?} must be non-empty and of equal rank",
                self.global_dims, self.processors
            )));
        }
        self.global_dims
            .iter()
            .zip(&self.processors)
            .map(|(&g, &p)| {
                if p == 0 || g == 0 || g % p != 0 {
                    Err(Error::InvalidConfig(format!(
                        "global dims {:?} not divisible by processors {:?}",
                        self.global_dims, self.processors
                    )))
                } else {
                    Ok(g / p)
                }
            })
            .collect()
    }

    /// Row-major processor coordinate of `rank`.
    pub fn coor_of(&self, mut rank: usize) -> Vec<usize> {
        let mut coor = vec![0; self.processors.len()];
        for d in (0..self.processors.len()).rev() {
            coor[d] = rank % self.processors[d];
            rank /= self.processors[d];
        }
        coor
    }
}

// ======================================================================================
// ------------------------------------- Cartesian --------------------------------------
// ======================================================================================

/// State shared by the in-process ranks of one grid.
#[derive(Debug)]
struct Comm {
    barrier: Barrier,
    slots: Mutex<Vec<Vec<Complex<f64>>>>,
}

#[derive(Debug, Clone)]
pub struct CartesianGrid {
    layout: GridLayout,
    local_dims: Vec<usize>,
    coor: Vec<usize>,
    rank: usize,
    comm: Option<Arc<Comm>>,
}

impl CartesianGrid {
    /// A single rank owning the whole lattice.
    pub fn serial(global_dims: Vec<usize>) -> Result<Self> {
        let layout = GridLayout::serial(global_dims);
        let local_dims = layout.validate()?;
        let coor = vec![0; local_dims.len()];
        Ok(Self { layout, local_dims, coor, rank: 0, comm: None })
    }

    /// All ranks of `layout`, to be moved onto one thread each.
    ///
    /// Collectives block until every returned grid has joined, so each must be
    /// driven by its own thread.
    pub fn threaded(layout: GridLayout) -> Result<Vec<Self>> {
        let local_dims = layout.validate()?;
        let n = layout.rank_count();
        let comm = Arc::new(Comm {
            barrier: Barrier::new(n),
            slots: Mutex::new(vec![Vec::new(); n]),
        });
        Ok((0..n)
            .map(|rank| Self {
                coor: layout.coor_of(rank),
                layout: layout.clone(),
                local_dims: local_dims.clone(),
                rank,
                comm: Some(Arc::clone(&comm)),
            })
            .collect())
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }
}

impl Grid for CartesianGrid {
    fn global_dims(&self) -> &[usize] {
        &self.layout.global_dims
    }

    fn local_dims(&self) -> &[usize] {
        &self.local_dims
    }

    fn processors(&self) -> &[usize] {
        &self.layout.processors
    }

    fn processor_coor(&self) -> &[usize] {
        &self.coor
    }

    fn this_rank(&self) -> usize {
        self.rank
    }

    fn rank_count(&self) -> usize {
        self.layout.rank_count()
    }

    fn barrier(&self) {
        if let Some(comm) = &self.comm {
            comm.barrier.wait();
        }
    }

    fn global_sum(&self, buf: &mut [Complex<f64>]) {
        let Some(comm) = &self.comm else { return };

        comm.slots.lock().unwrap_or_else(PoisonError::into_inner)[self.rank] = buf.to_vec();
        comm.barrier.wait();
        {
            // Summed in rank order so that every rank sees bit-identical totals.
            let slots = comm.slots.lock().unwrap_or_else(PoisonError::into_inner);
            for (q, x) in buf.iter_mut().enumerate() {
                *x = slots.iter().map(|s| s[q]).sum();
            }
        }
        comm.barrier.wait();
    }
}
