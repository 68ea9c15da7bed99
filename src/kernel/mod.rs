// src/kernel/mod.rs
/*!
Pluggable **contraction kernels** for the blocked engine.

A kernel fills one cache tile `out[e, s, t, iii, jjj, kkk]` from three slices of
mode fields (`left`, `right`, `q3`), reducing over every lattice direction
except the orthogonal one. The engine calls kernels serially; a kernel is free
to parallelise internally and to keep scratch space between calls.
*/

pub mod local;

use std::time::{Duration, Instant};

use crate::error::Result;
use crate::math::tensor::TensorMapMut;
use crate::math::Scalar;

pub use local::LocalTripletKernel;

/// Capability set `{apply, flops, bytes}` over compute type `T` and field type `F`.
pub trait NucleonKernel<T: Scalar, F> {
    /// Fill every entry of `out` (`[n_ext, n_str, N_t, b_i, b_j, b_k]`).
    ///
    /// `left`, `right` and `q3` hold exactly `b_i`, `b_j` and `b_k` fields.
    /// Returns the time spent computing.
    fn apply(
        &mut self,
        out: &mut TensorMapMut<'_, T, 6>,
        left: &[F],
        right: &[F],
        q3: &[F],
        orthog_dim: usize,
    ) -> Result<Duration>;

    /// Floating-point operations of one `apply` on a `b_i × b_j × b_k` tile.
    fn flops(&self, bi: usize, bj: usize, bk: usize) -> f64;

    /// Bytes moved by one `apply` on a `b_i × b_j × b_k` tile.
    fn bytes(&self, bi: usize, bj: usize, bk: usize) -> f64;
}

/// Adapts a closure into a kernel, with per-triplet cost figures for diagnostics.
pub struct FnKernel<Fun> {
    f: Fun,
    flops_per_triplet: f64,
    bytes_per_triplet: f64,
}

impl<Fun> FnKernel<Fun> {
    pub fn new<T, F>(f: Fun) -> Self
    where
        T: Scalar,
        Fun: FnMut(&mut TensorMapMut<'_, T, 6>, &[F], &[F], &[F], usize) -> Result<()>,
    {
        Self { f, flops_per_triplet: 0.0, bytes_per_triplet: 0.0 }
    }

    pub fn with_cost(mut self, flops_per_triplet: f64, bytes_per_triplet: f64) -> Self {
        self.flops_per_triplet = flops_per_triplet;
        self.bytes_per_triplet = bytes_per_triplet;
        self
    }
}

impl<T, F, Fun> NucleonKernel<T, F> for FnKernel<Fun>
where
    T: Scalar,
    Fun: FnMut(&mut TensorMapMut<'_, T, 6>, &[F], &[F], &[F], usize) -> Result<()>,
{
    fn apply(
        &mut self,
        out: &mut TensorMapMut<'_, T, 6>,
        left: &[F],
        right: &[F],
        q3: &[F],
        orthog_dim: usize,
    ) -> Result<Duration> {
        let start = Instant::now();
        (self.f)(out, left, right, q3, orthog_dim)?;
        Ok(start.elapsed())
    }

    fn flops(&self, bi: usize, bj: usize, bk: usize) -> f64 {
        self.flops_per_triplet * (bi * bj * bk) as f64
    }

    fn bytes(&self, bi: usize, bj: usize, bk: usize) -> f64 {
        self.bytes_per_triplet * (bi * bj * bk) as f64
    }
}
