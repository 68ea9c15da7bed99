// src/math/tensor/dense.rs
/*!
A **general-purpose N-dimensional dense tensor** backed by a flat `Vec<T>`.

This is the owning container for the rank-4 nucleon fields `A[μ, i, j, k]`
consumed by the contraction primitives, and for the per-time-slice tensors
produced by block loads.

Goals:
- **Performance-first**: contiguous memory layout with cache-friendly linear indexing.
- **Strict bounds**: indices are checked against the shape (no periodic wrap;
  mode indices are not lattice coordinates).
- **Parallelism**: `rayon`-powered in-place maps/zips and elementwise arithmetic.
- **Type-agnostic**: generic over the unified `Scalar` trait (real or complex).

# Highlights

- `Tensor<T>::new(shape)`: zero-initialized tensor of shape `shape`.
- `Tensor<T>::from_fn(shape, f)`: build from a function of the multi-index.
- `index`, `get`, `get_mut`, `set`: row-major multi-index access.
- `par_map_in_place`, `par_zip_with_inplace`: parallel in-place transforms.
- `Add/Sub`: parallel elementwise binary ops with shape checks.
- `cast_to::<U>()`: whole-tensor precision conversion.
*/

use std::ops::{Add, Sub};

use rayon::prelude::*;
use serde::Serialize;

use super::super::scalar::Scalar;
use crate::error::{Error, Result};

//===================================================================
// -------------------------- Basic Struct --------------------------
//===================================================================

/// A dense N-D tensor with row-major (C-style) linearization.
///
/// # Invariants
/// - `data.len() == shape.iter().product()`.
/// - `strides[d] == shape[d+1..].iter().product()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tensor<T: Scalar> {
    shape: Vec<usize>,
    strides: Vec<usize>,
    data: Vec<T>,
}

#[inline]
pub(crate) fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }
    strides
}

impl<T: Scalar> Tensor<T> {
    /// Create a new tensor with the given `shape`, filled with zeros.
    #[inline]
    pub fn new(shape: Vec<usize>) -> Self {
        let size = shape.iter().product::<usize>();
        Self {
            strides: row_major_strides(&shape),
            shape,
            data: vec![T::zero(); size],
        }
    }

    /// Wrap an existing row-major buffer. Fails if the length does not match the shape.
    pub fn from_vec(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        let size = shape.iter().product::<usize>();
        if data.len() != size {
            return Err(Error::shape("Tensor::from_vec", &[size], &[data.len()]));
        }
        Ok(Self { strides: row_major_strides(&shape), shape, data })
    }

    /// Build a tensor by evaluating `f` at every multi-index (parallel).
    pub fn from_fn<F>(shape: Vec<usize>, f: F) -> Self
    where
        F: Fn(&[usize]) -> T + Sync + Send,
    {
        let mut out = Self::new(shape);
        let dims = out.shape.clone();
        out.data.par_iter_mut().enumerate().for_each(|(k, x)| {
            let idx = unravel(k, &dims);
            *x = f(&idx);
        });
        out
    }

    /// Number of elements.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Rank (number of axes).
    #[inline(always)]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    #[inline(always)]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Extent of axis `d`.
    #[inline(always)]
    pub fn dim(&self, d: usize) -> usize {
        self.shape[d]
    }

    #[inline(always)]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    #[inline(always)]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline(always)]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[inline]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

/// Row-major linear index -> multi-index.
#[inline]
fn unravel(mut rem: usize, dims: &[usize]) -> Vec<usize> {
    let mut idx = vec![0usize; dims.len()];
    for ax in (0..dims.len()).rev() {
        let d = dims[ax];
        idx[ax] = rem % d;
        rem /= d;
    }
    idx
}

//===================================================================
// ------------------------ Indexing & Access -----------------------
//===================================================================

impl<T: Scalar> Tensor<T> {
    /// Row-major flat index. Rank and bounds are debug-asserted.
    #[inline(always)]
    pub fn index(&self, indices: &[usize]) -> usize {
        debug_assert_eq!(indices.len(), self.shape.len(), "Index rank mismatch");
        let mut flat = 0usize;
        for ((&a, &dim), &stride) in indices.iter().zip(&self.shape).zip(&self.strides) {
            debug_assert!(a < dim, "index {a} out of bounds for axis of extent {dim}");
            flat += a * stride;
        }
        flat
    }

    #[inline(always)]
    pub fn get(&self, indices: &[usize]) -> T {
        self.data[self.index(indices)]
    }

    #[inline(always)]
    pub fn get_mut(&mut self, indices: &[usize]) -> &mut T {
        let k = self.index(indices);
        &mut self.data[k]
    }

    #[inline(always)]
    pub fn set(&mut self, indices: &[usize], val: T) {
        let k = self.index(indices);
        self.data[k] = val;
    }
}

//===================================================================
// ------------------------- Parallel Ops ---------------------------
//===================================================================

impl<T: Scalar> Tensor<T> {
    /// Parallel in-place map with a pure function.
    #[inline]
    pub fn par_map_in_place<F>(&mut self, f: F)
    where
        F: Fn(T) -> T + Sync + Send,
    {
        self.data.par_iter_mut().for_each(|x| *x = f(*x));
    }

    /// Parallel in-place zip: `self[k] <- f(self[k], other[k])`.
    pub fn par_zip_with_inplace<F>(&mut self, other: &Tensor<T>, f: F) -> Result<()>
    where
        F: Fn(T, T) -> T + Sync + Send,
    {
        if self.shape != other.shape {
            return Err(Error::shape("Tensor::par_zip_with_inplace", &self.shape, &other.shape));
        }
        self.data
            .par_iter_mut()
            .zip(other.data.par_iter())
            .for_each(|(a, &b)| *a = f(*a, b));
        Ok(())
    }

    /// Whole-tensor precision conversion (parallel).
    pub fn cast_to<U: Scalar>(&self) -> Tensor<U> {
        Tensor {
            shape: self.shape.clone(),
            strides: self.strides.clone(),
            data: self.data.par_iter().map(|&x| x.cast::<U>()).collect(),
        }
    }
}

//===================================================================
// ------------------------- Arithmetic Ops -------------------------
//===================================================================

macro_rules! impl_tensor_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl<T: Scalar> $trait for Tensor<T> {
            type Output = Self;

            /// Parallel elementwise binary op. Panics on shape mismatch.
            #[inline]
            fn $method(self, rhs: Self) -> Self::Output {
                assert_eq!(self.shape, rhs.shape, "Tensor shape mismatch");
                let data = self
                    .data
                    .into_par_iter()
                    .zip(rhs.data.into_par_iter())
                    .map(|(x, y)| x $op y)
                    .collect();
                Self { shape: self.shape, strides: self.strides, data }
            }
        }
    };
}

impl_tensor_op!(Add, add, +);
impl_tensor_op!(Sub, sub, -);
