// src/math/tensor/map.rs
/*!
Fixed-rank **row-major views** over borrowed buffers.

The blocked engine owns two flat buffers for its lifetime and re-interprets a
prefix of each as a six-axis tensor on every tile, because the tile shape
changes at the remainder edges. These views do exactly that: no allocation, a
shape checked once at construction, and strides computed from the shape.

- `TensorMap<'a, T, R>`: read-only view.
- `TensorMapMut<'a, T, R>`: mutable view.

Only the leading `shape.iter().product()` elements of the buffer are covered.
*/

use crate::error::{Error, Result};

#[inline]
fn strides_of<const R: usize>(shape: &[usize; R]) -> [usize; R] {
    let mut strides = [1usize; R];
    for d in (0..R.saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }
    strides
}

#[inline]
fn checked_len<const R: usize>(op: &'static str, shape: &[usize; R], available: usize) -> Result<usize> {
    let len = shape.iter().product::<usize>();
    if len > available {
        return Err(Error::shape(op, &[len], &[available]));
    }
    Ok(len)
}

#[inline(always)]
fn flat<const R: usize>(shape: &[usize; R], strides: &[usize; R], idx: [usize; R]) -> usize {
    let mut k = 0usize;
    for d in 0..R {
        debug_assert!(idx[d] < shape[d], "index {} out of bounds for axis {d} of extent {}", idx[d], shape[d]);
        k += idx[d] * strides[d];
    }
    k
}

// ======================================================================================
// ------------------------------------ Read-only view ----------------------------------
// ======================================================================================

#[derive(Debug, Clone, Copy)]
pub struct TensorMap<'a, T, const R: usize> {
    data: &'a [T],
    shape: [usize; R],
    strides: [usize; R],
}

impl<'a, T: Copy, const R: usize> TensorMap<'a, T, R> {
    /// View the leading elements of `data` with `shape`.
    pub fn new(data: &'a [T], shape: [usize; R]) -> Result<Self> {
        let len = checked_len("TensorMap::new", &shape, data.len())?;
        Ok(Self { data: &data[..len], strides: strides_of(&shape), shape })
    }

    #[inline(always)]
    pub fn shape(&self) -> [usize; R] {
        self.shape
    }

    #[inline(always)]
    pub fn dim(&self, d: usize) -> usize {
        self.shape[d]
    }

    #[inline(always)]
    pub fn index(&self, idx: [usize; R]) -> usize {
        flat(&self.shape, &self.strides, idx)
    }

    #[inline(always)]
    pub fn get(&self, idx: [usize; R]) -> T {
        self.data[self.index(idx)]
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }
}

// ======================================================================================
// ------------------------------------- Mutable view -----------------------------------
// ======================================================================================

#[derive(Debug)]
pub struct TensorMapMut<'a, T, const R: usize> {
    data: &'a mut [T],
    shape: [usize; R],
    strides: [usize; R],
}

impl<'a, T: Copy, const R: usize> TensorMapMut<'a, T, R> {
    /// Mutable view of the leading elements of `data` with `shape`.
    pub fn new(data: &'a mut [T], shape: [usize; R]) -> Result<Self> {
        let len = checked_len("TensorMapMut::new", &shape, data.len())?;
        Ok(Self { data: &mut data[..len], strides: strides_of(&shape), shape })
    }

    #[inline(always)]
    pub fn shape(&self) -> [usize; R] {
        self.shape
    }

    #[inline(always)]
    pub fn dim(&self, d: usize) -> usize {
        self.shape[d]
    }

    #[inline(always)]
    pub fn index(&self, idx: [usize; R]) -> usize {
        flat(&self.shape, &self.strides, idx)
    }

    #[inline(always)]
    pub fn get(&self, idx: [usize; R]) -> T {
        self.data[self.index(idx)]
    }

    #[inline(always)]
    pub fn set(&mut self, idx: [usize; R], val: T) {
        let k = self.index(idx);
        self.data[k] = val;
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[T] {
        self.data
    }

    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.data
    }

    /// Reborrow as a read-only view.
    #[inline]
    pub fn view(&self) -> TensorMap<'_, T, R> {
        TensorMap { data: self.data, shape: self.shape, strides: self.strides }
    }
}
