// src/math/matrix.rs
/*!
Dense **spin matrices** with an explicit storage order.

The trace-of-product and GEMM helpers choose their loop (and BLAS leading
dimensions) from the storage order of their operands, so the order is a
runtime property of the matrix rather than a type parameter.

- `Matrix<T>::zeros(rows, cols, layout)`, `identity(n, layout)`, `from_fn`.
- `get` / `set` by `(row, col)` independent of storage order.
- `set_block` copies a sub-matrix at an offset (used to assemble projectors).
- `trace`, `scale`, `resize`, `to_layout`.
*/

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::scalar::Scalar;
use crate::error::{Error, Result};

/// Storage order of a [`Matrix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Layout {
    #[default]
    RowMajor,
    ColMajor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matrix<T: Scalar> {
    rows: usize,
    cols: usize,
    layout: Layout,
    data: Vec<T>,
}

impl<T: Scalar> Matrix<T> {
    #[inline]
    pub fn zeros(rows: usize, cols: usize, layout: Layout) -> Self {
        Self { rows, cols, layout, data: vec![T::zero(); rows * cols] }
    }

    /// Row-major `rows × cols` zero matrix.
    #[inline]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::zeros(rows, cols, Layout::RowMajor)
    }

    pub fn identity(n: usize, layout: Layout) -> Self {
        let mut m = Self::zeros(n, n, layout);
        for d in 0..n {
            m.set(d, d, T::one());
        }
        m
    }

    pub fn from_fn<F>(rows: usize, cols: usize, layout: Layout, f: F) -> Self
    where
        F: Fn(usize, usize) -> T,
    {
        let mut m = Self::zeros(rows, cols, layout);
        for r in 0..rows {
            for c in 0..cols {
                m.set(r, c, f(r, c));
            }
        }
        m
    }

    #[inline(always)] pub fn rows(&self) -> usize { self.rows }
    #[inline(always)] pub fn cols(&self) -> usize { self.cols }
    #[inline(always)] pub fn layout(&self) -> Layout { self.layout }
    #[inline(always)] pub fn data(&self) -> &[T] { &self.data }
    #[inline(always)] pub fn data_mut(&mut self) -> &mut [T] { &mut self.data }

    #[inline(always)]
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Flat offset of `(r, c)` under the matrix's storage order.
    #[inline(always)]
    pub fn offset(&self, r: usize, c: usize) -> usize {
        debug_assert!(r < self.rows && c < self.cols, "({r}, {c}) out of bounds for {}x{}", self.rows, self.cols);
        match self.layout {
            Layout::RowMajor => r * self.cols + c,
            Layout::ColMajor => c * self.rows + r,
        }
    }

    #[inline(always)]
    pub fn get(&self, r: usize, c: usize) -> T {
        self.data[self.offset(r, c)]
    }

    #[inline(always)]
    pub fn set(&mut self, r: usize, c: usize, val: T) {
        let k = self.offset(r, c);
        self.data[k] = val;
    }

    #[inline(always)]
    pub fn add_at(&mut self, r: usize, c: usize, val: T) {
        let k = self.offset(r, c);
        self.data[k] = self.data[k] + val;
    }

    /// Reshape to `rows × cols`, zeroing the contents. No-op when the shape already matches.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        if self.rows != rows || self.cols != cols {
            self.rows = rows;
            self.cols = cols;
            self.data = vec![T::zero(); rows * cols];
        }
    }

    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    pub fn scale(&mut self, alpha: T) {
        self.data.par_iter_mut().for_each(|x| *x = *x * alpha);
    }

    pub fn trace(&self) -> T {
        (0..self.rows.min(self.cols)).map(|d| self.get(d, d)).sum()
    }

    /// Copy `block` into `self` with its top-left corner at `(r0, c0)`.
    pub fn set_block(&mut self, r0: usize, c0: usize, block: &Matrix<T>) -> Result<()> {
        if r0 + block.rows > self.rows || c0 + block.cols > self.cols {
            return Err(Error::shape(
                "Matrix::set_block",
                &[self.rows, self.cols],
                &[r0 + block.rows, c0 + block.cols],
            ));
        }
        for r in 0..block.rows {
            for c in 0..block.cols {
                self.set(r0 + r, c0 + c, block.get(r, c));
            }
        }
        Ok(())
    }

    /// Same values, other storage order.
    pub fn to_layout(&self, layout: Layout) -> Self {
        Self::from_fn(self.rows, self.cols, layout, |r, c| self.get(r, c))
    }

    pub fn cast<U: Scalar>(&self) -> Matrix<U> {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            layout: self.layout,
            data: self.data.iter().map(|&x| x.cast::<U>()).collect(),
        }
    }
}
