// src/contraction/linalg.rs
/*!
Dense linear-algebra helpers for spin and meson matrices.

- `acc_tr_mul(acc, a, b)`: `acc += tr(a·b)` without forming the product.
  The loop runs over rows of `a` (columns of `b`) when `a` is row-major and `b`
  is column-major, so both dot operands are contiguous; otherwise it runs over
  columns of `a` (rows of `b`). Each dot product is an *unconjugated* strided
  dot (`zdotu`/`cdotu` under the `blas` feature).
- `mul(res, a, b)`: `res = a·b`, reallocating `res` when its shape does not match.

Per-row partial results are combined with a rayon reduction; the caller's
accumulator is touched once, after the parallel region.
*/

use num_complex::Complex;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::math::{Layout, Matrix, Scalar};

// ======================================================================================
// ------------------------------- Strided dot descriptors ------------------------------
// ======================================================================================

/// Offset and increment of one strided vector inside a matrix buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Strided {
    pub offset: usize,
    pub inc: usize,
}

/// Row `r` of `a` and column `r` of `b`.
#[inline]
pub(crate) fn dot_row_operands<T: Scalar>(r: usize, a: &Matrix<T>, b: &Matrix<T>) -> (Strided, Strided) {
    let lhs = match a.layout() {
        Layout::RowMajor => Strided { offset: r * a.cols(), inc: 1 },
        Layout::ColMajor => Strided { offset: r, inc: a.rows() },
    };
    let rhs = match b.layout() {
        Layout::RowMajor => Strided { offset: r, inc: b.cols() },
        Layout::ColMajor => Strided { offset: r * b.rows(), inc: 1 },
    };
    (lhs, rhs)
}

/// Column `c` of `a` and row `c` of `b`.
#[inline]
pub(crate) fn dot_col_operands<T: Scalar>(c: usize, a: &Matrix<T>, b: &Matrix<T>) -> (Strided, Strided) {
    let lhs = match a.layout() {
        Layout::RowMajor => Strided { offset: c, inc: a.cols() },
        Layout::ColMajor => Strided { offset: c * a.rows(), inc: 1 },
    };
    let rhs = match b.layout() {
        Layout::RowMajor => Strided { offset: c * b.cols(), inc: 1 },
        Layout::ColMajor => Strided { offset: c, inc: b.rows() },
    };
    (lhs, rhs)
}

// ======================================================================================
// ------------------------------------ Kernel trait ------------------------------------
// ======================================================================================

/// Scalars with a dot/GEMM implementation. Complex types dispatch to CBLAS
/// under the `blas` feature; everything else uses the native loops.
pub trait LinalgScalar: Scalar {
    /// Unconjugated dot of two strided vectors of length `n`, in double precision.
    fn dotu(n: usize, x: &[Self], xs: Strided, y: &[Self], ys: Strided) -> Complex<f64> {
        native_dotu(n, x, xs, y, ys)
    }

    /// `res = a·b` with `res` already shaped `a.rows × b.cols`.
    fn gemm(res: &mut Matrix<Self>, a: &Matrix<Self>, b: &Matrix<Self>) {
        native_gemm(res, a, b)
    }
}

impl LinalgScalar for f32 {}
impl LinalgScalar for f64 {}

#[cfg(not(feature = "blas"))]
impl LinalgScalar for Complex<f32> {}
#[cfg(not(feature = "blas"))]
impl LinalgScalar for Complex<f64> {}

#[inline]
fn native_dotu<T: Scalar>(n: usize, x: &[T], xs: Strided, y: &[T], ys: Strided) -> Complex<f64> {
    let mut acc = Complex::new(0.0, 0.0);
    for q in 0..n {
        acc += x[xs.offset + q * xs.inc].to_c64() * y[ys.offset + q * ys.inc].to_c64();
    }
    acc
}

fn native_gemm<T: Scalar>(res: &mut Matrix<T>, a: &Matrix<T>, b: &Matrix<T>) {
    let (n_r, n_c, n_k) = (a.rows(), b.cols(), a.cols());
    let rows: Vec<Vec<T>> = (0..n_r)
        .into_par_iter()
        .map(|r| {
            (0..n_c)
                .map(|c| (0..n_k).map(|k| a.get(r, k) * b.get(k, c)).sum())
                .collect()
        })
        .collect();
    for (r, row) in rows.into_iter().enumerate() {
        for (c, v) in row.into_iter().enumerate() {
            res.set(r, c, v);
        }
    }
}

#[cfg(feature = "blas")]
mod blas {
    use super::{native_gemm, LinalgScalar, Strided};
    use crate::math::{Layout, Matrix};
    use num_complex::Complex;

    macro_rules! impl_blas {
        ($t:ty, $dotu:ident, $gemm:ident) => {
            impl LinalgScalar for Complex<$t> {
                fn dotu(n: usize, x: &[Self], xs: Strided, y: &[Self], ys: Strided) -> Complex<f64> {
                    let mut out = [Complex::<$t>::new(0.0, 0.0)];
                    // SAFETY: offsets and increments are derived from the matrix shapes,
                    // so every accessed element lies inside `x` and `y`.
                    unsafe {
                        cblas::$dotu(
                            n as i32,
                            &x[xs.offset..],
                            xs.inc as i32,
                            &y[ys.offset..],
                            ys.inc as i32,
                            &mut out,
                        );
                    }
                    Complex::new(out[0].re as f64, out[0].im as f64)
                }

                fn gemm(res: &mut Matrix<Self>, a: &Matrix<Self>, b: &Matrix<Self>) {
                    let layout = a.layout();
                    if b.layout() != layout || res.layout() != layout {
                        return native_gemm(res, a, b);
                    }
                    let one = Complex::<$t>::new(1.0, 0.0);
                    let zero = Complex::<$t>::new(0.0, 0.0);
                    let (m, n, k) = (a.rows() as i32, b.cols() as i32, a.cols() as i32);
                    let (cl, lda, ldb, ldc) = match layout {
                        Layout::RowMajor => (cblas::Layout::RowMajor, k, n, n),
                        Layout::ColMajor => (cblas::Layout::ColumnMajor, m, k, m),
                    };
                    // SAFETY: `res` is shaped `a.rows × b.cols` by the caller and all
                    // three buffers share one storage order.
                    unsafe {
                        cblas::$gemm(
                            cl,
                            cblas::Transpose::None,
                            cblas::Transpose::None,
                            m, n, k,
                            one, a.data(), lda,
                            b.data(), ldb,
                            zero, res.data_mut(), ldc,
                        );
                    }
                }
            }
        };
    }

    impl_blas!(f32, cdotu_sub, cgemm);
    impl_blas!(f64, zdotu_sub, zgemm);
}

// ======================================================================================
// ------------------------------------ Public API --------------------------------------
// ======================================================================================

/// `acc += tr(a·b)`.
pub fn acc_tr_mul<C: Scalar, T: LinalgScalar>(acc: &mut C, a: &Matrix<T>, b: &Matrix<T>) -> Result<()> {
    if a.cols() != b.rows() || a.rows() != b.cols() {
        return Err(Error::shape("acc_tr_mul", &[a.cols(), a.rows()], &[b.rows(), b.cols()]));
    }
    let total: Complex<f64> = if a.layout() == Layout::RowMajor && b.layout() == Layout::ColMajor {
        (0..a.rows())
            .into_par_iter()
            .map(|r| {
                let (xs, ys) = dot_row_operands(r, a, b);
                T::dotu(a.cols(), a.data(), xs, b.data(), ys)
            })
            .sum()
    } else {
        (0..a.cols())
            .into_par_iter()
            .map(|c| {
                let (xs, ys) = dot_col_operands(c, a, b);
                T::dotu(a.rows(), a.data(), xs, b.data(), ys)
            })
            .sum()
    };
    *acc = *acc + C::from_c64(total);
    Ok(())
}

/// `res = a·b`. `res` is reallocated to `a.rows × b.cols` if needed.
pub fn mul<T: LinalgScalar>(res: &mut Matrix<T>, a: &Matrix<T>, b: &Matrix<T>) -> Result<()> {
    if a.cols() != b.rows() {
        return Err(Error::shape("mul", &[a.cols()], &[b.rows()]));
    }
    res.resize(a.rows(), b.cols());
    T::gemm(res, a, b);
    Ok(())
}

/// Flop count of [`acc_tr_mul`].
#[inline]
pub fn acc_tr_mul_flops<T: Scalar>(a: &Matrix<T>, _b: &Matrix<T>) -> f64 {
    8.0 * (a.rows() * a.cols()) as f64
}

/// Flop count of [`mul`].
#[inline]
pub fn mul_flops<T: Scalar>(a: &Matrix<T>, _b: &Matrix<T>) -> f64 {
    let (nr, nc) = (a.rows() as f64, a.cols() as f64);
    nr * nr * (6.0 * nc + 2.0 * (nc - 1.0))
}
