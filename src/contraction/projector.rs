// src/contraction/projector.rs
/*!
Dirac-basis **spin projectors** for the nucleon correlators.

- `tplus_projector(ns)`: every 2×2 corner block is the identity; `proj_tplus(a) = ½·P·a`.
- `tplus_pxy_projector(ns)`: every 2×2 corner block is `diag(0, 2)`; `proj_tplus_pxy(a) = P·a`.

Both act on `N_S × N_S` spin matrices only.
*/

use super::linalg::{mul, LinalgScalar};
use crate::error::{Error, Result};
use crate::math::{Matrix, Scalar};
use crate::NS;

fn check_spin<T: Scalar>(op: &'static str, a: &Matrix<T>) -> Result<()> {
    if a.rows() != NS || a.cols() != NS {
        return Err(Error::shape(op, &[NS, NS], &[a.rows(), a.cols()]));
    }
    Ok(())
}

/// Tile a 2×2 block over all four corners of an `N_S × N_S` matrix.
fn corner_tiled<T: Scalar>(block: &Matrix<T>, like: &Matrix<T>) -> Result<Matrix<T>> {
    let half = NS / 2;
    let mut p = Matrix::zeros(NS, NS, like.layout());
    for r0 in [0, half] {
        for c0 in [0, half] {
            p.set_block(r0, c0, block)?;
        }
    }
    Ok(p)
}

/// Unnormalised time-positive projector (`2·P_T+`), in the storage order of `like`.
pub fn tplus_projector<T: Scalar>(like: &Matrix<T>) -> Result<Matrix<T>> {
    corner_tiled(&Matrix::identity(NS / 2, like.layout()), like)
}

/// Polarised projector with `diag(0, 2)` corner blocks, in the storage order of `like`.
pub fn tplus_pxy_projector<T: Scalar>(like: &Matrix<T>) -> Result<Matrix<T>> {
    let two = T::one() + T::one();
    let block = Matrix::from_fn(NS / 2, NS / 2, like.layout(), |r, c| {
        if r == c && r == 1 { two } else { T::zero() }
    });
    corner_tiled(&block, like)
}

/// `res = ½ · P_T+ · a`.
pub fn proj_tplus<T: LinalgScalar>(res: &mut Matrix<T>, a: &Matrix<T>) -> Result<()> {
    check_spin("proj_tplus", a)?;
    let p = tplus_projector(a)?;
    mul(res, &p, a)?;
    res.scale(T::from_c64(num_complex::Complex::new(0.5, 0.0)));
    Ok(())
}

/// `res = P_T+,xy · a`.
pub fn proj_tplus_pxy<T: LinalgScalar>(res: &mut Matrix<T>, a: &Matrix<T>) -> Result<()> {
    check_spin("proj_tplus_pxy", a)?;
    let p = tplus_pxy_projector(a)?;
    mul(res, &p, a)
}

/// `acc += tr(proj_tplus(a))`.
pub fn tr_proj_tplus<C: Scalar, T: LinalgScalar>(acc: &mut C, a: &Matrix<T>) -> Result<()> {
    let mut tmp = Matrix::zeros(NS, NS, a.layout());
    proj_tplus(&mut tmp, a)?;
    *acc = *acc + tmp.trace().cast::<C>();
    Ok(())
}

/// `acc += tr(proj_tplus_pxy(a))`.
pub fn tr_proj_tplus_pxy<C: Scalar, T: LinalgScalar>(acc: &mut C, a: &Matrix<T>) -> Result<()> {
    let mut tmp = Matrix::zeros(NS, NS, a.layout());
    proj_tplus_pxy(&mut tmp, a)?;
    *acc = *acc + tmp.trace().cast::<C>();
    Ok(())
}
