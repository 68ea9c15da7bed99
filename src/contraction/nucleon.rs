// src/contraction/nucleon.rs
/*!
Two- and three-point **nucleon contractions** of rank-4 fields `A[μ, i, j, k]`.

The diquark antisymmetrisation in `(i, k)` is factored out of the inner loops:

```text
conj(B[ν,i,j,k]) − conj(B[ν,k,j,i])                       (two-point)
(A[μ,i,j,k] − A[μ,k,j,i]) · (conj(B[ν,i,j,m]) − conj(B[ν,m,j,i]))   (three-point)
```

The second line expands to the four-term sum of the three-point contraction.
Both forms vanish exactly (not just to rounding) whenever the operand is symmetric
under `i ↔ k`, since the difference is taken before any multiplication.

All accumulation happens in `Complex<f64>`; each output entry is updated once.
*/

use num_complex::Complex;
use rayon::prelude::*;

use super::projector::{tr_proj_tplus, tr_proj_tplus_pxy};
use crate::error::{Error, Result};
use crate::math::tensor::Tensor;
use crate::math::{ComplexD, Matrix, Scalar};

type C64 = Complex<f64>;

/// Shape `[n_s, n_i, n_j, n_k]` of a rank-4 nucleon field, with `n_i == n_k`.
fn nucleon_dims<T: Scalar>(op: &'static str, a: &Tensor<T>) -> Result<[usize; 4]> {
    if a.rank() != 4 {
        return Err(Error::shape(op, &[0, 0, 0, 0], a.shape()));
    }
    let d = [a.dim(0), a.dim(1), a.dim(2), a.dim(3)];
    if d[1] != d[3] {
        return Err(Error::shape(op, &[d[0], d[1], d[2], d[1]], &d));
    }
    Ok(d)
}

fn check_pair<A: Scalar, B: Scalar>(op: &'static str, a: &Tensor<A>, b: &Tensor<B>) -> Result<[usize; 4]> {
    let d = nucleon_dims(op, a)?;
    if a.shape() != b.shape() {
        return Err(Error::shape(op, a.shape(), b.shape()));
    }
    Ok(d)
}

fn check_out<C: Scalar>(op: &'static str, out: &Matrix<C>, ns: usize) -> Result<()> {
    if out.rows() != ns || out.cols() != ns {
        return Err(Error::shape(op, &[ns, ns], &[out.rows(), out.cols()]));
    }
    Ok(())
}

/// Widen a tensor to double precision once, so the inner loops index a flat `C64` slice.
fn widen<T: Scalar>(t: &Tensor<T>) -> Vec<C64> {
    t.data().par_iter().map(|x| x.to_c64()).collect()
}

// ======================================================================================
// ------------------------------------ Two-point ---------------------------------------
// ======================================================================================

/// `out[μ, ν] += Σ_{i,j,k} A[μ,i,j,k] · (conj(B[ν,i,j,k]) − conj(B[ν,k,j,i]))`.
///
/// `a` and `b` must share the shape `[n_s, n, n_j, n]`; `out` must be `n_s × n_s`.
/// Parallel over `μ`.
pub fn contract_2pt<C: Scalar, A: Scalar, B: Scalar>(
    out: &mut Matrix<C>,
    a: &Tensor<A>,
    b: &Tensor<B>,
) -> Result<()> {
    let [ns, ni, nj, nk] = check_pair("contract_2pt", a, b)?;
    check_out("contract_2pt", out, ns)?;

    let (sa, sb) = (a.strides(), b.strides());
    let (a64, b64) = (widen(a), widen(b));

    let rows: Vec<Vec<C64>> = (0..ns)
        .into_par_iter()
        .map(|mu| {
            let mut row = vec![C64::new(0.0, 0.0); ns];
            for (nu, acc) in row.iter_mut().enumerate() {
                for i in 0..ni {
                    for j in 0..nj {
                        for k in 0..nk {
                            let av = a64[mu * sa[0] + i * sa[1] + j * sa[2] + k * sa[3]];
                            let b_ijk = b64[nu * sb[0] + i * sb[1] + j * sb[2] + k * sb[3]];
                            let b_kji = b64[nu * sb[0] + k * sb[1] + j * sb[2] + i * sb[3]];
                            *acc += av * (b_ijk.conj() - b_kji.conj());
                        }
                    }
                }
            }
            row
        })
        .collect();

    for (mu, row) in rows.into_iter().enumerate() {
        for (nu, v) in row.into_iter().enumerate() {
            out.add_at(mu, nu, C::from_c64(v));
        }
    }
    Ok(())
}

// ======================================================================================
// ----------------------------------- Three-point --------------------------------------
// ======================================================================================

/// Three-point "up" contraction through a meson matrix `c[k, m]`:
///
/// ```text
/// out[μ,ν] += Σ c[k,m] · ( A[μ,i,j,k]·conj(B[ν,i,j,m]) − A[μ,i,j,k]·conj(B[ν,m,j,i])
///                         + A[μ,k,j,i]·conj(B[ν,m,j,i]) − A[μ,k,j,i]·conj(B[ν,i,j,m]) )
/// ```
///
/// `c` must be square with `c.rows == n_i == n_k`. The `m`-sum is done once per `ν`,
/// then the `(μ, ν)` entries are reduced in parallel.
pub fn contract_3pt_up<Co: Scalar, A: Scalar, M: Scalar, B: Scalar>(
    out: &mut Matrix<Co>,
    a: &Tensor<A>,
    c: &Matrix<M>,
    b: &Tensor<B>,
) -> Result<()> {
    let [ns, ni, nj, nk] = check_pair("contract_3pt_up", a, b)?;
    check_out("contract_3pt_up", out, ns)?;
    if !c.is_square() || c.rows() != ni || c.rows() != nk {
        return Err(Error::shape("contract_3pt_up", &[ni, nk], &[c.rows(), c.cols()]));
    }
    let nm = c.cols();

    let (sa, sb) = (a.strides(), b.strides());
    let (a64, b64) = (widen(a), widen(b));
    let c64: Vec<C64> = (0..nk * nm).map(|q| c.get(q / nm, q % nm).to_c64()).collect();
    let vol = ni * nj * nk;

    // w[ν, i, j, k] = Σ_m c[k, m] · (conj(B[ν,i,j,m]) − conj(B[ν,m,j,i])), independent of μ.
    let mut w = vec![C64::new(0.0, 0.0); ns * vol];
    w.par_chunks_mut(vol).enumerate().for_each(|(nu, w_nu)| {
        for i in 0..ni {
            for j in 0..nj {
                for k in 0..nk {
                    let mut inner = C64::new(0.0, 0.0);
                    for m in 0..nm {
                        let db = b64[nu * sb[0] + i * sb[1] + j * sb[2] + m * sb[3]].conj()
                            - b64[nu * sb[0] + m * sb[1] + j * sb[2] + i * sb[3]].conj();
                        inner += c64[k * nm + m] * db;
                    }
                    w_nu[(i * nj + j) * nk + k] = inner;
                }
            }
        }
    });

    let entries: Vec<C64> = (0..ns * ns)
        .into_par_iter()
        .map(|flat| {
            let (mu, nu) = (flat / ns, flat % ns);
            let w_nu = &w[nu * vol..(nu + 1) * vol];
            let mut acc = C64::new(0.0, 0.0);
            for i in 0..ni {
                for j in 0..nj {
                    for k in 0..nk {
                        let da = a64[mu * sa[0] + i * sa[1] + j * sa[2] + k * sa[3]]
                            - a64[mu * sa[0] + k * sa[1] + j * sa[2] + i * sa[3]];
                        acc += da * w_nu[(i * nj + j) * nk + k];
                    }
                }
            }
            acc
        })
        .collect();

    for (flat, v) in entries.into_iter().enumerate() {
        out.add_at(flat / ns, flat % ns, Co::from_c64(v));
    }
    Ok(())
}

// ======================================================================================
// ----------------------------- Projected scalar forms ---------------------------------
// ======================================================================================

/// `acc += tr(proj_tplus(contract_2pt(0, a, b)))`.
pub fn contract_tplus<C: Scalar, A: Scalar, B: Scalar>(acc: &mut C, a: &Tensor<A>, b: &Tensor<B>) -> Result<()> {
    let ns = nucleon_dims("contract_tplus", a)?[0];
    let mut spin = Matrix::<ComplexD>::new(ns, ns);
    contract_2pt(&mut spin, a, b)?;
    tr_proj_tplus(acc, &spin)
}

/// `acc += tr(proj_tplus_pxy(contract_3pt_up(0, a, c, b)))`.
pub fn contract_3pt_tplus_pxy<Co: Scalar, A: Scalar, M: Scalar, B: Scalar>(
    acc: &mut Co,
    a: &Tensor<A>,
    c: &Matrix<M>,
    b: &Tensor<B>,
) -> Result<()> {
    let ns = nucleon_dims("contract_3pt_tplus_pxy", a)?[0];
    let mut spin = Matrix::<ComplexD>::new(ns, ns);
    contract_3pt_up(&mut spin, a, c, b)?;
    tr_proj_tplus_pxy(acc, &spin)
}

// ======================================================================================
// ------------------------------------ Cost models -------------------------------------
// ======================================================================================

pub fn contract_2pt_flops<A: Scalar, B: Scalar>(a: &Tensor<A>, _b: &Tensor<B>) -> f64 {
    if a.rank() != 4 {
        return 0.0;
    }
    let ns = a.dim(0) as f64;
    8.0 * ns * ns * (a.dim(1) * a.dim(2) * a.dim(3)) as f64
}

pub fn contract_3pt_flops<A: Scalar, M: Scalar, B: Scalar>(a: &Tensor<A>, c: &Matrix<M>, b: &Tensor<B>) -> f64 {
    contract_2pt_flops(a, b) * c.cols() as f64
}
