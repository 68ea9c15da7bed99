// src/kernel/local.rs
/*!
Reference kernel over [`SpinorField`]s.

```text
out[e, s, t, i, j, k] = Σ_{x : x_orth = t} exp(−i p_e·x) · (left_i(x)ᵀ Γ right_j(x)) · q3_k(x)_s
```

`Γ` is an `N_S × N_S` diquark matrix and `p_e` an integer momentum (in units of
`2π/L`) along the three non-orthogonal axes. Each rank sums over its local
sites, then the partial tiles are combined with [`Grid::global_sum`], so every
rank ends up with the full tile over all time slices.
*/

use std::f64::consts::PI;
use std::time::{Duration, Instant};

use num_complex::Complex;
use rayon::prelude::*;

use super::NucleonKernel;
use crate::error::{Error, Result};
use crate::lattice::{Grid, SpinorField};
use crate::math::tensor::TensorMapMut;
use crate::math::{ComplexD, Matrix, Scalar};
use crate::NS;

type C64 = Complex<f64>;

pub struct LocalTripletKernel<'g> {
    grid: &'g dyn Grid,
    gamma: Matrix<ComplexD>,
    momenta: Vec<[i64; 3]>,
}

impl<'g> LocalTripletKernel<'g> {
    pub fn new(grid: &'g dyn Grid, gamma: Matrix<ComplexD>, momenta: Vec<[i64; 3]>) -> Result<Self> {
        if gamma.rows() != NS || gamma.cols() != NS {
            return Err(Error::shape("LocalTripletKernel::new", &[NS, NS], &[gamma.rows(), gamma.cols()]));
        }
        if grid.nd() != 4 {
            return Err(Error::InvalidConfig(format!("kernel needs a 4-d grid, got {}-d", grid.nd())));
        }
        Ok(Self { grid, gamma, momenta })
    }

    pub fn momenta(&self) -> &[[i64; 3]] {
        &self.momenta
    }

    fn spatial_axes(orthog_dim: usize) -> [usize; 3] {
        let mut axes = [0; 3];
        for (slot, d) in axes.iter_mut().zip((0..4).filter(|&d| d != orthog_dim)) {
            *slot = d;
        }
        axes
    }

    /// `exp(−i p·x)` with `x` a global coordinate.
    fn phase(&self, e: usize, x: [usize; 4], axes: &[usize; 3]) -> C64 {
        let dims = self.grid.global_dims();
        let arg: f64 = axes
            .iter()
            .zip(&self.momenta[e])
            .map(|(&d, &p)| 2.0 * PI * (p as f64) * (x[d] as f64) / dims[d] as f64)
            .sum();
        C64::from_polar(1.0, -arg)
    }

    fn check_fields<FT: Scalar>(&self, fields: &[SpinorField<FT>]) -> Result<()> {
        let local = self.grid.local_dims();
        for f in fields {
            if f.local_dims().as_slice() != local {
                return Err(Error::shape("LocalTripletKernel::apply", local, &f.local_dims()));
            }
        }
        Ok(())
    }

    fn volume(&self) -> f64 {
        self.grid.global_dims().iter().product::<usize>() as f64
    }
}

impl<'g, T: Scalar, FT: Scalar> NucleonKernel<T, SpinorField<FT>> for LocalTripletKernel<'g> {
    fn apply(
        &mut self,
        out: &mut TensorMapMut<'_, T, 6>,
        left: &[SpinorField<FT>],
        right: &[SpinorField<FT>],
        q3: &[SpinorField<FT>],
        orthog_dim: usize,
    ) -> Result<Duration> {
        let start = Instant::now();
        let [next, nstr, nt, bi, bj, bk] = out.shape();
        if orthog_dim >= 4 {
            return Err(Error::InvalidConfig(format!("orthogonal dimension {orthog_dim} out of range")));
        }
        let global_nt = self.grid.global_dims()[orthog_dim];
        if next > self.momenta.len() || nstr > NS || nt != global_nt {
            return Err(Error::shape(
                "LocalTripletKernel::apply",
                &[self.momenta.len(), NS, global_nt],
                &[next, nstr, nt],
            ));
        }
        if left.len() != bi || right.len() != bj || q3.len() != bk {
            return Err(Error::shape("LocalTripletKernel::apply", &[bi, bj, bk], &[left.len(), right.len(), q3.len()]));
        }
        self.check_fields(left)?;
        self.check_fields(right)?;
        self.check_fields(q3)?;

        let local_dims = self.grid.local_dims();
        let local_nt = local_dims[orthog_dim];
        let origin_t = self.grid.local_origin(orthog_dim);
        let volume: usize = local_dims.iter().product();
        let axes = Self::spatial_axes(orthog_dim);
        let slab = bi * bj * bk;

        // Sites of each local time slice, with their global coordinates.
        let mut slices: Vec<Vec<(usize, [usize; 4])>> = vec![Vec::new(); local_nt];
        if let Some(f) = left.first() {
            for site in 0..volume {
                slices[f.site_coor(site)[orthog_dim]].push((site, f.global_coor(site)));
            }
        }

        // Diquark `left_i(x)ᵀ Γ right_j(x)` for every local site.
        let gamma = &self.gamma;
        let diquark: Vec<C64> = (0..volume)
            .into_par_iter()
            .flat_map_iter(|site| {
                (0..bi * bj).map(move |ij| {
                    let (l, r) = (left[ij / bj].spinor(site), right[ij % bj].spinor(site));
                    let mut acc = C64::new(0.0, 0.0);
                    for a in 0..NS {
                        for b in 0..NS {
                            acc += l[a].to_c64() * gamma.get(a, b) * r[b].to_c64();
                        }
                    }
                    acc
                })
            })
            .collect();

        let this = &*self;
        let mut acc = vec![C64::new(0.0, 0.0); next * nstr * nt * slab];
        if slab > 0 {
            acc.par_chunks_mut(slab).enumerate().for_each(|(row, dst)| {
                let t = row % nt;
                let s = (row / nt) % nstr;
                let e = row / (nt * nstr);
                if t < origin_t || t >= origin_t + local_nt {
                    return;
                }
                for &(site, x) in &slices[t - origin_t] {
                    let ph = this.phase(e, x, &axes);
                    let dq = &diquark[site * bi * bj..(site + 1) * bi * bj];
                    for (ij, &d) in dq.iter().enumerate() {
                        let w = ph * d;
                        for (kk, q) in q3.iter().enumerate() {
                            dst[ij * bk + kk] += w * q.spinor(site)[s].to_c64();
                        }
                    }
                }
            });
        }

        self.grid.global_sum(&mut acc);
        out.as_mut_slice()
            .par_iter_mut()
            .zip(acc.par_iter())
            .for_each(|(o, a)| *o = T::from_c64(*a));
        Ok(start.elapsed())
    }

    fn flops(&self, bi: usize, bj: usize, bk: usize) -> f64 {
        let diquark = (bi * bj * NS * NS) as f64 * 14.0;
        let project = (self.momenta.len() * NS * bi * bj * bk) as f64 * 8.0;
        self.volume() * (diquark + project)
    }

    fn bytes(&self, bi: usize, bj: usize, bk: usize) -> f64 {
        let fields = ((bi + bj + bk) * NS * std::mem::size_of::<FT>()) as f64 * self.volume();
        let tile = (self.momenta.len() * NS * bi * bj * bk * std::mem::size_of::<T>()) as f64;
        fields + tile
    }
}
