// src/lattice/field.rs
//! Local part of a spinor field on a distributed 4-D lattice.
//!
//! Storage is `data[site * NS + spin]`, sites row-major over the local dims
//! (last axis fastest).

use rayon::prelude::*;

use super::grid::Grid;
use crate::error::{Error, Result};
use crate::math::Scalar;
use crate::NS;

#[derive(Debug, Clone, PartialEq)]
pub struct SpinorField<T: Scalar> {
    local_dims: [usize; 4],
    origin: [usize; 4],
    data: Vec<T>,
}

fn dims4(op: &'static str, v: &[usize]) -> Result<[usize; 4]> {
    <[usize; 4]>::try_from(v).map_err(|_| Error::shape(op, &[4], &[v.len()]))
}

impl<T: Scalar> SpinorField<T> {
    /// Zero field on this rank's local volume.
    pub fn new(grid: &dyn Grid) -> Result<Self> {
        let local_dims = dims4("SpinorField::new", grid.local_dims())?;
        let mut origin = [0; 4];
        for (d, o) in origin.iter_mut().enumerate() {
            *o = grid.local_origin(d);
        }
        let volume = local_dims.iter().product::<usize>();
        Ok(Self { local_dims, origin, data: vec![T::zero(); volume * NS] })
    }

    /// Field whose value at global coordinate `x` and spin `s` is `f(x, s)`.
    pub fn from_fn<F>(grid: &dyn Grid, f: F) -> Result<Self>
    where
        F: Fn([usize; 4], usize) -> T + Sync,
    {
        let mut field = Self::new(grid)?;
        let (dims, origin) = (field.local_dims, field.origin);
        field.data.par_chunks_mut(NS).enumerate().for_each(|(site, spinor)| {
            let x = global_of(site_coor(&dims, site), &origin);
            for (s, v) in spinor.iter_mut().enumerate() {
                *v = f(x, s);
            }
        });
        Ok(field)
    }

    #[inline]
    pub fn local_dims(&self) -> [usize; 4] {
        self.local_dims
    }

    /// Global coordinate of the local site `[0, 0, 0, 0]`.
    #[inline]
    pub fn origin(&self) -> [usize; 4] {
        self.origin
    }

    #[inline]
    pub fn volume(&self) -> usize {
        self.data.len() / NS
    }

    #[inline]
    pub fn spinor(&self, site: usize) -> &[T] {
        &self.data[site * NS..(site + 1) * NS]
    }

    /// Local coordinate of `site`.
    #[inline]
    pub fn site_coor(&self, site: usize) -> [usize; 4] {
        site_coor(&self.local_dims, site)
    }

    /// Global coordinate of `site`.
    #[inline]
    pub fn global_coor(&self, site: usize) -> [usize; 4] {
        global_of(self.site_coor(site), &self.origin)
    }

    /// Local sites with local coordinate `t` along `dim`.
    pub fn slice_sites(&self, dim: usize, t: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.volume()).filter(move |&site| self.site_coor(site)[dim] == t)
    }

    /// Sum of spin component `s` over the local sites with coordinate `t` along `dim`.
    pub fn slice_sum(&self, dim: usize, t: usize, s: usize) -> T {
        self.slice_sites(dim, t).map(|site| self.spinor(site)[s]).sum()
    }
}

#[inline]
fn site_coor(dims: &[usize; 4], mut site: usize) -> [usize; 4] {
    let mut x = [0; 4];
    for d in (0..4).rev() {
        x[d] = site % dims[d];
        site /= dims[d];
    }
    x
}

#[inline]
fn global_of(x: [usize; 4], origin: &[usize; 4]) -> [usize; 4] {
    [x[0] + origin[0], x[1] + origin[1], x[2] + origin[2], x[3] + origin[3]]
}
