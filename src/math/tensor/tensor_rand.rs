/*
    Fill **dense** tensors with random numbers (parallelized).

    Design goals
    ------------
    - **Thread-safe & parallel**: Every element is sampled independently in a
      `par_iter_mut()` loop. Each loop body creates its own local RNG via
      `rand::rng()` so there is no shared mutable state or locking.
    - **Complex aware**: real and imaginary parts are drawn independently;
      real tensors keep only the real draw.

    Notes
    -----
    - Parameter validation is performed by the distribution constructors and
      surfaced as `Error::InvalidConfig`.
*/

use num_complex::Complex;
use rand::rng;
use rand_distr::{Distribution, Normal, Uniform};
use rayon::prelude::*;

use super::super::scalar::Scalar;
use super::dense::Tensor;
use crate::error::{Error, Result};

/// Distribution selector for [`fill_random`].
#[derive(Debug, Clone, Copy)]
pub enum RandType {
    /// Continuous uniform on **[low, high)** for each component.
    Uniform { low: f64, high: f64 },
    /// Normal (Gaussian) with mean/std for each component.
    Normal { mean: f64, std: f64 },
}

#[inline]
fn fill_with<T, D>(tensor: &mut Tensor<T>, dist: D)
where
    T: Scalar,
    D: Distribution<f64> + Sync,
{
    tensor.data_mut().par_iter_mut().for_each(|x| {
        let mut rng_local = rng();
        let re = dist.sample(&mut rng_local);
        let im = dist.sample(&mut rng_local);
        *x = T::from_c64(Complex::new(re, im));
    });
}

/// Fill a `Tensor<T>` with random values drawn from `dist`.
pub fn fill_random<T: Scalar>(tensor: &mut Tensor<T>, dist: RandType) -> Result<()> {
    match dist {
        RandType::Uniform { low, high } => {
            let dist = Uniform::new(low, high).map_err(|e| {
                Error::InvalidConfig(format!("uniform bounds [{low}, {high}): {e}"))
            })?;
            fill_with(tensor, dist);
        }
        RandType::Normal { mean, std } => {
            let dist = Normal::new(mean, std).map_err(|e| {
                Error::InvalidConfig(format!("normal(mean={mean}, std={std}): {e}"))
            })?;
            fill_with(tensor, dist);
        }
    }
    Ok(())
}
