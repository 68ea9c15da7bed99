//! Block I/O: the per-external-index result files and the chunked container
//! they are stored in.

pub mod block;
pub mod cache;
pub mod checksum;
#[cfg(feature = "io")]
pub mod container;

use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::math::Scalar;

pub use block::{BlockExtent, BlockIo, BlockOrigin, DATASET_NAME};
pub use cache::ChunkCache;
#[cfg(feature = "io")]
pub use container::{ChunkedFile, Dataset, DatasetDesc};

/// On-disk element type of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dtype {
    Complex64,
    Complex128,
}

impl Dtype {
    #[inline]
    pub fn size(self) -> usize {
        match self {
            Dtype::Complex64 => 8,
            Dtype::Complex128 => 16,
        }
    }
}

/// Element types that can be stored in a result dataset.
pub trait IoScalar: Scalar + bytemuck::Pod {
    const DTYPE: Dtype;
}

impl IoScalar for Complex<f32> {
    const DTYPE: Dtype = Dtype::Complex64;
}

impl IoScalar for Complex<f64> {
    const DTYPE: Dtype = Dtype::Complex128;
}
