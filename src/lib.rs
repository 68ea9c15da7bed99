//! Tiled all-to-all nucleon block contractions.
//!
//! - [`contraction`]: two/three-point nucleon contractions, spin projectors and
//!   the trace/GEMM helpers they use.
//! - [`io`]: per-external-index result files in a chunked, checksummed container.
//! - [`kernel`]: the kernel trait the engine drives, plus reference kernels.
//! - [`engine`]: the two-level tiled driver that runs a kernel over all mode
//!   triplets and streams finished tiles to disk.
//! - [`lattice`]: processor grids and spinor mode fields.
//! - [`math`]: scalars, dense tensors, tensor views and spin matrices.

pub mod contraction;
pub mod engine;
pub mod error;
pub mod io;
pub mod kernel;
pub mod lattice;
pub mod math;
pub mod timer;

/// Number of spin components.
pub const NS: usize = 4;

pub use engine::{BlockComputation, EngineConfig, IoMode};
pub use error::{Error, Result};

#[cfg(test)]
mod tests;
