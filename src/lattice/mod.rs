//! Lattice-side collaborators of the engine: the processor grid and the
//! spinor mode fields fed to kernels.

pub mod field;
pub mod grid;

pub use field::SpinorField;
pub use grid::{CartesianGrid, Grid, GridLayout};
