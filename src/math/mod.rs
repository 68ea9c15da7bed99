pub mod matrix;
pub mod scalar;
pub mod tensor;

pub use matrix::{Layout, Matrix};
pub use scalar::{ComplexD, ComplexF, Scalar};
