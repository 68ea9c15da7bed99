// src/math/scalar.rs
//! A single minimal `Scalar` trait that unifies the real and complex floating
//! types the contraction pipeline computes and stores in.
//!
//! Design goals:
//! - One public trait (`Scalar`) you can bound on everywhere.
//! - Works for `f32`, `f64`, `Complex<f32>` (I/O precision) and `Complex<f64>`
//!   (compute precision).
//! - Precision casts route through `Complex<f64>`, so `ComplexD -> ComplexF -> ComplexD`
//!   is the only lossy step a value can take.
//!
//! Conventions:
//! - For reals, `Real = Self` and the imaginary part is `0`.
//! - For complex, `Real` is the underlying float (f32/f64).

use core::fmt::{Debug, Display};
use core::iter::{Product, Sum};
use num_complex::Complex;
use num_traits::{Float, Num, NumCast, One, Zero};

/// Single-precision complex, the default on-disk element type.
pub type ComplexF = Complex<f32>;
/// Double-precision complex, the default compute element type.
pub type ComplexD = Complex<f64>;

// ==============================================================================
// ------------------- Sealing: keep impl surface controlled --------------------
// ==============================================================================

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for num_complex::Complex<f32> {}
    impl Sealed for num_complex::Complex<f64> {}
}
use sealed::Sealed;


// ==============================================================================
// --------------------------------- Trait Def ----------------------------------
// ==============================================================================

/// A minimal, unified scalar trait for floating reals and complex numbers.
pub trait Scalar:
    Num
    + NumCast
    + Zero
    + One
    + Copy
    + Clone
    + Default
    + Send
    + Sync
    + 'static
    + Debug
    + Display
    + Sum<Self>
    + Product<Self>
    + Sealed
{
    /// The associated *real* type: `Self` for reals, `f32`/`f64` for complex.
    type Real: Float + Default + Send + Sync + 'static + Debug + Display;

    /// Complex conjugate (identity for reals).
    fn conj(self) -> Self;

    /// Real part (`self` for reals).
    fn re(self) -> Self::Real;

    /// Imag part (0 for reals).
    fn im(self) -> Self::Real;

    /// Construct from real/imag parts (imag ignored for reals).
    fn from_re_im(re: Self::Real, im: Self::Real) -> Self;

    /// Squared magnitude as a real: `x*x` for reals, `|z|^2` for complex.
    fn norm_sqr_real(self) -> Self::Real;

    /// Widen to double-precision complex.
    fn to_c64(self) -> Complex<f64>;

    /// Narrow (or keep) from double-precision complex. Reals drop the imaginary part.
    fn from_c64(z: Complex<f64>) -> Self;

    /// Finite check on every component.
    #[inline]
    fn is_finite(self) -> bool {
        self.re().is_finite() && self.im().is_finite()
    }

    /// Precision cast to another scalar type.
    #[inline]
    fn cast<U: Scalar>(self) -> U {
        U::from_c64(self.to_c64())
    }
}


// ==============================================================================
// -------------------------------- IMPL: Real ----------------------------------
// ==============================================================================

macro_rules! impl_scalar_real {
    ($($t:ty),* $(,)?) => {$(
        impl Scalar for $t {
            type Real = $t;

            #[inline] fn conj(self) -> Self { self }
            #[inline] fn re(self) -> Self::Real { self }
            #[inline] fn im(self) -> Self::Real { 0.0 }
            #[inline] fn from_re_im(re: Self::Real, _im: Self::Real) -> Self { re }

            #[inline] fn norm_sqr_real(self) -> Self::Real { self * self }
            #[inline] fn to_c64(self) -> Complex<f64> { Complex::new(self as f64, 0.0) }
            #[inline] fn from_c64(z: Complex<f64>) -> Self { z.re as $t }
        }
    )*}
}
impl_scalar_real!(f32, f64);


// ==============================================================================
// ------------------------------- IMPL: Complex --------------------------------
// ==============================================================================

macro_rules! impl_scalar_complex {
    ($($t:ty),* $(,)?) => {$(
        impl Scalar for Complex<$t> {
            type Real = $t;

            #[inline] fn conj(self) -> Self { Complex::new(self.re, -self.im) }
            #[inline] fn re(self) -> Self::Real { self.re }
            #[inline] fn im(self) -> Self::Real { self.im }
            #[inline] fn from_re_im(re: Self::Real, im: Self::Real) -> Self { Complex::new(re, im) }

            #[inline] fn norm_sqr_real(self) -> Self::Real { self.re * self.re + self.im * self.im }
            #[inline] fn to_c64(self) -> Complex<f64> { Complex::new(self.re as f64, self.im as f64) }
            #[inline] fn from_c64(z: Complex<f64>) -> Self { Complex::new(z.re as $t, z.im as $t) }
        }
    )*}
}
impl_scalar_complex!(f32, f64);
