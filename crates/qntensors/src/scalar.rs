//! Scalar trait for tensor element types.

use faer_traits::ComplexField;
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

pub use faer::c64;

/// Trait for scalar types supported by qntensors.
///
/// This trait wraps faer's `ComplexField` with additional bounds
/// required for block-sparse tensor operations. `Send + Sync` are
/// needed because dense kernels run on a worker pool; the arithmetic
/// bounds let per-block kernels use plain operators.
pub trait Scalar:
    ComplexField
    + Copy
    + Debug
    + Default
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// The real type associated with this scalar. Shadows the supertrait's
    /// associated type of the same name, so uses must be written
    /// `<T as Scalar>::Real`.
    type Real: Scalar + PartialOrd;

    /// Returns the additive identity (zero).
    fn zero() -> Self {
        Self::default()
    }

    /// Returns the multiplicative identity (one).
    fn one() -> Self;

    /// Lift a real value into this scalar type.
    fn from_real(re: <Self as Scalar>::Real) -> Self;

    /// Complex conjugate (identity for real types).
    fn conj_val(self) -> Self;

    /// Squared magnitude, as the real type.
    fn abs_sq(self) -> <Self as Scalar>::Real;

    /// Real part.
    fn real_part(self) -> <Self as Scalar>::Real;

    /// Square root of a non-negative real value.
    fn sqrt_real(re: <Self as Scalar>::Real) -> <Self as Scalar>::Real;
}

impl Scalar for f64 {
    type Real = f64;

    fn one() -> Self {
        1.0
    }

    fn from_real(re: f64) -> Self {
        re
    }

    fn conj_val(self) -> Self {
        self
    }

    fn abs_sq(self) -> f64 {
        self * self
    }

    fn real_part(self) -> f64 {
        self
    }

    fn sqrt_real(re: f64) -> f64 {
        re.sqrt()
    }
}

impl Scalar for c64 {
    type Real = f64;

    fn one() -> Self {
        c64::new(1.0, 0.0)
    }

    fn from_real(re: f64) -> Self {
        c64::new(re, 0.0)
    }

    fn conj_val(self) -> Self {
        c64::new(self.re, -self.im)
    }

    fn abs_sq(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    fn real_part(self) -> f64 {
        self.re
    }

    fn sqrt_real(re: f64) -> f64 {
        re.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer_traits::ComplexField;

    #[test]
    fn test_f64_is_real() {
        assert!(<f64 as ComplexField>::IS_REAL);
    }

    #[test]
    fn test_c64_is_not_real() {
        assert!(!<c64 as ComplexField>::IS_REAL);
    }

    #[test]
    fn test_zero_one() {
        assert_eq!(f64::zero(), 0.0);
        assert_eq!(f64::one(), 1.0);
        assert_eq!(c64::zero(), c64::new(0.0, 0.0));
        assert_eq!(c64::one(), c64::new(1.0, 0.0));
    }

    #[test]
    fn test_from_real() {
        assert_eq!(f64::from_real(2.5), 2.5);
        assert_eq!(c64::from_real(2.5), c64::new(2.5, 0.0));
    }
}
