//! The [`Scalar`] trait for writing AD-generic numeric code.
//!
//! Models and losses written as `fn f<T: Scalar>(x: T) -> T` work
//! transparently with plain `f64`, `Dual<f64>` and `BReverse<f64>`.

use std::fmt::{Debug, Display};
use std::ops::{Add, Div, Mul, Neg, Sub};

use ndarray::{ArrayD, ArrayViewD};
use num_traits::{Float as NumFloat, One, Zero};

use crate::breverse::BReverse;
use crate::bytecode_tape::BtapeThreadLocal;
use crate::dual::Dual;
use crate::float::Float;

/// The central trait for AD-generic numeric code.
///
/// Carries the arithmetic and the elementary functions the tape can record.
/// Anything expressible with these operations is differentiable to second
/// order by the HVP engine.
pub trait Scalar:
    Copy
    + Default
    + Debug
    + Display
    + PartialOrd
    + Send
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Zero
    + One
{
    /// The underlying primitive float type.
    type Float: Float;

    /// Lift a plain float to this scalar as a constant (zero derivative).
    fn from_f(val: Self::Float) -> Self;

    /// Extract the primal value.
    fn value(&self) -> Self::Float;

    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
    fn recip(self) -> Self;
    fn powi(self, n: i32) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tanh(self) -> Self;
    fn abs(self) -> Self;
    fn max(self, other: Self) -> Self;
    fn min(self, other: Self) -> Self;
}

macro_rules! impl_scalar_for_float {
    ($f:ty) => {
        impl Scalar for $f {
            type Float = $f;

            #[inline]
            fn from_f(val: $f) -> Self {
                val
            }
            #[inline]
            fn value(&self) -> $f {
                *self
            }
            #[inline]
            fn exp(self) -> Self {
                NumFloat::exp(self)
            }
            #[inline]
            fn ln(self) -> Self {
                NumFloat::ln(self)
            }
            #[inline]
            fn sqrt(self) -> Self {
                NumFloat::sqrt(self)
            }
            #[inline]
            fn recip(self) -> Self {
                NumFloat::recip(self)
            }
            #[inline]
            fn powi(self, n: i32) -> Self {
                NumFloat::powi(self, n)
            }
            #[inline]
            fn sin(self) -> Self {
                NumFloat::sin(self)
            }
            #[inline]
            fn cos(self) -> Self {
                NumFloat::cos(self)
            }
            #[inline]
            fn tanh(self) -> Self {
                NumFloat::tanh(self)
            }
            #[inline]
            fn abs(self) -> Self {
                NumFloat::abs(self)
            }
            #[inline]
            fn max(self, other: Self) -> Self {
                if self >= other {
                    self
                } else {
                    other
                }
            }
            #[inline]
            fn min(self, other: Self) -> Self {
                if self <= other {
                    self
                } else {
                    other
                }
            }
        }
    };
}

impl_scalar_for_float!(f32);
impl_scalar_for_float!(f64);

impl<F: Float> Scalar for Dual<F> {
    type Float = F;

    #[inline]
    fn from_f(val: F) -> Self {
        Dual::constant(val)
    }
    #[inline]
    fn value(&self) -> F {
        self.re
    }
    #[inline]
    fn exp(self) -> Self {
        Dual::exp(self)
    }
    #[inline]
    fn ln(self) -> Self {
        Dual::ln(self)
    }
    #[inline]
    fn sqrt(self) -> Self {
        Dual::sqrt(self)
    }
    #[inline]
    fn recip(self) -> Self {
        Dual::recip(self)
    }
    #[inline]
    fn powi(self, n: i32) -> Self {
        Dual::powi(self, n)
    }
    #[inline]
    fn sin(self) -> Self {
        Dual::sin(self)
    }
    #[inline]
    fn cos(self) -> Self {
        Dual::cos(self)
    }
    #[inline]
    fn tanh(self) -> Self {
        Dual::tanh(self)
    }
    #[inline]
    fn abs(self) -> Self {
        Dual::abs(self)
    }
    #[inline]
    fn max(self, other: Self) -> Self {
        Dual::max(self, other)
    }
    #[inline]
    fn min(self, other: Self) -> Self {
        Dual::min(self, other)
    }
}

impl<F: Float + BtapeThreadLocal> Scalar for BReverse<F> {
    type Float = F;

    #[inline]
    fn from_f(val: F) -> Self {
        BReverse::constant(val)
    }
    #[inline]
    fn value(&self) -> F {
        self.value
    }
    #[inline]
    fn exp(self) -> Self {
        BReverse::exp(self)
    }
    #[inline]
    fn ln(self) -> Self {
        BReverse::ln(self)
    }
    #[inline]
    fn sqrt(self) -> Self {
        BReverse::sqrt(self)
    }
    #[inline]
    fn recip(self) -> Self {
        BReverse::recip(self)
    }
    #[inline]
    fn powi(self, n: i32) -> Self {
        BReverse::powi(self, n)
    }
    #[inline]
    fn sin(self) -> Self {
        BReverse::sin(self)
    }
    #[inline]
    fn cos(self) -> Self {
        BReverse::cos(self)
    }
    #[inline]
    fn tanh(self) -> Self {
        BReverse::tanh(self)
    }
    #[inline]
    fn abs(self) -> Self {
        BReverse::abs(self)
    }
    #[inline]
    fn max(self, other: Self) -> Self {
        BReverse::max(self, other)
    }
    #[inline]
    fn min(self, other: Self) -> Self {
        BReverse::min(self, other)
    }
}

/// Lift a plain array into constants of scalar type `T`.
///
/// Model code uses this to combine data (never differentiated) with
/// parameters of an AD type.
pub fn lift<T: Scalar>(a: ArrayViewD<'_, T::Float>) -> ArrayD<T> {
    a.mapv(T::from_f)
}
