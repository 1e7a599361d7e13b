use std::fmt::{Debug, Display};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive, NumCast};

/// Marker trait for base floating-point types (`f32`, `f64`).
///
/// Bundles the numeric and utility traits needed throughout the crate.
/// Only primitive float types implement this; AD wrapper types do not.
pub trait Float:
    NumFloat + FloatConst + FromPrimitive + Copy + Send + Sync + Default + Debug + Display + 'static
{
    /// Convert a small integer constant. Exact for every `i32` the crate uses.
    #[inline]
    fn from_int(n: i32) -> Self {
        <Self as NumCast>::from(n).unwrap_or_else(Self::nan)
    }
}

impl Float for f32 {}
impl Float for f64 {}

/// Zero test that also inspects tangent components.
///
/// The reverse sweep skips entries whose adjoint is zero. For dual-valued
/// adjoints a zero primal part does not imply a zero tangent part, so the
/// skip must look at both.
pub trait IsAllZero {
    fn is_all_zero(&self) -> bool;
}

impl IsAllZero for f32 {
    #[inline]
    fn is_all_zero(&self) -> bool {
        *self == 0.0
    }
}

impl IsAllZero for f64 {
    #[inline]
    fn is_all_zero(&self) -> bool {
        *self == 0.0
    }
}
