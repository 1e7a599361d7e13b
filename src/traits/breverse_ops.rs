//! `std::ops` implementations for [`BReverse<F>`].
//!
//! Each operator records an opcode to the active bytecode tape unless both
//! operands are constants.

use std::cmp::Ordering;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_traits::{One, Zero};

use crate::breverse::BReverse;
use crate::bytecode_tape::BtapeThreadLocal;
use crate::float::Float;
use crate::opcode::OpCode;

// ──────────────────────────────────────────────
//  BReverse<F> ↔ BReverse<F> operators
// ──────────────────────────────────────────────

impl<F: Float + BtapeThreadLocal> Add for BReverse<F> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        self.binary(rhs, OpCode::Add, self.value + rhs.value)
    }
}

impl<F: Float + BtapeThreadLocal> Sub for BReverse<F> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self.binary(rhs, OpCode::Sub, self.value - rhs.value)
    }
}

impl<F: Float + BtapeThreadLocal> Mul for BReverse<F> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self.binary(rhs, OpCode::Mul, self.value * rhs.value)
    }
}

impl<F: Float + BtapeThreadLocal> Div for BReverse<F> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        self.binary(rhs, OpCode::Div, self.value / rhs.value)
    }
}

impl<F: Float + BtapeThreadLocal> Neg for BReverse<F> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.unary(OpCode::Neg, -self.value)
    }
}

impl<F: Float + BtapeThreadLocal> AddAssign for BReverse<F> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<F: Float + BtapeThreadLocal> SubAssign for BReverse<F> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<F: Float + BtapeThreadLocal> MulAssign for BReverse<F> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<F: Float + BtapeThreadLocal> DivAssign for BReverse<F> {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

// ──────────────────────────────────────────────
//  Mixed ops: BReverse<F> with primitive floats
// ──────────────────────────────────────────────

// The primitive is promoted to a constant; the tape sees a `Const` entry only
// when the other operand is tracked.
macro_rules! impl_breverse_scalar_ops {
    ($f:ty) => {
        impl Add<$f> for BReverse<$f> {
            type Output = BReverse<$f>;
            #[inline]
            fn add(self, rhs: $f) -> BReverse<$f> {
                self + BReverse::constant(rhs)
            }
        }

        impl Add<BReverse<$f>> for $f {
            type Output = BReverse<$f>;
            #[inline]
            fn add(self, rhs: BReverse<$f>) -> BReverse<$f> {
                BReverse::constant(self) + rhs
            }
        }

        impl Sub<$f> for BReverse<$f> {
            type Output = BReverse<$f>;
            #[inline]
            fn sub(self, rhs: $f) -> BReverse<$f> {
                self - BReverse::constant(rhs)
            }
        }

        impl Sub<BReverse<$f>> for $f {
            type Output = BReverse<$f>;
            #[inline]
            fn sub(self, rhs: BReverse<$f>) -> BReverse<$f> {
                BReverse::constant(self) - rhs
            }
        }

        impl Mul<$f> for BReverse<$f> {
            type Output = BReverse<$f>;
            #[inline]
            fn mul(self, rhs: $f) -> BReverse<$f> {
                self * BReverse::constant(rhs)
            }
        }

        impl Mul<BReverse<$f>> for $f {
            type Output = BReverse<$f>;
            #[inline]
            fn mul(self, rhs: BReverse<$f>) -> BReverse<$f> {
                BReverse::constant(self) * rhs
            }
        }

        impl Div<$f> for BReverse<$f> {
            type Output = BReverse<$f>;
            #[inline]
            fn div(self, rhs: $f) -> BReverse<$f> {
                self / BReverse::constant(rhs)
            }
        }

        impl Div<BReverse<$f>> for $f {
            type Output = BReverse<$f>;
            #[inline]
            fn div(self, rhs: BReverse<$f>) -> BReverse<$f> {
                BReverse::constant(self) / rhs
            }
        }
    };
}

impl_breverse_scalar_ops!(f32);
impl_breverse_scalar_ops!(f64);

// ── Identities ──

impl<F: Float + BtapeThreadLocal> Zero for BReverse<F> {
    #[inline]
    fn zero() -> Self {
        BReverse::constant(F::zero())
    }
    #[inline]
    fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl<F: Float + BtapeThreadLocal> One for BReverse<F> {
    #[inline]
    fn one() -> Self {
        BReverse::constant(F::one())
    }
}

// ── Comparison ──

impl<F: Float> PartialEq for BReverse<F> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<F: Float> PartialOrd for BReverse<F> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}
