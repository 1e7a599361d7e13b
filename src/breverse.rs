//! Bytecode-tape reverse-mode AD variable.
//!
//! [`BReverse<F>`] records opcodes to the thread-local
//! [`BytecodeTape`](crate::bytecode_tape::BytecodeTape). The recorded tape can
//! then be swept backwards for a gradient, or forwards with dual numbers and
//! backwards again for Hessian-vector products.

use std::fmt::{self, Display};

use num_traits::Float as NumFloat;

use crate::bytecode_tape::{self, BtapeThreadLocal, CONSTANT};
use crate::float::Float;
use crate::opcode::{OpCode, UNUSED};

/// Bytecode-tape reverse-mode AD variable.
///
/// A value and a tape index (12 bytes for `f64`, `Copy`). Values built only
/// from constants stay off the tape entirely.
#[derive(Clone, Copy, Debug)]
pub struct BReverse<F: Float> {
    pub(crate) value: F,
    pub(crate) index: u32,
}

impl<F: Float> BReverse<F> {
    /// Create a constant (not tracked on tape).
    #[inline]
    pub fn constant(value: F) -> Self {
        BReverse {
            value,
            index: CONSTANT,
        }
    }

    /// Create from a tape allocation (internal use).
    #[inline]
    pub fn from_tape(value: F, index: u32) -> Self {
        BReverse { value, index }
    }

    /// Get the tape index.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// True if this value is not recorded on any tape.
    #[inline]
    pub fn is_constant(&self) -> bool {
        self.index == CONSTANT
    }
}

impl<F: Float + BtapeThreadLocal> BReverse<F> {
    /// Record a unary opcode. Constants fold without touching the tape.
    #[inline]
    pub(crate) fn unary(self, op: OpCode, value: F) -> Self {
        if self.is_constant() {
            return BReverse::constant(value);
        }
        let index = bytecode_tape::with_active_btape(|t| t.push_op(op, self.index, UNUSED, value));
        BReverse { value, index }
    }

    /// Record a binary opcode, promoting a constant operand to a `Const` entry.
    #[inline]
    pub(crate) fn binary(self, rhs: Self, op: OpCode, value: F) -> Self {
        if self.is_constant() && rhs.is_constant() {
            return BReverse::constant(value);
        }
        let index = bytecode_tape::with_active_btape(|t| {
            let li = t.ensure_on_tape(self.index, self.value);
            let ri = t.ensure_on_tape(rhs.index, rhs.value);
            t.push_op(op, li, ri, value)
        });
        BReverse { value, index }
    }

    #[inline]
    pub fn exp(self) -> Self {
        self.unary(OpCode::Exp, NumFloat::exp(self.value))
    }

    #[inline]
    pub fn ln(self) -> Self {
        self.unary(OpCode::Ln, NumFloat::ln(self.value))
    }

    #[inline]
    pub fn sqrt(self) -> Self {
        self.unary(OpCode::Sqrt, NumFloat::sqrt(self.value))
    }

    #[inline]
    pub fn recip(self) -> Self {
        self.unary(OpCode::Recip, NumFloat::recip(self.value))
    }

    #[inline]
    pub fn sin(self) -> Self {
        self.unary(OpCode::Sin, NumFloat::sin(self.value))
    }

    #[inline]
    pub fn cos(self) -> Self {
        self.unary(OpCode::Cos, NumFloat::cos(self.value))
    }

    #[inline]
    pub fn tanh(self) -> Self {
        self.unary(OpCode::Tanh, NumFloat::tanh(self.value))
    }

    #[inline]
    pub fn abs(self) -> Self {
        self.unary(OpCode::Abs, NumFloat::abs(self.value))
    }

    pub fn powi(self, n: i32) -> Self {
        let value = NumFloat::powi(self.value, n);
        if self.is_constant() {
            return BReverse::constant(value);
        }
        let index = bytecode_tape::with_active_btape(|t| t.push_powi(self.index, n, value));
        BReverse { value, index }
    }

    pub fn max(self, other: Self) -> Self {
        let value = if self.value >= other.value {
            self.value
        } else {
            other.value
        };
        self.binary(other, OpCode::Max, value)
    }

    pub fn min(self, other: Self) -> Self {
        let value = if self.value <= other.value {
            self.value
        } else {
            other.value
        };
        self.binary(other, OpCode::Min, value)
    }
}

impl<F: Float> Display for BReverse<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<F: Float> Default for BReverse<F> {
    fn default() -> Self {
        BReverse::constant(F::zero())
    }
}
