//! Bytecode opcodes for the bytecode tape.
//!
//! Each opcode represents an elementary operation. [`eval_forward`] and
//! [`reverse_partials`] evaluate / differentiate a single opcode. Both are
//! generic over [`Scalar`], so the same tables serve the primal reverse sweep
//! (`T = F`) and the forward-over-reverse sweep (`T = Dual<F>`).

use crate::float::Float;
use crate::scalar::Scalar;

/// Sentinel used in `arg_indices[1]` for unary ops (the second argument slot is unused).
pub const UNUSED: u32 = u32::MAX;

/// Elementary operation codes for the bytecode tape.
///
/// Binary ops use both `arg_indices` slots; unary ops use slot 0 only
/// (slot 1 = [`UNUSED`], except for [`OpCode::Powi`] which stores the `i32`
/// exponent reinterpreted as `u32` in slot 1).
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    // ── Structural ──
    /// Input variable (leaf node).
    Input,
    /// Scalar constant.
    Const,

    // ── Binary ──
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,

    // ── Unary ──
    Neg,
    Recip,
    Sqrt,
    /// Integer power. Exponent stored in `arg_indices[1]` as `exp as u32`.
    Powi,
    Exp,
    Ln,
    Sin,
    Cos,
    Tanh,
    Abs,
}

impl OpCode {
    /// True for ops whose second argument slot holds a tape index.
    #[inline]
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Max | OpCode::Min
        )
    }
}

/// Evaluate a single non-structural opcode in the forward direction.
///
/// For unary ops `b` is ignored. [`OpCode::Powi`] is evaluated by the tape
/// through [`eval_powi`], since its exponent is not a tape value.
#[inline]
pub fn eval_forward<T: Scalar>(op: OpCode, a: T, b: T) -> T {
    match op {
        OpCode::Input | OpCode::Const | OpCode::Powi => {
            unreachable!("{op:?} is not dispatched through eval_forward")
        }
        OpCode::Add => a + b,
        OpCode::Sub => a - b,
        OpCode::Mul => a * b,
        OpCode::Div => a / b,
        OpCode::Max => a.max(b),
        OpCode::Min => a.min(b),
        OpCode::Neg => -a,
        OpCode::Recip => a.recip(),
        OpCode::Sqrt => a.sqrt(),
        OpCode::Exp => a.exp(),
        OpCode::Ln => a.ln(),
        OpCode::Sin => a.sin(),
        OpCode::Cos => a.cos(),
        OpCode::Tanh => a.tanh(),
        OpCode::Abs => a.abs(),
    }
}

/// Compute reverse-mode partial derivatives for a single opcode.
///
/// Returns `(∂result/∂arg0, ∂result/∂arg1)`; for unary ops the second
/// partial is zero. `a`, `b` are the operand values and `r` the result.
#[inline]
pub fn reverse_partials<T: Scalar>(op: OpCode, a: T, b: T, r: T) -> (T, T) {
    let zero = T::zero();
    let one = T::one();
    match op {
        OpCode::Input | OpCode::Const => (zero, zero),
        OpCode::Powi => unreachable!("Powi partials come from powi_partial"),

        // Binary
        OpCode::Add => (one, one),
        OpCode::Sub => (one, -one),
        OpCode::Mul => (b, a),
        OpCode::Div => {
            let inv = one / b;
            (inv, -a * inv * inv)
        }
        OpCode::Max => {
            if a >= b {
                (one, zero)
            } else {
                (zero, one)
            }
        }
        OpCode::Min => {
            if a <= b {
                (one, zero)
            } else {
                (zero, one)
            }
        }

        // Unary
        OpCode::Neg => (-one, zero),
        OpCode::Recip => {
            let inv = one / a;
            (-inv * inv, zero)
        }
        OpCode::Sqrt => {
            let two = one + one;
            (one / (two * r), zero)
        }
        OpCode::Exp => (r, zero),
        OpCode::Ln => (one / a, zero),
        OpCode::Sin => (a.cos(), zero),
        OpCode::Cos => (-a.sin(), zero),
        OpCode::Tanh => (one - r * r, zero),
        OpCode::Abs => {
            // Subgradient +1 at the kink.
            if a >= zero {
                (one, zero)
            } else {
                (-one, zero)
            }
        }
    }
}

/// Forward evaluation of `a^exp`.
#[inline]
pub fn eval_powi<T: Scalar>(a: T, exp: i32) -> T {
    a.powi(exp)
}

/// Derivative of `a^exp` with respect to `a`.
#[inline]
pub fn powi_partial<T: Scalar>(a: T, exp: i32) -> T {
    let n = T::from_f(<T::Float as Float>::from_int(exp));
    n * a.powi(exp - 1)
}

/// Decode a `powi` exponent from `arg_indices[1]` (stored as `u32` bits of an `i32`).
#[inline]
pub fn powi_exp_decode(bits: u32) -> i32 {
    bits as i32
}

/// Encode a `powi` exponent as a value that can be stored in `arg_indices[1]`.
#[inline]
pub fn powi_exp_encode(exp: i32) -> u32 {
    exp as u32
}
