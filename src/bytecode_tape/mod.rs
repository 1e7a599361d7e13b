//! Bytecode tape for reverse-mode and forward-over-reverse AD.
//!
//! The tape stores opcodes rather than precomputed multipliers, so it can be
//! swept again with dual-number values: a forward tangent sweep followed by a
//! reverse sweep over dual adjoints yields the gradient and a
//! Hessian-vector product in one pass.
//!
//! # Limitations
//!
//! The tape records one execution path. It is only valid at the point it was
//! recorded at (the HVP engine never moves the parameters, so this is the
//! only point it ever sweeps).

use crate::error::{Error, Result};
use crate::float::Float;
use crate::opcode::{self, OpCode, UNUSED};

mod reverse;
mod tangent;
mod thread_local;

pub use self::thread_local::{with_active_btape, BtapeGuard, BtapeThreadLocal};

/// Sentinel index for constant entries (not tracked).
pub const CONSTANT: u32 = u32::MAX;

/// A recorded scalar computation.
///
/// Created via [`crate::api::record`]. Inputs occupy indices
/// `0..num_inputs()`, in registration order.
#[derive(Clone, Debug)]
pub struct BytecodeTape<F: Float> {
    pub(crate) opcodes: Vec<OpCode>,
    pub(crate) arg_indices: Vec<[u32; 2]>,
    pub(crate) values: Vec<F>,
    pub(crate) num_inputs: u32,
    pub(crate) num_variables: u32,
    pub(crate) output_index: u32,
}

impl<F: Float> BytecodeTape<F> {
    /// Create an empty bytecode tape.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a bytecode tape with pre-allocated capacity.
    pub fn with_capacity(est_ops: usize) -> Self {
        BytecodeTape {
            opcodes: Vec::with_capacity(est_ops),
            arg_indices: Vec::with_capacity(est_ops),
            values: Vec::with_capacity(est_ops),
            num_inputs: 0,
            num_variables: 0,
            output_index: 0,
        }
    }

    /// Register a new input variable. Returns its index.
    ///
    /// All inputs must be registered before the first operation is recorded.
    #[inline]
    pub fn new_input(&mut self, value: F) -> u32 {
        debug_assert_eq!(
            self.num_inputs, self.num_variables,
            "inputs must precede recorded operations"
        );
        let idx = self.num_variables;
        self.num_variables += 1;
        self.num_inputs += 1;
        self.opcodes.push(OpCode::Input);
        self.arg_indices.push([UNUSED, UNUSED]);
        self.values.push(value);
        idx
    }

    /// Register a scalar constant. Returns its index.
    #[inline]
    pub fn push_const(&mut self, value: F) -> u32 {
        let idx = self.num_variables;
        self.num_variables += 1;
        self.opcodes.push(OpCode::Const);
        self.arg_indices.push([UNUSED, UNUSED]);
        self.values.push(value);
        idx
    }

    /// Return `index` if it is tracked, else record `value` as a `Const`.
    #[inline]
    pub fn ensure_on_tape(&mut self, index: u32, value: F) -> u32 {
        if index == CONSTANT {
            self.push_const(value)
        } else {
            index
        }
    }

    /// Record an operation. Returns the result index.
    #[inline]
    pub fn push_op(&mut self, op: OpCode, arg0: u32, arg1: u32, value: F) -> u32 {
        let idx = self.num_variables;
        self.num_variables += 1;
        self.opcodes.push(op);
        self.arg_indices.push([arg0, arg1]);
        self.values.push(value);
        idx
    }

    /// Record a powi operation. The `i32` exponent is stored in `arg_indices[1]`.
    ///
    /// `x^0` folds to the constant one and `x^1` to `x` itself.
    #[inline]
    pub fn push_powi(&mut self, arg0: u32, exp: i32, value: F) -> u32 {
        match exp {
            0 => self.push_const(F::one()),
            1 => arg0,
            _ => self.push_op(OpCode::Powi, arg0, opcode::powi_exp_encode(exp), value),
        }
    }

    /// Mark the output variable.
    #[inline]
    pub fn set_output(&mut self, index: u32) {
        self.output_index = index;
    }

    /// Index of the output variable.
    #[inline]
    pub fn output_index(&self) -> usize {
        self.output_index as usize
    }

    /// Number of input variables.
    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.num_inputs as usize
    }

    /// Number of entries (including inputs and constants).
    #[inline]
    pub fn num_ops(&self) -> usize {
        self.opcodes.len()
    }

    /// Input values at the recorded point.
    #[inline]
    pub fn input_values(&self) -> &[F] {
        &self.values[..self.num_inputs as usize]
    }
}

impl<F: Float> Default for BytecodeTape<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject non-finite derivative information.
///
/// A NaN or infinity in a gradient or curvature product means the objective
/// is not (twice) differentiable at the recorded point.
pub(crate) fn ensure_finite<F: Float>(what: &str, values: &[F]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        None => Ok(()),
        Some(i) => Err(Error::NonDifferentiableObjective {
            reason: format!("{what} has non-finite entry {} at index {i}", values[i]),
        }),
    }
}
