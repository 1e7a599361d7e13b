use crate::dual::Dual;
use crate::error::{Error, Result};
use crate::float::Float;
use crate::opcode::{self, OpCode};
use crate::scalar::Scalar;

use super::ensure_finite;

impl<F: Float> super::BytecodeTape<F> {
    // ── Forward-over-reverse (second-order) ──

    /// Forward sweep with tangent-carrying numbers. Reads opcodes and constants
    /// from `self`, writing one value per tape entry into `buf`. Does not
    /// mutate the tape.
    pub fn forward_tangent<T>(&self, inputs: &[T], buf: &mut Vec<T>)
    where
        T: Scalar<Float = F>,
    {
        assert_eq!(
            inputs.len(),
            self.num_inputs as usize,
            "wrong number of inputs"
        );

        buf.clear();
        buf.reserve(self.opcodes.len());

        let mut input_idx = 0usize;
        for (i, &op) in self.opcodes.iter().enumerate() {
            let value = match op {
                OpCode::Input => {
                    input_idx += 1;
                    inputs[input_idx - 1]
                }
                OpCode::Const => T::from_f(self.values[i]),
                OpCode::Powi => {
                    let [a_idx, exp_bits] = self.arg_indices[i];
                    opcode::eval_powi(buf[a_idx as usize], opcode::powi_exp_decode(exp_bits))
                }
                op => {
                    let [a_idx, b_idx] = self.arg_indices[i];
                    let a = buf[a_idx as usize];
                    let b = if op.is_binary() {
                        buf[b_idx as usize]
                    } else {
                        T::zero()
                    };
                    opcode::eval_forward(op, a, b)
                }
            };
            buf.push(value);
        }
    }

    /// Hessian-vector product via forward-over-reverse at the recorded point.
    ///
    /// Returns `(∇f, H·v)`, both of length [`num_inputs`](Self::num_inputs).
    /// The tape is not mutated.
    ///
    /// # Errors
    ///
    /// - [`Error::StructureMismatch`] if `v.len()` differs from the input count.
    /// - [`Error::NonDifferentiableObjective`] if the value, gradient or
    ///   product contains a non-finite entry.
    pub fn hvp(&self, v: &[F]) -> Result<(Vec<F>, Vec<F>)> {
        let mut dual_vals = Vec::new();
        let mut adjoint_buf = Vec::new();
        self.hvp_with_buf(v, &mut dual_vals, &mut adjoint_buf)
    }

    /// Like [`hvp`](Self::hvp) but reuses caller-provided buffers across calls.
    pub fn hvp_with_buf(
        &self,
        v: &[F],
        dual_vals_buf: &mut Vec<Dual<F>>,
        adjoint_buf: &mut Vec<Dual<F>>,
    ) -> Result<(Vec<F>, Vec<F>)> {
        let n = self.num_inputs as usize;
        if v.len() != n {
            return Err(Error::mismatch(
                "Hessian-vector product direction",
                format!("{n} entries"),
                format!("{} entries", v.len()),
            ));
        }

        let dual_inputs: Vec<Dual<F>> = self
            .input_values()
            .iter()
            .zip(v.iter())
            .map(|(&xi, &vi)| Dual::new(xi, vi))
            .collect();

        self.forward_tangent(&dual_inputs, dual_vals_buf);
        if let Some(out) = dual_vals_buf.get(self.output_index as usize) {
            ensure_finite("objective value", &[out.re])?;
        }
        self.reverse_sweep(dual_vals_buf, adjoint_buf);

        let gradient: Vec<F> = adjoint_buf[..n].iter().map(|d| d.re).collect();
        let hv: Vec<F> = adjoint_buf[..n].iter().map(|d| d.eps).collect();
        ensure_finite("gradient", &gradient)?;
        ensure_finite("Hessian-vector product", &hv)?;
        Ok((gradient, hv))
    }
}
