use crate::float::{Float, IsAllZero};
use crate::opcode::{self, OpCode};
use crate::scalar::Scalar;

use super::BtapeThreadLocal;

impl<F: BtapeThreadLocal> super::BytecodeTape<F> {
    /// Gradient of the output with respect to every input, at the recorded point.
    pub fn gradient(&self) -> Vec<F> {
        let mut adjoints = Vec::new();
        self.reverse_sweep(&self.values, &mut adjoints);
        adjoints.truncate(self.num_inputs as usize);
        adjoints
    }
}

impl<F: Float> super::BytecodeTape<F> {
    /// Reverse sweep seeded with one at the output.
    ///
    /// `vals` holds one value per tape entry: the recorded primals for a
    /// plain gradient, or the output of
    /// [`forward_tangent`](Self::forward_tangent) for forward-over-reverse.
    /// On return `buf[..num_inputs]` holds the input adjoints. Zero adjoints
    /// are skipped with [`IsAllZero`] so dual tangents are never dropped.
    pub(crate) fn reverse_sweep<T>(&self, vals: &[T], buf: &mut Vec<T>)
    where
        T: Scalar<Float = F> + IsAllZero,
    {
        let n = self.num_variables as usize;
        debug_assert_eq!(vals.len(), n, "one value per tape entry");
        buf.clear();
        buf.resize(n, T::zero());
        if n == 0 {
            return;
        }
        buf[self.output_index as usize] = T::one();

        for i in (0..self.opcodes.len()).rev() {
            let op = self.opcodes[i];
            if matches!(op, OpCode::Input | OpCode::Const) {
                continue;
            }
            let adj = buf[i];
            if adj.is_all_zero() {
                continue;
            }
            buf[i] = T::zero();

            let [a_idx, b_idx] = self.arg_indices[i];
            let a = vals[a_idx as usize];

            if op == OpCode::Powi {
                let da = opcode::powi_partial(a, opcode::powi_exp_decode(b_idx));
                buf[a_idx as usize] = buf[a_idx as usize] + da * adj;
                continue;
            }

            let b = if op.is_binary() {
                vals[b_idx as usize]
            } else {
                T::zero()
            };
            let (da, db) = opcode::reverse_partials(op, a, b, vals[i]);
            buf[a_idx as usize] = buf[a_idx as usize] + da * adj;
            if op.is_binary() {
                buf[b_idx as usize] = buf[b_idx as usize] + db * adj;
            }
        }
    }
}
