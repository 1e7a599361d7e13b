use log::trace;

use crate::breverse::BReverse;
use crate::bytecode_tape::{BtapeGuard, BtapeThreadLocal, BytecodeTape};
use crate::dual::Dual;
use crate::error::{Error, Result};
use crate::float::Float;

/// Record a scalar function into a [`BytecodeTape`].
///
/// Returns the tape and the output value from the recording pass. The tape
/// can then be swept for the gradient or for Hessian-vector products at `x`.
///
/// # Limitations
///
/// The tape records one execution path. It describes `f` only at the point
/// it was recorded at.
///
/// ```
/// let (tape, val) = laplace_core::record(|x| x[0] * x[0] + x[1] * x[1], &[3.0_f64, 4.0]);
/// assert!((val - 25.0).abs() < 1e-10);
///
/// let g = tape.gradient();
/// assert!((g[0] - 6.0).abs() < 1e-10);
/// assert!((g[1] - 8.0).abs() < 1e-10);
/// ```
pub fn record<F: BtapeThreadLocal>(
    f: impl FnOnce(&[BReverse<F>]) -> BReverse<F>,
    x: &[F],
) -> (BytecodeTape<F>, F) {
    match try_record(|inputs| Ok(f(inputs)), x) {
        Ok(recorded) => recorded,
        Err(_) => unreachable!("infallible recording closure"),
    }
}

/// Like [`record`], for closures that can fail.
///
/// The error is returned after the thread-local tape has been released.
pub fn try_record<F: BtapeThreadLocal>(
    f: impl FnOnce(&[BReverse<F>]) -> Result<BReverse<F>>,
    x: &[F],
) -> Result<(BytecodeTape<F>, F)> {
    let n = x.len();
    let mut tape = BytecodeTape::with_capacity(n * 10);

    let inputs: Vec<BReverse<F>> = x
        .iter()
        .map(|&val| {
            let idx = tape.new_input(val);
            BReverse::from_tape(val, idx)
        })
        .collect();

    let output = {
        let _guard = BtapeGuard::new(&mut tape);
        f(&inputs)?
    };

    // An output that never touched an input still needs a tape slot.
    let out_idx = tape.ensure_on_tape(output.index, output.value);
    tape.set_output(out_idx);
    trace!(
        "recorded tape: {} inputs, {} entries, output {}",
        n,
        tape.num_ops(),
        output.value
    );
    Ok((tape, output.value))
}

/// Gradient of a scalar function `f : R^n → R` using reverse mode.
///
/// ```
/// let g = laplace_core::grad(|x| x[0] * x[1], &[3.0_f64, 4.0]);
/// assert!((g[0] - 4.0).abs() < 1e-10);
/// assert!((g[1] - 3.0).abs() < 1e-10);
/// ```
pub fn grad<F: BtapeThreadLocal>(f: impl FnOnce(&[BReverse<F>]) -> BReverse<F>, x: &[F]) -> Vec<F> {
    let (tape, _) = record(f, x);
    tape.gradient()
}

/// Jacobian-vector product (forward mode): `(f(x), J·v)`.
///
/// Evaluates `f` at `x` and computes the directional derivative in direction `v`.
pub fn jvp<F: Float>(
    f: impl Fn(&[Dual<F>]) -> Vec<Dual<F>>,
    x: &[F],
    v: &[F],
) -> Result<(Vec<F>, Vec<F>)> {
    if x.len() != v.len() {
        return Err(Error::mismatch(
            "jvp tangent",
            format!("{} entries", x.len()),
            format!("{} entries", v.len()),
        ));
    }
    let inputs: Vec<Dual<F>> = x
        .iter()
        .zip(v.iter())
        .map(|(&xi, &vi)| Dual::new(xi, vi))
        .collect();
    let outputs = f(&inputs);
    let values = outputs.iter().map(|d| d.re).collect();
    let tangents = outputs.iter().map(|d| d.eps).collect();
    Ok((values, tangents))
}

/// Hessian-vector product via forward-over-reverse: `(∇f(x), H·v)`.
///
/// Records `f` at `x` once and runs a single tangent sweep, so the Hessian
/// is never formed.
///
/// ```
/// // f = x0² x1  →  H = [[2 x1, 2 x0], [2 x0, 0]]
/// let (g, hv) = laplace_core::hvp(|x| x[0] * x[0] * x[1], &[3.0_f64, 2.0], &[1.0, 0.0]).unwrap();
/// assert!((g[0] - 12.0).abs() < 1e-10);
/// assert!((hv[0] - 4.0).abs() < 1e-10);
/// assert!((hv[1] - 6.0).abs() < 1e-10);
/// ```
pub fn hvp<F: BtapeThreadLocal>(
    f: impl FnOnce(&[BReverse<F>]) -> BReverse<F>,
    x: &[F],
    v: &[F],
) -> Result<(Vec<F>, Vec<F>)> {
    let (tape, _) = record(f, x);
    tape.hvp(v)
}
