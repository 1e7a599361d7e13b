//! Stock per-point metrics and column transforms.
//!
//! Each metric reads fields of one prediction record and returns a 0-d
//! array, so stacking over a dataset yields a column of shape `[N]`.

use ndarray::{arr0, ArrayD, ArrayViewD, Zip};

use crate::error::{Error, Result};
use crate::eval::Fields;
use crate::float::Float;

/// Predictive mean field.
pub const PRED_MEAN: &str = "pred_mean";
/// Predictive standard deviation field.
pub const PRED_STD: &str = "pred_std";
/// Target field, added to every record by the evaluation harness.
pub const TARGET: &str = "target";

fn same_shape<F>(fields: &Fields<'_, F>, a: &ArrayViewD<'_, F>, b: &ArrayViewD<'_, F>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::mismatch(
            format!("metric `{}`", fields.metric()),
            format!("shape {:?}", a.shape()),
            format!("shape {:?}", b.shape()),
        ));
    }
    Ok(())
}

fn mean_of<F: Float>(values: impl Iterator<Item = F>, n: usize) -> ArrayD<F> {
    let sum = values.fold(F::zero(), |acc, v| acc + v);
    arr0(sum / F::from_usize(n).unwrap_or_else(F::nan)).into_dyn()
}

/// Mean of `(pred_mean − target)²`.
pub fn squared_error<F: Float>(fields: &Fields<'_, F>) -> Result<ArrayD<F>> {
    let mean = fields.get(PRED_MEAN)?;
    let target = fields.get(TARGET)?;
    same_shape(fields, &mean, &target)?;
    let d = Zip::from(&mean).and(&target).map_collect(|&m, &t| (m - t) * (m - t));
    Ok(mean_of(d.iter().copied(), mean.len()))
}

/// Mean of `|pred_mean − target|`.
pub fn absolute_error<F: Float>(fields: &Fields<'_, F>) -> Result<ArrayD<F>> {
    let mean = fields.get(PRED_MEAN)?;
    let target = fields.get(TARGET)?;
    same_shape(fields, &mean, &target)?;
    let d = Zip::from(&mean).and(&target).map_collect(|&m, &t| (m - t).abs());
    Ok(mean_of(d.iter().copied(), mean.len()))
}

/// Mean Gaussian negative log-likelihood of the target under
/// `N(pred_mean, pred_std²)`.
pub fn gaussian_nll<F: Float>(fields: &Fields<'_, F>) -> Result<ArrayD<F>> {
    let mean = fields.get(PRED_MEAN)?;
    let std = fields.get(PRED_STD)?;
    let target = fields.get(TARGET)?;
    same_shape(fields, &mean, &target)?;
    same_shape(fields, &mean, &std)?;
    let half = F::from_int(1) / F::from_int(2);
    let log_two_pi = (F::from_int(2) * F::PI()).ln();
    let nll = Zip::from(&mean)
        .and(&std)
        .and(&target)
        .map_collect(|&m, &s, &t| {
            let z = (t - m) / s;
            half * (log_two_pi + z * z) + s.ln()
        });
    Ok(mean_of(nll.iter().copied(), mean.len()))
}

/// Mean of `((pred_mean − target) / pred_std)²`.
pub fn chi_squared<F: Float>(fields: &Fields<'_, F>) -> Result<ArrayD<F>> {
    let mean = fields.get(PRED_MEAN)?;
    let std = fields.get(PRED_STD)?;
    let target = fields.get(TARGET)?;
    same_shape(fields, &mean, &target)?;
    same_shape(fields, &mean, &std)?;
    let chi = Zip::from(&mean)
        .and(&std)
        .and(&target)
        .map_collect(|&m, &s, &t| {
            let z = (m - t) / s;
            z * z
        });
    Ok(mean_of(chi.iter().copied(), mean.len()))
}

/// Leaves a column unchanged.
pub fn identity<F>(column: ArrayD<F>) -> ArrayD<F> {
    column
}

/// Reduces a column to the 0-d mean of all its entries. NaN when empty.
pub fn mean<F: Float>(column: ArrayD<F>) -> ArrayD<F> {
    let n = column.len();
    mean_of(column.iter().copied(), n)
}
