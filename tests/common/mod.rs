#![allow(dead_code)]

use std::collections::BTreeMap;

use laplace_core::scalar::lift;
use laplace_core::{DataBatch, Model, ParamTree, Record, Result, Scalar};
use ndarray::{array, Array1, ArrayD, ArrayViewD, IxDyn};

// ─── Models ────────────────────────────────────────────────────────────────

/// `y = W x + b` for one sample `x` of shape `[in]`.
#[derive(Debug)]
pub struct Linear;

impl Model<f64> for Linear {
    fn apply<T: Scalar<Float = f64>>(
        &self,
        params: &ParamTree<T>,
        input: ArrayViewD<'_, f64>,
    ) -> Result<ArrayD<T>> {
        let w = params.leaf("w")?;
        let b = params.leaf("b")?;
        let x = lift::<T>(input);
        let out: Vec<T> = w
            .outer_iter()
            .zip(b.iter())
            .map(|(row, &bo)| {
                row.iter()
                    .zip(x.iter())
                    .fold(bo, |acc, (&wi, &xi)| acc + wi * xi)
            })
            .collect();
        Ok(Array1::from(out).into_dyn())
    }
}

/// `y = Σ_h v_h tanh(w_h · x + c_h)` for one sample, output shape `[1]`.
#[derive(Debug)]
pub struct TanhRegressor;

impl Model<f64> for TanhRegressor {
    fn apply<T: Scalar<Float = f64>>(
        &self,
        params: &ParamTree<T>,
        input: ArrayViewD<'_, f64>,
    ) -> Result<ArrayD<T>> {
        let w = params.leaf("w")?;
        let c = params.leaf("c")?;
        let v = params.leaf("v")?;
        let x = lift::<T>(input);
        let y = w
            .outer_iter()
            .zip(c.iter())
            .zip(v.iter())
            .fold(T::zero(), |acc, ((row, &ch), &vh)| {
                let pre = row
                    .iter()
                    .zip(x.iter())
                    .fold(ch, |s, (&wi, &xi)| s + wi * xi);
                acc + vh * pre.tanh()
            });
        Ok(Array1::from(vec![y]).into_dyn())
    }
}

/// `½ pᵀ A p`, ignoring the input. Output shape `[1]`.
#[derive(Debug)]
pub struct Quadratic {
    pub a: Vec<Vec<f64>>,
}

impl Model<f64> for Quadratic {
    fn apply<T: Scalar<Float = f64>>(
        &self,
        params: &ParamTree<T>,
        _input: ArrayViewD<'_, f64>,
    ) -> Result<ArrayD<T>> {
        let p: Vec<T> = params.flatten();
        let half = T::from_f(0.5);
        let mut sum = T::zero();
        for (i, row) in self.a.iter().enumerate() {
            for (j, &aij) in row.iter().enumerate() {
                sum = sum + T::from_f(aij) * p[i] * p[j];
            }
        }
        Ok(Array1::from(vec![half * sum]).into_dyn())
    }
}

// ─── Fixtures ──────────────────────────────────────────────────────────────

pub fn arr(values: &[f64], shape: &[usize]) -> ArrayD<f64> {
    ArrayD::from_shape_vec(IxDyn(shape), values.to_vec()).unwrap()
}

/// Parameters for [`Linear`] with 3 inputs and 2 outputs.
pub fn linear_params() -> ParamTree<f64> {
    ParamTree::dict([
        ("w", ParamTree::Leaf(arr(&[0.5, -1.0, 0.25, 1.5, 0.75, -0.5], &[2, 3]))),
        ("b", ParamTree::Leaf(arr(&[0.1, -0.2], &[2]))),
    ])
}

/// Parameters for [`TanhRegressor`] with 2 inputs and 3 hidden units.
pub fn tanh_params() -> ParamTree<f64> {
    ParamTree::dict([
        ("w", ParamTree::Leaf(arr(&[0.3, -0.7, 0.8, 0.1, -0.4, 0.6], &[3, 2]))),
        ("c", ParamTree::Leaf(arr(&[0.05, -0.1, 0.2], &[3]))),
        ("v", ParamTree::Leaf(arr(&[1.2, -0.6, 0.9], &[3]))),
    ])
}

/// Four samples with 3 features and 2 targets.
pub fn linear_batch() -> DataBatch<f64> {
    DataBatch::new(
        arr(
            &[1.0, 0.0, -1.0, 0.5, 2.0, 1.0, -1.5, 0.3, 0.0, 2.0, -0.5, 1.0],
            &[4, 3],
        ),
        arr(&[1.0, 0.0, 0.5, 1.0, -1.0, 2.0, 0.0, 0.0], &[4, 2]),
    )
    .unwrap()
}

/// Five samples with 2 features and 1 target.
pub fn tanh_batch() -> DataBatch<f64> {
    DataBatch::new(
        arr(&[0.1, 0.2, -0.5, 1.0, 1.5, -0.3, 0.0, 0.7, -1.0, -1.0], &[5, 2]),
        arr(&[0.3, -0.2, 0.8, 0.1, -0.5], &[5, 1]),
    )
    .unwrap()
}

/// A Gaussian predictive: mean `2x`, standard deviation `1 + |x|`.
pub fn gaussian_prediction(input: ArrayViewD<'_, f64>) -> Result<Record<f64>> {
    let mut record = BTreeMap::new();
    record.insert("pred_mean".to_owned(), input.mapv(|x| 2.0 * x));
    record.insert("pred_std".to_owned(), input.mapv(|x| 1.0 + x.abs()));
    Ok(record)
}

/// Seven one-feature points with targets `2x`.
pub fn line_points() -> DataBatch<f64> {
    let x = array![-3.0, -2.0, -1.0, 0.0, 1.0, 2.0, 3.0].into_shape_with_order((7, 1)).unwrap();
    let y = x.mapv(|v| 2.0 * v);
    DataBatch::new(x.into_dyn(), y.into_dyn()).unwrap()
}

pub fn assert_trees_close(a: &ParamTree<f64>, b: &ParamTree<f64>, tol: f64) {
    assert_eq!(a.structure(), b.structure());
    for (x, y) in a.flatten().into_iter().zip(b.flatten()) {
        assert!((x - y).abs() < tol, "{x} vs {y}");
    }
}
