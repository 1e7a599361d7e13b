//! Batched evaluation of predictions and metrics.

mod common;

use std::collections::BTreeMap;

use approx::assert_relative_eq;
use common::{gaussian_prediction, line_points};
use laplace_core::eval::{KeyedStep, OrderedStep};
use laplace_core::metrics::{
    absolute_error, chi_squared, gaussian_nll, mean, squared_error, PRED_MEAN, TARGET,
};
use laplace_core::{
    evaluate_metrics_on_dataset, evaluate_metrics_on_dataset_with, evaluate_on_dataset,
    keyed_step, named_result_writer, run_named_steps, run_ordered_steps, DataBatch, DataPoint,
    Error, Fields, MetricFn, Record, ResultsTable,
};
use ndarray::{arr0, array, ArrayD, ArrayViewD, Axis, IxDyn};

fn record(pairs: &[(&str, ArrayD<f64>)]) -> Record<f64> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn boxed(f: fn(&Fields<'_, f64>) -> laplace_core::Result<ArrayD<f64>>) -> MetricFn<f64> {
    Box::new(f)
}

fn scalar(a: &ArrayD<f64>) -> f64 {
    *a.first().unwrap()
}

fn stock_metrics() -> BTreeMap<String, MetricFn<f64>> {
    let mut m = BTreeMap::new();
    m.insert("mse".to_owned(), boxed(squared_error));
    m.insert("nll".to_owned(), boxed(gaussian_nll));
    m
}

// ── Named and ordered steps ──

#[test]
fn named_steps_write_under_their_names() {
    let rec = record(&[
        ("pred_mean", array![1.0, 2.0].into_dyn()),
        ("target", array![1.0, 4.0].into_dyn()),
    ]);
    let mut steps = BTreeMap::new();
    steps.insert("mse".to_owned(), named_result_writer(boxed(squared_error)));
    steps.insert("mae".to_owned(), named_result_writer(boxed(absolute_error)));
    let results = run_named_steps(&steps, ResultsTable::new(), (), &rec).unwrap();

    assert_eq!(results.len(), 2);
    assert_relative_eq!(scalar(&results["mse"]), 2.0);
    assert_relative_eq!(scalar(&results["mae"]), 1.0);
}

#[test]
fn named_steps_do_not_see_earlier_results() {
    let rec = record(&[("x", arr0(3.0).into_dyn())]);
    let mut steps: BTreeMap<String, MetricFn<f64>> = BTreeMap::new();
    steps.insert(
        "a".into(),
        Box::new(|f: &Fields<'_, f64>| -> laplace_core::Result<ArrayD<f64>> {
            Ok(f.get("x")?.to_owned())
        }),
    );
    steps.insert(
        "b".into(),
        Box::new(|f: &Fields<'_, f64>| -> laplace_core::Result<ArrayD<f64>> {
            assert!(!f.contains("a"));
            Ok(f.get("x")?.mapv(|v| v * 2.0))
        }),
    );
    let writers: BTreeMap<_, _> = steps
        .iter()
        .map(|(k, m)| (k.clone(), named_result_writer(m)))
        .collect();
    let results = run_named_steps(&writers, ResultsTable::new(), (), &rec).unwrap();
    assert_relative_eq!(scalar(&results["b"]), 6.0);
}

#[test]
fn ordered_steps_can_build_on_each_other() {
    let rec = record(&[("x", arr0(3.0).into_dyn())]);
    let steps: Vec<Box<dyn OrderedStep<f64, usize>>> = vec![
        Box::new(keyed_step(
            "double",
            |_: &ResultsTable<f64>, f: &Fields<'_, f64>| -> laplace_core::Result<ArrayD<f64>> {
                Ok(f.get("x")?.mapv(|v| 2.0 * v))
            },
        )),
        Box::new(keyed_step(
            "plus_one",
            |r: &ResultsTable<f64>, _: &Fields<'_, f64>| -> laplace_core::Result<ArrayD<f64>> {
                Ok(r["double"].mapv(|v| v + 1.0))
            },
        )),
        Box::new(CountingStep("count".to_owned())),
    ];
    let results = run_ordered_steps(&steps, ResultsTable::new(), 0usize, &rec).unwrap();
    assert_relative_eq!(scalar(&results["plus_one"]), 7.0);
    assert_relative_eq!(scalar(&results["count"]), 2.0);
}

/// Writes how many results existed before it ran.
struct CountingStep(String);

impl OrderedStep<f64, usize> for CountingStep {
    fn call(
        &self,
        mut results: ResultsTable<f64>,
        aux: usize,
        _record: &Record<f64>,
    ) -> laplace_core::Result<(ResultsTable<f64>, usize)> {
        let n = results.len();
        results.insert(self.0.clone(), arr0(n as f64).into_dyn());
        Ok((results, aux + 1))
    }
}

#[test]
fn ordered_steps_reject_duplicate_keys() {
    let rec = record(&[("x", arr0(1.0).into_dyn())]);
    let step = |_: &ResultsTable<f64>, f: &Fields<'_, f64>| -> laplace_core::Result<ArrayD<f64>> {
        Ok(f.get("x")?.to_owned())
    };
    let steps: Vec<KeyedStep<_>> = vec![keyed_step("y", step), keyed_step("y", step)];
    let err = run_ordered_steps(&steps, ResultsTable::new(), (), &rec).unwrap_err();
    assert_eq!(err, Error::DuplicateResultName("y".into()));
}

// ── evaluate_on_dataset ──

#[test]
fn predictions_are_stacked_with_targets() {
    let data = line_points();
    let table = evaluate_on_dataset(gaussian_prediction, &data, 3).unwrap();

    assert_eq!(
        table.keys().collect::<Vec<_>>(),
        vec!["pred_mean", "pred_std", "target"]
    );
    assert_eq!(table[PRED_MEAN].shape(), &[7, 1]);
    assert_eq!(table[TARGET], data.target().to_owned());
    assert_relative_eq!(table["pred_std"][[0, 0]], 4.0);
}

#[test]
fn results_do_not_depend_on_batch_size() {
    let data = line_points();
    let reference = evaluate_on_dataset(gaussian_prediction, &data, 1).unwrap();
    for batch_size in [2, 3, 5, 7, 10] {
        let table = evaluate_on_dataset(gaussian_prediction, &data, batch_size).unwrap();
        assert_eq!(table, reference, "batch size {batch_size}");
    }

    let metrics = stock_metrics();
    let reference = evaluate_metrics_on_dataset(gaussian_prediction, &data, &metrics, 1).unwrap();
    for batch_size in [2, 4, 7, 8] {
        let table =
            evaluate_metrics_on_dataset(gaussian_prediction, &data, &metrics, batch_size).unwrap();
        assert_eq!(table, reference, "batch size {batch_size}");
    }
}

#[test]
fn point_lists_are_datasets() {
    let points: Vec<DataPoint<f64>> = (0..4)
        .map(|i| DataPoint {
            input: array![i as f64].into_dyn(),
            target: array![2.0 * i as f64].into_dyn(),
        })
        .collect();
    let table = evaluate_on_dataset(gaussian_prediction, &points, 2).unwrap();
    assert_eq!(table[PRED_MEAN], table[TARGET]);
    assert_eq!(table[TARGET].shape(), &[4, 1]);
}

#[test]
fn prediction_named_target_is_rejected() {
    let data = line_points();
    let pred = |x: ArrayViewD<'_, f64>| -> laplace_core::Result<Record<f64>> {
        Ok(record(&[("target", x.to_owned())]))
    };
    let err = evaluate_on_dataset(pred, &data, 2).unwrap_err();
    assert_eq!(err, Error::DuplicateResultName("target".into()));
}

#[test]
fn inconsistent_records_are_rejected() {
    let data = line_points();
    let pred = |x: ArrayViewD<'_, f64>| -> laplace_core::Result<Record<f64>> {
        let n = if x[[0]] > 0.0 { 2 } else { 1 };
        Ok(record(&[("pred_mean", ArrayD::zeros(IxDyn(&[n])))]))
    };
    let err = evaluate_on_dataset(pred, &data, 3).unwrap_err();
    assert!(matches!(err, Error::StructureMismatch { .. }));
}

#[test]
fn empty_dataset_gives_empty_table() {
    let data = DataBatch::new(ArrayD::zeros(IxDyn(&[0, 1])), ArrayD::zeros(IxDyn(&[0, 1]))).unwrap();
    assert!(evaluate_on_dataset(gaussian_prediction, &data, 4).unwrap().is_empty());

    let table = evaluate_metrics_on_dataset(gaussian_prediction, &data, &stock_metrics(), 4).unwrap();
    assert_eq!(table.len(), 2);
    assert!(table.values().all(|c| c.shape() == [0]));
}

#[test]
fn zero_batch_size_is_rejected() {
    let err = evaluate_on_dataset(gaussian_prediction, &line_points(), 0).unwrap_err();
    assert_eq!(err, Error::InvalidBatchSize(0));
}

// ── evaluate_metrics_on_dataset ──

#[test]
fn perfect_predictions_have_zero_squared_error() {
    let data = line_points();
    let metrics = stock_metrics();
    let table = evaluate_metrics_on_dataset(gaussian_prediction, &data, &metrics, 3).unwrap();
    assert_eq!(table.keys().collect::<Vec<_>>(), vec!["mse", "nll"]);
    assert_eq!(table["mse"].shape(), &[7]);
    assert!(table["mse"].iter().all(|&v| v == 0.0));

    // With zero residual the NLL is ½ log 2π + log σ.
    let half_log_two_pi = 0.5 * (2.0 * std::f64::consts::PI).ln();
    for (i, &nll) in table["nll"].iter().enumerate() {
        let sigma = 1.0 + (i as f64 - 3.0).abs();
        assert_relative_eq!(nll, half_log_two_pi + sigma.ln(), epsilon = 1e-12);
    }
}

#[test]
fn apply_reduces_each_column() {
    let data = line_points();
    let shifted = |x: ArrayViewD<'_, f64>| -> laplace_core::Result<Record<f64>> {
        Ok(record(&[("pred_mean", x.mapv(|v| 2.0 * v + 1.0))]))
    };
    let mut metrics: BTreeMap<String, MetricFn<f64>> = BTreeMap::new();
    metrics.insert("mse".into(), boxed(squared_error));
    metrics.insert("mae".into(), boxed(absolute_error));
    let table = evaluate_metrics_on_dataset_with(shifted, &data, &metrics, mean, 2).unwrap();

    assert_eq!(table["mse"].ndim(), 0);
    assert_relative_eq!(scalar(&table["mse"]), 1.0);
    assert_relative_eq!(scalar(&table["mae"]), 1.0);
}

#[test]
fn missing_field_fails_the_whole_evaluation() {
    let data = line_points();
    let mut metrics: BTreeMap<String, MetricFn<f64>> = BTreeMap::new();
    metrics.insert("a_mse".into(), boxed(squared_error));
    metrics.insert("chi2".into(), boxed(chi_squared));
    let mean_only = |x: ArrayViewD<'_, f64>| -> laplace_core::Result<Record<f64>> {
        Ok(record(&[("pred_mean", x.mapv(|v| 2.0 * v))]))
    };
    let err = evaluate_metrics_on_dataset(mean_only, &data, &metrics, 3).unwrap_err();
    assert_eq!(
        err,
        Error::MissingPredictionField {
            metric: "chi2".into(),
            field: "pred_std".into(),
        }
    );
}

#[test]
fn chi_squared_of_unit_residuals() {
    let data = line_points();
    let pred = |x: ArrayViewD<'_, f64>| -> laplace_core::Result<Record<f64>> {
        Ok(record(&[
            ("pred_mean", x.mapv(|v| 2.0 * v + 0.5)),
            ("pred_std", x.mapv(|_| 0.5)),
        ]))
    };
    let mut metrics: BTreeMap<String, MetricFn<f64>> = BTreeMap::new();
    metrics.insert("chi2".into(), boxed(chi_squared));
    let table = evaluate_metrics_on_dataset(pred, &data, &metrics, 7).unwrap();
    assert!(table["chi2"].iter().all(|&v| (v - 1.0).abs() < 1e-12));
}

#[test]
fn dataset_points_are_bounds_checked() {
    use laplace_core::Dataset;
    let data = line_points();
    assert_eq!(
        data.point(7).unwrap_err(),
        Error::IndexOutOfBounds { index: 7, len: 7 }
    );
    let p = data.point(2).unwrap();
    assert_eq!(p.input, data.input().index_axis(Axis(0), 2).to_owned());
}
