//! Batched evaluation of prediction functions and metrics over datasets.
//!
//! Every point of a dataset is turned into a [`Record`] of named arrays. The
//! records of a chunk are flushed into per-field column accumulators, so the
//! only per-point state alive at a time is that of one chunk. Columns are
//! finally stacked to `[N, ...]` in dataset order.

use std::collections::BTreeMap;

use log::debug;
use ndarray::{ArrayD, ArrayViewD, IxDyn};

use crate::batch::for_each_chunk;
use crate::data::{DataPoint, Dataset};
use crate::error::{Error, Result};
use crate::float::Float;
use crate::metrics::{identity, TARGET};

/// Named arrays describing the prediction for one input.
pub type Record<F> = BTreeMap<String, ArrayD<F>>;

/// Named result columns. Names are unique within one evaluation call.
pub type ResultsTable<F> = BTreeMap<String, ArrayD<F>>;

/// A boxed metric, for maps holding differently typed closures.
pub type MetricFn<F> = Box<dyn Fn(&Fields<'_, F>) -> Result<ArrayD<F>> + Send + Sync>;

/// Keyword-style view of a record, handed to a metric named `metric`.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a, F> {
    metric: &'a str,
    record: &'a Record<F>,
}

impl<'a, F> Fields<'a, F> {
    pub fn new(metric: &'a str, record: &'a Record<F>) -> Self {
        Fields { metric, record }
    }

    /// The field `field`, or [`Error::MissingPredictionField`] naming both the
    /// metric and the field.
    pub fn get(&self, field: &str) -> Result<ArrayViewD<'a, F>> {
        self.record
            .get(field)
            .map(|a| a.view())
            .ok_or_else(|| Error::MissingPredictionField {
                metric: self.metric.to_owned(),
                field: field.to_owned(),
            })
    }

    pub fn contains(&self, field: &str) -> bool {
        self.record.contains_key(field)
    }

    pub fn metric(&self) -> &'a str {
        self.metric
    }

    pub fn record(&self) -> &'a Record<F> {
        self.record
    }
}

/// A step run under a name chosen by its caller.
///
/// Receives the results so far and an auxiliary value by value and hands
/// both back.
pub trait NamedStep<F, A> {
    fn call(
        &self,
        results: ResultsTable<F>,
        aux: A,
        name: &str,
        record: &Record<F>,
    ) -> Result<(ResultsTable<F>, A)>;
}

impl<F, A, S: NamedStep<F, A> + ?Sized> NamedStep<F, A> for Box<S> {
    fn call(
        &self,
        results: ResultsTable<F>,
        aux: A,
        name: &str,
        record: &Record<F>,
    ) -> Result<(ResultsTable<F>, A)> {
        (**self).call(results, aux, name, record)
    }
}

/// Stores the output of a record function under the step's name.
#[derive(Debug, Clone, Copy)]
pub struct NamedResultWriter<G> {
    f: G,
}

/// Wrap `f` so that it writes `f(fields)` into `results[name]`.
pub fn named_result_writer<G>(f: G) -> NamedResultWriter<G> {
    NamedResultWriter { f }
}

impl<F, A, G> NamedStep<F, A> for NamedResultWriter<G>
where
    G: Fn(&Fields<'_, F>) -> Result<ArrayD<F>>,
{
    fn call(
        &self,
        mut results: ResultsTable<F>,
        aux: A,
        name: &str,
        record: &Record<F>,
    ) -> Result<(ResultsTable<F>, A)> {
        let value = (self.f)(&Fields::new(name, record))?;
        results.insert(name.to_owned(), value);
        Ok((results, aux))
    }
}

/// Run every step in key order, threading `(results, aux)` through them.
///
/// Each step sees the record only, never results written by earlier steps.
pub fn run_named_steps<F, A, S>(
    steps: &BTreeMap<String, S>,
    results: ResultsTable<F>,
    aux: A,
    record: &Record<F>,
) -> Result<ResultsTable<F>>
where
    S: NamedStep<F, A>,
{
    let (results, _) = steps
        .iter()
        .try_fold((results, aux), |(results, aux), (name, step)| {
            step.call(results, aux, name, record)
        })?;
    Ok(results)
}

/// A step that knows which key it writes and may read earlier results.
pub trait OrderedStep<F, A> {
    fn call(
        &self,
        results: ResultsTable<F>,
        aux: A,
        record: &Record<F>,
    ) -> Result<(ResultsTable<F>, A)>;
}

impl<F, A, S: OrderedStep<F, A> + ?Sized> OrderedStep<F, A> for Box<S> {
    fn call(
        &self,
        results: ResultsTable<F>,
        aux: A,
        record: &Record<F>,
    ) -> Result<(ResultsTable<F>, A)> {
        (**self).call(results, aux, record)
    }
}

/// An [`OrderedStep`] writing `f(results, fields)` under `key`.
#[derive(Debug, Clone)]
pub struct KeyedStep<G> {
    key: String,
    f: G,
}

pub fn keyed_step<G>(key: impl Into<String>, f: G) -> KeyedStep<G> {
    KeyedStep { key: key.into(), f }
}

impl<G> KeyedStep<G> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<F, A, G> OrderedStep<F, A> for KeyedStep<G>
where
    G: Fn(&ResultsTable<F>, &Fields<'_, F>) -> Result<ArrayD<F>>,
{
    fn call(
        &self,
        mut results: ResultsTable<F>,
        aux: A,
        record: &Record<F>,
    ) -> Result<(ResultsTable<F>, A)> {
        if results.contains_key(&self.key) {
            return Err(Error::DuplicateResultName(self.key.clone()));
        }
        let value = (self.f)(&results, &Fields::new(&self.key, record))?;
        results.insert(self.key.clone(), value);
        Ok((results, aux))
    }
}

/// Run `steps` in slice order, threading `(results, aux)` through them.
pub fn run_ordered_steps<F, A, S>(
    steps: &[S],
    results: ResultsTable<F>,
    aux: A,
    record: &Record<F>,
) -> Result<ResultsTable<F>>
where
    S: OrderedStep<F, A>,
{
    let (results, _) = steps
        .iter()
        .try_fold((results, aux), |(results, aux), step| {
            step.call(results, aux, record)
        })?;
    Ok(results)
}

/// `pred_fn(input)` joined with the point's target.
fn predict_point<F, P>(pred_fn: &P, point: DataPoint<F>) -> Result<Record<F>>
where
    P: Fn(ArrayViewD<'_, F>) -> Result<Record<F>>,
{
    let mut record = pred_fn(point.input.view())?;
    if record.contains_key(TARGET) {
        return Err(Error::DuplicateResultName(TARGET.to_owned()));
    }
    record.insert(TARGET.to_owned(), point.target);
    Ok(record)
}

/// Row-major column buffers, one per field.
struct Columns<F> {
    rows: usize,
    fields: BTreeMap<String, (Vec<usize>, Vec<F>)>,
}

impl<F: Float> Columns<F> {
    fn new() -> Self {
        Columns {
            rows: 0,
            fields: BTreeMap::new(),
        }
    }

    fn push(&mut self, record: Record<F>) -> Result<()> {
        let index = self.rows;
        if index == 0 {
            self.fields = record
                .into_iter()
                .map(|(k, a)| {
                    let shape = a.shape().to_vec();
                    (k, (shape, a.iter().copied().collect()))
                })
                .collect();
            self.rows = 1;
            return Ok(());
        }
        if !self.fields.keys().eq(record.keys()) {
            return Err(Error::mismatch(
                format!("fields of record {index}"),
                format!("{:?}", self.fields.keys().collect::<Vec<_>>()),
                format!("{:?}", record.keys().collect::<Vec<_>>()),
            ));
        }
        for ((name, (shape, data)), a) in self.fields.iter_mut().zip(record.into_values()) {
            if a.shape() != shape.as_slice() {
                return Err(Error::mismatch(
                    format!("field `{name}` of record {index}"),
                    format!("shape {shape:?}"),
                    format!("shape {:?}", a.shape()),
                ));
            }
            data.extend(a.iter().copied());
        }
        self.rows += 1;
        Ok(())
    }

    fn finish(self) -> Result<ResultsTable<F>> {
        let rows = self.rows;
        self.fields
            .into_iter()
            .map(|(name, (shape, data))| {
                let mut full = Vec::with_capacity(shape.len() + 1);
                full.push(rows);
                full.extend_from_slice(&shape);
                let column = ArrayD::from_shape_vec(IxDyn(&full), data)
                    .map_err(|e| Error::mismatch(format!("column `{name}`"), format!("shape {full:?}"), e))?;
                Ok((name, column))
            })
            .collect()
    }
}

fn collect_records<F, D, G>(dataset: &D, batch_size: usize, per_point: G) -> Result<ResultsTable<F>>
where
    F: Float,
    D: Dataset<F> + ?Sized,
    G: Fn(DataPoint<F>) -> Result<Record<F>> + Sync,
{
    let mut columns = Columns::new();
    for_each_chunk(dataset, batch_size, per_point, |_, chunk| {
        chunk.into_iter().try_for_each(|record| columns.push(record))
    })?;
    columns.finish()
}

/// Apply `pred_fn` to every input of `dataset` and stack the results.
///
/// Each point contributes its prediction fields plus `"target"`. Points are
/// evaluated `batch_size` at a time; the result does not depend on
/// `batch_size`. An empty dataset yields an empty table.
///
/// # Errors
///
/// - [`Error::InvalidBatchSize`] if `batch_size == 0`.
/// - [`Error::DuplicateResultName`] if `pred_fn` returns a `"target"` field.
/// - [`Error::StructureMismatch`] if points disagree on fields or shapes.
pub fn evaluate_on_dataset<F, D, P>(pred_fn: P, dataset: &D, batch_size: usize) -> Result<ResultsTable<F>>
where
    F: Float,
    D: Dataset<F> + ?Sized,
    P: Fn(ArrayViewD<'_, F>) -> Result<Record<F>> + Sync,
{
    debug!(
        "evaluating predictions on {} points, batch size {batch_size}",
        dataset.len()
    );
    collect_records(dataset, batch_size, |point| predict_point(&pred_fn, point))
}

/// [`evaluate_metrics_on_dataset_with`] with the identity transform.
pub fn evaluate_metrics_on_dataset<F, D, P, M>(
    pred_fn: P,
    dataset: &D,
    metrics: &BTreeMap<String, M>,
    batch_size: usize,
) -> Result<ResultsTable<F>>
where
    F: Float,
    D: Dataset<F> + ?Sized,
    P: Fn(ArrayViewD<'_, F>) -> Result<Record<F>> + Sync,
    M: Fn(&Fields<'_, F>) -> Result<ArrayD<F>> + Sync,
{
    evaluate_metrics_on_dataset_with(pred_fn, dataset, metrics, identity, batch_size)
}

/// Evaluate each named metric on every point and stack the per-point values.
///
/// Metrics see the prediction fields plus `"target"`. After stacking,
/// `apply` transforms each column independently, e.g. [`mean`](crate::metrics::mean).
/// An empty dataset yields one `[0]`-shaped column per metric.
///
/// A metric asking for a field that is not there fails the whole call with
/// [`Error::MissingPredictionField`]; no table is returned.
pub fn evaluate_metrics_on_dataset_with<F, D, P, M, T>(
    pred_fn: P,
    dataset: &D,
    metrics: &BTreeMap<String, M>,
    apply: T,
    batch_size: usize,
) -> Result<ResultsTable<F>>
where
    F: Float,
    D: Dataset<F> + ?Sized,
    P: Fn(ArrayViewD<'_, F>) -> Result<Record<F>> + Sync,
    M: Fn(&Fields<'_, F>) -> Result<ArrayD<F>> + Sync,
    T: Fn(ArrayD<F>) -> ArrayD<F>,
{
    debug!(
        "evaluating {} metrics on {} points, batch size {batch_size}",
        metrics.len(),
        dataset.len()
    );
    let writers: BTreeMap<String, NamedResultWriter<&M>> = metrics
        .iter()
        .map(|(name, m)| (name.clone(), named_result_writer(m)))
        .collect();

    let mut table = collect_records(dataset, batch_size, |point| {
        let record = predict_point(&pred_fn, point)?;
        run_named_steps(&writers, ResultsTable::new(), (), &record)
    })?;
    if dataset.is_empty() {
        table = metrics
            .keys()
            .map(|name| (name.clone(), ArrayD::zeros(IxDyn(&[0]))))
            .collect();
    }
    Ok(table
        .into_iter()
        .map(|(name, column)| (name, apply(column)))
        .collect())
}
