//! Vectorizing and chunked maps.
//!
//! [`vmap`] applies a per-sample function along the leading axis and stacks
//! the results. [`for_each_chunk`] streams a [`Dataset`] through a per-point
//! function in fixed-size chunks, in parallel within a chunk when the
//! `parallel` feature is enabled.

use log::trace;
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::data::{DataPoint, Dataset};
use crate::error::{Error, Result};
use crate::float::Float;

/// Stack equally shaped arrays along a new leading axis.
///
/// An empty slice stacks to shape `[0]`. Differing shapes fail with
/// [`Error::StructureMismatch`] naming `context`.
pub fn stack_views<T: Clone>(context: &str, views: &[ArrayViewD<'_, T>]) -> Result<ArrayD<T>> {
    let Some(first) = views.first() else {
        return Ok(ArrayD::from_shape_vec(IxDyn(&[0]), Vec::new())
            .unwrap_or_else(|_| unreachable!("empty array has shape [0]")));
    };
    if let Some((i, bad)) = views
        .iter()
        .enumerate()
        .find(|(_, v)| v.shape() != first.shape())
    {
        return Err(Error::mismatch(
            format!("{context} (entry {i})"),
            format!("shape {:?}", first.shape()),
            format!("shape {:?}", bad.shape()),
        ));
    }
    ndarray::stack(Axis(0), views).map_err(|e| Error::mismatch(context, "stackable arrays", e))
}

/// Apply `f` to every slice along axis 0 of `input` and stack the outputs.
///
/// Samples never see each other, so a per-sample model lifted this way
/// behaves exactly like calling it once per row.
pub fn vmap<F, T, G>(input: ArrayViewD<'_, F>, mut f: G) -> Result<ArrayD<T>>
where
    T: Clone,
    G: FnMut(ArrayViewD<'_, F>) -> Result<ArrayD<T>>,
{
    if input.ndim() == 0 {
        return Err(Error::mismatch(
            "vmap input",
            "an array with a leading axis",
            "a 0-d array",
        ));
    }
    let outputs = input
        .axis_iter(Axis(0))
        .map(&mut f)
        .collect::<Result<Vec<_>>>()?;
    let views: Vec<ArrayViewD<'_, T>> = outputs.iter().map(|o| o.view()).collect();
    stack_views("vmap outputs", &views)
}

/// Map `f` over every point of `dataset`, `batch_size` points at a time.
///
/// Each finished chunk is handed to `sink` together with the index of its
/// first point, in dataset order. The first error from either `f` or `sink`
/// stops the traversal.
pub fn for_each_chunk<F, D, R, G, S>(
    dataset: &D,
    batch_size: usize,
    f: G,
    mut sink: S,
) -> Result<()>
where
    F: Float,
    D: Dataset<F> + ?Sized,
    R: Send,
    G: Fn(DataPoint<F>) -> Result<R> + Sync,
    S: FnMut(usize, Vec<R>) -> Result<()>,
{
    if batch_size == 0 {
        return Err(Error::InvalidBatchSize(batch_size));
    }
    let n = dataset.len();
    let mut start = 0;
    while start < n {
        let end = (start + batch_size).min(n);
        trace!("evaluating points {start}..{end} of {n}");

        #[cfg(feature = "parallel")]
        let chunk = (start..end)
            .into_par_iter()
            .map(|i| dataset.point(i).and_then(&f))
            .collect::<Result<Vec<R>>>()?;
        #[cfg(not(feature = "parallel"))]
        let chunk = (start..end)
            .map(|i| dataset.point(i).and_then(&f))
            .collect::<Result<Vec<R>>>()?;

        sink(start, chunk)?;
        start = end;
    }
    Ok(())
}
