//! Data batches and datasets.
//!
//! A [`DataBatch`] stores inputs and targets stacked along a leading sample
//! axis. The evaluation harness only needs random access to single points,
//! which the [`Dataset`] trait provides.

use ndarray::{ArrayD, ArrayViewD, Axis};

use crate::error::{Error, Result};
use crate::float::Float;

/// Inputs and targets aligned on axis 0.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBatch<F> {
    input: ArrayD<F>,
    target: ArrayD<F>,
}

/// One sample, with the leading axis removed.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint<F> {
    pub input: ArrayD<F>,
    pub target: ArrayD<F>,
}

impl<F: Float> DataBatch<F> {
    /// Build a batch from stacked inputs and targets.
    ///
    /// Both arrays need at least one axis and the same length along axis 0.
    pub fn new(input: ArrayD<F>, target: ArrayD<F>) -> Result<Self> {
        if input.ndim() == 0 || target.ndim() == 0 {
            return Err(Error::mismatch(
                "data batch",
                "arrays with a leading sample axis",
                format!("input ndim {}, target ndim {}", input.ndim(), target.ndim()),
            ));
        }
        let n = input.len_of(Axis(0));
        let m = target.len_of(Axis(0));
        if n != m {
            return Err(Error::mismatch(
                "data batch",
                format!("{n} targets"),
                format!("{m} targets"),
            ));
        }
        Ok(Self { input, target })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.input.len_of(Axis(0))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn input(&self) -> ArrayViewD<'_, F> {
        self.input.view()
    }

    #[inline]
    pub fn target(&self) -> ArrayViewD<'_, F> {
        self.target.view()
    }
}

/// Random access to individual data points.
///
/// `Sync` so chunks can be evaluated in parallel.
pub trait Dataset<F>: Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`-th point, or [`Error::IndexOutOfBounds`].
    fn point(&self, index: usize) -> Result<DataPoint<F>>;
}

impl<F: Float> Dataset<F> for DataBatch<F> {
    fn len(&self) -> usize {
        DataBatch::len(self)
    }

    fn point(&self, index: usize) -> Result<DataPoint<F>> {
        let len = DataBatch::len(self);
        if index >= len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        Ok(DataPoint {
            input: self.input.index_axis(Axis(0), index).to_owned(),
            target: self.target.index_axis(Axis(0), index).to_owned(),
        })
    }
}

impl<F: Float> Dataset<F> for [DataPoint<F>] {
    fn len(&self) -> usize {
        <[DataPoint<F>]>::len(self)
    }

    fn point(&self, index: usize) -> Result<DataPoint<F>> {
        self.get(index).cloned().ok_or(Error::IndexOutOfBounds {
            index,
            len: <[DataPoint<F>]>::len(self),
        })
    }
}

impl<F: Float> Dataset<F> for Vec<DataPoint<F>> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn point(&self, index: usize) -> Result<DataPoint<F>> {
        Dataset::point(self.as_slice(), index)
    }
}
