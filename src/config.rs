//! Batch-size configuration for the evaluation harness.

use crate::error::{Error, Result};

/// Batch size used when nothing is configured.
pub const DEFAULT_BATCH_SIZE: usize = 1;

/// Which evaluation entry point a batch size is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalStage {
    /// [`evaluate_on_dataset`](crate::eval::evaluate_on_dataset).
    Predictions,
    /// [`evaluate_metrics_on_dataset`](crate::eval::evaluate_metrics_on_dataset).
    Metrics,
}

/// Batch sizes for dataset traversal.
///
/// A stage-specific size wins over `data_batch_size`, which wins over
/// [`DEFAULT_BATCH_SIZE`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BatchConfig {
    /// Shared fallback for every stage.
    pub data_batch_size: Option<usize>,
    pub evaluate_on_dataset_batch_size: Option<usize>,
    pub evaluate_metrics_on_dataset_batch_size: Option<usize>,
}

impl BatchConfig {
    /// Configuration with one batch size for every stage.
    pub fn uniform(batch_size: usize) -> Self {
        BatchConfig {
            data_batch_size: Some(batch_size),
            ..Default::default()
        }
    }

    /// The batch size for `stage`. Fails with [`Error::InvalidBatchSize`] on zero.
    pub fn resolve(&self, stage: EvalStage) -> Result<usize> {
        let specific = match stage {
            EvalStage::Predictions => self.evaluate_on_dataset_batch_size,
            EvalStage::Metrics => self.evaluate_metrics_on_dataset_batch_size,
        };
        match specific.or(self.data_batch_size).unwrap_or(DEFAULT_BATCH_SIZE) {
            0 => Err(Error::InvalidBatchSize(0)),
            n => Ok(n),
        }
    }
}
