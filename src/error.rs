use thiserror::Error;

/// Errors produced by objective composition, curvature products and
/// dataset evaluation.
///
/// Every variant carries the name or key that failed. Nothing is retried and
/// no partial result is returned alongside an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A loss selector named a loss that does not exist.
    #[error("invalid loss specification: {0:?}")]
    InvalidLossSpecification(String),

    /// The objective produced a non-finite value or derivative.
    #[error("objective is not differentiable here: {reason}")]
    NonDifferentiableObjective { reason: String },

    /// A metric asked for a field the prediction record does not have.
    #[error("metric `{metric}` requires field `{field}`, which the prediction does not provide")]
    MissingPredictionField { metric: String, field: String },

    /// Two trees or arrays that must agree in shape do not.
    #[error("structure mismatch in {context}: expected {expected}, found {found}")]
    StructureMismatch {
        context: String,
        expected: String,
        found: String,
    },

    /// A result key was written twice in one evaluation.
    #[error("result name `{0}` is already taken")]
    DuplicateResultName(String),

    #[error("batch size must be positive, got {0}")]
    InvalidBatchSize(usize),

    #[error("index {index} out of bounds for dataset of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

impl Error {
    /// Shorthand for [`Error::StructureMismatch`].
    pub(crate) fn mismatch(
        context: impl Into<String>,
        expected: impl std::fmt::Display,
        found: impl std::fmt::Display,
    ) -> Self {
        Error::StructureMismatch {
            context: context.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
