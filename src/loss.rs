//! Loss selection and the stock losses.
//!
//! A loss is chosen with a [`LossSpec`] and resolved exactly once, when the
//! objective is composed, into a [`ResolvedLoss`]. Name lookup failures
//! therefore surface before any data is touched.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ndarray::{ArrayD, ArrayViewD, Axis};

use crate::breverse::BReverse;
use crate::bytecode_tape::BtapeThreadLocal;
use crate::error::{Error, Result};
use crate::float::Float;
use crate::scalar::Scalar;

/// The built-in losses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LossKind {
    /// `½ Σ (output − target)²`.
    SquaredError,
    /// `Σ |output − target|`.
    AbsoluteError,
    /// Categorical cross-entropy of logits against target probabilities,
    /// over the last axis and summed over the remaining ones.
    CrossEntropy,
}

impl LossKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LossKind::SquaredError => "squared_error",
            LossKind::AbsoluteError => "absolute_error",
            LossKind::CrossEntropy => "cross_entropy",
        }
    }

    /// Evaluate this loss on a model output and its target.
    pub fn apply<T: Scalar>(self, output: &ArrayD<T>, target: ArrayViewD<'_, T::Float>) -> Result<T> {
        match self {
            LossKind::SquaredError => squared_error(output, target),
            LossKind::AbsoluteError => absolute_error(output, target),
            LossKind::CrossEntropy => cross_entropy(output, target),
        }
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LossKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mse" | "squared_error" | "l2" => Ok(LossKind::SquaredError),
            "mae" | "absolute_error" | "l1" => Ok(LossKind::AbsoluteError),
            "cross_entropy" | "crossentropy" | "ce" => Ok(LossKind::CrossEntropy),
            _ => Err(Error::InvalidLossSpecification(s.to_owned())),
        }
    }
}

/// A user-supplied loss over `(model_output, target)`.
pub type CustomLoss<F> =
    Arc<dyn Fn(&ArrayD<BReverse<F>>, ArrayViewD<'_, F>) -> Result<BReverse<F>> + Send + Sync>;

/// How the model output is turned into a scalar objective.
#[derive(Clone)]
pub enum LossSpec<F: Float> {
    Named(LossKind),
    /// Looked up with [`LossKind::from_str`] at composition time.
    ByName(String),
    Custom(CustomLoss<F>),
}

impl<F: Float> LossSpec<F> {
    pub fn custom(
        f: impl Fn(&ArrayD<BReverse<F>>, ArrayViewD<'_, F>) -> Result<BReverse<F>> + Send + Sync + 'static,
    ) -> Self {
        LossSpec::Custom(Arc::new(f))
    }
}

impl<F: Float> fmt::Debug for LossSpec<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossSpec::Named(kind) => f.debug_tuple("Named").field(kind).finish(),
            LossSpec::ByName(name) => f.debug_tuple("ByName").field(name).finish(),
            LossSpec::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl<F: Float> From<LossKind> for LossSpec<F> {
    fn from(kind: LossKind) -> Self {
        LossSpec::Named(kind)
    }
}

impl<F: Float> From<&str> for LossSpec<F> {
    fn from(name: &str) -> Self {
        LossSpec::ByName(name.to_owned())
    }
}

/// A loss after name resolution.
#[derive(Clone)]
pub enum ResolvedLoss<F: Float> {
    Kind(LossKind),
    Custom(CustomLoss<F>),
    /// No loss: the model output is the objective and must hold one element.
    ModelOutput,
}

impl<F: Float> fmt::Debug for ResolvedLoss<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedLoss::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            ResolvedLoss::Custom(_) => f.write_str("Custom(..)"),
            ResolvedLoss::ModelOutput => f.write_str("ModelOutput"),
        }
    }
}

impl<F: BtapeThreadLocal> ResolvedLoss<F> {
    pub fn resolve(spec: Option<LossSpec<F>>) -> Result<Self> {
        Ok(match spec {
            None => ResolvedLoss::ModelOutput,
            Some(LossSpec::Named(kind)) => ResolvedLoss::Kind(kind),
            Some(LossSpec::ByName(name)) => ResolvedLoss::Kind(name.parse()?),
            Some(LossSpec::Custom(f)) => ResolvedLoss::Custom(f),
        })
    }

    pub fn apply(&self, output: &ArrayD<BReverse<F>>, target: ArrayViewD<'_, F>) -> Result<BReverse<F>> {
        match self {
            ResolvedLoss::Kind(kind) => kind.apply(output, target),
            ResolvedLoss::Custom(f) => f(output, target),
            ResolvedLoss::ModelOutput => match output.iter().next() {
                Some(&v) if output.len() == 1 => Ok(v),
                _ => Err(Error::mismatch(
                    "objective without loss",
                    "a model output with one element",
                    format!("shape {:?}", output.shape()),
                )),
            },
        }
    }
}

fn check_shapes<T: Scalar>(loss: LossKind, output: &ArrayD<T>, target: &ArrayViewD<'_, T::Float>) -> Result<()> {
    if output.shape() != target.shape() {
        return Err(Error::mismatch(
            format!("{loss} loss"),
            format!("target of shape {:?}", output.shape()),
            format!("shape {:?}", target.shape()),
        ));
    }
    Ok(())
}

/// `½ Σ (output − target)²`.
pub fn squared_error<T: Scalar>(output: &ArrayD<T>, target: ArrayViewD<'_, T::Float>) -> Result<T> {
    check_shapes(LossKind::SquaredError, output, &target)?;
    let half = T::from_f(<T::Float as Float>::from_int(1) / <T::Float as Float>::from_int(2));
    let sum = output
        .iter()
        .zip(target.iter())
        .fold(T::zero(), |acc, (&o, &t)| {
            let d = o - T::from_f(t);
            acc + d * d
        });
    Ok(half * sum)
}

/// `Σ |output − target|`.
pub fn absolute_error<T: Scalar>(output: &ArrayD<T>, target: ArrayViewD<'_, T::Float>) -> Result<T> {
    check_shapes(LossKind::AbsoluteError, output, &target)?;
    Ok(output
        .iter()
        .zip(target.iter())
        .fold(T::zero(), |acc, (&o, &t)| acc + (o - T::from_f(t)).abs()))
}

/// `Σ_rows −Σ_c target_c · log_softmax(output)_c` over the last axis.
///
/// The log-sum-exp is shifted by the row maximum, which is a constant and
/// leaves every derivative unchanged.
pub fn cross_entropy<T: Scalar>(output: &ArrayD<T>, target: ArrayViewD<'_, T::Float>) -> Result<T> {
    check_shapes(LossKind::CrossEntropy, output, &target)?;
    if output.ndim() == 0 {
        return Err(Error::mismatch(
            "cross_entropy loss",
            "logits with a class axis",
            "a 0-d output",
        ));
    }
    let class_axis = Axis(output.ndim() - 1);
    let mut total = T::zero();
    for (logits, probs) in output.lanes(class_axis).into_iter().zip(target.lanes(class_axis)) {
        let Some(shift) = logits
            .iter()
            .map(|x| x.value())
            .reduce(|a, b| if b > a { b } else { a })
        else {
            continue;
        };
        let shift = T::from_f(shift);
        let sum_exp = logits
            .iter()
            .fold(T::zero(), |acc, &x| acc + (x - shift).exp());
        let lse = shift + sum_exp.ln();
        total = logits
            .iter()
            .zip(probs.iter())
            .fold(total, |acc, (&x, &p)| acc + T::from_f(p) * (lse - x));
    }
    Ok(total)
}
