//! Composing a model and a loss into one scalar objective.

use log::debug;
use ndarray::{ArrayD, ArrayViewD};

use crate::api::try_record;
use crate::batch::vmap;
use crate::breverse::BReverse;
use crate::bytecode_tape::{ensure_finite, BtapeThreadLocal, BytecodeTape};
use crate::data::DataBatch;
use crate::error::Result;
use crate::float::Float;
use crate::loss::{LossSpec, ResolvedLoss};
use crate::scalar::Scalar;
use crate::tree::{ParamTree, TreeDef};

/// A differentiable mapping from parameters and input to an output array.
///
/// `apply` is generic over the scalar type so the same model runs on plain
/// floats, dual numbers and taped reverse-mode variables.
pub trait Model<F: Float>: Send + Sync {
    fn apply<T: Scalar<Float = F>>(
        &self,
        params: &ParamTree<T>,
        input: ArrayViewD<'_, F>,
    ) -> Result<ArrayD<T>>;
}

impl<F: Float, M: Model<F>> Model<F> for &M {
    fn apply<T: Scalar<Float = F>>(
        &self,
        params: &ParamTree<T>,
        input: ArrayViewD<'_, F>,
    ) -> Result<ArrayD<T>> {
        (**self).apply(params, input)
    }
}

/// A scalar objective of `(params, input, target)`.
///
/// Implemented by [`Objective`] and by any closure of the same shape.
pub trait ObjectiveFn<F: BtapeThreadLocal>: Send + Sync {
    fn eval(
        &self,
        params: &ParamTree<BReverse<F>>,
        input: ArrayViewD<'_, F>,
        target: ArrayViewD<'_, F>,
    ) -> Result<BReverse<F>>;
}

impl<F, G> ObjectiveFn<F> for G
where
    F: BtapeThreadLocal,
    G: Fn(&ParamTree<BReverse<F>>, ArrayViewD<'_, F>, ArrayViewD<'_, F>) -> Result<BReverse<F>>
        + Send
        + Sync,
{
    fn eval(
        &self,
        params: &ParamTree<BReverse<F>>,
        input: ArrayViewD<'_, F>,
        target: ArrayViewD<'_, F>,
    ) -> Result<BReverse<F>> {
        self(params, input, target)
    }
}

/// A model bound to a resolved loss.
#[derive(Debug, Clone)]
pub struct Objective<F: Float, M> {
    model: M,
    loss: ResolvedLoss<F>,
    has_batch: bool,
}

impl<F: BtapeThreadLocal, M: Model<F>> Objective<F, M> {
    /// Bind `model` to `loss`.
    ///
    /// With `has_batch == false` the model sees one sample at a time and its
    /// outputs are stacked along a new leading axis. The loss is resolved
    /// here, so an unknown loss name fails before any data is seen.
    pub fn compose(model: M, loss: Option<LossSpec<F>>, has_batch: bool) -> Result<Self> {
        let loss = ResolvedLoss::resolve(loss)?;
        debug!("composed objective: loss {loss:?}, has_batch {has_batch}");
        Ok(Objective {
            model,
            loss,
            has_batch,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn loss(&self) -> &ResolvedLoss<F> {
        &self.loss
    }

    pub fn has_batch(&self) -> bool {
        self.has_batch
    }

    /// Model output on a batch, lifted over axis 0 when the model is per-sample.
    pub fn model_output<T: Scalar<Float = F>>(
        &self,
        params: &ParamTree<T>,
        input: ArrayViewD<'_, F>,
    ) -> Result<ArrayD<T>> {
        if self.has_batch {
            self.model.apply(params, input)
        } else {
            vmap(input, |x| self.model.apply(params, x))
        }
    }

    /// Objective value without recording a tape.
    pub fn value(&self, params: &ParamTree<F>, batch: &DataBatch<F>) -> Result<F> {
        let constants = params.map(|&p| BReverse::constant(p));
        Ok(self.eval(&constants, batch.input(), batch.target())?.value)
    }

    /// `(value, ∇_params objective)` on `batch`.
    pub fn gradient(&self, params: &ParamTree<F>, batch: &DataBatch<F>) -> Result<(F, ParamTree<F>)> {
        let (tape, def, value) = record_objective(self, params, batch)?;
        let g = tape.gradient();
        ensure_finite("gradient", &g)?;
        Ok((value, def.unflatten(&g)?))
    }
}

impl<F: BtapeThreadLocal, M: Model<F>> ObjectiveFn<F> for Objective<F, M> {
    fn eval(
        &self,
        params: &ParamTree<BReverse<F>>,
        input: ArrayViewD<'_, F>,
        target: ArrayViewD<'_, F>,
    ) -> Result<BReverse<F>> {
        // No samples to lift over: the summed objective is zero.
        if !self.has_batch && input.shape().first() == Some(&0) {
            return Ok(BReverse::constant(F::zero()));
        }
        let output = self.model_output(params, input)?;
        self.loss.apply(&output, target)
    }
}

/// Record `objective(params, input, target)` with every parameter as a tape input.
pub(crate) fn record_objective<F, O>(
    objective: &O,
    params: &ParamTree<F>,
    batch: &DataBatch<F>,
) -> Result<(BytecodeTape<F>, TreeDef, F)>
where
    F: BtapeThreadLocal,
    O: ObjectiveFn<F> + ?Sized,
{
    let def = params.structure();
    let flat = params.flatten();
    let (tape, value) = try_record(
        |inputs| {
            let tracked = def.unflatten(inputs)?;
            objective.eval(&tracked, batch.input(), batch.target())
        },
        &flat,
    )?;
    ensure_finite("objective value", &[value])?;
    Ok((tape, def, value))
}
