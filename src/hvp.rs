//! Matrix-free Hessian-vector products of a composed objective.
//!
//! The objective is recorded on a bytecode tape with respect to every
//! parameter. A product `H·v` is one forward tangent sweep with
//! `Dual(params, v)` followed by one reverse sweep over dual adjoints: the
//! tangent part of the input adjoints is `H·v`. The Hessian is never formed.

use log::debug;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::bytecode_tape::{ensure_finite, BtapeThreadLocal, BytecodeTape};
use crate::data::DataBatch;
use crate::error::{Error, Result};
use crate::float::Float;
use crate::loss::LossSpec;
use crate::objective::{record_objective, Model, Objective, ObjectiveFn};
use crate::tree::{ParamTree, TreeDef};

/// `(direction, batch) -> H·direction` at a fixed parameter point.
///
/// Every call records the objective on the given batch. When the batch is
/// fixed, [`with_data`](Self::with_data) records once and replays the tape.
#[derive(Debug, Clone)]
pub struct HessianVectorProduct<F: Float, O> {
    objective: O,
    params: ParamTree<F>,
}

impl<F: BtapeThreadLocal, O: ObjectiveFn<F>> HessianVectorProduct<F, O> {
    pub fn new(objective: O, params: ParamTree<F>) -> Self {
        HessianVectorProduct { objective, params }
    }

    pub fn objective(&self) -> &O {
        &self.objective
    }

    /// The parameter point the curvature is taken at.
    pub fn params(&self) -> &ParamTree<F> {
        &self.params
    }

    /// Number of scalar parameters.
    pub fn dim(&self) -> usize {
        self.params.num_params()
    }

    /// `H·direction` on `batch`, with the structure of the parameters.
    ///
    /// # Errors
    ///
    /// - [`Error::StructureMismatch`] if `direction` is shaped differently
    ///   from the parameters.
    /// - [`Error::NonDifferentiableObjective`] if the objective has no finite
    ///   curvature at the parameter point.
    pub fn apply(&self, direction: &ParamTree<F>, batch: &DataBatch<F>) -> Result<ParamTree<F>> {
        check_direction(&self.params, direction)?;
        let (tape, def, _) = record_objective(&self.objective, &self.params, batch)?;
        let (_, hv) = tape.hvp(&direction.flatten())?;
        def.unflatten(&hv)
    }

    /// Bind `batch`, recording the objective once.
    pub fn with_data(&self, batch: &DataBatch<F>) -> Result<BoundHessianVectorProduct<F>> {
        BoundHessianVectorProduct::record(&self.objective, self.params.clone(), batch)
    }
}

/// `direction -> H·direction` for one fixed data batch.
///
/// Holds the recorded tape, which is never mutated, so products are
/// deterministic and may be taken from several threads at once.
#[derive(Debug, Clone)]
pub struct BoundHessianVectorProduct<F: Float> {
    tape: BytecodeTape<F>,
    def: TreeDef,
    params: ParamTree<F>,
    value: F,
    gradient: Vec<F>,
}

impl<F: BtapeThreadLocal> BoundHessianVectorProduct<F> {
    fn record<O>(objective: &O, params: ParamTree<F>, batch: &DataBatch<F>) -> Result<Self>
    where
        O: ObjectiveFn<F> + ?Sized,
    {
        let (tape, def, value) = record_objective(objective, &params, batch)?;
        let gradient = tape.gradient();
        ensure_finite("gradient", &gradient)?;
        debug!(
            "bound Hessian-vector product: {} parameters, {} samples, {} tape entries",
            tape.num_inputs(),
            batch.len(),
            tape.num_ops()
        );
        Ok(BoundHessianVectorProduct {
            tape,
            def,
            params,
            value,
            gradient,
        })
    }

    /// `H·direction`, with the structure of the parameters.
    pub fn apply(&self, direction: &ParamTree<F>) -> Result<ParamTree<F>> {
        check_direction(&self.params, direction)?;
        let hv = self.apply_flat(&direction.flatten())?;
        self.def.unflatten(&hv)
    }

    /// `H·v` on flat vectors in parameter flatten order.
    ///
    /// This is the form iterative solvers such as conjugate gradients or
    /// Lanczos consume.
    pub fn apply_flat(&self, v: &[F]) -> Result<Vec<F>> {
        self.tape.hvp(v).map(|(_, hv)| hv)
    }

    /// `H·d` for each of `directions`, in order.
    pub fn apply_many(&self, directions: &[ParamTree<F>]) -> Result<Vec<ParamTree<F>>> {
        #[cfg(feature = "parallel")]
        let iter = directions.par_iter();
        #[cfg(not(feature = "parallel"))]
        let iter = directions.iter();
        iter.map(|d| self.apply(d)).collect()
    }

    /// Gradient at the bound point, with the structure of the parameters.
    pub fn gradient(&self) -> Result<ParamTree<F>> {
        self.def.unflatten(&self.gradient)
    }

    /// Objective value at the bound point.
    pub fn value(&self) -> F {
        self.value
    }

    /// Number of scalar parameters.
    pub fn dim(&self) -> usize {
        self.tape.num_inputs()
    }

    pub fn params(&self) -> &ParamTree<F> {
        &self.params
    }
}

fn check_direction<F: Float>(params: &ParamTree<F>, direction: &ParamTree<F>) -> Result<()> {
    params
        .zip_with(direction, |_, _| ())
        .map(|_| ())
        .map_err(|e| match e {
            Error::StructureMismatch {
                context,
                expected,
                found,
            } => Error::StructureMismatch {
                context: format!("direction at {context}"),
                expected,
                found,
            },
            other => other,
        })
}

/// Compose `model` with `loss` and return the product operator at `params`.
///
/// `loss == None` uses the model output itself as the objective.
pub fn build_hvp<F, M>(
    model: M,
    params: ParamTree<F>,
    loss: Option<LossSpec<F>>,
    has_batch: bool,
) -> Result<HessianVectorProduct<F, Objective<F, M>>>
where
    F: BtapeThreadLocal,
    M: Model<F>,
{
    let objective = Objective::compose(model, loss, has_batch)?;
    Ok(HessianVectorProduct::new(objective, params))
}

/// Like [`build_hvp`], with `data` bound up front.
pub fn build_hvp_with_data<F, M>(
    model: M,
    params: ParamTree<F>,
    data: &DataBatch<F>,
    loss: Option<LossSpec<F>>,
    has_batch: bool,
) -> Result<BoundHessianVectorProduct<F>>
where
    F: BtapeThreadLocal,
    M: Model<F>,
{
    let objective = Objective::compose(model, loss, has_batch)?;
    BoundHessianVectorProduct::record(&objective, params, data)
}
