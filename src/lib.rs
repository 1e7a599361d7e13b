pub mod api;
pub mod batch;
pub mod breverse;
pub mod bytecode_tape;
pub mod config;
pub mod data;
pub mod dual;
pub mod error;
pub mod eval;
pub mod float;
pub mod hvp;
pub mod loss;
pub mod metrics;
pub mod objective;
pub mod opcode;
pub mod scalar;
pub mod tree;
mod traits;

pub use api::{grad, hvp, jvp, record, try_record};
pub use breverse::BReverse;
pub use bytecode_tape::BytecodeTape;
pub use config::{BatchConfig, EvalStage, DEFAULT_BATCH_SIZE};
pub use data::{DataBatch, DataPoint, Dataset};
pub use dual::Dual;
pub use error::{Error, Result};
pub use eval::{
    evaluate_metrics_on_dataset, evaluate_metrics_on_dataset_with, evaluate_on_dataset, keyed_step,
    named_result_writer, run_named_steps, run_ordered_steps, Fields, MetricFn, Record,
    ResultsTable,
};
pub use float::Float;
pub use hvp::{build_hvp, build_hvp_with_data, BoundHessianVectorProduct, HessianVectorProduct};
pub use loss::{LossKind, LossSpec};
pub use objective::{Model, Objective, ObjectiveFn};
pub use scalar::Scalar;
pub use tree::{ParamTree, TreeDef};

/// Type alias for forward-mode dual numbers over `f64`.
pub type Dual64 = Dual<f64>;
/// Type alias for forward-mode dual numbers over `f32`.
pub type Dual32 = Dual<f32>;
/// Type alias for bytecode-tape reverse-mode variables over `f64`.
pub type BReverse64 = BReverse<f64>;
/// Type alias for bytecode-tape reverse-mode variables over `f32`.
pub type BReverse32 = BReverse<f32>;
