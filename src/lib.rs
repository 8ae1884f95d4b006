//! pixelflow: a dataflow engine for image processing pipelines.
//!
//! Pipelines are directed acyclic graphs of operator nodes between a
//! single Input and a single Output. The crate covers the graph model,
//! topological scheduling, execution (including nested algorithm
//! pipelines), a JSON document format, and batch/live execution hosts.

pub mod config;
pub mod error;
pub mod ops;
pub mod pipeline;
pub mod runner;
pub mod types;

pub use error::{AppError, Result};
pub use ops::{OpOutput, OperatorRegistry, OperatorSpec};
pub use pipeline::{
    Connection, Executor, Node, NodeKind, Pipeline, PipelineArena, PipelineError,
    PipelineOutput, PipelineResult,
};
pub use runner::{spawn_batch, BatchHandle, BatchMessage, LiveRunner};
pub use types::Frame;
