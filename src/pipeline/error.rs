//! Error types for building, loading, and running pipelines.

use super::id::NodeId;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The pipeline graph contains a directed cycle and cannot be scheduled.
    #[error("pipeline contains a cycle")]
    CycleDetected,

    /// The arena's nesting graph is cyclic (a pipeline embeds itself,
    /// directly or transitively).
    #[error("nested pipelines form a cycle")]
    NestingCycle,

    /// A required singleton node is absent.
    #[error("pipeline is missing its {0} node")]
    MissingSingleton(&'static str),

    /// An attempt was made to add a second Input or Output node.
    #[error("pipeline already has an {0} node")]
    DuplicateSingleton(&'static str),

    /// A connection could not be created or resolved.
    #[error("invalid connection: {0}")]
    InvalidConnection(String),

    /// A node id was referenced that does not exist in the pipeline.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// A pipeline index was referenced that does not exist in the arena.
    #[error("unknown pipeline index")]
    UnknownPipeline,

    /// A pipeline document was structurally invalid.
    #[error("invalid pipeline document: {0}")]
    Document(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
