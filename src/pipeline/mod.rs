//! Pipeline graph model, scheduling, execution, and persistence.

pub mod codec;
pub mod error;
pub mod executor;
pub mod graph;
pub mod id;
pub mod node;
pub mod param;
pub mod port;
pub mod scheduler;

pub use error::{PipelineError, PipelineResult};
pub use executor::{Executor, PipelineOutput};
pub use graph::{Pipeline, PipelineArena};
pub use id::{ConnectionId, NodeId, PipelineIdx};
pub use node::{Node, NodeKind};
pub use param::{OpParams, ParamDef, ParamKind};
pub use port::{Connection, Port, PortDirection, PORT_DATA, PORT_IMAGE};
