//! Execution hosts: batch runs over image files and live per-frame runs.

pub mod batch;
pub mod live;

pub use batch::{spawn_batch, BatchDataRecord, BatchHandle, BatchMessage};
pub use live::{FrameSource, LiveRunner};
