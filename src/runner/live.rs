//! Live, per-frame execution.
//!
//! A [`LiveRunner`] pulls frames from a source, runs the pipeline on each,
//! and keeps only the latest result. Polling is latest-wins: while an
//! output sits unconsumed the runner stops pulling, so a slow consumer
//! sees fresh frames rather than a growing backlog.

use crate::ops::OperatorRegistry;
use crate::pipeline::{PipelineArena, PipelineOutput, PipelineResult};
use crate::pipeline::Executor;
use crate::types::Frame;
use tracing::warn;

/// Anything that can hand the runner its next frame. `None` means no new
/// frame is available right now.
pub trait FrameSource {
    fn get_frame(&mut self) -> Option<Frame>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Option<Frame>,
{
    fn get_frame(&mut self) -> Option<Frame> {
        self()
    }
}

pub struct LiveRunner {
    arena: PipelineArena,
    registry: OperatorRegistry,
    latest: Option<PipelineOutput>,
}

impl LiveRunner {
    pub fn new(arena: PipelineArena, registry: OperatorRegistry) -> PipelineResult<Self> {
        arena.validate(&registry)?;
        Ok(Self {
            arena,
            registry,
            latest: None,
        })
    }

    /// Swap in a new pipeline between frames. An invalid replacement is
    /// rejected and the current pipeline keeps running.
    pub fn set_arena(&mut self, arena: PipelineArena) -> PipelineResult<()> {
        arena.validate(&self.registry)?;
        self.arena = arena;
        Ok(())
    }

    pub fn arena(&self) -> &PipelineArena {
        &self.arena
    }

    /// Pull and process the next frame, if the previous output has been
    /// consumed and the source has one. Returns whether a new output is
    /// now pending.
    pub fn poll(&mut self, source: &mut dyn FrameSource) -> bool {
        if self.latest.is_some() {
            return true;
        }
        let Some(frame) = source.get_frame() else {
            return false;
        };
        match Executor::new(&self.registry).execute(&self.arena, &frame) {
            Ok(output) => {
                self.latest = Some(output);
                true
            }
            Err(err) => {
                warn!(error = %err, "live frame failed, dropping");
                false
            }
        }
    }

    /// Take the pending output, freeing the runner to process the next
    /// frame.
    pub fn take_output(&mut self) -> Option<PipelineOutput> {
        self.latest.take()
    }
}
