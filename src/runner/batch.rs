//! Batch execution over a set of image files.
//!
//! The pipeline runs on a worker thread and reports back over a bounded
//! channel, so a caller can poll progress from its own loop without
//! blocking. One bad image never aborts the batch: it is reported and its
//! output slot stays empty.

use crate::ops::OperatorRegistry;
use crate::pipeline::{Executor, PipelineArena};
use crate::types::Frame;
use crossbeam_channel::{bounded, Receiver, Sender};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const CHANNEL_CAPACITY: usize = 256;

/// A secondary data output captured for one image of the batch.
#[derive(Debug, Clone)]
pub struct BatchDataRecord {
    pub image_name: String,
    pub image_index: usize,
    pub data: Value,
}

#[derive(Debug)]
pub enum BatchMessage {
    Progress {
        current: usize,
        total: usize,
    },
    /// One image failed to load or run. The batch continues.
    ImageError {
        path: PathBuf,
        error: String,
    },
    /// Terminal message. `outputs` holds one slot per input image, `None`
    /// where that image failed or the pipeline produced no output.
    Complete {
        outputs: Vec<Option<Frame>>,
        data_outputs: Vec<BatchDataRecord>,
    },
}

/// Caller-side handle to a running batch.
pub struct BatchHandle {
    receiver: Receiver<BatchMessage>,
    worker: Option<JoinHandle<()>>,
}

impl BatchHandle {
    /// Non-blocking poll for the next message.
    pub fn try_recv(&self) -> Option<BatchMessage> {
        self.receiver.try_recv().ok()
    }

    /// Every message currently queued.
    pub fn drain(&self) -> Vec<BatchMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.receiver.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Blocking wait for the next message. `None` once the worker is gone
    /// and the channel is empty.
    pub fn recv(&self) -> Option<BatchMessage> {
        self.receiver.recv().ok()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map(|w| w.is_finished()).unwrap_or(true)
    }

    /// Wait up to `timeout` for the worker to finish, then join it.
    /// Returns false if it was still running when the deadline passed.
    pub fn join_timeout(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        true
    }
}

/// Start a batch run of the arena over the given image files.
pub fn spawn_batch(
    arena: PipelineArena,
    registry: Arc<OperatorRegistry>,
    paths: Vec<PathBuf>,
) -> BatchHandle {
    let (tx, rx) = bounded(CHANNEL_CAPACITY);
    let worker = thread::spawn(move || run_batch(arena, registry, paths, tx));
    BatchHandle {
        receiver: rx,
        worker: Some(worker),
    }
}

fn run_batch(
    arena: PipelineArena,
    registry: Arc<OperatorRegistry>,
    paths: Vec<PathBuf>,
    tx: Sender<BatchMessage>,
) {
    let executor = Executor::new(&registry);
    let total = paths.len();
    let mut outputs: Vec<Option<Frame>> = Vec::with_capacity(total);
    let mut data_outputs = Vec::new();

    for (index, path) in paths.iter().enumerate() {
        match process_one(&executor, &arena, path) {
            Ok((image, data)) => {
                if let Some(data) = data {
                    data_outputs.push(BatchDataRecord {
                        image_name: path
                            .file_stem()
                            .map(|s| s.to_string_lossy().into_owned())
                            .unwrap_or_else(|| format!("image_{index}")),
                        image_index: index,
                        data,
                    });
                }
                outputs.push(image);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "image failed, continuing batch");
                outputs.push(None);
                let report = BatchMessage::ImageError {
                    path: path.clone(),
                    error: err.to_string(),
                };
                if tx.send(report).is_err() {
                    return;
                }
            }
        }
        let progress = BatchMessage::Progress {
            current: index + 1,
            total,
        };
        if tx.send(progress).is_err() {
            return;
        }
    }

    info!(total, "batch complete");
    let _ = tx.send(BatchMessage::Complete {
        outputs,
        data_outputs,
    });
}

fn process_one(
    executor: &Executor<'_>,
    arena: &PipelineArena,
    path: &PathBuf,
) -> anyhow::Result<(Option<Frame>, Option<Value>)> {
    let frame = image::open(path)?.to_rgb8();
    let out = executor.execute(arena, &frame)?;
    Ok((out.image, out.data))
}
