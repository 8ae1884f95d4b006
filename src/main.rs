//! pixelflow - Command-Line Batch Runner
//!
//! Loads a pipeline document and runs it over a set of images, writing
//! the processed frames and any measurement data to an output directory.

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use pixelflow::config::{OutputMode, Settings};
use pixelflow::ops::OperatorRegistry;
use pixelflow::pipeline::codec;
use pixelflow::runner::{spawn_batch, BatchMessage};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "pixelflow", about = "Run an image pipeline over a batch of images")]
struct Args {
    /// Pipeline document to run.
    #[arg(short, long)]
    pipeline: PathBuf,

    /// Directory to write results into. Defaults to the configured
    /// output directory.
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// What to write: images, data, or both.
    #[arg(long)]
    output_mode: Option<String>,

    /// Images to process.
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pixelflow=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = Settings::load_or_default();

    let output_mode = match args.output_mode.as_deref() {
        Some("images") => OutputMode::Images,
        Some("data") => OutputMode::Data,
        Some("both") => OutputMode::Both,
        Some(other) => anyhow::bail!("unknown output mode: {other}"),
        None => settings.output_mode,
    };

    let registry = Arc::new(OperatorRegistry::with_builtins());
    let arena = codec::load_file(&args.pipeline, &registry)
        .with_context(|| format!("loading pipeline {}", args.pipeline.display()))?;

    let run_dir = args
        .out_dir
        .unwrap_or_else(|| settings.output_dir.clone())
        .join(Local::now().format("run_%Y%m%d_%H%M%S").to_string());
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("creating {}", run_dir.display()))?;

    tracing::info!(
        pipeline = %args.pipeline.display(),
        images = args.images.len(),
        out = %run_dir.display(),
        "starting batch"
    );

    let handle = spawn_batch(arena, registry, args.images.clone());
    loop {
        match handle.recv() {
            Some(BatchMessage::Progress { current, total }) => {
                tracing::info!("processed {current}/{total}");
            }
            Some(BatchMessage::ImageError { path, error }) => {
                tracing::warn!(path = %path.display(), error = %error, "image failed");
            }
            Some(BatchMessage::Complete {
                outputs,
                data_outputs,
            }) => {
                if output_mode != OutputMode::Data {
                    for (index, frame) in outputs.iter().enumerate() {
                        let Some(frame) = frame else { continue };
                        let path = run_dir.join(format!("output_{index:04}.png"));
                        frame
                            .save(&path)
                            .with_context(|| format!("writing {}", path.display()))?;
                    }
                }
                if output_mode != OutputMode::Images && !data_outputs.is_empty() {
                    let records: Vec<_> = data_outputs
                        .iter()
                        .map(|r| {
                            json!({
                                "image_name": r.image_name,
                                "image_index": r.image_index,
                                "data": r.data,
                            })
                        })
                        .collect();
                    let path = run_dir.join("data.json");
                    fs::write(&path, serde_json::to_string_pretty(&records)?)
                        .with_context(|| format!("writing {}", path.display()))?;
                }
                let produced = outputs.iter().filter(|o| o.is_some()).count();
                tracing::info!(
                    produced,
                    total = outputs.len(),
                    out = %run_dir.display(),
                    "batch finished"
                );
                break;
            }
            None => anyhow::bail!("batch worker exited unexpectedly"),
        }
    }

    Ok(())
}
