//! Geometric operators.

use super::{OpOutput, OperatorRegistry, OperatorSpec};
use crate::pipeline::param::{OpParams, ParamDef};
use crate::types::Frame;
use image::imageops;

pub(super) fn register(registry: &mut OperatorRegistry) {
    registry.register(OperatorSpec {
        name: "Flip",
        category: "Transform",
        emits_data: false,
        params: || {
            vec![ParamDef::choice(
                "Direction",
                "Horizontal",
                &["Horizontal", "Vertical", "Both"],
            )]
        },
        apply: flip,
    });
    registry.register(OperatorSpec {
        name: "ROI",
        category: "Transform",
        emits_data: false,
        params: || {
            vec![
                ParamDef::int("X", 0, 0, 10_000),
                ParamDef::int("Y", 0, 0, 10_000),
                ParamDef::int("Width", 100, 1, 10_000),
                ParamDef::int("Height", 100, 1, 10_000),
            ]
        },
        apply: roi,
    });
}

fn flip(params: &OpParams, frame: &Frame) -> anyhow::Result<OpOutput> {
    let out = match params.get_str("Direction", "Horizontal") {
        "Vertical" => imageops::flip_vertical(frame),
        "Both" => imageops::flip_vertical(&imageops::flip_horizontal(frame)),
        _ => imageops::flip_horizontal(frame),
    };
    Ok(OpOutput::Image(out))
}

/// Crop to the requested rectangle, clamped to the image bounds. A
/// rectangle entirely outside the image degenerates to a 1x1 crop at the
/// nearest corner.
fn roi(params: &OpParams, frame: &Frame) -> anyhow::Result<OpOutput> {
    let (w, h) = frame.dimensions();
    let x = (params.get_i64("X", 0).max(0) as u32).min(w.saturating_sub(1));
    let y = (params.get_i64("Y", 0).max(0) as u32).min(h.saturating_sub(1));
    let rw = (params.get_i64("Width", 100).max(1) as u32).min(w - x);
    let rh = (params.get_i64("Height", 100).max(1) as u32).min(h - y);
    Ok(OpOutput::Image(
        imageops::crop_imm(frame, x, y, rw, rh).to_image(),
    ))
}
