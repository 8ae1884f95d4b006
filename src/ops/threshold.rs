//! Grayscale conversion and thresholding.

use super::{OpOutput, OperatorRegistry, OperatorSpec};
use crate::pipeline::param::{OpParams, ParamDef};
use crate::types::{gray_to_frame, to_gray, Frame};
use image::Luma;
use imageproc::contrast;

pub(super) fn register(registry: &mut OperatorRegistry) {
    registry.register(OperatorSpec {
        name: "Grayscale",
        category: "Filter",
        emits_data: false,
        params: Vec::new,
        apply: grayscale,
    });
    registry.register(OperatorSpec {
        name: "Binary",
        category: "Threshold",
        emits_data: false,
        params: || {
            vec![
                ParamDef::int("Threshold", 127, 0, 255),
                ParamDef::int("Max Value", 255, 0, 255),
            ]
        },
        apply: binary,
    });
    registry.register(OperatorSpec {
        name: "Otsu Threshold",
        category: "Threshold",
        emits_data: false,
        params: || vec![ParamDef::int("Max Value", 255, 0, 255)],
        apply: otsu,
    });
}

fn grayscale(_params: &OpParams, frame: &Frame) -> anyhow::Result<OpOutput> {
    Ok(OpOutput::Image(gray_to_frame(&to_gray(frame))))
}

fn apply_threshold(frame: &Frame, thresh: i64, max_value: u8) -> Frame {
    let mut gray = to_gray(frame);
    for px in gray.pixels_mut() {
        let v = if i64::from(px.0[0]) > thresh { max_value } else { 0 };
        *px = Luma([v]);
    }
    gray_to_frame(&gray)
}

/// Pixels strictly above the threshold become the max value, the rest
/// become zero. A pixel exactly at the threshold maps to zero.
fn binary(params: &OpParams, frame: &Frame) -> anyhow::Result<OpOutput> {
    let thresh = params.get_i64("Threshold", 127).clamp(0, 255);
    let max_value = params.get_i64("Max Value", 255).clamp(0, 255) as u8;
    Ok(OpOutput::Image(apply_threshold(frame, thresh, max_value)))
}

fn otsu(params: &OpParams, frame: &Frame) -> anyhow::Result<OpOutput> {
    let max_value = params.get_i64("Max Value", 255).clamp(0, 255) as u8;
    let gray = to_gray(frame);
    let level = contrast::otsu_level(&gray);
    Ok(OpOutput::Image(apply_threshold(
        frame,
        i64::from(level),
        max_value,
    )))
}
