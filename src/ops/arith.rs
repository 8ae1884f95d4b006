//! Pixel arithmetic operators.

use super::{OpOutput, OperatorRegistry, OperatorSpec};
use crate::pipeline::param::{OpParams, ParamDef};
use crate::types::Frame;
use image::Rgb;

pub(super) fn register(registry: &mut OperatorRegistry) {
    registry.register(OperatorSpec {
        name: "Add",
        category: "Arithmetic",
        emits_data: false,
        params: || vec![ParamDef::int("Value", 0, -255, 255)],
        apply: add,
    });
    registry.register(OperatorSpec {
        name: "Multiply",
        category: "Arithmetic",
        emits_data: false,
        params: || vec![ParamDef::float("Factor", 1.0, 0.0, 10.0)],
        apply: multiply,
    });
    registry.register(OperatorSpec {
        name: "Add Images",
        category: "Arithmetic",
        emits_data: false,
        params: || vec![ParamDef::image("Image 2")],
        apply: add_images,
    });
}

fn map_channels(frame: &Frame, f: impl Fn(u8) -> u8) -> Frame {
    let mut out = frame.clone();
    for px in out.pixels_mut() {
        let Rgb([r, g, b]) = *px;
        *px = Rgb([f(r), f(g), f(b)]);
    }
    out
}

fn add(params: &OpParams, frame: &Frame) -> anyhow::Result<OpOutput> {
    let value = params.get_i64("Value", 0);
    Ok(OpOutput::Image(map_channels(frame, |c| {
        (i64::from(c) + value).clamp(0, 255) as u8
    })))
}

fn multiply(params: &OpParams, frame: &Frame) -> anyhow::Result<OpOutput> {
    let factor = params.get_f64("Factor", 1.0);
    Ok(OpOutput::Image(map_channels(frame, |c| {
        (f64::from(c) * factor).round().clamp(0.0, 255.0) as u8
    })))
}

/// Saturating per-pixel sum of the main image and the connected "Image 2".
/// Without a connected second image the input passes through unchanged.
fn add_images(params: &OpParams, frame: &Frame) -> anyhow::Result<OpOutput> {
    let Some(other) = params.image("Image 2") else {
        return Ok(OpOutput::Image(frame.clone()));
    };
    let mut out = frame.clone();
    for (x, y, px) in out.enumerate_pixels_mut() {
        if x < other.width() && y < other.height() {
            let o = other.get_pixel(x, y);
            let Rgb([r, g, b]) = *px;
            *px = Rgb([
                r.saturating_add(o.0[0]),
                g.saturating_add(o.0[1]),
                b.saturating_add(o.0[2]),
            ]);
        }
    }
    Ok(OpOutput::Image(out))
}
