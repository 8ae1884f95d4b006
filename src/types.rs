//! Shared image types and conversions.

use image::{GrayImage, Luma, Rgb, RgbImage};

/// The image type flowing along pipeline edges.
pub type Frame = RgbImage;

/// Convert a frame to 8-bit grayscale using the Rec. 601 luma weights.
pub fn to_gray(frame: &Frame) -> GrayImage {
    let mut out = GrayImage::new(frame.width(), frame.height());
    for (x, y, px) in frame.enumerate_pixels() {
        let Rgb([r, g, b]) = *px;
        let luma =
            0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        out.put_pixel(x, y, Luma([luma.round().clamp(0.0, 255.0) as u8]));
    }
    out
}

/// Stack a grayscale image back into three identical channels.
pub fn gray_to_frame(gray: &GrayImage) -> Frame {
    let mut out = Frame::new(gray.width(), gray.height());
    for (x, y, px) in gray.enumerate_pixels() {
        let v = px.0[0];
        out.put_pixel(x, y, Rgb([v, v, v]));
    }
    out
}

/// Split a frame into its three channel planes.
pub fn split_channels(frame: &Frame) -> [GrayImage; 3] {
    let (w, h) = frame.dimensions();
    let mut planes = [
        GrayImage::new(w, h),
        GrayImage::new(w, h),
        GrayImage::new(w, h),
    ];
    for (x, y, px) in frame.enumerate_pixels() {
        for c in 0..3 {
            planes[c].put_pixel(x, y, Luma([px.0[c]]));
        }
    }
    planes
}

/// Recombine three channel planes into a frame. Planes must share
/// dimensions.
pub fn merge_channels(planes: &[GrayImage; 3]) -> Frame {
    let (w, h) = planes[0].dimensions();
    let mut out = Frame::new(w, h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        *px = Rgb([
            planes[0].get_pixel(x, y).0[0],
            planes[1].get_pixel(x, y).0[0],
            planes[2].get_pixel(x, y).0[0],
        ]);
    }
    out
}
