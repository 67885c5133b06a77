//! Mask rasterization
//!
//! Builds a single-channel mask with the dimensions of a source image. Pixels
//! inside the given rectangles are white (selected), everything else black.

use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat, Luma};
use std::io::Cursor;

use crate::error::{AppError, Result};

/// Value of a selected mask pixel
pub const SELECTED: u8 = 255;

/// Value of an unselected mask pixel
pub const UNSELECTED: u8 = 0;

/// Inclusive pixel rectangle, already clamped to a canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl PixelRect {
    /// Normalize raw `[x1, y1, x2, y2, ..]` coordinates against a canvas.
    ///
    /// Returns `None` for entries with fewer than four values, non-finite
    /// values, or rectangles lying entirely outside the canvas. Corners are
    /// swapped when inverted and clamped to the canvas edges.
    pub fn from_coords(coords: &[f64], width: u32, height: u32) -> Option<Self> {
        if coords.len() < 4 || width == 0 || height == 0 {
            return None;
        }
        if coords[..4].iter().any(|c| !c.is_finite()) {
            return None;
        }

        let (x1, x2) = ordered(coords[0].round(), coords[2].round());
        let (y1, y2) = ordered(coords[1].round(), coords[3].round());

        let max_x = f64::from(width - 1);
        let max_y = f64::from(height - 1);
        if x2 < 0.0 || y2 < 0.0 || x1 > max_x || y1 > max_y {
            return None;
        }

        Some(Self {
            x1: x1.max(0.0) as u32,
            y1: y1.max(0.0) as u32,
            x2: x2.min(max_x) as u32,
            y2: y2.min(max_y) as u32,
        })
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Rasterize rectangles onto a black canvas of the given size
pub fn rasterize(width: u32, height: u32, rects: &[Vec<f64>]) -> GrayImage {
    let mut mask = GrayImage::from_pixel(width, height, Luma([UNSELECTED]));

    for coords in rects {
        let Some(rect) = PixelRect::from_coords(coords, width, height) else {
            continue;
        };
        for y in rect.y1..=rect.y2 {
            for x in rect.x1..=rect.x2 {
                mask.put_pixel(x, y, Luma([SELECTED]));
            }
        }
    }

    mask
}

/// Build a PNG mask matching the dimensions of the encoded source image
pub fn create_mask(image_bytes: &[u8], rects: &[Vec<f64>]) -> Result<Vec<u8>> {
    let source = image::load_from_memory(image_bytes)?;
    let (width, height) = source.dimensions();
    let mask = rasterize(width, height, rects);
    encode_png(mask)
}

/// Parse the `mask_data` form field: a JSON array of coordinate arrays
pub fn parse_mask_data(raw: &str) -> Result<Vec<Vec<f64>>> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Validation(format!("mask_data must be a JSON array of [x1, y1, x2, y2] entries: {}", e)))
}

fn encode_png(mask: GrayImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(mask).write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
