// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for YOLOv8 detection models

use image::{imageops, DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

/// Square input size expected by YOLOv8 exports
pub const YOLO_INPUT_SIZE: u32 = 640;

/// Padding colour used by the ultralytics letterbox
pub const PAD_VALUE: u8 = 114;

/// Geometry of a letterbox transform, needed to map boxes back
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Resize factor applied to the original image
    pub scale: f32,
    /// Horizontal padding (left) in model input pixels
    pub pad_x: f32,
    /// Vertical padding (top) in model input pixels
    pub pad_y: f32,
}

impl Letterbox {
    /// Compute the letterbox geometry for an image of the given size
    pub fn new(orig_w: u32, orig_h: u32, target_size: u32) -> Self {
        if orig_w == 0 || orig_h == 0 {
            return Self {
                scale: 1.0,
                pad_x: 0.0,
                pad_y: 0.0,
            };
        }

        let scale = (target_size as f32 / orig_w as f32).min(target_size as f32 / orig_h as f32);
        let (new_w, new_h) = scaled_dims(orig_w, orig_h, scale);

        Self {
            scale,
            pad_x: ((target_size - new_w) / 2) as f32,
            pad_y: ((target_size - new_h) / 2) as f32,
        }
    }

    /// Map a point from model input space back to original image space
    pub fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

fn scaled_dims(orig_w: u32, orig_h: u32, scale: f32) -> (u32, u32) {
    let new_w = ((orig_w as f32 * scale).round() as u32).max(1);
    let new_h = ((orig_h as f32 * scale).round() as u32).max(1);
    (new_w, new_h)
}

/// Resize with aspect ratio preservation and centre the result on a grey canvas
pub fn letterbox(image: &DynamicImage, target_size: u32) -> (RgbImage, Letterbox) {
    let (orig_w, orig_h) = image.dimensions();
    let mut canvas = RgbImage::from_pixel(
        target_size,
        target_size,
        Rgb([PAD_VALUE, PAD_VALUE, PAD_VALUE]),
    );

    let geometry = Letterbox::new(orig_w, orig_h, target_size);
    if orig_w == 0 || orig_h == 0 {
        return (canvas, geometry);
    }

    let (new_w, new_h) = scaled_dims(orig_w, orig_h, geometry.scale);
    let resized = image
        .resize_exact(new_w, new_h, imageops::FilterType::Triangle)
        .to_rgb8();

    imageops::replace(
        &mut canvas,
        &resized,
        geometry.pad_x as i64,
        geometry.pad_y as i64,
    );

    (canvas, geometry)
}

/// Preprocess an image for YOLOv8 detection
///
/// Steps:
/// 1. Letterbox to `target_size` x `target_size`
/// 2. Scale pixel values to `[0, 1]`
/// 3. Convert to NCHW tensor format `[1, 3, H, W]`
pub fn preprocess_for_detection(
    image: &DynamicImage,
    target_size: u32,
) -> (Array4<f32>, Letterbox) {
    let (canvas, geometry) = letterbox(image, target_size);
    let size = target_size as usize;

    let mut tensor = Array4::zeros((1, 3, size, size));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    (tensor, geometry)
}
