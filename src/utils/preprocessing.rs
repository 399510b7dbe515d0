//! Image normalization and tensor conversion utilities
//!
//! All downstream predictors receive uniform-resolution inputs: the
//! normalizer rescales an arbitrary photo to fit the target canvas while
//! preserving aspect ratio, and pastes it centered on a neutral-fill
//! background. Tensor helpers convert between images and the NCHW layout the
//! ONNX backends consume.

use crate::error::{PersonGenError, Result};
use image::{DynamicImage, GrayImage, Rgba, RgbaImage, RgbImage};
use ndarray::Array4;

/// Configuration for normalization behavior
#[derive(Debug, Clone)]
pub struct NormalizerOptions {
    /// Fill color for aspect ratio preservation (RGB)
    pub padding_color: [u8; 3],
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            padding_color: [255, 255, 255], // Neutral white fill
        }
    }
}

/// Shared image normalization utilities
pub struct ImageNormalizer;

impl ImageNormalizer {
    /// Rescale and center an image onto a fixed-size canvas
    ///
    /// Computes the scale factor that fits the image inside the target box
    /// without exceeding either dimension, resizes with that scale, and
    /// pastes the result centered onto a neutral-fill canvas of exactly
    /// `target_width` x `target_height`. The alpha channel of the input is
    /// carried through; callers that need plain color convert explicitly.
    ///
    /// # Errors
    /// - `InvalidConfig` if either target dimension is zero
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn resize_and_center(
        image: &DynamicImage,
        target_width: u32,
        target_height: u32,
        options: &NormalizerOptions,
    ) -> Result<DynamicImage> {
        if target_width == 0 || target_height == 0 {
            return Err(PersonGenError::invalid_config(format!(
                "Normalizer target dimensions must be positive, got {}x{}",
                target_width, target_height
            )));
        }

        let rgba_image = image.to_rgba8();
        let (orig_width, orig_height) = rgba_image.dimensions();

        // Aspect-preserving fit inside the target box
        let scale = (target_width as f32 / orig_width as f32)
            .min(target_height as f32 / orig_height as f32);

        let new_width = ((orig_width as f32 * scale).round() as u32).max(1);
        let new_height = ((orig_height as f32 * scale).round() as u32).max(1);

        let resized = image::imageops::resize(
            &rgba_image,
            new_width,
            new_height,
            image::imageops::FilterType::Triangle,
        );

        // Neutral-fill canvas of exactly the target size
        let padding = options.padding_color;
        let mut canvas = RgbaImage::from_pixel(
            target_width,
            target_height,
            Rgba([padding[0], padding[1], padding[2], 255]),
        );

        let offset_x = target_width.saturating_sub(new_width) / 2;
        let offset_y = target_height.saturating_sub(new_height) / 2;

        for (x, y, pixel) in resized.enumerate_pixels() {
            let canvas_x = x + offset_x;
            let canvas_y = y + offset_y;
            if canvas_x < target_width && canvas_y < target_height {
                canvas.put_pixel(canvas_x, canvas_y, *pixel);
            }
        }

        Ok(DynamicImage::ImageRgba8(canvas))
    }

    /// Synthesize a full-canvas all-white mask (unrestricted edit area)
    #[must_use]
    pub fn full_white_mask(width: u32, height: u32) -> GrayImage {
        GrayImage::from_pixel(width, height, image::Luma([255]))
    }

    /// Convert an RGB image to a normalized NCHW tensor
    ///
    /// Pixels are scaled to 0-1 and normalized per channel with the given
    /// mean and standard deviation.
    #[must_use]
    pub fn rgb_to_tensor(image: &RgbImage, mean: [f32; 3], std: [f32; 3]) -> Array4<f32> {
        let (width, height) = image.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        #[allow(clippy::indexing_slicing)]
        // Tensor dimensions pre-allocated to match image size
        for (x, y, pixel) in image.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (f32::from(pixel[c]) / 255.0 - mean[c]) / std[c];
            }
        }

        tensor
    }

    /// Convert a grayscale mask to a single-channel NCHW tensor in 0-1
    #[must_use]
    pub fn mask_to_tensor(mask: &GrayImage) -> Array4<f32> {
        let (width, height) = mask.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 1, height as usize, width as usize));

        #[allow(clippy::indexing_slicing)]
        for (x, y, pixel) in mask.enumerate_pixels() {
            tensor[[0, 0, y as usize, x as usize]] = f32::from(pixel[0]) / 255.0;
        }

        tensor
    }

    /// Convert the first batch element of an NCHW tensor in 0-1 to an RGB image
    ///
    /// # Errors
    /// - `Processing` if the tensor does not have exactly three channels
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn tensor_to_rgb(tensor: &Array4<f32>) -> Result<RgbImage> {
        let shape = tensor.shape();
        let (channels, height, width) = (shape[1], shape[2], shape[3]);
        if channels != 3 {
            return Err(PersonGenError::processing(format!(
                "Expected 3-channel tensor for image conversion, got {} channels",
                channels
            )));
        }

        #[allow(clippy::indexing_slicing)]
        let image = RgbImage::from_fn(width as u32, height as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            image::Rgb([
                (tensor[[0, 0, y, x]].clamp(0.0, 1.0) * 255.0).round() as u8,
                (tensor[[0, 1, y, x]].clamp(0.0, 1.0) * 255.0).round() as u8,
                (tensor[[0, 2, y, x]].clamp(0.0, 1.0) * 255.0).round() as u8,
            ])
        });

        Ok(image)
    }
}
