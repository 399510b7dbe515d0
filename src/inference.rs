//! External predictor contracts
//!
//! The three neural collaborators (garment-agnostic mask predictor, dense
//! surface predictor, generation backend) are consumed, never implemented,
//! by the orchestration core. Each is loaded once at construction and is
//! stateless across requests, so every method takes `&self`. Failures
//! propagate unchanged to the caller; the core performs no retries and no
//! local recovery.

use crate::error::Result;
use crate::types::{BodyRegion, InferenceRequest};
use image::{DynamicImage, GrayImage, RgbImage};

/// Garment-agnostic mask predictor
///
/// Given a person photo and a body-region hint, returns a binary mask
/// identifying the editable region.
pub trait MaskPredictor: Send + Sync {
    /// Predict the editable-region mask for the given body region
    ///
    /// # Errors
    /// - Model inference failures, surfaced unchanged
    fn predict_mask(&self, image: &DynamicImage, region: BodyRegion) -> Result<GrayImage>;
}

/// Dense human-surface predictor
///
/// Produces two auxiliary conditioning maps from a person photo: a UV-style
/// per-pixel body-surface coordinate map (IUV) and a body-part segmentation
/// map.
pub trait DenseSurfacePredictor: Send + Sync {
    /// Predict the per-pixel surface-coordinate (IUV) map
    ///
    /// # Errors
    /// - Model inference failures, surfaced unchanged
    fn predict_iuv(&self, image: &DynamicImage) -> Result<RgbImage>;

    /// Predict the body-part segmentation map
    ///
    /// # Errors
    /// - Model inference failures, surfaced unchanged
    fn predict_seg(&self, image: &DynamicImage) -> Result<RgbImage>;
}

/// Pretrained generative inpainting backend
///
/// Consumes a fully assembled inference request and produces exactly one
/// output image. The two task types use two independently loaded instances;
/// routing to the correct instance is the processor's responsibility.
pub trait GenerationBackend: Send + Sync {
    /// Run generation on an assembled request
    ///
    /// # Errors
    /// - Model inference failures, surfaced unchanged
    fn generate(&self, request: &InferenceRequest) -> Result<DynamicImage>;

    /// Human-readable backend identifier for logging
    fn name(&self) -> &str;
}
