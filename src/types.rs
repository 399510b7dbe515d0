//! Core types for person image generation
//!
//! Task selection, body regions, the immutable inference request handed to
//! the generation backends, and the result envelope returned to callers.

use crate::error::{PersonGenError, Result};
use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// The two generation tasks the pipeline supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    /// Replace the garment in the source photo with the reference garment
    #[serde(rename = "virtual_tryon")]
    VirtualTryOn,
    /// Re-render the reference person in the source photo's pose
    #[serde(rename = "pose_transfer")]
    PoseTransfer,
}

impl TaskType {
    /// Canonical string selector for this task
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VirtualTryOn => "virtual_tryon",
            Self::PoseTransfer => "pose_transfer",
        }
    }

    /// All supported tasks
    #[must_use]
    pub fn all() -> &'static [TaskType] {
        &[Self::VirtualTryOn, Self::PoseTransfer]
    }
}

impl FromStr for TaskType {
    type Err = PersonGenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "virtual_tryon" => Ok(Self::VirtualTryOn),
            "pose_transfer" => Ok(Self::PoseTransfer),
            other => Err(PersonGenError::invalid_task(other)),
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Body region hint for the garment-agnostic mask predictor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyRegion {
    /// Upper-body garments (shirts, jackets)
    Upper,
    /// Lower-body garments (trousers, skirts)
    Lower,
    /// Full-body garments (dresses, overalls)
    Overall,
}

impl Default for BodyRegion {
    fn default() -> Self {
        Self::Upper
    }
}

impl FromStr for BodyRegion {
    type Err = PersonGenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "upper" => Ok(Self::Upper),
            "lower" => Ok(Self::Lower),
            "overall" => Ok(Self::Overall),
            other => Err(PersonGenError::invalid_config(format!(
                "Invalid body region: {other} (expected one of: upper, lower, overall)"
            ))),
        }
    }
}

impl std::fmt::Display for BodyRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upper => write!(f, "upper"),
            Self::Lower => write!(f, "lower"),
            Self::Overall => write!(f, "overall"),
        }
    }
}

/// Immutable, fully assembled input for one generation backend call
///
/// Constructed only through [`InferenceRequest::new`], which enforces that
/// all four components share the same canvas dimensions. Once built, a
/// request is read-only; the backends never mutate it.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    src_image: DynamicImage,
    ref_image: DynamicImage,
    mask: GrayImage,
    densepose: RgbImage,
}

impl InferenceRequest {
    /// Assemble a request, validating that every component has identical
    /// dimensions
    ///
    /// # Errors
    /// - `Processing` if any component disagrees on canvas dimensions
    pub fn new(
        src_image: DynamicImage,
        ref_image: DynamicImage,
        mask: GrayImage,
        densepose: RgbImage,
    ) -> Result<Self> {
        let canvas = (src_image.width(), src_image.height());
        for (name, dims) in [
            ("reference image", (ref_image.width(), ref_image.height())),
            ("mask", mask.dimensions()),
            ("dense map", densepose.dimensions()),
        ] {
            if dims != canvas {
                return Err(PersonGenError::processing(format!(
                    "Inference request {} is {}x{}, expected {}x{}",
                    name, dims.0, dims.1, canvas.0, canvas.1
                )));
            }
        }

        Ok(Self {
            src_image,
            ref_image,
            mask,
            densepose,
        })
    }

    /// Normalized source (person) image
    #[must_use]
    pub fn src_image(&self) -> &DynamicImage {
        &self.src_image
    }

    /// Normalized reference (garment or person) image
    #[must_use]
    pub fn ref_image(&self) -> &DynamicImage {
        &self.ref_image
    }

    /// Binary editable-region mask
    #[must_use]
    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Dense surface conditioning map (segmentation or IUV rendering)
    #[must_use]
    pub fn densepose(&self) -> &RgbImage {
        &self.densepose
    }

    /// Shared canvas dimensions of all components
    #[must_use]
    pub fn canvas_dimensions(&self) -> (u32, u32) {
        (self.src_image.width(), self.src_image.height())
    }
}

/// Detailed timing breakdown for one generation request (milliseconds)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Input image decoding
    pub decode_ms: u64,
    /// Normalization of both inputs to the canvas size
    pub normalize_ms: u64,
    /// Region mask prediction (zero for pose transfer)
    pub mask_ms: u64,
    /// Dense surface map prediction
    pub densepose_ms: u64,
    /// Generation backend inference
    pub inference_ms: u64,
    /// End-to-end wall time
    pub total_ms: u64,
}

/// Metadata attached to every generation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Task that produced the result
    pub task: TaskType,
    /// Timing breakdown
    pub timings: ProcessingTimings,
    /// RFC 3339 completion timestamp
    pub completed_at: String,
}

impl ProcessingMetadata {
    /// Create metadata stamped with the current time
    #[must_use]
    pub fn new(task: TaskType, timings: ProcessingTimings) -> Self {
        Self {
            task,
            timings,
            completed_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Serialize the metadata as pretty-printed JSON
    ///
    /// # Errors
    /// - `Internal` if serialization fails
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PersonGenError::internal(format!("Failed to serialize metadata: {e}")))
    }
}

/// Result of one generation request
#[derive(Debug)]
pub struct GenerationResult {
    /// The generated image
    pub image: DynamicImage,
    /// Canvas dimensions the pipeline normalized to
    pub canvas_dimensions: (u32, u32),
    /// Processing metadata
    pub metadata: ProcessingMetadata,
}

impl GenerationResult {
    /// Wrap a generated image with its metadata
    #[must_use]
    pub fn new(
        image: DynamicImage,
        canvas_dimensions: (u32, u32),
        metadata: ProcessingMetadata,
    ) -> Self {
        Self {
            image,
            canvas_dimensions,
            metadata,
        }
    }

    /// Save the generated image as PNG
    ///
    /// # Errors
    /// - Encoding or file write failures
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image
            .save_with_format(path.as_ref(), image::ImageFormat::Png)?;
        Ok(())
    }

    /// Encode the generated image as PNG bytes
    ///
    /// # Errors
    /// - Encoding failures
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.image.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )?;
        Ok(bytes)
    }

    /// One-line timing summary for logging
    #[must_use]
    pub fn timing_summary(&self) -> String {
        let t = &self.metadata.timings;
        format!(
            "decode {}ms, normalize {}ms, mask {}ms, densepose {}ms, inference {}ms, total {}ms",
            t.decode_ms, t.normalize_ms, t.mask_ms, t.densepose_ms, t.inference_ms, t.total_ms
        )
    }
}
