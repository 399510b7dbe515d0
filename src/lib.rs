#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Person Image Generation Library
//!
//! A Rust library orchestrating controllable person image generation with
//! ONNX Runtime. Two tasks are supported: virtual try-on (dress a person in
//! a reference garment) and pose transfer (re-render a reference person in a
//! source pose). The neural models are consumed as opaque checkpoints; this
//! library sequences normalization, conditioning, request assembly, and
//! backend routing around them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use persongen::{
//!     CheckpointDownloader, CheckpointSpec, GenerationConfig,
//!     PersonGenerationProcessor, TaskType,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! // Download and cache a checkpoint repository (one-time setup)
//! let downloader = CheckpointDownloader::new()?;
//! let url = "https://huggingface.co/acme/person-gen-onnx";
//! let checkpoint_id = downloader.download_checkpoint(url, true).await?;
//!
//! // Configure the pipeline against the cached checkpoint
//! let config = GenerationConfig::builder()
//!     .checkpoint(CheckpointSpec::downloaded(checkpoint_id))
//!     .build()?;
//!
//! // Run a virtual try-on request
//! let mut processor = PersonGenerationProcessor::new(config)?;
//! let result = processor.generate_from_paths("person.jpg", "garment.jpg", TaskType::VirtualTryOn)?;
//! result.save_png("output.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `onnx` (default): ONNX Runtime implementations of the predictor services
//! - `cli` (default): Command-line interface and progress reporting

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
#[cfg(feature = "onnx")]
pub use backends::{OnnxDensePosePredictor, OnnxGenerationBackend, OnnxMaskPredictor};
pub use cache::{format_size, CachedCheckpointInfo, CheckpointCache};
pub use config::{
    ExecutionProvider, GenerationConfig, GenerationConfigBuilder, DEFAULT_CANVAS_HEIGHT,
    DEFAULT_CANVAS_WIDTH,
};
pub use download::{validate_checkpoint_url, CheckpointDownloader, ProgressIndicator};
pub use error::{PersonGenError, Result};
pub use inference::{DenseSurfacePredictor, GenerationBackend, MaskPredictor};
pub use models::{validate_checkpoint_dir, CheckpointSource, CheckpointSpec};
pub use processor::{DefaultPredictorFactory, PersonGenerationProcessor, PredictorFactory};
pub use types::{
    BodyRegion, GenerationResult, InferenceRequest, ProcessingMetadata, ProcessingTimings,
    TaskType,
};
pub use utils::{ImageNormalizer, NormalizerOptions};

/// Run one generation request from two image files with default settings
///
/// Convenience wrapper for one-shot usage. Creates a fresh processor per
/// call; reuse a [`PersonGenerationProcessor`] when issuing many requests.
///
/// # Errors
/// - Configuration, decoding, or inference failures
pub fn generate_from_paths<P: AsRef<std::path::Path>>(
    src_path: P,
    ref_path: P,
    task: TaskType,
    config: &GenerationConfig,
) -> Result<GenerationResult> {
    let mut processor = PersonGenerationProcessor::new(config.clone())?;
    processor.generate_from_paths(src_path, ref_path, task)
}

/// Run one generation request from raw image bytes with default settings
///
/// # Errors
/// - Configuration, decoding, or inference failures
pub fn generate_from_bytes(
    src_bytes: &[u8],
    ref_bytes: &[u8],
    task: TaskType,
    config: &GenerationConfig,
) -> Result<GenerationResult> {
    let mut processor = PersonGenerationProcessor::new(config.clone())?;
    processor.generate_from_bytes(src_bytes, ref_bytes, task)
}
