//! Checkpoint repository management
//!
//! A checkpoint repository is a directory holding the four pretrained model
//! files the pipeline consumes. The weights themselves are opaque; this
//! module only locates and validates them.

use crate::cache::CheckpointCache;
use crate::error::{PersonGenError, Result};
use std::path::{Path, PathBuf};

/// Virtual try-on generation model file
pub const VIRTUAL_TRYON_FILE: &str = "virtual_tryon.onnx";

/// Pose transfer generation model file
pub const POSE_TRANSFER_FILE: &str = "pose_transfer.onnx";

/// Dense surface (IUV + segmentation) predictor file
pub const DENSEPOSE_FILE: &str = "densepose.onnx";

/// Garment-agnostic mask predictor file
pub const MASK_PREDICTOR_FILE: &str = "mask_predictor.onnx";

/// All files a complete checkpoint repository must contain
pub const REQUIRED_CHECKPOINT_FILES: &[&str] = &[
    VIRTUAL_TRYON_FILE,
    POSE_TRANSFER_FILE,
    DENSEPOSE_FILE,
    MASK_PREDICTOR_FILE,
];

/// Checkpoint source specification
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum CheckpointSource {
    /// External checkpoint directory from a filesystem path
    External(PathBuf),
    /// Downloaded checkpoint from the cache by checkpoint ID
    Downloaded(String),
}

impl CheckpointSource {
    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::External(path) => format!(
                "external:{}",
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
            Self::Downloaded(checkpoint_id) => format!("cached:{}", checkpoint_id),
        }
    }
}

/// Complete checkpoint specification
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CheckpointSpec {
    pub source: CheckpointSource,
}

impl Default for CheckpointSpec {
    fn default() -> Self {
        // Resolved at runtime against the first cached checkpoint
        Self {
            source: CheckpointSource::Downloaded(String::new()),
        }
    }
}

impl CheckpointSpec {
    /// Specification for an external checkpoint directory
    pub fn external<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            source: CheckpointSource::External(path.into()),
        }
    }

    /// Specification for a cached checkpoint by ID
    pub fn downloaded<S: Into<String>>(checkpoint_id: S) -> Self {
        Self {
            source: CheckpointSource::Downloaded(checkpoint_id.into()),
        }
    }

    /// Resolve the specification to a validated checkpoint directory
    ///
    /// # Errors
    /// - `InvalidConfig` if an external path does not exist or is not a directory
    /// - `Model` if required model files are missing, or if an empty downloaded
    ///   spec matches no cached checkpoint
    pub fn resolve_dir(&self) -> Result<PathBuf> {
        let dir = match &self.source {
            CheckpointSource::External(path) => {
                if !path.is_dir() {
                    return Err(PersonGenError::invalid_config(format!(
                        "Checkpoint path is not a directory: {}",
                        path.display()
                    )));
                }
                path.clone()
            },
            CheckpointSource::Downloaded(checkpoint_id) => {
                let cache = CheckpointCache::new()?;
                if checkpoint_id.is_empty() {
                    // Empty ID means "use the first cached checkpoint"
                    let cached = cache.scan_cached_checkpoints()?;
                    let first = cached.into_iter().next().ok_or_else(|| {
                        PersonGenError::model(
                            "No cached checkpoints found. Download one first (see CheckpointDownloader).",
                        )
                    })?;
                    first.path
                } else {
                    let path = cache.get_checkpoint_path(checkpoint_id);
                    if !cache.is_checkpoint_cached(checkpoint_id) {
                        return Err(PersonGenError::model(format!(
                            "Checkpoint '{}' is not cached (expected at {})",
                            checkpoint_id,
                            path.display()
                        )));
                    }
                    path
                }
            },
        };

        validate_checkpoint_dir(&dir)?;
        Ok(dir)
    }
}

/// Validate that a checkpoint directory contains every required model file
///
/// # Errors
/// - `Model` naming the first missing file
pub fn validate_checkpoint_dir(dir: &Path) -> Result<()> {
    for file in REQUIRED_CHECKPOINT_FILES {
        let path = dir.join(file);
        if !path.is_file() {
            return Err(PersonGenError::model_error_with_context(
                "validate",
                dir,
                &format!("missing required model file '{}'", file),
            ));
        }
    }
    Ok(())
}
