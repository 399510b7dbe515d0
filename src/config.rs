//! Configuration types for the generation pipeline

use crate::error::{PersonGenError, Result};
use crate::models::CheckpointSpec;
use crate::types::BodyRegion;
use serde::{Deserialize, Serialize};

/// Default canvas width all inputs are normalized to
pub const DEFAULT_CANVAS_WIDTH: u32 = 768;

/// Default canvas height all inputs are normalized to
pub const DEFAULT_CANVAS_HEIGHT: u32 = 1024;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration (Metal Performance Shaders)
    CoreMl,
}

impl Default for ExecutionProvider {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Configuration for person image generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Canvas width all inputs are normalized to
    pub canvas_width: u32,

    /// Canvas height all inputs are normalized to
    pub canvas_height: u32,

    /// Fill color for the normalizer canvas (RGB, neutral white by default)
    pub padding_color: [u8; 3],

    /// Body region hint for the virtual try-on mask predictor
    pub mask_region: BodyRegion,

    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,

    /// Enable debug mode (additional logging and validation)
    pub debug: bool,

    /// Checkpoint repository specification
    pub checkpoint: CheckpointSpec,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            padding_color: [255, 255, 255],
            mask_region: BodyRegion::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            inter_threads: 0,
            debug: false,
            checkpoint: CheckpointSpec::default(),
        }
    }
}

impl GenerationConfig {
    /// Create a new configuration builder for fluent API construction
    #[must_use]
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder::new()
    }

    /// Canvas dimensions as a (width, height) pair
    #[must_use]
    pub fn canvas_dimensions(&self) -> (u32, u32) {
        (self.canvas_width, self.canvas_height)
    }
}

/// Builder for `GenerationConfig`
#[derive(Debug, Default)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: GenerationConfig::default(),
        }
    }

    #[must_use]
    pub fn canvas_size(mut self, width: u32, height: u32) -> Self {
        self.config.canvas_width = width;
        self.config.canvas_height = height;
        self
    }

    #[must_use]
    pub fn padding_color(mut self, color: [u8; 3]) -> Self {
        self.config.padding_color = color;
        self
    }

    #[must_use]
    pub fn mask_region(mut self, region: BodyRegion) -> Self {
        self.config.mask_region = region;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    #[must_use]
    pub fn checkpoint(mut self, checkpoint: CheckpointSpec) -> Self {
        self.config.checkpoint = checkpoint;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns `PersonGenError` for:
    /// - Zero canvas width or height
    pub fn build(self) -> Result<GenerationConfig> {
        if self.config.canvas_width == 0 || self.config.canvas_height == 0 {
            return Err(PersonGenError::invalid_config(format!(
                "Canvas dimensions must be positive, got {}x{}",
                self.config.canvas_width, self.config.canvas_height
            )));
        }

        Ok(self.config)
    }
}
