//! Error types for person image generation operations

use thiserror::Error;

/// Errors that can occur during person image generation
#[derive(Error, Debug)]
pub enum PersonGenError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding failed
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),

    /// Unknown task selector
    #[error("Invalid task: {0} (expected one of: virtual_tryon, pose_transfer)")]
    InvalidTask(String),

    /// Model inference failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model loading or validation failed
    #[error("Model error: {0}")]
    Model(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Image processing failed
    #[error("Processing error: {0}")]
    Processing(String),

    /// Network operation failed
    #[error("Network error: {0}")]
    Network(String),

    /// Internal invariant violated
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PersonGenError {
    /// Create a new invalid task error
    pub fn invalid_task<S: Into<String>>(task: S) -> Self {
        Self::InvalidTask(task.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a new network error
    pub fn network_error<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Create a file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {operation} '{path_display}': {error}"),
        ))
    }

    /// Create an image decode error with path context
    pub fn image_decode_error<P: AsRef<std::path::Path>>(
        path: P,
        error: image::ImageError,
    ) -> Self {
        let path_display = path.as_ref().display();
        match error {
            image::ImageError::IoError(io_err) => Self::Io(std::io::Error::new(
                io_err.kind(),
                format!("Failed to read image '{path_display}': {io_err}"),
            )),
            other => Self::Decode(other),
        }
    }

    /// Create a model error with operation and path context
    pub fn model_error_with_context<P: AsRef<std::path::Path>>(
        operation: &str,
        model_path: P,
        error: &str,
    ) -> Self {
        let path_display = model_path.as_ref().display();
        Self::Model(format!(
            "Failed to {operation} model '{path_display}': {error}"
        ))
    }
}

/// Result type alias for person generation operations
pub type Result<T> = std::result::Result<T, PersonGenError>;
