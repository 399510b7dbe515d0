//! Backend implementations of the external predictor contracts
//!
//! This module provides the ONNX Runtime implementations of the three
//! neural collaborators (mask predictor, dense surface predictor,
//! generation backend). The model semantics stay opaque; everything here is
//! session plumbing.

#[cfg(feature = "onnx")]
pub mod onnx;

// Test utilities for pipeline testing
#[cfg(test)]
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use self::onnx::{OnnxDensePosePredictor, OnnxGenerationBackend, OnnxMaskPredictor};
