//! Shared utilities

pub mod preprocessing;

pub use preprocessing::{ImageNormalizer, NormalizerOptions};
