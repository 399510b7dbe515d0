//! Test utilities and mock predictors for pipeline testing
//!
//! Mock implementations of the three predictor contracts so the processor
//! can be tested without model files or ONNX Runtime. Every mock records its
//! calls into a shared history for ordering assertions.

use crate::config::GenerationConfig;
use crate::error::{PersonGenError, Result};
use crate::inference::{DenseSurfacePredictor, GenerationBackend, MaskPredictor};
use crate::processor::PredictorFactory;
use crate::types::{BodyRegion, InferenceRequest, TaskType};
use image::{DynamicImage, GrayImage, RgbImage};
use std::sync::{Arc, Mutex};

/// Shared, cloneable call history
#[derive(Debug, Clone, Default)]
pub struct CallHistory {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.to_string());
        }
    }

    /// Snapshot of all recorded calls, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Clear the recorded calls
    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }
}

/// Mock garment-agnostic mask predictor
///
/// Produces a deterministic left-half-white mask at the input dimensions,
/// which downstream tests can recognize pixel-for-pixel.
#[derive(Debug, Clone)]
pub struct MockMaskPredictor {
    history: CallHistory,
    should_fail: bool,
}

impl MockMaskPredictor {
    #[must_use]
    pub fn new(history: CallHistory) -> Self {
        Self {
            history,
            should_fail: false,
        }
    }

    /// Create a mock that fails every prediction
    #[must_use]
    pub fn new_failing(history: CallHistory) -> Self {
        Self {
            history,
            should_fail: true,
        }
    }

    /// The deterministic mask this mock produces for a given canvas
    #[must_use]
    pub fn expected_mask(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| {
            image::Luma(if x < width / 2 { [255] } else { [0] })
        })
    }
}

impl MaskPredictor for MockMaskPredictor {
    fn predict_mask(&self, image: &DynamicImage, region: BodyRegion) -> Result<GrayImage> {
        self.history.record(&format!("predict_mask:{region}"));
        if self.should_fail {
            return Err(PersonGenError::inference("Mock mask prediction failed"));
        }
        Ok(Self::expected_mask(image.width(), image.height()))
    }
}

/// Mock dense surface predictor
///
/// Renders the IUV map solid red and the segmentation map solid green so
/// tests can tell which variant the processor requested.
#[derive(Debug, Clone)]
pub struct MockDensePredictor {
    history: CallHistory,
    should_fail: bool,
}

impl MockDensePredictor {
    pub const IUV_COLOR: image::Rgb<u8> = image::Rgb([255, 0, 0]);
    pub const SEG_COLOR: image::Rgb<u8> = image::Rgb([0, 255, 0]);

    #[must_use]
    pub fn new(history: CallHistory) -> Self {
        Self {
            history,
            should_fail: false,
        }
    }

    /// Create a mock that fails every prediction
    #[must_use]
    pub fn new_failing(history: CallHistory) -> Self {
        Self {
            history,
            should_fail: true,
        }
    }
}

impl DenseSurfacePredictor for MockDensePredictor {
    fn predict_iuv(&self, image: &DynamicImage) -> Result<RgbImage> {
        self.history.record("predict_iuv");
        if self.should_fail {
            return Err(PersonGenError::inference("Mock IUV prediction failed"));
        }
        Ok(RgbImage::from_pixel(
            image.width(),
            image.height(),
            Self::IUV_COLOR,
        ))
    }

    fn predict_seg(&self, image: &DynamicImage) -> Result<RgbImage> {
        self.history.record("predict_seg");
        if self.should_fail {
            return Err(PersonGenError::inference(
                "Mock segmentation prediction failed",
            ));
        }
        Ok(RgbImage::from_pixel(
            image.width(),
            image.height(),
            Self::SEG_COLOR,
        ))
    }
}

/// Mock generation backend
///
/// Echoes the request's source image back as the generated output.
#[derive(Debug, Clone)]
pub struct MockGenerationBackend {
    history: CallHistory,
    name: String,
    should_fail: bool,
}

impl MockGenerationBackend {
    #[must_use]
    pub fn new(task: TaskType, history: CallHistory) -> Self {
        Self {
            history,
            name: format!("mock:{task}"),
            should_fail: false,
        }
    }

    /// Create a mock that fails every generation
    #[must_use]
    pub fn new_failing(task: TaskType, history: CallHistory) -> Self {
        let mut backend = Self::new(task, history);
        backend.should_fail = true;
        backend
    }
}

impl GenerationBackend for MockGenerationBackend {
    fn generate(&self, request: &InferenceRequest) -> Result<DynamicImage> {
        self.history.record(&format!("generate:{}", self.name));
        if self.should_fail {
            return Err(PersonGenError::inference("Mock generation failed"));
        }
        Ok(request.src_image().clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Test factory wiring the mocks into a processor
#[derive(Debug, Clone, Default)]
pub struct MockPredictorFactory {
    /// Shared call history of every created service
    pub history: CallHistory,
    /// Whether created mask predictors fail
    pub fail_mask: bool,
    /// Whether created dense predictors fail
    pub fail_dense: bool,
    /// Whether created generation backends fail
    pub fail_generation: bool,
    /// Whether service creation itself fails
    pub fail_creation: bool,
}

impl MockPredictorFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose services cannot even be constructed
    #[must_use]
    pub fn new_creation_failing() -> Self {
        Self {
            fail_creation: true,
            ..Self::default()
        }
    }
}

impl PredictorFactory for MockPredictorFactory {
    fn create_mask_predictor(&self, _config: &GenerationConfig) -> Result<Box<dyn MaskPredictor>> {
        if self.fail_creation {
            return Err(PersonGenError::model(
                "Mock factory configured to fail service creation",
            ));
        }
        Ok(if self.fail_mask {
            Box::new(MockMaskPredictor::new_failing(self.history.clone()))
        } else {
            Box::new(MockMaskPredictor::new(self.history.clone()))
        })
    }

    fn create_dense_predictor(
        &self,
        _config: &GenerationConfig,
    ) -> Result<Box<dyn DenseSurfacePredictor>> {
        if self.fail_creation {
            return Err(PersonGenError::model(
                "Mock factory configured to fail service creation",
            ));
        }
        Ok(if self.fail_dense {
            Box::new(MockDensePredictor::new_failing(self.history.clone()))
        } else {
            Box::new(MockDensePredictor::new(self.history.clone()))
        })
    }

    fn create_generation_backend(
        &self,
        task: TaskType,
        _config: &GenerationConfig,
    ) -> Result<Box<dyn GenerationBackend>> {
        if self.fail_creation {
            return Err(PersonGenError::model(
                "Mock factory configured to fail service creation",
            ));
        }
        Ok(if self.fail_generation {
            Box::new(MockGenerationBackend::new_failing(
                task,
                self.history.clone(),
            ))
        } else {
            Box::new(MockGenerationBackend::new(task, self.history.clone()))
        })
    }
}

/// Helpers for creating test images
pub mod test_helpers {
    use image::{DynamicImage, ImageBuffer, Rgb};

    /// Create a gradient test image with the given dimensions
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn create_test_image(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let r = ((f64::from(x) / f64::from(width)) * 255.0) as u8;
            let g = ((f64::from(y) / f64::from(height)) * 255.0) as u8;
            Rgb([r, g, 128])
        });
        DynamicImage::ImageRgb8(img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_mask_predictor_records_calls() {
        let history = CallHistory::new();
        let predictor = MockMaskPredictor::new(history.clone());
        let image = test_helpers::create_test_image(16, 16);

        let mask = predictor.predict_mask(&image, BodyRegion::Upper).unwrap();
        assert_eq!(mask.dimensions(), (16, 16));
        assert_eq!(history.calls(), vec!["predict_mask:upper"]);

        history.clear();
        assert!(history.calls().is_empty());
    }

    #[test]
    fn test_mock_dense_predictor_distinguishes_variants() {
        let history = CallHistory::new();
        let predictor = MockDensePredictor::new(history.clone());
        let image = test_helpers::create_test_image(8, 8);

        let iuv = predictor.predict_iuv(&image).unwrap();
        let seg = predictor.predict_seg(&image).unwrap();
        assert_eq!(iuv.get_pixel(0, 0), &MockDensePredictor::IUV_COLOR);
        assert_eq!(seg.get_pixel(0, 0), &MockDensePredictor::SEG_COLOR);
        assert_eq!(history.calls(), vec!["predict_iuv", "predict_seg"]);
    }

    #[test]
    fn test_failing_mocks() {
        let history = CallHistory::new();
        let predictor = MockMaskPredictor::new_failing(history.clone());
        let image = test_helpers::create_test_image(8, 8);
        assert!(predictor.predict_mask(&image, BodyRegion::Upper).is_err());
        // The call is still recorded
        assert_eq!(history.calls().len(), 1);
    }

    #[test]
    fn test_creation_failing_factory() {
        let factory = MockPredictorFactory::new_creation_failing();
        let config = GenerationConfig::default();
        assert!(factory.create_mask_predictor(&config).is_err());
        assert!(factory.create_dense_predictor(&config).is_err());
        assert!(factory
            .create_generation_backend(TaskType::VirtualTryOn, &config)
            .is_err());
    }
}
