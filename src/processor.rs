//! Unified person image generation processor
//!
//! This module provides the `PersonGenerationProcessor` that sequences the
//! whole pipeline for one request: normalize inputs, compute conditioning
//! (region mask + dense surface map), assemble an immutable inference
//! request, and forward it to the generation backend matching the selected
//! task. The neural services are injected through a factory and owned by the
//! processor; nothing here is a module-level singleton.

use crate::{
    config::GenerationConfig,
    error::{PersonGenError, Result},
    inference::{DenseSurfacePredictor, GenerationBackend, MaskPredictor},
    types::{
        GenerationResult, InferenceRequest, ProcessingMetadata, ProcessingTimings, TaskType,
    },
    utils::{ImageNormalizer, NormalizerOptions},
};
use image::{DynamicImage, GrayImage, RgbImage};
use instant::Instant;
use std::path::Path;
use tracing::{debug, info, instrument, span, Level};

/// Factory trait for creating the neural predictor services
///
/// Mirrors the dependency-injection seam of the pipeline: whatever composes
/// the system decides how the three external collaborators are constructed
/// and which weights they load.
pub trait PredictorFactory: Send + Sync {
    /// Create the garment-agnostic mask predictor
    ///
    /// # Errors
    /// - Checkpoint resolution or model loading failures
    fn create_mask_predictor(&self, config: &GenerationConfig) -> Result<Box<dyn MaskPredictor>>;

    /// Create the dense surface predictor
    ///
    /// # Errors
    /// - Checkpoint resolution or model loading failures
    fn create_dense_predictor(
        &self,
        config: &GenerationConfig,
    ) -> Result<Box<dyn DenseSurfacePredictor>>;

    /// Create the generation backend instance for one task
    ///
    /// The two tasks use independently loaded instances with different
    /// pretrained weights.
    ///
    /// # Errors
    /// - Checkpoint resolution or model loading failures
    fn create_generation_backend(
        &self,
        task: TaskType,
        config: &GenerationConfig,
    ) -> Result<Box<dyn GenerationBackend>>;
}

/// Default factory wiring the ONNX implementations
///
/// Available when the `onnx` feature is enabled; otherwise every creation
/// call fails and a custom factory must be injected.
pub struct DefaultPredictorFactory;

impl PredictorFactory for DefaultPredictorFactory {
    #[cfg(feature = "onnx")]
    fn create_mask_predictor(&self, config: &GenerationConfig) -> Result<Box<dyn MaskPredictor>> {
        Ok(Box::new(crate::backends::OnnxMaskPredictor::new(config)?))
    }

    #[cfg(not(feature = "onnx"))]
    fn create_mask_predictor(&self, _config: &GenerationConfig) -> Result<Box<dyn MaskPredictor>> {
        Err(PersonGenError::invalid_config(
            "ONNX backends not available. Enable the `onnx` feature or inject a custom factory.",
        ))
    }

    #[cfg(feature = "onnx")]
    fn create_dense_predictor(
        &self,
        config: &GenerationConfig,
    ) -> Result<Box<dyn DenseSurfacePredictor>> {
        Ok(Box::new(crate::backends::OnnxDensePosePredictor::new(
            config,
        )?))
    }

    #[cfg(not(feature = "onnx"))]
    fn create_dense_predictor(
        &self,
        _config: &GenerationConfig,
    ) -> Result<Box<dyn DenseSurfacePredictor>> {
        Err(PersonGenError::invalid_config(
            "ONNX backends not available. Enable the `onnx` feature or inject a custom factory.",
        ))
    }

    #[cfg(feature = "onnx")]
    fn create_generation_backend(
        &self,
        task: TaskType,
        config: &GenerationConfig,
    ) -> Result<Box<dyn GenerationBackend>> {
        Ok(Box::new(crate::backends::OnnxGenerationBackend::new(
            task, config,
        )?))
    }

    #[cfg(not(feature = "onnx"))]
    fn create_generation_backend(
        &self,
        _task: TaskType,
        _config: &GenerationConfig,
    ) -> Result<Box<dyn GenerationBackend>> {
        Err(PersonGenError::invalid_config(
            "ONNX backends not available. Enable the `onnx` feature or inject a custom factory.",
        ))
    }
}

/// The injected neural services, created once and reused across requests
struct PredictorServices {
    mask_predictor: Box<dyn MaskPredictor>,
    dense_predictor: Box<dyn DenseSurfacePredictor>,
    vt_backend: Box<dyn GenerationBackend>,
    pt_backend: Box<dyn GenerationBackend>,
}

impl PredictorServices {
    fn backend_for(&self, task: TaskType) -> &dyn GenerationBackend {
        match task {
            TaskType::VirtualTryOn => self.vt_backend.as_ref(),
            TaskType::PoseTransfer => self.pt_backend.as_ref(),
        }
    }
}

/// Unified processor sequencing the five pipeline stages per request
pub struct PersonGenerationProcessor {
    config: GenerationConfig,
    factory: Box<dyn PredictorFactory>,
    services: Option<PredictorServices>,
}

impl PersonGenerationProcessor {
    /// Create a new processor with the default (ONNX) factory
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: GenerationConfig) -> Result<Self> {
        Self::with_factory(config, Box::new(DefaultPredictorFactory))
    }

    /// Create a new processor with a custom predictor factory
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_factory(
        config: GenerationConfig,
        factory: Box<dyn PredictorFactory>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            factory,
            services: None,
        })
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Whether the predictor services have been created
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.services.is_some()
    }

    /// Create all predictor services through the factory
    ///
    /// Called automatically on first use. All four services are loaded once
    /// and treated as read-only across subsequent requests.
    ///
    /// # Errors
    /// - Service construction or model loading failures
    pub fn initialize(&mut self) -> Result<()> {
        if self.services.is_some() {
            return Ok(());
        }

        info!("Initializing person generation processor");
        debug!(checkpoint = %self.config.checkpoint.source.display_name(), "Checkpoint spec");
        debug!(provider = %self.config.execution_provider, "Execution provider");

        let services = PredictorServices {
            mask_predictor: self.factory.create_mask_predictor(&self.config)?,
            dense_predictor: self.factory.create_dense_predictor(&self.config)?,
            vt_backend: self
                .factory
                .create_generation_backend(TaskType::VirtualTryOn, &self.config)?,
            pt_backend: self
                .factory
                .create_generation_backend(TaskType::PoseTransfer, &self.config)?,
        };
        self.services = Some(services);

        info!("Person generation processor initialized successfully");
        Ok(())
    }

    /// Run a generation request from two image file paths
    ///
    /// Decoding happens before any predictor service is touched, so an
    /// unreadable input fails early with a decode error.
    ///
    /// # Errors
    /// - `Decode` if either input cannot be parsed as an image
    /// - Predictor and backend failures, surfaced unchanged
    pub fn generate_from_paths<P: AsRef<Path>>(
        &mut self,
        src_path: P,
        ref_path: P,
        task: TaskType,
    ) -> Result<GenerationResult> {
        let decode_start = Instant::now();
        let src_image = image::open(src_path.as_ref())
            .map_err(|e| PersonGenError::image_decode_error(src_path.as_ref(), e))?;
        let ref_image = image::open(ref_path.as_ref())
            .map_err(|e| PersonGenError::image_decode_error(ref_path.as_ref(), e))?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        self.generate_decoded(&src_image, &ref_image, task, decode_ms)
    }

    /// Run a generation request from two image file paths with a free-form
    /// task selector
    ///
    /// The selector is validated before any decoding or predictor call, so an
    /// unknown task never wastes computation.
    ///
    /// # Errors
    /// - `InvalidTask` for selectors outside {`virtual_tryon`, `pose_transfer`}
    /// - All errors of [`Self::generate_from_paths`]
    pub fn generate_from_paths_str<P: AsRef<Path>>(
        &mut self,
        src_path: P,
        ref_path: P,
        task: &str,
    ) -> Result<GenerationResult> {
        let task: TaskType = task.parse()?;
        self.generate_from_paths(src_path, ref_path, task)
    }

    /// Run a generation request from raw image bytes
    ///
    /// # Errors
    /// - `Decode` if either input cannot be parsed as an image
    /// - Predictor and backend failures, surfaced unchanged
    pub fn generate_from_bytes(
        &mut self,
        src_bytes: &[u8],
        ref_bytes: &[u8],
        task: TaskType,
    ) -> Result<GenerationResult> {
        let decode_start = Instant::now();
        let src_image = image::load_from_memory(src_bytes)?;
        let ref_image = image::load_from_memory(ref_bytes)?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        self.generate_decoded(&src_image, &ref_image, task, decode_ms)
    }

    /// Run a generation request on already-decoded images
    ///
    /// # Errors
    /// - Predictor and backend failures, surfaced unchanged
    pub fn generate_image(
        &mut self,
        src_image: &DynamicImage,
        ref_image: &DynamicImage,
        task: TaskType,
    ) -> Result<GenerationResult> {
        self.generate_decoded(src_image, ref_image, task, 0)
    }

    /// Assemble the inference request for a pair of images without running
    /// the generation backend
    ///
    /// Exposed so callers can inspect the conditioning the backend would
    /// receive. Identical inputs produce bit-identical requests when the
    /// predictor services are deterministic.
    ///
    /// # Errors
    /// - Predictor failures, surfaced unchanged
    pub fn prepare_request(
        &mut self,
        src_image: &DynamicImage,
        ref_image: &DynamicImage,
        task: TaskType,
    ) -> Result<InferenceRequest> {
        let mut timings = ProcessingTimings::default();
        self.prepare_request_timed(src_image, ref_image, task, &mut timings)
    }

    #[instrument(
        skip(self, src_image, ref_image),
        fields(
            task = %task,
            canvas = %format!("{}x{}", self.config.canvas_width, self.config.canvas_height)
        )
    )]
    fn generate_decoded(
        &mut self,
        src_image: &DynamicImage,
        ref_image: &DynamicImage,
        task: TaskType,
        decode_ms: u64,
    ) -> Result<GenerationResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings {
            decode_ms,
            ..ProcessingTimings::default()
        };

        info!(task = %task, "Starting generation request");

        let request = self.prepare_request_timed(src_image, ref_image, task, &mut timings)?;

        // Route to the backend instance loaded for this task
        let generated = {
            let services = self
                .services
                .as_ref()
                .ok_or_else(|| PersonGenError::internal("Predictor services not initialized"))?;
            let backend = services.backend_for(task);

            let _span = span!(Level::INFO, "generation", backend = %backend.name()).entered();
            let inference_start = Instant::now();
            let generated = backend.generate(&request)?;
            timings.inference_ms = inference_start.elapsed().as_millis() as u64;
            generated
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        info!(
            task = %task,
            total_ms = timings.total_ms,
            inference_ms = timings.inference_ms,
            "Generation request completed"
        );

        let metadata = ProcessingMetadata::new(task, timings);
        Ok(GenerationResult::new(
            generated,
            self.config.canvas_dimensions(),
            metadata,
        ))
    }

    /// Normalize both inputs and assemble the conditioning for one task
    fn prepare_request_timed(
        &mut self,
        src_image: &DynamicImage,
        ref_image: &DynamicImage,
        task: TaskType,
        timings: &mut ProcessingTimings,
    ) -> Result<InferenceRequest> {
        if self.services.is_none() {
            self.initialize()?;
        }

        let (width, height) = self.config.canvas_dimensions();
        let options = NormalizerOptions {
            padding_color: self.config.padding_color,
        };

        // Normalize both inputs to the shared canvas size
        let (src_norm, ref_norm) = {
            let _span = span!(
                Level::DEBUG,
                "normalize",
                src_width = src_image.width(),
                src_height = src_image.height(),
                ref_width = ref_image.width(),
                ref_height = ref_image.height()
            )
            .entered();
            let normalize_start = Instant::now();
            let src_norm = ImageNormalizer::resize_and_center(src_image, width, height, &options)?;
            let ref_norm = ImageNormalizer::resize_and_center(ref_image, width, height, &options)?;
            timings.normalize_ms = normalize_start.elapsed().as_millis() as u64;
            (src_norm, ref_norm)
        };

        let (src_final, mask, densepose) = {
            let _span = span!(Level::DEBUG, "conditioning", task = %task).entered();
            self.build_conditioning(&src_norm, task, timings)?
        };

        InferenceRequest::new(src_final, ref_norm, mask, densepose)
    }

    /// Select the mask and dense-map variant for one task
    ///
    /// Virtual try-on drops the alpha channel of the source before masking
    /// (the generation weights were trained on plain color); pose transfer
    /// deliberately keeps the source unchanged. The all-white pose-transfer
    /// mask is the convention for "no masking restriction".
    fn build_conditioning(
        &self,
        src_norm: &DynamicImage,
        task: TaskType,
        timings: &mut ProcessingTimings,
    ) -> Result<(DynamicImage, GrayImage, RgbImage)> {
        let services = self
            .services
            .as_ref()
            .ok_or_else(|| PersonGenError::internal("Predictor services not initialized"))?;

        match task {
            TaskType::VirtualTryOn => {
                let src_rgb = DynamicImage::ImageRgb8(src_norm.to_rgb8());

                let mask_start = Instant::now();
                let mask = services
                    .mask_predictor
                    .predict_mask(&src_rgb, self.config.mask_region)?;
                timings.mask_ms = mask_start.elapsed().as_millis() as u64;
                debug!(region = %self.config.mask_region, "Region mask predicted");

                let densepose_start = Instant::now();
                let densepose = services.dense_predictor.predict_seg(src_norm)?;
                timings.densepose_ms = densepose_start.elapsed().as_millis() as u64;
                debug!("Segmentation dense map predicted");

                Ok((src_rgb, mask, densepose))
            },
            TaskType::PoseTransfer => {
                let (width, height) = self.config.canvas_dimensions();
                let mask = ImageNormalizer::full_white_mask(width, height);
                debug!("Synthesized full-canvas white mask");

                let densepose_start = Instant::now();
                let densepose = services.dense_predictor.predict_iuv(src_norm)?;
                timings.densepose_ms = densepose_start.elapsed().as_millis() as u64;
                debug!("IUV dense map predicted");

                Ok((src_norm.clone(), mask, densepose))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{
        test_helpers::create_test_image, CallHistory, MockDensePredictor, MockMaskPredictor,
        MockPredictorFactory,
    };
    use crate::types::BodyRegion;

    fn mock_processor() -> (PersonGenerationProcessor, CallHistory) {
        let factory = MockPredictorFactory::new();
        let history = factory.history.clone();
        let processor = PersonGenerationProcessor::with_factory(
            GenerationConfig::default(),
            Box::new(factory),
        )
        .unwrap();
        (processor, history)
    }

    #[test]
    fn test_lazy_initialization_on_first_use() {
        let (mut processor, _history) = mock_processor();
        assert!(!processor.is_initialized());

        let src = create_test_image(400, 600);
        let reference = create_test_image(1000, 800);
        processor
            .generate_image(&src, &reference, TaskType::VirtualTryOn)
            .unwrap();
        assert!(processor.is_initialized());
    }

    #[test]
    fn test_virtual_tryon_calls_mask_then_segmentation() {
        let (mut processor, history) = mock_processor();
        let src = create_test_image(400, 600);
        let reference = create_test_image(1000, 800);

        let result = processor
            .generate_image(&src, &reference, TaskType::VirtualTryOn)
            .unwrap();

        // Output comes back at the canvas size regardless of input sizes
        assert_eq!(result.image.width(), 768);
        assert_eq!(result.image.height(), 1024);
        assert_eq!(
            history.calls(),
            vec![
                "predict_mask:upper",
                "predict_seg",
                "generate:mock:virtual_tryon"
            ]
        );
    }

    #[test]
    fn test_pose_transfer_skips_mask_predictor() {
        let (mut processor, history) = mock_processor();
        let src = create_test_image(640, 480);
        let reference = create_test_image(300, 500);

        processor
            .generate_image(&src, &reference, TaskType::PoseTransfer)
            .unwrap();

        assert_eq!(
            history.calls(),
            vec!["predict_iuv", "generate:mock:pose_transfer"]
        );
    }

    #[test]
    fn test_pose_transfer_mask_is_all_white_even_with_failing_mask_predictor() {
        let factory = MockPredictorFactory {
            fail_mask: true,
            ..MockPredictorFactory::new()
        };
        let mut processor = PersonGenerationProcessor::with_factory(
            GenerationConfig::default(),
            Box::new(factory),
        )
        .unwrap();

        let src = create_test_image(400, 600);
        let reference = create_test_image(400, 600);
        let request = processor
            .prepare_request(&src, &reference, TaskType::PoseTransfer)
            .unwrap();

        assert!(request.mask().pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_virtual_tryon_mask_matches_predictor_output() {
        let (mut processor, _history) = mock_processor();
        let src = create_test_image(400, 600);
        let reference = create_test_image(400, 600);

        let request = processor
            .prepare_request(&src, &reference, TaskType::VirtualTryOn)
            .unwrap();

        assert_eq!(request.mask(), &MockMaskPredictor::expected_mask(768, 1024));
        assert_eq!(
            request.densepose().get_pixel(0, 0),
            &MockDensePredictor::SEG_COLOR
        );
    }

    #[test]
    fn test_pose_transfer_uses_iuv_map() {
        let (mut processor, _history) = mock_processor();
        let src = create_test_image(400, 600);
        let reference = create_test_image(400, 600);

        let request = processor
            .prepare_request(&src, &reference, TaskType::PoseTransfer)
            .unwrap();
        assert_eq!(
            request.densepose().get_pixel(0, 0),
            &MockDensePredictor::IUV_COLOR
        );
    }

    #[test]
    fn test_request_assembly_is_idempotent() {
        let (mut processor, _history) = mock_processor();
        let src = create_test_image(400, 600);
        let reference = create_test_image(1000, 800);

        let first = processor
            .prepare_request(&src, &reference, TaskType::VirtualTryOn)
            .unwrap();
        let second = processor
            .prepare_request(&src, &reference, TaskType::VirtualTryOn)
            .unwrap();

        assert_eq!(first.src_image().to_rgb8(), second.src_image().to_rgb8());
        assert_eq!(first.ref_image().to_rgb8(), second.ref_image().to_rgb8());
        assert_eq!(first.mask(), second.mask());
        assert_eq!(first.densepose(), second.densepose());
    }

    #[test]
    fn test_invalid_task_selector_rejected_before_decode() {
        let (mut processor, history) = mock_processor();
        let err = processor
            .generate_from_paths_str("/nonexistent/src.png", "/nonexistent/ref.png", "inpaint")
            .unwrap_err();
        assert!(matches!(err, PersonGenError::InvalidTask(_)));
        // No predictor was touched
        assert!(history.calls().is_empty());
        assert!(!processor.is_initialized());
    }

    #[test]
    fn test_corrupt_bytes_fail_before_predictors() {
        let (mut processor, history) = mock_processor();
        let good = {
            let mut bytes = Vec::new();
            create_test_image(8, 8)
                .write_to(
                    &mut std::io::Cursor::new(&mut bytes),
                    image::ImageFormat::Png,
                )
                .unwrap();
            bytes
        };

        let err = processor
            .generate_from_bytes(&good, b"not an image", TaskType::PoseTransfer)
            .unwrap_err();
        assert!(matches!(err, PersonGenError::Decode(_)));
        assert!(history.calls().is_empty());
    }

    #[test]
    fn test_failing_generation_backend_surfaces_error() {
        let factory = MockPredictorFactory {
            fail_generation: true,
            ..MockPredictorFactory::new()
        };
        let mut processor = PersonGenerationProcessor::with_factory(
            GenerationConfig::default(),
            Box::new(factory),
        )
        .unwrap();

        let src = create_test_image(400, 600);
        let reference = create_test_image(400, 600);
        let err = processor
            .generate_image(&src, &reference, TaskType::VirtualTryOn)
            .unwrap_err();
        assert!(matches!(err, PersonGenError::Inference(_)));
    }

    #[test]
    fn test_failing_service_creation_fails_initialize() {
        let factory = MockPredictorFactory::new_creation_failing();
        let mut processor = PersonGenerationProcessor::with_factory(
            GenerationConfig::default(),
            Box::new(factory),
        )
        .unwrap();
        assert!(processor.initialize().is_err());
        assert!(!processor.is_initialized());
    }

    #[test]
    fn test_configured_mask_region_forwarded() {
        let factory = MockPredictorFactory::new();
        let history = factory.history.clone();
        let config = GenerationConfig::builder()
            .mask_region(BodyRegion::Overall)
            .build()
            .unwrap();
        let mut processor =
            PersonGenerationProcessor::with_factory(config, Box::new(factory)).unwrap();

        let src = create_test_image(400, 600);
        let reference = create_test_image(400, 600);
        processor
            .prepare_request(&src, &reference, TaskType::VirtualTryOn)
            .unwrap();

        assert!(history
            .calls()
            .contains(&"predict_mask:overall".to_string()));
    }
}
