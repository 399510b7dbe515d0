//! Integration tests for complete generation workflows
//!
//! These tests verify end-to-end pipeline behavior without model files,
//! using mock predictor services injected through the public factory trait.

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use persongen::{
    BodyRegion, DenseSurfacePredictor, GenerationBackend, GenerationConfig, GenerationResult,
    InferenceRequest, MaskPredictor, PersonGenError, PersonGenerationProcessor, PredictorFactory,
    Result, TaskType,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const IUV_COLOR: image::Rgb<u8> = image::Rgb([200, 40, 40]);
const SEG_COLOR: image::Rgb<u8> = image::Rgb([40, 200, 40]);

/// Shared call log across all mock services
type CallLog = Arc<Mutex<Vec<String>>>;

fn record(log: &CallLog, call: &str) {
    log.lock().unwrap().push(call.to_string());
}

struct StubMaskPredictor {
    log: CallLog,
}

impl StubMaskPredictor {
    /// Deterministic top-half-white mask, recognizable downstream
    fn expected_mask(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |_, y| {
            image::Luma(if y < height / 2 { [255] } else { [0] })
        })
    }
}

impl MaskPredictor for StubMaskPredictor {
    fn predict_mask(&self, image: &DynamicImage, region: BodyRegion) -> Result<GrayImage> {
        record(&self.log, &format!("mask:{region}"));
        Ok(Self::expected_mask(image.width(), image.height()))
    }
}

struct StubDensePredictor {
    log: CallLog,
}

impl DenseSurfacePredictor for StubDensePredictor {
    fn predict_iuv(&self, image: &DynamicImage) -> Result<RgbImage> {
        record(&self.log, "iuv");
        Ok(RgbImage::from_pixel(image.width(), image.height(), IUV_COLOR))
    }

    fn predict_seg(&self, image: &DynamicImage) -> Result<RgbImage> {
        record(&self.log, "seg");
        Ok(RgbImage::from_pixel(image.width(), image.height(), SEG_COLOR))
    }
}

struct StubGenerationBackend {
    log: CallLog,
    name: String,
}

impl GenerationBackend for StubGenerationBackend {
    fn generate(&self, request: &InferenceRequest) -> Result<DynamicImage> {
        record(&self.log, &format!("generate:{}", self.name));
        Ok(request.src_image().clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct StubFactory {
    log: CallLog,
}

impl StubFactory {
    fn new() -> (Self, CallLog) {
        let log: CallLog = Arc::default();
        (Self { log: log.clone() }, log)
    }
}

impl PredictorFactory for StubFactory {
    fn create_mask_predictor(&self, _config: &GenerationConfig) -> Result<Box<dyn MaskPredictor>> {
        Ok(Box::new(StubMaskPredictor {
            log: self.log.clone(),
        }))
    }

    fn create_dense_predictor(
        &self,
        _config: &GenerationConfig,
    ) -> Result<Box<dyn DenseSurfacePredictor>> {
        Ok(Box::new(StubDensePredictor {
            log: self.log.clone(),
        }))
    }

    fn create_generation_backend(
        &self,
        task: TaskType,
        _config: &GenerationConfig,
    ) -> Result<Box<dyn GenerationBackend>> {
        Ok(Box::new(StubGenerationBackend {
            log: self.log.clone(),
            name: task.to_string(),
        }))
    }
}

fn stub_processor() -> (PersonGenerationProcessor, CallLog) {
    let (factory, log) = StubFactory::new();
    let processor =
        PersonGenerationProcessor::with_factory(GenerationConfig::default(), Box::new(factory))
            .unwrap();
    (processor, log)
}

/// Gradient test image encoded as PNG bytes
fn test_image_png(width: u32, height: u32) -> Vec<u8> {
    let image = gradient_image(width, height);
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

#[allow(clippy::cast_possible_truncation)]
fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 90])
    }))
}

fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[test]
fn virtual_tryon_workflow_normalizes_and_routes() {
    let (mut processor, log) = stub_processor();

    let src = gradient_image(400, 600);
    let reference = gradient_image(1000, 800);
    let result = processor
        .generate_image(&src, &reference, TaskType::VirtualTryOn)
        .unwrap();

    // Differently sized inputs come out at the shared canvas size
    assert_eq!(result.image.width(), 768);
    assert_eq!(result.image.height(), 1024);
    assert_eq!(result.canvas_dimensions, (768, 1024));
    assert_eq!(result.metadata.task, TaskType::VirtualTryOn);

    assert_eq!(
        calls(&log),
        vec!["mask:upper", "seg", "generate:virtual_tryon"]
    );
}

#[test]
fn pose_transfer_workflow_uses_iuv_and_white_mask() {
    let (mut processor, log) = stub_processor();

    let src = gradient_image(640, 480);
    let reference = gradient_image(300, 900);
    let request = processor
        .prepare_request(&src, &reference, TaskType::PoseTransfer)
        .unwrap();

    assert_eq!(request.canvas_dimensions(), (768, 1024));
    assert!(request.mask().pixels().all(|p| p.0[0] == 255));
    assert_eq!(request.densepose().get_pixel(10, 10), &IUV_COLOR);
    assert_eq!(calls(&log), vec!["iuv"]);
}

#[test]
fn virtual_tryon_mask_matches_predictor_output() {
    let (mut processor, _log) = stub_processor();

    let src = gradient_image(400, 600);
    let reference = gradient_image(400, 600);
    let request = processor
        .prepare_request(&src, &reference, TaskType::VirtualTryOn)
        .unwrap();

    assert_eq!(request.mask(), &StubMaskPredictor::expected_mask(768, 1024));
    assert_eq!(request.densepose().get_pixel(10, 10), &SEG_COLOR);
}

#[test]
fn invalid_task_selector_fails_before_any_work() {
    let (mut processor, log) = stub_processor();

    let err = processor
        .generate_from_paths_str("/no/such/src.png", "/no/such/ref.png", "face_swap")
        .unwrap_err();

    assert!(matches!(err, PersonGenError::InvalidTask(_)));
    assert!(err.to_string().contains("face_swap"));
    // No decode, no predictor call, no initialization happened
    assert!(calls(&log).is_empty());
    assert!(!processor.is_initialized());
}

#[test]
fn corrupt_reference_bytes_fail_before_predictors() {
    let (mut processor, log) = stub_processor();

    let src = test_image_png(64, 64);
    let err = processor
        .generate_from_bytes(&src, b"definitely not an image", TaskType::PoseTransfer)
        .unwrap_err();

    assert!(matches!(err, PersonGenError::Decode(_)));
    assert!(calls(&log).is_empty());
}

#[test]
fn missing_input_file_reports_path() {
    let (mut processor, _log) = stub_processor();

    let err = processor
        .generate_from_paths("/no/such/src.png", "/no/such/ref.png", TaskType::VirtualTryOn)
        .unwrap_err();
    assert!(err.to_string().contains("/no/such/src.png"));
}

#[test]
fn request_assembly_is_idempotent() {
    let (mut processor, _log) = stub_processor();

    let src = gradient_image(400, 600);
    let reference = gradient_image(1000, 800);

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
fn result_round_trips_through_png_file() {
    let (mut processor, _log) = stub_processor();
    let temp = TempDir::new().unwrap();

    let src = gradient_image(400, 600);
    let reference = gradient_image(400, 600);
    let result: GenerationResult = processor
        .generate_image(&src, &reference, TaskType::VirtualTryOn)
        .unwrap();

    let out_path = temp.path().join("generated.png");
    result.save_png(&out_path).unwrap();

    let reloaded = image::open(&out_path).unwrap();
    assert_eq!(
        (reloaded.width(), reloaded.height()),
        result.canvas_dimensions
    );
}

#[test]
fn services_are_created_once_across_requests() {
    let (mut processor, log) = stub_processor();

    let src = gradient_image(100, 100);
    let reference = gradient_image(100, 100);

    processor
        .generate_image(&src, &reference, TaskType::VirtualTryOn)
        .unwrap();
    processor
        .generate_image(&src, &reference, TaskType::PoseTransfer)
        .unwrap();

    // Both tasks are served by the same pre-created service set, routed by task
    assert_eq!(
        calls(&log),
        vec![
            "mask:upper",
            "seg",
            "generate:virtual_tryon",
            "iuv",
            "generate:pose_transfer"
        ]
    );
}

#[test]
fn generate_from_paths_str_accepts_canonical_selectors() {
    let (mut processor, _log) = stub_processor();
    let temp = TempDir::new().unwrap();

    let src_path = temp.path().join("src.png");
    let ref_path = temp.path().join("ref.png");
    std::fs::write(&src_path, test_image_png(120, 200)).unwrap();
    std::fs::write(&ref_path, test_image_png(200, 120)).unwrap();

    let result = processor
        .generate_from_paths_str(&src_path, &ref_path, "pose_transfer")
        .unwrap();
    assert_eq!(result.metadata.task, TaskType::PoseTransfer);
    assert!(result.metadata.timings.total_ms >= result.metadata.timings.inference_ms);
}
