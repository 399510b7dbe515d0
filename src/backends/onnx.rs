//! ONNX Runtime implementations of the predictor contracts
//!
//! Each predictor owns one ONNX Runtime session loaded from the checkpoint
//! repository at construction time. Sessions are shared read-only across
//! requests; the interior mutex only serializes `run` calls, matching the
//! one-request-at-a-time flow of the presentation layer.

use crate::config::{ExecutionProvider, GenerationConfig};
use crate::error::{PersonGenError, Result};
use crate::inference::{DenseSurfacePredictor, GenerationBackend, MaskPredictor};
use crate::models::{self, CheckpointSpec};
use crate::types::{BodyRegion, InferenceRequest, TaskType};
use crate::utils::ImageNormalizer;
use image::{DynamicImage, GrayImage, RgbImage};
use ndarray::{Array1, Array4};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::{self, value::Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Per-channel normalization applied before every session run
const NORM_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
const NORM_STD: [f32; 3] = [0.5, 0.5, 0.5];

/// Number of body parts in the dense surface parameterization
const DENSEPOSE_PARTS: f32 = 24.0;

/// Probability threshold separating editable from protected pixels
const MASK_THRESHOLD: f32 = 0.5;

/// Resolve the checkpoint directory and join one model file
fn model_file(spec: &CheckpointSpec, file: &str) -> Result<PathBuf> {
    Ok(spec.resolve_dir()?.join(file))
}

/// Build an ONNX Runtime session for a model file
///
/// Configures the execution provider chain (Auto tries CUDA, then CoreML,
/// then CPU, each with an availability check) and threading, then commits
/// the session from the model bytes.
#[allow(clippy::too_many_lines)]
fn build_session(model_path: &Path, config: &GenerationConfig) -> Result<Session> {
    let load_start = std::time::Instant::now();

    let model_data = std::fs::read(model_path)
        .map_err(|e| PersonGenError::file_io_error("read model file", model_path, &e))?;

    let mut session_builder = Session::builder()
        .map_err(|e| PersonGenError::inference(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| {
            PersonGenError::inference(format!("Failed to set optimization level: {e}"))
        })?;

    session_builder = match config.execution_provider {
        ExecutionProvider::Auto => {
            let mut providers = Vec::new();

            let cuda_provider = CUDAExecutionProvider::default();
            if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                log::info!("CUDA execution provider is available and will be used");
                providers.push(cuda_provider.build());
            } else {
                log::debug!("CUDA execution provider is not available");
            }

            let coreml_provider = CoreMLExecutionProvider::default();
            if OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false) {
                log::info!("CoreML execution provider is available and will be used");
                providers.push(
                    CoreMLExecutionProvider::default()
                        .with_subgraphs(true)
                        .build(),
                );
            } else {
                log::debug!("CoreML execution provider is not available");
            }

            if providers.is_empty() {
                log::warn!("No hardware acceleration available, falling back to CPU");
                session_builder
            } else {
                session_builder
                    .with_execution_providers(providers)
                    .map_err(|e| {
                        PersonGenError::inference(format!(
                            "Failed to set auto execution providers: {e}"
                        ))
                    })?
            }
        },
        ExecutionProvider::Cpu => {
            log::info!("Using CPU execution provider");
            session_builder
        },
        ExecutionProvider::Cuda => {
            let cuda_provider = CUDAExecutionProvider::default();
            if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                log::info!("Using CUDA execution provider");
                session_builder
                    .with_execution_providers([cuda_provider.build()])
                    .map_err(|e| {
                        PersonGenError::inference(format!(
                            "Failed to set CUDA execution provider: {e}"
                        ))
                    })?
            } else {
                log::warn!("CUDA execution provider requested but not available, falling back to CPU");
                session_builder
            }
        },
        ExecutionProvider::CoreMl => {
            let coreml_provider = CoreMLExecutionProvider::default();
            if OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false) {
                log::info!("Using CoreML execution provider");
                session_builder
                    .with_execution_providers([CoreMLExecutionProvider::default()
                        .with_subgraphs(true)
                        .build()])
                    .map_err(|e| {
                        PersonGenError::inference(format!(
                            "Failed to set CoreML execution provider: {e}"
                        ))
                    })?
            } else {
                log::warn!("CoreML execution provider requested but not available, falling back to CPU");
                session_builder
            }
        },
    };

    // Threading defaults mirror the host: all cores within an op, a few between ops
    let intra_threads = if config.intra_threads > 0 {
        config.intra_threads
    } else {
        std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(8)
    };
    let inter_threads = if config.inter_threads > 0 {
        config.inter_threads
    } else {
        (std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(8)
            / 4)
        .max(1)
    };

    let session = session_builder
        .with_parallel_execution(true)
        .map_err(|e| {
            PersonGenError::inference(format!("Failed to enable parallel execution: {e}"))
        })?
        .with_intra_threads(intra_threads)
        .map_err(|e| PersonGenError::inference(format!("Failed to set intra threads: {e}")))?
        .with_inter_threads(inter_threads)
        .map_err(|e| PersonGenError::inference(format!("Failed to set inter threads: {e}")))?
        .commit_from_memory(&model_data)
        .map_err(|e| {
            PersonGenError::model_error_with_context(
                "load",
                model_path,
                &format!("session creation failed: {e}"),
            )
        })?;

    log::info!(
        "Loaded model {} in {:.0}ms",
        model_path.display(),
        load_start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(session)
}

/// Extract a session output value as a 4D tensor
fn value_to_array4(value: &ort::value::DynValue, context: &str) -> Result<Array4<f32>> {
    let tensor = value.try_extract_array::<f32>().map_err(|e| {
        PersonGenError::inference(format!("Failed to extract {context} output tensor: {e}"))
    })?;

    let shape = tensor.shape().to_vec();
    if shape.len() != 4 {
        return Err(PersonGenError::inference(format!(
            "Expected 4D {context} output tensor, got {}D",
            shape.len()
        )));
    }

    let data = tensor.view().to_owned().into_raw_vec_and_offset().0;
    Array4::from_shape_vec(
        (
            shape.first().copied().unwrap_or(1),
            shape.get(1).copied().unwrap_or(1),
            shape.get(2).copied().unwrap_or(1),
            shape.get(3).copied().unwrap_or(1),
        ),
        data,
    )
    .map_err(|e| {
        PersonGenError::inference(format!("Failed to reshape {context} output tensor: {e}"))
    })
}

/// Convert an image to the normalized NCHW input tensor every model expects
fn image_to_input(image: &DynamicImage) -> Array4<f32> {
    ImageNormalizer::rgb_to_tensor(&image.to_rgb8(), NORM_MEAN, NORM_STD)
}

/// Fixed color for one body-part label in the segmentation rendering
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn part_color(label: usize) -> image::Rgb<u8> {
    if label == 0 {
        return image::Rgb([0, 0, 0]); // background
    }
    // Evenly spaced hues, full saturation and value
    let hue = (label as f32 * 360.0 / (DENSEPOSE_PARTS + 1.0)) % 360.0;
    let sector = hue / 60.0;
    let fraction = sector - sector.floor();
    let q = (255.0 * (1.0 - fraction)) as u8;
    let t = (255.0 * fraction) as u8;
    match sector as u32 {
        0 => image::Rgb([255, t, 0]),
        1 => image::Rgb([q, 255, 0]),
        2 => image::Rgb([0, 255, t]),
        3 => image::Rgb([0, q, 255]),
        4 => image::Rgb([t, 0, 255]),
        _ => image::Rgb([255, 0, q]),
    }
}

/// ONNX-backed garment-agnostic mask predictor
pub struct OnnxMaskPredictor {
    session: Mutex<Session>,
}

impl OnnxMaskPredictor {
    /// Load the mask predictor from the configured checkpoint
    ///
    /// # Errors
    /// - Checkpoint resolution or session creation failures
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let path = model_file(&config.checkpoint, models::MASK_PREDICTOR_FILE)?;
        let session = build_session(&path, config)?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    fn region_index(region: BodyRegion) -> i64 {
        match region {
            BodyRegion::Upper => 0,
            BodyRegion::Lower => 1,
            BodyRegion::Overall => 2,
        }
    }
}

impl MaskPredictor for OnnxMaskPredictor {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn predict_mask(&self, image: &DynamicImage, region: BodyRegion) -> Result<GrayImage> {
        let (width, height) = (image.width(), image.height());

        let image_value = Value::from_array(image_to_input(image)).map_err(|e| {
            PersonGenError::inference(format!("Failed to convert mask input tensor: {e}"))
        })?;
        let region_value =
            Value::from_array(Array1::from_elem(1, Self::region_index(region))).map_err(|e| {
                PersonGenError::inference(format!("Failed to convert region tensor: {e}"))
            })?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PersonGenError::internal("Mask predictor session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![image_value, region_value])
            .map_err(|e| PersonGenError::inference(format!("Mask prediction failed: {e}")))?;

        let keys: Vec<_> = outputs.keys().collect();
        let value = keys
            .first()
            .and_then(|key| outputs.get(*key))
            .ok_or_else(|| PersonGenError::inference("Missing mask output tensor"))?;
        let probabilities = value_to_array4(value, "mask")?;
        let shape = probabilities.shape().to_vec();
        let (out_height, out_width) = (
            shape.get(2).copied().unwrap_or(1),
            shape.get(3).copied().unwrap_or(1),
        );

        // Threshold the probability map into a binary mask
        #[allow(clippy::indexing_slicing)]
        let mask = GrayImage::from_fn(out_width as u32, out_height as u32, |x, y| {
            let p = probabilities[[0, 0, y as usize, x as usize]];
            image::Luma(if p >= MASK_THRESHOLD { [255] } else { [0] })
        });

        // Bring the mask back to the canvas size of the input
        Ok(image::imageops::resize(
            &mask,
            width,
            height,
            image::imageops::FilterType::Nearest,
        ))
    }
}

/// ONNX-backed dense human-surface predictor
///
/// One session produces both conditioning variants: output 0 is the IUV map
/// (part index plus per-pixel surface coordinates), output 1 the body-part
/// segmentation logits.
pub struct OnnxDensePosePredictor {
    session: Mutex<Session>,
}

impl OnnxDensePosePredictor {
    /// Load the dense surface predictor from the configured checkpoint
    ///
    /// # Errors
    /// - Checkpoint resolution or session creation failures
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let path = model_file(&config.checkpoint, models::DENSEPOSE_FILE)?;
        let session = build_session(&path, config)?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    fn run(&self, image: &DynamicImage) -> Result<(Array4<f32>, Array4<f32>)> {
        let image_value = Value::from_array(image_to_input(image)).map_err(|e| {
            PersonGenError::inference(format!("Failed to convert dense input tensor: {e}"))
        })?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PersonGenError::internal("Dense predictor session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![image_value])
            .map_err(|e| PersonGenError::inference(format!("Dense prediction failed: {e}")))?;

        let keys: Vec<_> = outputs.keys().collect();
        let iuv_value = keys
            .first()
            .and_then(|key| outputs.get(*key))
            .ok_or_else(|| PersonGenError::inference("Missing IUV output tensor"))?;
        let seg_value = keys
            .get(1)
            .and_then(|key| outputs.get(*key))
            .ok_or_else(|| PersonGenError::inference("Missing segmentation output tensor"))?;

        let iuv = value_to_array4(iuv_value, "IUV")?;
        let seg = value_to_array4(seg_value, "segmentation")?;
        Ok((iuv, seg))
    }
}

impl DenseSurfacePredictor for OnnxDensePosePredictor {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn predict_iuv(&self, image: &DynamicImage) -> Result<RgbImage> {
        let (width, height) = (image.width(), image.height());
        let (iuv, _seg) = self.run(image)?;

        let shape = iuv.shape().to_vec();
        if shape.get(1).copied().unwrap_or(0) < 3 {
            return Err(PersonGenError::inference(format!(
                "IUV output must have at least 3 channels, got {}",
                shape.get(1).copied().unwrap_or(0)
            )));
        }
        let (out_height, out_width) = (
            shape.get(2).copied().unwrap_or(1),
            shape.get(3).copied().unwrap_or(1),
        );

        // Channel 0: part index in 0..=24; channels 1-2: surface coordinates in 0-1
        #[allow(clippy::indexing_slicing)]
        let rendered = RgbImage::from_fn(out_width as u32, out_height as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            let i = (iuv[[0, 0, y, x]] / DENSEPOSE_PARTS).clamp(0.0, 1.0);
            let u = iuv[[0, 1, y, x]].clamp(0.0, 1.0);
            let v = iuv[[0, 2, y, x]].clamp(0.0, 1.0);
            image::Rgb([
                (i * 255.0).round() as u8,
                (u * 255.0).round() as u8,
                (v * 255.0).round() as u8,
            ])
        });

        Ok(image::imageops::resize(
            &rendered,
            width,
            height,
            image::imageops::FilterType::Nearest,
        ))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn predict_seg(&self, image: &DynamicImage) -> Result<RgbImage> {
        let (width, height) = (image.width(), image.height());
        let (_iuv, seg) = self.run(image)?;

        let shape = seg.shape().to_vec();
        let channels = shape.get(1).copied().unwrap_or(1);
        let (out_height, out_width) = (
            shape.get(2).copied().unwrap_or(1),
            shape.get(3).copied().unwrap_or(1),
        );

        // Argmax over the part logits, rendered with a fixed palette
        #[allow(clippy::indexing_slicing)]
        let rendered = RgbImage::from_fn(out_width as u32, out_height as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            let mut best = 0usize;
            let mut best_score = f32::NEG_INFINITY;
            for c in 0..channels {
                let score = seg[[0, c, y, x]];
                if score > best_score {
                    best_score = score;
                    best = c;
                }
            }
            part_color(best)
        });

        Ok(image::imageops::resize(
            &rendered,
            width,
            height,
            image::imageops::FilterType::Nearest,
        ))
    }
}

/// ONNX-backed generative inpainting backend for one task
pub struct OnnxGenerationBackend {
    session: Mutex<Session>,
    name: String,
}

impl OnnxGenerationBackend {
    /// Load the generation backend for one task from the configured checkpoint
    ///
    /// The two tasks load different pretrained weights; constructing one
    /// backend per task gives the processor two independent instances.
    ///
    /// # Errors
    /// - Checkpoint resolution or session creation failures
    pub fn new(task: TaskType, config: &GenerationConfig) -> Result<Self> {
        let file = match task {
            TaskType::VirtualTryOn => models::VIRTUAL_TRYON_FILE,
            TaskType::PoseTransfer => models::POSE_TRANSFER_FILE,
        };
        let path = model_file(&config.checkpoint, file)?;
        let session = build_session(&path, config)?;
        Ok(Self {
            session: Mutex::new(session),
            name: format!("onnx:{task}"),
        })
    }
}

impl GenerationBackend for OnnxGenerationBackend {
    fn generate(&self, request: &InferenceRequest) -> Result<DynamicImage> {
        let src_value = Value::from_array(image_to_input(request.src_image())).map_err(|e| {
            PersonGenError::inference(format!("Failed to convert source tensor: {e}"))
        })?;
        let ref_value = Value::from_array(image_to_input(request.ref_image())).map_err(|e| {
            PersonGenError::inference(format!("Failed to convert reference tensor: {e}"))
        })?;
        let mask_value = Value::from_array(ImageNormalizer::mask_to_tensor(request.mask()))
            .map_err(|e| PersonGenError::inference(format!("Failed to convert mask tensor: {e}")))?;
        let densepose_value = Value::from_array(ImageNormalizer::rgb_to_tensor(
            request.densepose(),
            NORM_MEAN,
            NORM_STD,
        ))
        .map_err(|e| {
            PersonGenError::inference(format!("Failed to convert dense map tensor: {e}"))
        })?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PersonGenError::internal("Generation session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![src_value, ref_value, mask_value, densepose_value])
            .map_err(|e| PersonGenError::inference(format!("Generation failed: {e}")))?;

        // Output pixels come back normalized to [-1, 1]
        let keys: Vec<_> = outputs.keys().collect();
        let value = keys
            .first()
            .and_then(|key| outputs.get(*key))
            .ok_or_else(|| PersonGenError::inference("Missing generation output tensor"))?;
        let mut generated = value_to_array4(value, "generation")?;
        generated.mapv_inplace(|v| (v + 1.0) / 2.0);

        let image = ImageNormalizer::tensor_to_rgb(&generated)?;
        Ok(DynamicImage::ImageRgb8(image))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
