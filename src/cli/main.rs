//! Person Image Generation CLI Tool
//!
//! Command-line interface for virtual try-on and pose transfer using the
//! unified processor.

use crate::{
    cache::{format_size, CheckpointCache},
    config::{GenerationConfig, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH},
    download::{validate_checkpoint_url, CheckpointDownloader},
    models::CheckpointSpec,
    processor::PersonGenerationProcessor,
    types::{BodyRegion, TaskType},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use std::path::PathBuf;
use std::time::Instant;

/// Person image generation CLI tool
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "persongen")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Source person image
    #[arg(value_name = "SRC", required_unless_present_any = &["only_download", "list_checkpoints", "clear_cache", "show_cache_dir"])]
    pub src: Option<PathBuf>,

    /// Reference image (garment for virtual try-on, person for pose transfer)
    #[arg(value_name = "REF", required_unless_present_any = &["only_download", "list_checkpoints", "clear_cache", "show_cache_dir"])]
    pub reference: Option<PathBuf>,

    /// Generation task
    #[arg(short, long, value_enum, default_value_t = CliTask::VirtualTryon)]
    pub task: CliTask,

    /// Output file
    #[arg(short, long, value_name = "OUTPUT", default_value = "output.png")]
    pub output: PathBuf,

    /// Body region for the virtual try-on mask (upper, lower, overall)
    #[arg(short, long, default_value = "upper")]
    pub region: String,

    /// Execution provider (auto, cpu, cuda, coreml)
    #[arg(short, long, default_value = "auto")]
    pub execution_provider: String,

    /// Canvas width all inputs are normalized to
    #[arg(long, default_value_t = DEFAULT_CANVAS_WIDTH)]
    pub canvas_width: u32,

    /// Canvas height all inputs are normalized to
    #[arg(long, default_value_t = DEFAULT_CANVAS_HEIGHT)]
    pub canvas_height: u32,

    /// Number of threads (0 = auto-detect optimal threading)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Checkpoint URL, cached checkpoint ID, or path to a checkpoint folder
    /// [default: first cached checkpoint]
    #[arg(short, long)]
    pub checkpoint: Option<String>,

    /// Download the checkpoint given by --checkpoint but don't process images
    #[arg(long)]
    pub only_download: bool,

    /// List cached checkpoints available for processing and exit
    #[arg(long)]
    pub list_checkpoints: bool,

    /// Clear cached checkpoints (combine with --checkpoint to clear one)
    #[arg(long)]
    pub clear_cache: bool,

    /// Show current cache directory
    #[arg(long)]
    pub show_cache_dir: bool,

    /// Use custom cache directory
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliTask {
    VirtualTryon,
    PoseTransfer,
}

impl From<CliTask> for TaskType {
    fn from(task: CliTask) -> Self {
        match task {
            CliTask::VirtualTryon => Self::VirtualTryOn,
            CliTask::PoseTransfer => Self::PoseTransfer,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    crate::tracing_config::init_cli_tracing(cli.verbose)
        .context("Failed to initialize tracing")?;

    // Custom cache directory applies to every cache access below
    if let Some(cache_dir) = &cli.cache_dir {
        std::env::set_var("PERSONGEN_CACHE_DIR", cache_dir);
    }

    // Handle management flags that don't require inputs
    if cli.list_checkpoints {
        return list_cached_checkpoints();
    }

    if cli.only_download {
        return download_checkpoint_only(&cli).await;
    }

    if cli.clear_cache {
        return clear_cached_checkpoints(&cli);
    }

    if cli.show_cache_dir {
        return show_current_cache_dir();
    }

    let (Some(src), Some(reference)) = (&cli.src, &cli.reference) else {
        anyhow::bail!("Both SRC and REF images are required");
    };

    let task: TaskType = cli.task.into();
    let checkpoint = resolve_checkpoint_spec(&cli).await?;

    let config = GenerationConfig::builder()
        .canvas_size(cli.canvas_width, cli.canvas_height)
        .mask_region(
            cli.region
                .parse::<BodyRegion>()
                .context("Invalid --region value")?,
        )
        .execution_provider(parse_execution_provider(&cli.execution_provider)?)
        .intra_threads(cli.threads)
        .checkpoint(checkpoint)
        .build()
        .context("Failed to build configuration")?;

    info!("Starting person generation CLI");
    info!("Task: {}, output: {}", task, cli.output.display());

    let mut processor = PersonGenerationProcessor::new(config)
        .context("Failed to create person generation processor")?;

    let start_time = Instant::now();
    let result = processor
        .generate_from_paths(src, reference, task)
        .context("Generation failed")?;
    result
        .save_png(&cli.output)
        .context("Failed to save output image")?;

    info!(
        "Generated {} in {:.2}s ({})",
        cli.output.display(),
        start_time.elapsed().as_secs_f64(),
        result.timing_summary()
    );
    println!("Saved {}", cli.output.display());

    Ok(())
}

/// Turn the --checkpoint argument into a checkpoint specification
///
/// URLs are downloaded into the cache first (a no-op when already cached);
/// existing directories are used as external checkpoints; anything else is
/// treated as a cached checkpoint ID. No argument selects the first cached
/// checkpoint.
async fn resolve_checkpoint_spec(cli: &Cli) -> Result<CheckpointSpec> {
    let Some(checkpoint) = &cli.checkpoint else {
        return Ok(CheckpointSpec::default());
    };

    if checkpoint.starts_with("https://") {
        validate_checkpoint_url(checkpoint)?;
        let downloader =
            CheckpointDownloader::new().context("Failed to create checkpoint downloader")?;
        let checkpoint_id = downloader
            .download_checkpoint(checkpoint, true)
            .await
            .context("Failed to download checkpoint")?;
        return Ok(CheckpointSpec::downloaded(checkpoint_id));
    }

    let path = PathBuf::from(checkpoint);
    if path.is_dir() {
        return Ok(CheckpointSpec::external(path));
    }

    Ok(CheckpointSpec::downloaded(checkpoint.clone()))
}

fn parse_execution_provider(value: &str) -> Result<crate::config::ExecutionProvider> {
    use crate::config::ExecutionProvider;
    match value {
        "auto" => Ok(ExecutionProvider::Auto),
        "cpu" => Ok(ExecutionProvider::Cpu),
        "cuda" => Ok(ExecutionProvider::Cuda),
        "coreml" => Ok(ExecutionProvider::CoreMl),
        other => anyhow::bail!(
            "Invalid execution provider: {other} (expected one of: auto, cpu, cuda, coreml)"
        ),
    }
}

/// Download the checkpoint named by --checkpoint without processing images
async fn download_checkpoint_only(cli: &Cli) -> Result<()> {
    let Some(url) = &cli.checkpoint else {
        anyhow::bail!("--only-download requires --checkpoint with a repository URL");
    };

    validate_checkpoint_url(url)?;
    let downloader =
        CheckpointDownloader::new().context("Failed to create checkpoint downloader")?;
    let checkpoint_id = downloader
        .download_checkpoint(url, true)
        .await
        .context("Failed to download checkpoint")?;

    println!("Downloaded checkpoint: {checkpoint_id}");
    Ok(())
}

/// Print all cached checkpoints with completeness and size
fn list_cached_checkpoints() -> Result<()> {
    let cache = CheckpointCache::new().context("Failed to create checkpoint cache")?;
    let checkpoints = cache
        .scan_cached_checkpoints()
        .context("Failed to scan cached checkpoints")?;

    if checkpoints.is_empty() {
        println!("No cached checkpoints found.");
        println!("Download one with: persongen --only-download --checkpoint <URL>");
        return Ok(());
    }

    println!("Cached checkpoints ({}):", cache.cache_dir().display());
    for info in checkpoints {
        let status = if info.complete { "complete" } else { "incomplete" };
        println!(
            "  {} ({}, {})",
            info.checkpoint_id,
            status,
            format_size(info.size_bytes)
        );
    }
    Ok(())
}

/// Remove one or all cached checkpoints
fn clear_cached_checkpoints(cli: &Cli) -> Result<()> {
    let cache = CheckpointCache::new().context("Failed to create checkpoint cache")?;

    if let Some(checkpoint_id) = &cli.checkpoint {
        cache
            .remove_checkpoint(checkpoint_id)
            .context("Failed to remove checkpoint")?;
        println!("Removed checkpoint: {checkpoint_id}");
    } else {
        let count = cache.clear_all().context("Failed to clear cache")?;
        println!("Removed {count} cached checkpoint(s)");
    }
    Ok(())
}

fn show_current_cache_dir() -> Result<()> {
    let cache = CheckpointCache::new().context("Failed to create checkpoint cache")?;
    println!("{}", cache.cache_dir().display());
    Ok(())
}
