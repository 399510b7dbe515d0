//! Checkpoint downloading from `HuggingFace` repositories
//!
//! Async download of the four pretrained model files into the checkpoint
//! cache, with progress reporting and atomic operations (the checkpoint only
//! appears in the cache once every file landed).

use crate::cache::CheckpointCache;
use crate::error::{PersonGenError, Result};
use crate::models::REQUIRED_CHECKPOINT_FILES;
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// Progress bar abstraction that works with and without CLI features
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    /// Set message for progress indicator
    pub fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {},
        }
    }

    /// Set length for progress indicator
    pub fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {},
        }
    }

    /// Set position for progress indicator
    pub fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {},
        }
    }

    /// Finish progress indicator with message
    pub fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {},
        }
    }
}

/// Checkpoint downloader with progress reporting
#[derive(Debug)]
pub struct CheckpointDownloader {
    client: Client,
    cache: CheckpointCache,
}

impl CheckpointDownloader {
    /// Create a new checkpoint downloader
    ///
    /// # Errors
    /// - Failed to create HTTP client
    /// - Failed to initialize checkpoint cache
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(600)) // Checkpoints are large
            .build()
            .map_err(|e| {
                PersonGenError::network_error(format!("Failed to create HTTP client: {e}"))
            })?;

        let cache = CheckpointCache::new()?;

        Ok(Self { client, cache })
    }

    /// Create a downloader against an explicit cache directory
    ///
    /// # Errors
    /// - Failed to create HTTP client or the cache directory
    pub fn with_cache_dir<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(600))
            .build()
            .map_err(|e| {
                PersonGenError::network_error(format!("Failed to create HTTP client: {e}"))
            })?;

        let cache = CheckpointCache::with_dir(dir)?;

        Ok(Self { client, cache })
    }

    /// Download a checkpoint repository into the cache
    ///
    /// Downloads every required model file into a temporary directory, then
    /// renames it into its final cache location so a partially downloaded
    /// checkpoint never looks complete. Returns the checkpoint ID.
    ///
    /// # Errors
    /// - Invalid or unsupported URL format
    /// - Network errors during download
    /// - File system errors during caching
    pub async fn download_checkpoint(&self, url: &str, show_progress: bool) -> Result<String> {
        validate_checkpoint_url(url)?;
        let checkpoint_id = CheckpointCache::url_to_checkpoint_id(url);
        log::info!("Downloading checkpoint from: {}", url);
        log::info!("Checkpoint ID: {}", checkpoint_id);

        if self.cache.is_checkpoint_cached(&checkpoint_id) {
            log::info!("Checkpoint already cached: {}", checkpoint_id);
            return Ok(checkpoint_id);
        }

        let temp_dir = Self::create_temp_download_dir(&checkpoint_id)?;
        let final_dir = self.cache.get_checkpoint_path(&checkpoint_id);

        let progress = if show_progress {
            Some(Self::create_progress_indicator())
        } else {
            None
        };

        match self
            .download_checkpoint_files(url, &temp_dir, progress.as_ref())
            .await
        {
            Ok(()) => {
                // Atomic move from temp to final location
                if final_dir.exists() {
                    fs::remove_dir_all(&final_dir).map_err(|e| {
                        PersonGenError::file_io_error(
                            "remove existing checkpoint directory",
                            &final_dir,
                            &e,
                        )
                    })?;
                }

                fs::rename(&temp_dir, &final_dir).map_err(|e| {
                    PersonGenError::file_io_error(
                        "move downloaded checkpoint to cache",
                        &final_dir,
                        &e,
                    )
                })?;

                if let Some(pb) = progress {
                    pb.finish_with_message(format!("Downloaded {checkpoint_id}"));
                }

                log::info!("Successfully downloaded checkpoint: {}", checkpoint_id);
                Ok(checkpoint_id)
            },
            Err(e) => {
                if temp_dir.exists() {
                    if let Err(cleanup_err) = fs::remove_dir_all(&temp_dir) {
                        log::warn!("Failed to cleanup temp directory: {}", cleanup_err);
                    }
                }

                if let Some(pb) = progress {
                    pb.finish_with_message("Download failed".to_string());
                }

                Err(e)
            },
        }
    }

    /// Create a temporary directory for downloading
    fn create_temp_download_dir(checkpoint_id: &str) -> Result<PathBuf> {
        let temp_dir = std::env::temp_dir().join(format!("persongen-{checkpoint_id}"));

        if temp_dir.exists() {
            fs::remove_dir_all(&temp_dir).map_err(|e| {
                PersonGenError::file_io_error("remove existing temp directory", &temp_dir, &e)
            })?;
        }

        fs::create_dir_all(&temp_dir)
            .map_err(|e| PersonGenError::file_io_error("create temp directory", &temp_dir, &e))?;

        Ok(temp_dir)
    }

    /// Create a progress indicator for download reporting
    fn create_progress_indicator() -> ProgressIndicator {
        #[cfg(feature = "cli")]
        {
            let pb = ProgressBar::new(100);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            ProgressIndicator::Indicatif(pb)
        }
        #[cfg(not(feature = "cli"))]
        {
            ProgressIndicator::NoOp
        }
    }

    /// Download every required model file into the download directory
    ///
    /// Unlike variant-based repositories, all four files are mandatory; the
    /// first failure aborts the whole download.
    async fn download_checkpoint_files(
        &self,
        base_url: &str,
        download_dir: &Path,
        progress: Option<&ProgressIndicator>,
    ) -> Result<()> {
        let raw_base = format!("{base_url}/resolve/main/");

        for file_name in REQUIRED_CHECKPOINT_FILES {
            let file_url = format!("{raw_base}{file_name}");
            let local_path = download_dir.join(file_name);

            if let Some(pb) = progress {
                pb.set_message(format!("Downloading {file_name}"));
            }

            self.download_file(&file_url, &local_path, progress).await?;
        }

        Ok(())
    }

    /// Download a single file with progress reporting
    async fn download_file(
        &self,
        url: &str,
        local_path: &Path,
        progress: Option<&ProgressIndicator>,
    ) -> Result<()> {
        log::debug!("Downloading: {} -> {}", url, local_path.display());

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PersonGenError::file_io_error("create directory", parent, &e))?;
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            PersonGenError::network_error(format!("Failed to download {url}: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(PersonGenError::network_error(format!(
                "HTTP error {} for {}",
                response.status(),
                url
            )));
        }

        let total_size = response.content_length();

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| PersonGenError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut downloaded = 0u64;
        let mut buffer = vec![0; 8192];

        loop {
            let bytes_read = tokio::io::AsyncReadExt::read(&mut stream, &mut buffer)
                .await
                .map_err(|e| {
                    PersonGenError::network_error(format!("Failed to read download stream: {e}"))
                })?;

            if bytes_read == 0 {
                break; // EOF
            }

            file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
                .await
                .map_err(|e| PersonGenError::file_io_error("write to file", local_path, &e))?;

            downloaded += bytes_read as u64;

            if let Some(pb) = progress {
                if let Some(total) = total_size {
                    pb.set_length(total);
                    pb.set_position(downloaded);
                } else {
                    #[allow(clippy::cast_precision_loss)]
                    pb.set_message(format!(
                        "Downloaded {:.1} MB",
                        downloaded as f64 / 1_024_000.0
                    ));
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| PersonGenError::file_io_error("flush file", local_path, &e))?;

        log::debug!(
            "Downloaded {} bytes to {}",
            downloaded,
            local_path.display()
        );
        Ok(())
    }

    /// Get the checkpoint cache for other operations
    #[must_use]
    pub fn cache(&self) -> &CheckpointCache {
        &self.cache
    }
}

/// Validate that a URL is a supported checkpoint repository
///
/// Currently only `HuggingFace` repositories are supported.
///
/// # Errors
/// - `InvalidConfig` for empty or non-`HuggingFace` URLs
pub fn validate_checkpoint_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(PersonGenError::invalid_config(
            "Checkpoint URL cannot be empty",
        ));
    }

    if !url.starts_with("https://huggingface.co/") {
        return Err(PersonGenError::invalid_config(format!(
            "Unsupported URL format: {url}. Only HuggingFace repositories are supported (https://huggingface.co/...)"
        )));
    }

    let repo_path = url.trim_start_matches("https://huggingface.co/");
    if repo_path.is_empty() || !repo_path.contains('/') {
        return Err(PersonGenError::invalid_config(format!(
            "Invalid HuggingFace repository URL: {url}. Expected format: https://huggingface.co/username/repo-name"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_validate_checkpoint_url() {
        assert!(validate_checkpoint_url("https://huggingface.co/acme/person-gen-onnx").is_ok());

        assert!(validate_checkpoint_url("").is_err());
        assert!(validate_checkpoint_url("https://github.com/user/repo").is_err());
        assert!(validate_checkpoint_url("https://huggingface.co/").is_err());
        assert!(validate_checkpoint_url("https://huggingface.co/single-part").is_err());
        assert!(validate_checkpoint_url("http://huggingface.co/user/repo").is_err());
    }

    #[test]
    fn test_create_temp_download_dir_cleans_previous_contents() {
        let checkpoint_id = "test-ckpt-cleanup";

        let first = CheckpointDownloader::create_temp_download_dir(checkpoint_id).unwrap();
        let stale_file = first.join("stale.onnx");
        fs::write(&stale_file, b"stale").unwrap();

        let second = CheckpointDownloader::create_temp_download_dir(checkpoint_id).unwrap();
        assert!(second.exists());
        assert!(!stale_file.exists());

        let _ = fs::remove_dir_all(&second);
    }

    #[tokio::test]
    async fn test_downloader_with_explicit_cache_dir() {
        let temp = tempfile::tempdir().unwrap();
        let downloader = CheckpointDownloader::with_cache_dir(temp.path()).unwrap();
        assert!(downloader.cache().cache_dir().exists());
    }

    #[tokio::test]
    async fn test_download_rejects_bad_url() {
        let temp = tempfile::tempdir().unwrap();
        let downloader = CheckpointDownloader::with_cache_dir(temp.path()).unwrap();
        let err = downloader
            .download_checkpoint("https://example.com/models", false)
            .await
            .unwrap_err();
        assert!(matches!(err, PersonGenError::InvalidConfig(_)));
    }

    #[test]
    fn test_progress_indicator_no_op() {
        let progress = ProgressIndicator::NoOp;
        progress.set_message("test message".to_string());
        progress.set_length(100);
        progress.set_position(50);
        progress.finish_with_message("finished".to_string());
    }
}
