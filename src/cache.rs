//! Checkpoint cache management for downloaded model repositories
//!
//! Cached checkpoints live in an XDG-compliant directory structure. This
//! module handles cache directory creation, checkpoint scanning for the
//! --list-checkpoints functionality, and checkpoint ID generation from URLs.

use crate::error::{PersonGenError, Result};
use crate::models::REQUIRED_CHECKPOINT_FILES;
use std::fs;
use std::path::{Path, PathBuf};

/// Information about a cached checkpoint repository
#[derive(Debug, Clone)]
pub struct CachedCheckpointInfo {
    /// Checkpoint identifier (derived from URL)
    pub checkpoint_id: String,
    /// Path to the cached checkpoint directory
    pub path: PathBuf,
    /// Whether every required model file is present
    pub complete: bool,
    /// Estimated size of the checkpoint directory in bytes
    pub size_bytes: u64,
}

/// Checkpoint cache manager
#[derive(Debug)]
pub struct CheckpointCache {
    cache_dir: PathBuf,
}

impl CheckpointCache {
    /// Create a new checkpoint cache manager
    ///
    /// Uses XDG Base Directory specification for cache location:
    /// - Linux/macOS: `~/.cache/persongen/checkpoints/`
    /// - Windows: `%LOCALAPPDATA%/persongen/checkpoints/`
    ///
    /// # Errors
    /// - Failed to determine cache directory
    /// - Failed to create cache directory
    pub fn new() -> Result<Self> {
        let cache_dir = Self::get_cache_dir()?;

        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|e| {
                PersonGenError::file_io_error("create cache directory", &cache_dir, &e)
            })?;
        }

        Ok(Self { cache_dir })
    }

    /// Create a cache manager rooted at an explicit directory
    ///
    /// # Errors
    /// - Failed to create the directory
    pub fn with_dir<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let cache_dir = dir.into().join("checkpoints");
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|e| {
                PersonGenError::file_io_error("create cache directory", &cache_dir, &e)
            })?;
        }
        Ok(Self { cache_dir })
    }

    /// Get the XDG-compliant cache directory path
    fn get_cache_dir() -> Result<PathBuf> {
        // Environment variable override first
        if let Ok(cache_override) = std::env::var("PERSONGEN_CACHE_DIR") {
            return Ok(PathBuf::from(cache_override).join("checkpoints"));
        }

        Ok(dirs::cache_dir()
            .ok_or_else(|| {
                PersonGenError::invalid_config(
                    "Failed to determine cache directory. Set PERSONGEN_CACHE_DIR environment variable.",
                )
            })?
            .join("persongen")
            .join("checkpoints"))
    }

    /// Generate a checkpoint ID from a URL
    ///
    /// Converts URLs like "<https://huggingface.co/acme/person-gen-onnx>"
    /// to cache-safe identifiers like "acme--person-gen-onnx".
    #[must_use]
    pub fn url_to_checkpoint_id(url: &str) -> String {
        let prefix = "https://huggingface.co/";
        if url.starts_with(prefix) {
            // Replace '/' with '--' to create a filesystem-safe identifier
            url.get(prefix.len()..).unwrap_or(url).replace('/', "--")
        } else {
            // For non-HuggingFace URLs, use a hash-based identifier
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(url.as_bytes());
            let hash_string = format!("url-{:x}", hasher.finalize());
            hash_string.get(..16).unwrap_or(&hash_string).to_string()
        }
    }

    /// Check if a checkpoint is cached and complete
    #[must_use]
    pub fn is_checkpoint_cached(&self, checkpoint_id: &str) -> bool {
        let path = self.cache_dir.join(checkpoint_id);
        path.exists() && Self::validate_checkpoint_directory(&path)
    }

    /// Get the path to a cached checkpoint directory (may not exist)
    #[must_use]
    pub fn get_checkpoint_path(&self, checkpoint_id: &str) -> PathBuf {
        self.cache_dir.join(checkpoint_id)
    }

    /// Current cache directory
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Scan the cache directory and return all available checkpoints
    ///
    /// # Errors
    /// - Failed to read the cache directory or its entries
    pub fn scan_cached_checkpoints(&self) -> Result<Vec<CachedCheckpointInfo>> {
        let mut checkpoints = Vec::new();

        if !self.cache_dir.exists() {
            return Ok(checkpoints); // Empty cache
        }

        let entries = fs::read_dir(&self.cache_dir).map_err(|e| {
            PersonGenError::file_io_error("read cache directory", &self.cache_dir, &e)
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                PersonGenError::file_io_error("read cache directory entry", &self.cache_dir, &e)
            })?;

            let path = entry.path();
            if path.is_dir() {
                let checkpoint_id = path
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string();
                checkpoints.push(CachedCheckpointInfo {
                    complete: Self::validate_checkpoint_directory(&path),
                    size_bytes: Self::directory_size(&path),
                    checkpoint_id,
                    path,
                });
            }
        }

        // Sort by checkpoint ID for consistent output
        checkpoints.sort_by(|a, b| a.checkpoint_id.cmp(&b.checkpoint_id));
        Ok(checkpoints)
    }

    /// Remove a cached checkpoint
    ///
    /// # Errors
    /// - Checkpoint not found in cache
    /// - Failed to remove the checkpoint directory
    pub fn remove_checkpoint(&self, checkpoint_id: &str) -> Result<()> {
        let path = self.cache_dir.join(checkpoint_id);
        if !path.exists() {
            return Err(PersonGenError::invalid_config(format!(
                "Checkpoint '{}' is not cached",
                checkpoint_id
            )));
        }
        fs::remove_dir_all(&path)
            .map_err(|e| PersonGenError::file_io_error("remove checkpoint", &path, &e))?;
        Ok(())
    }

    /// Remove all cached checkpoints
    ///
    /// # Errors
    /// - Failed to remove a checkpoint directory
    pub fn clear_all(&self) -> Result<usize> {
        let checkpoints = self.scan_cached_checkpoints()?;
        let count = checkpoints.len();
        for info in checkpoints {
            fs::remove_dir_all(&info.path)
                .map_err(|e| PersonGenError::file_io_error("remove checkpoint", &info.path, &e))?;
        }
        Ok(count)
    }

    /// Validate that a checkpoint directory contains every required model file
    fn validate_checkpoint_directory(path: &Path) -> bool {
        REQUIRED_CHECKPOINT_FILES
            .iter()
            .all(|file| path.join(file).is_file())
    }

    /// Sum of file sizes under a directory (top level only)
    fn directory_size(path: &Path) -> u64 {
        fs::read_dir(path)
            .map(|entries| {
                entries
                    .flatten()
                    .filter_map(|e| e.metadata().ok())
                    .filter(|m| m.is_file())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0)
    }
}

/// Format a byte count for human-readable display
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.2} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}
