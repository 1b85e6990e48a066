//! File discovery for finding handwriting images in directories.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions the recognizer accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

/// Discovers image files in directories.
#[derive(Debug, Default)]
pub struct ImageDiscovery;

/// Information about a discovered image.
#[derive(Debug, Clone)]
pub struct DiscoveredImage {
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl ImageDiscovery {
    pub fn new() -> Self {
        Self
    }

    /// Discover all supported image files at a path.
    ///
    /// If path is a file, returns it if supported.
    /// If path is a directory, recursively finds all supported files.
    pub fn discover(&self, path: &Path) -> Vec<DiscoveredImage> {
        if path.is_file() {
            return match std::fs::metadata(path) {
                Ok(meta) if Self::is_supported(path) => vec![DiscoveredImage {
                    path: path.to_path_buf(),
                    size: meta.len(),
                }],
                _ => vec![],
            };
        }

        let mut images: Vec<DiscoveredImage> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && Self::is_supported(e.path()))
            .filter_map(|e| {
                let size = e.metadata().ok()?.len();
                Some(DiscoveredImage {
                    path: e.into_path(),
                    size,
                })
            })
            .collect();

        // Deterministic submission order
        images.sort_by(|a, b| a.path.cmp(&b.path));
        images
    }

    /// Check if a file has a supported extension.
    pub fn is_supported(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                SUPPORTED_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }
}
