//! Load image files into the data URL form the recognizer accepts.

use crate::cache::Fingerprint;
use crate::config::LimitsConfig;
use crate::error::InputError;
use base64::Engine;
use std::path::{Path, PathBuf};

/// An image read from disk and encoded for submission.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub path: PathBuf,
    /// Sniffed MIME type, e.g. `image/png`
    pub media_type: &'static str,
    /// `data:<mime>;base64,<payload>`
    pub data_url: String,
}

impl LoadedImage {
    /// Content fingerprint, the same key the result cache uses.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.data_url)
    }
}

/// Reads and validates image files before they are submitted.
pub struct ImageLoader {
    limits: LimitsConfig,
}

impl ImageLoader {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Read `path`, check size and format, and encode it as a data URL.
    pub fn load(&self, path: &Path) -> Result<LoadedImage, InputError> {
        if !path.exists() {
            return Err(InputError::FileNotFound(path.to_path_buf()));
        }

        let io_err = |source| InputError::Io {
            path: path.to_path_buf(),
            source,
        };

        let size = std::fs::metadata(path).map_err(io_err)?.len();
        let max_bytes = self.limits.max_file_size_mb.saturating_mul(1024 * 1024);
        if size > max_bytes {
            return Err(InputError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: size / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let bytes = std::fs::read(path).map_err(io_err)?;
        let media_type = sniff_media_type(&bytes).map_err(|message| {
            InputError::UnsupportedFormat {
                path: path.to_path_buf(),
                message,
            }
        })?;

        tracing::debug!(path = %path.display(), media_type, size, "Loaded image");

        Ok(LoadedImage {
            path: path.to_path_buf(),
            media_type,
            data_url: encode_data_url(media_type, &bytes),
        })
    }
}

/// Identify the image format from its magic bytes.
fn sniff_media_type(bytes: &[u8]) -> Result<&'static str, String> {
    let format = image::guess_format(bytes).map_err(|e| e.to_string())?;
    match format {
        image::ImageFormat::Png
        | image::ImageFormat::Jpeg
        | image::ImageFormat::WebP
        | image::ImageFormat::Gif => Ok(format.to_mime_type()),
        other => Err(format!("{other:?} images are not accepted")),
    }
}

/// Encode bytes as a base64 data URL.
pub(crate) fn encode_data_url(media_type: &str, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{media_type};base64,{payload}")
}
