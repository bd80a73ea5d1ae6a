//! Image normalization: decode, center-crop to the target size, re-encode as JPEG, persist.

use crate::error::AppError;
use crate::upload::naming::image_filename;
use async_trait::async_trait;
use axum::body::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::path::PathBuf;

pub const JPEG_QUALITY: u8 = 90;

/// One uploaded file to normalize for an image field.
#[derive(Clone, Debug)]
pub struct ImageJob {
    /// Resource kind; prefixes the stored filename.
    pub kind: String,
    /// Subdirectory of the upload root.
    pub collection: String,
    pub width: u32,
    pub height: u32,
    pub suffix: Option<String>,
    pub bytes: Bytes,
}

#[async_trait]
pub trait ImageProcessor: Send + Sync {
    /// Normalize and store one image. Returns the stored filename.
    async fn normalize(&self, job: ImageJob) -> Result<String, AppError>;
}

/// Production processor backed by the `image` crate; writes under `upload_dir/{collection}`.
pub struct RustImageProcessor {
    upload_dir: PathBuf,
}

impl RustImageProcessor {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        RustImageProcessor {
            upload_dir: upload_dir.into(),
        }
    }
}

#[async_trait]
impl ImageProcessor for RustImageProcessor {
    async fn normalize(&self, job: ImageJob) -> Result<String, AppError> {
        let filename = image_filename(&job.kind, job.suffix.as_deref());
        let (width, height) = (job.width, job.height);
        let bytes = job.bytes;
        let encoded = tokio::task::spawn_blocking(move || encode_jpeg(&bytes, width, height))
            .await
            .map_err(|e| AppError::Internal(format!("image task: {}", e)))??;

        let dir = self.upload_dir.join(&job.collection);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Image(format!("{}: {}", dir.display(), e)))?;
        let path = dir.join(&filename);
        tokio::fs::write(&path, encoded)
            .await
            .map_err(|e| AppError::Image(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), width, height, "image stored");
        Ok(filename)
    }
}

/// Decode any supported format, fill `width`x`height` (crop to center), encode RGB JPEG.
pub fn encode_jpeg(bytes: &[u8], width: u32, height: u32) -> Result<Vec<u8>, AppError> {
    let img = image::load_from_memory(bytes).map_err(|e| AppError::BadRequest(format!("unreadable image: {}", e)))?;
    let resized = img.resize_to_fill(width, height, FilterType::Lanczos3).to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&resized)
        .map_err(|e| AppError::Image(e.to_string()))?;
    Ok(out)
}
