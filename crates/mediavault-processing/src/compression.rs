//! Image compression engine.
//!
//! Takes a source image plus quality/dimension/format settings and produces a
//! re-encoded artifact. Requests and results are typed records that validate
//! their invariants at creation time: settings outside their ranges, empty
//! sources, and empty codec output are all hard failures, never coerced.

use std::io::Cursor;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

/// Compression errors
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("Invalid compression settings: {0}")]
    InvalidSettings(String),

    #[error("Source image is empty")]
    EmptySource,

    #[error("Failed to decode source image: {0}")]
    DecodeFailed(String),

    #[error("Failed to encode {format}: {reason}")]
    EncodeFailed {
        format: &'static str,
        reason: String,
    },
}

impl From<CompressionError> for mediavault_core::AppError {
    fn from(err: CompressionError) -> Self {
        match err {
            CompressionError::InvalidSettings(_) | CompressionError::EmptySource => {
                mediavault_core::AppError::InvalidInput(err.to_string())
            }
            other => mediavault_core::AppError::CompressionFailed(other.to_string()),
        }
    }
}

/// Output format for compressed images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    WebP,
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, CompressionError> {
        match s.to_lowercase().as_str() {
            "webp" => Ok(OutputFormat::WebP),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            _ => Err(CompressionError::InvalidSettings(format!(
                "invalid output format: {}",
                s
            ))),
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::WebP => "image/webp",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    /// File extension used in persisted keys.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::WebP => "webp",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
        }
    }
}

/// Validated compression parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    quality: u8,
    max_width: u32,
    max_height: u32,
    format: OutputFormat,
}

impl CompressionSettings {
    pub fn new(
        quality: u8,
        max_width: u32,
        max_height: u32,
        format: OutputFormat,
    ) -> Result<Self, CompressionError> {
        if !(1..=100).contains(&quality) {
            return Err(CompressionError::InvalidSettings(format!(
                "quality must be 1-100, got {}",
                quality
            )));
        }
        if max_width == 0 || max_height == 0 {
            return Err(CompressionError::InvalidSettings(
                "dimensions must be positive".to_string(),
            ));
        }
        Ok(CompressionSettings {
            quality,
            max_width,
            max_height,
            format,
        })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    pub fn max_height(&self) -> u32 {
        self.max_height
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

impl Default for CompressionSettings {
    /// WebP at quality 80, bounded to 1920x1080.
    fn default() -> Self {
        CompressionSettings {
            quality: 80,
            max_width: 1920,
            max_height: 1080,
            format: OutputFormat::WebP,
        }
    }
}

/// One compression attempt: source bytes plus settings. Created per upload
/// attempt and discarded once the artifact is persisted or the attempt is
/// cancelled.
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    source: Bytes,
    settings: CompressionSettings,
}

impl CompressionRequest {
    pub fn new(source: Bytes, settings: CompressionSettings) -> Result<Self, CompressionError> {
        if source.is_empty() {
            return Err(CompressionError::EmptySource);
        }
        Ok(CompressionRequest { source, settings })
    }

    pub fn source(&self) -> &Bytes {
        &self.source
    }

    pub fn settings(&self) -> CompressionSettings {
        self.settings
    }
}

/// The re-encoded artifact.
#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub data: Bytes,
    pub size_bytes: u64,
    pub original_size: u64,
    /// |size difference| / original size * 100; 0.0 when not finite.
    pub ratio_percent: f64,
    pub larger_than_source: bool,
}

impl CompressionResult {
    fn from_encoded(data: Bytes, original_size: u64) -> Result<Self, CompressionError> {
        if data.is_empty() {
            return Err(CompressionError::EncodeFailed {
                format: "output",
                reason: "codec produced no bytes".to_string(),
            });
        }
        let size_bytes = data.len() as u64;
        let ratio = if original_size == 0 {
            0.0
        } else {
            size_bytes.abs_diff(original_size) as f64 / original_size as f64 * 100.0
        };
        let ratio_percent = if ratio.is_finite() { ratio } else { 0.0 };
        Ok(CompressionResult {
            larger_than_source: size_bytes > original_size,
            data,
            size_bytes,
            original_size,
            ratio_percent,
        })
    }
}

/// Main compression service
pub struct ImageCompressor;

impl ImageCompressor {
    /// Compress a source image according to the request settings.
    ///
    /// The source is decoded, downscaled to fit within the configured bounds
    /// (aspect ratio preserved, never upscaled), and re-encoded in the
    /// requested format.
    pub fn compress(request: &CompressionRequest) -> Result<CompressionResult, CompressionError> {
        let settings = request.settings();
        let original_size = request.source().len() as u64;

        let cursor = Cursor::new(request.source().as_ref());
        let img = image::ImageReader::new(cursor)
            .with_guessed_format()
            .map_err(|e| CompressionError::DecodeFailed(e.to_string()))?
            .decode()
            .map_err(|e| CompressionError::DecodeFailed(e.to_string()))?;

        let (width, height) = img.dimensions();
        let img = if width > settings.max_width() || height > settings.max_height() {
            img.resize(
                settings.max_width(),
                settings.max_height(),
                FilterType::Lanczos3,
            )
        } else {
            img
        };

        let encoded = match settings.format() {
            OutputFormat::Jpeg => Self::encode_jpeg(&img, settings.quality())?,
            OutputFormat::WebP => Self::encode_webp(&img, settings.quality())?,
            OutputFormat::Png => Self::encode_png(&img)?,
        };

        let result = CompressionResult::from_encoded(encoded, original_size)?;

        tracing::debug!(
            format = settings.format().extension(),
            quality = settings.quality(),
            original_size = original_size,
            compressed_size = result.size_bytes,
            ratio_percent = result.ratio_percent,
            "Compression complete"
        );

        Ok(result)
    }

    /// Encode to JPEG using mozjpeg
    fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes, CompressionError> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality as f32);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp
            .start_compress(Vec::new())
            .map_err(|e| CompressionError::EncodeFailed {
                format: "jpeg",
                reason: e.to_string(),
            })?;
        comp.write_scanlines(&rgb_img)
            .map_err(|e| CompressionError::EncodeFailed {
                format: "jpeg",
                reason: e.to_string(),
            })?;
        let jpeg_data = comp
            .finish()
            .map_err(|e| CompressionError::EncodeFailed {
                format: "jpeg",
                reason: e.to_string(),
            })?;

        Ok(Bytes::from(jpeg_data))
    }

    /// Encode to WebP
    fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Bytes, CompressionError> {
        let (width, height) = img.dimensions();
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder.encode(quality as f32);

        Ok(Bytes::copy_from_slice(&webp_data))
    }

    /// Encode to PNG (lossless; the quality setting does not apply)
    fn encode_png(img: &DynamicImage) -> Result<Bytes, CompressionError> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        img.write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| CompressionError::EncodeFailed {
                format: "png",
                reason: e.to_string(),
            })?;

        Ok(Bytes::from(buffer))
    }
}
