//! Mediavault Processing Library
//!
//! Image validation and re-encoding for the upload pipeline: the compression
//! engine (decode, bounded resize, webp/jpeg/png encode), the image file
//! validator, and EXIF stripping.

pub mod compression;
pub mod exif;
pub mod validator;

// Re-export commonly used types
pub use compression::{
    CompressionError, CompressionRequest, CompressionResult, CompressionSettings, ImageCompressor,
    OutputFormat,
};
pub use exif::strip_exif;
pub use validator::{ImageValidator, ValidationError};
