//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use uuid::Uuid;

use mediavault_services::{Config, MemoryStorage, UploadOrchestrator};

/// A solid-color PNG.
pub fn solid_png(width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_pixel(width, height, Rgb([180, 90, 45]));
    encode_png(DynamicImage::ImageRgb8(img))
}

/// A deterministic noise PNG; close to incompressible, so lossy re-encoding
/// reliably shrinks it.
pub fn noisy_png(width: u32, height: u32) -> Bytes {
    encode_png(noise_image(width, height))
}

/// Deterministic noise encoded as a heavily quantized JPEG: a small source
/// whose lossless PNG re-encode is reliably larger.
pub fn noisy_jpeg(width: u32, height: u32) -> Bytes {
    let img = noise_image(width, height);
    let mut buffer = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, 5);
    img.write_with_encoder(encoder).expect("jpeg encode");
    Bytes::from(buffer)
}

fn noise_image(width: u32, height: u32) -> DynamicImage {
    // Small LCG so the pixels are reproducible across runs.
    let mut state: u32 = 0x1234_5678;
    let mut next = move || {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (state >> 24) as u8
    };
    let mut img = RgbImage::new(width, height);
    for pixel in img.pixels_mut() {
        *pixel = Rgb([next(), next(), next()]);
    }
    DynamicImage::ImageRgb8(img)
}

fn encode_png(img: DynamicImage) -> Bytes {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    img.write_to(&mut cursor, ImageFormat::Png).expect("png encode");
    Bytes::from(buffer)
}

pub fn orchestrator_over(
    storage: Arc<MemoryStorage>,
    user_id: Uuid,
    limit_bytes: u64,
) -> UploadOrchestrator {
    UploadOrchestrator::new(storage, user_id, limit_bytes, &Config::default())
}

/// Backend write calls recorded by the memory storage.
pub async fn put_ops(storage: &MemoryStorage) -> Vec<String> {
    storage
        .ops()
        .await
        .into_iter()
        .filter(|op| op.starts_with("put ") || op.starts_with("copy ") || op.starts_with("delete "))
        .collect()
}
