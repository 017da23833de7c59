//! EXIF stripping.
//!
//! Uploaded photos routinely carry camera metadata (GPS position included);
//! the pipeline strips it from the source before the commit-time encode.

use img_parts::{jpeg::Jpeg, png::Png, ImageEXIF};

/// Remove EXIF metadata from image data.
///
/// JPEG and PNG containers are rewritten without their EXIF segment; any
/// other format is returned unchanged (the subsequent re-encode drops
/// metadata anyway).
pub fn strip_exif(data: &[u8]) -> Vec<u8> {
    if let Ok(mut jpeg) = Jpeg::from_bytes(data.to_vec().into()) {
        jpeg.set_exif(None);
        return jpeg.encoder().bytes().to_vec();
    }

    if let Ok(mut png) = Png::from_bytes(data.to_vec().into()) {
        png.set_exif(None);
        return png.encoder().bytes().to_vec();
    }

    data.to_vec()
}
