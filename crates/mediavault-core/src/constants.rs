//! Shared constants for Mediavault.

/// Leaf segment of every tenant sandbox: `users/{user_id}/public_images`.
pub const SANDBOX_SEGMENT: &str = "public_images";

/// Zero-byte marker object that makes an empty folder visible to listings.
pub const FOLDER_MARKER: &str = ".keep";

/// Default ceiling on a single source upload (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default per-user storage quota in megabytes.
pub const DEFAULT_QUOTA_MB: u64 = 100;

/// Fraction of the source size used as the candidate size for the
/// pre-compression quota estimate. The real compressed size is checked
/// again after compression.
pub const PRE_COMPRESSION_ESTIMATE: f64 = 0.8;

/// Maximum length of a folder name.
pub const MAX_FOLDER_NAME_LEN: usize = 50;

/// Maximum length of a file name.
pub const MAX_FILE_NAME_LEN: usize = 100;
