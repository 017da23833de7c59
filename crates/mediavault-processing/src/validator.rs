use std::path::Path;

/// Validation errors for image files
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Not an image: {0}")]
    NotAnImage(String),

    #[error("Invalid file extension: {extension} (allowed: {allowed:?})")]
    InvalidExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    InvalidContentType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Empty file")]
    EmptyFile,
}

impl From<ValidationError> for mediavault_core::AppError {
    fn from(err: ValidationError) -> Self {
        mediavault_core::AppError::InvalidInput(err.to_string())
    }
}

/// Image file validator
///
/// Validates the candidate source file before any compression or storage
/// call, without coupling to either.
pub struct ImageValidator {
    max_file_size: usize,
    allowed_extensions: Vec<String>,
    allowed_content_types: Vec<String>,
}

impl ImageValidator {
    pub fn new(
        max_file_size: usize,
        allowed_extensions: Vec<String>,
        allowed_content_types: Vec<String>,
    ) -> Self {
        Self {
            max_file_size,
            allowed_extensions,
            allowed_content_types,
        }
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// The coarse MIME gate: anything that is not `image/*` is rejected
    /// before the allow-list is even consulted.
    pub fn validate_mime_prefix(&self, content_type: &str) -> Result<(), ValidationError> {
        if !content_type.to_lowercase().starts_with("image/") {
            return Err(ValidationError::NotAnImage(content_type.to_string()));
        }
        Ok(())
    }

    /// Validate file extension
    pub fn validate_extension(&self, filename: &str) -> Result<(), ValidationError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::InvalidExtension {
                extension,
                allowed: self.allowed_extensions.clone(),
            });
        }

        Ok(())
    }

    /// Validate content type against the allow-list
    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        let normalized = content_type.to_lowercase();

        if !self
            .allowed_content_types
            .iter()
            .any(|ct| ct == &normalized)
        {
            return Err(ValidationError::InvalidContentType {
                content_type: content_type.to_string(),
                allowed: self.allowed_content_types.clone(),
            });
        }

        Ok(())
    }

    /// Validate that Content-Type matches the file extension. This prevents
    /// Content-Type spoofing, where a non-image payload is uploaded with an
    /// image extension or vice versa.
    pub fn validate_extension_content_type_match(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<(), ValidationError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))?;

        let normalized_content_type = content_type.to_lowercase();

        let expected_content_types: Vec<&str> = match extension.as_str() {
            "jpg" | "jpeg" => vec!["image/jpeg"],
            "png" => vec!["image/png"],
            "gif" => vec!["image/gif"],
            "webp" => vec!["image/webp"],
            "bmp" => vec!["image/bmp"],
            "ico" => vec!["image/x-icon", "image/vnd.microsoft.icon"],
            _ => {
                // Unknown extensions skip cross-validation; extension and
                // content type are still validated individually.
                tracing::debug!(
                    extension = %extension,
                    content_type = %content_type,
                    "Unknown extension, skipping Content-Type/extension cross-validation"
                );
                return Ok(());
            }
        };

        if !expected_content_types
            .iter()
            .any(|ct| ct == &normalized_content_type)
        {
            return Err(ValidationError::InvalidContentType {
                content_type: format!(
                    "{} (does not match extension '{}'. Expected one of: {})",
                    content_type,
                    extension,
                    expected_content_types.join(", ")
                ),
                allowed: self.allowed_content_types.clone(),
            });
        }

        Ok(())
    }

    /// Validate all aspects of a candidate image file.
    pub fn validate_all(
        &self,
        filename: &str,
        content_type: &str,
        file_size: usize,
    ) -> Result<(), ValidationError> {
        self.validate_file_size(file_size)?;
        self.validate_mime_prefix(content_type)?;
        self.validate_extension(filename)?;
        self.validate_content_type(content_type)?;
        self.validate_extension_content_type_match(filename, content_type)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_validator() -> ImageValidator {
        ImageValidator::new(
            1024 * 1024, // 1MB
            vec!["jpg".to_string(), "png".to_string(), "webp".to_string()],
            vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
        )
    }

    #[test]
    fn test_validate_file_size_ok() {
        let validator = test_validator();
        assert!(validator.validate_file_size(512 * 1024).is_ok());
    }

    #[test]
    fn test_validate_file_size_too_large() {
        let validator = test_validator();
        assert!(validator.validate_file_size(2 * 1024 * 1024).is_err());
    }

    #[test]
    fn test_validate_file_size_empty() {
        let validator = test_validator();
        assert!(matches!(
            validator.validate_file_size(0),
            Err(ValidationError::EmptyFile)
        ));
    }

    #[test]
    fn test_validate_mime_prefix() {
        let validator = test_validator();
        assert!(validator.validate_mime_prefix("image/png").is_ok());
        assert!(validator.validate_mime_prefix("IMAGE/WEBP").is_ok());
        assert!(matches!(
            validator.validate_mime_prefix("application/pdf"),
            Err(ValidationError::NotAnImage(_))
        ));
        assert!(validator.validate_mime_prefix("video/mp4").is_err());
    }

    #[test]
    fn test_validate_extension() {
        let validator = test_validator();
        assert!(validator.validate_extension("test.jpg").is_ok());
        assert!(validator.validate_extension("test.PNG").is_ok()); // case insensitive
        assert!(validator.validate_extension("test.gif").is_err());
        assert!(validator.validate_extension("noextension").is_err());
    }

    #[test]
    fn test_validate_content_type() {
        let validator = test_validator();
        assert!(validator.validate_content_type("image/jpeg").is_ok());
        assert!(validator.validate_content_type("IMAGE/PNG").is_ok()); // case insensitive
        assert!(validator.validate_content_type("image/gif").is_err());
    }

    #[test]
    fn test_extension_content_type_match() {
        let validator = test_validator();
        assert!(validator
            .validate_extension_content_type_match("test.jpg", "image/jpeg")
            .is_ok());
        assert!(validator
            .validate_extension_content_type_match("test.webp", "image/webp")
            .is_ok());
        assert!(validator
            .validate_extension_content_type_match("test.jpg", "image/png")
            .is_err());
        assert!(validator
            .validate_extension_content_type_match("test.JPG", "IMAGE/JPEG")
            .is_ok());
    }

    #[test]
    fn test_extension_content_type_match_unknown_extension() {
        let validator = test_validator();
        assert!(validator
            .validate_extension_content_type_match("test.xyz", "application/xyz")
            .is_ok());
    }

    #[test]
    fn test_validate_all() {
        let validator = test_validator();
        assert!(validator
            .validate_all("photo.jpg", "image/jpeg", 512 * 1024)
            .is_ok());
        assert!(validator
            .validate_all("photo.jpg", "image/jpeg", 2 * 1024 * 1024)
            .is_err());
        assert!(validator
            .validate_all("notes.pdf", "application/pdf", 1024)
            .is_err());
    }
}
