//! Name validation for files and folders.
//!
//! These checks run before any network call. Folder and file names have
//! different length budgets and character sets; both forbid path separators.

use std::sync::OnceLock;

use regex::Regex;

use crate::constants::{MAX_FILE_NAME_LEN, MAX_FOLDER_NAME_LEN};
use crate::error::AppError;

fn folder_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("folder name pattern"))
}

fn file_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("file name pattern"))
}

/// Validate a folder name: 1-50 chars, `[A-Za-z0-9_-]` only, no leading or
/// trailing dot, no path separators.
pub fn validate_folder_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() || name.len() > MAX_FOLDER_NAME_LEN {
        return Err(AppError::InvalidInput(format!(
            "folder name must be 1-{} characters",
            MAX_FOLDER_NAME_LEN
        )));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(AppError::InvalidInput(
            "folder name must not contain path separators".to_string(),
        ));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(AppError::InvalidInput(
            "folder name must not start or end with a dot".to_string(),
        ));
    }
    if !folder_name_pattern().is_match(name) {
        return Err(AppError::InvalidInput(format!(
            "folder name {:?} contains invalid characters (allowed: letters, digits, _ and -)",
            name
        )));
    }
    Ok(())
}

/// Validate a file name: 1-100 chars, `[A-Za-z0-9_.-]` only, no path
/// separators.
pub fn validate_file_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() || name.len() > MAX_FILE_NAME_LEN {
        return Err(AppError::InvalidInput(format!(
            "file name must be 1-{} characters",
            MAX_FILE_NAME_LEN
        )));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(AppError::InvalidInput(
            "file name must not contain path separators".to_string(),
        ));
    }
    if !file_name_pattern().is_match(name) {
        return Err(AppError::InvalidInput(format!(
            "file name {:?} contains invalid characters (allowed: letters, digits, _ . and -)",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_folder_names() {
        assert!(validate_folder_name("my-folder_2").is_ok());
        assert!(validate_folder_name("A").is_ok());
        assert!(validate_folder_name(&"a".repeat(50)).is_ok());
    }

    #[test]
    fn test_folder_name_with_space_rejected() {
        assert!(validate_folder_name("My Folder").is_err());
    }

    #[test]
    fn test_folder_name_too_long_rejected() {
        assert!(validate_folder_name(&"a".repeat(51)).is_err());
    }

    #[test]
    fn test_hidden_folder_name_rejected() {
        assert!(validate_folder_name(".hidden").is_err());
        assert!(validate_folder_name("trailing.").is_err());
    }

    #[test]
    fn test_folder_name_with_separator_rejected() {
        assert!(validate_folder_name("a/b").is_err());
        assert!(validate_folder_name("a\\b").is_err());
        assert!(validate_folder_name("").is_err());
    }

    #[test]
    fn test_valid_file_names() {
        assert!(validate_file_name("cat-2024.webp").is_ok());
        assert!(validate_file_name("a_b.c").is_ok());
        assert!(validate_file_name(&"a".repeat(100)).is_ok());
    }

    #[test]
    fn test_invalid_file_names() {
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name(&"a".repeat(101)).is_err());
        assert!(validate_file_name("a b.png").is_err());
        assert!(validate_file_name("a/b.png").is_err());
        assert!(validate_file_name("a\\b.png").is_err());
    }
}
