//! Input validation for caller-supplied names and paths.
//!
//! Pathname validation is the sole defense against traversal into
//! storage keys outside a bucket's namespace, so it runs before any
//! key is constructed.

use garde::Validate;

use crate::errors::StorageError;

/// Validate a caller-supplied object pathname.
///
/// Rejects empty paths, absolute paths, and any occurrence of `..`
/// (the whole byte sequence, not just a path segment).
pub fn validate_pathname(pathname: &str) -> Result<(), StorageError> {
    if pathname.is_empty() {
        return Err(StorageError::InvalidPathname {
            pathname: pathname.to_string(),
            reason: "pathname cannot be empty".to_string(),
        });
    }

    if pathname.starts_with('/') {
        return Err(StorageError::InvalidPathname {
            pathname: pathname.to_string(),
            reason: "pathname cannot start with '/'".to_string(),
        });
    }

    if pathname.contains("..") {
        return Err(StorageError::InvalidPathname {
            pathname: pathname.to_string(),
            reason: "pathname cannot contain '..'".to_string(),
        });
    }

    Ok(())
}

/// Validation struct for logical bucket names.
#[derive(Debug, Validate)]
pub struct BucketNameInput {
    /// Bucket name: 1-64 characters of lowercase alphanumerics, dots,
    /// underscores, and hyphens.
    #[garde(length(min = 1, max = 64), pattern(r"^[a-z0-9._\-]+$"))]
    pub bucket_name: String,
}

/// Validate a logical bucket name for registration.
pub fn validate_bucket_name(name: &str) -> Result<(), StorageError> {
    let input = BucketNameInput {
        bucket_name: name.to_string(),
    };
    input.validate().map_err(|report| StorageError::InvalidConfig {
        reason: format!("invalid bucket name '{name}': {report}"),
    })
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pathname_rejected() {
        let err = validate_pathname("").unwrap_err();
        assert_eq!(err.code(), "INVALID_PATHNAME");
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_leading_slash_rejected() {
        let err = validate_pathname("/x").unwrap_err();
        assert_eq!(err.code(), "INVALID_PATHNAME");
        assert!(err.to_string().contains("start with"));
    }

    #[test]
    fn test_traversal_rejected() {
        let err = validate_pathname("a/../b").unwrap_err();
        assert_eq!(err.code(), "INVALID_PATHNAME");
        assert!(err.to_string().contains(".."));
    }

    #[test]
    fn test_bare_dotdot_rejected() {
        // Any occurrence of the two-byte sequence is rejected, even
        // outside a path segment.
        assert!(validate_pathname("weird..name.txt").is_err());
    }

    #[test]
    fn test_valid_pathnames() {
        assert!(validate_pathname("a/b.txt").is_ok());
        assert!(validate_pathname("file.txt").is_ok());
        assert!(validate_pathname("deep/nested/path/object.bin").is_ok());
        assert!(validate_pathname("dotfile.hidden").is_ok());
    }

    #[test]
    fn test_bucket_name_valid() {
        assert!(validate_bucket_name("uploads").is_ok());
        assert!(validate_bucket_name("my-bucket.2").is_ok());
        assert!(validate_bucket_name("a").is_ok());
    }

    #[test]
    fn test_bucket_name_invalid() {
        assert!(validate_bucket_name("").is_err());
        assert!(validate_bucket_name("UPPER").is_err());
        assert!(validate_bucket_name("has space").is_err());
        assert!(validate_bucket_name(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_bucket_name_error_kind() {
        let err = validate_bucket_name("BAD NAME").unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");
    }
}
