//! Error types for UID and cache operations
//!
//! Lookups that simply find nothing are not errors here: resolution misses are
//! reported as `None`, and producer failures keep the producer's own error type.
//! This enum covers the remaining, genuinely exceptional conditions.

use thiserror::Error;

/// Main error type for the uidcache library
#[derive(Error, Debug)]
pub enum UidCacheError {
    /// A string did not match the 10-character lowercase hex UID format
    #[error("Invalid UID {value:?}: expected 10 lowercase hexadecimal characters")]
    InvalidUid { value: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Every freshly generated UID collided with one already present in the scope
    #[error("Could not generate a free UID in scope {scope} after {attempts} attempts")]
    UidSpaceExhausted { scope: String, attempts: usize },

    /// A cache with this name is already registered
    #[error("Cache already registered: {0}")]
    DuplicateCacheName(String),

    /// A cache with this name exists but stores different key/value types
    #[error("Cache {0} is registered with different key or value types")]
    CacheTypeMismatch(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for uidcache operations
pub type Result<T> = std::result::Result<T, UidCacheError>;

impl From<String> for UidCacheError {
    fn from(s: String) -> Self {
        UidCacheError::Other(s)
    }
}

impl From<&str> for UidCacheError {
    fn from(s: &str) -> Self {
        UidCacheError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = UidCacheError::InvalidUid {
            value: "XYZ".to_string(),
        };
        assert!(error.to_string().contains("\"XYZ\""));

        let exhausted = UidCacheError::UidSpaceExhausted {
            scope: "Material".to_string(),
            attempts: 8,
        };
        assert!(exhausted.to_string().contains("after 8 attempts"));

        let duplicate = UidCacheError::DuplicateCacheName("channels".to_string());
        assert_eq!(duplicate.to_string(), "Cache already registered: channels");
    }

    #[test]
    fn test_error_conversion() {
        let error: UidCacheError = "test error".into();
        assert!(matches!(error, UidCacheError::Other(_)));

        let error: UidCacheError = "test error".to_string().into();
        assert!(matches!(error, UidCacheError::Other(_)));
    }
}
