//! Error types for the merge core.

use thiserror::Error;

/// All possible errors from conflict resolution and merging.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("no custom resolver registered for field: {0}")]
    MissingCustomResolver(String),

    #[error("custom resolver failed at '{field}': {message}")]
    CustomResolverFailed { field: String, message: String },

    #[error("unresolvable conflict for key '{key}': {reason}")]
    Unresolvable { key: String, reason: String },
}

impl Error {
    /// Shorthand for a custom-resolver failure at a field path.
    pub fn custom_failed(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::CustomResolverFailed {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type for merge operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::MissingCustomResolver("stats.count".into());
        assert_eq!(
            err.to_string(),
            "no custom resolver registered for field: stats.count"
        );

        let err = Error::custom_failed("meta", "boom");
        assert_eq!(err.to_string(), "custom resolver failed at 'meta': boom");
    }
}
