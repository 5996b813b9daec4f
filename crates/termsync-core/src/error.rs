//! Error types for termsync.

use thiserror::Error;

/// Result type alias using termsync's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for termsync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Store read or write failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An edge references a node identifier absent from the graph index
    #[error("Graph lookup error: no concept with URI {uri} (referenced from {referenced_from})")]
    GraphLookup { uri: String, referenced_from: String },

    /// The narrower walk exceeded the level ceiling (likely a cycle)
    #[error("Walk from {subroot} exceeded {max_depth} levels")]
    WalkDepthExceeded { subroot: String, max_depth: usize },

    /// A discovered concept is missing (or has an unreadable) required attribute
    #[error("Malformed record {uri}: {field} {reason}")]
    MalformedRecord {
        uri: String,
        field: &'static str,
        reason: String,
    },

    /// Retrieving a vocabulary document failed
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Vocabulary document could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a record missing a required attribute.
    pub fn missing_field(uri: impl Into<String>, field: &'static str) -> Self {
        Error::MalformedRecord {
            uri: uri.into(),
            field,
            reason: "is missing".to_string(),
        }
    }

    /// True for failures that only abort the current collection.
    pub fn is_collection_scoped(&self) -> bool {
        matches!(
            self,
            Error::GraphLookup { .. }
                | Error::WalkDepthExceeded { .. }
                | Error::MalformedRecord { .. }
                | Error::Fetch(_)
                | Error::Parse(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Fetch(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_graph_lookup() {
        let err = Error::GraphLookup {
            uri: "http://x/B".to_string(),
            referenced_from: "http://x/A".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Graph lookup error: no concept with URI http://x/B (referenced from http://x/A)"
        );
    }

    #[test]
    fn test_error_display_missing_field() {
        let err = Error::missing_field("http://x/A", "prefLabel");
        assert_eq!(err.to_string(), "Malformed record http://x/A: prefLabel is missing");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("missing DATABASE_URL".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing DATABASE_URL");
    }

    #[test]
    fn test_collection_scoped_classification() {
        assert!(Error::Fetch("404".to_string()).is_collection_scoped());
        assert!(Error::Parse("eof".to_string()).is_collection_scoped());
        assert!(Error::missing_field("u", "modified").is_collection_scoped());
        assert!(!Error::Database(sqlx::Error::PoolClosed).is_collection_scoped());
        assert!(!Error::Config("x".to_string()).is_collection_scoped());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(err.to_string().contains("Serialization error:"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("I/O error:"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
