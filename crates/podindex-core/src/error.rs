//! Error types for podindex.
//!
//! Every failure is a typed variant; nothing is swallowed or replaced with a
//! sentinel value. The CLI maps variants to exit codes via
//! [`PodindexError::exit_code`].

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the podindex library.
#[derive(Debug, Error)]
pub enum PodindexError {
    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Fields {requested:?} are not a subset of the indexed fields {configured:?}")]
    FieldSubset {
        requested: Vec<String>,
        configured: Vec<String>,
    },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Store state errors
    #[error("Schema error: {message}")]
    Schema { message: String },

    #[error("Index already exists: {index}")]
    IndexAlreadyExists { index: String },

    #[error("Index population aborted: {message}")]
    PopulateAborted { message: String },

    #[error("Search cursor already consumed; re-issue the query")]
    CursorConsumed,

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Collaborator errors
    #[error("Transfer failed for {url}: status {status}")]
    Transfer { url: String, status: u16 },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Member {member} not found in archive {archive}")]
    MemberNotFound { archive: PathBuf, member: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

/// Result type alias for podindex operations.
pub type Result<T> = std::result::Result<T, PodindexError>;

impl From<std::io::Error> for PodindexError {
    fn from(err: std::io::Error) -> Self {
        PodindexError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for PodindexError {
    fn from(err: serde_json::Error) -> Self {
        PodindexError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for PodindexError {
    fn from(err: rusqlite::Error) -> Self {
        PodindexError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for PodindexError {
    fn from(err: reqwest::Error) -> Self {
        PodindexError::Network {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl PodindexError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        PodindexError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        PodindexError::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        PodindexError::Schema {
            message: message.into(),
        }
    }

    /// Map to a process exit code.
    ///
    /// - 2: caller input (configuration, field subset, validation)
    /// - 3: store not in the expected state (schema, index exists)
    /// - 4: external collaborators (transfer, network, archive member)
    /// - 1: everything else
    pub fn exit_code(&self) -> i32 {
        match self {
            PodindexError::Configuration { .. }
            | PodindexError::FieldSubset { .. }
            | PodindexError::Validation { .. } => 2,

            PodindexError::Schema { .. } | PodindexError::IndexAlreadyExists { .. } => 3,

            PodindexError::Transfer { .. }
            | PodindexError::Network { .. }
            | PodindexError::MemberNotFound { .. } => 4,

            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PodindexError::IndexAlreadyExists {
            index: "podcasts_fts".into(),
        };
        assert_eq!(err.to_string(), "Index already exists: podcasts_fts");

        let err = PodindexError::Transfer {
            url: "https://example.com/a.tgz".into(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "Transfer failed for https://example.com/a.tgz: status 404"
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(PodindexError::config("bad").exit_code(), 2);
        assert_eq!(
            PodindexError::FieldSubset {
                requested: vec!["author".into()],
                configured: vec!["title".into()],
            }
            .exit_code(),
            2
        );
        assert_eq!(PodindexError::schema("missing").exit_code(), 3);
        assert_eq!(
            PodindexError::MemberNotFound {
                archive: PathBuf::from("a.tgz"),
                member: "x.db".into(),
            }
            .exit_code(),
            4
        );
        assert_eq!(PodindexError::CursorConsumed.exit_code(), 1);
    }

    #[test]
    fn test_rusqlite_conversion() {
        let err: PodindexError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, PodindexError::Database { source: Some(_), .. }));
    }
}
