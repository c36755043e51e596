//! Error types for the BookFusion uploader

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::upload::Phase;

/// Maximum number of response body characters kept in an error
pub const BODY_EXCERPT_LIMIT: usize = 500;

/// Library-wide result type
pub type Result<T> = std::result::Result<T, UploadError>;

/// Upload error type
#[derive(Error, Debug)]
pub enum UploadError {
    /// A local file (document, cover, key file) could not be read
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A phase response did not meet its success criteria
    #[error("{phase} failed ({reason}): HTTP {status} - {body}")]
    Protocol {
        phase: Phase,
        status: u16,
        reason: String,
        body: String,
    },

    /// The transport could not complete the exchange
    #[error("{phase} request failed: {message}")]
    Transport { phase: Phase, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The document path does not end in a file name
    #[error("Not a document path: {}", .0.display())]
    InvalidDocument(PathBuf),

    #[error("Metadata parse error: {0}")]
    MetadataParse(String),

    /// A session operation was invoked out of sequence
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

impl UploadError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn protocol(phase: Phase, status: u16, reason: impl Into<String>, body: &str) -> Self {
        Self::Protocol {
            phase,
            status,
            reason: reason.into(),
            body: excerpt(body),
        }
    }

    /// The phase this error is attributed to, if any
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Protocol { phase, .. } | Self::Transport { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

impl From<quick_xml::de::DeError> for UploadError {
    fn from(err: quick_xml::de::DeError) -> Self {
        Self::MetadataParse(err.to_string())
    }
}

/// Truncate a response body to [`BODY_EXCERPT_LIMIT`] characters
pub fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_LIMIT).collect()
}
