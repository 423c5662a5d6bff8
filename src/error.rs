//! Error type shared by the generators, summarizers and persistence helpers.

use std::path::PathBuf;

/// Errors raised by this crate.
///
/// Generators validate their parameters up front and report violations as
/// [`Error::InvalidParameter`]. Everything else wraps the failure of the
/// collaborator that produced it (filesystem, CSV/JSON codecs, a sampler backend).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("unknown parameter `{0}` in fit summary")]
    UnknownParameter(String),

    #[error("cannot parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("sampler backend failed: {0}")]
    Sampler(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
