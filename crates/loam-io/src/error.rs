use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt save file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
    #[error("malformed world metadata {path}: {source}")]
    Meta {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PersistError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the file exists but could not be decoded.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, PersistError::Corrupt { .. } | PersistError::Meta { .. })
    }
}
