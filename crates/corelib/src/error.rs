//! Engine error taxonomy (renderer-agnostic).

use std::path::PathBuf;

use thiserror::Error;

/// Failure of one of the handshake primitives.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The wait deadline passed before the event was signaled.
    #[error("timed out waiting for the event to be signaled")]
    TimedOut,
    /// The other side of the handshake is gone.
    #[error("the event was closed by its peer")]
    Closed,
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// A wait or signal on the frame handshake failed. Fatal to the loop that observed it.
    #[error("synchronization failure while {during}: {source}")]
    Sync {
        during: &'static str,
        #[source]
        source: SyncError,
    },

    #[error("out of memory: couldn't allocate {what}")]
    OutOfMemory { what: String },

    #[error("invalid file {}: {reason}", path.display())]
    InvalidFile { path: PathBuf, reason: String },

    /// Resource creation failed inside the graphics backend.
    #[error("graphics backend failed to {action}: {detail}")]
    Backend { action: String, detail: String },

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a render command requires a mesh")]
    MissingMesh,
}

impl EngineError {
    pub fn invalid_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn backend(action: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Backend {
            action: action.into(),
            detail: detail.into(),
        }
    }

    /// `true` for the failure kinds that must end the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Sync { .. } | Self::OutOfMemory { .. })
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
