//! Error taxonomy for a pipeline run.
//!
//! Every fallible step surfaces one of four kinds. [`PipelineError::kind`]
//! gives callers a fieldless discriminant to branch on (the CLI maps it to
//! an exit code).

use std::path::PathBuf;

use thiserror::Error;

use crate::gateway::GatewayError;

/// Fieldless discriminant of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TransportFailure,
    MalformedPayload,
    FilesystemFailure,
    UnsafePath,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TransportFailure => "transport_failure",
            Self::MalformedPayload => "malformed_payload",
            Self::FilesystemFailure => "filesystem_failure",
            Self::UnsafePath => "unsafe_path",
        };
        f.write_str(s)
    }
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The remote model call failed (network, auth, rate limit, bad body).
    #[error("model call failed: {0}")]
    Transport(#[from] GatewayError),

    /// The structured file-list payload was absent or could not be decoded.
    #[error("malformed file-list payload: {reason}")]
    MalformedPayload {
        reason: String,
        /// Raw payload as returned by the model, if any.
        payload: Option<String>,
    },

    /// A filesystem operation failed.
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A generated file path would escape the output root.
    #[error("unsafe file path {path:?}: {reason}")]
    UnsafePath { path: String, reason: String },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::TransportFailure,
            Self::MalformedPayload { .. } => ErrorKind::MalformedPayload,
            Self::Filesystem { .. } => ErrorKind::FilesystemFailure,
            Self::UnsafePath { .. } => ErrorKind::UnsafePath,
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}
