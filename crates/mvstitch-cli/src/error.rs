//! Workflow error types.

use std::path::PathBuf;
use thiserror::Error;

use mvstitch_media::MediaError;
use mvstitch_models::display_name;

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Why a run ended without an export.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Cancelled by user.")]
    Cancelled,

    #[error("Error loading {}: {source}", display_name(.path))]
    Load {
        path: PathBuf,
        #[source]
        source: MediaError,
    },

    #[error("Video content is empty.")]
    EmptyContent,

    #[error("Could not build the video sequence: {0}")]
    Sequence(#[source] MediaError),

    #[error("Export error for {}: {source}", display_name(.path))]
    Export {
        path: PathBuf,
        #[source]
        source: MediaError,
    },
}

/// Coarse outcome category, for exit codes and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    UserCancelled,
    LoadError,
    EmptyContentError,
    ExportError,
}

impl WorkflowError {
    pub fn load(path: impl Into<PathBuf>, source: MediaError) -> Self {
        Self::Load {
            path: path.into(),
            source,
        }
    }

    pub fn export(path: impl Into<PathBuf>, source: MediaError) -> Self {
        Self::Export {
            path: path.into(),
            source,
        }
    }

    /// Map a sequencing failure, keeping empty content as its own case.
    pub fn from_sequence(source: MediaError) -> Self {
        match source {
            MediaError::EmptyContent { .. } => Self::EmptyContent,
            other => Self::Sequence(other),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Cancelled => FailureKind::UserCancelled,
            // An unusable target duration comes from the audio track
            Self::Load { .. } | Self::Sequence(_) => FailureKind::LoadError,
            Self::EmptyContent => FailureKind::EmptyContentError,
            Self::Export { .. } => FailureKind::ExportError,
        }
    }

    /// Cancellation is a normal way to leave, not a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.is_cancelled() {
            0
        } else {
            1
        }
    }
}
