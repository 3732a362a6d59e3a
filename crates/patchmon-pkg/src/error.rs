//! Error types for patchmon-pkg

use thiserror::Error;

/// Errors that can occur while collecting package inventory
#[derive(Error, Debug, Clone)]
pub enum PackageError {
    /// No usable package-manager tool on the host
    #[error("package manager not found: {0}")]
    ManagerNotFound(String),

    /// No package source detected or configured
    #[error("no supported package source found (tried {0})")]
    NoSupportedSource(String),

    /// Source is not available on this platform
    #[error("{0} is not supported on this platform")]
    Unsupported(String),

    /// Update session could not be created (COM initialization, session object)
    #[error("update session unavailable: {0}")]
    SessionUnavailable(String),

    /// Update search ran but failed
    #[error("update search failed (criteria={criteria:?}): {message}")]
    SearchFailed {
        /// Search criteria string
        criteria: String,
        /// Error message
        message: String,
    },
}

impl PackageError {
    /// Whether the source's listing mechanism could not be invoked at all
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            PackageError::ManagerNotFound(_)
                | PackageError::NoSupportedSource(_)
                | PackageError::Unsupported(_)
                | PackageError::SessionUnavailable(_)
        )
    }
}
