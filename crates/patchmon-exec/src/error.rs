//! Error types for patchmon-exec

use thiserror::Error;

/// Errors that can occur while invoking a command
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Program could not be found on the search path
    #[error("program not found: {0}")]
    NotFound(String),

    /// Process spawn error
    #[error("failed to spawn {program}: {message}")]
    SpawnError {
        /// Program that failed to start
        program: String,
        /// Underlying error message
        message: String,
    },
}
