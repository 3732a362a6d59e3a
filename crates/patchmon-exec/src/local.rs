//! Local command execution using `tokio::process`

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::ExecError;
use crate::result::CommandResult;
use crate::traits::Executor;

/// Local command executor
///
/// Spawns programs directly (no shell) and waits for them to exit. There is
/// no timeout: a hung tool blocks the caller until it exits.
#[derive(Debug, Clone)]
pub struct LocalExecutor;

impl LocalExecutor {
    /// Create a new local executor
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    #[instrument(skip(self), level = "debug")]
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        debug!(program, ?args, "executing local command");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ExecError::NotFound(program.to_string()),
                _ => ExecError::SpawnError {
                    program: program.to_string(),
                    message: e.to_string(),
                },
            })?;

        let duration = start.elapsed();
        let status = output.status.code().unwrap_or(-1);

        debug!(
            program,
            status,
            duration = ?duration,
            stdout_bytes = output.stdout.len(),
            "command completed"
        );

        Ok(CommandResult::new(
            status,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        ))
    }

    fn resolve(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn executor_type(&self) -> &'static str {
        "local"
    }
}
