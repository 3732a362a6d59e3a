//! Result types for command execution

/// Result of a command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit status code (0 for success, -1 if killed by a signal)
    pub status: i32,
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
}

impl CommandResult {
    /// Build a result from captured output
    pub fn new(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Whether anything besides whitespace was written to stdout
    #[must_use]
    pub fn has_output(&self) -> bool {
        !self.stdout.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_output_ignores_whitespace() {
        assert!(!CommandResult::new(0, " \n\t", "").has_output());
        assert!(CommandResult::new(100, "vim.x86_64 9.0 updates\n", "").has_output());
    }

    #[test]
    fn test_success_is_exit_zero() {
        assert!(CommandResult::new(0, "", "").success());
        assert!(!CommandResult::new(100, "out", "").success());
        assert!(!CommandResult::new(-1, "", "killed").success());
    }
}
