//! Executor trait

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// Runs external commands on the host
///
/// A non-zero exit status is reported through [`CommandResult::status`], not
/// as an error: several package tools overload their exit codes.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `program` with `args` and capture its output
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandResult, ExecError>;

    /// Whether `program` can be found on the executable search path
    fn resolve(&self, program: &str) -> bool;

    /// Short name of the executor implementation, used in logs
    fn executor_type(&self) -> &'static str;
}
