//! Helpers for running listing commands

use patchmon_exec::Executor;
use tracing::{debug, warn};

/// How a listing command reports "found something"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitPolicy {
    /// Non-zero exit means the listing failed
    Strict,
    /// Exit status is overloaded; any stdout counts as a result
    OutputOnly,
}

/// Run a listing command and return its stdout
///
/// Failures are logged as warnings and yield `None`, so the caller can treat
/// the listing as empty.
pub(crate) async fn listing_output(
    executor: &dyn Executor,
    program: &str,
    args: &[&str],
    policy: ExitPolicy,
) -> Option<String> {
    let result = match executor.run(program, args).await {
        Ok(result) => result,
        Err(e) => {
            warn!(program, ?args, error = %e, "failed to run listing command");
            return None;
        }
    };

    if result.success() {
        return Some(result.stdout);
    }

    if policy == ExitPolicy::OutputOnly && result.has_output() {
        debug!(program, status = result.status, "non-zero exit with output, using output");
        return Some(result.stdout);
    }

    warn!(
        program,
        ?args,
        status = result.status,
        stderr = %result.stderr.trim(),
        "listing command failed"
    );
    None
}
