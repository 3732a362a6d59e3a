//! patchmon-exec: Process execution abstraction
//!
//! Provides the trait package sources use to invoke package-manager tools,
//! plus a local implementation backed by `tokio::process`.

pub mod error;
pub mod local;
pub mod result;
pub mod traits;

pub use error::ExecError;
pub use local::LocalExecutor;
pub use result::CommandResult;
pub use traits::Executor;
