//! patchmon-pkg: Package inventory collection
//!
//! Lists installed packages and available upgrades from the host's package
//! ecosystem (apt, dnf/yum, Windows Update) and merges them into one
//! canonical list per run.

pub mod apt;
pub mod combine;
mod command;
pub mod dnf;
pub mod error;
pub mod inventory;
pub mod traits;
pub mod types;
pub mod windows_update;

#[cfg(test)]
mod test_support;

pub use apt::AptManager;
pub use combine::combine;
pub use dnf::DnfManager;
pub use error::PackageError;
pub use inventory::{InventoryOptions, PackageInventory, build_source, detect_sources};
pub use traits::PackageSource;
pub use types::{Package, PackageSummary, SourceKind};
pub use windows_update::{UpdateRecord, UpdateSearcher, WindowsUpdateManager};
