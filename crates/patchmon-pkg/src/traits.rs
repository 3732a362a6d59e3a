//! Package source trait

use async_trait::async_trait;

use crate::error::PackageError;
use crate::types::{Package, SourceKind};

/// A package ecosystem that can report its canonical package list
///
/// Implementations list installed packages and upgrade candidates and merge
/// them with [`crate::combine`]. A failing listing degrades to an empty set;
/// an error is only returned when the ecosystem cannot be queried at all.
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Collect installed and upgradable packages as one deduplicated list
    async fn get_packages(&self) -> Result<Vec<Package>, PackageError>;

    /// Which ecosystem this source reads
    fn kind(&self) -> SourceKind;

    /// Name of the tool or API the source uses on this host
    fn tool(&self) -> String;
}
