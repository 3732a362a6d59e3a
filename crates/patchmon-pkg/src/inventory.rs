//! Source detection and the top-level package inventory

use std::sync::Arc;

use patchmon_exec::Executor;
use tracing::{debug, info, instrument, warn};

use crate::apt::AptManager;
use crate::dnf::DnfManager;
use crate::error::PackageError;
use crate::traits::PackageSource;
use crate::types::{Package, PackageSummary, SourceKind};

/// Options applied when building package sources
#[derive(Debug, Clone)]
pub struct InventoryOptions {
    /// Sources to collect; empty means detect from the host
    pub sources: Vec<SourceKind>,
    /// Refresh APT indices before listing
    pub refresh_indices: bool,
}

impl Default for InventoryOptions {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            refresh_indices: true,
        }
    }
}

/// Detect the package ecosystem of this host
///
/// Windows hosts use Windows Update. Elsewhere the first of APT (`apt` or
/// `apt-get`) and DNF (`dnf` or `yum`) found on the search path wins.
pub fn detect_sources(executor: &dyn Executor) -> Vec<SourceKind> {
    if cfg!(windows) {
        return vec![SourceKind::WindowsUpdate];
    }

    if executor.resolve("apt") || executor.resolve("apt-get") {
        debug!("detected apt package manager");
        return vec![SourceKind::Apt];
    }

    if executor.resolve("dnf") || executor.resolve("yum") {
        debug!("detected dnf package manager");
        return vec![SourceKind::Dnf];
    }

    Vec::new()
}

/// Build the source manager for one ecosystem
///
/// # Errors
/// Returns [`PackageError::Unsupported`] for Windows Update on other platforms.
pub fn build_source(
    kind: SourceKind,
    executor: Arc<dyn Executor>,
    options: &InventoryOptions,
) -> Result<Box<dyn PackageSource>, PackageError> {
    match kind {
        SourceKind::Apt => Ok(Box::new(
            AptManager::new(executor).with_refresh(options.refresh_indices),
        )),
        SourceKind::Dnf => Ok(Box::new(DnfManager::new(executor))),
        #[cfg(windows)]
        SourceKind::WindowsUpdate => Ok(Box::new(
            crate::windows_update::WindowsUpdateManager::com(),
        )),
        #[cfg(not(windows))]
        SourceKind::WindowsUpdate => Err(PackageError::Unsupported(kind.to_string())),
    }
}

/// Package inventory over one or more sources
///
/// Sources are collected one after another and their lists concatenated.
pub struct PackageInventory {
    sources: Vec<Box<dyn PackageSource>>,
}

impl PackageInventory {
    /// Create an inventory over explicit sources
    pub fn new(sources: Vec<Box<dyn PackageSource>>) -> Self {
        Self { sources }
    }

    /// Build an inventory from configured or detected sources
    ///
    /// # Errors
    /// Returns an error if no source is configured or detected, or a
    /// configured source cannot be built on this platform.
    pub fn detect(
        executor: Arc<dyn Executor>,
        options: &InventoryOptions,
    ) -> Result<Self, PackageError> {
        let kinds = if options.sources.is_empty() {
            detect_sources(executor.as_ref())
        } else {
            options.sources.clone()
        };

        if kinds.is_empty() {
            return Err(PackageError::NoSupportedSource(
                "windows-update, apt, apt-get, dnf, yum".to_string(),
            ));
        }

        let sources = kinds
            .into_iter()
            .map(|kind| build_source(kind, executor.clone(), options))
            .collect::<Result<Vec<_>, _>>()?;

        let kinds: Vec<SourceKind> = sources.iter().map(|s| s.kind()).collect();
        info!(
            sources = ?kinds,
            executor = executor.executor_type(),
            "package sources ready"
        );

        Ok(Self::new(sources))
    }

    /// Sources this inventory collects from
    pub fn sources(&self) -> impl Iterator<Item = &dyn PackageSource> {
        self.sources.iter().map(|s| &**s)
    }

    /// Collect the canonical package list from every source
    ///
    /// A failing source is logged and skipped. An error is returned only when
    /// no source produced a list.
    ///
    /// # Errors
    /// Returns the last source error if every source failed.
    #[instrument(skip(self))]
    pub async fn get_packages(&self) -> Result<Vec<Package>, PackageError> {
        let mut packages = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for source in &self.sources {
            match source.get_packages().await {
                Ok(mut list) => {
                    info!(source = %source.kind(), count = list.len(), "collected packages");
                    packages.append(&mut list);
                    succeeded += 1;
                }
                Err(e) => {
                    warn!(source = %source.kind(), error = %e, "failed to collect packages");
                    last_error = Some(e);
                }
            }
        }

        if succeeded == 0 {
            return Err(last_error.unwrap_or_else(|| {
                PackageError::NoSupportedSource("no sources configured".to_string())
            }));
        }

        let summary = PackageSummary::from_packages(&packages);
        info!(
            total = summary.total,
            total_updates = summary.needs_update,
            security_updates = summary.security_updates,
            "package collection completed"
        );

        Ok(packages)
    }
}
