//! Windows Update package source
//!
//! Installed and pending updates come from the Windows Update Agent. The
//! search itself sits behind [`UpdateSearcher`] so the mapping from update
//! records to packages can be exercised on any platform.

#[cfg(windows)]
mod com;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::combine::combine;
use crate::error::PackageError;
use crate::traits::PackageSource;
use crate::types::{Package, SourceKind};

#[cfg(windows)]
pub use com::ComUpdateSearcher;

/// Search criteria for installed updates
pub const INSTALLED_CRITERIA: &str = "IsInstalled=1";

/// Search criteria for pending, non-hidden updates
pub const AVAILABLE_CRITERIA: &str = "IsInstalled=0 AND IsHidden=0";

/// Category names that mark an update as security-relevant
const SECURITY_CATEGORIES: [&str; 2] = ["Security Updates", "Critical Updates"];

/// Properties read from one update returned by a search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRecord {
    /// Update title
    pub title: String,
    /// KB article identifiers, without the `KB` prefix
    pub kb_article_ids: Vec<String>,
    /// Identity GUID, if readable
    pub update_id: Option<String>,
    /// Identity revision, if readable
    pub revision_number: Option<i32>,
    /// MSRC severity rating, if any
    pub msrc_severity: Option<String>,
    /// Names of the categories the update belongs to
    pub categories: Vec<String>,
}

impl UpdateRecord {
    /// Create a record with only a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// `KB<id>` for the first KB article, or the title
    #[must_use]
    pub fn name(&self) -> String {
        match self.kb_article_ids.first() {
            Some(id) if !id.is_empty() => format!("KB{id}"),
            _ => self.title.clone(),
        }
    }

    /// `<updateID>.<revision>`, `rev.<revision>` without an id, empty without a revision
    #[must_use]
    pub fn version(&self) -> String {
        let Some(revision) = self.revision_number else {
            return String::new();
        };
        match self.update_id.as_deref() {
            Some(id) if !id.is_empty() => format!("{id}.{revision}"),
            _ => format!("rev.{revision}"),
        }
    }

    /// Whether the update carries an MSRC rating or a security category
    #[must_use]
    pub fn is_security_update(&self) -> bool {
        if self.msrc_severity.as_deref().is_some_and(|s| !s.is_empty()) {
            return true;
        }
        self.categories
            .iter()
            .any(|c| SECURITY_CATEGORIES.contains(&c.as_str()))
    }

    /// Convert into a package, installed or pending
    #[must_use]
    pub fn into_package(self, installed: bool) -> Package {
        let name = self.name();
        let version = self.version();
        let is_security_update = self.is_security_update();

        let pkg = if installed {
            Package::installed(name, version)
        } else {
            Package::upgrade(name, "", version)
        };
        pkg.with_description(self.title)
            .with_security(is_security_update)
    }
}

/// Item access over one search result
pub(crate) trait UpdateItems {
    type Item;
    type Error: std::fmt::Display;

    /// Fetch the item at `index`
    fn get(&self, index: i32) -> Result<Self::Item, Self::Error>;

    /// Read the record for one item; fails only when the title is unreadable
    fn read(item: &Self::Item) -> Result<UpdateRecord, Self::Error>;
}

/// Read `count` items, skipping any that cannot be fetched or titled
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn read_records<U: UpdateItems>(items: &U, count: i32) -> Vec<UpdateRecord> {
    let mut records = Vec::with_capacity(usize::try_from(count).unwrap_or_default());

    for index in 0..count {
        let item = match items.get(index) {
            Ok(item) => item,
            Err(e) => {
                warn!(index, error = %e, "failed to get update item");
                continue;
            }
        };

        match U::read(&item) {
            Ok(record) => records.push(record),
            Err(e) => warn!(index, error = %e, "failed to get update title"),
        }
    }

    records
}

/// Runs Windows Update searches
///
/// Implementations skip individual updates whose properties cannot be read
/// and only fail when the search cannot run.
#[async_trait]
pub trait UpdateSearcher: Send + Sync {
    /// Search with a Windows Update criteria string
    async fn search(&self, criteria: &str) -> Result<Vec<UpdateRecord>, PackageError>;
}

/// Windows Update package source
pub struct WindowsUpdateManager {
    searcher: Arc<dyn UpdateSearcher>,
}

impl WindowsUpdateManager {
    /// Create a manager over any update searcher
    pub fn new(searcher: Arc<dyn UpdateSearcher>) -> Self {
        Self { searcher }
    }

    /// Create a manager backed by the Windows Update Agent COM API
    #[cfg(windows)]
    #[must_use]
    pub fn com() -> Self {
        Self::new(Arc::new(ComUpdateSearcher::new()))
    }

    /// All installed updates
    ///
    /// # Errors
    /// Returns an error if the search cannot run.
    pub async fn installed_updates(&self) -> Result<Vec<Package>, PackageError> {
        self.search(INSTALLED_CRITERIA, true).await
    }

    /// All available, non-hidden updates
    ///
    /// # Errors
    /// Returns an error if the search cannot run.
    pub async fn available_updates(&self) -> Result<Vec<Package>, PackageError> {
        info!("searching for available windows updates (this may take 30-60 seconds)");
        self.search(AVAILABLE_CRITERIA, false).await
    }

    async fn search(&self, criteria: &str, installed: bool) -> Result<Vec<Package>, PackageError> {
        let records = self.searcher.search(criteria).await?;
        debug!(criteria, count = records.len(), "windows update search completed");

        Ok(records
            .into_iter()
            .map(|r| r.into_package(installed))
            .collect())
    }
}

/// Degrade a failed search to an empty list unless no session could be made
fn or_empty(
    result: Result<Vec<Package>, PackageError>,
    what: &str,
) -> Result<Vec<Package>, PackageError> {
    match result {
        Ok(packages) => Ok(packages),
        Err(e) if e.is_unavailable() => Err(e),
        Err(e) => {
            warn!(error = %e, "failed to get {what} updates");
            Ok(Vec::new())
        }
    }
}

#[async_trait]
impl PackageSource for WindowsUpdateManager {
    #[instrument(skip(self))]
    async fn get_packages(&self) -> Result<Vec<Package>, PackageError> {
        let installed = or_empty(self.installed_updates().await, "installed")?;
        let available = or_empty(self.available_updates().await, "available")?;

        info!(
            installed = installed.len(),
            available = available.len(),
            "found windows updates"
        );

        let installed: HashMap<String, Package> = installed
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();

        Ok(combine(installed, available))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::WindowsUpdate
    }

    fn tool(&self) -> String {
        "Microsoft.Update.Session".to_string()
    }
}
