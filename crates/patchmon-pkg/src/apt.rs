//! APT package source (Debian/Ubuntu)

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use patchmon_exec::Executor;
use tracing::{debug, info, instrument, warn};

use crate::combine::combine;
use crate::command::{ExitPolicy, listing_output};
use crate::error::PackageError;
use crate::traits::PackageSource;
use crate::types::{Package, SourceKind};

/// `dpkg-query` output format: one package per line, description last
const DPKG_FORMAT: &str = "${Package} ${Version} ${Description}\n";

/// APT package source
///
/// Uses `apt`, or `apt-get` on hosts that lack it.
pub struct AptManager {
    /// Executor for running apt and dpkg commands
    executor: Arc<dyn Executor>,
    /// Whether to run `update` before listing
    refresh_indices: bool,
}

impl AptManager {
    /// Create a new APT manager
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            refresh_indices: true,
        }
    }

    /// Enable or disable the package index refresh
    #[must_use]
    pub fn with_refresh(mut self, refresh_indices: bool) -> Self {
        self.refresh_indices = refresh_indices;
        self
    }

    /// Pick `apt`, falling back to `apt-get`
    fn detect_tool(&self) -> Result<&'static str, PackageError> {
        if self.executor.resolve("apt") {
            Ok("apt")
        } else if self.executor.resolve("apt-get") {
            Ok("apt-get")
        } else {
            Err(PackageError::ManagerNotFound(
                "neither apt nor apt-get found".to_string(),
            ))
        }
    }

    /// Refresh package indices; failures leave stale indices in place
    async fn refresh(&self, tool: &str) {
        debug!(manager = tool, "updating package lists");

        match self.executor.run(tool, &["update", "-qq"]).await {
            Ok(result) if result.success() => {}
            Ok(result) => warn!(
                manager = tool,
                status = result.status,
                stderr = %result.stderr.trim(),
                "failed to update package lists"
            ),
            Err(e) => warn!(manager = tool, error = %e, "failed to update package lists"),
        }
    }

    async fn list_installed(&self) -> HashMap<String, Package> {
        debug!("getting installed packages");

        let Some(output) = listing_output(
            self.executor.as_ref(),
            "dpkg-query",
            &["-W", "-f", DPKG_FORMAT],
            ExitPolicy::Strict,
        )
        .await
        else {
            return HashMap::new();
        };

        let installed = Self::parse_installed(&output);
        debug!(count = installed.len(), "found installed packages");
        installed
    }

    async fn list_upgradable(&self, tool: &str) -> Vec<Package> {
        debug!("getting upgradable packages");

        let Some(output) = listing_output(
            self.executor.as_ref(),
            tool,
            &["-s", "-o", "Debug::NoLocking=1", "upgrade"],
            ExitPolicy::Strict,
        )
        .await
        else {
            return Vec::new();
        };

        let upgradable = Self::parse_upgrade_simulation(&output);
        debug!(count = upgradable.len(), "found upgradable packages");
        upgradable
    }

    /// Parse `dpkg-query -W` output into a map of package name to package
    ///
    /// Lines starting with whitespace continue the previous package's
    /// description.
    pub(crate) fn parse_installed(output: &str) -> HashMap<String, Package> {
        let mut installed: HashMap<String, Package> = HashMap::new();
        let mut current: Option<String> = None;

        for line in output.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if line.starts_with(char::is_whitespace)
                && let Some(pkg) = current.as_ref().and_then(|name| installed.get_mut(name))
            {
                if !pkg.description.is_empty() {
                    pkg.description.push('\n');
                }
                pkg.description.push_str(trimmed);
                continue;
            }

            let (name, rest) = split_token(trimmed);
            let (version, description) = split_token(rest);
            if version.is_empty() {
                debug!(line, "skipping malformed installed package line");
                current = None;
                continue;
            }

            installed.insert(
                name.to_string(),
                Package::installed(name, version).with_description(description),
            );
            current = Some(name.to_string());
        }

        installed
    }

    /// Parse `apt -s upgrade` output into upgrade candidates
    ///
    /// Only `Inst` lines are relevant:
    /// `Inst vim [2:8.2.3995-1ubuntu2.16] (2:8.2.3995-1ubuntu2.17 Ubuntu:22.04/jammy-updates [amd64])`
    pub(crate) fn parse_upgrade_simulation(output: &str) -> Vec<Package> {
        let mut packages = Vec::new();

        for line in output.lines() {
            let line = line.trim();
            if !line.starts_with("Inst ") {
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                debug!(line, "skipping 'Inst' line due to insufficient fields");
                continue;
            }

            let name = fields[1];
            // the bracketed installed version precedes the parenthesised candidate
            let candidate_at = fields
                .iter()
                .position(|f| f.starts_with('('))
                .unwrap_or(fields.len());
            let current_version = bracketed_version(&fields[..candidate_at]);
            let available_version = fields
                .get(candidate_at)
                .and_then(|f| f.strip_prefix('('))
                .unwrap_or_default();

            if name.is_empty() || current_version.is_empty() || available_version.is_empty() {
                debug!(line, "skipping 'Inst' line without both versions");
                continue;
            }

            let is_security_update = line.to_lowercase().contains("security");
            packages.push(
                Package::upgrade(name, current_version, available_version)
                    .with_security(is_security_update),
            );
        }

        packages
    }
}

/// Split off the first whitespace-delimited token
fn split_token(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((token, rest)) => (token, rest.trim_start()),
        None => (s, ""),
    }
}

/// Content of the first `[...]` span, which may cover several fields
fn bracketed_version(fields: &[&str]) -> String {
    for (i, field) in fields.iter().enumerate() {
        let Some(after) = field.strip_prefix('[') else {
            continue;
        };
        if let Some(inner) = after.strip_suffix(']') {
            return inner.to_string();
        }

        let mut parts = vec![after];
        for next in &fields[i + 1..] {
            if let Some(last) = next.strip_suffix(']') {
                parts.push(last);
                break;
            }
            parts.push(*next);
        }
        return parts.join(" ");
    }

    String::new()
}

#[async_trait]
impl PackageSource for AptManager {
    #[instrument(skip(self))]
    async fn get_packages(&self) -> Result<Vec<Package>, PackageError> {
        let tool = self.detect_tool()?;

        if self.refresh_indices {
            self.refresh(tool).await;
        }

        let installed = self.list_installed().await;
        let upgradable = self.list_upgradable(tool).await;

        let packages = combine(installed, upgradable);
        info!(manager = tool, total = packages.len(), "collected apt packages");

        Ok(packages)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Apt
    }

    fn tool(&self) -> String {
        self.detect_tool().unwrap_or("apt").to_string()
    }
}
