//! Type definitions for package inventory

use serde::{Deserialize, Serialize};

/// A package as reported in the inventory
///
/// Either installed and current (`needs_update == false`, `current_version`
/// set) or upgradable (`needs_update == true`, `available_version` set). An
/// upgradable package that is also installed carries both versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Package name
    pub name: String,
    /// Free-text description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Installed version, empty if not installed
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_version: String,
    /// Version an upgrade would install, empty if none
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub available_version: String,
    /// Whether an upgrade candidate exists
    pub needs_update: bool,
    /// Whether the source classified the upgrade as security/critical
    pub is_security_update: bool,
}

impl Package {
    /// Create an installed, up-to-date package
    pub fn installed(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current_version: version.into(),
            ..Self::default()
        }
    }

    /// Create an upgrade candidate
    pub fn upgrade(
        name: impl Into<String>,
        current: impl Into<String>,
        available: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            current_version: current.into(),
            available_version: available.into(),
            needs_update: true,
            ..Self::default()
        }
    }

    /// Set description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark as a security update
    #[must_use]
    pub fn with_security(mut self, is_security_update: bool) -> Self {
        self.is_security_update = is_security_update;
        self
    }
}

/// Package ecosystem a source manager reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// APT (Debian/Ubuntu)
    Apt,
    /// DNF or YUM (Fedora/RHEL)
    Dnf,
    /// Windows Update Agent
    WindowsUpdate,
}

impl SourceKind {
    /// All known source kinds, in detection order
    pub const ALL: [SourceKind; 3] = [SourceKind::WindowsUpdate, SourceKind::Apt, SourceKind::Dnf];
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Apt => write!(f, "apt"),
            SourceKind::Dnf => write!(f, "dnf"),
            SourceKind::WindowsUpdate => write!(f, "windows-update"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apt" | "apt-get" => Ok(SourceKind::Apt),
            "dnf" | "yum" => Ok(SourceKind::Dnf),
            "windows-update" | "windows_update" | "wua" => Ok(SourceKind::WindowsUpdate),
            other => Err(format!("unknown package source: {other}")),
        }
    }
}

/// Counts over a canonical package list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSummary {
    /// Number of packages
    pub total: usize,
    /// Packages with an upgrade available
    pub needs_update: usize,
    /// Upgrades flagged as security updates
    pub security_updates: usize,
}

impl PackageSummary {
    /// Tally a package list
    #[must_use]
    pub fn from_packages(packages: &[Package]) -> Self {
        packages.iter().fold(
            Self {
                total: packages.len(),
                ..Self::default()
            },
            |mut summary, pkg| {
                if pkg.needs_update {
                    summary.needs_update += 1;
                }
                if pkg.is_security_update {
                    summary.security_updates += 1;
                }
                summary
            },
        )
    }
}
