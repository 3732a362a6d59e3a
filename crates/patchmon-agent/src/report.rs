//! Package report output

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use patchmon_pkg::{Package, PackageSummary};
use serde::Serialize;

/// One collection run, as printed by `packages`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageReport {
    pub packages: Vec<Package>,
    /// Counts over the full collection, before any filtering
    #[serde(flatten)]
    pub summary: PackageSummary,
    pub collected_at: DateTime<Utc>,
}

impl PackageReport {
    pub fn new(packages: Vec<Package>, collected_at: DateTime<Utc>) -> Self {
        Self {
            summary: PackageSummary::from_packages(&packages),
            packages,
            collected_at,
        }
    }

    /// Keep only packages with an upgrade available
    #[must_use]
    pub fn only_updates(mut self) -> Self {
        self.packages.retain(|p| p.needs_update);
        self
    }

    /// Render as an aligned text table followed by a summary line
    pub fn to_table(&self) -> String {
        const HEADERS: [&str; 4] = ["NAME", "CURRENT", "AVAILABLE", "SECURITY"];

        let rows: Vec<[&str; 4]> = self
            .packages
            .iter()
            .map(|p| {
                [
                    p.name.as_str(),
                    p.current_version.as_str(),
                    p.available_version.as_str(),
                    if p.is_security_update { "yes" } else { "" },
                ]
            })
            .collect();

        let mut widths = HEADERS.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        let mut out = String::new();
        for row in std::iter::once(&HEADERS).chain(&rows) {
            let line = row
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ");
            let _ = writeln!(out, "{}", line.trim_end());
        }

        let _ = writeln!(
            out,
            "\n{} packages, {} with updates, {} security updates (collected {})",
            self.summary.total,
            self.summary.needs_update,
            self.summary.security_updates,
            self.collected_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );
        out
    }
}
