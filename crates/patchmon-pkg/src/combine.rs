//! Merging of installed and upgradable package sets

use std::collections::{HashMap, HashSet};

use crate::types::Package;

/// Merge installed packages and upgrade candidates into one list
///
/// Upgrade candidates come first, in input order, with an empty description
/// filled from the installed entry of the same name. Installed packages with
/// no candidate follow in map order; only their name and current version are
/// kept.
#[must_use]
pub fn combine(installed: HashMap<String, Package>, upgradable: Vec<Package>) -> Vec<Package> {
    let mut packages = Vec::with_capacity(installed.len() + upgradable.len());
    let mut covered = HashSet::with_capacity(upgradable.len());

    for mut pkg in upgradable {
        if pkg.description.is_empty()
            && let Some(installed_pkg) = installed.get(&pkg.name)
        {
            pkg.description.clone_from(&installed_pkg.description);
        }
        covered.insert(pkg.name.clone());
        packages.push(pkg);
    }

    for (name, pkg) in installed {
        if !covered.contains(&name) {
            packages.push(Package::installed(pkg.name, pkg.current_version));
        }
    }

    packages
}
