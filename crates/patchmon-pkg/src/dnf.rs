//! DNF package source (Fedora/RHEL/CentOS)

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use patchmon_exec::Executor;
use tracing::{debug, info, instrument};

use crate::combine::combine;
use crate::command::{ExitPolicy, listing_output};
use crate::error::PackageError;
use crate::traits::PackageSource;
use crate::types::{Package, SourceKind};

/// Architecture suffixes stripped when matching `name.arch` against `name`
const ARCH_SUFFIXES: [&str; 6] = ["x86_64", "i686", "i386", "noarch", "aarch64", "arm64"];

/// DNF package source
///
/// Falls back to `yum` if `dnf` is not available.
pub struct DnfManager {
    executor: Arc<dyn Executor>,
}

impl DnfManager {
    /// Create a new DNF manager
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Pick `dnf`, falling back to `yum`
    fn detect_tool(&self) -> Result<&'static str, PackageError> {
        if self.executor.resolve("dnf") {
            Ok("dnf")
        } else if self.executor.resolve("yum") {
            Ok("yum")
        } else {
            Err(PackageError::ManagerNotFound(
                "neither dnf nor yum found".to_string(),
            ))
        }
    }

    /// Parse `dnf list installed` output into a map of package name to package
    pub(crate) fn parse_installed(output: &str) -> HashMap<String, Package> {
        let mut installed = HashMap::new();

        for line in output.lines() {
            let line = line.trim();
            if is_banner(line) {
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 2 {
                continue;
            }

            installed.insert(
                fields[0].to_string(),
                Package::installed(fields[0], fields[1]),
            );
        }

        installed
    }

    /// Parse `dnf check-update` output into upgrade candidates
    ///
    /// Each candidate needs a current version; see [`resolve_installed_version`]
    /// for the lookup order. Candidates whose current version cannot be found
    /// even by querying the tool are dropped.
    pub(crate) async fn parse_upgradable(
        &self,
        output: &str,
        tool: &str,
        installed: &HashMap<String, Package>,
    ) -> Vec<Package> {
        let mut packages = Vec::new();

        for line in output.lines() {
            let line = line.trim();
            // `replaces` lines below this header are not candidates
            if line.starts_with("Obsoleting Packages") {
                break;
            }
            if is_banner(line) {
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                continue;
            }

            let name = fields[0];
            let available_version = fields[1];
            let repo = fields[2];

            let current_version = match resolve_installed_version(name, installed) {
                Some(version) => version.to_string(),
                None => self.query_installed_version(tool, name).await.unwrap_or_default(),
            };

            if name.is_empty() || current_version.is_empty() || available_version.is_empty() {
                debug!(
                    package = name,
                    current_version = %current_version,
                    available_version,
                    "skipping package due to missing version information"
                );
                continue;
            }

            let is_security_update = repo.to_lowercase().contains("security");
            packages.push(
                Package::upgrade(name, current_version, available_version)
                    .with_security(is_security_update),
            );
        }

        packages
    }

    /// Ask the tool for one package's installed version
    ///
    /// Runs once per unresolved candidate, without caching.
    async fn query_installed_version(&self, tool: &str, name: &str) -> Option<String> {
        debug!(package = name, "querying installed version");

        let output = listing_output(
            self.executor.as_ref(),
            tool,
            &["list", "installed", name],
            ExitPolicy::Strict,
        )
        .await?;

        output
            .lines()
            .filter(|l| l.contains(name) && !l.contains("Installed") && !l.contains("Available"))
            .find_map(|l| l.split_whitespace().nth(1))
            .map(str::to_string)
    }
}

/// Header and progress lines emitted by dnf/yum around the package table
fn is_banner(line: &str) -> bool {
    line.is_empty()
        || line.contains("Loaded plugins")
        || line.contains("Last metadata")
        || line.to_lowercase().contains("installed packages")
        || line.starts_with("Loading")
}

/// `name` without a trailing `.arch`, if it has a known one
fn strip_arch(name: &str) -> Option<&str> {
    let idx = name.rfind('.').filter(|&idx| idx > 0)?;
    ARCH_SUFFIXES
        .contains(&&name[idx + 1..])
        .then(|| &name[..idx])
}

/// Find the installed version of a `check-update` candidate
///
/// Tries an exact match, then the name without its arch suffix, then every
/// installed name with its arch suffix stripped.
pub(crate) fn resolve_installed_version<'a>(
    name: &str,
    installed: &'a HashMap<String, Package>,
) -> Option<&'a str> {
    if let Some(pkg) = installed.get(name) {
        return Some(pkg.current_version.as_str());
    }

    let base = strip_arch(name);
    if let Some(pkg) = base.and_then(|b| installed.get(b)) {
        return Some(pkg.current_version.as_str());
    }

    let base = base.unwrap_or(name);
    installed
        .iter()
        .find(|(installed_name, _)| {
            let installed_name = installed_name.as_str();
            let installed_base = strip_arch(installed_name).unwrap_or(installed_name);
            installed_base == base || installed_base == name
        })
        .map(|(_, pkg)| pkg.current_version.as_str())
}

#[async_trait]
impl PackageSource for DnfManager {
    #[instrument(skip(self))]
    async fn get_packages(&self) -> Result<Vec<Package>, PackageError> {
        let tool = self.detect_tool()?;
        debug!(manager = tool, "using package manager");

        let installed = match listing_output(
            self.executor.as_ref(),
            tool,
            &["list", "installed"],
            ExitPolicy::Strict,
        )
        .await
        {
            Some(output) => Self::parse_installed(&output),
            None => HashMap::new(),
        };
        debug!(count = installed.len(), "found installed packages");

        // check-update exits 100 when updates are available
        let upgradable = match listing_output(
            self.executor.as_ref(),
            tool,
            &["check-update"],
            ExitPolicy::OutputOnly,
        )
        .await
        {
            Some(output) if !output.trim().is_empty() => {
                self.parse_upgradable(&output, tool, &installed).await
            }
            _ => {
                debug!("no updates available");
                Vec::new()
            }
        };
        debug!(count = upgradable.len(), "found upgradable packages");

        let packages = combine(installed, upgradable);
        info!(manager = tool, total = packages.len(), "collected dnf packages");

        Ok(packages)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Dnf
    }

    fn tool(&self) -> String {
        self.detect_tool().unwrap_or("dnf").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedExecutor;

    const INSTALLED: &str = "Loaded plugins: fastestmirror
Installed Packages
bash.x86_64                5.1.8-6.el9_1               @baseos
curl.x86_64                7.76.1-26.el9_3.2           @baseos
python3-libs.x86_64        3.9.18-1.el9_3.1            @baseos
tzdata.noarch              2023c-1.el9                 @baseos
";

    fn manager(executor: ScriptedExecutor) -> DnfManager {
        DnfManager::new(Arc::new(executor))
    }

    #[test]
    fn test_parse_installed() {
        let installed = DnfManager::parse_installed(INSTALLED);

        assert_eq!(installed.len(), 4);
        assert_eq!(installed["bash.x86_64"].current_version, "5.1.8-6.el9_1");
        assert_eq!(installed["tzdata.noarch"].current_version, "2023c-1.el9");
        assert!(!installed.contains_key("Installed"));
    }

    #[test]
    fn test_parse_installed_is_idempotent() {
        let first = DnfManager::parse_installed(INSTALLED);
        let second = DnfManager::parse_installed(INSTALLED);

        assert_eq!(first, second);
        assert_eq!(second.len(), 4);
    }

    #[test]
    fn test_parse_installed_last_wins() {
        let output = "kernel.x86_64 5.14.0-362.8.1.el9_3 @baseos
kernel.x86_64 5.14.0-362.13.1.el9_3 @baseos
";

        let installed = DnfManager::parse_installed(output);

        assert_eq!(installed.len(), 1);
        assert_eq!(installed["kernel.x86_64"].current_version, "5.14.0-362.13.1.el9_3");
    }

    #[test]
    fn test_resolve_exact_match() {
        let installed = DnfManager::parse_installed(INSTALLED);
        assert_eq!(
            resolve_installed_version("curl.x86_64", &installed),
            Some("7.76.1-26.el9_3.2")
        );
    }

    #[test]
    fn test_resolve_candidate_arch_stripped() {
        let installed = HashMap::from([(
            "curl".to_string(),
            Package::installed("curl", "7.76.1-26.el9_3.2"),
        )]);
        assert_eq!(
            resolve_installed_version("curl.x86_64", &installed),
            Some("7.76.1-26.el9_3.2")
        );
    }

    #[test]
    fn test_resolve_installed_arch_stripped() {
        let installed = DnfManager::parse_installed(INSTALLED);
        assert_eq!(
            resolve_installed_version("python3-libs", &installed),
            Some("3.9.18-1.el9_3.1")
        );
        assert_eq!(
            resolve_installed_version("tzdata.i686", &installed),
            Some("2023c-1.el9")
        );
    }

    #[test]
    fn test_resolve_unknown_arch_not_stripped() {
        let installed = HashMap::from([(
            "java-17-openjdk".to_string(),
            Package::installed("java-17-openjdk", "17.0.9"),
        )]);
        assert_eq!(resolve_installed_version("java-17-openjdk.ppc64le", &installed), None);
    }

    #[test]
    fn test_strip_arch() {
        assert_eq!(strip_arch("bash.x86_64"), Some("bash"));
        assert_eq!(strip_arch("python3.11.noarch"), Some("python3.11"));
        assert_eq!(strip_arch("python3.11"), None);
        assert_eq!(strip_arch(".noarch"), None);
    }

    #[tokio::test]
    async fn test_parse_upgradable() {
        let installed = DnfManager::parse_installed(INSTALLED);
        let output = "Last metadata expiration check: 0:05:31 ago on Mon 15 Jan 2024 10:00:00 AM UTC.

curl.x86_64                7.76.1-26.el9_3.3           baseos
python3-libs.x86_64        3.9.18-1.el9_3.2            rhel-9-security
";
        let dnf = manager(ScriptedExecutor::new());

        let packages = dnf.parse_upgradable(output, "dnf", &installed).await;

        assert_eq!(packages.len(), 2);
        assert_eq!(
            packages[0],
            Package::upgrade("curl.x86_64", "7.76.1-26.el9_3.2", "7.76.1-26.el9_3.3")
        );
        assert!(packages[1].is_security_update);
        assert_eq!(packages[1].current_version, "3.9.18-1.el9_3.1");
    }

    #[tokio::test]
    async fn test_security_repo_match_ignores_case() {
        let installed = DnfManager::parse_installed(INSTALLED);
        let output = "\
curl.x86_64                7.76.1-26.el9_3.3           RHEL-Security
python3-libs.x86_64        3.9.18-1.el9_3.2            ol9_UEKR7
";
        let dnf = manager(ScriptedExecutor::new());

        let packages = dnf.parse_upgradable(output, "dnf", &installed).await;

        assert_eq!(packages.len(), 2);
        assert!(packages[0].is_security_update);
        assert!(!packages[1].is_security_update);
    }

    #[tokio::test]
    async fn test_parse_upgradable_queries_tool_as_last_resort() {
        let executor = ScriptedExecutor::new().with_output(
            "dnf list installed openssl.x86_64",
            0,
            "Installed Packages\nopenssl.x86_64    1:3.0.7-24.el9    @baseos\n",
        );
        let executor = Arc::new(executor);
        let dnf = DnfManager::new(executor.clone());
        let output = "openssl.x86_64    1:3.0.7-25.el9_3    baseos\n";

        let packages = dnf.parse_upgradable(output, "dnf", &HashMap::new()).await;

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].current_version, "1:3.0.7-24.el9");
        assert_eq!(executor.calls(), ["dnf list installed openssl.x86_64"]);
    }

    #[tokio::test]
    async fn test_parse_upgradable_drops_unresolved() {
        let dnf = manager(ScriptedExecutor::new());
        let output = "newpkg.noarch    1.0-1.el9    appstream\n";

        let packages = dnf.parse_upgradable(output, "dnf", &HashMap::new()).await;

        assert!(packages.is_empty());
    }

    #[tokio::test]
    async fn test_parse_upgradable_stops_at_obsoletes() {
        let installed = DnfManager::parse_installed(INSTALLED);
        let output = "curl.x86_64    7.76.1-26.el9_3.3    baseos

Obsoleting Packages
grub2-tools.x86_64    1:2.06-70.el9_3.2    baseos
    grub2-tools.x86_64    1:2.06-70.el9_3.1    @baseos
";
        let dnf = manager(ScriptedExecutor::new());

        let packages = dnf.parse_upgradable(output, "dnf", &installed).await;

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "curl.x86_64");
    }

    #[tokio::test]
    async fn test_get_packages_check_update_exit_100() {
        let executor = ScriptedExecutor::new()
            .with_programs(&["dnf"])
            .with_output("dnf list installed", 0, INSTALLED)
            .with_output(
                "dnf check-update",
                100,
                "\ncurl.x86_64    7.76.1-26.el9_3.3    baseos\n",
            );

        let packages = manager(executor).get_packages().await.unwrap();

        assert_eq!(packages.len(), 4);
        assert_eq!(packages[0].name, "curl.x86_64");
        assert!(packages[0].needs_update);
        assert_eq!(packages.iter().filter(|p| p.needs_update).count(), 1);
    }

    #[tokio::test]
    async fn test_get_packages_no_updates() {
        let executor = ScriptedExecutor::new()
            .with_programs(&["dnf"])
            .with_output("dnf list installed", 0, INSTALLED)
            .with_output("dnf check-update", 0, "");

        let packages = manager(executor).get_packages().await.unwrap();

        assert_eq!(packages.len(), 4);
        assert!(packages.iter().all(|p| !p.needs_update));
    }

    #[tokio::test]
    async fn test_get_packages_falls_back_to_yum() {
        let executor = ScriptedExecutor::new()
            .with_programs(&["yum"])
            .with_output("yum list installed", 0, "bash.x86_64 4.2.46-34.el7 @base\n")
            .with_output("yum check-update", 100, "bash.x86_64 4.2.46-35.el7_9 updates\n");
        let dnf = manager(executor);

        let packages = dnf.get_packages().await.unwrap();

        assert_eq!(dnf.tool(), "yum");
        assert_eq!(
            packages,
            vec![Package::upgrade("bash.x86_64", "4.2.46-34.el7", "4.2.46-35.el7_9")]
        );
    }

    #[tokio::test]
    async fn test_get_packages_without_tool() {
        let result = manager(ScriptedExecutor::new()).get_packages().await;
        assert!(matches!(result, Err(PackageError::ManagerNotFound(_))));
    }
}
