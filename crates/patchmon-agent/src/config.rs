//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{WrapErr, bail};
use patchmon_pkg::{InventoryOptions, SourceKind};
use serde::{Deserialize, Serialize};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "PATCHMON_AGENT_CONFIG";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration for the agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Agent runtime settings
    #[serde(default)]
    pub agent: AgentConfig,
    /// Package collection settings
    #[serde(default)]
    pub packages: PackagesConfig,
}

/// Agent runtime settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Package collection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagesConfig {
    /// Sources to collect; empty means detect from the host
    #[serde(default)]
    pub sources: Vec<String>,
    /// Refresh APT indices before listing
    #[serde(default = "default_refresh_indices")]
    pub refresh_indices: bool,
    /// Upper bound on one collection run; 0 disables it
    #[serde(default)]
    pub collection_timeout_secs: u64,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            refresh_indices: default_refresh_indices(),
            collection_timeout_secs: 0,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_refresh_indices() -> bool {
    true
}

impl Config {
    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not valid TOML or a value is out of range
    pub fn from_toml(content: &str) -> eyre::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .wrap_err_with(|| format!("invalid config file {}", path.display()))
    }

    /// Find the configuration file to use
    ///
    /// An explicit path wins, then `PATCHMON_AGENT_CONFIG`, then the first
    /// existing file among the default locations.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }

        default_paths().into_iter().find(|path| path.exists())
    }

    /// Check values serde cannot
    ///
    /// # Errors
    /// Returns error on an unknown log level or package source
    pub fn validate(&self) -> eyre::Result<()> {
        let level = self.agent.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            bail!(
                "unknown log level '{}' (expected one of {})",
                self.agent.log_level,
                LOG_LEVELS.join(", ")
            );
        }

        self.source_kinds()?;
        Ok(())
    }

    /// Configured package sources
    ///
    /// # Errors
    /// Returns error if a source name is not recognised
    pub fn source_kinds(&self) -> eyre::Result<Vec<SourceKind>> {
        self.packages
            .sources
            .iter()
            .map(|name| {
                name.parse::<SourceKind>()
                    .map_err(|e| eyre::eyre!("invalid packages.sources entry: {e}"))
            })
            .collect()
    }

    /// Options for building the package inventory
    ///
    /// # Errors
    /// Returns error if a source name is not recognised
    pub fn inventory_options(&self) -> eyre::Result<InventoryOptions> {
        Ok(InventoryOptions {
            sources: self.source_kinds()?,
            refresh_indices: self.packages.refresh_indices,
        })
    }

    /// Collection timeout, if one is configured
    pub fn collection_timeout(&self) -> Option<Duration> {
        match self.packages.collection_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Render the effective configuration as TOML
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_toml(&self) -> eyre::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("patchmon-agent.toml"),
        PathBuf::from("/etc/patchmon/agent.toml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("patchmon/agent.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.agent.log_level, "info");
        assert_eq!(config.agent.log_format, LogFormat::Text);
        assert!(config.packages.sources.is_empty());
        assert!(config.packages.refresh_indices);
        assert_eq!(config.collection_timeout(), None);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            [agent]
            log_level = "debug"
            log_format = "json"

            [packages]
            sources = ["dnf", "apt"]
            refresh_indices = false
            collection_timeout_secs = 300
            "#,
        )
        .unwrap();

        assert_eq!(config.agent.log_format, LogFormat::Json);
        assert_eq!(config.collection_timeout(), Some(Duration::from_secs(300)));

        let options = config.inventory_options().unwrap();
        assert_eq!(options.sources, [SourceKind::Dnf, SourceKind::Apt]);
        assert!(!options.refresh_indices);
    }

    #[test]
    fn test_source_aliases() {
        let config = Config::from_toml(
            r#"
            [packages]
            sources = ["yum", "wua"]
            "#,
        )
        .unwrap();

        assert_eq!(
            config.source_kinds().unwrap(),
            [SourceKind::Dnf, SourceKind::WindowsUpdate]
        );
    }

    #[test]
    fn test_unknown_source_rejected() {
        let err = Config::from_toml(
            r#"
            [packages]
            sources = ["pacman"]
            "#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("pacman"));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let result = Config::from_toml(
            r#"
            [agent]
            log_level = "verbose"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let result = Config::from_toml(
            r#"
            [agent]
            log_format = "xml"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_output_reloads() {
        let mut config = Config::default();
        config.packages.sources = vec!["apt".to_string()];
        config.packages.collection_timeout_secs = 60;

        let rendered = config.to_toml().unwrap();

        assert!(rendered.contains("[agent]"));
        assert!(rendered.contains("[packages]"));
        assert_eq!(Config::from_toml(&rendered).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "patchmon-agent-config-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[agent]\nlog_level = \"warn\"\n").unwrap();

        let config = Config::load(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.unwrap().agent.log_level, "warn");
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/patchmon/agent.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = Path::new("/tmp/explicit.toml");
        assert_eq!(Config::locate(Some(path)), Some(path.to_path_buf()));
    }
}
