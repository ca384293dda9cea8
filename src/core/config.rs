//! Configuration management for Relman.
//!
//! Handles loading configuration from TOML files. Every field has a default
//! that matches the platform repository layout, so a config file is optional.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::app::ApplicationId;
use super::error::{ReleaseError, ReleaseResult};

/// Marker value meaning "no new release for this application".
pub const DEFAULT_SENTINEL: &str = "not-changed";

/// Environment variable holding the release identifier.
pub const DEFAULT_RELEASE_ENV: &str = "RELEASE_NUMBER";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Known applications
    pub apps: AppsConfig,

    /// Manifest writer settings
    pub manifest: ManifestConfig,

    /// Chart updater settings
    pub chart: ChartConfig,

    /// Deployment settings used by the release diff
    pub deploy: DeployConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Value marking an application as unchanged
    pub sentinel: String,

    /// Environment variable holding the release identifier
    pub release_env: String,
}

/// The fixed, ordered set of applications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppsConfig {
    /// Application directories relative to the workspace root
    pub dirs: Vec<String>,
}

/// Manifest writer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Workspace root containing the application directories
    pub root: String,

    /// Directory receiving `<release>.json` and the latest alias
    pub output_dir: String,

    /// File stem of the latest alias
    pub latest_name: String,

    /// Version descriptor file inside each application directory
    pub version_file: String,
}

/// Chart updater settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Path to the values document
    pub values: String,

    /// Path to the chart descriptor
    pub chart: String,

    /// Components never deployed through the chart, as `group/component`
    pub exempt: Vec<String>,
}

/// Deployment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Image registry prefix
    pub registry: String,

    /// Modules whose new tag is rolled out to API server instances instead of
    /// a single deployment
    pub api_server_modules: Vec<String>,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.relman.toml` in current directory
    /// 2. `~/.config/relman/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(".relman.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Path of the config file that [`Config::load`] would read, if any.
    pub fn active_path() -> Option<PathBuf> {
        let local_config = PathBuf::from(".relman.toml");
        if local_config.exists() {
            return Some(local_config);
        }
        Self::config_dir().map(|d| d.join("config.toml")).filter(|p| p.exists())
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("relman"))
    }

    /// Check the invariants the stages rely on.
    pub fn validate(&self) -> ReleaseResult<()> {
        if self.general.sentinel.is_empty() {
            return Err(ReleaseError::Configuration("sentinel must not be empty".to_string()));
        }
        if self.apps.dirs.is_empty() {
            return Err(ReleaseError::Configuration("no applications configured".to_string()));
        }

        let mut seen = HashSet::new();
        for id in self.applications() {
            if !seen.insert(id.clone()) {
                return Err(ReleaseError::Configuration(format!(
                    "application '{}' is declared twice",
                    id
                )));
            }
        }

        if let Some(entry) = self.chart.exempt.iter().find(|entry| parse_exempt(entry).is_none()) {
            return Err(ReleaseError::Configuration(format!(
                "exempt entry '{}' must be 'group/component'",
                entry
            )));
        }

        Ok(())
    }

    /// The configured applications, in declaration order.
    pub fn applications(&self) -> Vec<ApplicationId> {
        self.apps.dirs.iter().map(|dir| ApplicationId::from_dir(dir)).collect()
    }

    /// Exempt `(group, component)` pairs from `chart.exempt`.
    ///
    /// Entries that are not `group/component` are left out; [`Config::validate`]
    /// rejects them.
    pub fn exempt_components(&self) -> Vec<(&str, &str)> {
        self.chart.exempt.iter().filter_map(|entry| parse_exempt(entry)).collect()
    }

    /// Workspace root, with `~` expanded.
    pub fn manifest_root(&self) -> PathBuf {
        expand_path(&self.manifest.root)
    }

    /// Manifest output directory, with `~` expanded.
    pub fn manifest_output_dir(&self) -> PathBuf {
        expand_path(&self.manifest.output_dir)
    }

    /// Values document path, with `~` expanded.
    pub fn values_path(&self) -> PathBuf {
        expand_path(&self.chart.values)
    }

    /// Chart descriptor path, with `~` expanded.
    pub fn chart_path(&self) -> PathBuf {
        expand_path(&self.chart.chart)
    }
}

fn parse_exempt(entry: &str) -> Option<(&str, &str)> {
    entry
        .split_once('/')
        .filter(|(group, component)| !group.is_empty() && !component.is_empty() && !component.contains('/'))
}

/// Expand a leading `~` in a configured path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_SENTINEL.to_string(),
            release_env: DEFAULT_RELEASE_ENV.to_string(),
        }
    }
}

impl Default for AppsConfig {
    fn default() -> Self {
        Self {
            dirs: vec![
                "engine/core".to_string(),
                "engine/worker".to_string(),
                "engine/realtime".to_string(),
                "engine/scheduler".to_string(),
                "engine/monitor".to_string(),
                "platform/core".to_string(),
                "platform/sync".to_string(),
                "platform/worker".to_string(),
                "studio".to_string(),
            ],
        }
    }
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            output_dir: "releases".to_string(),
            latest_name: "latest".to_string(),
            version_file: "package.json".to_string(),
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            values: "base/values.yaml".to_string(),
            chart: "base/Chart.yaml".to_string(),
            exempt: vec!["engine/core".to_string()],
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            registry: "gcr.io/agnost-community".to_string(),
            api_server_modules: vec!["engine-core".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.sentinel, "not-changed");
        assert_eq!(config.general.release_env, "RELEASE_NUMBER");
        assert_eq!(config.applications().len(), 9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_application_order() {
        let config = Config::default();
        let names: Vec<String> =
            config.applications().iter().map(|a| a.as_str().to_string()).collect();
        assert_eq!(names.first().map(String::as_str), Some("engine-core"));
        assert_eq!(names.last().map(String::as_str), Some("studio"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            sentinel = "unchanged"

            [apps]
            dirs = ["engine/core", "studio"]

            [chart]
            values = "deploy/values.yaml"
            exempt = []
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.sentinel, "unchanged");
        assert_eq!(config.general.release_env, "RELEASE_NUMBER");
        assert_eq!(config.apps.dirs, vec!["engine/core", "studio"]);
        assert_eq!(config.chart.values, "deploy/values.yaml");
        assert_eq!(config.chart.chart, "base/Chart.yaml");
        assert!(config.exempt_components().is_empty());
    }

    #[test]
    fn test_exempt_components() {
        let config = Config::default();
        assert_eq!(config.exempt_components(), vec![("engine", "core")]);
    }

    #[test]
    fn test_validate_rejects_malformed_exempt_entry() {
        for bad in ["core", "/core", "engine/", "engine/core/x"] {
            let mut config = Config::default();
            config.chart.exempt = vec![bad.to_string()];
            assert!(
                matches!(config.validate(), Err(ReleaseError::Configuration(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_load_from_file_rejects_exempt_without_group() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("relman.toml");
        std::fs::write(&path, "[chart]\nexempt = [\"core\"]\n").unwrap();

        assert!(Config::load_from_file(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut config = Config::default();
        config.apps.dirs.push("engine/core".to_string());
        assert!(matches!(config.validate(), Err(ReleaseError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_empty_sentinel() {
        let mut config = Config::default();
        config.general.sentinel.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("relman.toml");
        std::fs::write(&path, "[manifest]\noutput_dir = \"out\"\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.manifest.output_dir, "out");
        assert_eq!(config.manifest.latest_name, "latest");
    }

    #[test]
    fn test_expand_path_leaves_relative_paths() {
        assert_eq!(expand_path("base/values.yaml"), PathBuf::from("base/values.yaml"));
    }
}
