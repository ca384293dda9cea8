//! Change detection.
//!
//! Each CI run publishes one value per application: either the new version
//! or a sentinel meaning the application did not change. The detector turns
//! those values into the list of changed applications and the records the
//! chart updater consumes.

mod encoding;

pub use encoding::{decode_shell_arg, encode_shell_arg, shell_escape, shell_unescape};

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use crate::core::{ApplicationId, ApplicationRecord, ReleaseError, ReleaseResult};

/// Per-application version values for one CI run.
#[derive(Debug, Clone, Default)]
pub struct ReleaseValues {
    values: HashMap<ApplicationId, String>,
}

impl ReleaseValues {
    /// Create an empty value set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from explicit `(application, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<ApplicationId>,
        V: Into<String>,
    {
        Self { values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }

    /// Read each application's value from the process environment.
    ///
    /// Applications without a variable are left out; [`detect_changes`]
    /// reports them.
    pub fn from_env(apps: &[ApplicationId]) -> Self {
        let mut values = Self::new();
        for app in apps {
            if let Ok(value) = std::env::var(app.env_var()) {
                values.insert(app.clone(), value);
            }
        }
        values
    }

    /// Read values from a dotenv file, letting the process environment
    /// override it.
    pub fn from_env_file(path: &Path, apps: &[ApplicationId]) -> ReleaseResult<Self> {
        let iter = dotenvy::from_path_iter(path).map_err(|e| match e {
            dotenvy::Error::Io(source) => ReleaseError::io(path, source),
            other => ReleaseError::Configuration(format!("{}: {}", path.display(), other)),
        })?;

        let mut file_values = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| {
                ReleaseError::Configuration(format!("{}: {}", path.display(), e))
            })?;
            file_values.insert(key, value);
        }

        let mut values = Self::new();
        for app in apps {
            let var = app.env_var();
            let value = std::env::var(&var).ok().or_else(|| file_values.remove(&var));
            if let Some(value) = value {
                values.insert(app.clone(), value);
            }
        }

        tracing::debug!(path = %path.display(), count = values.len(), "Loaded release values");
        Ok(values)
    }

    /// Set the value for an application.
    pub fn insert(&mut self, app: ApplicationId, value: impl Into<String>) {
        self.values.insert(app, value.into());
    }

    /// Get the value for an application.
    pub fn get(&self, app: &ApplicationId) -> Option<&str> {
        self.values.get(app).map(String::as_str)
    }

    /// Number of applications with a value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no application has a value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Result of a change detection run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    /// Changed applications, in configured order
    pub changed: Vec<ApplicationId>,

    /// One record per changed application
    pub records: Vec<ApplicationRecord>,
}

impl ChangeSet {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// The two shell-safe words printed by `relman detect`:
    /// the changed list and the record list, separated by a space.
    pub fn to_shell_line(&self) -> ReleaseResult<String> {
        Ok(format!("{} {}", encode_shell_arg(&self.changed)?, encode_shell_arg(&self.records)?))
    }
}

/// Find the applications whose value is not `sentinel`.
///
/// Fails with a configuration error, and produces nothing, if any declared
/// application has no value at all or a value with a control character
/// (a newline cannot survive as part of a shell word).
pub fn detect_changes(
    apps: &[ApplicationId],
    values: &ReleaseValues,
    sentinel: &str,
) -> ReleaseResult<ChangeSet> {
    let missing: Vec<String> =
        apps.iter().filter(|app| values.get(app).is_none()).map(|app| app.env_var()).collect();
    if !missing.is_empty() {
        return Err(ReleaseError::Configuration(format!(
            "no value for {}",
            missing.join(", ")
        )));
    }

    let mut changes = ChangeSet::default();
    for app in apps {
        let Some(value) = values.get(app) else { continue };
        if value == sentinel {
            continue;
        }
        if value.chars().any(char::is_control) {
            return Err(ReleaseError::Configuration(format!(
                "value of {} contains a control character",
                app.env_var()
            )));
        }

        tracing::debug!(application = %app, version = value, "Application changed");
        changes.changed.push(app.clone());
        changes.records.push(ApplicationRecord::new(app, value));
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn apps(names: &[&str]) -> Vec<ApplicationId> {
        names.iter().map(|n| ApplicationId::new(*n)).collect()
    }

    #[test]
    fn test_detects_single_change() {
        let apps = apps(&["engine-core", "engine-monitor"]);
        let values =
            ReleaseValues::from_pairs([("engine-core", "2.0.0"), ("engine-monitor", "not-changed")]);

        let changes = detect_changes(&apps, &values, "not-changed").unwrap();

        assert_eq!(changes.changed, vec![ApplicationId::new("engine-core")]);
        assert_eq!(changes.records.len(), 1);
        let record = &changes.records[0];
        assert_eq!(record.application, "engine-core");
        assert_eq!(record.version, "2.0.0");
        assert_eq!(record.rootdir.as_deref(), Some("engine"));
        assert_eq!(record.appdir.as_deref(), Some("core"));
    }

    #[test]
    fn test_value_with_newline_is_rejected() {
        let apps = apps(&["engine-core", "studio"]);
        let values = ReleaseValues::from_pairs([("engine-core", "2.0.0\nrm"), ("studio", "1.0.0")]);

        let err = detect_changes(&apps, &values, "not-changed").unwrap_err();
        assert!(matches!(err, ReleaseError::Configuration(ref msg) if msg.contains("ENGINE_CORE")));
    }

    #[test]
    fn test_changed_count_matches_non_sentinel_values() {
        let apps = apps(&["engine-core", "engine-worker", "platform-core", "studio"]);
        let values = ReleaseValues::from_pairs([
            ("engine-core", "not-changed"),
            ("engine-worker", "1.0.1"),
            ("platform-core", "not-changed"),
            ("studio", "3.2.0"),
        ]);

        let changes = detect_changes(&apps, &values, "not-changed").unwrap();

        assert_eq!(changes.changed.len(), 2);
        for record in &changes.records {
            assert_eq!(values.get(&record.id()), Some(record.version.as_str()));
        }
    }

    #[test]
    fn test_preserves_configured_order() {
        let apps = apps(&["studio", "engine-worker", "platform-sync"]);
        let values = ReleaseValues::from_pairs([
            ("platform-sync", "1"),
            ("studio", "2"),
            ("engine-worker", "3"),
        ]);

        let changes = detect_changes(&apps, &values, "not-changed").unwrap();
        let names: Vec<&str> = changes.changed.iter().map(|a| a.as_str()).collect();
        assert_eq!(names, vec!["studio", "engine-worker", "platform-sync"]);
    }

    #[test]
    fn test_standalone_record_uses_dot_root() {
        let apps = apps(&["studio"]);
        let values = ReleaseValues::from_pairs([("studio", "1.0.0")]);

        let changes = detect_changes(&apps, &values, "not-changed").unwrap();
        assert_eq!(changes.records[0].rootdir.as_deref(), Some("."));
        assert_eq!(changes.records[0].appdir.as_deref(), Some("studio"));
    }

    #[test]
    fn test_missing_value_is_configuration_error() {
        let apps = apps(&["engine-core", "platform-worker"]);
        let values = ReleaseValues::from_pairs([("engine-core", "2.0.0")]);

        let err = detect_changes(&apps, &values, "not-changed").unwrap_err();
        assert!(matches!(err, ReleaseError::Configuration(_)));
        assert!(err.to_string().contains("PLATFORM_WORKER"));
    }

    #[test]
    fn test_nothing_changed() {
        let apps = apps(&["engine-core"]);
        let values = ReleaseValues::from_pairs([("engine-core", "not-changed")]);

        let changes = detect_changes(&apps, &values, "not-changed").unwrap();
        assert!(changes.is_empty());
        assert_eq!(changes.to_shell_line().unwrap(), r"\[\] \[\]");
    }

    #[test]
    fn test_shell_line_has_two_words() {
        let apps = apps(&["engine-core", "studio"]);
        let values = ReleaseValues::from_pairs([("engine-core", "2.0.0"), ("studio", "1.0.0")]);

        let line = detect_changes(&apps, &values, "not-changed").unwrap().to_shell_line().unwrap();
        let words: Vec<&str> = line.split(' ').collect();
        assert_eq!(words.len(), 2);

        let records: Vec<ApplicationRecord> = decode_shell_arg(words[1]).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].application, "studio");
    }

    #[test]
    #[serial(release_env)]
    fn test_from_env_reads_variables() {
        std::env::set_var("RELMAN_TEST_APP_ALPHA", "4.5.6");
        std::env::remove_var("RELMAN_TEST_APP_BETA");

        let apps = apps(&["relman_test_app-alpha", "relman_test_app-beta"]);
        let values = ReleaseValues::from_env(&apps);

        std::env::remove_var("RELMAN_TEST_APP_ALPHA");

        assert_eq!(values.get(&apps[0]), Some("4.5.6"));
        assert_eq!(values.get(&apps[1]), None);
    }

    #[test]
    #[serial(release_env)]
    fn test_env_overrides_env_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("release.env");
        std::fs::write(
            &path,
            "RELMAN_TEST_FILE_CORE=1.0.0\nRELMAN_TEST_FILE_WORKER=not-changed\n",
        )
        .unwrap();
        std::env::set_var("RELMAN_TEST_FILE_WORKER", "1.1.0");

        let apps = apps(&["relman_test_file-core", "relman_test_file-worker"]);
        let values = ReleaseValues::from_env_file(&path, &apps).unwrap();

        std::env::remove_var("RELMAN_TEST_FILE_WORKER");

        assert_eq!(values.get(&apps[0]), Some("1.0.0"));
        assert_eq!(values.get(&apps[1]), Some("1.1.0"));
    }

    #[test]
    fn test_missing_env_file_is_io_error() {
        let result = ReleaseValues::from_env_file(Path::new("/nonexistent/release.env"), &[]);
        assert!(matches!(result, Err(ReleaseError::Io { .. })));
    }
}
