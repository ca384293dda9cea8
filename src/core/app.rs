//! Application identifiers and the records passed between release stages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root directory reported for applications that do not belong to a group.
pub const STANDALONE_ROOT: &str = ".";

/// Name of a deployable application, such as `engine-core` or `studio`.
///
/// The part before the first `-` is the group (its root directory in the
/// repository); the rest is the component. Names without a `-` are standalone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(String);

impl ApplicationId {
    /// Create an identifier from its hyphenated name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive the identifier from a repository directory such as `engine/core`.
    pub fn from_dir(dir: &str) -> Self {
        let trimmed = dir.trim_start_matches("./").trim_matches(|c| c == '/' || c == '\\');
        Self(trimmed.replace(['/', '\\'], "-"))
    }

    /// The hyphenated name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Environment variable carrying this application's version, e.g. `ENGINE_CORE`.
    pub fn env_var(&self) -> String {
        self.0.to_uppercase().replace('-', "_")
    }

    /// Group the application belongs to, if any.
    pub fn group(&self) -> Option<&str> {
        self.0.split_once('-').map(|(group, _)| group)
    }

    /// Component name within the group, or the whole name when standalone.
    pub fn component(&self) -> &str {
        self.0.split_once('-').map_or(self.0.as_str(), |(_, component)| component)
    }

    /// Root directory: the group, or `.` for standalone applications.
    pub fn root_dir(&self) -> &str {
        self.group().unwrap_or(STANDALONE_ROOT)
    }

    /// Application directory below the root directory.
    pub fn app_dir(&self) -> &str {
        self.component()
    }

    /// Whether the application has no group.
    pub fn is_standalone(&self) -> bool {
        self.group().is_none()
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApplicationId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A changed application as emitted by the change detector and consumed by
/// the chart updater.
///
/// Records are always written with all four fields. When reading, `rootdir`
/// and `appdir` may be absent and are then derived from the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// Hyphenated application name
    pub application: String,

    /// Released version
    pub version: String,

    /// Root directory (`.` for standalone applications)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rootdir: Option<String>,

    /// Application directory below `rootdir`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appdir: Option<String>,
}

impl ApplicationRecord {
    /// Build the canonical record for an application and version.
    pub fn new(id: &ApplicationId, version: impl Into<String>) -> Self {
        Self {
            application: id.as_str().to_string(),
            version: version.into(),
            rootdir: Some(id.root_dir().to_string()),
            appdir: Some(id.app_dir().to_string()),
        }
    }

    /// Identifier of the recorded application.
    pub fn id(&self) -> ApplicationId {
        ApplicationId::new(self.application.clone())
    }

    /// Root directory, derived from the name when the record omits it.
    pub fn root_dir(&self) -> &str {
        match self.rootdir.as_deref() {
            Some(root) if !root.is_empty() => root,
            _ => self.application.split_once('-').map_or(STANDALONE_ROOT, |(group, _)| group),
        }
    }

    /// Application directory, derived from the name when the record omits it.
    pub fn app_dir(&self) -> &str {
        match self.appdir.as_deref() {
            Some(app) if !app.is_empty() => app,
            _ => self
                .application
                .split_once('-')
                .map_or(self.application.as_str(), |(_, component)| component),
        }
    }

    /// Whether the record describes a standalone application.
    pub fn is_standalone(&self) -> bool {
        self.root_dir() == STANDALONE_ROOT
    }
}
