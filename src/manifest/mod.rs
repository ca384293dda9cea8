//! Release manifests.
//!
//! A manifest records the version of every application at a given release.
//! Each release is written twice: once under its own identifier and once
//! under the `latest` alias.

mod diff;
mod writer;

pub use diff::{diff_releases, image_reference, DeploymentUpdate, ReleaseDiff};
pub use writer::{read_version, ManifestPaths, ManifestWriter};

use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::{ReleaseError, ReleaseResult};

/// Application versions for one release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    /// Release identifier
    pub release: String,

    /// Application name to version, in configured order
    pub modules: Modules,
}

/// Ordered mapping from application name to version.
///
/// Serialized as a JSON object whose key order is the insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modules(Vec<(String, String)>);

impl Modules {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a version, keeping the original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, version: impl Into<String>) {
        let name = name.into();
        let version = version.into();
        if let Some(entry) = self.0.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = version;
        } else {
            self.0.push((name, version));
        }
    }

    /// Version of an application.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    /// Iterate over `(name, version)` in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Application names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    /// Number of applications.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Modules {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, version) in &self.0 {
            map.serialize_entry(name, version)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Modules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ModulesVisitor;

        impl<'de> Visitor<'de> for ModulesVisitor {
            type Value = Modules;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of application names to versions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Modules, A::Error> {
                let mut modules = Modules::new();
                while let Some((name, version)) = access.next_entry::<String, String>()? {
                    modules.insert(name, version);
                }
                Ok(modules)
            }
        }

        deserializer.deserialize_map(ModulesVisitor)
    }
}

impl ReleaseManifest {
    /// Create an empty manifest for a release.
    pub fn new(release: impl Into<String>) -> Self {
        Self { release: release.into(), modules: Modules::new() }
    }

    /// Pretty JSON with a trailing newline, as written to disk.
    pub fn to_pretty_json(&self) -> ReleaseResult<String> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        Ok(content)
    }
}

/// Load a manifest written by [`ManifestWriter`].
pub fn read_manifest(path: &Path) -> ReleaseResult<ReleaseManifest> {
    let content = std::fs::read_to_string(path).map_err(|e| ReleaseError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| ReleaseError::Format(format!("{} is not a release manifest: {}", path.display(), e)))
}
