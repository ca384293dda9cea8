//! Chart descriptor (`Chart.yaml`): semantic version and app version.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_yaml::Value;

use super::yaml_edit::ScalarEdit;
use crate::core::{ReleaseError, ReleaseResult};

/// Fields of `Chart.yaml` the updater reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDescriptor {
    /// Chart version, `MAJOR.MINOR.PATCH`
    #[serde(default)]
    pub version: Option<Value>,

    /// Release identifier of the packaged applications
    #[serde(default)]
    pub app_version: Option<Value>,
}

/// A three-part dotted integer version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChartVersion {
    /// Major component
    pub major: u64,
    /// Minor component
    pub minor: u64,
    /// Patch component
    pub patch: u64,
}

impl ChartVersion {
    /// The next patch version; major and minor stay the same.
    pub fn bump_patch(self) -> ReleaseResult<Self> {
        let patch = self.patch.checked_add(1).ok_or_else(|| {
            ReleaseError::Format(format!("chart version '{}' has no next patch version", self))
        })?;
        Ok(Self { patch, ..self })
    }
}

impl FromStr for ChartVersion {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ReleaseError::Format(format!("chart version '{}' is not MAJOR.MINOR.PATCH", s));

        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }

        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }

        Ok(Self { major: numbers[0], minor: numbers[1], patch: numbers[2] })
    }
}

impl fmt::Display for ChartVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Edits and resulting version for one chart bump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorUpdate {
    /// Version before the bump
    pub previous: ChartVersion,

    /// Version after the bump
    pub version: ChartVersion,

    /// New app version
    pub app_version: String,

    /// Text edits to apply to `Chart.yaml`
    pub edits: Vec<ScalarEdit>,
}

impl ChartDescriptor {
    /// Parse the descriptor from YAML text.
    pub fn from_yaml(text: &str) -> ReleaseResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// The current chart version.
    pub fn chart_version(&self) -> ReleaseResult<ChartVersion> {
        match &self.version {
            Some(Value::String(s)) => s.parse(),
            Some(Value::Number(n)) => n.to_string().parse(),
            Some(other) => Err(ReleaseError::Format(format!(
                "chart version must be a string, found {:?}",
                other
            ))),
            None => Err(ReleaseError::Lookup("key 'version' not found in Chart.yaml".to_string())),
        }
    }

    /// Plan the patch bump and app version change.
    pub fn plan_update(&self, release: &str) -> ReleaseResult<DescriptorUpdate> {
        let previous = self.chart_version()?;
        if self.app_version.is_none() {
            return Err(ReleaseError::missing_key(&["appVersion"], "Chart.yaml"));
        }

        let version = previous.bump_patch()?;
        Ok(DescriptorUpdate {
            previous,
            version,
            app_version: release.to_string(),
            edits: vec![
                ScalarEdit::new(&["version"], version.to_string()),
                ScalarEdit::new(&["appVersion"], release),
            ],
        })
    }
}
