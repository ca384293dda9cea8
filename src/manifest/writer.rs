//! Builds a release manifest from per-application version files and writes
//! the stamped and latest copies.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::ReleaseManifest;
use crate::core::{persist_pair, ApplicationId, ReleaseError, ReleaseResult, StagedFile};

/// The `version` field of an application's descriptor (`package.json`).
#[derive(Debug, Deserialize)]
struct VersionDescriptor {
    version: Option<String>,
}

/// Files written for one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestPaths {
    /// `<output>/<release>.json`
    pub stamped: PathBuf,

    /// `<output>/<latest>.json`
    pub latest: PathBuf,
}

/// Collects application versions and writes release manifests.
#[derive(Debug, Clone)]
pub struct ManifestWriter {
    /// Workspace root containing the application directories
    root: PathBuf,

    /// Directory receiving the manifests
    output_dir: PathBuf,

    /// File stem of the latest alias
    latest_name: String,

    /// Version descriptor file name inside each application directory
    version_file: String,
}

impl ManifestWriter {
    /// Create a writer reading from `root` and writing into `output_dir`.
    pub fn new(root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output_dir: output_dir.into(),
            latest_name: "latest".to_string(),
            version_file: "package.json".to_string(),
        }
    }

    /// Use a different stem for the latest alias.
    pub fn with_latest_name(mut self, name: impl Into<String>) -> Self {
        self.latest_name = name.into();
        self
    }

    /// Use a different version descriptor file name.
    pub fn with_version_file(mut self, name: impl Into<String>) -> Self {
        self.version_file = name.into();
        self
    }

    /// Read every application's version into a manifest for `release`.
    pub fn collect(&self, dirs: &[String], release: &str) -> ReleaseResult<ReleaseManifest> {
        self.check_release(release)?;

        let mut manifest = ReleaseManifest::new(release);
        for dir in dirs {
            let path = self.root.join(dir).join(&self.version_file);
            let version = read_version(&path)?;
            let name = ApplicationId::from_dir(dir);
            tracing::debug!(application = %name, version = %version, "Collected version");
            manifest.modules.insert(name.as_str(), version);
        }

        Ok(manifest)
    }

    /// Write the manifest under its release identifier and the latest alias.
    ///
    /// The content is serialized once and staged into temporary files next to
    /// the targets; the targets are only replaced once both copies are staged.
    pub fn write(&self, manifest: &ReleaseManifest) -> ReleaseResult<ManifestPaths> {
        self.check_release(&manifest.release)?;

        let content = manifest.to_pretty_json()?;
        fs::create_dir_all(&self.output_dir).map_err(|e| ReleaseError::io(&self.output_dir, e))?;

        let paths = ManifestPaths {
            stamped: self.output_dir.join(format!("{}.json", manifest.release)),
            latest: self.output_dir.join(format!("{}.json", self.latest_name)),
        };

        let staged_stamped = StagedFile::new(&paths.stamped, &content)?;
        let staged_latest = StagedFile::new(&paths.latest, &content)?;
        persist_pair(staged_stamped, staged_latest)?;

        for target in [&paths.stamped, &paths.latest] {
            tracing::info!(path = %target.display(), "Wrote release manifest");
        }
        Ok(paths)
    }

    /// Collect and write in one step.
    pub fn run(&self, dirs: &[String], release: &str) -> ReleaseResult<ManifestPaths> {
        let manifest = self.collect(dirs, release)?;
        self.write(&manifest)
    }

    fn check_release(&self, release: &str) -> ReleaseResult<()> {
        if release.trim().is_empty() {
            return Err(ReleaseError::Configuration("release identifier is empty".to_string()));
        }
        if release.contains(['/', '\\']) || release == "." || release == ".." {
            return Err(ReleaseError::Configuration(format!(
                "release identifier '{}' is not a valid file name",
                release
            )));
        }
        if release == self.latest_name {
            return Err(ReleaseError::Configuration(format!(
                "release identifier '{}' collides with the latest alias",
                release
            )));
        }
        Ok(())
    }
}

/// Read the `version` field of a version descriptor file.
pub fn read_version(path: &Path) -> ReleaseResult<String> {
    let content = fs::read_to_string(path).map_err(|e| ReleaseError::io(path, e))?;
    let descriptor: VersionDescriptor = serde_json::from_str(&content)
        .map_err(|e| ReleaseError::Format(format!("{}: {}", path.display(), e)))?;
    descriptor
        .version
        .ok_or_else(|| ReleaseError::Lookup(format!("no 'version' field in {}", path.display())))
}
