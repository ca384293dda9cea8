//! Compares two release manifests to find the deployments a cluster must
//! roll to move from one release to another.

use serde::Serialize;

use super::ReleaseManifest;
use crate::core::DeployConfig;

/// A deployment whose image tag changes between two releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentUpdate {
    /// Kubernetes deployment name, `<module>-deployment`
    pub deployment_name: String,

    /// New image tag
    pub tag: String,

    /// Full image reference
    pub image: String,

    /// Whether the update targets an API server instance
    pub api_server: bool,
}

/// Outcome of comparing two releases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseDiff {
    /// Deployments to update, in the order of the new manifest
    pub updates: Vec<DeploymentUpdate>,

    /// New tag for API server modules, which are rolled out per instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_server_tag: Option<String>,
}

impl ReleaseDiff {
    /// Whether the releases deploy the same images.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.api_server_tag.is_none()
    }
}

/// Image reference for a module: the first `-` of the name becomes a path
/// separator (`engine-worker` -> `<registry>/engine/worker:<tag>`).
pub fn image_reference(registry: &str, module: &str, tag: &str) -> String {
    format!("{}/{}:{}", registry.trim_end_matches('/'), module.replacen('-', "/", 1), tag)
}

/// List the deployments whose version differs between `old` and `new`.
///
/// Modules only present in `new` are included; modules dropped from `new`
/// are ignored.
pub fn diff_releases(old: &ReleaseManifest, new: &ReleaseManifest, deploy: &DeployConfig) -> ReleaseDiff {
    let mut diff = ReleaseDiff::default();

    for (module, tag) in new.modules.iter() {
        if old.modules.get(module) == Some(tag) {
            continue;
        }

        if deploy.api_server_modules.iter().any(|m| m == module) {
            diff.api_server_tag = Some(tag.to_string());
            continue;
        }

        diff.updates.push(DeploymentUpdate {
            deployment_name: format!("{}-deployment", module),
            tag: tag.to_string(),
            image: image_reference(&deploy.registry, module, tag),
            api_server: false,
        });
    }

    tracing::debug!(
        from = %old.release,
        to = %new.release,
        updates = diff.updates.len(),
        api_server = diff.api_server_tag.is_some(),
        "Compared releases"
    );

    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(release: &str, modules: &[(&str, &str)]) -> ReleaseManifest {
        let mut manifest = ReleaseManifest::new(release);
        for (name, version) in modules {
            manifest.modules.insert(*name, *version);
        }
        manifest
    }

    #[test]
    fn test_unchanged_modules_are_skipped() {
        let old = manifest("v1", &[("engine-worker", "1.0.0"), ("studio", "1.0.0")]);
        let new = manifest("v2", &[("engine-worker", "1.0.1"), ("studio", "1.0.0")]);

        let diff = diff_releases(&old, &new, &DeployConfig::default());

        assert_eq!(diff.updates.len(), 1);
        let update = &diff.updates[0];
        assert_eq!(update.deployment_name, "engine-worker-deployment");
        assert_eq!(update.tag, "1.0.1");
        assert_eq!(update.image, "gcr.io/agnost-community/engine/worker:1.0.1");
        assert!(!update.api_server);
        assert!(diff.api_server_tag.is_none());
    }

    #[test]
    fn test_api_server_module_reported_apart() {
        let old = manifest("v1", &[("engine-core", "1.0.0")]);
        let new = manifest("v2", &[("engine-core", "1.1.0")]);

        let diff = diff_releases(&old, &new, &DeployConfig::default());

        assert!(diff.updates.is_empty());
        assert_eq!(diff.api_server_tag.as_deref(), Some("1.1.0"));
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_new_modules_are_included() {
        let old = manifest("v1", &[]);
        let new = manifest("v2", &[("platform-sync", "0.1.0")]);

        let diff = diff_releases(&old, &new, &DeployConfig::default());
        assert_eq!(diff.updates[0].deployment_name, "platform-sync-deployment");
    }

    #[test]
    fn test_identical_releases() {
        let old = manifest("v1", &[("studio", "1.0.0")]);
        let diff = diff_releases(&old, &old.clone(), &DeployConfig::default());
        assert!(diff.is_empty());
    }

    #[test]
    fn test_image_reference_for_standalone_module() {
        assert_eq!(image_reference("registry.local/", "studio", "2.0"), "registry.local/studio:2.0");
    }

    #[test]
    fn test_serializes_camel_case() {
        let update = DeploymentUpdate {
            deployment_name: "studio-deployment".to_string(),
            tag: "1".to_string(),
            image: "r/studio:1".to_string(),
            api_server: false,
        };
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"deploymentName\""));
        assert!(json.contains("\"apiServer\":false"));
    }
}
