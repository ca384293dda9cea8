//! Chart updater.
//!
//! Applies the changed applications' versions to the deployment chart's
//! values document and bumps the chart descriptor. Both documents are fully
//! planned in memory before either file is written, so a bad record leaves
//! the chart untouched.

mod descriptor;
mod values;
mod yaml_edit;

pub use descriptor::{ChartDescriptor, ChartVersion, DescriptorUpdate};
pub use values::{ChartValues, TagChange, TAG_KEY};
pub use yaml_edit::{apply_edits, lookup, render_scalar, set_scalar, ScalarEdit, ScalarStyle};

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::{persist_pair, ApplicationRecord, Config, ReleaseError, ReleaseResult, StagedFile};

/// Updates a chart's values and descriptor files.
#[derive(Debug, Clone)]
pub struct ChartUpdater {
    /// Path to `values.yaml`
    values_path: PathBuf,

    /// Path to `Chart.yaml`
    chart_path: PathBuf,

    /// Exempt `(group, component)` pairs
    exempt: Vec<(String, String)>,
}

/// A fully planned chart update.
#[derive(Debug, Clone)]
pub struct ChartUpdate {
    /// Decision per record, in record order
    pub changes: Vec<TagChange>,

    /// Descriptor bump
    pub descriptor: DescriptorUpdate,

    /// New content of the values document
    pub values_text: String,

    /// New content of the chart descriptor
    pub chart_text: String,
}

impl ChartUpdate {
    /// Edits applied to the values document.
    pub fn tag_edits(&self) -> impl Iterator<Item = &ScalarEdit> {
        self.changes.iter().filter_map(|change| match change {
            TagChange::Update(edit) => Some(edit),
            TagChange::Skipped { .. } => None,
        })
    }

    /// Applications left out because they are exempt.
    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().filter_map(|change| match change {
            TagChange::Skipped { application } => Some(application.as_str()),
            TagChange::Update(_) => None,
        })
    }
}

impl ChartUpdater {
    /// Create an updater for the given files with no exemptions.
    pub fn new(values_path: impl Into<PathBuf>, chart_path: impl Into<PathBuf>) -> Self {
        Self { values_path: values_path.into(), chart_path: chart_path.into(), exempt: Vec::new() }
    }

    /// Create an updater from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.values_path(), config.chart_path()).with_exempt(config.exempt_components())
    }

    /// Use a different values document.
    pub fn with_values_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.values_path = path.into();
        self
    }

    /// Use a different chart descriptor.
    pub fn with_chart_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chart_path = path.into();
        self
    }

    /// Exempt `(group, component)` pairs from tag updates.
    pub fn with_exempt<I, G, C>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (G, C)>,
        G: Into<String>,
        C: Into<String>,
    {
        self.exempt.extend(pairs.into_iter().map(|(g, c)| (g.into(), c.into())));
        self
    }

    /// Whether a component is exempt.
    pub fn is_exempt(&self, group: &str, component: &str) -> bool {
        self.exempt.iter().any(|(g, c)| g == group && c == component)
    }

    /// Path to the values document.
    pub fn values_path(&self) -> &Path {
        &self.values_path
    }

    /// Path to the chart descriptor.
    pub fn chart_path(&self) -> &Path {
        &self.chart_path
    }

    /// Read both documents and compute their new content.
    pub fn plan(&self, records: &[ApplicationRecord], release: &str) -> ReleaseResult<ChartUpdate> {
        if release.trim().is_empty() {
            return Err(ReleaseError::Configuration("release identifier is empty".to_string()));
        }

        let values_source = read_document(&self.values_path)?;
        let chart_source = read_document(&self.chart_path)?;
        let values_name = self.values_path.display().to_string();
        let chart_name = self.chart_path.display().to_string();

        let values = ChartValues::from_yaml(&values_source)?;
        let changes = values.plan(records, |group, component| self.is_exempt(group, component))?;

        let tag_edits: Vec<ScalarEdit> = changes
            .iter()
            .filter_map(|change| match change {
                TagChange::Update(edit) => Some(edit.clone()),
                TagChange::Skipped { .. } => None,
            })
            .collect();
        let values_text = apply_edits(&values_source, &tag_edits, &values_name)?;

        let descriptor = ChartDescriptor::from_yaml(&chart_source)?.plan_update(release)?;
        let chart_text = apply_edits(&chart_source, &descriptor.edits, &chart_name)?;

        let update = ChartUpdate { changes, descriptor, values_text, chart_text };
        for application in update.skipped() {
            tracing::info!(application, "Skipping exempt component");
        }
        Ok(update)
    }

    /// Write a planned update to disk.
    ///
    /// Both new contents are staged next to their targets before either
    /// target is replaced.
    pub fn apply(&self, update: &ChartUpdate) -> ReleaseResult<()> {
        let staged_values = StagedFile::new(&self.values_path, &update.values_text)?;
        let staged_chart = StagedFile::new(&self.chart_path, &update.chart_text)?;
        persist_pair(staged_values, staged_chart)?;

        for target in [&self.values_path, &self.chart_path] {
            tracing::info!(path = %target.display(), "Updated chart file");
        }
        Ok(())
    }

    /// Plan and apply in one step.
    pub fn run(&self, records: &[ApplicationRecord], release: &str) -> ReleaseResult<ChartUpdate> {
        let update = self.plan(records, release)?;
        self.apply(&update)?;
        tracing::info!(
            from = %update.descriptor.previous,
            to = %update.descriptor.version,
            tags = update.tag_edits().count(),
            "Bumped chart"
        );
        Ok(update)
    }
}

fn read_document(path: &Path) -> ReleaseResult<String> {
    fs::read_to_string(path).map_err(|e| ReleaseError::io(path, e))
}
