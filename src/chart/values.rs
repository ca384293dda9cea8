//! Chart values document (`values.yaml`): per-component image tags.

use serde_yaml::{Mapping, Value};

use super::yaml_edit::ScalarEdit;
use crate::core::{ApplicationRecord, ReleaseError, ReleaseResult};

/// Key holding a component's image tag.
pub const TAG_KEY: &str = "tag";

/// Typed view over the top level of `values.yaml`.
///
/// Grouped components live at `<group>.<component>.tag`; standalone
/// applications at `<name>.tag`, or directly at `<name>` when that node is a
/// scalar.
#[derive(Debug, Clone)]
pub struct ChartValues {
    root: Mapping,
}

/// What happens to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagChange {
    /// The scalar at this edit's path is replaced
    Update(ScalarEdit),

    /// The component is exempt from chart updates
    Skipped {
        /// Application name
        application: String,
    },
}

impl ChartValues {
    /// Parse the values document.
    pub fn from_yaml(text: &str) -> ReleaseResult<Self> {
        match serde_yaml::from_str::<Value>(text)? {
            Value::Mapping(root) => Ok(Self { root }),
            Value::Null => Ok(Self { root: Mapping::new() }),
            other => Err(ReleaseError::Format(format!(
                "values document must be a mapping, found {:?}",
                other
            ))),
        }
    }

    /// Decide the edit for one record.
    ///
    /// Lookups fail closed: a group, component or tag key missing from the
    /// document is an error, never a new node.
    pub fn plan_record<F>(&self, record: &ApplicationRecord, is_exempt: F) -> ReleaseResult<TagChange>
    where
        F: Fn(&str, &str) -> bool,
    {
        if record.is_standalone() {
            return self.plan_standalone(record);
        }

        let group = record.root_dir();
        let component = record.app_dir();
        if is_exempt(group, component) {
            return Ok(TagChange::Skipped { application: record.application.clone() });
        }

        let components = self
            .child(group)
            .ok_or_else(|| ReleaseError::missing_key(&[group], "values.yaml"))?;
        let node = components
            .get(component)
            .and_then(Value::as_mapping)
            .ok_or_else(|| ReleaseError::missing_key(&[group, component], "values.yaml"))?;
        if !node.contains_key(TAG_KEY) {
            return Err(ReleaseError::missing_key(&[group, component, TAG_KEY], "values.yaml"));
        }

        Ok(TagChange::Update(ScalarEdit::new(&[group, component, TAG_KEY], record.version.as_str())))
    }

    /// Decide the edits for every record, failing on the first bad lookup.
    pub fn plan<F>(&self, records: &[ApplicationRecord], is_exempt: F) -> ReleaseResult<Vec<TagChange>>
    where
        F: Fn(&str, &str) -> bool,
    {
        records.iter().map(|record| self.plan_record(record, &is_exempt)).collect()
    }

    fn plan_standalone(&self, record: &ApplicationRecord) -> ReleaseResult<TagChange> {
        let name = record.app_dir();
        let edit = match self.root.get(name) {
            Some(Value::Mapping(node)) if node.contains_key(TAG_KEY) => {
                ScalarEdit::new(&[name, TAG_KEY], record.version.as_str())
            }
            Some(Value::Mapping(_)) => {
                return Err(ReleaseError::missing_key(&[name, TAG_KEY], "values.yaml"))
            }
            Some(Value::Sequence(_)) => {
                return Err(ReleaseError::Format(format!(
                    "'{}' in values.yaml is a list, not a tag",
                    name
                )))
            }
            Some(_) => ScalarEdit::new(&[name], record.version.as_str()),
            None => return Err(ReleaseError::missing_key(&[name], "values.yaml")),
        };
        Ok(TagChange::Update(edit))
    }

    fn child(&self, key: &str) -> Option<&Mapping> {
        self.root.get(key).and_then(Value::as_mapping)
    }
}
