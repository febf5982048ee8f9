//! Release snapshots (declared state)
use super::SourceError;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A deployed release as seen at the time of the pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default = "first_revision")]
    pub revision: u64,
    /// values supplied by the user, without chart defaults
    #[serde(default)]
    pub config: Value,
    /// rendered manifests, multiple yaml documents
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub manifest: String,
}

fn first_revision() -> u64 {
    1
}

impl Release {
    /// User values coalesced onto chart defaults
    pub fn values(&self, chart: Option<&Chart>) -> Value {
        let mut values = chart
            .map(|chart| chart.values.clone())
            .unwrap_or_else(|| Value::Object(Default::default()));
        values.merge(self.config.clone());
        values
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chart {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// default values
    #[serde(default)]
    pub values: Value,
}

/// Backend that persists declared values
pub trait ReleaseStore {
    /// Merge `values` onto the stored config of a release and roll it forward
    fn upgrade(
        &self,
        release_name: &str,
        chart: Option<&Chart>,
        values: Value,
    ) -> Result<(), SourceError>;
}
