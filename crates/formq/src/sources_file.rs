//! Client defaults loaded from a yaml file
//!
//! A sources file describes the state a form is resolved against without talking to a cluster:
//! ```yaml
//! release:
//!   name: web
//!   config: { replicaCount: 3 }
//!   manifest: |
//!     kind: Deployment
//! chart:
//!   name: web
//!   values: { replicaCount: 1 }
//! objects:
//!   - version: v1
//!     resource: pods
//!     namespace: default
//!     name: web-0
//!     object: { status: { phase: Running } }
//! ```
use crate::source::{Chart, ClientDefaults, ObjectRef, Release, ReleaseStore, SourceError, StaticObjects};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SourcesFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<Release>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<Chart>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub objects: Vec<ObjectEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ObjectEntry {
    #[serde(flatten)]
    pub coordinates: ObjectRef,
    pub object: Value,
}

impl SourcesFile {
    pub fn load_file(file_path: &Path) -> Result<Self, LoadError> {
        let file_path = file_path.canonicalize()?;
        tracing::info!(path=%file_path.display(), "loading sources");

        let file_contents = std::fs::read_to_string(&file_path)?;
        Ok(serde_yaml::from_str(&file_contents)?)
    }

    pub fn write_file(&self, file_path: &Path) -> Result<(), LoadError> {
        tracing::info!(path=%file_path.display(), "writing sources");
        std::fs::write(file_path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Turn the file contents into [ClientDefaults]
    ///
    /// `releases` becomes the write backend for declared values.
    pub fn into_defaults(self, releases: Option<Arc<dyn ReleaseStore>>) -> ClientDefaults {
        let objects: StaticObjects = self
            .objects
            .into_iter()
            .map(|entry| (entry.coordinates, entry.object))
            .collect();

        ClientDefaults {
            release: self.release.map(Arc::new),
            chart: self.chart.map(Arc::new),
            releases,
            objects: Some(Arc::new(objects)),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse sources file")]
    YamlError(#[from] serde_yaml::Error),
}

/// [ReleaseStore] that rewrites the release in a sources file
#[derive(Debug, derive_new::new)]
pub struct FileReleaseStore {
    path: PathBuf,
}

impl ReleaseStore for FileReleaseStore {
    fn upgrade(
        &self,
        release_name: &str,
        chart: Option<&Chart>,
        values: Value,
    ) -> Result<(), SourceError> {
        let backend = |err: LoadError| SourceError::Backend(Box::new(err));

        let mut file = SourcesFile::load_file(&self.path).map_err(backend)?;

        let release = file
            .release
            .as_mut()
            .filter(|release| release.name == release_name)
            .ok_or_else(|| SourceError::ReleaseNotFound(release_name.to_string()))?;

        release.config.merge(values);
        release.revision += 1;
        tracing::info!(release = release_name, revision = release.revision, "release upgraded");

        if let Some(chart) = chart {
            file.chart = Some(chart.clone());
        }

        file.write_file(&self.path).map_err(backend)
    }
}

/// Utility macro to create [SourcesFile]s from yaml
///
/// ```
/// # use formq::sources_file;
/// let file = sources_file!("release: { name: web }");
/// assert_eq!(file.release.unwrap().name, "web");
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use formq::sources_file;
/// sources_file!("release: [not, a, release]");
/// ```
#[macro_export]
macro_rules! sources_file {
    { $expr:expr } => {
        serde_yaml::from_str::<$crate::sources_file::SourcesFile>($expr).expect("sources must parse")
    };
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::source::ObjectClient;
    use pretty_assertions::assert_eq;

    const SOURCES: &str = r#"
release:
  name: web
  config: { replicaCount: 3 }
chart:
  name: web
  values: { replicaCount: 1 }
objects:
  - version: v1
    resource: pods
    namespace: default
    name: web-0
    object: { status: { phase: Running } }
"#;

    #[test]
    fn defaults_from_file() {
        let defaults = sources_file!(SOURCES).into_defaults(None);

        assert_eq!(defaults.release.as_ref().map(|r| r.revision), Some(1));
        assert!(defaults.releases.is_none());

        let pod = ObjectRef::new(
            "".into(),
            "v1".into(),
            "pods".into(),
            "default".into(),
            "web-0".into(),
        );
        let objects = defaults.objects.expect("objects are always available");
        assert_eq!(
            objects.get(&pod).unwrap(),
            serde_yaml::from_str::<Value>("status: { phase: Running }").unwrap()
        );
    }

    #[test]
    fn file_store_upgrades_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.yaml");
        std::fs::write(&path, SOURCES).unwrap();

        let store = FileReleaseStore::new(path.clone());
        store
            .upgrade("web", None, serde_yaml::from_str("image: {tag: '1.25'}").unwrap())
            .unwrap();

        let file = SourcesFile::load_file(&path).unwrap();
        let release = file.release.unwrap();
        assert_eq!(release.revision, 2);
        assert_eq!(
            release.config,
            serde_yaml::from_str::<Value>("{replicaCount: 3, image: {tag: '1.25'}}").unwrap()
        );
        assert_eq!(file.objects.len(), 1);
    }

    #[test]
    fn file_store_rejects_unknown_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.yaml");
        std::fs::write(&path, SOURCES).unwrap();

        let result = FileReleaseStore::new(path).upgrade("api", None, Value::Null);
        assert!(matches!(result, Err(SourceError::ReleaseNotFound(name)) if name == "api"));
    }
}
