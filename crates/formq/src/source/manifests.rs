//! Rendered manifests of the deployed release (`helm/manifests`)
use super::{Reader, Release, SourceError};
use crate::query::{self, Query, QueryResults};
use crate::value::Value;
use serde::Deserialize;
use std::sync::Arc;

/// Reads the manifest as an array of documents, in the order they were rendered
#[derive(derive_new::new)]
pub struct ManifestsReader {
    release: Arc<Release>,
    #[new(default)]
    queries: Vec<Query>,
}

impl Reader for ManifestsReader {
    fn register_query(&mut self, query: Query) {
        self.queries.push(query);
    }

    #[tracing::instrument(level = "debug", skip_all, fields(release = %self.release.name))]
    fn read(&mut self) -> Result<QueryResults, SourceError> {
        let documents = parse_manifest(&self.release.manifest)?;
        tracing::trace!(documents = documents.len(), "manifest parsed");

        Ok(query::evaluate_all(
            Value::Array(documents),
            std::mem::take(&mut self.queries),
        ))
    }
}

/// Split a multi-document yaml stream, dropping empty documents
fn parse_manifest(manifest: &str) -> Result<Vec<Value>, SourceError> {
    let mut documents = vec![];
    for document in serde_yaml::Deserializer::from_str(manifest) {
        let value = Value::deserialize(document)?;
        if value != Value::Null {
            documents.push(value);
        }
    }
    Ok(documents)
}
