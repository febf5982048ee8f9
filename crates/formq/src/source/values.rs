//! Declared values of a release (`helm/values`)
use super::{Chart, Reader, Release, ReleaseStore, SourceError, Writer};
use crate::query::{self, Query, QueryResults};
use crate::value::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// Reads the release config coalesced onto the chart defaults
#[derive(derive_new::new)]
pub struct ValuesReader {
    release: Arc<Release>,
    chart: Option<Arc<Chart>>,
    #[new(default)]
    queries: Vec<Query>,
}

impl Reader for ValuesReader {
    fn register_query(&mut self, query: Query) {
        self.queries.push(query);
    }

    #[tracing::instrument(level = "debug", skip_all, fields(release = %self.release.name))]
    fn read(&mut self) -> Result<QueryResults, SourceError> {
        let values = self.release.values(self.chart.as_deref());
        Ok(query::evaluate_all(values, std::mem::take(&mut self.queries)))
    }
}

/// Writes single values onto a release through a [ReleaseStore]
#[derive(derive_new::new)]
pub struct ValuesWriter {
    store: Arc<dyn ReleaseStore>,
    chart: Option<Arc<Chart>>,
    release_name: String,
}

impl Writer for ValuesWriter {
    /// `path` is a dotted values path, e.g. `image.tag`
    #[tracing::instrument(level = "debug", skip(self, value), fields(release = %self.release_name))]
    fn write(&mut self, path: &str, value: Value) -> Result<(), SourceError> {
        let patch = patch_for(path, value)?;
        self.store
            .upgrade(&self.release_name, self.chart.as_deref(), patch)
    }
}

/// Nest `value` under a dotted path: `a.b` -> `{a: {b: value}}`
fn patch_for(path: &str, value: Value) -> Result<Value, SourceError> {
    let segments: Vec<_> = path.strip_prefix('.').unwrap_or(path).split('.').collect();

    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(SourceError::InvalidPath(path.to_string()));
    }

    Ok(segments.into_iter().rev().fold(value, |inner, segment| {
        Value::Object(IndexMap::from([(segment.to_string(), inner)]))
    }))
}
