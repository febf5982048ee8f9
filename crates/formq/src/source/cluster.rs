//! Single live object in a cluster (`cluster`)
use super::{Reader, SourceError};
use crate::query::{self, Query, QueryResults};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Coordinates of a live object
///
/// `group` is empty for the core api group, `namespace` is empty for cluster scoped objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_new::new)]
pub struct ObjectRef {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub resource: String,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)?;
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)?;
        }

        if !self.namespace.is_empty() {
            write!(f, "/{}", self.namespace)?;
        }

        write!(f, "/{}", self.name)
    }
}

/// Fetches live objects
pub trait ObjectClient {
    fn get(&self, object: &ObjectRef) -> Result<Value, SourceError>;
}

/// Reads one object, fetched once per [Reader::read]
#[derive(derive_new::new)]
pub struct ObjectReader {
    client: Arc<dyn ObjectClient>,
    object: ObjectRef,
    #[new(default)]
    queries: Vec<Query>,
}

impl Reader for ObjectReader {
    fn register_query(&mut self, query: Query) {
        self.queries.push(query);
    }

    #[tracing::instrument(level = "debug", skip_all, fields(object = %self.object))]
    fn read(&mut self) -> Result<QueryResults, SourceError> {
        let object = self.client.get(&self.object)?;
        Ok(query::evaluate_all(object, std::mem::take(&mut self.queries)))
    }
}

/// In-memory [ObjectClient]
#[derive(Debug, Default)]
pub struct StaticObjects {
    objects: IndexMap<ObjectRef, Value>,
}

impl FromIterator<(ObjectRef, Value)> for StaticObjects {
    fn from_iter<T: IntoIterator<Item = (ObjectRef, Value)>>(iter: T) -> Self {
        Self {
            objects: iter.into_iter().collect(),
        }
    }
}

impl ObjectClient for StaticObjects {
    fn get(&self, object: &ObjectRef) -> Result<Value, SourceError> {
        self.objects
            .get(object)
            .cloned()
            .ok_or_else(|| SourceError::ObjectNotFound(object.clone()))
    }
}
