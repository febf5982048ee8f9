//! Data sources a form can read from and write to
//!
//! A source is anything implementing [Reader] (and optionally [Writer]). The engine never talks to a
//! backend directly: it only registers [Query]s and asks for one batched [Reader::read] per pass.
pub mod cluster;
pub mod manifests;
pub mod release;
pub mod values;

use crate::query::{Query, QueryResults};
use crate::value::Value;
use std::sync::Arc;

pub use cluster::{ObjectClient, ObjectReader, ObjectRef, StaticObjects};
pub use manifests::ManifestsReader;
pub use release::{Chart, Release, ReleaseStore};
pub use values::{ValuesReader, ValuesWriter};

/// Resolves registered queries in one batch
pub trait Reader {
    /// Remember a query for the next [Reader::read]; no I/O
    fn register_query(&mut self, query: Query);

    /// Execute and drain all registered queries
    ///
    /// Fails only when the batch cannot run at all. Queries that do not resolve are absent from the
    /// results.
    fn read(&mut self) -> Result<QueryResults, SourceError>;
}

/// Persists a single value back to its source
pub trait Writer {
    fn write(&mut self, path: &str, value: Value) -> Result<(), SourceError>;
}

/// Kind of state a source holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateType {
    /// source of truth, e.g. stored values
    Declared,
    /// what is actually running
    Live,
}

impl std::fmt::Display for StateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateType::Declared => f.write_str("declared"),
            StateType::Live => f.write_str("live"),
        }
    }
}

/// Which state types a resolution pass reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StateFilter {
    #[default]
    Any,
    Declared,
    Live,
}

impl StateFilter {
    pub fn accepts(self, state: StateType) -> bool {
        match self {
            StateFilter::Any => true,
            StateFilter::Declared => state == StateType::Declared,
            StateFilter::Live => state == StateType::Live,
        }
    }
}

impl std::str::FromStr for StateFilter {
    type Err = UnknownStateFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(StateFilter::Any),
            "declared" => Ok(StateFilter::Declared),
            "live" => Ok(StateFilter::Live),
            other => Err(UnknownStateFilter(other.to_string())),
        }
    }
}

impl std::fmt::Display for StateFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateFilter::Any => f.write_str(""),
            StateFilter::Declared => f.write_str("declared"),
            StateFilter::Live => f.write_str("live"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown state type {0:?}, expected \"\", \"declared\" or \"live\"")]
pub struct UnknownStateFilter(String);

/// What a bound source can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub read: bool,
    pub write: bool,
}

impl Capabilities {
    pub const READ: Capabilities = Capabilities {
        read: true,
        write: false,
    };
    pub const READ_WRITE: Capabilities = Capabilities {
        read: true,
        write: true,
    };
}

impl std::fmt::Display for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = [(self.read, "read"), (self.write, "write")]
            .into_iter()
            .filter_map(|(enabled, name)| enabled.then_some(name))
            .collect();
        f.write_str(&names.join(","))
    }
}

/// Clients used by contexts that do not bring their own
///
/// Handed to the resolver on every pass. Nothing in here is constructed by the engine.
#[derive(Default, Clone)]
pub struct ClientDefaults {
    /// currently active release (declared values and rendered manifests)
    pub release: Option<Arc<Release>>,
    /// chart the release was installed from
    pub chart: Option<Arc<Chart>>,
    /// backend for writing declared values
    pub releases: Option<Arc<dyn ReleaseStore>>,
    /// backend for live objects
    pub objects: Option<Arc<dyn ObjectClient>>,
}

impl std::fmt::Debug for ClientDefaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientDefaults")
            .field("release", &self.release.as_ref().map(|r| &r.name))
            .field("chart", &self.chart.as_ref().map(|c| &c.name))
            .field("releases", &self.releases.is_some())
            .field("objects", &self.objects.is_some())
            .finish()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("object {0} not found")]
    ObjectNotFound(ObjectRef),
    #[error("release {0} not found")]
    ReleaseNotFound(String),
    #[error("unable to parse release manifest")]
    Manifest(#[from] serde_yaml::Error),
    #[error("invalid values path {0:?}")]
    InvalidPath(String),
    #[error("source backend failed")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}
