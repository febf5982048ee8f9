//! Binding contexts to sources
//!
//! [ResolveContext::resolve] turns a [FormContext] into a [ContextConfig] (a reader, maybe a writer)
//! for one resolution pass. It performs no I/O.
use crate::form::{ContextKind, FormContext};
use crate::source::{
    Capabilities, ClientDefaults, ManifestsReader, ObjectReader, ObjectRef, Reader, StateFilter,
    StateType, ValuesReader, ValuesWriter, Writer,
};
use indexmap::IndexMap;

/// A context bound to a source for the duration of a pass
pub struct ContextConfig {
    pub from_type: StateType,
    pub capabilities: Capabilities,
    pub reader: Box<dyn Reader>,
    pub writer: Option<Box<dyn Writer>>,
}

impl ContextConfig {
    pub fn read_only(from_type: StateType, reader: impl Reader + 'static) -> Self {
        Self {
            from_type,
            capabilities: Capabilities::READ,
            reader: Box::new(reader),
            writer: None,
        }
    }
}

impl std::fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextConfig")
            .field("from_type", &self.from_type)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Outcome of resolving one context
#[derive(Debug)]
pub enum Resolution {
    /// applicable and bound to a source
    Bound(ContextConfig),
    /// applicable, but the source could not be bound
    Failed(ResolveError),
    /// not part of this pass (unknown kind or filtered state type)
    NotApplicable,
}

impl Resolution {
    pub fn config(&self) -> Option<&ContextConfig> {
        match self {
            Resolution::Bound(config) => Some(config),
            _ => None,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ResolveError {
    #[error("no {0} available")]
    MissingDefault(&'static str),
    #[error("context config is missing {0:?}")]
    MissingConfig(&'static str),
}

/// Anything that can bind a context
pub trait ResolveContext {
    fn resolve(
        &self,
        defaults: &ClientDefaults,
        context: &FormContext,
        filter: StateFilter,
    ) -> Resolution;
}

// blanket impl for Fn
impl<F> ResolveContext for F
where
    F: Fn(&ClientDefaults, &FormContext, StateFilter) -> Resolution,
{
    fn resolve(
        &self,
        defaults: &ClientDefaults,
        context: &FormContext,
        filter: StateFilter,
    ) -> Resolution {
        self(defaults, context, filter)
    }
}

/// Resolves the built-in kinds and dispatches anything else to plugins registered by kind name
#[derive(Default)]
pub struct Resolver {
    plugins: IndexMap<String, Box<dyn ResolveContext>>,
}

impl Resolver {
    /// Register a resolver for [ContextKind::Other] contexts of `kind`
    ///
    /// Returns the plugin previously registered for that kind.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        plugin: impl ResolveContext + 'static,
    ) -> Option<Box<dyn ResolveContext>> {
        self.plugins.insert(kind.into(), Box::new(plugin))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        ["helm/values", "helm/manifests", "cluster"]
            .into_iter()
            .chain(self.plugins.keys().map(String::as_str))
    }
}

impl ResolveContext for Resolver {
    #[tracing::instrument(level = "debug", skip(self, defaults), fields(kind = %context.kind))]
    fn resolve(
        &self,
        defaults: &ClientDefaults,
        context: &FormContext,
        filter: StateFilter,
    ) -> Resolution {
        let resolution = match &context.kind {
            ContextKind::HelmValues => declared_values(defaults, filter),
            ContextKind::HelmManifests => live_manifests(defaults, filter),
            ContextKind::Cluster => live_object(defaults, context, filter),
            ContextKind::Other(kind) => match self.plugins.get(kind) {
                Some(plugin) => plugin.resolve(defaults, context, filter),
                None => Resolution::NotApplicable,
            },
        };

        match &resolution {
            Resolution::Bound(config) => {
                tracing::debug!(from_type = %config.from_type, capabilities = %config.capabilities, "context bound")
            }
            Resolution::Failed(err) => tracing::debug!(%err, "context failed to bind"),
            Resolution::NotApplicable => tracing::debug!("context not applicable"),
        }

        resolution
    }
}

fn declared_values(defaults: &ClientDefaults, filter: StateFilter) -> Resolution {
    if !filter.accepts(StateType::Declared) {
        return Resolution::NotApplicable;
    }

    let Some(release) = defaults.release.clone() else {
        return Resolution::Failed(ResolveError::MissingDefault("release"));
    };

    let writer = defaults.releases.clone().map(|store| {
        Box::new(ValuesWriter::new(
            store,
            defaults.chart.clone(),
            release.name.clone(),
        )) as Box<dyn Writer>
    });

    Resolution::Bound(ContextConfig {
        from_type: StateType::Declared,
        capabilities: match writer {
            Some(_) => Capabilities::READ_WRITE,
            None => Capabilities::READ,
        },
        reader: Box::new(ValuesReader::new(release, defaults.chart.clone())),
        writer,
    })
}

fn live_manifests(defaults: &ClientDefaults, filter: StateFilter) -> Resolution {
    if !filter.accepts(StateType::Live) {
        return Resolution::NotApplicable;
    }

    match defaults.release.clone() {
        Some(release) => Resolution::Bound(ContextConfig::read_only(
            StateType::Live,
            ManifestsReader::new(release),
        )),
        None => Resolution::Failed(ResolveError::MissingDefault("release")),
    }
}

fn live_object(defaults: &ClientDefaults, context: &FormContext, filter: StateFilter) -> Resolution {
    if !filter.accepts(StateType::Live) {
        return Resolution::NotApplicable;
    }

    let Some(client) = defaults.objects.clone() else {
        return Resolution::Failed(ResolveError::MissingDefault("object client"));
    };

    match object_ref(context) {
        Ok(object) => Resolution::Bound(ContextConfig::read_only(
            StateType::Live,
            ObjectReader::new(client, object),
        )),
        Err(err) => Resolution::Failed(err),
    }
}

fn object_ref(context: &FormContext) -> Result<ObjectRef, ResolveError> {
    let optional = |key: &str| context.config.get(key).cloned().unwrap_or_default();
    let required = |key: &'static str| {
        context
            .config
            .get(key)
            .filter(|value| !value.is_empty())
            .cloned()
            .ok_or(ResolveError::MissingConfig(key))
    };

    Ok(ObjectRef::new(
        optional("group"),
        required("version")?,
        required("resource")?,
        optional("namespace"),
        required("name")?,
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::{Chart, Release, ReleaseStore, SourceError, StaticObjects};
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct NoopStore;

    impl ReleaseStore for NoopStore {
        fn upgrade(&self, _: &str, _: Option<&Chart>, _: Value) -> Result<(), SourceError> {
            Ok(())
        }
    }

    fn defaults() -> ClientDefaults {
        ClientDefaults {
            release: Some(Arc::new(
                serde_yaml::from_str::<Release>("name: web").unwrap(),
            )),
            chart: None,
            releases: None,
            objects: Some(Arc::new(StaticObjects::default())),
        }
    }

    fn summary(resolution: &Resolution) -> Option<(StateType, Capabilities)> {
        resolution
            .config()
            .map(|config| (config.from_type, config.capabilities))
    }

    fn pod() -> FormContext {
        FormContext::new("cluster")
            .with_config("version", "v1")
            .with_config("resource", "pods")
            .with_config("namespace", "default")
            .with_config("name", "web-0")
    }

    #[test]
    fn declared_values_follow_filter() {
        let resolver = Resolver::default();
        let context = FormContext::new("helm/values");

        for filter in [StateFilter::Any, StateFilter::Declared] {
            let resolution = resolver.resolve(&defaults(), &context, filter);
            assert_eq!(
                summary(&resolution),
                Some((StateType::Declared, Capabilities::READ))
            );
        }

        let resolution = resolver.resolve(&defaults(), &context, StateFilter::Live);
        assert!(matches!(resolution, Resolution::NotApplicable));
    }

    #[test]
    fn declared_values_are_writable_with_a_store() {
        let defaults = ClientDefaults {
            releases: Some(Arc::new(NoopStore)),
            ..defaults()
        };

        let resolution =
            Resolver::default().resolve(&defaults, &FormContext::default(), StateFilter::Any);

        assert_eq!(
            summary(&resolution),
            Some((StateType::Declared, Capabilities::READ_WRITE))
        );
        assert!(resolution.config().unwrap().writer.is_some());
    }

    #[test]
    fn live_kinds_follow_filter() {
        let resolver = Resolver::default();

        for context in [FormContext::new("helm/manifests"), pod()] {
            for filter in [StateFilter::Any, StateFilter::Live] {
                let resolution = resolver.resolve(&defaults(), &context, filter);
                assert_eq!(summary(&resolution), Some((StateType::Live, Capabilities::READ)));
            }

            let resolution = resolver.resolve(&defaults(), &context, StateFilter::Declared);
            assert!(matches!(resolution, Resolution::NotApplicable));
        }
    }

    #[test]
    fn missing_defaults_fail() {
        let resolver = Resolver::default();
        let empty = ClientDefaults::default();

        let resolution = resolver.resolve(&empty, &FormContext::default(), StateFilter::Any);
        assert!(matches!(
            resolution,
            Resolution::Failed(ResolveError::MissingDefault("release"))
        ));

        let resolution = resolver.resolve(&empty, &pod(), StateFilter::Any);
        assert!(matches!(
            resolution,
            Resolution::Failed(ResolveError::MissingDefault("object client"))
        ));
    }

    #[test]
    fn cluster_coordinates_are_required() {
        let context = FormContext::new("cluster")
            .with_config("version", "v1")
            .with_config("name", "web-0");

        let resolution = Resolver::default().resolve(&defaults(), &context, StateFilter::Any);
        assert!(matches!(
            resolution,
            Resolution::Failed(ResolveError::MissingConfig("resource"))
        ));

        assert_eq!(
            object_ref(&pod()).unwrap().to_string(),
            "v1/pods/default/web-0"
        );
    }

    #[test]
    fn unknown_kinds_are_not_applicable() {
        let resolution =
            Resolver::default().resolve(&defaults(), &FormContext::new("vault"), StateFilter::Any);
        assert!(matches!(resolution, Resolution::NotApplicable));
    }

    #[test]
    fn plugins_resolve_other_kinds() {
        let mut resolver = Resolver::default();
        resolver.register(
            "static",
            |defaults: &ClientDefaults, context: &FormContext, filter: StateFilter| {
                if !filter.accepts(StateType::Live) {
                    return Resolution::NotApplicable;
                }
                let Some(client) = defaults.objects.clone() else {
                    return Resolution::Failed(ResolveError::MissingDefault("object client"));
                };
                let object = ObjectRef::new(
                    "".into(),
                    "v1".into(),
                    "configmaps".into(),
                    "".into(),
                    context.config.get("name").cloned().unwrap_or_default(),
                );
                Resolution::Bound(ContextConfig::read_only(
                    StateType::Live,
                    ObjectReader::new(client, object),
                ))
            },
        );

        let context = FormContext::new("static").with_config("name", "settings");
        assert_eq!(
            summary(&resolver.resolve(&defaults(), &context, StateFilter::Any)),
            Some((StateType::Live, Capabilities::READ))
        );
        assert!(matches!(
            resolver.resolve(&defaults(), &context, StateFilter::Declared),
            Resolution::NotApplicable
        ));
        assert_eq!(
            resolver.kinds().collect::<Vec<_>>(),
            vec!["helm/values", "helm/manifests", "cluster", "static"]
        );
    }
}
