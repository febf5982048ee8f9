//! Form schema tree (tabs -> sections -> contents) and context inheritance
use crate::query::{Query, QueryError};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A parsed form
///
/// Build with [Form::from_slice]. Contexts are propagated during parsing, so every content knows its
/// effective context once construction returns.
#[derive(Debug, Serialize, Deserialize)]
pub struct Form {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tabs: Vec<Tab>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,

    /// Parent of every top level tab
    #[serde(skip)]
    default_context: FormContext,

    /// Context arena
    ///
    /// [ContextId]s index into this list, each entry records which node declared the context
    #[serde(skip)]
    declarations: Vec<Declaration>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Tab {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<FormContext>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,

    #[serde(skip)]
    effective_context: Option<ContextId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<FormContext>,
    #[serde(default)]
    pub contents: Vec<Content>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,

    #[serde(skip)]
    effective_context: Option<ContextId>,
}

/// A single form field
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<FormContext>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,

    #[serde(skip)]
    effective_context: Option<ContextId>,
}

impl Content {
    pub fn effective_context(&self) -> Option<ContextId> {
        self.effective_context
    }

    /// Query that resolves this field
    ///
    /// A non-empty `value` wins over `variable`. `None` when there is nothing to query.
    pub fn query(&self, path: FieldPath) -> Option<Result<Query, QueryError>> {
        if let Some(value) = self.value.as_ref().filter(|value| !value.is_empty()) {
            return Some(Query::value(path, value));
        }

        self.variable
            .as_deref()
            .filter(|variable| !variable.is_empty())
            .map(|variable| Query::variable(path, variable))
    }
}

/// Where a value lives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormContext {
    #[serde(rename = "type", default)]
    pub kind: ContextKind,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub config: IndexMap<String, String>,
}

impl FormContext {
    pub fn new(kind: impl Into<ContextKind>) -> Self {
        Self {
            kind: kind.into(),
            config: Default::default(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// Known source kinds
///
/// Anything else is kept verbatim in [ContextKind::Other] and may be picked up by a resolver plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContextKind {
    /// values stored with a release, coalesced onto the chart defaults
    #[default]
    HelmValues,
    /// manifests rendered for the deployed release
    HelmManifests,
    /// a single live object in the cluster
    Cluster,
    Other(String),
}

impl ContextKind {
    pub fn as_str(&self) -> &str {
        match self {
            ContextKind::HelmValues => "helm/values",
            ContextKind::HelmManifests => "helm/manifests",
            ContextKind::Cluster => "cluster",
            ContextKind::Other(kind) => kind,
        }
    }
}

impl From<String> for ContextKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "helm/values" => ContextKind::HelmValues,
            "helm/manifests" => ContextKind::HelmManifests,
            "cluster" => ContextKind::Cluster,
            _ => ContextKind::Other(value),
        }
    }
}

impl From<&str> for ContextKind {
    fn from(value: &str) -> Self {
        value.to_string().into()
    }
}

impl From<ContextKind> for String {
    fn from(value: ContextKind) -> Self {
        match value {
            ContextKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for ContextKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a declared context
///
/// `0` is the default root context, declared contexts follow in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(usize);

impl ContextId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node that declared a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declaration {
    Default,
    Tab(usize),
    Section(usize, usize),
    Content(FieldPath),
}

/// Position of a field, rendered as `tabs[i].sections[j].contents[k]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_new::new)]
pub struct FieldPath {
    pub tab: usize,
    pub section: usize,
    pub content: usize,
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tabs[{}].sections[{}].contents[{}]",
            self.tab, self.section, self.content
        )
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("Unable to parse form")]
    Yaml(#[from] serde_yaml::Error),
}

impl Form {
    /// Parse a form and propagate contexts from the default `helm/values` context
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        Self::from_slice_with_default(bytes, FormContext::default())
    }

    pub fn from_slice_with_default(
        bytes: &[u8],
        default_context: FormContext,
    ) -> Result<Self, ParseError> {
        let mut form: Form = serde_yaml::from_slice(bytes)?;
        form.default_context = default_context;
        form.propagate_contexts();
        Ok(form)
    }

    /// Assign every node its effective context
    ///
    /// A node inherits its parent's context unless it declares its own. The arena is rebuilt from
    /// scratch, so calling this again on the same tree yields the same ids.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn propagate_contexts(&mut self) {
        let declarations = &mut self.declarations;
        declarations.clear();

        let mut declare = |declaration: Declaration| {
            let id = ContextId(declarations.len());
            declarations.push(declaration);
            tracing::trace!(%id, ?declaration, "context declared");
            id
        };

        let root = declare(Declaration::Default);

        for (i, tab) in self.tabs.iter_mut().enumerate() {
            let tab_context = match tab.context {
                Some(_) => declare(Declaration::Tab(i)),
                None => root,
            };
            tab.effective_context = Some(tab_context);

            for (j, section) in tab.sections.iter_mut().enumerate() {
                let section_context = match section.context {
                    Some(_) => declare(Declaration::Section(i, j)),
                    None => tab_context,
                };
                section.effective_context = Some(section_context);

                for (k, content) in section.contents.iter_mut().enumerate() {
                    content.effective_context = Some(match content.context {
                        Some(_) => declare(Declaration::Content(FieldPath::new(i, j, k))),
                        None => section_context,
                    });
                }
            }
        }
    }

    /// Borrow the context behind an id
    pub fn context(&self, id: ContextId) -> Option<&FormContext> {
        match *self.declarations.get(id.0)? {
            Declaration::Default => Some(&self.default_context),
            Declaration::Tab(i) => self.tabs.get(i)?.context.as_ref(),
            Declaration::Section(i, j) => self.tabs.get(i)?.sections.get(j)?.context.as_ref(),
            Declaration::Content(path) => self.content(path)?.context.as_ref(),
        }
    }

    /// All known contexts, default first
    pub fn contexts(&self) -> impl Iterator<Item = (ContextId, Declaration, &FormContext)> {
        (0..self.declarations.len()).flat_map(|index| {
            let id = ContextId(index);
            self.context(id)
                .map(|context| (id, self.declarations[index], context))
        })
    }

    pub fn content(&self, path: FieldPath) -> Option<&Content> {
        self.tabs
            .get(path.tab)?
            .sections
            .get(path.section)?
            .contents
            .get(path.content)
    }

    /// All fields in document order
    pub fn fields(&self) -> impl Iterator<Item = (FieldPath, &Content)> {
        self.tabs.iter().enumerate().flat_map(|(i, tab)| {
            tab.sections.iter().enumerate().flat_map(move |(j, section)| {
                section
                    .contents
                    .iter()
                    .enumerate()
                    .map(move |(k, content)| (FieldPath::new(i, j, k), content))
            })
        })
    }

    pub fn fields_mut(&mut self) -> impl Iterator<Item = (FieldPath, &mut Content)> {
        self.tabs.iter_mut().enumerate().flat_map(|(i, tab)| {
            tab.sections.iter_mut().enumerate().flat_map(move |(j, section)| {
                section
                    .contents
                    .iter_mut()
                    .enumerate()
                    .map(move |(k, content)| (FieldPath::new(i, j, k), content))
            })
        })
    }

    /// Overwrite field values with resolved data keyed by field path
    ///
    /// Returns the number of fields that were overwritten.
    pub fn merge_values(&mut self, data: &IndexMap<String, Value>) -> usize {
        let mut merged = 0;
        for (path, content) in self.fields_mut() {
            if let Some(value) = data.get(&path.to_string()) {
                tracing::trace!(%path, "merging resolved value");
                content.value = Some(value.clone());
                merged += 1;
            }
        }
        merged
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const FORM: &str = r#"
name: web
tabs:
  - name: main
    sections:
      - name: replicas
        contents:
          - type: number-input
            variable: replicaCount
          - type: string-input
            context:
              type: cluster
              config: { version: v1, resource: pods, name: web-0 }
            value: self.status.phase
  - name: advanced
    context:
      type: helm/manifests
    sections:
      - contents:
          - value: ".[0].kind"
      - context:
          type: helm/manifests
        contents:
          - value: ".[1].kind"
"#;

    fn effective(form: &Form) -> Vec<(String, ContextId)> {
        form.fields()
            .map(|(path, content)| (path.to_string(), content.effective_context().unwrap()))
            .collect()
    }

    #[test]
    fn contexts_are_inherited() {
        let form = Form::from_slice(FORM.as_bytes()).unwrap();

        assert_eq!(
            effective(&form),
            vec![
                ("tabs[0].sections[0].contents[0]".to_string(), ContextId(0)),
                ("tabs[0].sections[0].contents[1]".to_string(), ContextId(1)),
                ("tabs[1].sections[0].contents[0]".to_string(), ContextId(2)),
                ("tabs[1].sections[1].contents[0]".to_string(), ContextId(3)),
            ]
        );

        assert_eq!(form.context(ContextId(0)), Some(&FormContext::default()));
        assert_eq!(
            form.context(ContextId(1)).map(|c| &c.kind),
            Some(&ContextKind::Cluster)
        );
        assert_eq!(
            form.context(ContextId(1)).and_then(|c| c.config.get("name")),
            Some(&"web-0".to_string())
        );
    }

    #[test]
    fn equal_declarations_keep_separate_identity() {
        let form = Form::from_slice(FORM.as_bytes()).unwrap();

        assert_eq!(form.context(ContextId(2)), form.context(ContextId(3)));
        assert_eq!(form.contexts().count(), 4);
        assert_eq!(
            form.contexts().map(|(_, declaration, _)| declaration).collect::<Vec<_>>(),
            vec![
                Declaration::Default,
                Declaration::Content(FieldPath::new(0, 0, 1)),
                Declaration::Tab(1),
                Declaration::Section(1, 1),
            ]
        );
    }

    #[test]
    fn propagation_is_idempotent() {
        let mut form = Form::from_slice(FORM.as_bytes()).unwrap();
        let once = effective(&form);

        form.propagate_contexts();

        assert_eq!(effective(&form), once);
        assert_eq!(form.contexts().count(), 4);
    }

    #[test]
    fn custom_default_context() {
        let form = Form::from_slice_with_default(
            b"tabs: [{sections: [{contents: [{variable: a}]}]}]",
            FormContext::new("helm/manifests"),
        )
        .unwrap();

        let (_, content) = form.fields().next().unwrap();
        let context = form.context(content.effective_context().unwrap()).unwrap();
        assert_eq!(context.kind, ContextKind::HelmManifests);
    }

    #[test]
    fn field_path_is_positional() {
        assert_eq!(
            FieldPath::new(0, 1, 2).to_string(),
            "tabs[0].sections[1].contents[2]"
        );

        let form = Form::from_slice(
            b"tabs: [{sections: [{contents: [{}, {}, {}, {}]}, {contents: [{}, {}, {}]}]}]",
        )
        .unwrap();
        let paths: Vec<_> = form.fields().map(|(path, _)| path.to_string()).collect();
        assert_eq!(paths[5], "tabs[0].sections[1].contents[1]");
        assert_eq!(paths.len(), 7);
    }

    #[test]
    fn unknown_kinds_round_trip() {
        let context: FormContext = serde_yaml::from_str("type: vault/secret").unwrap();
        assert_eq!(context.kind, ContextKind::Other("vault/secret".into()));
        assert_eq!(
            serde_yaml::to_string(&context).unwrap().trim(),
            "type: vault/secret"
        );
    }

    #[test]
    fn extra_keys_are_preserved() {
        let form = Form::from_slice(
            b"icon: cube\ntabs: [{sections: [{show_if: x, contents: [{required: true}]}]}]",
        )
        .unwrap();

        assert_eq!(form.extra.get("icon"), Some(&Value::from("cube")));
        let (_, content) = form.fields().next().unwrap();
        assert_eq!(content.extra.get("required"), Some(&Value::Boolean(true)));
        assert_eq!(
            form.tabs[0].sections[0].extra.get("show_if"),
            Some(&Value::from("x"))
        );
    }

    #[test]
    fn malformed_form_fails() {
        assert!(Form::from_slice(b"tabs: {not: a list}").is_err());
    }

    #[test]
    fn merge_overwrites_only_resolved_fields() {
        let mut form =
            Form::from_slice(b"tabs: [{sections: [{contents: [{value: 1}, {value: 2}]}]}]").unwrap();

        let data: IndexMap<String, Value> =
            [("tabs[0].sections[0].contents[1]".to_string(), Value::Integer(20))].into();

        assert_eq!(form.merge_values(&data), 1);
        let values: Vec<_> = form.fields().map(|(_, c)| c.value.clone()).collect();
        assert_eq!(values, vec![Some(Value::Integer(1)), Some(Value::Integer(20))]);
    }
}
