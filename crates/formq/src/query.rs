//! Queries against a source document
//!
//! A selector is an HCL expression evaluated with the source document bound to `self`. A leading `.`
//! is shorthand for `self`:
//!
//! | selector               | evaluated as          |
//! |------------------------|-----------------------|
//! | `.replicaCount`        | `self.replicaCount`   |
//! | `.[0].kind`            | `self[0].kind`        |
//! | `.`                    | `self`                |
//! | `3`                    | `3`                   |
//! | `"${self.image.tag}"`  | (template)            |
use crate::form::FieldPath;
use crate::value::Value;
use hcl::eval::Evaluate;
use indexmap::IndexMap;

/// Resolved values keyed by rendered field path
pub type QueryResults = IndexMap<String, Value>;

/// Name the source document is bound to
pub const SELF: &str = "self";

#[derive(Debug, Clone)]
pub struct Query {
    path: FieldPath,
    selector: String,
    expression: hcl::Expression,
}

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("empty selector")]
    Empty,
    #[error("malformed selector {selector:?}")]
    Malformed {
        selector: String,
        #[source]
        source: hcl_edit::parser::Error,
    },
    #[error("unable to evaluate selector")]
    Evaluate(#[from] hcl::eval::Error),
}

impl Query {
    pub fn new(path: FieldPath, selector: impl Into<String>) -> Result<Self, QueryError> {
        let selector = selector.into();
        let source = expand_shorthand(selector.trim()).ok_or(QueryError::Empty)?;

        let parsed: hcl_edit::expr::Expression =
            source.parse().map_err(|source| QueryError::Malformed {
                selector: selector.clone(),
                source,
            })?;

        Ok(Self {
            path,
            selector,
            expression: parsed.into(),
        })
    }

    /// Query a literal value expression
    pub fn value(path: FieldPath, value: &Value) -> Result<Self, QueryError> {
        Self::new(path, value.to_string())
    }

    /// Query the document member named by a variable
    pub fn variable(path: FieldPath, variable: &str) -> Result<Self, QueryError> {
        Self::new(path, format!(".{variable}"))
    }

    pub fn path(&self) -> FieldPath {
        self.path
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn evaluate(&self, context: &hcl::eval::Context) -> Result<Value, QueryError> {
        Ok(self.expression.evaluate(context)?.into())
    }
}

fn expand_shorthand(selector: &str) -> Option<String> {
    if selector.is_empty() {
        return None;
    }

    let Some(rest) = selector.strip_prefix('.') else {
        return Some(selector.to_string());
    };

    Some(if rest.is_empty() || rest.starts_with('[') {
        format!("{SELF}{rest}")
    } else {
        format!("{SELF}.{rest}")
    })
}

/// Evaluate a batch of queries against one document
///
/// Queries that fail to evaluate are left out of the results.
#[tracing::instrument(level = "trace", skip_all, fields(queries = queries.len()))]
pub fn evaluate_all(document: Value, queries: Vec<Query>) -> QueryResults {
    let mut context = hcl::eval::Context::new();
    context.declare_var(hcl::Identifier::unchecked(SELF), hcl::Value::from(document));

    let mut results = QueryResults::with_capacity(queries.len());
    for query in queries {
        match query.evaluate(&context) {
            Ok(value) => {
                tracing::trace!(path = %query.path, selector = %query.selector, "query resolved");
                results.insert(query.path.to_string(), value);
            }
            Err(err) => {
                tracing::debug!(path = %query.path, selector = %query.selector, %err, "query unresolved");
            }
        }
    }

    results
}
