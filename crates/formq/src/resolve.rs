//! Resolution pass: build the lookup table, read every bound source once, merge into the form
use crate::form::{ContextId, Form, ParseError};
use crate::lookup::LookupTable;
use crate::query::QueryResults;
use crate::resolver::{Resolution, ResolveContext, ResolveError, Resolver};
use crate::source::{ClientDefaults, SourceError, StateFilter};

/// Parse a form and resolve it with the built-in [Resolver]
///
/// Failing to parse is the only error. Everything that goes wrong during resolution leaves the
/// affected fields with their declared values.
pub fn resolve_bytes(
    defaults: &ClientDefaults,
    bytes: &[u8],
    filter: StateFilter,
) -> Result<Form, ParseError> {
    let mut form = Form::from_slice(bytes)?;
    resolve_form(&Resolver::default(), defaults, &mut form, filter);
    Ok(form)
}

/// Resolve all fields of an already parsed form in place
#[tracing::instrument(level = "debug", skip_all, fields(filter = %filter))]
pub fn resolve_form(
    resolver: &dyn ResolveContext,
    defaults: &ClientDefaults,
    form: &mut Form,
    filter: StateFilter,
) -> PassReport {
    let table = LookupTable::build(resolver, defaults, form, filter);

    let mut report = PassReport::default();
    let mut data = QueryResults::new();

    for (context, entry) in table {
        let registered = entry.registered.len();

        let outcome = match entry.resolution {
            Resolution::Bound(mut config) => match config.reader.read() {
                Ok(results) => {
                    let resolved = results.len();
                    data.extend(results);
                    Outcome::Read { resolved }
                }
                Err(err) => {
                    tracing::warn!(%context, %err, "source read failed");
                    Outcome::ReadFailed(err)
                }
            },
            Resolution::Failed(err) => {
                tracing::warn!(%context, %err, "context could not be bound");
                Outcome::ResolveFailed(err)
            }
            Resolution::NotApplicable => Outcome::NotApplicable,
        };

        report.contexts.push(ContextReport {
            context,
            registered,
            outcome,
        });
    }

    report.merged = form.merge_values(&data);
    tracing::debug!(merged = report.merged, "pass complete");

    report
}

/// What happened during one pass
#[derive(Debug, Default)]
pub struct PassReport {
    /// one entry per distinct context referenced by a field, in first-use order
    pub contexts: Vec<ContextReport>,
    /// fields whose value was overwritten
    pub merged: usize,
}

impl PassReport {
    pub fn get(&self, context: ContextId) -> Option<&ContextReport> {
        self.contexts.iter().find(|report| report.context == context)
    }

    /// Contexts that were applicable but did not produce results
    pub fn failures(&self) -> impl Iterator<Item = &ContextReport> {
        self.contexts.iter().filter(|report| {
            matches!(
                report.outcome,
                Outcome::ReadFailed(_) | Outcome::ResolveFailed(_)
            )
        })
    }
}

#[derive(Debug)]
pub struct ContextReport {
    pub context: ContextId,
    /// queries registered on the context's reader
    pub registered: usize,
    pub outcome: Outcome,
}

#[derive(Debug)]
pub enum Outcome {
    Read { resolved: usize },
    ReadFailed(SourceError),
    ResolveFailed(ResolveError),
    NotApplicable,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Read { resolved } => write!(f, "read, {resolved} resolved"),
            Outcome::ReadFailed(err) => write!(f, "read failed: {err}"),
            Outcome::ResolveFailed(err) => write!(f, "not bound: {err}"),
            Outcome::NotApplicable => f.write_str("not applicable"),
        }
    }
}
