//! Lookup table: one resolved source per context, with every field's query registered on it
use crate::form::{ContextId, FieldPath, Form};
use crate::resolver::{Resolution, ResolveContext};
use crate::source::{ClientDefaults, StateFilter};
use indexmap::map::Entry;
use indexmap::IndexMap;

/// Per pass mapping of context -> bound source
///
/// Entries are kept in the order their context was first referenced by a field.
#[derive(Debug, Default)]
pub struct LookupTable {
    entries: IndexMap<ContextId, LookupEntry>,
}

#[derive(Debug)]
pub struct LookupEntry {
    pub resolution: Resolution,
    /// fields whose query was registered on the reader
    pub registered: Vec<FieldPath>,
}

impl LookupTable {
    /// Resolve each distinct context once and register one query per field
    ///
    /// `NotApplicable` and `Failed` resolutions are cached like bound ones, so a context is never
    /// resolved twice. Fields without anything to query or with a malformed selector are skipped.
    #[tracing::instrument(level = "debug", skip_all, fields(filter = %filter))]
    pub fn build(
        resolver: &dyn ResolveContext,
        defaults: &ClientDefaults,
        form: &Form,
        filter: StateFilter,
    ) -> Self {
        let mut entries: IndexMap<ContextId, LookupEntry> = IndexMap::new();

        for (path, content) in form.fields() {
            let Some(id) = content.effective_context() else {
                continue;
            };

            let entry = match entries.entry(id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let Some(context) = form.context(id) else {
                        continue;
                    };
                    tracing::trace!(%id, kind = %context.kind, "resolving context");
                    entry.insert(LookupEntry {
                        resolution: resolver.resolve(defaults, context, filter),
                        registered: vec![],
                    })
                }
            };

            let Resolution::Bound(config) = &mut entry.resolution else {
                continue;
            };

            let query = match content.query(path) {
                None => continue,
                Some(Ok(query)) => query,
                Some(Err(err)) => {
                    tracing::debug!(%path, %err, "skipping field");
                    continue;
                }
            };

            if !filter.accepts(config.from_type) {
                tracing::trace!(%path, from_type = %config.from_type, "state type filtered");
                continue;
            }

            tracing::trace!(%path, %id, selector = %query.selector(), "query registered");
            config.reader.register_query(query);
            entry.registered.push(path);
        }

        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContextId, &LookupEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }
}

impl IntoIterator for LookupTable {
    type Item = (ContextId, LookupEntry);
    type IntoIter = indexmap::map::IntoIter<ContextId, LookupEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
