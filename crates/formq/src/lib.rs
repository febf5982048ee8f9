//! # formq - context-aware form resolution
//!
//! ## Introduction for developers
//!
//! Read this to understand how `formq` works internally.
//!
//! ### Form terms
//!
//! - a form is a list of `tabs`
//! - ...each tab is a list of `sections`
//! - ...each section is a list of `contents` (fields)
//! - any of the three may declare a `context`: which source its fields read from
//!
//! This is a valid form:
//! ```yaml
//! name: web
//! tabs:
//!   - name: main
//!     sections:
//!       - name: scaling
//!         contents:
//!           # reads `replicaCount` from the release values (the default context)
//!           - type: number-input
//!             variable: replicaCount
//!       - name: status
//!         context:
//!           type: cluster
//!           config: { version: v1, resource: pods, namespace: default, name: web-0 }
//!         contents:
//!           - type: heading
//!             value: .status.phase
//! ```
//!
//! ### Parsing and context propagation
//!
//! see [form::Form::from_slice]
//!
//! The form is parsed with serde. Then every node gets its effective context: the one it declares, or the one
//! of its parent. The root parent is a default `helm/values` context.
//!
//! Contexts are identified by [form::ContextId], an index into an arena that remembers *which node* declared
//! the context. Two declarations with identical content are still two contexts.
//!
//! ### Field paths and queries
//!
//! Each field is addressed by its position, e.g. `tabs[0].sections[1].contents[2]` ([form::FieldPath]).
//!
//! A field becomes a [query::Query] when it has a `value` (used as expression) or else a `variable` (used as
//! `.variable`). Expressions are HCL with the source document bound to `self`; see [query] for the
//! shorthand.
//!
//! ### Resolving contexts
//!
//! [resolver::Resolver] binds a context to a [source::Reader] (and possibly a [source::Writer]). The
//! result is three-valued ([resolver::Resolution]): bound, failed, or not applicable for the requested
//! [source::StateFilter].
//!
//! | **type**         | **state** | **document**                              | **capabilities** |
//! |------------------|-----------|-------------------------------------------|------------------|
//! | `helm/values`    | declared  | release config coalesced onto chart values | read (, write)   |
//! | `helm/manifests` | live      | array of rendered manifest documents       | read             |
//! | `cluster`        | live      | one object by group/version/resource/namespace/name | read    |
//!
//! Other types go to plugins registered with [resolver::Resolver::register].
//!
//! ### Lookup table
//!
//! [lookup::LookupTable::build] walks all fields in document order, resolves every context once (also
//! caching "not applicable" and "failed") and registers each field's query on the bound reader.
//!
//! ### Read and merge
//!
//! [resolve::resolve_form] reads every bound reader once, merges the results and writes them into the
//! fields' `value`. A failing reader only affects its own fields. The [resolve::PassReport] tells what
//! happened to each context.
//!
pub mod form;
pub mod lookup;
pub mod query;
pub mod resolve;
pub mod resolver;
pub mod source;
pub mod sources_file;
pub mod value;

pub use resolve::{resolve_bytes, resolve_form};
