//! End to end tests
//!
//! Resolves `fixtures/web.form.yaml` against the release, chart and objects in
//! `fixtures/web.sources.yaml`.

use formq::form::{FieldPath, Form, FormContext};
use formq::resolve::PassReport;
use formq::resolver::{Resolution, ResolveContext, Resolver};
use formq::source::{ClientDefaults, ReleaseStore, StateFilter};
use formq::sources_file::{FileReleaseStore, SourcesFile};
use formq::value::Value;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("FORMQ_LOG"))
        .with_test_writer()
        .try_init();
}

fn load_form() -> Form {
    let bytes = std::fs::read(fixture("web.form.yaml")).unwrap();
    Form::from_slice(&bytes).expect("must be a valid form")
}

fn load_defaults(sources: &Path, releases: Option<Arc<dyn ReleaseStore>>) -> ClientDefaults {
    SourcesFile::load_file(sources)
        .expect("must be a valid sources file")
        .into_defaults(releases)
}

fn render(form: &Form, report: &PassReport) -> String {
    let mut rendered = String::new();
    for (path, content) in form.fields() {
        let value = match &content.value {
            Some(value) => value.to_string(),
            None => "<unset>".to_string(),
        };
        writeln!(rendered, "{path} = {value}").unwrap();
    }
    for context in &report.contexts {
        writeln!(
            rendered,
            "{} registered={} {}",
            context.context, context.registered, context.outcome
        )
        .unwrap();
    }
    write!(rendered, "merged={}", report.merged).unwrap();
    rendered
}

#[test]
fn resolve_web_form() {
    init_tracing();

    let defaults = load_defaults(&fixture("web.sources.yaml"), None);
    let mut form = load_form();

    let report = formq::resolve_form(&Resolver::default(), &defaults, &mut form, StateFilter::Any);

    insta::assert_snapshot!(render(&form, &report), @r###"
    tabs[0].sections[0].contents[0] = 3
    tabs[0].sections[0].contents[1] = nginx:1.25
    tabs[0].sections[0].contents[2] = <unset>
    tabs[0].sections[1].contents[0] = Running
    tabs[0].sections[1].contents[1] = 10.0.0.7
    tabs[0].sections[2].contents[0] = .status.phase
    tabs[1].sections[0].contents[0] = Deployment
    tabs[1].sections[0].contents[1] = 80
    tabs[1].sections[0].contents[2] = keep me
    #0 registered=3 read, 2 resolved
    #1 registered=2 read, 2 resolved
    #2 registered=0 not bound: context config is missing "name"
    #3 registered=2 read, 2 resolved
    #4 registered=0 not applicable
    merged=6
    "###);
}

#[test]
fn declared_state_leaves_live_fields_alone() {
    init_tracing();

    let defaults = load_defaults(&fixture("web.sources.yaml"), None);
    let mut form = load_form();

    let report = formq::resolve_form(
        &Resolver::default(),
        &defaults,
        &mut form,
        StateFilter::Declared,
    );

    let value = |path| form.content(path).and_then(|content| content.value.clone());

    assert_eq!(value(FieldPath::new(0, 0, 0)), Some(Value::Integer(3)));
    assert_eq!(
        value(FieldPath::new(0, 1, 0)),
        Some(Value::from(".status.phase"))
    );
    assert_eq!(
        value(FieldPath::new(1, 0, 0)),
        Some(Value::from(".[0].kind"))
    );
    assert_eq!(report.merged, 2);
    assert_eq!(report.failures().count(), 0);
}

#[test]
fn written_values_show_up_in_the_next_pass() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let sources = dir.path().join("web.sources.yaml");
    std::fs::copy(fixture("web.sources.yaml"), &sources).unwrap();

    let store: Arc<dyn ReleaseStore> = Arc::new(FileReleaseStore::new(sources.clone()));
    let defaults = load_defaults(&sources, Some(store));

    let Resolution::Bound(mut config) =
        Resolver::default().resolve(&defaults, &FormContext::default(), StateFilter::Declared)
    else {
        panic!("release values must be bound");
    };
    assert_eq!(config.capabilities.to_string(), "read,write");

    config
        .writer
        .as_mut()
        .expect("a release store makes values writable")
        .write("image.tag", Value::from("1.26"))
        .unwrap();

    let mut form = load_form();
    formq::resolve_form(
        &Resolver::default(),
        &load_defaults(&sources, None),
        &mut form,
        StateFilter::Declared,
    );

    assert_eq!(
        form.content(FieldPath::new(0, 0, 1))
            .and_then(|content| content.value.clone()),
        Some(Value::from("nginx:1.26"))
    );

    let release = SourcesFile::load_file(&sources).unwrap().release.unwrap();
    assert_eq!(release.revision, 2);
}
