mod cli;

use anyhow::Context;
use formq::form::{Form, FormContext};
use formq::resolver::{Resolution, ResolveContext, Resolver};
use formq::source::{ClientDefaults, ReleaseStore, StateFilter};
use formq::sources_file::{FileReleaseStore, SourcesFile};
use formq::value::Value;
use std::path::PathBuf;
use std::sync::Arc;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("FORMQ_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let command_result = change_directory(&cli.directory).and_then(|()| match cli.command {
        cli::Command::Resolve(resolve_cli) => resolve(resolve_cli),
        cli::Command::Set(set_cli) => set(set_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    });

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

/// Apply each -C/--directory in order, relative to the previous one
fn change_directory(directories: &[PathBuf]) -> anyhow::Result<()> {
    for directory in directories {
        let cwd = directory.canonicalize().with_context(|| {
            format!("Failed to resolve path for -C/--directory {}", directory.display())
        })?;
        std::env::set_current_dir(&cwd)
            .with_context(|| format!("Failed to set work directory to {}", cwd.display()))?;

        tracing::debug!(directory = %cwd.display(), "work directory changed");
    }

    Ok(())
}

pub fn resolve(cli: cli::ResolveCommand) -> anyhow::Result<()> {
    let defaults = load_defaults(&cli.input)?;
    let mut form = load_form(&cli.input)?;

    let report = formq::resolve_form(
        &Resolver::default(),
        &defaults,
        &mut form,
        cli.state.into(),
    );

    for failure in report.failures() {
        tracing::warn!(context = %failure.context, outcome = %failure.outcome, "unresolved context");
    }

    output(&cli.output, &form)?;
    Ok(())
}

fn load_form(input: &cli::InputArgs) -> anyhow::Result<Form> {
    let bytes = match &input.form {
        Some(path) => {
            tracing::info!(path=%path.display(), "loading form");
            std::fs::read(path)?
        }
        None => std::io::read_to_string(std::io::stdin())?.into_bytes(),
    };

    Ok(Form::from_slice(&bytes)?)
}

fn load_defaults(input: &cli::InputArgs) -> anyhow::Result<ClientDefaults> {
    let Some(path) = &input.sources else {
        return Ok(ClientDefaults::default());
    };

    Ok(SourcesFile::load_file(path)?.into_defaults(None))
}

fn output(output: &cli::OutputArgs, form: &Form) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), form)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), form)?,
    };

    Ok(())
}

/// Write a value through the writer bound to the default `helm/values` context
pub fn set(cli: cli::SetCommand) -> anyhow::Result<()> {
    let value: Value = serde_yaml::from_str(&cli.value)?;

    let store: Arc<dyn ReleaseStore> = Arc::new(FileReleaseStore::new(cli.sources.clone()));
    let defaults = SourcesFile::load_file(&cli.sources)?.into_defaults(Some(store));

    let resolution =
        Resolver::default().resolve(&defaults, &FormContext::default(), StateFilter::Declared);

    let mut config = match resolution {
        Resolution::Bound(config) => config,
        Resolution::Failed(err) => return Err(err.into()),
        Resolution::NotApplicable => anyhow::bail!("declared values are not available"),
    };

    let Some(writer) = config.writer.as_mut() else {
        anyhow::bail!("declared values are read-only");
    };

    writer.write(&cli.path, value)?;
    Ok(())
}

/// (formq-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;

    let mut form = load_form(&cli.input)?;

    match cli.command {
        Contexts => {
            let resolver = Resolver::default();
            let kinds: Vec<_> = resolver.kinds().collect();
            println!("resolvable kinds: {}", kinds.join(", "));

            for (id, declaration, context) in form.contexts() {
                let resolvable = kinds.contains(&context.kind.as_str());
                println!("{id} {declaration:?} {context:?} resolvable={resolvable}");
            }
        }
        Lookup => {
            let defaults = load_defaults(&cli.input)?;
            let report = formq::resolve_form(
                &Resolver::default(),
                &defaults,
                &mut form,
                StateFilter::Any,
            );

            for context in &report.contexts {
                println!(
                    "{} registered={} {}",
                    context.context, context.registered, context.outcome
                );
            }
            println!("merged={}", report.merged);
        }
    }

    Ok(())
}
