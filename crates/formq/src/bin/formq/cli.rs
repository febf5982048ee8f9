//! formq cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; formq ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve all field values of a form
    ///
    /// Reads the form from stdin unless --form is given
    #[command(alias = "eval")]
    Resolve(ResolveCommand),

    /// Write a declared value back to the release in a sources file
    Set(SetCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct ResolveCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Only read sources holding this kind of state
    #[arg(long = "state", default_value_t)]
    pub state: StateArg,
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Load the form from a file
    #[clap(short = 'f', long = "form")]
    pub form: Option<PathBuf>,

    /// Load releases, charts and objects from a sources file
    #[clap(short = 's', long = "sources")]
    pub sources: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Default, Debug)]
pub enum StateArg {
    #[default]
    Any,
    Declared,
    Live,
}

impl std::fmt::Display for StateArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StateArg::Any => f.write_str("any"),
            StateArg::Declared => f.write_str("declared"),
            StateArg::Live => f.write_str("live"),
        }
    }
}

impl From<StateArg> for formq::source::StateFilter {
    fn from(value: StateArg) -> Self {
        match value {
            StateArg::Any => Self::Any,
            StateArg::Declared => Self::Declared,
            StateArg::Live => Self::Live,
        }
    }
}

#[derive(Parser, Debug)]
pub struct SetCommand {
    /// Sources file holding the release
    #[clap(short = 's', long = "sources")]
    pub sources: PathBuf,

    /// Dotted values path, e.g. image.tag
    pub path: String,

    /// New value, parsed as yaml
    pub value: String,
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// List all contexts, where they were declared and whether a resolver knows their kind
    Contexts,
    /// Run a pass and print what happened to each context
    Lookup,
}
