//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use assetstage::util::shell::ColorChoice;

/// assetstage - declarative asset staging for native application bundles
#[derive(Parser)]
#[command(name = "assetstage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Path to Stage.toml (default: search upward from the current directory)
    #[arg(long, global = true, env = "ASSETSTAGE_MANIFEST")]
    pub manifest_path: Option<PathBuf>,

    /// Output format for status messages
    #[arg(long, global = true, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run staging steps and their dependencies
    Run(RunArgs),

    /// Show the resolved step order without running anything
    Plan(PlanArgs),

    /// Remove what staging steps produced
    Clean(CleanArgs),

    /// List the declared variants and build types
    Variants,

    /// Print a content digest of a directory tree
    Digest(DigestArgs),

    /// Create a starter Stage.toml
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Variant, build type and variable selection shared by run, plan and clean.
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Variant to stage (default: from config, or the only declared variant)
    #[arg(long)]
    pub variant: Option<String>,

    /// Build type, e.g. debug or release
    #[arg(long)]
    pub build_type: Option<String>,

    /// Override a variable, e.g. --var instdir=/opt/office/instdir
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub vars: Vec<(String, String)>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Steps to run (default: the manifest's default steps)
    pub targets: Vec<String>,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Number of parallel copy jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Re-run every step even if its outputs are up to date
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Steps to plan (default: the manifest's default steps)
    pub targets: Vec<String>,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Steps to clean (default: every step and the build-config file)
    pub targets: Vec<String>,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// List what would be removed without removing it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct DigestArgs {
    /// Directory to hash
    pub dir: PathBuf,
}

#[derive(Args)]
pub struct InitArgs {
    /// Directory to initialize (defaults to current directory)
    pub path: Option<PathBuf>,

    /// Project name (defaults to directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Application identifier, e.g. org.example.viewer
    #[arg(long)]
    pub application_id: Option<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("invalid KEY=VALUE: `{}`", s)),
    }
}
