//! assetstage CLI - declarative asset staging

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use assetstage::util::diagnostic::{emit, Diagnostic};
use assetstage::util::Shell;
use cli::{Cli, Commands, MessageFormat};
use commands::Session;

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("assetstage=debug")
    } else {
        EnvFilter::new("assetstage=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let shell = Shell::from_flags(
        cli.quiet,
        cli.verbose,
        cli.color,
        cli.message_format == MessageFormat::Json,
    );
    let color = shell.use_color();
    let session = Session {
        shell,
        manifest_path: cli.manifest_path,
    };

    if let Err(e) = run(cli.command, &session) {
        emit(&Diagnostic::from_error(&e), color);
        std::process::exit(1);
    }
}

fn run(command: Commands, session: &Session) -> Result<()> {
    match command {
        Commands::Run(args) => commands::run::execute(args, session),
        Commands::Plan(args) => commands::plan::execute(args, session),
        Commands::Clean(args) => commands::clean::execute(args, session),
        Commands::Variants => commands::variants::execute(session),
        Commands::Digest(args) => commands::digest::execute(args),
        Commands::Init(args) => commands::init::execute(args, session),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
