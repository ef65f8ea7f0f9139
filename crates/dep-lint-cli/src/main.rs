//! dep-lint CLI tool.
//!
//! Usage:
//! ```bash
//! dep-lint check [OPTIONS] <DEPS>
//! dep-lint reduce [OPTIONS] <DEPS>
//! dep-lint list-rules
//! dep-lint init
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod input;
mod settings;

/// Checks dependency graphs against architecture rules
#[derive(Parser)]
#[command(name = "dep-lint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every dependency against the rule set
    Check {
        /// Dependency file (JSON)
        deps: PathBuf,

        /// Rule-set file (default: from config, else dep-lint.rules.toml)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// List rules and projections that never matched
        #[arg(long)]
        show_unused: bool,
    },

    /// Collapse the dependency graph through the rule set's projections
    Reduce {
        /// Dependency file (JSON)
        deps: PathBuf,

        /// Rule-set file (default: from config, else dep-lint.rules.toml)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// List projections that never matched
        #[arg(long)]
        show_unused: bool,
    },

    /// List item types, rules and projections of a rule set
    ListRules {
        /// Rule-set file (default: from config, else dep-lint.rules.toml)
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },

    /// Initialize configuration and rule-set files
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
}

/// Output format for results.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// One line per violation or edge.
    Compact,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let lookup = settings::Lookup::new(".");
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Check {
            deps,
            rules,
            format,
            show_unused,
        } => {
            let settings = lookup.resolve(config, rules.as_deref())?;
            commands::check::run(&deps, &settings, format, show_unused)
        }
        Commands::Reduce {
            deps,
            rules,
            format,
            show_unused,
        } => {
            let settings = lookup.resolve(config, rules.as_deref())?;
            commands::reduce::run(&deps, &settings, format, show_unused)
        }
        Commands::ListRules { rules } => {
            let settings = lookup.resolve(config, rules.as_deref())?;
            commands::list_rules::run(&settings)
        }
        Commands::Init { force } => commands::init::run(force),
    }
}
