//! Command-line interface for greenlight.
//!
//! This module provides the `glt` CLI with subcommands for:
//! - `ci`: Run the CI pipeline
//! - `lint`: Run the lint gate
//! - `detect`: Show the detected event and trigger decision
//! - `cache`: Inspect or clear the dependency environment cache
//! - `init`: Initialize configuration
//! - `validate`: Validate configuration
//! - `config`: Show configuration file location and contents

mod commands;

use crate::core::error::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Fail-fast CI workflow and lint gate runner.
#[derive(Debug, Parser)]
#[command(
    name = "glt",
    author,
    version,
    about = "Fail-fast CI workflow and lint gate runner",
    long_about = r#"
greenlight (glt) runs the two automation stages of a Poetry-managed Python
project: the CI pipeline (provision interpreter and manager, restore or
build a cached dependency environment, run tests) and the local lint gate
(style check, format check, type check - strictly in order, stopping at the
first failure).

Quick start:
  glt init      # Create configuration
  glt lint      # Run the lint gate
  glt ci        # Run the CI pipeline

The first failing command's exit code is propagated unchanged.
"#,
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use color output.
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,
}

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Always use color.
    Always,
    /// Auto-detect color support.
    #[default]
    Auto,
    /// Never use color.
    Never,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the CI pipeline.
    Ci {
        /// Event to evaluate instead of detecting one.
        #[arg(short, long, value_parser = ["push", "pull-request"])]
        event: Option<String>,

        /// Branch for a push event (default: current branch).
        #[arg(short, long)]
        branch: Option<String>,

        /// Base branch for a pull-request event.
        #[arg(long)]
        base: Option<String>,

        /// Run even if the trigger gate would not fire.
        #[arg(short, long)]
        force: bool,

        /// Print a machine-readable run summary on stdout.
        #[arg(long)]
        json: bool,
    },

    /// Run the lint gate.
    #[command(visible_alias = "l")]
    Lint {
        /// Run only a specific check.
        #[arg(short, long)]
        check: Option<String>,
    },

    /// Show the detected event and trigger decision.
    #[command(visible_alias = "d")]
    Detect,

    /// Inspect or clear the dependency environment cache.
    Cache {
        /// Remove all stored entries.
        #[arg(long)]
        clear: bool,
    },

    /// Initialize greenlight configuration.
    #[command(visible_alias = "i")]
    Init {
        /// Overwrite existing configuration.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the configuration file.
    #[command(visible_alias = "v")]
    Validate,

    /// Show configuration file location and contents.
    Config {
        /// Output raw TOML.
        #[arg(long)]
        raw: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Runs the CLI.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Set up logging
    setup_logging(cli.verbose, cli.quiet);

    // Set up color
    setup_color(cli.color);

    // If no subcommand, run the default action (same as `glt lint`)
    match cli.command {
        Some(Commands::Ci {
            event,
            branch,
            base,
            force,
            json,
        }) => commands::ci(event.as_deref(), branch, base, force, json),
        Some(Commands::Lint { check }) => commands::lint(check.as_deref()),
        Some(Commands::Detect) => commands::detect(),
        Some(Commands::Cache { clear }) => commands::cache(clear),
        Some(Commands::Init { force }) => commands::init(force),
        Some(Commands::Validate) => commands::validate(),
        Some(Commands::Config { raw }) => commands::config(raw),
        Some(Commands::Completions { shell }) => {
            commands::completions(shell);
            Ok(ExitCode::SUCCESS)
        },
        None => commands::lint(None),
    }
}

/// Sets up logging based on verbosity flags.
fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Sets up color output.
fn setup_color(choice: ColorChoice) {
    match choice {
        ColorChoice::Always => {
            console::set_colors_enabled(true);
            console::set_colors_enabled_stderr(true);
        },
        ColorChoice::Never => {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        },
        ColorChoice::Auto => {
            // Let console crate auto-detect
        },
    }
}
