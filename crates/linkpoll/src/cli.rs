//! Clap derive structures for the `linkpoll` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// linkpoll -- fan-out poller for device listing APIs
#[derive(Debug, Parser)]
#[command(
    name = "linkpoll",
    version,
    about = "Poll device listings and emit one record per object link",
    long_about = "Fetches each configured endpoint's device listing, requests every\n\
        object link of every device concurrently, and writes one JSON record\n\
        per response to stdout, tagged with the originating device's identity.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the configuration file
    #[arg(long, short = 'c', env = "LINKPOLL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll endpoints on the configured interval until interrupted
    Run(RunArgs),

    /// Validate the configuration and list endpoints
    Check,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Run a single poll cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Pretty-print records instead of one JSON object per line
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
