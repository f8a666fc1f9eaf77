//! CLI module for JURIS
//!
//! Provides command-line interface parsing for the juris-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// JURIS - legal research job orchestrator
///
/// Runs case-law retrieval and live web search concurrently and synthesizes
/// the results into a formal research report.
#[derive(Parser, Debug)]
#[command(
    name = "juris-server",
    author = "Juris Labs <build@juris.dev>",
    version,
    about = "JURIS - legal research job orchestrator",
    long_about = "Runs case-law retrieval and live web search concurrently and synthesizes\n\
                  the results into a formal legal research report.\n\n\
                  Run without arguments to start the server, or use 'init' to scaffold a configuration.",
    after_help = "EXAMPLES:\n    \
                  juris-server init                          # Scaffold juris.toml and .env.example\n    \
                  juris-server                               # Start the server (requires juris.toml)\n    \
                  juris-server --config my.toml              # Use a custom config file\n    \
                  juris-server research \"rent escrow\" --no-web  # Run one job and print the report"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "juris.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server (the default)
    Serve,

    /// Write a starter juris.toml and .env.example
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// LLM provider to configure (openai or ollama)
        #[arg(long, default_value = "openai")]
        provider: String,

        /// Web search provider to configure (tavily or duckduckgo)
        #[arg(long, default_value = "tavily")]
        web_provider: String,

        /// Host address for the server
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for the server
        #[arg(long, default_value = "3000")]
        port: u16,
    },

    /// Show configuration information
    Config {
        /// Show the full configuration
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Run a single research job in-process and print the report
    Research {
        /// The legal research question
        query: String,

        /// Skip case-law retrieval
        #[arg(long)]
        no_case_law: bool,

        /// Skip web search
        #[arg(long)]
        no_web: bool,

        /// Only include cases decided in or after this year
        #[arg(long)]
        year_start: Option<i32>,

        /// Only include cases decided in or before this year
        #[arg(long)]
        year_end: Option<i32>,

        /// Report format (markdown or json)
        #[arg(long, default_value = "markdown")]
        format: String,

        /// Report length (brief, standard or comprehensive)
        #[arg(long, default_value = "comprehensive")]
        length: String,

        /// Give up waiting after this many seconds
        #[arg(long, default_value = "900")]
        timeout_secs: u64,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
