//! Command-line argument parsing for fondrag.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// fondrag - Investment-products consultation assistant
#[derive(Parser, Debug)]
#[command(name = "fondrag")]
#[command(version = "0.3.0")]
#[command(about = "Answer questions about investment products from a local knowledge base", long_about = None)]
pub struct Args {
    /// One-shot question to answer
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Knowledge-base file path (overrides the configured one)
    #[arg(long)]
    pub knowledge: Option<PathBuf>,

    /// Use the offline token-hash embedder instead of the local model
    #[arg(long)]
    pub offline: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive consultation session
    Chat,

    /// Run system diagnostics and health checks
    Doctor,

    /// Display current configuration
    Config,
}

impl Args {
    /// Check that a query or a subcommand was provided, not both
    pub fn validate(&self) -> Result<(), String> {
        if self.command.is_none() && self.query.is_none() {
            return Err(
                "Question required. Use 'fondrag <QUERY>' or run a subcommand.".to_string(),
            );
        }

        if self.command.is_some() && self.query.is_some() {
            return Err("Cannot specify a question with a subcommand.".to_string());
        }

        Ok(())
    }
}
