//! Interactive
//!
//! Runs a command on a pseudo-terminal, feeding it lines from stdin and
//! printing every line it writes to stdout.

mod config;
mod driver;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use interactive::Session;
use tracing_subscriber::EnvFilter;

use crate::config::{default_config_path, parse_timeout, resolve_command, Config};

/// Drive an interactive program line by line.
#[derive(Parser, Debug)]
#[command(name = "interactive")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging, including every line sent and received
    #[arg(short, long)]
    pub verbose: bool,

    /// Kill the command after this many seconds (0 = no timeout)
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<String>,

    /// Bytes appended to each input line (default: carriage return)
    #[arg(long, value_name = "STR")]
    pub terminator: Option<String>,

    /// Let the terminal echo input lines back into the output
    #[arg(long)]
    pub echo: bool,

    /// Write the effective settings to the configuration file before running
    #[arg(long)]
    pub save_config: bool,

    /// Command to run
    pub command: String,

    /// Arguments passed to the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// Applies command-line flags on top of the loaded configuration.
    fn apply_to(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(ref timeout) = self.timeout {
            config.session.timeout = parse_timeout("--timeout", timeout)?;
        }

        if let Some(ref terminator) = self.terminator {
            config.session.line_terminator = unescape(terminator);
        }

        if self.echo {
            config.session.echo = true;
        }

        if self.verbose {
            config.log.level = "debug".to_string();
            config.session.verbose = true;
        }

        Ok(())
    }
}

/// Expands `\r`, `\n` and `\t` escapes typed on the command line.
fn unescape(value: &str) -> String {
    value
        .replace("\\r", "\r")
        .replace("\\n", "\n")
        .replace("\\t", "\t")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    // Apply environment variable overrides, then flags
    let env_overrides = config.apply_env_overrides()?;
    cli.apply_to(&mut config)?;

    // Validate configuration
    config.validate()?;

    if cli.save_config {
        let path = cli.config.clone().unwrap_or_else(default_config_path);
        config.save(&path)?;
        eprintln!("Configuration saved to {}", path.display());
    }

    // Initialize tracing; stdout is reserved for session output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log.level.to_lowercase()))
        .with_writer(std::io::stderr)
        .init();

    for (var, value) in &env_overrides {
        tracing::info!("Overriding configuration from environment: {}={}", var, value);
    }

    let program = resolve_command(&cli.command)?;
    tracing::debug!(command = %cli.command, path = %program.display(), "Resolved command");

    let session = Session::start_with_config(&cli.command, &cli.args, config.session.clone())
        .with_context(|| format!("Failed to start {}", cli.command))?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let status = driver::run(session, stdin, tokio::io::stdout()).await?;

    tracing::info!(%status, "Session closed");

    // Exit directly: the stdin reader may still be blocked on the terminal.
    std::process::exit(driver::exit_code(status));
}
