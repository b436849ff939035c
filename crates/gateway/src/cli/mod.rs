pub mod chat;
pub mod config;

use clap::{Parser, Subcommand};

/// Quill — a grounded conversational assistant backend.
#[derive(Debug, Parser)]
#[command(name = "quill", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Interactive terminal chat against a running gateway.
    Chat {
        /// Gateway base URL.
        #[arg(long, default_value = "http://127.0.0.1:4100")]
        server: String,
        /// Device identifier to chat as.
        #[arg(long, default_value = "cli")]
        device: String,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `QUILL_CONFIG` (or
/// `config.toml` by default). A missing file falls back to defaults.
/// Returns the parsed [`Config`](quill_domain::config::Config) and the
/// path that was used.
pub fn load_config() -> anyhow::Result<(quill_domain::config::Config, String)> {
    let config_path =
        std::env::var("QUILL_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        quill_domain::config::Config::default()
    };

    Ok((config, config_path))
}
