pub mod config;
pub mod doctor;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// fusion-gateway — a config-driven, multi-tenant API gateway core.
#[derive(Debug, Parser)]
#[command(name = "fusion-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load config, build the gateway, and serve tool invocations read as
    /// JSON lines from stdin (default when no subcommand is given). The
    /// network listener that would carry these requests in production is
    /// an external collaborator (spec §1); this is a dev-loop stand-in.
    Serve,
    /// Run diagnostic checks against the current configuration and runtime
    /// environment.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Completes an out-of-band auth-setup flow.
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse and validate the config file, reporting any errors.
    Validate,
    /// Dump the resolved configuration as JSON.
    Show,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Completes the `oauth2_external`/`user_credentials` setup flow named
    /// by a `fusion-auth <blob>` instruction — the text an `{service}_auth_setup`
    /// tool call emits (spec §4.15).
    Complete {
        /// The `fusion-auth <blob>` instruction, or a bare blob.
        instruction: String,
        /// OAuth2 authorization code returned by the provider's redirect
        /// (`oauth2_external` only).
        #[arg(long)]
        code: Option<String>,
        /// Redirect URI registered with the provider (`oauth2_external` only).
        #[arg(long)]
        redirect_uri: Option<String>,
        /// A `name=value` credential field (`user_credentials` only); may be
        /// repeated once per field.
        #[arg(long = "field")]
        fields: Vec<String>,
    },
}

/// Loads the config from `FUSION_CONFIG` (default `config.json`), the same
/// env-var-driven path resolution `sa_gateway::cli::load_config` used for
/// `SA_CONFIG`.
pub fn load_config() -> anyhow::Result<(fusion_domain::config::Config, PathBuf)> {
    let config_path = std::env::var("FUSION_CONFIG").unwrap_or_else(|_| "config.json".into());
    let path = PathBuf::from(&config_path);
    let config = fusion_domain::config::Config::load_from_file(&path)
        .map_err(|e| anyhow::anyhow!("loading {}: {e}", path.display()))?;
    Ok((config, path))
}
