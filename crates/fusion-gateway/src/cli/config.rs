//! `fusion-gateway config validate|show`.

use std::path::Path;

use fusion_domain::config::Config;

/// Parses and validates the config, printing any error. Returns `true`
/// when valid.
pub fn validate(config: &Config, config_path: &Path) -> bool {
    match config.validate() {
        Ok(()) => {
            println!("Config OK ({})", config_path.display());
            true
        }
        Err(e) => {
            println!("{e}");
            false
        }
    }
}

/// Dumps the resolved config (with defaults filled in by serde) as JSON.
pub fn show(config: &Config) {
    match serde_json::to_string_pretty(config) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("failed to serialize config: {e}");
            std::process::exit(1);
        }
    }
}
