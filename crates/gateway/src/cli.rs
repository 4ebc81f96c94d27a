use clap::{Parser, Subcommand};

use sous_domain::config::{Config, ConfigSeverity};

/// SousChef — a conversational cooking assistant gateway.
#[derive(Debug, Parser)]
#[command(name = "souschef", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
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

/// Load the configuration from the path specified by `SOUS_CONFIG` (or
/// `config.toml` by default).  Returns the parsed [`Config`] and the
/// path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("SOUS_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = Config::load(std::path::Path::new(&config_path))
        .map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?;
    Ok((config, config_path))
}

/// `souschef config validate` — print every issue, exit nonzero on
/// errors.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("{config_path}: OK");
        return true;
    }
    let mut valid = true;
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Error => {
                valid = false;
                println!("error: {} — {}", issue.field, issue.message);
            }
            ConfigSeverity::Warning => {
                println!("warning: {} — {}", issue.field, issue.message);
            }
        }
    }
    valid
}

/// `souschef config show` — resolved configuration as TOML.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("could not render config: {e}"),
    }
}
