use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Signing secret used when none is configured. Only suitable for local use.
pub const DEFAULT_JWT_SECRET: &str = "mysecret";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 4096;

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// Bind address
    pub bind_address: String,

    /// Secret for verifying HS256 credentials
    pub jwt_secret: String,

    /// Enable structured JSON logging
    pub json_logs: bool,

    /// Bound on each connection's outbound queue; a peer that falls this far
    /// behind is disconnected
    pub outbound_queue_capacity: usize,

    /// Longest accepted chat body in bytes
    pub max_message_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: "0.0.0.0".to_string(),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            json_logs: false,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

/// Salsa chat relay server
#[derive(Parser, Serialize, Clone, Debug, Default)]
#[command(name = "salsa-server", version, about = "Salsa chat relay server")]
pub struct Cli {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Secret for verifying HS256 credentials
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,

    /// Enable structured JSON logging
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Outbound queue bound per connection
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_queue_capacity: Option<usize>,

    /// Longest accepted chat body in bytes
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_message_bytes: Option<usize>,

    /// Path to TOML config file
    #[arg(long, default_value = "./salsa.toml")]
    #[serde(skip)]
    pub config: String,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (SALSA_*) < CLI args
    pub fn load(cli: &Cli) -> Result<Self, figment::Error> {
        Self::figment(cli).extract()
    }

    fn figment(cli: &Cli) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("SALSA_"))
            .merge(Serialized::defaults(cli))
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Salsa Chat Relay Configuration
# Place this file at ./salsa.toml or specify with --config <path>
# All settings can be overridden via environment variables (SALSA_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 3000)
# port = 3000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Secret for verifying client credentials (HS256).
# Change this outside local development.
# jwt_secret = "mysecret"

# Enable structured JSON logging
# json_logs = false

# Frames queued per connection before a slow client is disconnected
# outbound_queue_capacity = 64

# Longest accepted chat message in bytes; longer ones are dropped
# max_message_bytes = 4096
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn cli_with_config(path: &str) -> Cli {
        Cli {
            config: path.to_string(),
            ..Cli::default()
        }
    }

    #[test]
    fn test_defaults_without_sources() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&cli_with_config("missing.toml"))?;
            assert_eq!(config, Config::default());
            assert!(config.uses_default_secret());
            Ok(())
        });
    }

    #[test]
    fn test_layering_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file("salsa.toml", "port = 4000\njwt_secret = \"from-file\"")?;
            jail.set_env("SALSA_PORT", "5000");

            let mut cli = cli_with_config("salsa.toml");
            let config = Config::load(&cli)?;
            assert_eq!(config.port, 5000);
            assert_eq!(config.jwt_secret, "from-file");

            cli.port = Some(6000);
            let config = Config::load(&cli)?;
            assert_eq!(config.port, 6000);
            assert_eq!(config.jwt_secret, "from-file");
            Ok(())
        });
    }

    #[test]
    fn test_template_is_valid_toml() {
        Jail::expect_with(|jail| {
            jail.create_file("salsa.toml", &generate_config_template())?;
            let config = Config::load(&cli_with_config("salsa.toml"))?;
            assert_eq!(config, Config::default());
            Ok(())
        });
    }
}
