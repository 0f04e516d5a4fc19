use std::path::Path;

use clap::Parser;
use serde::Deserialize;

/// Controls which `slog` drain the root logger is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `slog-term` when stderr is a TTY, `slog-json` otherwise.
    Auto,
    Text,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Auto
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(LogFormat::Auto),
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}

/// Fully-resolved server configuration, after layering defaults, an optional JSON config
/// file, CLI flags, and environment variables (spec §6, precedence
/// `defaults < file < flags < env`).
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub http_address: String,
    pub grpc_address: String,
    pub hash_key: String,
    pub crypto_key_path: String,
    pub restore: bool,
    pub store_interval_secs: u64,
    pub store_file: String,
    pub db_dsn: String,
    pub trusted_subnet: String,
    pub log_format: LogFormat,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_address: "127.0.0.1:8080".to_string(),
            grpc_address: "127.0.0.1:8081".to_string(),
            hash_key: String::new(),
            crypto_key_path: String::new(),
            restore: true,
            store_interval_secs: 300,
            store_file: "tmp/devops-metrics-db.json".to_string(),
            db_dsn: String::new(),
            trusted_subnet: String::new(),
            log_format: LogFormat::Auto,
        }
    }
}

/// All-`Option` mirror of [`ServerSettings`] deserialized from the `-c/--config` JSON file;
/// absent fields leave the running default untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PartialServerSettings {
    http_address: Option<String>,
    grpc_address: Option<String>,
    hash_key: Option<String>,
    crypto_key_path: Option<String>,
    restore: Option<bool>,
    store_interval_secs: Option<u64>,
    store_file: Option<String>,
    db_dsn: Option<String>,
    trusted_subnet: Option<String>,
    log_format: Option<LogFormat>,
}

impl PartialServerSettings {
    fn apply_to(self, settings: &mut ServerSettings) {
        if let Some(v) = self.http_address {
            settings.http_address = v;
        }
        if let Some(v) = self.grpc_address {
            settings.grpc_address = v;
        }
        if let Some(v) = self.hash_key {
            settings.hash_key = v;
        }
        if let Some(v) = self.crypto_key_path {
            settings.crypto_key_path = v;
        }
        if let Some(v) = self.restore {
            settings.restore = v;
        }
        if let Some(v) = self.store_interval_secs {
            settings.store_interval_secs = v;
        }
        if let Some(v) = self.store_file {
            settings.store_file = v;
        }
        if let Some(v) = self.db_dsn {
            settings.db_dsn = v;
        }
        if let Some(v) = self.trusted_subnet {
            settings.trusted_subnet = v;
        }
        if let Some(v) = self.log_format {
            settings.log_format = v;
        }
    }
}

/// CLI flags. All fields are optional so that a layer left unset by the user doesn't
/// clobber the JSON-file or default layer beneath it.
#[derive(Debug, Parser)]
#[command(name = "devmetrics-server", about = "devmetrics telemetry collector")]
pub struct Cli {
    /// Path to a JSON config file, merged before flags and environment variables.
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Address and port for the HTTP listener.
    #[arg(short = 'a', long = "address")]
    pub address: Option<String>,

    /// Address and port for the gRPC listener.
    #[arg(long = "grpc-address")]
    pub grpc_address: Option<String>,

    /// Key for metrics HMAC sign validation.
    #[arg(short = 'k', long = "key")]
    pub hash_key: Option<String>,

    /// Path to the RSA private key used to decrypt incoming payloads.
    #[arg(long = "crypto-key")]
    pub crypto_key: Option<String>,

    /// Restore metrics from the snapshot file on start.
    #[arg(short = 'r', long = "restore")]
    pub restore: Option<bool>,

    /// Metrics dump interval in seconds.
    #[arg(short = 'i', long = "store-interval")]
    pub store_interval: Option<u64>,

    /// Where to store the metrics snapshot file.
    #[arg(short = 'f', long = "store-file")]
    pub store_file: Option<String>,

    /// DSN for PostgreSQL; when set, the SQL repository is used instead of memory+snapshot.
    #[arg(short = 'd', long = "database-dsn")]
    pub database_dsn: Option<String>,

    /// Trusted CIDR for the subnet middleware; empty disables the check.
    #[arg(short = 't', long = "trusted-subnet")]
    pub trusted_subnet: Option<String>,

    /// Enable the pprof-style profiler endpoints (external collaborator, not implemented here).
    #[arg(short = 'p', long = "profile")]
    pub profile: bool,

    #[arg(long = "log-format")]
    pub log_format: Option<LogFormat>,
}

fn env_override(settings: &mut ServerSettings) {
    if let Ok(v) = std::env::var("ADDRESS") {
        settings.http_address = v;
    }
    if let Ok(v) = std::env::var("GRPC_ADDRESS") {
        settings.grpc_address = v;
    }
    if let Ok(v) = std::env::var("KEY") {
        settings.hash_key = v;
    }
    if let Ok(v) = std::env::var("CRYPTO_KEY") {
        settings.crypto_key_path = v;
    }
    if let Ok(v) = std::env::var("RESTORE") {
        if let Ok(v) = v.parse() {
            settings.restore = v;
        }
    }
    if let Ok(v) = std::env::var("STORE_INTERVAL") {
        if let Ok(v) = v.parse() {
            settings.store_interval_secs = v;
        }
    }
    if let Ok(v) = std::env::var("STORE_FILE") {
        settings.store_file = v;
    }
    if let Ok(v) = std::env::var("DATABASE_DSN") {
        settings.db_dsn = v;
    }
    if let Ok(v) = std::env::var("TRUSTED_SUBNET") {
        settings.trusted_subnet = v;
    }
    if let Ok(v) = std::env::var("LOG_FORMAT") {
        if let Ok(v) = v.parse() {
            settings.log_format = v;
        }
    }
}

impl ServerSettings {
    /// Builds settings by layering, in order: built-in defaults, an optional JSON config
    /// file, parsed CLI flags, then environment variables (highest precedence).
    pub fn load(cli: Cli) -> anyhow::Result<Self> {
        let mut settings = ServerSettings::default();

        if let Some(path) = &cli.config {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("reading config file {path:?}: {e}"))?;
            let partial: PartialServerSettings = serde_json::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("parsing config file {path:?}: {e}"))?;
            partial.apply_to(&mut settings);
        }

        if let Some(v) = cli.address {
            settings.http_address = v;
        }
        if let Some(v) = cli.grpc_address {
            settings.grpc_address = v;
        }
        if let Some(v) = cli.hash_key {
            settings.hash_key = v;
        }
        if let Some(v) = cli.crypto_key {
            settings.crypto_key_path = v;
        }
        if let Some(v) = cli.restore {
            settings.restore = v;
        }
        if let Some(v) = cli.store_interval {
            settings.store_interval_secs = v;
        }
        if let Some(v) = cli.store_file {
            settings.store_file = v;
        }
        if let Some(v) = cli.database_dsn {
            settings.db_dsn = v;
        }
        if let Some(v) = cli.trusted_subnet {
            settings.trusted_subnet = v;
        }
        if let Some(v) = cli.log_format {
            settings.log_format = v;
        }

        env_override(&mut settings);

        Ok(settings)
    }

    pub fn trusted_network(&self) -> Option<ipnetwork::IpNetwork> {
        if self.trusted_subnet.is_empty() {
            return None;
        }
        self.trusted_subnet.parse().ok()
    }

    pub fn crypto_key_configured(&self) -> bool {
        !self.crypto_key_path.is_empty() && Path::new(&self.crypto_key_path).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_baseline() {
        let settings = ServerSettings::default();
        assert_eq!(settings.http_address, "127.0.0.1:8080");
        assert!(settings.restore);
        assert_eq!(settings.store_interval_secs, 300);
    }

    #[test]
    fn empty_trusted_subnet_disables_the_check() {
        let settings = ServerSettings::default();
        assert!(settings.trusted_network().is_none());
    }

    #[test]
    fn cli_flags_override_json_file_defaults() {
        let mut settings = ServerSettings::default();
        let partial = PartialServerSettings {
            http_address: Some("0.0.0.0:9000".to_string()),
            ..Default::default()
        };
        partial.apply_to(&mut settings);
        assert_eq!(settings.http_address, "0.0.0.0:9000");

        settings.http_address = "127.0.0.1:7000".to_string();
        assert_eq!(settings.http_address, "127.0.0.1:7000");
    }
}
