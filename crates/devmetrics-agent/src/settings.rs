use std::path::Path;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

/// Which wire protocol the dispatcher uses. Selected once at startup and never switched
/// at runtime (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    Grpc,
}

impl Default for TransportKind {
    fn default() -> Self {
        TransportKind::Http
    }
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(TransportKind::Http),
            "grpc" => Ok(TransportKind::Grpc),
            other => Err(format!("unknown transport {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
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

/// Fully-resolved agent configuration (spec §6, precedence
/// `defaults < file < flags < env`, same layering the server uses).
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub server_address: String,
    pub grpc_address: String,
    pub poll_interval_secs: u64,
    pub report_interval_secs: u64,
    pub hash_key: String,
    pub crypto_key_path: String,
    pub transport: TransportKind,
    pub log_format: LogFormat,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:8080".to_string(),
            grpc_address: "127.0.0.1:8081".to_string(),
            poll_interval_secs: 2,
            report_interval_secs: 10,
            hash_key: String::new(),
            crypto_key_path: String::new(),
            transport: TransportKind::Http,
            log_format: LogFormat::Auto,
        }
    }
}

impl AgentSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn crypto_key_configured(&self) -> bool {
        !self.crypto_key_path.is_empty() && Path::new(&self.crypto_key_path).exists()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PartialAgentSettings {
    server_address: Option<String>,
    grpc_address: Option<String>,
    poll_interval_secs: Option<u64>,
    report_interval_secs: Option<u64>,
    hash_key: Option<String>,
    crypto_key_path: Option<String>,
    transport: Option<TransportKind>,
    log_format: Option<LogFormat>,
}

impl PartialAgentSettings {
    fn apply_to(self, settings: &mut AgentSettings) {
        if let Some(v) = self.server_address {
            settings.server_address = v;
        }
        if let Some(v) = self.grpc_address {
            settings.grpc_address = v;
        }
        if let Some(v) = self.poll_interval_secs {
            settings.poll_interval_secs = v;
        }
        if let Some(v) = self.report_interval_secs {
            settings.report_interval_secs = v;
        }
        if let Some(v) = self.hash_key {
            settings.hash_key = v;
        }
        if let Some(v) = self.crypto_key_path {
            settings.crypto_key_path = v;
        }
        if let Some(v) = self.transport {
            settings.transport = v;
        }
        if let Some(v) = self.log_format {
            settings.log_format = v;
        }
    }
}

/// CLI flags, all optional so an unset flag never clobbers a lower layer.
#[derive(Debug, Parser)]
#[command(name = "devmetrics-agent", about = "devmetrics runtime/OS metric agent")]
pub struct Cli {
    /// Path to a JSON config file, merged before flags and environment variables.
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Collector server HTTP address.
    #[arg(short = 'a', long = "address")]
    pub address: Option<String>,

    /// Collector server gRPC address.
    #[arg(long = "grpc-address")]
    pub grpc_address: Option<String>,

    /// Sampling interval in seconds.
    #[arg(short = 'p', long = "poll-interval")]
    pub poll_interval: Option<u64>,

    /// Dispatch interval in seconds.
    #[arg(short = 'r', long = "report-interval")]
    pub report_interval: Option<u64>,

    /// Key for metrics HMAC signing.
    #[arg(short = 'k', long = "key")]
    pub hash_key: Option<String>,

    /// Path to the RSA public key used to encrypt outgoing payloads.
    #[arg(long = "crypto-key")]
    pub crypto_key: Option<String>,

    /// Transport protocol: `http` or `grpc`.
    #[arg(short = 't', long = "transport")]
    pub transport: Option<TransportKind>,

    #[arg(long = "log-format")]
    pub log_format: Option<LogFormat>,
}

fn env_override(settings: &mut AgentSettings) {
    if let Ok(v) = std::env::var("ADDRESS") {
        settings.server_address = v;
    }
    if let Ok(v) = std::env::var("GRPC_ADDRESS") {
        settings.grpc_address = v;
    }
    if let Ok(v) = std::env::var("POLL_INTERVAL") {
        if let Ok(v) = v.parse() {
            settings.poll_interval_secs = v;
        }
    }
    if let Ok(v) = std::env::var("REPORT_INTERVAL") {
        if let Ok(v) = v.parse() {
            settings.report_interval_secs = v;
        }
    }
    if let Ok(v) = std::env::var("KEY") {
        settings.hash_key = v;
    }
    if let Ok(v) = std::env::var("CRYPTO_KEY") {
        settings.crypto_key_path = v;
    }
    if let Ok(v) = std::env::var("TRANSPORT") {
        if let Ok(v) = v.parse() {
            settings.transport = v;
        }
    }
    if let Ok(v) = std::env::var("LOG_FORMAT") {
        if let Ok(v) = v.parse() {
            settings.log_format = v;
        }
    }
}

impl AgentSettings {
    /// Layers, in order: built-in defaults, an optional JSON config file, parsed CLI
    /// flags, then environment variables (highest precedence).
    pub fn load(cli: Cli) -> anyhow::Result<Self> {
        let mut settings = AgentSettings::default();

        if let Some(path) = &cli.config {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("reading config file {path:?}: {e}"))?;
            let partial: PartialAgentSettings = serde_json::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("parsing config file {path:?}: {e}"))?;
            partial.apply_to(&mut settings);
        }

        if let Some(v) = cli.address {
            settings.server_address = v;
        }
        if let Some(v) = cli.grpc_address {
            settings.grpc_address = v;
        }
        if let Some(v) = cli.poll_interval {
            settings.poll_interval_secs = v;
        }
        if let Some(v) = cli.report_interval {
            settings.report_interval_secs = v;
        }
        if let Some(v) = cli.hash_key {
            settings.hash_key = v;
        }
        if let Some(v) = cli.crypto_key {
            settings.crypto_key_path = v;
        }
        if let Some(v) = cli.transport {
            settings.transport = v;
        }
        if let Some(v) = cli.log_format {
            settings.log_format = v;
        }

        env_override(&mut settings);

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_baseline() {
        let settings = AgentSettings::default();
        assert_eq!(settings.server_address, "127.0.0.1:8080");
        assert_eq!(settings.poll_interval_secs, 2);
        assert_eq!(settings.transport, TransportKind::Http);
    }

    #[test]
    fn file_layer_is_overridden_by_a_later_cli_layer() {
        let mut settings = AgentSettings::default();
        let partial = PartialAgentSettings {
            server_address: Some("10.0.0.1:9000".to_string()),
            ..Default::default()
        };
        partial.apply_to(&mut settings);
        assert_eq!(settings.server_address, "10.0.0.1:9000");

        settings.server_address = "127.0.0.1:7000".to_string();
        assert_eq!(settings.server_address, "127.0.0.1:7000");
    }
}
