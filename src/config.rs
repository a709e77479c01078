//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Target cluster
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Mainnet,
    Devnet,
}

impl Network {
    /// Default JSON-RPC endpoint for this network
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.mainnet-beta.solana.com",
            Network::Devnet => "https://api.devnet.solana.com",
        }
    }

    /// Default websocket endpoint for this network
    pub fn default_ws_endpoint(&self) -> &'static str {
        match self {
            Network::Mainnet => "wss://api.mainnet-beta.solana.com",
            Network::Devnet => "wss://api.devnet.solana.com",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_network")]
    pub network: Network,
    /// JSON-RPC endpoint; when empty, derived from `network`
    #[serde(default)]
    pub endpoint: String,
    /// Websocket endpoint; when empty, derived from `network`
    #[serde(default)]
    pub ws_endpoint: String,
    #[serde(default = "default_commitment")]
    pub commitment: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl RpcConfig {
    /// Effective JSON-RPC endpoint (explicit value or network default)
    pub fn endpoint(&self) -> String {
        if self.endpoint.is_empty() {
            self.network.default_endpoint().to_string()
        } else {
            self.endpoint.clone()
        }
    }

    /// Effective websocket endpoint (explicit value or network default)
    pub fn ws_endpoint(&self) -> String {
        if self.ws_endpoint.is_empty() {
            self.network.default_ws_endpoint().to_string()
        } else {
            self.ws_endpoint.clone()
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            endpoint: String::new(),
            ws_endpoint: String::new(),
            commitment: default_commitment(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Wallet monitoring configuration
///
/// All thresholds and timers of the monitoring subsystem live here; no call
/// site hard-codes them.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// SOL moved (absolute) above which an activity event is significant
    #[serde(default = "default_significance_threshold")]
    pub significance_threshold_sol: f64,

    /// Evict a wallet after this long without activity
    #[serde(default = "default_inactivity_ttl_secs")]
    pub inactivity_ttl_secs: u64,

    /// How often the reaper sweeps for inactive wallets
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,

    /// Minimum balance for a wallet to be accepted for monitoring
    #[serde(default = "default_min_wallet_balance")]
    pub min_wallet_balance_sol: f64,

    /// Maximum token-holder accounts considered per discovery scan
    #[serde(default = "default_holder_scan_limit")]
    pub holder_scan_limit: usize,

    /// Capacity of the raw-notification channel feeding the worker
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Capacity of the significant-event broadcast bus
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl MonitorConfig {
    pub fn inactivity_ttl(&self) -> Duration {
        Duration::from_secs(self.inactivity_ttl_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            significance_threshold_sol: default_significance_threshold(),
            inactivity_ttl_secs: default_inactivity_ttl_secs(),
            reap_interval_secs: default_reap_interval_secs(),
            min_wallet_balance_sol: default_min_wallet_balance(),
            holder_scan_limit: default_holder_scan_limit(),
            channel_capacity: default_channel_capacity(),
            event_capacity: default_event_capacity(),
        }
    }
}

// Default value functions
fn default_network() -> Network {
    Network::Mainnet
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_significance_threshold() -> f64 {
    1.0
}

fn default_inactivity_ttl_secs() -> u64 {
    86400
}

fn default_reap_interval_secs() -> u64 {
    3600
}

fn default_min_wallet_balance() -> f64 {
    0.01
}

fn default_holder_scan_limit() -> usize {
    100
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_event_capacity() -> usize {
    256
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix RADAR_)
            .add_source(
                config::Environment::with_prefix("RADAR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.monitor.significance_threshold_sol <= 0.0 {
            anyhow::bail!("significance_threshold_sol must be positive");
        }

        if self.monitor.min_wallet_balance_sol < 0.0 {
            anyhow::bail!("min_wallet_balance_sol cannot be negative");
        }

        if self.monitor.inactivity_ttl_secs == 0 {
            anyhow::bail!("inactivity_ttl_secs must be positive");
        }

        if self.monitor.reap_interval_secs == 0 {
            anyhow::bail!("reap_interval_secs must be positive");
        }

        if self.monitor.holder_scan_limit == 0 {
            anyhow::bail!("holder_scan_limit must be positive");
        }

        if self.monitor.channel_capacity == 0 || self.monitor.event_capacity == 0 {
            anyhow::bail!("channel capacities must be positive");
        }

        match self.rpc.commitment.as_str() {
            "processed" | "confirmed" | "finalized" => {}
            other => anyhow::bail!("Unknown commitment level: {}", other),
        }

        if self.monitor.reap_interval_secs > self.monitor.inactivity_ttl_secs {
            tracing::warn!(
                "reap_interval ({}s) exceeds inactivity_ttl ({}s) - wallets may linger past their TTL",
                self.monitor.reap_interval_secs,
                self.monitor.inactivity_ttl_secs
            );
        }

        Ok(())
    }

    /// Get configuration for display (API keys in endpoint URLs masked)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    network: {:?}
    endpoint: {}
    ws_endpoint: {}
    commitment: {}
    timeout: {}ms
  Monitor:
    significance_threshold: {} SOL
    inactivity_ttl: {}s
    reap_interval: {}s
    min_wallet_balance: {} SOL
    holder_scan_limit: {}
"#,
            self.rpc.network,
            mask_url(&self.rpc.endpoint()),
            mask_url(&self.rpc.ws_endpoint()),
            self.rpc.commitment,
            self.rpc.timeout_ms,
            self.monitor.significance_threshold_sol,
            self.monitor.inactivity_ttl_secs,
            self.monitor.reap_interval_secs,
            self.monitor.min_wallet_balance_sol,
            self.monitor.holder_scan_limit,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.monitor.significance_threshold_sol, 1.0);
        assert_eq!(config.monitor.inactivity_ttl_secs, 86400);
        assert_eq!(config.monitor.reap_interval_secs, 3600);
        assert_eq!(config.monitor.min_wallet_balance_sol, 0.01);
        assert_eq!(config.monitor.holder_scan_limit, 100);
        assert_eq!(config.rpc.network, Network::Mainnet);
    }

    #[test]
    fn test_network_default_endpoints() {
        let config = Config::default();
        assert!(config.rpc.endpoint().contains("mainnet"));

        let devnet = RpcConfig {
            network: Network::Devnet,
            ..Default::default()
        };
        assert!(devnet.endpoint().contains("devnet"));
        assert!(devnet.ws_endpoint().starts_with("wss://"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[rpc]
network = "devnet"
commitment = "finalized"

[monitor]
significance_threshold_sol = 2.5
reap_interval_secs = 600
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.rpc.network, Network::Devnet);
        assert_eq!(config.rpc.commitment, "finalized");
        assert_eq!(config.monitor.significance_threshold_sol, 2.5);
        assert_eq!(config.monitor.reap_interval_secs, 600);
        // Untouched fields keep their defaults
        assert_eq!(config.monitor.inactivity_ttl_secs, 86400);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.monitor.significance_threshold_sol = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rpc.commitment = "instant".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://rpc.example.com?api-key=secret"),
            "https://rpc.example.com?***"
        );
        assert_eq!(mask_url("https://rpc.example.com"), "https://rpc.example.com");
    }
}
