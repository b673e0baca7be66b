/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed engine configuration with spec-default trading values
[POS]:    Configuration layer - process setup
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the basis engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    /// Exchange credentials and environment
    pub exchange: ExchangeConfig,
    /// Quote bus connection
    pub quote_bus: QuoteBusConfig,
    /// Trading thresholds and timing
    #[serde(default)]
    pub trading: TradingConfig,
    /// Durable context directory
    #[serde(default = "default_context_dir")]
    pub context_dir: PathBuf,
    /// Rolling log directory
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeConfig {
    pub api_key: String,
    pub api_secret: String,
    #[serde(default)]
    pub sandbox: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuoteBusConfig {
    /// NATS server URL
    pub url: String,
    /// Client certificate chain (PEM)
    pub cert_file: PathBuf,
    /// Client key (PEM)
    pub key_file: PathBuf,
    /// Subject prefix, e.g. `binance` for `binance.spot.bookTicker.*`
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    /// Bounded quote queue size; overflow drops the oldest updates
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TradingConfig {
    /// Entry threshold on the open ratio
    #[serde(default = "default_spread")]
    pub spread: Decimal,
    /// Close-threshold widening factor per divergence level
    #[serde(default = "default_diverge_factor")]
    pub diverge_factor: u32,
    /// Entry size in quote notional
    #[serde(default = "default_notional")]
    pub notional: Decimal,
    /// Rolling median window over ratio samples
    #[serde(default = "default_median_window")]
    pub median_window: usize,
    /// Peg loop tick interval
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Peg loop hard deadline
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// Two-character client order id prefix
    #[serde(default = "default_order_id_prefix")]
    pub order_id_prefix: String,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            spread: default_spread(),
            diverge_factor: default_diverge_factor(),
            notional: default_notional(),
            median_window: default_median_window(),
            poll_interval_ms: default_poll_interval_ms(),
            deadline_secs: default_deadline_secs(),
            order_id_prefix: default_order_id_prefix(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

fn default_context_dir() -> PathBuf {
    PathBuf::from(".context")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".logs")
}

fn default_subject_prefix() -> String {
    "binance".to_string()
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_spread() -> Decimal {
    Decimal::new(65, 5)
}

fn default_diverge_factor() -> u32 {
    2
}

fn default_notional() -> Decimal {
    Decimal::from(20)
}

fn default_median_window() -> usize {
    50
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_deadline_secs() -> u64 {
    600
}

fn default_order_id_prefix() -> String {
    "ba".to_string()
}
