//! Configuration

use alloy_primitives::Address;
use anyhow::{Context, Result};
use counter_bindings::{COUNTER_ADDRESS, DEFAULT_EXPLORER_URL};
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf, time::Duration};

/// Public Base Sepolia RPC endpoint
pub const DEFAULT_RPC_URL: &str = "https://sepolia.base.org";

/// Default journal location
pub const DEFAULT_TRACE_PATH: &str = "./logs/counter-trace.log";

/// Timers used by the write and reconciliation paths
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timing {
    /// Wait after a successful write before re-reading the value.
    /// A UX heuristic to outlast read-path lag, not a consistency guarantee.
    pub settle_delay: Duration,
    /// How long the "value changed" pulse stays on
    pub pulse: Duration,
    /// Receipt polling interval
    pub receipt_poll: Duration,
    /// Give up waiting for a receipt after this long
    pub receipt_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(2000),
            pulse: Duration::from_millis(1000),
            receipt_poll: Duration::from_millis(1000),
            receipt_timeout: Duration::from_secs(120),
        }
    }
}

/// Write-lifecycle journal configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraceConfig {
    /// Whether journal lines are written
    pub enabled: bool,
    /// Output file
    pub path: PathBuf,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self { enabled: false, path: PathBuf::from(DEFAULT_TRACE_PATH) }
    }
}

/// Client configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Wallet / chain JSON-RPC endpoint
    pub rpc_url: String,
    /// Counter contract address
    pub counter_address: Address,
    /// Connected account; `None` means no wallet is connected
    pub account: Option<Address>,
    /// Block explorer base URL
    pub explorer_url: String,
    /// Timers
    pub timing: Timing,
    /// Journal
    pub trace: TraceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            counter_address: COUNTER_ADDRESS,
            account: None,
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
            timing: Timing::default(),
            trace: TraceConfig::default(),
        }
    }
}

impl Config {
    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unset or unparsable numbers fall
    /// back to their defaults; malformed addresses are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        let counter_address = match lookup("COUNTER_ADDRESS") {
            Some(s) => s.trim().parse::<Address>().with_context(|| format!("invalid COUNTER_ADDRESS `{s}`"))?,
            None => defaults.counter_address,
        };
        let account = lookup("ACCOUNT_ADDRESS")
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.trim().parse::<Address>().with_context(|| format!("invalid ACCOUNT_ADDRESS `{s}`"))
            })
            .transpose()?;

        let timing = Timing {
            settle_delay: millis("SETTLE_DELAY_MS", defaults.timing.settle_delay),
            pulse: millis("PULSE_MS", defaults.timing.pulse),
            receipt_poll: millis("RECEIPT_POLL_MS", defaults.timing.receipt_poll),
            receipt_timeout: lookup("RECEIPT_TIMEOUT_SECS")
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timing.receipt_timeout),
        };

        let trace = TraceConfig {
            enabled: lookup("TRACE_ENABLED").map(|s| s == "true" || s == "1").unwrap_or(false),
            path: lookup("TRACE_PATH").map(PathBuf::from).unwrap_or(defaults.trace.path),
        };

        Ok(Self {
            rpc_url: lookup("RPC_URL").unwrap_or(defaults.rpc_url),
            counter_address,
            account,
            explorer_url: lookup("EXPLORER_URL").unwrap_or(defaults.explorer_url),
            timing,
            trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.counter_address, COUNTER_ADDRESS);
        assert!(config.account.is_none());
        assert!(!config.trace.enabled);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("RPC_URL", "http://localhost:8545"),
            ("ACCOUNT_ADDRESS", "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"),
            ("SETTLE_DELAY_MS", "500"),
            ("RECEIPT_TIMEOUT_SECS", "30"),
            ("TRACE_ENABLED", "1"),
        ])
        .unwrap();
        assert_eq!(config.rpc_url, "http://localhost:8545");
        assert!(config.account.is_some());
        assert_eq!(config.timing.settle_delay, Duration::from_millis(500));
        assert_eq!(config.timing.receipt_timeout, Duration::from_secs(30));
        assert_eq!(config.timing.pulse, Timing::default().pulse);
        assert!(config.trace.enabled);
    }

    #[test]
    fn test_bad_number_falls_back() {
        let config = load(&[("PULSE_MS", "soon")]).unwrap();
        assert_eq!(config.timing.pulse, Timing::default().pulse);
    }

    #[test]
    fn test_bad_address_is_error() {
        assert!(load(&[("COUNTER_ADDRESS", "0x1234")]).is_err());
        assert!(load(&[("ACCOUNT_ADDRESS", "not-an-address")]).is_err());
    }

    #[test]
    fn test_config_serializes_for_logging() {
        let config = load(&[("ACCOUNT_ADDRESS", "0x70997970C51812dc3A010C7d01b50e0d17dc79C8")]).unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["rpc_url"], DEFAULT_RPC_URL);
        assert!(json["timing"]["settle_delay"].is_object());

        let back: Config = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
