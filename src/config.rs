//! Configuration for the wallet bridge.
//!
//! Everything here is fixed for the lifetime of a session: the network the injected
//! wallet must be on, where read-only queries go, which contracts are involved, and how
//! deep a transaction must be buried before it counts as final.

use alloy_primitives::Address;
use coinlink_types::NetworkType;
use coinlink_types::config::{LiteralOrEnv, RpcConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::chain::WalletKind;

/// Bridge configuration, usually read from a JSON file.
///
/// ```json
/// {
///   "network": "rinkeby",
///   "rpc": [{ "http": "$RPC_URL", "rate_limit": 20 }],
///   "token_address": "0x02F61Fd266DA6E8B102D4121f5CE7b992640CF98",
///   "token_sale_address": "0x...",
///   "confirmations": 5,
///   "wallet": { "endpoint": "http://127.0.0.1:1248" }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "config_defaults::default_network")]
    network: NetworkType,
    rpc: Vec<RpcConfig>,
    token_address: LiteralOrEnv<Address>,
    token_sale_address: LiteralOrEnv<Address>,
    #[serde(default = "config_defaults::default_confirmations")]
    confirmations: u64,
    #[serde(default)]
    wallet: Option<WalletConfig>,
    #[serde(default)]
    timing: Timing,
}

/// Where to reach the user's wallet.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    pub endpoint: LiteralOrEnv<Url>,
    #[serde(default)]
    pub kind: WalletKind,
}

/// Timer periods used by the session and by confirmation waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Steady-state account refresh period.
    pub poll_interval_ms: u64,
    /// Retry delay after a probe that made no progress.
    pub retry_delay_ms: u64,
    /// Retry delay after a probe that failed outright.
    pub crash_retry_delay_ms: u64,
    /// Period of blocking transaction lookups and confirmation waits.
    pub confirmation_poll_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            retry_delay_ms: 3000,
            crash_retry_delay_ms: 2000,
            confirmation_poll_ms: 1000,
        }
    }
}

impl Timing {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn crash_retry_delay(&self) -> Duration {
        Duration::from_millis(self.crash_retry_delay_ms)
    }

    pub fn confirmation_poll(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_ms)
    }
}

pub mod config_defaults {
    use coinlink_types::NetworkType;
    use std::env;

    pub const DEFAULT_CONFIRMATIONS: u64 = 5;

    /// `rinkeby` when `$IS_TESTNET` is set to anything but `false`/`0`, `main` otherwise.
    pub fn default_network() -> NetworkType {
        let testnet = env::var("IS_TESTNET")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(false);
        NetworkType::target(testnet)
    }

    pub fn default_confirmations() -> u64 {
        DEFAULT_CONFIRMATIONS
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl BridgeConfig {
    pub fn new(
        network: NetworkType,
        rpc: Vec<RpcConfig>,
        token_address: Address,
        token_sale_address: Address,
    ) -> Self {
        Self {
            network,
            rpc,
            token_address: LiteralOrEnv::from_literal(token_address),
            token_sale_address: LiteralOrEnv::from_literal(token_sale_address),
            confirmations: config_defaults::DEFAULT_CONFIRMATIONS,
            wallet: None,
            timing: Timing::default(),
        }
    }

    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_wallet(mut self, wallet: WalletConfig) -> Self {
        self.wallet = Some(wallet);
        self
    }

    /// Network the injected wallet must report before the session becomes ready.
    pub fn network(&self) -> NetworkType {
        self.network
    }

    pub fn rpc(&self) -> &[RpcConfig] {
        &self.rpc
    }

    pub fn token_address(&self) -> Address {
        *self.token_address.inner()
    }

    pub fn token_sale_address(&self) -> Address {
        *self.token_sale_address.inner()
    }

    /// Blocks that must follow a transaction's block before it is final.
    pub fn confirmations(&self) -> u64 {
        self.confirmations
    }

    pub fn wallet(&self) -> Option<&WalletConfig> {
        self.wallet.as_ref()
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: BridgeConfig = serde_json::from_str(
            r#"{
                "network": "rinkeby",
                "rpc": [{ "http": "https://rinkeby.example.org" }],
                "token_address": "0x02f61fd266da6e8b102d4121f5ce7b992640cf98",
                "token_sale_address": "0x5e4b6ec4b3e1b4b4e0a0d5b7a2a4b2f4b0c2f2a1"
            }"#,
        )
        .unwrap();
        assert_eq!(config.network(), NetworkType::Rinkeby);
        assert_eq!(config.confirmations(), 5);
        assert_eq!(config.timing(), Timing::default());
        assert!(config.wallet().is_none());
        assert_eq!(config.rpc().len(), 1);
    }

    #[test]
    fn parses_wallet_and_timing() {
        let config: BridgeConfig = serde_json::from_str(
            r#"{
                "network": "main",
                "rpc": [{ "http": "https://mainnet.example.org", "rate_limit": 5 }],
                "token_address": "0x02f61fd266da6e8b102d4121f5ce7b992640cf98",
                "token_sale_address": "0x5e4b6ec4b3e1b4b4e0a0d5b7a2a4b2f4b0c2f2a1",
                "confirmations": 12,
                "wallet": { "endpoint": "http://127.0.0.1:1248", "kind": "trust" },
                "timing": { "poll_interval_ms": 500 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.confirmations(), 12);
        let wallet = config.wallet().unwrap();
        assert_eq!(wallet.kind, WalletKind::Trust);
        assert_eq!(config.timing().poll_interval(), Duration::from_millis(500));
        assert_eq!(config.timing().retry_delay(), Duration::from_millis(3000));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = BridgeConfig::load_from_path("/nonexistent/coinlink.json").unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(_, _)));
    }
}
