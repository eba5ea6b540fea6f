//! Configuration types for Whirlroute

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Pubkey, Result};

/// Orca Whirlpool program
pub const DEFAULT_WHIRLPOOL_PROGRAM_ID: &str = "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc";

/// Orca's main WhirlpoolsConfig account
pub const DEFAULT_WHIRLPOOLS_CONFIG: &str = "2LecshUwdy9xi7meFgHtFJQNSKk4KdTrcpvaB56dP2NQ";

/// Environment variable overriding the RPC endpoint
pub const RPC_URL_ENV: &str = "WHIRLROUTE_RPC_URL";

/// RPC connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoint (e.g., "https://api.mainnet-beta.solana.com")
    pub url: String,

    /// Commitment level sent with every request
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "https://api.mainnet-beta.solana.com".to_string(),
            commitment: default_commitment(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Which Whirlpool deployment to read from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhirlpoolConfig {
    #[serde(default = "default_program_id")]
    pub program_id: String,

    #[serde(default = "default_config_id")]
    pub config_id: String,
}

fn default_program_id() -> String {
    DEFAULT_WHIRLPOOL_PROGRAM_ID.to_string()
}

fn default_config_id() -> String {
    DEFAULT_WHIRLPOOLS_CONFIG.to_string()
}

impl Default for WhirlpoolConfig {
    fn default() -> Self {
        Self {
            program_id: default_program_id(),
            config_id: default_config_id(),
        }
    }
}

impl WhirlpoolConfig {
    pub fn program_id(&self) -> Result<Pubkey> {
        parse_pubkey("program_id", &self.program_id)
    }

    pub fn config_id(&self) -> Result<Pubkey> {
        parse_pubkey("config_id", &self.config_id)
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub whirlpool: WhirlpoolConfig,
}

impl AppConfig {
    /// Load from a JSON file; missing sections fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Apply `WHIRLROUTE_RPC_URL` if set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(RPC_URL_ENV) {
            if !url.trim().is_empty() {
                self.rpc.url = url;
            }
        }
    }
}

pub fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).map_err(|e| Error::Config(format!("{} '{}': {}", field, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.rpc.commitment, "confirmed");
        assert_eq!(config.rpc.timeout_secs, 30);
        assert_eq!(
            config.whirlpool.program_id().unwrap().to_string(),
            DEFAULT_WHIRLPOOL_PROGRAM_ID
        );
        assert_eq!(
            config.whirlpool.config_id().unwrap().to_string(),
            DEFAULT_WHIRLPOOLS_CONFIG
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.rpc.url, config.rpc.url);
        assert_eq!(parsed.whirlpool.config_id, config.whirlpool.config_id);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{ "rpc": { "url": "http://127.0.0.1:8899" } }"#).unwrap();
        assert_eq!(parsed.rpc.url, "http://127.0.0.1:8899");
        assert_eq!(parsed.rpc.timeout_secs, 30);
        assert_eq!(parsed.whirlpool.program_id, DEFAULT_WHIRLPOOL_PROGRAM_ID);
    }

    #[test]
    fn test_invalid_pubkey_is_config_error() {
        let config = WhirlpoolConfig {
            program_id: "not-a-key".into(),
            config_id: default_config_id(),
        };
        assert!(matches!(config.program_id(), Err(Error::Config(_))));
    }
}
