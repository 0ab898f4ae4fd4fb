//! SDK configuration: TOML file with the API endpoint and trust anchor.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::executor::Executor;
use crate::gateway::{Gateway, ReqwestTransport, RequestOptions};
use crate::keypair::TrustAnchor;

/// Client configuration (stored as `starkx.toml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Routing API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Service public key (hex). When set, every response must be signed by it.
    pub public_key: Option<String>,

    /// Slippage applied when the caller does not pass one
    #[serde(default = "default_slippage_bps")]
    pub default_slippage_bps: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String { "https://starknet.api.starkx.exchange".into() }
fn default_slippage_bps() -> u32 { 50 }
fn default_request_timeout_secs() -> u64 { 30 }

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            public_key: None,
            default_slippage_bps: default_slippage_bps(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SdkConfig {
    /// Load config from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("invalid base_url {:?}", self.base_url))?;
        if self.default_slippage_bps > crate::calls::BPS_DENOMINATOR {
            anyhow::bail!("default_slippage_bps {} exceeds 10000", self.default_slippage_bps);
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        self.trust_anchor()?;
        Ok(())
    }

    /// Parsed `public_key`, if configured.
    pub fn trust_anchor(&self) -> Result<Option<TrustAnchor>> {
        self.public_key
            .as_deref()
            .map(|key| TrustAnchor::from_hex(key).context("invalid public_key"))
            .transpose()
    }

    /// Request options carrying the configured trust anchor.
    pub fn request_options(&self) -> Result<RequestOptions> {
        let mut options = RequestOptions::default();
        if let Some(anchor) = self.trust_anchor()? {
            options = options.with_trust_anchor(anchor);
        }
        Ok(options)
    }

    /// Gateway over a reqwest transport with the configured timeout.
    pub fn gateway(&self) -> Result<Gateway> {
        let transport =
            ReqwestTransport::with_timeout(Duration::from_secs(self.request_timeout_secs))?;
        Ok(Gateway::with_transport(&self.base_url, Arc::new(transport)))
    }

    pub fn executor(&self) -> Result<Executor> {
        Ok(Executor::new(self.gateway()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::ResponseSigningKey;

    #[test]
    fn test_default_config() {
        let config = SdkConfig::default();
        assert_eq!(config.default_slippage_bps, 50);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.trust_anchor().unwrap().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("starkx.toml");
        let key = ResponseSigningKey::from_secret_hex("0x1234abcd").unwrap();

        let config = SdkConfig {
            base_url: "https://sepolia.api.starkx.exchange".into(),
            public_key: Some(key.trust_anchor().to_string()),
            default_slippage_bps: 30,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = SdkConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.trust_anchor().unwrap(), Some(key.trust_anchor()));
        assert!(loaded.request_options().unwrap().trust_anchor.is_some());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("starkx.toml");
        std::fs::write(&path, "base_url = \"http://localhost:8080\"\n").unwrap();

        let loaded = SdkConfig::load(&path).unwrap();
        assert_eq!(loaded.base_url, "http://localhost:8080");
        assert_eq!(loaded.default_slippage_bps, 50);
        assert!(loaded.public_key.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("starkx.toml");

        std::fs::write(&path, "default_slippage_bps = 20000\n").unwrap();
        assert!(SdkConfig::load(&path).is_err());

        std::fs::write(&path, "public_key = \"0xnothex\"\n").unwrap();
        assert!(SdkConfig::load(&path).is_err());

        assert!(SdkConfig::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_gateway_uses_base_url() {
        let config = SdkConfig {
            base_url: "http://localhost:8080/".into(),
            ..Default::default()
        };
        let gateway = config.gateway().unwrap();
        assert_eq!(gateway.base_url(), "http://localhost:8080");
    }
}
