//! Configuration for the incoming transaction tracker
//!
//! Defaults point at the public `blocksscan.io` explorer with the 30 second
//! request bound the tracker relies on. Configuration can be built in code with
//! the `with_*` methods or loaded from JSON.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    data_structures::NetworkId,
    errors::{IncomingTxError, IncomingTxResult},
};

/// Default explorer domain
pub const DEFAULT_EXPLORER_DOMAIN: &str = "blocksscan.io";
/// Hard bound on a single explorer request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// URL scheme used to reach the explorer
    pub explorer_scheme: String,
    /// Explorer domain; networks other than mainnet are served from `api-{network}.{domain}`
    pub explorer_domain: String,
    /// Replaces the computed host for every network (self-hosted explorer, test server)
    pub base_url_override: Option<String>,
    /// Timeout applied to each explorer request
    pub request_timeout: Duration,
    /// Capacity used by signal sources created for the tracker
    pub signal_buffer: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            explorer_scheme: "https".to_string(),
            explorer_domain: DEFAULT_EXPLORER_DOMAIN.to_string(),
            base_url_override: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            signal_buffer: 64,
        }
    }
}

impl TrackerConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from JSON, missing fields fall back to defaults
    pub fn from_json_str(json: &str) -> IncomingTxResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set explorer domain
    pub fn with_explorer_domain(mut self, domain: impl Into<String>) -> Self {
        self.explorer_domain = domain.into();
        self
    }

    /// Set explorer scheme
    pub fn with_explorer_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.explorer_scheme = scheme.into();
        self
    }

    /// Route every request to `base_url`
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set signal buffer capacity
    pub fn with_signal_buffer(mut self, capacity: usize) -> Self {
        self.signal_buffer = capacity;
        self
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> IncomingTxResult<()> {
        if self.request_timeout.is_zero() {
            return Err(IncomingTxError::Configuration(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        if self.signal_buffer == 0 {
            return Err(IncomingTxError::Configuration(
                "signal_buffer must be greater than zero".to_string(),
            ));
        }
        if self.base_url_override.is_none()
            && (self.explorer_domain.trim().is_empty() || self.explorer_scheme.trim().is_empty())
        {
            return Err(IncomingTxError::Configuration(
                "explorer scheme and domain are required without a base URL".to_string(),
            ));
        }
        Ok(())
    }

    /// Explorer host for `network`, without a trailing slash
    pub fn explorer_host(&self, network: NetworkId) -> String {
        if let Some(base_url) = &self.base_url_override {
            return base_url.trim_end_matches('/').to_string();
        }
        if network.is_mainnet() {
            format!("{}://api.{}", self.explorer_scheme, self.explorer_domain)
        } else {
            format!(
                "{}://api-{}.{}",
                self.explorer_scheme, network, self.explorer_domain
            )
        }
    }
}
