//! Block explorer client
//!
//! Fetches the transaction list of an address from a `blocksscan.io` style
//! explorer API:
//!
//! ```text
//! GET {host}/api?module=account&action=txlist&address={addr}&tag=latest&page=1[&startBlock={n}]
//! ```
//!
//! The explorer speaks decimal strings and, depending on the deployment,
//! either address prefix. Responses are returned close to raw; the only
//! rewrite applied here is putting every `from`/`to` into canonical `0x` form.
//!
//! ```rust,no_run
//! use incoming_tx_tracker::scanning::{ExplorerClient, TrackerConfig, TransactionSource};
//!
//! async fn fetch() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ExplorerClient::new(TrackerConfig::default())?;
//!     let fetch = client
//!         .fetch_transactions("xdc8c4e2a0b7d6fa8d1e05af5aa27ab13d8a5d2cc10", Some(100), "mainnet")
//!         .await?;
//!     println!("{} records", fetch.response.records().len());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
#[cfg(feature = "http")]
use tracing::debug;

#[cfg(feature = "http")]
use reqwest::Client;

use crate::{
    data_structures::{to_canonical, NetworkId},
    errors::IncomingTxResult,
    scanning::config::TrackerConfig,
};
#[cfg(feature = "http")]
use crate::errors::IncomingTxError;

/// One transaction record as returned by the explorer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExplorerTransaction {
    #[serde(default, deserialize_with = "lenient_string")]
    pub hash: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub from: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub to: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub gas: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub gas_price: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub nonce: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub block_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub is_error: String,
}

/// Accept strings, numbers and null for fields the explorer is inconsistent about
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// `result` is a record list on success and free text (or anything else) otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExplorerResult {
    Transactions(Vec<RawExplorerTransaction>),
    Other(serde_json::Value),
}

impl Default for ExplorerResult {
    fn default() -> Self {
        ExplorerResult::Other(serde_json::Value::Null)
    }
}

/// Explorer response body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplorerResponse {
    /// `1` (number or string) on success
    #[serde(default)]
    pub status: serde_json::Value,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: ExplorerResult,
}

impl ExplorerResponse {
    /// Build a successful response around `records`
    pub fn success(records: Vec<RawExplorerTransaction>) -> Self {
        Self {
            status: serde_json::Value::from(1),
            message: Some("OK".to_string()),
            result: ExplorerResult::Transactions(records),
        }
    }

    /// Whether the explorer reported success
    pub fn is_success(&self) -> bool {
        match &self.status {
            serde_json::Value::Number(n) => n.as_u64() == Some(1),
            serde_json::Value::String(s) => s.trim() == "1",
            _ => false,
        }
    }

    /// Returned records, empty unless `result` is a record list
    pub fn records(&self) -> &[RawExplorerTransaction] {
        match &self.result {
            ExplorerResult::Transactions(records) => records,
            ExplorerResult::Other(_) => &[],
        }
    }

    /// Rewrite every record's `from`/`to` into canonical form
    pub fn canonicalize_addresses(&mut self) {
        if let ExplorerResult::Transactions(records) = &mut self.result {
            for record in records.iter_mut() {
                record.from = to_canonical(&record.from);
                record.to = to_canonical(&record.to);
            }
        }
    }
}

/// Explorer response tagged with the request it answers
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorerFetch {
    /// Address the list was requested for
    pub address: String,
    /// Chain id of the requested network, `None` when the network is unsupported
    pub chain_id: Option<u64>,
    pub response: ExplorerResponse,
}

impl ExplorerFetch {
    /// Empty result for a network with no explorer; no request was made
    pub fn unsupported(address: &str) -> Self {
        Self {
            address: address.to_string(),
            chain_id: None,
            response: ExplorerResponse::default(),
        }
    }
}

/// Source of raw address transaction lists
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Fetch the transaction list of `address` on `network`, starting at `from_block`
    ///
    /// An unresolvable network yields [`ExplorerFetch::unsupported`], not an error.
    async fn fetch_transactions(
        &self,
        address: &str,
        from_block: Option<u64>,
        network: &str,
    ) -> IncomingTxResult<ExplorerFetch>;
}

/// Full request URL for an address transaction list
pub fn transaction_list_url(
    config: &TrackerConfig,
    network: NetworkId,
    address: &str,
    from_block: Option<u64>,
) -> String {
    let mut url = format!(
        "{}/api?module=account&action=txlist&address={}&tag=latest&page=1",
        config.explorer_host(network),
        to_canonical(address)
    );
    if let Some(block) = from_block {
        url.push_str(&format!("&startBlock={block}"));
    }
    url
}

/// HTTP client for the explorer API
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct ExplorerClient {
    client: Client,
    config: TrackerConfig,
}

#[cfg(feature = "http")]
impl ExplorerClient {
    /// Create a client; the configured timeout bounds every request
    pub fn new(config: TrackerConfig) -> IncomingTxResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| IncomingTxError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl TransactionSource for ExplorerClient {
    async fn fetch_transactions(
        &self,
        address: &str,
        from_block: Option<u64>,
        network: &str,
    ) -> IncomingTxResult<ExplorerFetch> {
        let Some(network_id) = NetworkId::resolve(network) else {
            debug!(network, "No explorer for network, skipping fetch");
            return Ok(ExplorerFetch::unsupported(address));
        };

        let url = transaction_list_url(&self.config, network_id, address, from_block);
        debug!(%url, "Fetching address transactions");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(IncomingTxError::Explorer(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let mut body: ExplorerResponse = response.json().await?;
        body.canonicalize_addresses();

        Ok(ExplorerFetch {
            address: address.to_string(),
            chain_id: Some(network_id.chain_id()),
            response: body,
        })
    }
}
