//! Mock transaction source for testing
//!
//! [`MockTransactionSource`] serves queued explorer responses instead of
//! talking to the network and records every request it receives, so tests can
//! assert on what the tracker asked for (address, start block, network).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    data_structures::NetworkId,
    errors::{IncomingTxError, IncomingTxResult},
    scanning::explorer_client::{
        ExplorerFetch, ExplorerResponse, RawExplorerTransaction, TransactionSource,
    },
};

/// One queued reply
#[derive(Debug, Clone)]
pub enum MockReply {
    Response(ExplorerResponse),
    /// Fail the request with an HTTP error carrying this message
    Fail(String),
}

/// A request seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFetch {
    pub address: String,
    pub from_block: Option<u64>,
    pub network: String,
}

/// Transaction source that replays queued responses
#[derive(Debug, Clone)]
pub struct MockTransactionSource {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    /// Served once the queue is empty
    fallback: Arc<Mutex<ExplorerResponse>>,
    calls: Arc<Mutex<Vec<RecordedFetch>>>,
}

impl Default for MockTransactionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransactionSource {
    /// Mock that answers every request with an empty successful list
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(ExplorerResponse::success(Vec::new()))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful response with `records`
    pub fn push_records(&self, records: Vec<RawExplorerTransaction>) {
        self.push_reply(MockReply::Response(ExplorerResponse::success(records)));
    }

    /// Queue an arbitrary response body
    pub fn push_response(&self, response: ExplorerResponse) {
        self.push_reply(MockReply::Response(response));
    }

    /// Queue a transport failure
    pub fn push_failure(&self, message: impl Into<String>) {
        self.push_reply(MockReply::Fail(message.into()));
    }

    pub fn push_reply(&self, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Response served when nothing is queued
    pub fn set_fallback(&self, response: ExplorerResponse) {
        *self.fallback.lock().unwrap_or_else(|e| e.into_inner()) = response;
    }

    /// Requests received so far, including ones for unsupported networks
    pub fn calls(&self) -> Vec<RecordedFetch> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Queued replies not yet consumed
    pub fn pending_replies(&self) -> usize {
        self.replies.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl TransactionSource for MockTransactionSource {
    async fn fetch_transactions(
        &self,
        address: &str,
        from_block: Option<u64>,
        network: &str,
    ) -> IncomingTxResult<ExplorerFetch> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedFetch {
                address: address.to_string(),
                from_block,
                network: network.to_string(),
            });

        let Some(network) = NetworkId::resolve(network) else {
            return Ok(ExplorerFetch::unsupported(address));
        };

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        let mut response = match reply {
            Some(MockReply::Response(response)) => response,
            Some(MockReply::Fail(message)) => return Err(IncomingTxError::Http(message)),
            None => self.fallback.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        };
        response.canonicalize_addresses();

        Ok(ExplorerFetch {
            address: address.to_string(),
            chain_id: Some(network.chain_id()),
            response,
        })
    }
}

/// Explorer record with typical gas values
///
/// `block` and `timestamp` are given as the explorer writes them: a decimal
/// block number and an RFC 3339 timestamp.
pub fn mock_record(hash: &str, to: &str, block: &str, timestamp: &str) -> RawExplorerTransaction {
    RawExplorerTransaction {
        hash: hash.to_string(),
        from: "xdc1111111111111111111111111111111111111111".to_string(),
        to: to.to_string(),
        value: "1000000000000000000".to_string(),
        gas: "21000".to_string(),
        gas_price: "250000000".to_string(),
        nonce: "0".to_string(),
        block_number: block.to_string(),
        timestamp: timestamp.to_string(),
        is_error: "0".to_string(),
    }
}
