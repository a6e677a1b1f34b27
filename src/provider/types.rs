//! Wire types exchanged with a Vite node.

use crate::abi::{AbiError, Fragment};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Height range of one account chain.
///
/// Heights are numeric strings; `"0"` on both ends means unbounded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HeightRange {
    pub from_height: String,
    pub to_height: String,
}

impl HeightRange {
    pub fn unbounded() -> Self {
        Self {
            from_height: "0".to_string(),
            to_height: "0".to_string(),
        }
    }
}

/// Filter accepted by `ledger_getVmLogsByFilter` and `createVmlogSubscription`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VmLogFilter {
    /// Contract address to height range
    pub address_height_range: BTreeMap<String, HeightRange>,
    /// Topic alternatives per position; the first position holds event signatures
    pub topics: Vec<Vec<String>>,
}

/// Raw event emission as returned by the node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VmLog {
    /// Hex-encoded topics, signature first
    pub topics: Vec<String>,
    /// Base64-encoded payload, absent when the event has no non-indexed inputs
    #[serde(default)]
    pub data: Option<String>,
}

impl VmLog {
    /// Payload converted from base64 to hex, as the decoder expects it.
    pub fn data_hex(&self) -> Result<Option<String>, ProviderError> {
        match self.data.as_deref() {
            None | Some("") => Ok(None),
            Some(data) => {
                let bytes = STANDARD
                    .decode(data)
                    .map_err(|e| ProviderError::DecodeError(format!("invalid vmlog data: {}", e)))?;
                Ok(Some(hex::encode(bytes)))
            }
        }
    }
}

/// A VM log together with the account block that emitted it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub vmlog: VmLog,
    pub account_block_hash: String,
    /// Height as a decimal string
    pub account_block_height: String,
    pub address: String,
    #[serde(default)]
    pub removed: bool,
}

impl Log {
    /// Numeric height, `0` when the node sent something unparsable.
    pub fn height(&self) -> u64 {
        self.account_block_height.parse().unwrap_or(0)
    }
}

/// Read-only contract call.
#[derive(Debug, Clone, Copy)]
pub struct ContractQuery<'a> {
    pub address: &'a str,
    pub abi: &'a [Fragment],
    pub method_name: &'a str,
    pub params: &'a [Value],
}

/// Live subscription handle.
///
/// Each item received is one notification batch; an empty batch carries no logs.
#[derive(Debug)]
pub struct Subscription {
    pub id: String,
    pub notifications: mpsc::UnboundedReceiver<Vec<Value>>,
}

impl Subscription {
    pub fn new(id: String, notifications: mpsc::UnboundedReceiver<Vec<Value>>) -> Self {
        Self { id, notifications }
    }

    /// Next notification batch, or `None` once the provider dropped the subscription.
    pub async fn next_batch(&mut self) -> Option<Vec<Value>> {
        self.notifications.recv().await
    }
}

/// Error types for provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("ABI error: {0}")]
    AbiError(#[from] AbiError),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Request {0} timed out")]
    Timeout(String),

    #[error("Connection closed")]
    ConnectionClosed,
}
