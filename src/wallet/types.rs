use crate::abi::{AbiError, Fragment, encode_function_call, find_method};
use crate::config::VITE_TOKEN_ID;
use crate::provider::ProviderError;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Block type code of a send block on the Vite ledger
pub const BLOCK_TYPE_SEND_CALL: u8 = 2;
/// Error code the bridge reports when the session drops mid-request
pub const BROKEN_LINK_CODE: i64 = 11020;

/// Kind of account block a transaction produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
	/// Contract method call, optionally carrying a token transfer
	CallContract,
}

/// Everything needed to build one contract call.
///
/// Immutable once built; callers build a new descriptor when its inputs change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDescriptor {
	/// Sender; `None` lets the wallet fill in its own address
	pub address: Option<String>,
	/// Target contract
	pub to_address: String,
	pub fragment: Fragment,
	pub params: Vec<Value>,
	/// Selector followed by the ABI-encoded params
	pub data: Vec<u8>,
	pub token_id: Option<String>,
	/// Transfer amount in base units, decimal string
	pub amount: Option<String>,
}

impl TransactionDescriptor {
	/// Build a call to `method_name` on `to_address`.
	///
	/// # Errors
	/// `AbiError::UnknownFragment` when the method is not in `abi`, or an encoding error when the
	/// params do not fit its inputs.
	pub fn call_contract(
		address: Option<&str>,
		to_address: &str,
		abi: &[Fragment],
		method_name: &str,
		params: Vec<Value>,
	) -> Result<Self, AbiError> {
		let fragment = find_method(abi, method_name)
			.ok_or_else(|| AbiError::UnknownFragment(method_name.to_string()))?
			.clone();
		let data = encode_function_call(&fragment, &params)?;

		Ok(Self {
			address: address.map(str::to_string),
			to_address: to_address.to_string(),
			fragment,
			params,
			data,
			token_id: None,
			amount: None,
		})
	}

	/// Attach a token transfer to the call.
	pub fn with_transfer(mut self, token_id: &str, amount: impl Into<String>) -> Self {
		self.token_id = Some(token_id.to_string());
		self.amount = Some(amount.into());
		self
	}

	pub fn method_name(&self) -> &str {
		&self.fragment.name
	}
}

/// Unsigned account block in the node's JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBlock {
	pub block_type: u8,
	pub address: String,
	pub to_address: String,
	pub token_id: String,
	pub amount: String,
	/// Base64 call data
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub height: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub previous_hash: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub difficulty: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
}

impl AccountBlock {
	/// Build the unsigned block for `descriptor`, sent from `sender` when the descriptor names no
	/// sender of its own.
	pub fn from_descriptor(
		kind: BlockKind,
		descriptor: &TransactionDescriptor,
		sender: Option<&str>,
	) -> Result<Self, WalletError> {
		let address = descriptor
			.address
			.as_deref()
			.or(sender)
			.filter(|address| !address.is_empty())
			.ok_or(WalletError::AddressIsNull)?;

		let data = match kind {
			BlockKind::CallContract => Some(STANDARD.encode(&descriptor.data)),
		};

		Ok(Self {
			block_type: BLOCK_TYPE_SEND_CALL,
			address: address.to_string(),
			to_address: descriptor.to_address.clone(),
			token_id: descriptor
				.token_id
				.clone()
				.unwrap_or_else(|| VITE_TOKEN_ID.to_string()),
			amount: descriptor.amount.clone().unwrap_or_else(|| "0".to_string()),
			data,
			height: None,
			previous_hash: None,
			difficulty: None,
			nonce: None,
		})
	}
}

/// Connect payload delivered by the bridge once the user approves a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectPayload {
	#[serde(default)]
	pub params: Vec<ConnectParams>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
	/// Bridge protocol version
	#[serde(default)]
	pub version: u32,
	#[serde(default)]
	pub peer_id: String,
	#[serde(default)]
	pub chain_id: u64,
	#[serde(default)]
	pub accounts: Vec<String>,
}

impl ConnectPayload {
	/// First approved account, if any.
	pub fn account(&self) -> Option<&str> {
		self.params
			.first()
			.and_then(|params| params.accounts.first())
			.map(String::as_str)
			.filter(|account| !account.is_empty())
	}
}

/// Errors raised by wallets
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
	#[error("address is null")]
	AddressIsNull,

	#[error("broken link")]
	Disconnected,

	#[error("No bridge connector configured")]
	MissingConnector,

	#[error("{0}")]
	Rejected(String),

	/// Raised by [`BlockSigner`](super::BlockSigner) implementations
	#[error("Signing error: {0}")]
	SigningError(String),

	#[error("Provider error: {0}")]
	ProviderError(#[from] ProviderError),

	#[error("ABI error: {0}")]
	AbiError(#[from] AbiError),

	#[error("JSON error: {0}")]
	JsonError(#[from] serde_json::Error),
}

impl WalletError {
	/// Numeric error code when the failure carries one.
	pub fn code(&self) -> Option<i64> {
		match self {
			WalletError::Disconnected => Some(BROKEN_LINK_CODE),
			WalletError::ProviderError(ProviderError::RpcError { code, .. }) => Some(*code),
			_ => None,
		}
	}
}
