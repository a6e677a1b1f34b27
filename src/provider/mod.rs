//! Ledger provider integration.
//!
//! The [`Provider`] trait is the only way the sync layer reaches the network: JSON-RPC requests,
//! live subscriptions and read-only contract calls. [`WsProvider`] implements it over a Vite
//! node's WebSocket endpoint; tests substitute in-memory providers.

/// WebSocket JSON-RPC client
mod client;
/// Wire types for VM logs, filters and subscriptions
mod types;

pub use client::WsProvider;
pub use types::*;

use crate::abi::{AbiError, codec, find_method, encode_function_call};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Value, json};

/// Fetch all VM logs matching a filter.
pub const GET_VM_LOGS_BY_FILTER: &str = "ledger_getVmLogsByFilter";
/// Subscription topic for new VM logs.
pub const CREATE_VMLOG_SUBSCRIPTION: &str = "createVmlogSubscription";
/// Read-only contract call.
pub const CONTRACT_QUERY: &str = "contract_query";

/// Network capability consumed by state readers, log watchers and wallets.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
	/// Issue a JSON-RPC request and return its `result`.
	async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, ProviderError>;

	/// Open a subscription on `method` (for example [`CREATE_VMLOG_SUBSCRIPTION`]).
	async fn subscribe(
		&self,
		method: &str,
		params: Vec<Value>,
	) -> Result<Subscription, ProviderError>;

	/// Close a subscription previously returned by [`Provider::subscribe`].
	async fn unsubscribe(&self, subscription_id: &str) -> Result<(), ProviderError>;

	/// Call a read-only contract method and decode its outputs.
	///
	/// Returns `None` when the node has no result for the call (for example the contract is not
	/// deployed at that address).
	async fn query_contract_state(
		&self,
		query: ContractQuery<'_>,
	) -> Result<Option<Vec<Value>>, ProviderError> {
		let fragment = find_method(query.abi, query.method_name)
			.ok_or_else(|| AbiError::UnknownFragment(query.method_name.to_string()))?;
		let data = encode_function_call(fragment, query.params)?;

		let result = self
			.request(
				CONTRACT_QUERY,
				vec![json!({
					"address": query.address,
					"data": STANDARD.encode(data),
				})],
			)
			.await?;

		match result {
			Value::Null => Ok(None),
			Value::String(encoded) => {
				let bytes = STANDARD.decode(encoded.as_bytes()).map_err(|e| {
					ProviderError::DecodeError(format!("invalid contract_query result: {}", e))
				})?;
				if bytes.is_empty() {
					return Ok(None);
				}
				let values = codec::decode_params(&fragment.output_types()?, &bytes)?;
				Ok(Some(values))
			}
			other => Err(ProviderError::DecodeError(format!(
				"unexpected contract_query result: {}",
				other
			))),
		}
	}
}

/// Fetch every VM log matching `filter`.
pub async fn fetch_vm_logs(
	provider: &dyn Provider,
	filter: &VmLogFilter,
) -> Result<Vec<Log>, ProviderError> {
	let result = provider
		.request(GET_VM_LOGS_BY_FILTER, vec![serde_json::to_value(filter)?])
		.await?;
	if result.is_null() {
		return Ok(Vec::new());
	}
	Ok(serde_json::from_value(result)?)
}

/// Open a live VM log subscription for `filter`.
pub async fn subscribe_vm_logs(
	provider: &dyn Provider,
	filter: &VmLogFilter,
) -> Result<Subscription, ProviderError> {
	provider
		.subscribe(CREATE_VMLOG_SUBSCRIPTION, vec![serde_json::to_value(filter)?])
		.await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::abi::{encode_params, parse_abi, ParamType};
	use crate::test_support::MockProvider;

	const BAYC: &str = "vite_0102030405060708090a0b0c0d0e0f10111213146405de22ad";

	fn abi() -> Vec<crate::abi::Fragment> {
		parse_abi(
			r#"[{"type":"function","name":"BASE_URL","inputs":[],
				"outputs":[{"name":"","type":"string"}],"stateMutability":"view"}]"#,
		)
		.unwrap()
	}

	#[tokio::test]
	async fn default_query_encodes_call_and_decodes_outputs() {
		let provider = MockProvider::new();
		let encoded = encode_params(&[ParamType::String], &[json!("https://example/")]).unwrap();
		provider.respond(CONTRACT_QUERY, json!(STANDARD.encode(encoded)));

		let abi = abi();
		let result = provider
			.query_contract_state(ContractQuery {
				address: BAYC,
				abi: &abi,
				method_name: "BASE_URL",
				params: &[],
			})
			.await
			.unwrap();
		assert_eq!(result, Some(vec![json!("https://example/")]));

		let calls = provider.calls(CONTRACT_QUERY);
		assert_eq!(calls.len(), 1);
		assert_eq!(calls[0][0]["address"], BAYC);
		let data = STANDARD
			.decode(calls[0][0]["data"].as_str().unwrap())
			.unwrap();
		assert_eq!(hex::encode(data), "32ea23db");
	}

	#[tokio::test]
	async fn null_query_result_is_none() {
		let provider = MockProvider::new();
		provider.respond(CONTRACT_QUERY, Value::Null);
		let abi = abi();
		let result = provider
			.query_contract_state(ContractQuery {
				address: BAYC,
				abi: &abi,
				method_name: "BASE_URL",
				params: &[],
			})
			.await
			.unwrap();
		assert_eq!(result, None);
	}

	#[tokio::test]
	async fn unknown_method_is_an_abi_error() {
		let provider = MockProvider::new();
		let abi = abi();
		let err = provider
			.query_contract_state(ContractQuery {
				address: BAYC,
				abi: &abi,
				method_name: "ownerOf",
				params: &[],
			})
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			ProviderError::AbiError(AbiError::UnknownFragment(_))
		));
	}
}
