//! Account block preparation against a node.
//!
//! Before a block can be signed it needs its place in the sender's account chain (height and
//! previous hash) and, when the sender lacks quota, a proof-of-work nonce. The node computes the
//! difficulty and the nonce; this module only asks for them.

use super::{AccountBlock, WalletError};
use crate::abi::{address::original_address, blake2b_256};
use crate::provider::Provider;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

pub const GET_LATEST_ACCOUNT_BLOCK: &str = "ledger_getLatestAccountBlock";
pub const GET_POW_DIFFICULTY: &str = "ledger_getPoWDifficulty";
pub const GET_POW_NONCE: &str = "util_getPoWNonce";
pub const SEND_RAW_TRANSACTION: &str = "ledger_sendRawTransaction";

/// Previous hash of the first block in an account chain
pub const GENESIS_PREVIOUS_HASH: &str =
	"0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlock {
	hash: String,
	height: String,
}

#[derive(Debug, Default, Deserialize)]
struct PowDifficulty {
	#[serde(default)]
	difficulty: Option<String>,
}

/// Fill in height, previous hash and, when required, difficulty and nonce.
///
/// A `null` difficulty means the sender has enough quota and no PoW is done.
pub async fn prepare_account_block(
	provider: &dyn Provider,
	mut block: AccountBlock,
) -> Result<AccountBlock, WalletError> {
	let latest = provider
		.request(GET_LATEST_ACCOUNT_BLOCK, vec![json!(block.address)])
		.await?;
	let (height, previous_hash) = if latest.is_null() {
		(1u64, GENESIS_PREVIOUS_HASH.to_string())
	} else {
		let latest: LatestBlock = serde_json::from_value(latest)?;
		let height = latest.height.parse::<u64>().map_err(|_| {
			WalletError::Rejected(format!("invalid account height: {}", latest.height))
		})?;
		(height + 1, latest.hash)
	};
	block.height = Some(height.to_string());
	block.previous_hash = Some(previous_hash.clone());

	let difficulty = provider
		.request(
			GET_POW_DIFFICULTY,
			vec![json!({
				"address": block.address,
				"previousHash": previous_hash,
				"blockType": block.block_type,
				"toAddress": block.to_address,
				"data": block.data,
			})],
		)
		.await?;
	let difficulty = match difficulty {
		Value::Null => PowDifficulty::default(),
		other => serde_json::from_value(other)?,
	};

	if let Some(difficulty) = difficulty.difficulty.filter(|d| !d.is_empty()) {
		let mut preimage = original_address(&block.address)?.to_vec();
		preimage.extend(hex::decode(&previous_hash).map_err(crate::abi::AbiError::from)?);
		let nonce_hash = hex::encode(blake2b_256(&preimage));

		debug!("Requesting PoW nonce at difficulty {}", difficulty);
		let nonce = provider
			.request(GET_POW_NONCE, vec![json!(difficulty), json!(nonce_hash)])
			.await?;
		let nonce = nonce
			.as_str()
			.ok_or_else(|| WalletError::Rejected(format!("invalid PoW nonce: {}", nonce)))?
			.to_string();

		block.difficulty = Some(difficulty);
		block.nonce = Some(nonce);
	}

	Ok(block)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::wallet::BLOCK_TYPE_SEND_CALL;
	use crate::test_support::MockProvider;

	const USER: &str = "vite_0000000000000000000000000000000000000000a4f3a0cb58";
	const MARKET: &str = "vite_0102030405060708090a0b0c0d0e0f10111213146405de22ad";

	fn block() -> AccountBlock {
		AccountBlock {
			block_type: BLOCK_TYPE_SEND_CALL,
			address: USER.to_string(),
			to_address: MARKET.to_string(),
			token_id: crate::config::VITE_TOKEN_ID.to_string(),
			amount: "0".to_string(),
			data: None,
			height: None,
			previous_hash: None,
			difficulty: None,
			nonce: None,
		}
	}

	#[tokio::test]
	async fn first_block_with_quota_skips_pow() {
		let provider = MockProvider::new();
		provider.respond(GET_LATEST_ACCOUNT_BLOCK, Value::Null);
		provider.respond(GET_POW_DIFFICULTY, json!({"difficulty": null}));

		let block = prepare_account_block(&provider, block()).await.unwrap();
		assert_eq!(block.height.as_deref(), Some("1"));
		assert_eq!(block.previous_hash.as_deref(), Some(GENESIS_PREVIOUS_HASH));
		assert_eq!(block.nonce, None);
		assert!(provider.calls(GET_POW_NONCE).is_empty());
	}

	#[tokio::test]
	async fn requests_nonce_when_difficulty_is_set() {
		let provider = MockProvider::new();
		provider.respond(
			GET_LATEST_ACCOUNT_BLOCK,
			json!({"hash": GENESIS_PREVIOUS_HASH, "height": "4"}),
		);
		provider.respond(GET_POW_DIFFICULTY, json!({"difficulty": "67108863"}));
		provider.respond(GET_POW_NONCE, json!("bm9uY2U="));

		let block = prepare_account_block(&provider, block()).await.unwrap();
		assert_eq!(block.height.as_deref(), Some("5"));
		assert_eq!(block.difficulty.as_deref(), Some("67108863"));
		assert_eq!(block.nonce.as_deref(), Some("bm9uY2U="));

		// blake2b-256 of the 21-byte zero address followed by 32 zero bytes
		let calls = provider.calls(GET_POW_NONCE);
		assert_eq!(calls[0][0], "67108863");
		assert_eq!(
			calls[0][1],
			"a9bf1d34547520ebcadbf47ab5b26d33410e836b40a2a715bd5df9c57000d317"
		);
	}
}
