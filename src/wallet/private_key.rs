//! Wallet backed by a locally held key.

use super::account_block::{SEND_RAW_TRANSACTION, prepare_account_block};
use super::{AccountBlock, BlockKind, TransactionDescriptor, Wallet, WalletError};
use crate::provider::Provider;

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Signs prepared account blocks.
///
/// Key handling and the signature scheme live outside this crate; the signer returns the block
/// in the JSON shape `ledger_sendRawTransaction` expects (hash, signature and public key set).
#[async_trait::async_trait]
pub trait BlockSigner: Send + Sync {
	/// Address controlled by the key.
	fn address(&self) -> String;

	/// Failures should be reported as [`WalletError::SigningError`].
	async fn sign(&self, block: &AccountBlock) -> Result<Value, WalletError>;
}

/// Wallet that prepares, signs and submits blocks itself.
///
/// Without a signer the wallet has no address and every send is a silent no-op.
pub struct PrivateKeyWallet {
	provider: Arc<dyn Provider>,
	signer: Option<Arc<dyn BlockSigner>>,
}

impl PrivateKeyWallet {
	pub fn new(provider: Arc<dyn Provider>, signer: Option<Arc<dyn BlockSigner>>) -> Self {
		if signer.is_none() {
			warn!("No signing key configured, transactions will not be sent");
		}
		Self { provider, signer }
	}
}

#[async_trait::async_trait]
impl Wallet for PrivateKeyWallet {
	fn address(&self) -> Option<String> {
		self.signer.as_ref().map(|signer| signer.address())
	}

	async fn connect(&self) -> Result<(), WalletError> {
		Ok(())
	}

	async fn create_account_block(
		&self,
		kind: BlockKind,
		descriptor: &TransactionDescriptor,
	) -> Result<Value, WalletError> {
		let Some(signer) = &self.signer else {
			return Ok(Value::Null);
		};

		let block = AccountBlock::from_descriptor(kind, descriptor, Some(&signer.address()))?;
		let block = prepare_account_block(self.provider.as_ref(), block).await?;
		let signed = signer.sign(&block).await?;
		self.provider
			.request(SEND_RAW_TRANSACTION, vec![signed.clone()])
			.await?;

		info!(
			"Sent {} to {} at height {}",
			descriptor.method_name(),
			block.to_address,
			block.height.as_deref().unwrap_or("?")
		);
		Ok(signed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::marketplace_abi;
	use crate::test_support::MockProvider;
	use crate::wallet::account_block::{GET_LATEST_ACCOUNT_BLOCK, GET_POW_DIFFICULTY};
	use serde_json::json;

	const USER: &str = "vite_0102030405060708090a0b0c0d0e0f10111213149bfa21dd52";
	const MARKET: &str = "vite_0102030405060708090a0b0c0d0e0f10111213146405de22ad";

	struct FakeSigner;

	#[async_trait::async_trait]
	impl BlockSigner for FakeSigner {
		fn address(&self) -> String {
			USER.to_string()
		}

		async fn sign(&self, block: &AccountBlock) -> Result<Value, WalletError> {
			let mut signed = serde_json::to_value(block)?;
			signed["signature"] = json!("c2ln");
			Ok(signed)
		}
	}

	struct LockedSigner;

	#[async_trait::async_trait]
	impl BlockSigner for LockedSigner {
		fn address(&self) -> String {
			USER.to_string()
		}

		async fn sign(&self, _block: &AccountBlock) -> Result<Value, WalletError> {
			Err(WalletError::SigningError("key locked".to_string()))
		}
	}

	fn descriptor() -> TransactionDescriptor {
		let abi = marketplace_abi().unwrap();
		TransactionDescriptor::call_contract(None, MARKET, &abi, "revokeOffer", vec![json!("3")])
			.unwrap()
	}

	#[tokio::test]
	async fn signs_and_submits() {
		let provider = Arc::new(MockProvider::new());
		provider.respond(GET_LATEST_ACCOUNT_BLOCK, Value::Null);
		provider.respond(GET_POW_DIFFICULTY, json!({"difficulty": null}));
		provider.respond(SEND_RAW_TRANSACTION, Value::Null);

		let wallet = PrivateKeyWallet::new(provider.clone(), Some(Arc::new(FakeSigner)));
		assert_eq!(wallet.address().as_deref(), Some(USER));

		let signed = wallet
			.create_account_block(BlockKind::CallContract, &descriptor())
			.await
			.unwrap();
		assert_eq!(signed["signature"], "c2ln");
		assert_eq!(signed["address"], USER);

		let sent = provider.calls(SEND_RAW_TRANSACTION);
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0][0]["height"], "1");
	}

	#[tokio::test]
	async fn signing_failure_submits_nothing() {
		let provider = Arc::new(MockProvider::new());
		provider.respond(GET_POW_DIFFICULTY, json!({"difficulty": null}));

		let wallet = PrivateKeyWallet::new(provider.clone(), Some(Arc::new(LockedSigner)));
		let err = wallet
			.create_account_block(BlockKind::CallContract, &descriptor())
			.await
			.unwrap_err();
		assert!(matches!(&err, WalletError::SigningError(reason) if reason == "key locked"));
		assert_eq!(err.to_string(), "Signing error: key locked");
		assert_eq!(err.code(), None);
		assert!(provider.calls(SEND_RAW_TRANSACTION).is_empty());
	}

	#[tokio::test]
	async fn without_key_sends_nothing() {
		let provider = Arc::new(MockProvider::new());
		let wallet = PrivateKeyWallet::new(provider.clone(), None);
		assert_eq!(wallet.address(), None);

		let result = wallet
			.create_account_block(BlockKind::CallContract, &descriptor())
			.await
			.unwrap();
		assert_eq!(result, Value::Null);
		assert!(provider.calls(GET_LATEST_ACCOUNT_BLOCK).is_empty());
	}
}
