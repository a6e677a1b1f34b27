//! Wallets: the capability that turns a transaction descriptor into a sent account block.
//!
//! Two implementations exist, an interactive bridge session ([`ConnectWallet`]) and a local key
//! signer ([`PrivateKeyWallet`]). One of them is chosen once at startup with [`select_wallet`] and
//! handed out as `Arc<dyn Wallet>`.

/// Account block preparation (height, previous hash, PoW)
pub mod account_block;
/// Interactive bridge session wallet
mod connect;
/// Local key wallet
mod private_key;
/// Descriptors, account blocks and wallet errors
mod types;

pub use account_block::prepare_account_block;
pub use connect::{BridgeConnector, ConnectWallet, SIGN_AND_SEND_TX};
pub use private_key::{BlockSigner, PrivateKeyWallet};
pub use types::*;

use crate::config::WalletBackend;
use crate::provider::Provider;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Capability to create and send account blocks on behalf of a user.
#[async_trait::async_trait]
pub trait Wallet: Send + Sync {
	/// Address of the connected account, `None` until one is available.
	fn address(&self) -> Option<String>;

	/// Establish the wallet session; a no-op for wallets that need none.
	async fn connect(&self) -> Result<(), WalletError>;

	/// Build, sign and send the block described by `descriptor`.
	async fn create_account_block(
		&self,
		kind: BlockKind,
		descriptor: &TransactionDescriptor,
	) -> Result<Value, WalletError>;
}

/// Build the wallet selected by `backend`.
///
/// # Errors
/// `WalletError::MissingConnector` when the bridge backend is selected without a connector.
pub fn select_wallet(
	backend: WalletBackend,
	provider: Arc<dyn Provider>,
	signer: Option<Arc<dyn BlockSigner>>,
	connector: Option<Arc<dyn BridgeConnector>>,
) -> Result<Arc<dyn Wallet>, WalletError> {
	info!("Using {:?} wallet backend", backend);
	match backend {
		WalletBackend::PrivateKey => Ok(Arc::new(PrivateKeyWallet::new(provider, signer))),
		WalletBackend::Connect => {
			let connector = connector.ok_or(WalletError::MissingConnector)?;
			Ok(Arc::new(ConnectWallet::new(connector)))
		}
	}
}
