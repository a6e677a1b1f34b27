//! Wallet backed by an interactive bridge session with a mobile wallet app.
//!
//! The session is opened on [`Wallet::connect`]: the bridge hands out a connection URI (shown to
//! the user as a QR code), then delivers the approved accounts once the user scans it. Signing
//! happens on the phone; this side only forwards unsigned blocks with `vite_signAndSendTx`.

use super::{AccountBlock, BlockKind, ConnectPayload, TransactionDescriptor, Wallet, WalletError};

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Bridge method that signs and sends a block on the phone
pub const SIGN_AND_SEND_TX: &str = "vite_signAndSendTx";

/// Transport to the wallet bridge server.
///
/// The encrypted session protocol is implemented outside this crate.
#[async_trait::async_trait]
pub trait BridgeConnector: Send + Sync {
	/// Open a new session and return its connection URI.
	async fn create_session(&self) -> Result<String, WalletError>;

	/// Wait until the user approves the session.
	async fn wait_for_connect(&self) -> Result<ConnectPayload, WalletError>;

	async fn send_custom_request(
		&self,
		method: &str,
		params: Vec<Value>,
	) -> Result<Value, WalletError>;

	/// Resolves when the session is torn down by either side.
	async fn disconnected(&self);
}

pub struct ConnectWallet {
	connector: Arc<dyn BridgeConnector>,
	address: watch::Sender<Option<String>>,
	connection_uri: watch::Sender<Option<String>>,
}

impl ConnectWallet {
	pub fn new(connector: Arc<dyn BridgeConnector>) -> Self {
		Self {
			connector,
			address: watch::Sender::new(None),
			connection_uri: watch::Sender::new(None),
		}
	}

	/// URI of the session awaiting approval; `None` when nothing is pending.
	pub fn connection_uri(&self) -> watch::Receiver<Option<String>> {
		self.connection_uri.subscribe()
	}

	/// Dismiss the pending connection URI.
	pub fn clear_connection_uri(&self) {
		self.connection_uri.send_replace(None);
	}
}

#[async_trait::async_trait]
impl Wallet for ConnectWallet {
	fn address(&self) -> Option<String> {
		self.address.borrow().clone()
	}

	async fn connect(&self) -> Result<(), WalletError> {
		let uri = self.connector.create_session().await?;
		info!("Bridge session created, waiting for approval");
		self.connection_uri.send_replace(Some(uri));

		let payload = self.connector.wait_for_connect().await?;
		let account = payload.account().ok_or(WalletError::AddressIsNull)?;

		info!("Wallet connected: {}", account);
		self.address.send_replace(Some(account.to_string()));
		self.connection_uri.send_replace(None);
		Ok(())
	}

	async fn create_account_block(
		&self,
		kind: BlockKind,
		descriptor: &TransactionDescriptor,
	) -> Result<Value, WalletError> {
		let sender = self.address();
		let block = AccountBlock::from_descriptor(kind, descriptor, sender.as_deref())?;
		let params = vec![serde_json::to_value(&block)?];

		tokio::select! {
			result = self.connector.send_custom_request(SIGN_AND_SEND_TX, params) => result,
			_ = self.connector.disconnected() => {
				warn!("Bridge session dropped while {} was pending", descriptor.method_name());
				Err(WalletError::Disconnected)
			}
		}
	}
}
