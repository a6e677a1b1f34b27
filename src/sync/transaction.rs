//! Transaction send lifecycle.
//!
//! A [`TransactionController`] wraps one transaction descriptor and drives the status machine
//! `Pending -> Sending -> Sent -> Pending`. Failures skip `Sent`, are reported through a
//! [`Notifier`] and are kept as the controller's error until the next attempt.

use crate::config::DEFAULT_SETTLE_DELAY;
use crate::wallet::{BlockKind, TransactionDescriptor, Wallet, WalletError};

use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxStatus {
	Pending,
	Sending,
	Sent,
}

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
	#[error("Transaction already sending")]
	AlreadySending,

	#[error("Transaction is missing its parameters")]
	MissingDescriptor,

	#[error("{0}")]
	WalletError(#[from] WalletError),
}

/// Sink for transient user-facing notifications.
pub trait Notifier: Send + Sync {
	fn error(&self, message: &str);
}

/// Reports notifications as `error!` events.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
	fn error(&self, message: &str) {
		error!("Transaction failed: {}", message);
	}
}

pub struct TransactionController {
	kind: BlockKind,
	descriptor: Option<TransactionDescriptor>,
	wallet: Arc<dyn Wallet>,
	notifier: Arc<dyn Notifier>,
	settle_delay: Duration,
	status: watch::Sender<TxStatus>,
	transitions: broadcast::Sender<TxStatus>,
	error: Mutex<Option<String>>,
}

impl TransactionController {
	pub fn new(
		kind: BlockKind,
		descriptor: Option<TransactionDescriptor>,
		wallet: Arc<dyn Wallet>,
	) -> Self {
		let (transitions, _) = broadcast::channel(16);
		Self {
			kind,
			descriptor,
			wallet,
			notifier: Arc::new(TracingNotifier),
			settle_delay: DEFAULT_SETTLE_DELAY,
			status: watch::Sender::new(TxStatus::Pending),
			transitions,
			error: Mutex::new(None),
		}
	}

	pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
		self.notifier = notifier;
		self
	}

	/// Delay between a successful send and the `Sent` status.
	pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
		self.settle_delay = settle_delay;
		self
	}

	pub fn status(&self) -> TxStatus {
		*self.status.borrow()
	}

	/// True while a send is in flight.
	pub fn working(&self) -> bool {
		self.status() == TxStatus::Sending
	}

	/// Message of the last failed attempt, cleared when a new attempt starts.
	pub fn error(&self) -> Option<String> {
		self.lock_error().clone()
	}

	pub fn can_send(&self) -> bool {
		self.descriptor.is_some() && !self.working()
	}

	pub fn descriptor(&self) -> Option<&TransactionDescriptor> {
		self.descriptor.as_ref()
	}

	/// Latest status; observers that need every step should use [`transitions`](Self::transitions).
	pub fn watch_status(&self) -> watch::Receiver<TxStatus> {
		self.status.subscribe()
	}

	/// Every status change, in order.
	pub fn transitions(&self) -> broadcast::Receiver<TxStatus> {
		self.transitions.subscribe()
	}

	/// Send the transaction and return the wallet's result.
	///
	/// The status ends at `Pending` whatever the outcome.
	pub async fn send(&self) -> Result<Value, TransactionError> {
		// claim the Sending slot atomically so concurrent sends cannot both pass
		let claimed = self.status.send_if_modified(|status| {
			if *status == TxStatus::Sending {
				false
			} else {
				*status = TxStatus::Sending;
				true
			}
		});
		if !claimed {
			return Err(TransactionError::AlreadySending);
		}
		let reset = ResetOnDrop(self);
		let _ = self.transitions.send(TxStatus::Sending);
		*self.lock_error() = None;

		let result = match &self.descriptor {
			Some(descriptor) => {
				info!("Sending {}", descriptor.method_name());
				self.wallet
					.create_account_block(self.kind, descriptor)
					.await
					.map_err(TransactionError::from)
			}
			None => Err(TransactionError::MissingDescriptor),
		};

		match &result {
			Ok(_) => {
				tokio::time::sleep(self.settle_delay).await;
				self.set_status(TxStatus::Sent);
			}
			Err(e) => {
				let message = e.to_string();
				self.notifier.error(&message);
				*self.lock_error() = Some(message);
			}
		}
		drop(reset);

		result
	}

	fn set_status(&self, status: TxStatus) {
		self.status.send_replace(status);
		let _ = self.transitions.send(status);
	}

	fn lock_error(&self) -> std::sync::MutexGuard<'_, Option<String>> {
		match self.error.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}
}

/// Puts the status back to `Pending` when a send ends, including a send dropped mid-flight.
struct ResetOnDrop<'a>(&'a TransactionController);

impl Drop for ResetOnDrop<'_> {
	fn drop(&mut self) {
		self.0.set_status(TxStatus::Pending);
	}
}
