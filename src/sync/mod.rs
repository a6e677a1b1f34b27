//! Long-lived state synchronization.
//!
//! A [`ContractStateReader`] keeps the result of one read-only contract call current; a
//! [`VmLogWatcher`] keeps the decoded history of one event current. Both run one task per
//! activation that owns at most one live subscription, and both publish through watch channels.
//! The [`TransactionController`] drives the send lifecycle of a single transaction.

/// Activation teardown
mod guard;
/// Event history watcher
mod log_watcher;
/// Contract call result reader
mod state_reader;
/// Transaction send lifecycle
mod transaction;

pub use guard::{Liveness, ReleaseGuard};
pub use log_watcher::{DataLog, LogPredicate, LogQuery, VmLogWatcher};
pub use state_reader::{ContractStateReader, StateQuery};
pub use transaction::{
	Notifier, TracingNotifier, TransactionController, TransactionError, TxStatus,
};

use crate::provider::{Provider, Subscription, VmLogFilter, subscribe_vm_logs};
use serde_json::Value;
use std::future::Future;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, warn};

/// Outcome of [`open_subscription`].
pub(crate) enum Opened {
	Subscribed(Subscription),
	/// The subscribe call failed; the task carries on without notifications
	Unavailable,
	/// `stop` fired while subscribing; nothing is left open
	Stopped,
}

/// Subscribe to `filter`, honouring a stop that arrives while the call is in flight.
///
/// The call is never abandoned halfway: a subscription created after `stop` fired is closed
/// again before returning [`Opened::Stopped`].
pub(crate) async fn open_subscription(
	provider: &dyn Provider,
	filter: &VmLogFilter,
	stop: &mut oneshot::Receiver<()>,
	label: &str,
) -> Opened {
	let result = subscribe_vm_logs(provider, filter).await;
	let stopped = !matches!(stop.try_recv(), Err(TryRecvError::Empty));

	match result {
		Ok(subscription) if stopped => {
			close_subscription(provider, &subscription.id).await;
			Opened::Stopped
		}
		Ok(subscription) => Opened::Subscribed(subscription),
		Err(_) if stopped => Opened::Stopped,
		Err(e) => {
			warn!("Failed to subscribe to {}: {}", label, e);
			Opened::Unavailable
		}
	}
}

pub(crate) async fn close_subscription(provider: &dyn Provider, id: &str) {
	if let Err(e) = provider.unsubscribe(id).await {
		warn!("Failed to unsubscribe {}: {}", id, e);
	}
}

async fn next_batch(subscription: &mut Option<Subscription>) -> Option<Vec<Value>> {
	match subscription {
		Some(subscription) => subscription.next_batch().await,
		None => std::future::pending().await,
	}
}

async fn finish<F: Future<Output = ()> + Unpin>(refresh: &mut Option<F>) {
	match refresh {
		Some(refresh) => refresh.await,
		None => std::future::pending().await,
	}
}

/// Run `refresh` again after every non-empty notification until `stop` fires.
///
/// Refreshes are serialized with the latest request winning: a notification arriving while a
/// refresh is in flight drops that refresh and starts a new one. When `initial` is set a refresh
/// starts right away.
pub(crate) async fn refresh_loop<F, Fut>(
	subscription: &mut Option<Subscription>,
	stop: &mut oneshot::Receiver<()>,
	mut refresh: F,
	initial: bool,
) where
	F: FnMut() -> Fut,
	Fut: Future<Output = ()>,
{
	let mut in_flight = initial.then(|| Box::pin(refresh()));

	loop {
		tokio::select! {
			_ = &mut *stop => return,
			_ = finish(&mut in_flight) => in_flight = None,
			batch = next_batch(subscription) => match batch {
				Some(batch) if !batch.is_empty() => {
					if in_flight.is_some() {
						debug!("Refresh superseded by a newer notification");
					}
					in_flight = Some(Box::pin(refresh()));
				}
				Some(_) => {}
				None => {
					debug!("Subscription stream ended");
					*subscription = None;
				}
			},
		}
	}
}
