//! Event log watcher.
//!
//! Keeps the decoded history of one contract event current: a full historical fetch first, then
//! a full refetch after every live notification. The list is replaced wholesale on each fetch.

use super::{Liveness, Opened, ReleaseGuard, close_subscription, open_subscription, refresh_loop};
use crate::abi::{FilterSpec, Fragment, build_filter, decode_log_as};
use crate::provider::{Log, Provider, ProviderError, VmLogFilter, fetch_vm_logs};

use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The event to watch.
#[derive(Debug, Clone, PartialEq)]
pub struct LogQuery {
	pub contract_address: String,
	pub abi: Arc<Vec<Fragment>>,
	pub event_name: String,
}

impl LogQuery {
	pub fn new(contract_address: &str, abi: Arc<Vec<Fragment>>, event_name: &str) -> Self {
		Self {
			contract_address: contract_address.to_string(),
			abi,
			event_name: event_name.to_string(),
		}
	}
}

/// A decoded event together with the raw log it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DataLog<T> {
	pub data: T,
	pub log: Log,
}

pub type LogPredicate<T> = Arc<dyn Fn(&DataLog<T>) -> bool + Send + Sync>;

type LogList<T> = Arc<Vec<DataLog<T>>>;

/// Publishes the decoded history of one event, newest response entry first.
pub struct VmLogWatcher<T> {
	logs: watch::Receiver<LogList<T>>,
	predicate: RwLock<Option<LogPredicate<T>>>,
	guard: ReleaseGuard,
	task: Option<JoinHandle<()>>,
}

impl<T> VmLogWatcher<T>
where
	T: DeserializeOwned + Clone + Send + Sync + 'static,
{
	/// Start watching.
	///
	/// When the ABI has no subscribable event with the requested name the watcher stays empty
	/// forever and never touches the provider.
	pub fn spawn(
		provider: Arc<dyn Provider>,
		query: LogQuery,
		predicate: Option<LogPredicate<T>>,
	) -> Self {
		let (logs_tx, logs) = watch::channel(Arc::new(Vec::new()));
		let mut guard = ReleaseGuard::new();

		let spec = build_filter(&query.contract_address, &query.abi, &[&query.event_name]);
		let task = if spec.is_empty() {
			None
		} else {
			let (stop_tx, stop_rx) = oneshot::channel();
			guard.defer(move || {
				let _ = stop_tx.send(());
			});
			Some(tokio::spawn(run(
				provider,
				spec,
				Arc::new(logs_tx),
				guard.liveness(),
				stop_rx,
			)))
		};

		Self {
			logs,
			predicate: RwLock::new(predicate),
			guard,
			task,
		}
	}

	/// Decoded logs accepted by the current predicate.
	pub fn logs(&self) -> Vec<DataLog<T>> {
		let all = self.all_logs();
		let predicate = self.current_predicate();
		all.iter()
			.filter(|log| predicate.as_ref().is_none_or(|accept| accept(log)))
			.cloned()
			.collect()
	}

	/// Every decoded log, ignoring the predicate.
	pub fn all_logs(&self) -> LogList<T> {
		self.logs.borrow().clone()
	}

	/// Replace the predicate; takes effect on the next [`logs`](Self::logs) call.
	pub fn set_predicate(&self, predicate: Option<LogPredicate<T>>) {
		match self.predicate.write() {
			Ok(mut current) => *current = predicate,
			Err(poisoned) => *poisoned.into_inner() = predicate,
		}
	}

	fn current_predicate(&self) -> Option<LogPredicate<T>> {
		match self.predicate.read() {
			Ok(current) => current.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		}
	}

	/// Wait for the next list update. Returns `false` once the watcher can no longer change.
	pub async fn changed(&mut self) -> bool {
		self.logs.changed().await.is_ok()
	}

	pub fn is_active(&self) -> bool {
		self.task.is_some() && !self.guard.is_released()
	}

	/// Stop watching and wait until the subscription is closed. Safe to call repeatedly.
	pub async fn stop(&mut self) {
		self.guard.release();
		if let Some(task) = self.task.take() {
			let _ = task.await;
		}
	}
}

async fn run<T>(
	provider: Arc<dyn Provider>,
	spec: FilterSpec,
	logs: Arc<watch::Sender<LogList<T>>>,
	liveness: Liveness,
	mut stop: oneshot::Receiver<()>,
) where
	T: DeserializeOwned + Send + Sync + 'static,
{
	let spec = Arc::new(spec);
	let filter = Arc::new(spec.vm_log_filter());
	let refresh = || {
		fetch_and_publish(
			provider.clone(),
			spec.clone(),
			filter.clone(),
			logs.clone(),
			liveness.clone(),
		)
	};

	tokio::select! {
		_ = &mut stop => return,
		_ = refresh() => {}
	}

	let label = format!("{} logs", spec.contract_address);
	let mut subscription = match open_subscription(provider.as_ref(), &filter, &mut stop, &label).await {
		Opened::Subscribed(subscription) => Some(subscription),
		Opened::Unavailable => None,
		Opened::Stopped => return,
	};
	let subscription_id = subscription.as_ref().map(|s| s.id.clone());

	refresh_loop(&mut subscription, &mut stop, refresh, false).await;

	if let Some(id) = subscription_id {
		close_subscription(provider.as_ref(), &id).await;
	}
}

async fn fetch_and_publish<T>(
	provider: Arc<dyn Provider>,
	spec: Arc<FilterSpec>,
	filter: Arc<VmLogFilter>,
	logs: Arc<watch::Sender<LogList<T>>>,
	liveness: Liveness,
) where
	T: DeserializeOwned,
{
	match fetch_decoded(provider.as_ref(), &spec, &filter).await {
		Ok(Some(decoded)) if liveness.is_alive() => {
			info!(
				"Loaded {} logs from {}",
				decoded.len(),
				spec.contract_address
			);
			logs.send_replace(Arc::new(decoded));
		}
		Ok(_) => {}
		Err(e) => warn!("Failed to fetch logs of {}: {}", spec.contract_address, e),
	}
}

/// Fetch and decode the full history. `None` when the node returned nothing.
async fn fetch_decoded<T: DeserializeOwned>(
	provider: &dyn Provider,
	spec: &FilterSpec,
	filter: &VmLogFilter,
) -> Result<Option<Vec<DataLog<T>>>, ProviderError> {
	let raw = fetch_vm_logs(provider, filter).await?;
	if raw.is_empty() {
		return Ok(None);
	}

	let mut decoded = Vec::with_capacity(raw.len());
	for log in raw.into_iter().rev() {
		let Some(fragment) = log
			.vmlog
			.topics
			.first()
			.and_then(|topic| spec.fragment_for_topic(topic))
		else {
			debug!("Skipping log {} with unknown topic", log.account_block_hash);
			continue;
		};

		let data = match log.vmlog.data_hex() {
			Ok(data) => data,
			Err(e) => {
				warn!("Skipping log {}: {}", log.account_block_hash, e);
				continue;
			}
		};
		match decode_log_as::<T>(fragment, data.as_deref(), &log.vmlog.topics) {
			Ok(data) => decoded.push(DataLog { data, log }),
			Err(e) => warn!("Skipping undecodable log {}: {}", log.account_block_hash, e),
		}
	}
	Ok(Some(decoded))
}
