//! Contract state reader.
//!
//! Keeps the decoded result of one read-only contract call current. After the first read the
//! reader can follow a set of contract events and re-read whenever one of them is emitted.

use super::{Liveness, Opened, ReleaseGuard, close_subscription, open_subscription, refresh_loop};
use crate::abi::{Fragment, build_filter};
use crate::provider::{ContractQuery, Provider};

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One contract call to keep current.
#[derive(Debug, Clone, PartialEq)]
pub struct StateQuery {
	pub contract_address: String,
	pub abi: Arc<Vec<Fragment>>,
	pub method_name: String,
	/// `None` while the inputs of the call are not known yet
	pub params: Option<Vec<Value>>,
	/// Events of the same contract that invalidate the result
	pub watch_events: Option<Vec<String>>,
}

impl StateQuery {
	pub fn new(contract_address: &str, abi: Arc<Vec<Fragment>>, method_name: &str) -> Self {
		Self {
			contract_address: contract_address.to_string(),
			abi,
			method_name: method_name.to_string(),
			params: Some(Vec::new()),
			watch_events: None,
		}
	}

	pub fn with_params(mut self, params: Option<Vec<Value>>) -> Self {
		self.params = params;
		self
	}

	pub fn watching<S: Into<String>>(mut self, events: impl IntoIterator<Item = S>) -> Self {
		self.watch_events = Some(events.into_iter().map(Into::into).collect());
		self
	}
}

struct Activation {
	query: StateQuery,
	guard: ReleaseGuard,
	task: Option<JoinHandle<()>>,
}

/// Publishes `Some(T)` decoded from the output array of the current query.
///
/// The value is `None` until the first successful read and keeps its last value across failed
/// reads and re-activations.
pub struct ContractStateReader<T> {
	provider: Arc<dyn Provider>,
	value: Arc<watch::Sender<Option<T>>>,
	active: Option<Activation>,
}

impl<T> ContractStateReader<T>
where
	T: DeserializeOwned + Clone + Send + Sync + 'static,
{
	pub fn new(provider: Arc<dyn Provider>) -> Self {
		Self {
			provider,
			value: Arc::new(watch::Sender::new(None)),
			active: None,
		}
	}

	/// Start keeping `query` current.
	///
	/// An identical query is a no-op. Any other query tears the previous activation down first.
	/// A query without params starts nothing.
	pub async fn activate(&mut self, query: StateQuery) {
		if self.active.as_ref().is_some_and(|active| active.query == query) {
			return;
		}
		self.deactivate().await;

		let Some(params) = query.params.clone() else {
			debug!("No params for {}, skipping read", query.method_name);
			self.active = Some(Activation {
				query,
				guard: ReleaseGuard::new(),
				task: None,
			});
			return;
		};

		let mut guard = ReleaseGuard::new();
		let (stop_tx, stop_rx) = oneshot::channel();
		guard.defer(move || {
			let _ = stop_tx.send(());
		});

		let task = tokio::spawn(run(
			self.provider.clone(),
			query.clone(),
			params,
			self.value.clone(),
			guard.liveness(),
			stop_rx,
		));

		self.active = Some(Activation {
			query,
			guard,
			task: Some(task),
		});
	}

	/// Tear the current activation down and wait until its subscription is closed.
	pub async fn deactivate(&mut self) {
		if let Some(mut active) = self.active.take() {
			active.guard.release();
			if let Some(task) = active.task.take() {
				let _ = task.await;
			}
		}
	}

	pub fn value(&self) -> Option<T> {
		self.value.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
		self.value.subscribe()
	}

	pub fn query(&self) -> Option<&StateQuery> {
		self.active.as_ref().map(|active| &active.query)
	}
}

async fn run<T>(
	provider: Arc<dyn Provider>,
	query: StateQuery,
	params: Vec<Value>,
	value: Arc<watch::Sender<Option<T>>>,
	liveness: Liveness,
	mut stop: oneshot::Receiver<()>,
) where
	T: DeserializeOwned + Send + Sync + 'static,
{
	let spec = query
		.watch_events
		.as_ref()
		.map(|events| build_filter(&query.contract_address, &query.abi, events))
		.filter(|spec| !spec.is_empty());

	let mut subscription = match spec {
		Some(spec) => {
			let filter = spec.vm_log_filter();
			match open_subscription(provider.as_ref(), &filter, &mut stop, &query.method_name).await {
				Opened::Subscribed(subscription) => Some(subscription),
				Opened::Unavailable => None,
				Opened::Stopped => return,
			}
		}
		None => None,
	};
	let subscription_id = subscription.as_ref().map(|s| s.id.clone());

	let refresh = || {
		read_and_publish(
			provider.clone(),
			query.clone(),
			params.clone(),
			value.clone(),
			liveness.clone(),
		)
	};
	refresh_loop(&mut subscription, &mut stop, refresh, true).await;

	if let Some(id) = subscription_id {
		close_subscription(provider.as_ref(), &id).await;
	}
}

async fn read_and_publish<T>(
	provider: Arc<dyn Provider>,
	query: StateQuery,
	params: Vec<Value>,
	value: Arc<watch::Sender<Option<T>>>,
	liveness: Liveness,
) where
	T: DeserializeOwned,
{
	let result = provider
		.query_contract_state(ContractQuery {
			address: &query.contract_address,
			abi: &query.abi,
			method_name: &query.method_name,
			params: &params,
		})
		.await;

	let outputs = match result {
		Ok(Some(outputs)) => outputs,
		Ok(None) => {
			debug!("{} returned no result", query.method_name);
			return;
		}
		Err(e) => {
			warn!("Failed to read {}: {}", query.method_name, e);
			return;
		}
	};

	match serde_json::from_value::<T>(Value::Array(outputs)) {
		Ok(decoded) if liveness.is_alive() => {
			info!("Read {} from {}", query.method_name, query.contract_address);
			value.send_replace(Some(decoded));
		}
		Ok(_) => {}
		Err(e) => warn!("Unexpected {} result shape: {}", query.method_name, e),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::abi::{ParamType, encode_params};
	use crate::config::bayc_abi;
	use crate::provider::{CONTRACT_QUERY, CREATE_VMLOG_SUBSCRIPTION};
	use crate::test_support::{MockProvider, wait_until};
	use base64::{Engine as _, engine::general_purpose::STANDARD};
	use serde_json::json;
	use std::time::Duration;

	const BAYC: &str = "vite_0102030405060708090a0b0c0d0e0f10111213146405de22ad";
	const ALICE: &str = "vite_abababababababababababababababababababab4744d852dc";
	const BOB: &str = "vite_cdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdbdaf20a30e";

	fn encoded(type_: ParamType, value: Value) -> Value {
		json!(STANDARD.encode(encode_params(&[type_], &[value]).unwrap()))
	}

	fn owner_query(token_id: &str) -> StateQuery {
		StateQuery::new(BAYC, Arc::new(bayc_abi().unwrap()), "ownerOf")
			.with_params(Some(vec![json!(token_id)]))
			.watching(["Transfer"])
	}

	#[tokio::test]
	async fn reads_base_url() {
		let provider = Arc::new(MockProvider::new());
		provider.respond(CONTRACT_QUERY, encoded(ParamType::String, json!("https://example/")));

		let mut reader = ContractStateReader::<Vec<String>>::new(provider.clone());
		assert_eq!(reader.value(), None);
		reader
			.activate(StateQuery::new(BAYC, Arc::new(bayc_abi().unwrap()), "BASE_URL"))
			.await;

		wait_until(|| reader.value().is_some()).await;
		let base_url = reader.value().unwrap();
		assert_eq!(format!("{}{}", base_url[0], "7"), "https://example/7");
		assert!(provider.calls(CREATE_VMLOG_SUBSCRIPTION).is_empty());
	}

	#[tokio::test]
	async fn missing_params_does_nothing() {
		let provider = Arc::new(MockProvider::new());
		let mut reader = ContractStateReader::<Vec<String>>::new(provider.clone());
		reader.activate(owner_query("1").with_params(None)).await;

		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(reader.value(), None);
		assert!(provider.calls(CONTRACT_QUERY).is_empty());
		assert!(provider.calls(CREATE_VMLOG_SUBSCRIPTION).is_empty());
	}

	#[tokio::test]
	async fn rereads_on_watched_event() {
		let provider = Arc::new(MockProvider::new());
		provider.respond(CONTRACT_QUERY, encoded(ParamType::Address, json!(ALICE)));

		let mut reader = ContractStateReader::<Vec<String>>::new(provider.clone());
		reader.activate(owner_query("1")).await;
		provider.wait_for_subscriptions(1).await;
		wait_until(|| reader.value() == Some(vec![ALICE.to_string()])).await;

		// empty batches carry no logs and trigger nothing
		provider.notify(vec![]);
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(provider.calls(CONTRACT_QUERY).len(), 1);

		provider.respond(CONTRACT_QUERY, encoded(ParamType::Address, json!(BOB)));
		provider.notify(vec![json!({"removed": false})]);
		wait_until(|| reader.value() == Some(vec![BOB.to_string()])).await;
		assert_eq!(provider.calls(CONTRACT_QUERY).len(), 2);
	}

	#[tokio::test]
	async fn reactivation_tears_down_previous_subscription_once() {
		let provider = Arc::new(MockProvider::new());
		provider.respond(CONTRACT_QUERY, encoded(ParamType::Address, json!(ALICE)));

		let mut reader = ContractStateReader::<Vec<String>>::new(provider.clone());
		reader.activate(owner_query("1")).await;
		provider.wait_for_subscriptions(1).await;

		reader.activate(owner_query("1")).await;
		assert!(provider.unsubscribed().is_empty());
		assert_eq!(provider.calls(CREATE_VMLOG_SUBSCRIPTION).len(), 1);

		reader.activate(owner_query("2")).await;
		assert_eq!(provider.unsubscribed(), vec!["0x1".to_string()]);
		provider.wait_for_subscriptions(1).await;
		assert_eq!(provider.calls(CREATE_VMLOG_SUBSCRIPTION).len(), 2);

		reader.deactivate().await;
		reader.deactivate().await;
		assert_eq!(
			provider.unsubscribed(),
			vec!["0x1".to_string(), "0x2".to_string()]
		);
	}

	#[tokio::test]
	async fn reactivation_during_subscribe_closes_late_subscription() {
		let provider = Arc::new(MockProvider::new());
		provider.delay_subscribe(Duration::from_millis(100));
		provider.respond(CONTRACT_QUERY, encoded(ParamType::Address, json!(ALICE)));

		let mut reader = ContractStateReader::<Vec<String>>::new(provider.clone());
		reader.activate(owner_query("1")).await;
		provider.wait_for_calls(CREATE_VMLOG_SUBSCRIPTION, 1).await;

		reader.activate(owner_query("2")).await;
		assert_eq!(provider.unsubscribed(), vec!["0x1".to_string()]);
		assert_eq!(provider.live_subscriptions(), 0);
		assert!(provider.calls(CONTRACT_QUERY).is_empty());

		provider.wait_for_subscriptions(1).await;
		wait_until(|| reader.value().is_some()).await;
		reader.deactivate().await;
		assert_eq!(
			provider.unsubscribed(),
			vec!["0x1".to_string(), "0x2".to_string()]
		);
		assert_eq!(provider.live_subscriptions(), 0);
	}

	#[tokio::test]
	async fn subscription_failure_still_reads_once() {
		let provider = Arc::new(MockProvider::new());
		provider.fail_subscribe("subscriptions disabled");
		provider.respond(CONTRACT_QUERY, encoded(ParamType::Address, json!(ALICE)));

		let mut reader = ContractStateReader::<Vec<String>>::new(provider.clone());
		reader.activate(owner_query("1")).await;
		wait_until(|| reader.value().is_some()).await;

		reader.deactivate().await;
		assert!(provider.unsubscribed().is_empty());
	}

	#[tokio::test]
	async fn read_failure_keeps_last_value() {
		let provider = Arc::new(MockProvider::new());
		provider.respond(CONTRACT_QUERY, encoded(ParamType::Address, json!(ALICE)));

		let mut reader = ContractStateReader::<Vec<String>>::new(provider.clone());
		reader.activate(owner_query("1")).await;
		provider.wait_for_subscriptions(1).await;
		wait_until(|| reader.value().is_some()).await;

		provider.fail(CONTRACT_QUERY, "node unavailable");
		provider.notify(vec![json!({})]);
		provider.wait_for_calls(CONTRACT_QUERY, 2).await;
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(reader.value(), Some(vec![ALICE.to_string()]));
	}

	#[tokio::test]
	async fn latest_refresh_wins() {
		let provider = Arc::new(MockProvider::new());
		provider.respond_after(
			CONTRACT_QUERY,
			encoded(ParamType::Address, json!(ALICE)),
			Duration::from_millis(200),
		);
		provider.respond_once(CONTRACT_QUERY, encoded(ParamType::Address, json!(BOB)));

		let mut reader = ContractStateReader::<Vec<String>>::new(provider.clone());
		let mut updates = reader.subscribe();
		reader.activate(owner_query("1")).await;
		provider.wait_for_subscriptions(1).await;
		provider.wait_for_calls(CONTRACT_QUERY, 1).await;

		provider.notify(vec![json!({})]);
		updates.changed().await.unwrap();
		assert_eq!(*updates.borrow(), Some(vec![BOB.to_string()]));

		tokio::time::sleep(Duration::from_millis(300)).await;
		assert_eq!(reader.value(), Some(vec![BOB.to_string()]));
		assert!(!updates.has_changed().unwrap());
	}
}
