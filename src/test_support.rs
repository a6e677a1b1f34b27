//! In-memory provider and wallet used by unit tests.

use crate::provider::{Provider, ProviderError, Subscription};
use crate::wallet::{BlockKind, TransactionDescriptor, Wallet, WalletError};

use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

type Scripted = (Result<Value, String>, Option<Duration>);

/// Scripted provider.
///
/// `respond` sets the answer for every call to a method; `respond_once` and `respond_after`
/// queue one-shot answers that take precedence. Unscripted methods answer `null`.
#[derive(Default)]
pub struct MockProvider {
	defaults: Mutex<HashMap<String, Result<Value, String>>>,
	queued: Mutex<HashMap<String, VecDeque<Scripted>>>,
	calls: Mutex<Vec<(String, Vec<Value>)>>,
	subscriptions: Mutex<HashMap<String, mpsc::UnboundedSender<Vec<Value>>>>,
	subscribe_failure: Mutex<Option<String>>,
	subscribe_delay: Mutex<Option<Duration>>,
	unsubscribed: Mutex<Vec<String>>,
	next_subscription: AtomicU64,
}

impl MockProvider {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn respond(&self, method: &str, value: Value) {
		self.defaults
			.lock()
			.unwrap()
			.insert(method.to_string(), Ok(value));
	}

	pub fn fail(&self, method: &str, message: &str) {
		self.defaults
			.lock()
			.unwrap()
			.insert(method.to_string(), Err(message.to_string()));
	}

	pub fn respond_once(&self, method: &str, value: Value) {
		self.queue(method, Ok(value), None);
	}

	/// Queue a one-shot answer delivered after `delay`.
	pub fn respond_after(&self, method: &str, value: Value, delay: Duration) {
		self.queue(method, Ok(value), Some(delay));
	}

	fn queue(&self, method: &str, result: Result<Value, String>, delay: Option<Duration>) {
		self.queued
			.lock()
			.unwrap()
			.entry(method.to_string())
			.or_default()
			.push_back((result, delay));
	}

	pub fn fail_subscribe(&self, message: &str) {
		*self.subscribe_failure.lock().unwrap() = Some(message.to_string());
	}

	/// Hold every subscribe call for `delay` before it completes.
	pub fn delay_subscribe(&self, delay: Duration) {
		*self.subscribe_delay.lock().unwrap() = Some(delay);
	}

	/// Params of every call made to `method`, in order.
	pub fn calls(&self, method: &str) -> Vec<Vec<Value>> {
		self.calls
			.lock()
			.unwrap()
			.iter()
			.filter(|(name, _)| name == method)
			.map(|(_, params)| params.clone())
			.collect()
	}

	pub fn live_subscriptions(&self) -> usize {
		self.subscriptions.lock().unwrap().len()
	}

	pub fn unsubscribed(&self) -> Vec<String> {
		self.unsubscribed.lock().unwrap().clone()
	}

	/// Push a notification batch to every live subscription.
	pub fn notify(&self, batch: Vec<Value>) {
		for sender in self.subscriptions.lock().unwrap().values() {
			let _ = sender.send(batch.clone());
		}
	}

	/// Wait until at least `count` subscriptions are open.
	pub async fn wait_for_subscriptions(&self, count: usize) {
		wait_until(|| self.live_subscriptions() >= count).await;
	}

	/// Wait until `method` has been called at least `count` times.
	pub async fn wait_for_calls(&self, method: &str, count: usize) {
		wait_until(|| self.calls(method).len() >= count).await;
	}
}

/// Poll `condition` until it holds, panicking after two seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
	let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
	while !condition() {
		assert!(
			tokio::time::Instant::now() < deadline,
			"condition not reached in time"
		);
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
}

#[async_trait::async_trait]
impl Provider for MockProvider {
	async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, ProviderError> {
		self.calls
			.lock()
			.unwrap()
			.push((method.to_string(), params));

		let queued = self
			.queued
			.lock()
			.unwrap()
			.get_mut(method)
			.and_then(VecDeque::pop_front);
		let (result, delay) = match queued {
			Some(scripted) => scripted,
			None => {
				let result = self
					.defaults
					.lock()
					.unwrap()
					.get(method)
					.cloned()
					.unwrap_or(Ok(Value::Null));
				(result, None)
			}
		};

		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		result.map_err(|message| ProviderError::RpcError {
			code: -32000,
			message,
		})
	}

	async fn subscribe(
		&self,
		method: &str,
		params: Vec<Value>,
	) -> Result<Subscription, ProviderError> {
		self.calls
			.lock()
			.unwrap()
			.push((method.to_string(), params));

		let delay = *self.subscribe_delay.lock().unwrap();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		if let Some(message) = self.subscribe_failure.lock().unwrap().clone() {
			return Err(ProviderError::RpcError {
				code: -32000,
				message,
			});
		}

		let id = format!("0x{:x}", self.next_subscription.fetch_add(1, Ordering::SeqCst) + 1);
		let (sender, receiver) = mpsc::unbounded_channel();
		self.subscriptions
			.lock()
			.unwrap()
			.insert(id.clone(), sender);
		Ok(Subscription::new(id, receiver))
	}

	async fn unsubscribe(&self, subscription_id: &str) -> Result<(), ProviderError> {
		self.subscriptions.lock().unwrap().remove(subscription_id);
		self.unsubscribed
			.lock()
			.unwrap()
			.push(subscription_id.to_string());
		Ok(())
	}
}

/// Wallet whose sends succeed or fail as scripted, after an optional delay.
pub struct MockWallet {
	address: Option<String>,
	result: Mutex<Result<Value, String>>,
	delay: Duration,
	sent: Mutex<Vec<(BlockKind, TransactionDescriptor)>>,
}

impl MockWallet {
	pub fn new(address: Option<&str>) -> Self {
		Self {
			address: address.map(str::to_string),
			result: Mutex::new(Ok(Value::Null)),
			delay: Duration::ZERO,
			sent: Mutex::new(Vec::new()),
		}
	}

	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}

	pub fn succeed_with(&self, value: Value) {
		*self.result.lock().unwrap() = Ok(value);
	}

	pub fn fail_with(&self, message: &str) {
		*self.result.lock().unwrap() = Err(message.to_string());
	}

	pub fn sent(&self) -> Vec<(BlockKind, TransactionDescriptor)> {
		self.sent.lock().unwrap().clone()
	}
}

#[async_trait::async_trait]
impl Wallet for MockWallet {
	fn address(&self) -> Option<String> {
		self.address.clone()
	}

	async fn connect(&self) -> Result<(), WalletError> {
		Ok(())
	}

	async fn create_account_block(
		&self,
		kind: BlockKind,
		descriptor: &TransactionDescriptor,
	) -> Result<Value, WalletError> {
		self.sent.lock().unwrap().push((kind, descriptor.clone()));
		if !self.delay.is_zero() {
			tokio::time::sleep(self.delay).await;
		}
		let result = self.result.lock().unwrap().clone();
		result.map_err(WalletError::Rejected)
	}
}

#[derive(Clone, Default)]
struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedOutput {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.lock().unwrap().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedOutput {
	type Writer = CapturedOutput;

	fn make_writer(&'a self) -> Self::Writer {
		self.clone()
	}
}

/// Run `f` with a subscriber that records formatted events, returning the recorded text.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
	let output = CapturedOutput::default();
	let subscriber = tracing_subscriber::fmt()
		.with_writer(output.clone())
		.with_ansi(false)
		.with_max_level(tracing::Level::DEBUG)
		.finish();
	let result = tracing::subscriber::with_default(subscriber, f);
	let text = String::from_utf8_lossy(&output.0.lock().unwrap()).into_owned();
	(result, text)
}
