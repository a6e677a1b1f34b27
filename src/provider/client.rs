//!
//! WebSocket JSON-RPC client for a Vite node.
//!
//! One connection carries both request/response traffic and subscription notifications. A
//! writer task drains an outgoing queue into the socket; a reader task routes responses to the
//! waiting request by id and `subscribe_subscription` notifications to the matching
//! [`Subscription`] channel.

use super::types::*;
use super::Provider;
use backoff::{ExponentialBackoff, future::retry};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

const SUBSCRIBE_METHOD: &str = "subscribe_subscribe";
const UNSUBSCRIBE_METHOD: &str = "subscribe_unsubscribe";
const NOTIFICATION_METHOD: &str = "subscribe_subscription";

type PendingRequests = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, ProviderError>>>>>;
type SubscriptionSenders = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Vec<Value>>>>>;

/// Vite node client over a single WebSocket connection
pub struct WsProvider {
	/// The WebSocket URL of the node.
	url: String,
	/// Queue drained by the writer task.
	outgoing: mpsc::UnboundedSender<Message>,
	/// Requests waiting for their response, keyed by JSON-RPC id.
	pending: PendingRequests,
	/// Live subscriptions, keyed by subscription id.
	subscriptions: SubscriptionSenders,
	next_id: AtomicU64,
	request_timeout: Duration,
	tasks: Vec<JoinHandle<()>>,
}

impl WsProvider {
	/// Connect to a node, retrying with exponential backoff.
	///
	/// # Arguments
	/// * `url` - The node WebSocket endpoint, e.g. `wss://buidl.vite.net/gvite/ws`.
	///
	/// # Errors
	/// Returns `ProviderError::WebSocketError` once the backoff gives up.
	pub async fn connect(url: &str) -> Result<Self, ProviderError> {
		debug!("Attempting WebSocket connection to: {}", url);

		let backoff = ExponentialBackoff {
			max_elapsed_time: Some(Duration::from_secs(30)),
			..ExponentialBackoff::default()
		};
		let (ws_stream, response) = retry(backoff, || async {
			connect_async(url).await.map_err(|e| {
				warn!("WebSocket connection to {} failed: {}", url, e);
				backoff::Error::transient(e)
			})
		})
		.await?;
		info!(
			"Connected to {}, response status: {}",
			url,
			response.status()
		);

		let (mut ws_sender, mut ws_receiver) = ws_stream.split();
		let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
		let pending: PendingRequests = Arc::new(Mutex::new(HashMap::new()));
		let subscriptions: SubscriptionSenders = Arc::new(Mutex::new(HashMap::new()));

		let writer = tokio::spawn(async move {
			while let Some(message) = outgoing_rx.recv().await {
				if let Err(e) = ws_sender.send(message).await {
					error!("Failed to write to WebSocket: {}", e);
					break;
				}
			}
		});

		let reader = {
			let pending = pending.clone();
			let subscriptions = subscriptions.clone();
			tokio::spawn(async move {
				while let Some(message) = ws_receiver.next().await {
					match message {
						Ok(Message::Text(text)) => {
							route_message(&text, &pending, &subscriptions).await;
						}
						Ok(Message::Close(frame)) => {
							info!("WebSocket closed by node: {:?}", frame);
							break;
						}
						Ok(_) => {}
						Err(e) => {
							error!("WebSocket read error: {}", e);
							break;
						}
					}
				}

				// Fail whatever is still waiting and end every subscription stream
				for (_, waiter) in pending.lock().await.drain() {
					let _ = waiter.send(Err(ProviderError::ConnectionClosed));
				}
				subscriptions.lock().await.clear();
			})
		};

		Ok(Self {
			url: url.to_string(),
			outgoing,
			pending,
			subscriptions,
			next_id: AtomicU64::new(1),
			request_timeout: Duration::from_secs(30),
			tasks: vec![writer, reader],
		})
	}

	/// Override the per-request timeout (30 seconds by default).
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	pub fn url(&self) -> &str {
		&self.url
	}
}

impl Drop for WsProvider {
	fn drop(&mut self) {
		for task in &self.tasks {
			task.abort();
		}
	}
}

async fn route_message(text: &str, pending: &PendingRequests, subscriptions: &SubscriptionSenders) {
	let parsed: Value = match serde_json::from_str(text) {
		Ok(parsed) => parsed,
		Err(e) => {
			error!("Failed to parse node message: {}", e);
			return;
		}
	};

	if let Some(id) = parsed.get("id").and_then(Value::as_u64) {
		let Some(waiter) = pending.lock().await.remove(&id) else {
			debug!("Response for unknown request id {}", id);
			return;
		};
		let result = match parsed.get("error") {
			Some(error) if !error.is_null() => Err(ProviderError::RpcError {
				code: error.get("code").and_then(Value::as_i64).unwrap_or(-32603),
				message: error
					.get("message")
					.and_then(Value::as_str)
					.unwrap_or("Unknown RPC error")
					.to_string(),
			}),
			_ => Ok(parsed.get("result").cloned().unwrap_or(Value::Null)),
		};
		let _ = waiter.send(result);
		return;
	}

	match parsed.get("method").and_then(Value::as_str) {
		Some(NOTIFICATION_METHOD) => {
			let params = parsed.get("params");
			let Some(subscription_id) = params
				.and_then(|p| p.get("subscription"))
				.and_then(Value::as_str)
			else {
				warn!("Notification without subscription id");
				return;
			};
			let batch = match params.and_then(|p| p.get("result")) {
				Some(Value::Array(items)) => items.clone(),
				Some(Value::Null) | None => Vec::new(),
				Some(other) => vec![other.clone()],
			};

			let mut subscriptions = subscriptions.lock().await;
			if let Some(sender) = subscriptions.get(subscription_id) {
				if sender.send(batch).is_err() {
					debug!("Subscription {} receiver dropped", subscription_id);
					subscriptions.remove(subscription_id);
				}
			} else {
				debug!("Notification for unknown subscription {}", subscription_id);
			}
		}
		Some(other) => debug!("Ignoring message method: {}", other),
		None => debug!("Ignoring message without id or method"),
	}
}

#[async_trait::async_trait]
impl Provider for WsProvider {
	async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, ProviderError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let (sender, receiver) = oneshot::channel();
		self.pending.lock().await.insert(id, sender);

		let payload = json!({
			"jsonrpc": "2.0",
			"id": id,
			"method": method,
			"params": params,
		});
		debug!("Sending request {} {}", id, method);
		if self.outgoing.send(Message::Text(payload.to_string())).is_err() {
			self.pending.lock().await.remove(&id);
			return Err(ProviderError::ConnectionClosed);
		}

		match tokio::time::timeout(self.request_timeout, receiver).await {
			Ok(Ok(result)) => result,
			Ok(Err(_)) => Err(ProviderError::ConnectionClosed),
			Err(_) => {
				self.pending.lock().await.remove(&id);
				Err(ProviderError::Timeout(method.to_string()))
			}
		}
	}

	async fn subscribe(
		&self,
		method: &str,
		params: Vec<Value>,
	) -> Result<Subscription, ProviderError> {
		let mut subscribe_params = vec![Value::String(method.to_string())];
		subscribe_params.extend(params);

		let result = self.request(SUBSCRIBE_METHOD, subscribe_params).await?;
		let id = result
			.as_str()
			.ok_or_else(|| {
				ProviderError::DecodeError(format!("invalid subscription id: {}", result))
			})?
			.to_string();

		let (sender, receiver) = mpsc::unbounded_channel();
		self.subscriptions.lock().await.insert(id.clone(), sender);
		info!("Opened subscription {} ({})", id, method);
		Ok(Subscription::new(id, receiver))
	}

	async fn unsubscribe(&self, subscription_id: &str) -> Result<(), ProviderError> {
		self.subscriptions.lock().await.remove(subscription_id);
		self.request(
			UNSUBSCRIBE_METHOD,
			vec![Value::String(subscription_id.to_string())],
		)
		.await?;
		info!("Closed subscription {}", subscription_id);
		Ok(())
	}
}
