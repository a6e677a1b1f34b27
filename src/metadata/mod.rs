//! Token metadata served through the public IPFS gateway.

use backoff::{ExponentialBackoff, future::retry};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
	#[error("Http error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("No metadata location for token {0}")]
	MissingLocation(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NftAttribute {
	#[serde(default)]
	pub trait_type: String,
	/// Strings and numbers both occur in the wild
	#[serde(default)]
	pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NftMetadata {
	/// Usually an `ipfs://` URI, see [`ipfs_key_url`]
	#[serde(default)]
	pub image: Option<String>,
	#[serde(default)]
	pub attributes: Vec<NftAttribute>,
}

impl NftMetadata {
	pub fn image_url(&self) -> Option<String> {
		self.image.as_deref().and_then(ipfs_key_url)
	}
}

/// Gateway URL of an IPFS key, with or without the `ipfs://` scheme.
pub fn ipfs_key_url(key: &str) -> Option<String> {
	if key.is_empty() {
		return None;
	}
	Some(format!("{}{}", IPFS_GATEWAY, key.replace("ipfs://", "")))
}

#[derive(Clone)]
pub struct MetadataClient {
	http_client: Client,
	max_elapsed: Duration,
}

impl MetadataClient {
	pub fn new() -> Result<Self, MetadataError> {
		let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;
		Ok(Self {
			http_client,
			max_elapsed: Duration::from_secs(30),
		})
	}

	/// Upper bound on time spent retrying transient failures.
	pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
		self.max_elapsed = max_elapsed;
		self
	}

	/// GET `url` and decode its JSON body.
	///
	/// Connection failures and server errors are retried with exponential backoff; client errors
	/// and undecodable bodies are returned at once.
	pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, MetadataError> {
		let backoff = ExponentialBackoff {
			max_elapsed_time: Some(self.max_elapsed),
			..Default::default()
		};

		let value = retry(backoff, || async {
			let response = self.http_client.get(url).send().await.map_err(|e| {
				warn!("Metadata request to {} failed: {}", url, e);
				backoff::Error::transient(e)
			})?;

			if let Err(e) = response.error_for_status_ref() {
				let server_side = response.status().is_server_error();
				warn!("Metadata request to {} returned {}", url, response.status());
				return Err(if server_side {
					backoff::Error::transient(e)
				} else {
					backoff::Error::permanent(e)
				});
			}

			response
				.json::<T>()
				.await
				.map_err(backoff::Error::permanent)
		})
		.await?;

		debug!("Fetched metadata from {}", url);
		Ok(value)
	}

	/// Fetch the metadata of `token_id` given the collection's `BASE_URL()` result.
	pub async fn fetch_nft_metadata(
		&self,
		base_url: &[String],
		token_id: &str,
	) -> Result<NftMetadata, MetadataError> {
		let url = base_url
			.first()
			.and_then(|base| ipfs_key_url(&format!("{}{}", base, token_id)))
			.ok_or_else(|| MetadataError::MissingLocation(token_id.to_string()))?;
		self.get_json(&url).await
	}
}
