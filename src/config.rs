//! Network and contract configuration.
//!
//! Each [`Network`] carries its node endpoint, block explorer and contract addresses. The
//! defaults can be overridden through environment variables read by [`AppConfig::from_env`].

use crate::abi::{AbiError, Fragment, is_valid_address, parse_abi};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// The all-zero user address, used by the marketplace as "nobody".
pub const ZERO_ADDRESS: &str = "vite_0000000000000000000000000000000000000000a4f3a0cb58";
/// The native VITE token.
pub const VITE_TOKEN_ID: &str = "tti_5649544520544f4b454e6e40";
/// Default delay between a successful send and the `Sent` status.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(2000);

const BAYC_ABI_JSON: &str = include_str!("../abi/bayc.json");
const MARKETPLACE_ABI_JSON: &str = include_str!("../abi/marketplace.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
	Testnet,
	Localnet,
}

impl Network {
	/// WebSocket endpoint of the public node for this network.
	pub fn provider_url(self) -> &'static str {
		match self {
			Network::Testnet => "wss://buidl.vite.net/gvite/ws",
			Network::Localnet => "ws://0.0.0.0:23457",
		}
	}

	/// Block explorer base URL; append `/tx/<hash>` or `/account/<address>`.
	pub fn explorer_url(self) -> &'static str {
		match self {
			Network::Testnet => "https://buidl.viteview.xyz/#",
			Network::Localnet => "https://viteview.xyz/#",
		}
	}

	pub fn bayc_contract_address(self) -> &'static str {
		match self {
			Network::Testnet => "vite_a6b7ca14d5ce26c7f0356b2b128ef5769356d9aa727acb4542",
			Network::Localnet => "vite_129c940d475daf59569437bffb701e1b078daad68d78e58489",
		}
	}

	/// The marketplace is deployed at the collection address on both networks.
	pub fn marketplace_contract_address(self) -> &'static str {
		self.bayc_contract_address()
	}

	pub fn transaction_url(self, hash: &str) -> String {
		format!("{}/tx/{}", self.explorer_url(), hash)
	}
}

impl Default for Network {
	fn default() -> Self {
		if cfg!(debug_assertions) {
			Network::Localnet
		} else {
			Network::Testnet
		}
	}
}

impl FromStr for Network {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"testnet" => Ok(Network::Testnet),
			"localnet" => Ok(Network::Localnet),
			other => Err(ConfigError::InvalidValue {
				key: "VITE_NETWORK",
				value: other.to_string(),
			}),
		}
	}
}

/// Which [`Wallet`](crate::wallet::Wallet) implementation backs transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WalletBackend {
	/// Local key signer
	#[default]
	PrivateKey,
	/// Interactive session with a mobile wallet through the bridge
	Connect,
}

impl FromStr for WalletBackend {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"privatekey" | "private-key" | "private_key" => Ok(WalletBackend::PrivateKey),
			"connect" | "vite-connect" => Ok(WalletBackend::Connect),
			other => Err(ConfigError::InvalidValue {
				key: "VITE_WALLET_BACKEND",
				value: other.to_string(),
			}),
		}
	}
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
	pub network: Network,
	pub provider_url: String,
	pub bayc_contract_address: String,
	pub marketplace_contract_address: String,
	/// Token whose market activity the demo binary follows
	pub token_id: String,
	pub wallet_backend: WalletBackend,
}

impl AppConfig {
	/// Defaults for `network`.
	pub fn for_network(network: Network) -> Self {
		Self {
			network,
			provider_url: network.provider_url().to_string(),
			bayc_contract_address: network.bayc_contract_address().to_string(),
			marketplace_contract_address: network.marketplace_contract_address().to_string(),
			token_id: "0".to_string(),
			wallet_backend: WalletBackend::default(),
		}
	}

	/// Load configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Load configuration from an arbitrary key lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let network = match lookup("VITE_NETWORK") {
			Some(value) => value.parse()?,
			None => Network::default(),
		};
		let mut config = Self::for_network(network);

		if let Some(url) = lookup("VITE_PROVIDER_URL") {
			if !(url.starts_with("ws://") || url.starts_with("wss://")) {
				return Err(ConfigError::InvalidValue {
					key: "VITE_PROVIDER_URL",
					value: url,
				});
			}
			config.provider_url = url;
		}
		if let Some(address) = lookup("VITE_CONTRACT_ADDRESS") {
			if !is_valid_address(&address) {
				return Err(ConfigError::InvalidValue {
					key: "VITE_CONTRACT_ADDRESS",
					value: address,
				});
			}
			config.bayc_contract_address = address.clone();
			config.marketplace_contract_address = address;
		}
		if let Some(token_id) = lookup("VITE_TOKEN_ID_WATCH") {
			if token_id.is_empty() || !token_id.chars().all(|c| c.is_ascii_digit()) {
				return Err(ConfigError::InvalidValue {
					key: "VITE_TOKEN_ID_WATCH",
					value: token_id,
				});
			}
			config.token_id = token_id;
		}
		if let Some(backend) = lookup("VITE_WALLET_BACKEND") {
			config.wallet_backend = backend.parse()?;
		}

		Ok(config)
	}
}

/// ABI of the BAYC collection contract.
pub fn bayc_abi() -> Result<Vec<Fragment>, ConfigError> {
	Ok(parse_abi(BAYC_ABI_JSON)?)
}

/// ABI of the marketplace contract.
pub fn marketplace_abi() -> Result<Vec<Fragment>, ConfigError> {
	Ok(parse_abi(MARKETPLACE_ABI_JSON)?)
}

/// Load an ABI from a JSON file.
pub fn load_abi(path: impl AsRef<Path>) -> Result<Vec<Fragment>, ConfigError> {
	let json = std::fs::read_to_string(path)?;
	Ok(parse_abi(&json)?)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Invalid value for {key}: {value}")]
	InvalidValue { key: &'static str, value: String },

	#[error("ABI error: {0}")]
	AbiError(#[from] AbiError),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}
