//! Transaction descriptors for the collection and marketplace contracts.

use super::market::TokenMarket;
use crate::abi::{AbiError, Fragment};
use crate::config::VITE_TOKEN_ID;
use crate::utils::{UnitsError, VITE_DECIMALS, parse_units};
use crate::wallet::TransactionDescriptor;

use serde_json::{Value, json};
use std::sync::Arc;

/// Price of one mint, in VITE base units.
pub const MINT_PRICE: &str = "1000000000000000000";

#[derive(Debug, thiserror::Error)]
pub enum MarketError {
	#[error("Abi error: {0}")]
	AbiError(#[from] AbiError),

	#[error("Invalid price: {0}")]
	UnitsError(#[from] UnitsError),
}

/// Builds the calls a wallet can make against one collection and its marketplace.
#[derive(Clone)]
pub struct MarketplaceCalls {
	wallet_address: Option<String>,
	bayc_address: String,
	marketplace_address: String,
	bayc_abi: Arc<Vec<Fragment>>,
	marketplace_abi: Arc<Vec<Fragment>>,
}

impl MarketplaceCalls {
	pub fn new(
		bayc_address: &str,
		marketplace_address: &str,
		bayc_abi: Arc<Vec<Fragment>>,
		marketplace_abi: Arc<Vec<Fragment>>,
	) -> Self {
		Self {
			wallet_address: None,
			bayc_address: bayc_address.to_string(),
			marketplace_address: marketplace_address.to_string(),
			bayc_abi,
			marketplace_abi,
		}
	}

	pub fn with_wallet(mut self, wallet_address: Option<String>) -> Self {
		self.wallet_address = wallet_address;
		self
	}

	fn market_call(&self, method: &str, params: Vec<Value>) -> Result<TransactionDescriptor, MarketError> {
		Ok(TransactionDescriptor::call_contract(
			self.wallet_address.as_deref(),
			&self.marketplace_address,
			&self.marketplace_abi,
			method,
			params,
		)?)
	}

	fn collection_call(&self, method: &str, params: Vec<Value>) -> Result<TransactionDescriptor, MarketError> {
		Ok(TransactionDescriptor::call_contract(
			self.wallet_address.as_deref(),
			&self.bayc_address,
			&self.bayc_abi,
			method,
			params,
		)?)
	}

	/// List `token_id` for at least `price` VITE.
	pub fn offer(&self, token_id: &str, price: &str) -> Result<TransactionDescriptor, MarketError> {
		let minimum_offer = parse_units(price, VITE_DECIMALS)?;
		self.market_call("offer", vec![json!(token_id), json!(minimum_offer.to_string())])
	}

	pub fn revoke_offer(&self, token_id: &str) -> Result<TransactionDescriptor, MarketError> {
		self.market_call("revokeOffer", vec![json!(token_id)])
	}

	/// Lock `price` VITE as a bid; raises the existing bid when `increase` is set.
	pub fn bid(&self, token_id: &str, price: &str, increase: bool) -> Result<TransactionDescriptor, MarketError> {
		let amount = parse_units(price, VITE_DECIMALS)?;
		let method = if increase { "bidIncrease" } else { "bid" };
		Ok(self
			.market_call(method, vec![json!(token_id)])?
			.with_transfer(VITE_TOKEN_ID, amount.to_string()))
	}

	pub fn revoke_bid(&self, token_id: &str) -> Result<TransactionDescriptor, MarketError> {
		self.market_call("revokeBid", vec![json!(token_id)])
	}

	/// Pay the listed price. `None` when the token has no offer.
	pub fn buy(
		&self,
		token_id: &str,
		market: Option<&TokenMarket>,
	) -> Result<Option<TransactionDescriptor>, MarketError> {
		let Some(market) = market.filter(|m| m.has_offer()) else {
			return Ok(None);
		};
		let descriptor = self
			.market_call("bid", vec![json!(token_id)])?
			.with_transfer(VITE_TOKEN_ID, market.minimum_offer.clone());
		Ok(Some(descriptor))
	}

	/// Sell to the current bidder at the locked bid. `None` when there is no bid.
	pub fn accept_bid(
		&self,
		token_id: &str,
		market: Option<&TokenMarket>,
	) -> Result<Option<TransactionDescriptor>, MarketError> {
		let Some(market) = market.filter(|m| m.has_bid()) else {
			return Ok(None);
		};
		let descriptor = self.market_call(
			"offer",
			vec![json!(token_id), json!(market.locked_bid.clone())],
		)?;
		Ok(Some(descriptor))
	}

	/// Let the marketplace move the wallet's tokens.
	pub fn set_approval_for_all(&self) -> Result<TransactionDescriptor, MarketError> {
		self.collection_call(
			"setApprovalForAll",
			vec![json!(self.marketplace_address), json!(true)],
		)
	}

	/// Mint `token_id` for [`MINT_PRICE`]. `None` without a wallet address.
	pub fn mint(&self, token_id: &str) -> Result<Option<TransactionDescriptor>, MarketError> {
		if self.wallet_address.is_none() || token_id.is_empty() {
			return Ok(None);
		}
		let descriptor = self
			.collection_call("safeMint", vec![json!(token_id)])?
			.with_transfer(VITE_TOKEN_ID, MINT_PRICE);
		Ok(Some(descriptor))
	}
}
