use serde::{Deserialize, Serialize};

pub const TRANSFER: &str = "Transfer";
pub const APPROVAL_FOR_ALL: &str = "ApprovalForAll";
pub const OFFER_UPDATED: &str = "OfferUpdated";
pub const BID_UPDATED: &str = "BidUpdated";
pub const TRADED: &str = "Traded";

/// Ownership change of a collection token; minting comes from the zero address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEvent {
	pub from: String,
	pub to: String,
	pub token_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalForAllEvent {
	pub owner: String,
	pub operator: String,
	/// `"1"` or `"0"`
	pub approved: String,
}

/// A token was listed, re-priced or delisted (zero offeror)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferUpdatedEvent {
	pub token_id: String,
	pub offeror: String,
	pub minimum_offer: String,
}

/// A bid was placed, raised or revoked (zero bidder)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidUpdatedEvent {
	pub token_id: String,
	pub bidder: String,
	pub locked_bid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradedEvent {
	pub token_id: String,
	pub value: String,
	pub offeror: String,
	pub bidder: String,
}
