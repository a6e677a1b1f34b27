//! Views derived from marketplace state and event history.

use super::events::{BidUpdatedEvent, OfferUpdatedEvent, TradedEvent, TransferEvent};
use crate::config::ZERO_ADDRESS;
use crate::sync::{DataLog, LogPredicate};
use crate::utils::{VITE_DECIMALS, format_units};

use itertools::Itertools;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Current market of one token as returned by `tokenMarkets(tokenId)`.
///
/// Deserializes directly from the call's output array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMarket {
	pub offeror: String,
	pub minimum_offer: String,
	pub bidder: String,
	pub locked_bid: String,
}

impl TokenMarket {
	/// Build from `[offeror, minimumOffer, bidder, lockedBid]`.
	pub fn from_state(state: &[String]) -> Option<Self> {
		match state {
			[offeror, minimum_offer, bidder, locked_bid, ..] => Some(Self {
				offeror: offeror.clone(),
				minimum_offer: minimum_offer.clone(),
				bidder: bidder.clone(),
				locked_bid: locked_bid.clone(),
			}),
			_ => None,
		}
	}

	pub fn has_offer(&self) -> bool {
		self.offeror != ZERO_ADDRESS
	}

	pub fn has_bid(&self) -> bool {
		self.bidder != ZERO_ADDRESS
	}
}

/// Offers on `token_id`, excluding delistings.
pub fn offers_for_token(token_id: &str) -> LogPredicate<OfferUpdatedEvent> {
	let token_id = token_id.to_string();
	Arc::new(move |log: &DataLog<OfferUpdatedEvent>| {
		log.data.token_id == token_id && log.data.offeror != ZERO_ADDRESS
	})
}

/// Bids on `token_id`, excluding revocations.
pub fn bids_for_token(token_id: &str) -> LogPredicate<BidUpdatedEvent> {
	let token_id = token_id.to_string();
	Arc::new(move |log: &DataLog<BidUpdatedEvent>| {
		log.data.token_id == token_id && log.data.bidder != ZERO_ADDRESS
	})
}

pub fn trades_for_token(token_id: &str) -> LogPredicate<TradedEvent> {
	let token_id = token_id.to_string();
	Arc::new(move |log: &DataLog<TradedEvent>| log.data.token_id == token_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityKind {
	Offer {
		offeror: String,
		minimum_offer: String,
	},
	Bid {
		bidder: String,
		locked_bid: String,
	},
	Trade {
		offeror: String,
		bidder: String,
		value: String,
	},
}

/// One line of a token's activity feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
	/// `offer-<hash>`, `bid-<hash>` or `trade-<hash>`
	pub id: String,
	pub height: u64,
	pub kind: ActivityKind,
}

impl Activity {
	pub fn describe(&self) -> String {
		let amount = |value: &str| {
			format_units(value, VITE_DECIMALS, 2).unwrap_or_else(|_| value.to_string())
		};
		match &self.kind {
			ActivityKind::Offer {
				offeror,
				minimum_offer,
			} => format!("Offer {} VITE from {}", amount(minimum_offer), offeror),
			ActivityKind::Bid { bidder, locked_bid } => {
				format!("Bid {} VITE by {}", amount(locked_bid), bidder)
			}
			ActivityKind::Trade {
				offeror, bidder, ..
			} => format!("Traded {} -> {}", offeror, bidder),
		}
	}
}

/// Merge offers, bids and trades into one feed, highest block first.
///
/// Entries at the same height keep the order offers, bids, trades.
pub fn activity_history(
	offers: &[DataLog<OfferUpdatedEvent>],
	bids: &[DataLog<BidUpdatedEvent>],
	trades: &[DataLog<TradedEvent>],
) -> Vec<Activity> {
	let offers = offers.iter().map(|log| Activity {
		id: format!("offer-{}", log.log.account_block_hash),
		height: log.log.height(),
		kind: ActivityKind::Offer {
			offeror: log.data.offeror.clone(),
			minimum_offer: log.data.minimum_offer.clone(),
		},
	});
	let bids = bids.iter().map(|log| Activity {
		id: format!("bid-{}", log.log.account_block_hash),
		height: log.log.height(),
		kind: ActivityKind::Bid {
			bidder: log.data.bidder.clone(),
			locked_bid: log.data.locked_bid.clone(),
		},
	});
	let trades = trades.iter().map(|log| Activity {
		id: format!("trade-{}", log.log.account_block_hash),
		height: log.log.height(),
		kind: ActivityKind::Trade {
			offeror: log.data.offeror.clone(),
			bidder: log.data.bidder.clone(),
			value: log.data.value.clone(),
		},
	});

	let mut feed: Vec<Activity> = offers.chain(bids).chain(trades).collect();
	feed.sort_by(|a, b| b.height.cmp(&a.height));
	feed
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidEntry {
	pub bidder: String,
	pub locked_bid: BigUint,
}

/// One entry per bidder, highest locked bid first.
///
/// When a bidder appears several times the entry earliest in `bids` wins.
pub fn bid_book(bids: &[DataLog<BidUpdatedEvent>]) -> Vec<BidEntry> {
	let mut book: Vec<BidEntry> = Vec::new();
	for log in bids.iter().rev() {
		let locked_bid =
			BigUint::parse_bytes(log.data.locked_bid.as_bytes(), 10).unwrap_or_default();
		match book.iter_mut().find(|entry| entry.bidder == log.data.bidder) {
			Some(entry) => entry.locked_bid = locked_bid,
			None => book.push(BidEntry {
				bidder: log.data.bidder.clone(),
				locked_bid,
			}),
		}
	}
	book.sort_by(|a, b| b.locked_bid.cmp(&a.locked_bid));
	book
}

/// Whether `wallet` already holds a bid in `book`, in which case a new bid raises it.
pub fn has_own_bid(book: &[BidEntry], wallet: Option<&str>, market: Option<&TokenMarket>) -> bool {
	let Some(wallet) = wallet else {
		return false;
	};
	market.is_some_and(TokenMarket::has_bid)
		&& book
			.iter()
			.any(|entry| entry.bidder.eq_ignore_ascii_case(wallet))
}

/// Distinct token ids seen in transfers, in first-seen order.
pub fn minted_token_ids(transfers: &[DataLog<TransferEvent>]) -> Vec<String> {
	transfers
		.iter()
		.map(|log| log.data.token_id.clone())
		.unique()
		.collect()
}

/// Metadata location of `token_id` given the `BASE_URL()` result.
pub fn metadata_url(base_url: &[String], token_id: &str) -> Option<String> {
	base_url.first().map(|base| format!("{}{}", base, token_id))
}

/// Interpret the `isApprovedForAll` result.
pub fn is_approved_for_all(result: &[String]) -> bool {
	result.first().is_some_and(|approved| approved == "1")
}
