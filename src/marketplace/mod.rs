//! NFT collection and marketplace domain.
//!
//! Typed event records for the watchers, views derived from them (activity feed, bid book,
//! minted tokens) and builders for every call a wallet can send.

mod calls;
pub mod events;
mod market;

pub use calls::{MINT_PRICE, MarketError, MarketplaceCalls};
pub use events::{
	ApprovalForAllEvent, BidUpdatedEvent, OfferUpdatedEvent, TradedEvent, TransferEvent,
};
pub use market::{
	Activity, ActivityKind, BidEntry, TokenMarket, activity_history, bid_book, bids_for_token,
	has_own_bid, is_approved_for_all, metadata_url, minted_token_ids, offers_for_token,
	trades_for_token,
};
