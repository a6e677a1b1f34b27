use std::sync::Arc;
use tracing::{error, info, warn};

use vite_nft_sync::config::{AppConfig, ConfigError, bayc_abi, marketplace_abi};
use vite_nft_sync::marketplace::{
	self, BidUpdatedEvent, MarketError, MarketplaceCalls, OfferUpdatedEvent, TokenMarket,
	TradedEvent, TransferEvent,
};
use vite_nft_sync::metadata::{MetadataClient, MetadataError};
use vite_nft_sync::provider::{Provider, ProviderError, WsProvider};
use vite_nft_sync::sync::{ContractStateReader, LogQuery, StateQuery, VmLogWatcher};
use vite_nft_sync::utils::{VITE_DECIMALS, format_units};
use vite_nft_sync::wallet::{Wallet, WalletError, select_wallet};

#[derive(Debug, thiserror::Error)]
enum AppError {
	#[error("Config error: {0}")]
	ConfigError(#[from] ConfigError),

	#[error("Provider error: {0}")]
	ProviderError(#[from] ProviderError),

	#[error("Wallet error: {0}")]
	WalletError(#[from] WalletError),

	#[error("Market error: {0}")]
	MarketError(#[from] MarketError),

	#[error("Metadata error: {0}")]
	MetadataError(#[from] MetadataError),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	if let Err(e) = run().await {
		error!("{}", e);
	}
}

async fn run() -> Result<(), AppError> {
	let config = AppConfig::from_env()?;
	info!(
		"Following token {} on {:?} via {}",
		config.token_id, config.network, config.provider_url
	);

	let provider: Arc<dyn Provider> = Arc::new(WsProvider::connect(&config.provider_url).await?);
	let wallet = select_wallet(config.wallet_backend, provider.clone(), None, None)?;
	wallet.connect().await?;
	let wallet_address = wallet.address();
	match &wallet_address {
		Some(address) => info!("Wallet address: {}", address),
		None => info!("No wallet address, running read-only"),
	}

	let bayc_abi = Arc::new(bayc_abi()?);
	let marketplace_abi = Arc::new(marketplace_abi()?);
	let token_id = config.token_id.clone();

	let mut base_url = ContractStateReader::<Vec<String>>::new(provider.clone());
	base_url
		.activate(StateQuery::new(
			&config.bayc_contract_address,
			bayc_abi.clone(),
			"BASE_URL",
		))
		.await;

	let mut market = ContractStateReader::<TokenMarket>::new(provider.clone());
	market
		.activate(
			StateQuery::new(
				&config.marketplace_contract_address,
				marketplace_abi.clone(),
				"tokenMarkets",
			)
			.with_params(Some(vec![token_id.clone().into()]))
			.watching([
				marketplace::events::OFFER_UPDATED,
				marketplace::events::BID_UPDATED,
				marketplace::events::TRADED,
			]),
		)
		.await;

	let mut approval = ContractStateReader::<Vec<String>>::new(provider.clone());
	approval
		.activate(
			StateQuery::new(
				&config.bayc_contract_address,
				bayc_abi.clone(),
				"isApprovedForAll",
			)
			.with_params(wallet_address.as_ref().map(|address| {
				vec![
					address.clone().into(),
					config.marketplace_contract_address.clone().into(),
				]
			}))
			.watching([marketplace::events::APPROVAL_FOR_ALL]),
		)
		.await;

	let mut offers = VmLogWatcher::<OfferUpdatedEvent>::spawn(
		provider.clone(),
		LogQuery::new(
			&config.marketplace_contract_address,
			marketplace_abi.clone(),
			marketplace::events::OFFER_UPDATED,
		),
		Some(marketplace::offers_for_token(&token_id)),
	);
	let mut bids = VmLogWatcher::<BidUpdatedEvent>::spawn(
		provider.clone(),
		LogQuery::new(
			&config.marketplace_contract_address,
			marketplace_abi.clone(),
			marketplace::events::BID_UPDATED,
		),
		Some(marketplace::bids_for_token(&token_id)),
	);
	let mut trades = VmLogWatcher::<TradedEvent>::spawn(
		provider.clone(),
		LogQuery::new(
			&config.marketplace_contract_address,
			marketplace_abi.clone(),
			marketplace::events::TRADED,
		),
		Some(marketplace::trades_for_token(&token_id)),
	);
	let mut transfers = VmLogWatcher::<TransferEvent>::spawn(
		provider.clone(),
		LogQuery::new(
			&config.bayc_contract_address,
			bayc_abi.clone(),
			marketplace::events::TRANSFER,
		),
		None,
	);

	let calls = MarketplaceCalls::new(
		&config.bayc_contract_address,
		&config.marketplace_contract_address,
		bayc_abi.clone(),
		marketplace_abi.clone(),
	)
	.with_wallet(wallet_address.clone());

	let metadata = MetadataClient::new()?;
	let mut base_url_rx = base_url.subscribe();
	let mut market_rx = market.subscribe();
	let mut approval_rx = approval.subscribe();
	let mut metadata_fetched = false;

	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				info!("Shutting down");
				break;
			}
			Ok(()) = base_url_rx.changed() => {
				if metadata_fetched {
					continue;
				}
				let Some(base) = base_url.value() else { continue };
				info!("Metadata location: {:?}", marketplace::metadata_url(&base, &token_id));
				match metadata.fetch_nft_metadata(&base, &token_id).await {
					Ok(nft) => {
						metadata_fetched = true;
						info!("Image: {}", nft.image_url().unwrap_or_default());
						for attribute in &nft.attributes {
							info!("  {}: {}", attribute.trait_type, attribute.value);
						}
					}
					Err(e) => warn!("Failed to fetch metadata: {}", e),
				}
			}
			Ok(()) = market_rx.changed() => {}
			Ok(()) = approval_rx.changed() => {
				if let Some(result) = approval.value() {
					info!("Marketplace approved: {}", marketplace::is_approved_for_all(&result));
				}
			}
			changed = offers.changed(), if offers.is_active() => {
				if !changed { offers.stop().await; }
			}
			changed = bids.changed(), if bids.is_active() => {
				if !changed { bids.stop().await; }
			}
			changed = trades.changed(), if trades.is_active() => {
				if !changed { trades.stop().await; }
			}
			changed = transfers.changed(), if transfers.is_active() => {
				if !changed { transfers.stop().await; }
				info!(
					"Minted tokens: {}",
					marketplace::minted_token_ids(&transfers.all_logs()).len()
				);
				continue;
			}
		}

		report(
			&token_id,
			market.value(),
			&offers,
			&bids,
			&trades,
			&calls,
			wallet_address.as_deref(),
		)?;
	}

	offers.stop().await;
	bids.stop().await;
	trades.stop().await;
	transfers.stop().await;
	base_url.deactivate().await;
	market.deactivate().await;
	approval.deactivate().await;
	Ok(())
}

fn report(
	token_id: &str,
	market: Option<TokenMarket>,
	offers: &VmLogWatcher<OfferUpdatedEvent>,
	bids: &VmLogWatcher<BidUpdatedEvent>,
	trades: &VmLogWatcher<TradedEvent>,
	calls: &MarketplaceCalls,
	wallet_address: Option<&str>,
) -> Result<(), AppError> {
	let vite = |value: &str| format_units(value, VITE_DECIMALS, 2).unwrap_or_else(|_| value.to_string());

	if let Some(market) = &market {
		if market.has_offer() {
			info!("Token {} listed at {} VITE by {}", token_id, vite(&market.minimum_offer), market.offeror);
		}
		if market.has_bid() {
			info!("Highest bid {} VITE by {}", vite(&market.locked_bid), market.bidder);
		}
	}

	let bids = bids.logs();
	let book = marketplace::bid_book(&bids);
	for entry in &book {
		info!("  bid {} VITE from {}", vite(&entry.locked_bid.to_string()), entry.bidder);
	}

	for activity in marketplace::activity_history(&offers.logs(), &bids, &trades.logs()) {
		info!("  #{} {}", activity.height, activity.describe());
	}

	let own_bid = marketplace::has_own_bid(&book, wallet_address, market.as_ref());
	if calls.buy(token_id, market.as_ref())?.is_some() {
		info!("Token {} can be bought", token_id);
	}
	if calls.accept_bid(token_id, market.as_ref())?.is_some() {
		info!("Token {} has a bid to accept", token_id);
	}
	if own_bid {
		info!("Connected wallet already bids on token {}", token_id);
	}
	Ok(())
}
