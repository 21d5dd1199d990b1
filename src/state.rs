//! Application state shared across handlers.

use crate::chain::{Chain, EthersChain};
use crate::config::Config;
use crate::engine::{PaymentAsset, RelayEngine};
use crate::oracle::{PriceFeed, UsdRateSource};
use ethers::signers::LocalWallet;
use ethers::types::Address;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub chain: Arc<dyn Chain>,
    pub engine: RelayEngine,
    pub relayer_address: Address,
    pub start_time: Instant,
    pub request_count: AtomicU64,
}

impl AppState {
    /// Create application state from configuration. Loads the custodial key
    /// from `RELAYER_PRIVATE_KEY`; the key never appears in config files or
    /// responses.
    pub fn new(config: Config) -> Result<Self, crate::Error> {
        let key = std::env::var("RELAYER_PRIVATE_KEY")
            .map_err(|_| crate::Error::Config("RELAYER_PRIVATE_KEY is not set".into()))?;
        let wallet: LocalWallet = key
            .trim()
            .parse()
            .map_err(|e| crate::Error::Config(format!("invalid relay key: {e}")))?;

        let contract = parse_address(&config.contract_address, "contract_address")?;
        let token = config
            .payment_token
            .as_deref()
            .map(|addr| parse_address(addr, "payment_token"))
            .transpose()?;

        let ethers_chain =
            EthersChain::new(&config.rpc_url, config.chain_id, wallet, contract, token)?;
        let relayer_address = ethers_chain.relayer_address();
        info!(relayer = %format!("{relayer_address:#x}"), "Loaded relay key");

        let chain: Arc<dyn Chain> = Arc::new(ethers_chain);
        let oracle: Arc<dyn UsdRateSource> = Arc::new(PriceFeed::new(&config.price_feed_url)?);

        Self::with_parts(config, chain, oracle, relayer_address)
    }

    /// Assemble state from explicit parts. This is the injection seam: tests
    /// swap in a fake chain and a fixed rate here.
    pub fn with_parts(
        config: Config,
        chain: Arc<dyn Chain>,
        oracle: Arc<dyn UsdRateSource>,
        relayer_address: Address,
    ) -> Result<Self, crate::Error> {
        let fee_recipient = parse_address(&config.fee_recipient, "fee_recipient")?;
        let asset = match config.payment_token {
            Some(_) => PaymentAsset::Token {
                decimals: config.token_decimals,
            },
            None => PaymentAsset::Native,
        };
        let engine = RelayEngine::new(
            Arc::clone(&chain),
            oracle,
            fee_recipient,
            config.fee_bps,
            asset,
        );

        Ok(Self {
            config,
            chain,
            engine,
            relayer_address,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
        })
    }
}

fn parse_address(value: &str, what: &str) -> Result<Address, crate::Error> {
    if value.is_empty() {
        return Err(crate::Error::Config(format!("{what} is not configured")));
    }
    value
        .parse()
        .map_err(|e| crate::Error::Config(format!("invalid {what}: {e}")))
}
