//! Relay service configuration.

use serde::Deserialize;

/// Configuration for the relay service.
///
/// The custodial signing key is deliberately not part of this struct; it is
/// read from the `RELAYER_PRIVATE_KEY` environment variable at startup and
/// never travels through config files.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "defaults::rpc_url")]
    pub rpc_url: String,

    #[serde(default = "defaults::chain_id")]
    pub chain_id: u64,

    /// LinkLockr market contract.
    #[serde(default)]
    pub contract_address: String,

    /// Where the platform's cut of each purchase goes.
    #[serde(default)]
    pub fee_recipient: String,

    /// Platform fee in basis points (500 = 5%).
    #[serde(default = "defaults::fee_bps")]
    pub fee_bps: u32,

    #[serde(default = "defaults::price_feed_url")]
    pub price_feed_url: String,

    #[serde(default = "defaults::bind_address")]
    pub bind_address: String,

    /// Stable-token payments: ERC-20 contract accepting ERC-2612 permits.
    /// Unset means purchases are priced in the native currency.
    #[serde(default)]
    pub payment_token: Option<String>,

    #[serde(default = "defaults::token_decimals")]
    pub token_decimals: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: defaults::rpc_url(),
            chain_id: defaults::chain_id(),
            contract_address: String::new(),
            fee_recipient: String::new(),
            fee_bps: defaults::fee_bps(),
            price_feed_url: defaults::price_feed_url(),
            bind_address: defaults::bind_address(),
            payment_token: None,
            token_decimals: defaults::token_decimals(),
        }
    }
}

mod defaults {
    pub fn rpc_url() -> String {
        "https://mainnet.base.org".into()
    }

    pub fn chain_id() -> u64 {
        8453
    }

    pub fn fee_bps() -> u32 {
        500
    }

    pub fn price_feed_url() -> String {
        "https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=usd".into()
    }

    pub fn bind_address() -> String {
        "0.0.0.0:3040".into()
    }

    pub fn token_decimals() -> u32 {
        6
    }
}
