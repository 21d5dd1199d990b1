//! Wire schema of the relay endpoint.

use ethers::types::{Address, H256, U256};
use serde::Deserialize;

/// Body of `POST /relay`.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    /// Catalog identifier of the link being bought.
    pub slug: String,
    /// Buyer wallet; receives the unlock token.
    #[serde(rename = "userAddress")]
    pub user_address: Address,
    pub price: PriceInput,
    /// Present only for stable-token purchases with gasless approval.
    #[serde(default)]
    pub permit: Option<PermitAuthorization>,
}

/// Price as the storefront sends it.
///
/// A string containing a `.` or an exponent is a decimal amount in whole
/// asset units; a bare integer string or JSON integer is already in minor
/// units. Integer prices above `u64::MAX` must be sent as strings, since a
/// JSON number that large only survives transport as a float.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
    Number(serde_json::Number),
    Text(String),
}

/// ERC-2612 gasless approval, signed once client-side, spendable at most
/// once on-chain.
#[derive(Debug, Clone, Deserialize)]
pub struct PermitAuthorization {
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    /// Unix seconds; the permit is dead past this moment.
    pub deadline: u64,
    pub v: u8,
    pub r: H256,
    pub s: H256,
}
