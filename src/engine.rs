//! The relay decision engine: admit or reject, then broadcast.
//!
//! Every purchase runs the same gauntlet, strictly in order: normalize the
//! price to exact minor units, place the permit if one came along, price the
//! platform fee in USD, dry-run the purchase for gas, read the current gas
//! price, and only broadcast when the fee clears the gas cost by a fixed
//! margin. The engine holds no per-request state and never retries.

use crate::chain::{Chain, PurchaseCall};
use crate::error::Error;
use crate::oracle::UsdRateSource;
use crate::schemas::{PermitAuthorization, PurchaseRequest};
use crate::units;
use ethers::types::{Address, TxHash, U256};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Minimum profit per relayed purchase, in USD. The gate is strict: a
/// purchase that only earns its own gas back is rejected.
pub const MIN_PROFIT_USD: f64 = 0.01;

/// Gas price assumed when the fee-data read fails: 0.1 gwei.
pub const DEFAULT_GAS_PRICE_WEI: u64 = 100_000_000;

/// What buyers pay with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentAsset {
    /// Chain-native currency; USD value comes from the oracle.
    Native,
    /// Stable-value ERC-20 with gasless approval; one whole token counts as
    /// one USD for the profitability comparison.
    Token { decimals: u32 },
}

impl PaymentAsset {
    pub fn decimals(&self) -> u32 {
        match self {
            PaymentAsset::Native => units::NATIVE_DECIMALS,
            PaymentAsset::Token { decimals } => *decimals,
        }
    }
}

/// One-shot gas figures for a specific purchase. Recomputed per request,
/// never cached: a stale estimate would make the profitability check unsafe.
#[derive(Debug, Clone, Copy)]
pub struct FeeEstimate {
    pub gas_units: U256,
    pub gas_price_wei: U256,
}

impl FeeEstimate {
    /// Total gas cost in wei; `None` on 256-bit overflow.
    pub fn cost_wei(&self) -> Option<U256> {
        self.gas_units.checked_mul(self.gas_price_wei)
    }
}

/// Outcome of the profitability comparison. Request-scoped; exists for the
/// log line and the rejection body, nothing persists it.
#[derive(Debug, Clone, Copy)]
pub struct ProfitabilityVerdict {
    pub admitted: bool,
    pub fee_earned_usd: f64,
    pub gas_cost_usd: f64,
}

/// Strict gate: relaying must clear the gas cost by at least the fixed
/// one-cent margin.
pub fn assess_profitability(fee_earned_usd: f64, gas_cost_usd: f64) -> ProfitabilityVerdict {
    ProfitabilityVerdict {
        admitted: gas_cost_usd <= fee_earned_usd - MIN_PROFIT_USD,
        fee_earned_usd,
        gas_cost_usd,
    }
}

/// Decides whether a purchase is worth relaying and broadcasts it when it is.
///
/// Constructed once from explicit parts; the custodial key lives inside the
/// chain client and never appears here.
pub struct RelayEngine {
    chain: Arc<dyn Chain>,
    oracle: Arc<dyn UsdRateSource>,
    fee_recipient: Address,
    fee_bps: u32,
    asset: PaymentAsset,
}

impl RelayEngine {
    pub fn new(
        chain: Arc<dyn Chain>,
        oracle: Arc<dyn UsdRateSource>,
        fee_recipient: Address,
        fee_bps: u32,
        asset: PaymentAsset,
    ) -> Self {
        Self {
            chain,
            oracle,
            fee_recipient,
            fee_bps,
            asset,
        }
    }

    /// Run one purchase through the gate. The first failing step wins; there
    /// are no retries and nothing is re-checked after the broadcast.
    pub async fn handle_purchase(&self, request: &PurchaseRequest) -> Result<TxHash, Error> {
        // 1. Exact integer minor units; reject rather than round.
        let price_minor =
            units::normalize_price(&request.price, self.asset.decimals()).map_err(Error::Input)?;

        // 2. A permit, when present, must be confirmed on-chain before
        // anything else is spent on this request.
        if let Some(permit) = &request.permit {
            self.place_permit(permit).await?;
        }

        // 3. Platform fee. Integer arithmetic for the on-chain amount,
        // decimals only for the USD comparison.
        let fee_minor = price_minor
            .checked_mul(U256::from(self.fee_bps))
            .ok_or_else(|| Error::Input("price too large".into()))?
            / U256::from(10_000u64);
        let price_units = units::to_decimal_units(price_minor, self.asset.decimals());
        let fee_fraction = f64::from(self.fee_bps) / 10_000.0;
        let rate = self.oracle.native_usd_rate().await;
        let fee_earned_usd = match self.asset {
            PaymentAsset::Native => price_units * rate * fee_fraction,
            PaymentAsset::Token { .. } => price_units * fee_fraction,
        };

        // 4. Dry-run with the exact arguments the broadcast would use.
        let call = PurchaseCall {
            slug: request.slug.clone(),
            buyer: request.user_address,
            fee_recipient: self.fee_recipient,
            fee_bps: self.fee_bps,
            value_wei: match self.asset {
                PaymentAsset::Native => price_minor,
                PaymentAsset::Token { .. } => U256::zero(),
            },
        };
        let gas_units = self.chain.estimate_purchase_gas(&call).await?;

        // 5. Current gas price; a failed read degrades to the conservative
        // default instead of failing the request.
        let gas_price_wei = match self.chain.gas_price().await {
            Ok(price) => price,
            Err(e) => {
                warn!(error = %e, "Fee data unavailable, assuming default gas price");
                U256::from(DEFAULT_GAS_PRICE_WEI)
            }
        };
        let estimate = FeeEstimate {
            gas_units,
            gas_price_wei,
        };

        // 6. Gas cost in USD.
        let gas_cost_wei = estimate
            .cost_wei()
            .ok_or_else(|| Error::Rpc("gas cost overflows 256 bits".into()))?;
        let gas_cost_usd = units::to_decimal_units(gas_cost_wei, units::NATIVE_DECIMALS) * rate;

        // 7. The kill switch.
        let verdict = assess_profitability(fee_earned_usd, gas_cost_usd);
        info!(
            slug = %request.slug,
            fee_earned_usd = verdict.fee_earned_usd,
            gas_cost_usd = verdict.gas_cost_usd,
            admitted = verdict.admitted,
            fee_minor = %fee_minor,
            gas_units = %estimate.gas_units,
            gas_price_wei = %estimate.gas_price_wei,
            "Relay economics"
        );
        if !verdict.admitted {
            return Err(Error::Economic {
                fee_earned_usd,
                gas_cost_usd,
            });
        }

        // 8. Broadcast and hand back the hash without waiting for inclusion.
        self.chain.submit_purchase(&call).await
    }

    async fn place_permit(&self, permit: &PermitAuthorization) -> Result<(), Error> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        if permit.deadline <= now {
            return Err(Error::Permit(format!(
                "permit expired at {} (now {now})",
                permit.deadline
            )));
        }
        self.chain.submit_permit(permit).await
    }
}
