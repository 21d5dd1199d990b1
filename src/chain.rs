//! On-chain access behind a trait, so the decision engine can be tested
//! against a fake chain.

use crate::error::Error;
use crate::schemas::PermitAuthorization;
use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::contract::builders::ContractCall;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, TxHash, U256};
use std::sync::Arc;
use std::time::Duration;

abigen!(
    LinkMarket,
    r#"[
        function buyLink(string slug, address recipient, address feeRecipient, uint256 feeBps) external payable
    ]"#
);

abigen!(
    PermitToken,
    r#"[
        function permit(address owner, address spender, uint256 value, uint256 deadline, uint8 v, bytes32 r, bytes32 s) external
    ]"#
);

const RPC_TIMEOUT: Duration = Duration::from_secs(10);
const PERMIT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

/// Fully resolved arguments of one on-chain purchase. Built once per request
/// and reused verbatim for the dry run and the broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseCall {
    pub slug: String,
    pub buyer: Address,
    pub fee_recipient: Address,
    pub fee_bps: u32,
    /// Native value attached to the call; zero for token purchases.
    pub value_wei: U256,
}

/// Receipt outcome of a broadcast transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Pending,
    Success,
    Reverted,
}

/// The on-chain operations the relay needs, and nothing else.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Chain: Send + Sync {
    /// Dry-run the purchase and return the gas it would take. A revert here
    /// (sold out, paused, insufficient allowance) fails the request.
    async fn estimate_purchase_gas(&self, call: &PurchaseCall) -> Result<U256, Error>;

    /// Current network gas price in wei.
    async fn gas_price(&self) -> Result<U256, Error>;

    /// Place a permit on-chain and wait for it to confirm.
    async fn submit_permit(&self, permit: &PermitAuthorization) -> Result<(), Error>;

    /// Broadcast the purchase; returns as soon as the node accepts it.
    async fn submit_purchase(&self, call: &PurchaseCall) -> Result<TxHash, Error>;

    /// Receipt status of an earlier broadcast.
    async fn receipt_status(&self, tx: TxHash) -> Result<TxOutcome, Error>;

    /// Current chain head, used by the health probe.
    async fn block_number(&self) -> Result<u64, Error>;
}

type RelayClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Production chain client: JSON-RPC provider plus the custodial relay key.
pub struct EthersChain {
    client: Arc<RelayClient>,
    market: LinkMarket<RelayClient>,
    token: Option<PermitToken<RelayClient>>,
}

impl EthersChain {
    pub fn new(
        rpc_url: &str,
        chain_id: u64,
        wallet: LocalWallet,
        contract: Address,
        token: Option<Address>,
    ) -> Result<Self, Error> {
        let url: reqwest::Url = rpc_url
            .parse()
            .map_err(|e| Error::Config(format!("invalid RPC url: {e}")))?;
        let http_client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("rpc client: {e}")))?;
        let provider = Provider::new(Http::new_with_client(url, http_client))
            .interval(Duration::from_millis(2_000));
        let client = Arc::new(SignerMiddleware::new(
            provider,
            wallet.with_chain_id(chain_id),
        ));
        Ok(Self {
            market: LinkMarket::new(contract, Arc::clone(&client)),
            token: token.map(|addr| PermitToken::new(addr, Arc::clone(&client))),
            client,
        })
    }

    /// Address the custodial key signs as.
    pub fn relayer_address(&self) -> Address {
        self.client.signer().address()
    }

    fn purchase_call(&self, call: &PurchaseCall) -> ContractCall<RelayClient, ()> {
        self.market
            .buy_link(
                call.slug.clone(),
                call.buyer,
                call.fee_recipient,
                U256::from(call.fee_bps),
            )
            .value(call.value_wei)
    }
}

#[async_trait]
impl Chain for EthersChain {
    async fn estimate_purchase_gas(&self, call: &PurchaseCall) -> Result<U256, Error> {
        self.purchase_call(call)
            .estimate_gas()
            .await
            .map_err(|e| Error::Rpc(format!("purchase would revert: {e}")))
    }

    async fn gas_price(&self) -> Result<U256, Error> {
        self.client
            .get_gas_price()
            .await
            .map_err(|e| Error::Rpc(format!("fee data unavailable: {e}")))
    }

    async fn submit_permit(&self, permit: &PermitAuthorization) -> Result<(), Error> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| Error::Config("no payment token configured for permit".into()))?;
        let call = token.permit(
            permit.owner,
            permit.spender,
            permit.value,
            U256::from(permit.deadline),
            permit.v,
            permit.r.0,
            permit.s.0,
        );
        let pending = call
            .send()
            .await
            .map_err(|e| Error::Permit(format!("permit submission failed: {e}")))?;
        let receipt = tokio::time::timeout(PERMIT_CONFIRM_TIMEOUT, pending)
            .await
            .map_err(|_| Error::Permit("permit confirmation timed out".into()))?
            .map_err(|e| Error::Permit(format!("permit confirmation failed: {e}")))?
            .ok_or_else(|| Error::Permit("permit transaction was dropped".into()))?;
        if receipt.status != Some(1u64.into()) {
            return Err(Error::Permit("permit transaction reverted".into()));
        }
        Ok(())
    }

    async fn submit_purchase(&self, call: &PurchaseCall) -> Result<TxHash, Error> {
        let builder = self.purchase_call(call);
        let pending = builder
            .send()
            .await
            .map_err(|e| Error::Broadcast(format!("broadcast failed: {e}")))?;
        // Fire and forget: inclusion is the caller's concern, via /tx/{hash}.
        Ok(pending.tx_hash())
    }

    async fn receipt_status(&self, tx: TxHash) -> Result<TxOutcome, Error> {
        let receipt = self
            .client
            .get_transaction_receipt(tx)
            .await
            .map_err(|e| Error::Rpc(format!("receipt query failed: {e}")))?;
        Ok(match receipt {
            None => TxOutcome::Pending,
            Some(r) if r.status == Some(1u64.into()) => TxOutcome::Success,
            Some(_) => TxOutcome::Reverted,
        })
    }

    async fn block_number(&self) -> Result<u64, Error> {
        self.client
            .get_block_number()
            .await
            .map(|n| n.as_u64())
            .map_err(|e| Error::Rpc(format!("block query failed: {e}")))
    }
}
