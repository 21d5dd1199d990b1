//! Response types for the relay API.

use ethers::types::TxHash;
use serde::Serialize;

/// Response from the relay endpoint.
#[derive(Serialize, Debug)]
pub struct RelayResponse {
    pub success: bool,
    #[serde(rename = "txHash", skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayResponse {
    pub fn ok(tx_hash: TxHash) -> Self {
        Self {
            success: true,
            tx_hash: Some(tx_hash),
            error: None,
        }
    }
}

/// Response from the health endpoint.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub relayer_address: String,
    pub contract_address: String,
    pub chain_id: u64,
    pub fee_bps: u32,
    pub uptime_secs: u64,
    pub requests: u64,
}

/// Response from the TX status endpoint.
#[derive(Serialize)]
pub struct TxStatusResponse {
    pub status: &'static str,
    #[serde(rename = "txHash")]
    pub tx_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TxStatusResponse {
    pub fn pending(tx_hash: impl Into<String>) -> Self {
        Self {
            status: "pending",
            tx_hash: tx_hash.into(),
            error: None,
        }
    }

    pub fn success(tx_hash: impl Into<String>) -> Self {
        Self {
            status: "success",
            tx_hash: tx_hash.into(),
            error: None,
        }
    }

    pub fn reverted(tx_hash: impl Into<String>) -> Self {
        Self {
            status: "reverted",
            tx_hash: tx_hash.into(),
            error: None,
        }
    }

    pub fn err(tx_hash: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: "error",
            tx_hash: tx_hash.into(),
            error: Some(error.into()),
        }
    }
}
