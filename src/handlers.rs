//! HTTP request handlers.

use crate::chain::TxOutcome;
use crate::error::Error;
use crate::middleware::RequestId;
use crate::response::{HealthResponse, RelayResponse, TxStatusResponse};
use crate::schemas::PurchaseRequest;
use crate::state::AppState;
use axum::extract::{FromRequest, Path, State};
use axum::http::StatusCode;
use axum::Json;
use ethers::types::TxHash;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Health check with basic metrics.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = match state.chain.block_number().await {
        Ok(_) => "ok",
        Err(_) => "unavailable",
    };
    Json(HealthResponse {
        status,
        relayer_address: format!("{:#x}", state.relayer_address),
        contract_address: state.config.contract_address.clone(),
        chain_id: state.config.chain_id,
        fee_bps: state.config.fee_bps,
        uptime_secs: state.start_time.elapsed().as_secs(),
        requests: state.request_count.load(Ordering::Relaxed),
    })
}

/// Decide profitability for a purchase and broadcast it when admitted.
pub async fn relay(
    State(state): State<Arc<AppState>>,
    request_parts: axum::extract::Request,
) -> Result<Json<RelayResponse>, Error> {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    // Correlation ID, set by middleware.
    let req_id = request_parts
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_default();

    let Json(request): Json<PurchaseRequest> = Json::from_request(request_parts, &state)
        .await
        .map_err(|e| Error::Input(format!("invalid JSON body: {e}")))?;

    if request.slug.trim().is_empty() {
        return Err(Error::Input("slug must not be empty".into()));
    }

    info!(
        req_id = %req_id,
        slug = %request.slug,
        buyer = %format!("{:#x}", request.user_address),
        has_permit = request.permit.is_some(),
        "Relay request received"
    );

    match state.engine.handle_purchase(&request).await {
        Ok(tx_hash) => {
            info!(req_id = %req_id, tx_hash = ?tx_hash, "Purchase broadcast");
            Ok(Json(RelayResponse::ok(tx_hash)))
        }
        Err(e) => {
            match &e {
                Error::Economic {
                    fee_earned_usd,
                    gas_cost_usd,
                } => warn!(
                    req_id = %req_id,
                    fee_earned_usd,
                    gas_cost_usd,
                    "Relay rejected by profitability gate"
                ),
                other => error!(req_id = %req_id, error = %other, "Relay failed"),
            }
            Err(e)
        }
    }
}

/// Query TX status. `GET /tx/{tx_hash}`
pub async fn tx_status(
    State(state): State<Arc<AppState>>,
    Path(tx_hash_str): Path<String>,
) -> (StatusCode, Json<TxStatusResponse>) {
    let tx_hash: TxHash = match tx_hash_str.parse() {
        Ok(h) => h,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(TxStatusResponse::err(
                    tx_hash_str,
                    "invalid transaction hash",
                )),
            );
        }
    };

    match state.chain.receipt_status(tx_hash).await {
        Ok(TxOutcome::Pending) => (StatusCode::OK, Json(TxStatusResponse::pending(tx_hash_str))),
        Ok(TxOutcome::Success) => (StatusCode::OK, Json(TxStatusResponse::success(tx_hash_str))),
        Ok(TxOutcome::Reverted) => (
            StatusCode::OK,
            Json(TxStatusResponse::reverted(tx_hash_str)),
        ),
        Err(e) => {
            error!(error = %e, "TX status RPC error");
            (
                StatusCode::BAD_GATEWAY,
                Json(TxStatusResponse::err(
                    tx_hash_str,
                    "RPC temporarily unavailable",
                )),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChain;
    use crate::config::Config;
    use crate::oracle::MockUsdRateSource;
    use axum::body::Body;
    use axum::http::Request;
    use axum::response::IntoResponse;
    use ethers::types::{Address, H256, U256};

    fn test_config() -> Config {
        Config {
            contract_address: "0x00000000000000000000000000000000000000aa".into(),
            fee_recipient: "0x00000000000000000000000000000000000000bb".into(),
            ..Config::default()
        }
    }

    fn rate_source(rate: f64) -> Arc<MockUsdRateSource> {
        let mut oracle = MockUsdRateSource::new();
        oracle.expect_native_usd_rate().returning(move || rate);
        Arc::new(oracle)
    }

    fn state_with(chain: MockChain) -> Arc<AppState> {
        Arc::new(
            AppState::with_parts(
                test_config(),
                Arc::new(chain),
                rate_source(3000.0),
                Address::from_low_u64_be(0xe1a),
            )
            .unwrap(),
        )
    }

    fn relay_request(body: &str) -> axum::extract::Request {
        Request::builder()
            .method("POST")
            .uri("/relay")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn admitted_purchase_returns_the_tx_hash() {
        let mut chain = MockChain::new();
        chain
            .expect_estimate_purchase_gas()
            .returning(|_| Ok(U256::from(100_000u64)));
        chain
            .expect_gas_price()
            .returning(|| Ok(U256::from(100_000_000u64)));
        let tx = H256::repeat_byte(0x11);
        chain.expect_submit_purchase().returning(move |_| Ok(tx));

        let body = serde_json::json!({
            "slug": "brave-azure-otter",
            "userAddress": "0x00000000000000000000000000000000000000cc",
            "price": "0.01",
        });
        let result = relay(State(state_with(chain)), relay_request(&body.to_string())).await;
        let response = result.expect("admitted purchase");
        assert!(response.0.success);
        assert_eq!(response.0.tx_hash, Some(tx));
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request_not_a_server_error() {
        let result = relay(State(state_with(MockChain::new())), relay_request("not json")).await;
        let err = result.expect_err("malformed body must fail");
        assert!(matches!(err, Error::Input(_)));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_slug_is_rejected() {
        let body = serde_json::json!({
            "slug": "  ",
            "userAddress": "0x00000000000000000000000000000000000000cc",
            "price": "0.01",
        });
        let result = relay(
            State(state_with(MockChain::new())),
            relay_request(&body.to_string()),
        )
        .await;
        assert!(matches!(result, Err(Error::Input(_))));
    }

    #[tokio::test]
    async fn economic_rejection_maps_to_429() {
        let mut chain = MockChain::new();
        chain
            .expect_estimate_purchase_gas()
            .returning(|_| Ok(U256::from(1_000_000u64)));
        chain
            .expect_gas_price()
            .returning(|| Ok(U256::from(100_000_000_000u64)));

        let body = serde_json::json!({
            "slug": "brave-azure-otter",
            "userAddress": "0x00000000000000000000000000000000000000cc",
            "price": "0.0001",
        });
        let result = relay(State(state_with(chain)), relay_request(&body.to_string())).await;
        let err = result.expect_err("congested network must reject");
        assert!(matches!(err, Error::Economic { .. }));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn broadcast_failure_maps_to_502() {
        let mut chain = MockChain::new();
        chain
            .expect_estimate_purchase_gas()
            .returning(|_| Ok(U256::from(100_000u64)));
        chain
            .expect_gas_price()
            .returning(|| Ok(U256::from(100_000_000u64)));
        chain
            .expect_submit_purchase()
            .returning(|_| Err(Error::Broadcast("nonce too low".into())));

        let body = serde_json::json!({
            "slug": "brave-azure-otter",
            "userAddress": "0x00000000000000000000000000000000000000cc",
            "price": "0.01",
        });
        let result = relay(State(state_with(chain)), relay_request(&body.to_string())).await;
        let err = result.expect_err("broadcast failure must surface");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn tx_status_reports_receipt_outcomes() {
        let mut chain = MockChain::new();
        chain
            .expect_receipt_status()
            .returning(|_| Ok(TxOutcome::Success));
        let state = state_with(chain);
        let hash = format!("{:?}", H256::repeat_byte(0x22));

        let (status, response) = tx_status(State(state), Path(hash)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.0.status, "success");
    }

    #[tokio::test]
    async fn tx_status_rejects_garbage_hashes() {
        let (status, response) = tx_status(
            State(state_with(MockChain::new())),
            Path("not-a-hash".into()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response.0.status, "error");
    }

    #[tokio::test]
    async fn health_reflects_chain_reachability() {
        let mut chain = MockChain::new();
        chain.expect_block_number().returning(|| Ok(1));
        let response = health(State(state_with(chain))).await;
        assert_eq!(response.0.status, "ok");
        assert_eq!(response.0.fee_bps, 500);

        let mut chain = MockChain::new();
        chain
            .expect_block_number()
            .returning(|| Err(Error::Rpc("unreachable".into())));
        let response = health(State(state_with(chain))).await;
        assert_eq!(response.0.status, "unavailable");
    }
}
