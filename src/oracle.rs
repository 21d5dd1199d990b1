//! USD price feed for the native currency.

use crate::error::Error;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Rate assumed when the feed is unreachable or returns garbage. Slightly
/// pessimistic, so a dead feed admits fewer relays, not more.
pub const FALLBACK_USD_RATE: f64 = 3500.0;

const FEED_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of the native currency's USD rate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsdRateSource: Send + Sync {
    /// USD per whole native-currency unit. Never fails; degrades to the
    /// fallback constant instead. Re-fetched on every call, no caching.
    async fn native_usd_rate(&self) -> f64;
}

/// CoinGecko-style simple-price feed.
pub struct PriceFeed {
    client: reqwest::Client,
    url: String,
    fallback: f64,
}

impl PriceFeed {
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(FEED_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("price feed client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            fallback: FALLBACK_USD_RATE,
        })
    }

    async fn fetch_rate(&self) -> Result<f64, String> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("feed returned {}", resp.status()));
        }
        let body: Value = resp.json().await.map_err(|e| e.to_string())?;
        parse_simple_price(&body).ok_or_else(|| "malformed feed body".to_string())
    }
}

#[async_trait]
impl UsdRateSource for PriceFeed {
    async fn native_usd_rate(&self) -> f64 {
        match self.fetch_rate().await {
            Ok(rate) => rate,
            Err(e) => {
                warn!(error = %e, fallback = self.fallback, "Price feed unavailable, using fallback rate");
                self.fallback
            }
        }
    }
}

/// Pull the rate out of a `{ "<asset>": { "usd": <rate> } }` body.
fn parse_simple_price(body: &Value) -> Option<f64> {
    body.as_object()?
        .values()
        .next()?
        .get("usd")?
        .as_f64()
        .filter(|rate| rate.is_finite() && *rate > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_simple_price_body() {
        let body = json!({ "ethereum": { "usd": 3123.45 } });
        assert_eq!(parse_simple_price(&body), Some(3123.45));
    }

    #[test]
    fn rejects_malformed_bodies() {
        for body in [
            json!({}),
            json!([]),
            json!({ "ethereum": {} }),
            json!({ "ethereum": { "usd": "3123" } }),
            json!({ "ethereum": { "usd": -1.0 } }),
            json!(null),
        ] {
            assert_eq!(parse_simple_price(&body), None, "accepted {body}");
        }
    }

    #[tokio::test]
    async fn unreachable_feed_falls_back_instead_of_failing() {
        // Nothing listens on the discard port; the request fails fast.
        let feed = PriceFeed::new("http://127.0.0.1:9/price").unwrap();
        assert_eq!(feed.native_usd_rate().await, FALLBACK_USD_RATE);
    }
}
