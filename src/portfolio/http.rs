//! HTTP Portfolio Source
//!
//! Calls the brokerage portfolio endpoint with a bearer token and maps its
//! response into a [`PortfolioSnapshot`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CacheError, FetchError, Result};
use crate::portfolio::{PortfolioSnapshot, PortfolioSource, Position};

// == Upstream Payload ==
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPortfolio {
    positions: Vec<RawPosition>,
    total_amount_portfolio: RawMoney,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPosition {
    figi: String,
    ticker: String,
    name: String,
    quantity: f64,
    average_position_price: RawMoney,
    current_price: RawMoney,
}

#[derive(Debug, Deserialize)]
struct RawMoney {
    value: f64,
    #[serde(default)]
    currency: Option<String>,
}

impl From<RawPortfolio> for PortfolioSnapshot {
    fn from(raw: RawPortfolio) -> Self {
        let positions = raw
            .positions
            .into_iter()
            .map(|p| {
                Position::new(
                    p.figi,
                    p.ticker,
                    p.name,
                    p.quantity,
                    p.average_position_price.value,
                    p.current_price.value,
                )
            })
            .collect();

        Self {
            positions,
            total_value: raw.total_amount_portfolio.value,
            currency: raw.total_amount_portfolio.currency.unwrap_or_default(),
        }
    }
}

/// Decodes an upstream response body.
pub fn parse_portfolio(body: &[u8]) -> std::result::Result<PortfolioSnapshot, FetchError> {
    serde_json::from_slice::<RawPortfolio>(body)
        .map(PortfolioSnapshot::from)
        .map_err(|err| FetchError::MalformedResponse(err.to_string()))
}

// == HTTP Source ==
#[derive(Debug, Clone)]
pub struct HttpPortfolioSource {
    client: reqwest::Client,
    url: String,
}

impl HttpPortfolioSource {
    /// Creates a source for `url`; `timeout` bounds each request end to end.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CacheError::Internal(format!("Failed to build HTTP client: {}", err)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PortfolioSource for HttpPortfolioSource {
    async fn fetch(&self, token: &str) -> std::result::Result<PortfolioSnapshot, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| FetchError::Network(err.to_string()))?;

        let status = response.status();
        debug!(%status, "Portfolio endpoint answered");
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FetchError::Auth(format!("Upstream returned {}", status)));
            }
            s if !s.is_success() => {
                return Err(FetchError::Network(format!("Upstream returned {}", status)));
            }
            _ => {}
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| FetchError::Network(err.to_string()))?;
        parse_portfolio(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::get, Json, Router};
    use serde_json::{json, Value};

    fn upstream_body() -> Value {
        json!({
            "positions": [
                {
                    "figi": "BBG000B9XRY4",
                    "ticker": "AAPL",
                    "name": "Apple",
                    "quantity": 10,
                    "averagePositionPrice": { "value": 150.0, "currency": "USD" },
                    "currentPrice": { "value": 170.0 }
                },
                {
                    "figi": "BBG004730N88",
                    "ticker": "SBER",
                    "name": "Sberbank",
                    "quantity": 100,
                    "averagePositionPrice": { "value": 250.0, "currency": "RUB" },
                    "currentPrice": { "value": 240.0 }
                }
            ],
            "totalAmountPortfolio": { "value": 1000.0, "currency": "USD" }
        })
    }

    #[test]
    fn test_parse_maps_fields_and_profit() {
        let body = serde_json::to_vec(&upstream_body()).unwrap();
        let snapshot = parse_portfolio(&body).unwrap();

        assert_eq!(snapshot.total_value, 1000.0);
        assert_eq!(snapshot.currency, "USD");
        assert_eq!(snapshot.positions.len(), 2);

        let apple = &snapshot.positions[0];
        assert_eq!(apple.ticker, "AAPL");
        assert_eq!(apple.average_price, 150.0);
        assert_eq!(apple.current_price, 170.0);
        assert_eq!(apple.profit, 200.0);

        assert_eq!(snapshot.positions[1].profit, -1000.0);
    }

    #[test]
    fn test_parse_malformed() {
        let result = parse_portfolio(br#"{"positions": "nope"}"#);
        assert!(matches!(result, Err(FetchError::MalformedResponse(_))));
    }

    async fn portfolio_endpoint(headers: HeaderMap) -> (axum::http::StatusCode, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        match auth {
            "Bearer t.good" => (axum::http::StatusCode::OK, Json(upstream_body())),
            "Bearer t.garbled" => (axum::http::StatusCode::OK, Json(json!({ "oops": true }))),
            "Bearer t.flaky" => (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({})),
            ),
            _ => (axum::http::StatusCode::UNAUTHORIZED, Json(json!({}))),
        }
    }

    async fn spawn_upstream() -> String {
        let app = Router::new().route("/openapi/portfolio", get(portfolio_endpoint));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/openapi/portfolio", addr)
    }

    #[tokio::test]
    async fn test_fetch_against_local_upstream() {
        let url = spawn_upstream().await;
        let source = HttpPortfolioSource::new(url, Duration::from_secs(5)).unwrap();

        let snapshot = source.fetch("t.good").await.unwrap();
        assert_eq!(snapshot.positions.len(), 2);

        let err = source.fetch("t.revoked").await.unwrap_err();
        assert!(matches!(err, FetchError::Auth(_)));

        let err = source.fetch("t.flaky").await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));

        let err = source.fetch("t.garbled").await.unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_network_error() {
        let source =
            HttpPortfolioSource::new("http://127.0.0.1:9/portfolio", Duration::from_secs(2)).unwrap();

        let err = source.fetch("t.good").await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }
}
