use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use common::{Config, CurrencyPair, Error, Price, PriceFeed, Result};

const TICKER_PATH: &str = "/v3/ticker/price";
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Spot price feed backed by Binance's public ticker endpoint.
pub struct BinancePriceFeed {
    base_url: String,
    http: Client,
    /// Extra attempts after the first on transport errors and 5xx responses.
    retries: u32,
}

impl BinancePriceFeed {
    pub fn new(base_url: impl Into<String>, timeout: Duration, retries: u32) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            retries,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(&cfg.binance_base_url, cfg.http_timeout, cfg.http_retries)
    }

    fn ticker_url(&self, pair: &CurrencyPair) -> String {
        format!("{}{TICKER_PATH}?symbol={}", self.base_url, pair.ticker())
    }

    async fn get_once(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .header("content-type", "application/json")
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("HTTP {status}: {}", flatten(&body))));
        }
        if status.is_server_error() {
            // Retried by the caller.
            return Err(Error::Http(format!("HTTP {status}: {}", flatten(&body))));
        }
        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {}", flatten(&body))));
        }
        Ok(body)
    }
}

#[async_trait]
impl PriceFeed for BinancePriceFeed {
    async fn price(&self, pair: &CurrencyPair) -> Result<Price> {
        let url = self.ticker_url(pair);
        let mut backoff = RETRY_BACKOFF;
        let mut attempt = 0;

        let body = loop {
            match self.get_once(&url).await {
                Ok(body) => break body,
                Err(Error::Http(e)) if attempt < self.retries => {
                    attempt += 1;
                    warn!(pair = %pair, attempt, error = %e, "Price request failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        };

        let price = parse_ticker(&body)?;
        debug!(pair = %pair, price = %price, "Price fetched");
        Ok(Price::new(pair.clone(), price))
    }
}

/// Extract the price from a `/ticker/price` body.
fn parse_ticker(body: &str) -> Result<Decimal> {
    let ticker: PriceTicker = serde_json::from_str(body).map_err(|e| {
        Error::Exchange(format!("failed to decode ticker: {e}. body: {}", flatten(body)))
    })?;
    let price = Decimal::from_str(&ticker.price).map_err(|e| {
        Error::Exchange(format!(
            "bad price '{}' for {}: {e}",
            ticker.price, ticker.symbol
        ))
    })?;
    if price <= Decimal::ZERO {
        return Err(Error::Exchange(format!(
            "non-positive price {price} for {}",
            ticker.symbol
        )));
    }
    Ok(price)
}

/// Collapse a response body onto one line for logging.
fn flatten(body: &str) -> String {
    body.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PriceTicker {
    symbol: String,
    price: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ErrorKind;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_ticker_body() {
        let body = r#"{"symbol":"BTCUSDT","price":"64123.45000000"}"#;
        assert_eq!(parse_ticker(body).unwrap(), dec!(64123.45));
    }

    #[test]
    fn malformed_ticker_is_internal() {
        for body in [
            "not json",
            r#"{"symbol":"BTCUSDT"}"#,
            r#"{"symbol":"BTCUSDT","price":"abc"}"#,
            r#"{"symbol":"BTCUSDT","price":"0"}"#,
        ] {
            let err = parse_ticker(body).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Internal, "body: {body}");
        }
    }

    #[test]
    fn ticker_url_uses_concatenated_symbol() {
        let feed = BinancePriceFeed::new("https://api.binance.com/api/", Duration::from_secs(1), 0)
            .unwrap();
        assert_eq!(
            feed.ticker_url(&CurrencyPair::new("BTC", "USDT")),
            "https://api.binance.com/api/v3/ticker/price?symbol=BTCUSDT"
        );
    }

    #[test]
    fn flatten_collapses_whitespace() {
        let body = "{\n  \"code\": -1121,\r\n  \"msg\": \"Invalid symbol.\"\n}";
        assert_eq!(flatten(body), r#"{ "code": -1121, "msg": "Invalid symbol." }"#);
    }
}
