// =============================================================================
// HTTP Quote Client — JSON quote endpoint
// =============================================================================
//
// GET {base_url}/{SYMBOL} returning `{price, change?, change_percent?,
// sentiment?}`. Numbers may arrive as formatted strings; see `quote.rs`.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, instrument, warn};

use super::quote::{Quote, RawQuote};
use super::QuoteSource;
use crate::error::{EngineError, EngineResult};

const USER_AGENT: &str = concat!("confluence-engine/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct HttpQuoteSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpQuoteSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build quote HTTP client")?;

        debug!(base_url = %base_url, "HttpQuoteSource initialised");

        Ok(Self { base_url, client })
    }
}

#[async_trait::async_trait]
impl QuoteSource for HttpQuoteSource {
    #[instrument(skip(self), name = "quotes::fetch")]
    async fn fetch_quote(&self, symbol: &str) -> EngineResult<Quote> {
        let url = format!("{}/{}", self.base_url, symbol.to_uppercase());

        let resp = self.client.get(&url).send().await.map_err(|e| {
            warn!(symbol, error = %e, "quote request failed");
            EngineError::unavailable(format!("GET {url}: {e}"))
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EngineError::unavailable(format!(
                "GET {url} returned {status}"
            )));
        }

        let raw: RawQuote = resp
            .json()
            .await
            .map_err(|e| EngineError::unavailable(format!("bad quote payload from {url}: {e}")))?;

        let quote = raw.normalize(symbol, self.name(), Utc::now())?;
        debug!(symbol = %quote.symbol, price = quote.price, "quote fetched");
        Ok(quote)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_trimmed() {
        let src = HttpQuoteSource::new("http://localhost:9000/quotes/", Duration::from_secs(1))
            .unwrap();
        assert_eq!(src.base_url, "http://localhost:9000/quotes");
        assert_eq!(src.name(), "http");
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable() {
        let src = HttpQuoteSource::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = src.fetch_quote("EURUSD").await.unwrap_err();
        assert!(matches!(err, EngineError::SourceUnavailable(_)));
    }
}
