pub mod client;
pub mod quote;

pub use client::HttpQuoteSource;
pub use quote::Quote;

use std::time::Duration;

use crate::error::{EngineError, EngineResult};

/// Anything that can produce a normalised quote for a symbol.
#[async_trait::async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> EngineResult<Quote>;

    fn name(&self) -> &str;
}

/// Stand-in used when no quote endpoint is configured. Every fetch fails, so
/// enhancement falls back to technical-only output.
pub struct UnavailableSource;

#[async_trait::async_trait]
impl QuoteSource for UnavailableSource {
    async fn fetch_quote(&self, symbol: &str) -> EngineResult<Quote> {
        Err(EngineError::unavailable(format!(
            "no quote source configured for {symbol}"
        )))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// Fetch with a hard deadline. Elapsed deadlines surface as
/// `SourceUnavailable` for that symbol.
pub async fn fetch_with_timeout(
    source: &dyn QuoteSource,
    symbol: &str,
    timeout: Duration,
) -> EngineResult<Quote> {
    match tokio::time::timeout(timeout, source.fetch_quote(symbol)).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::unavailable(format!(
            "{} timed out after {}s fetching {symbol}",
            source.name(),
            timeout.as_secs_f64()
        ))),
    }
}
