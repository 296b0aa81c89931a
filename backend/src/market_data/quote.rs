// =============================================================================
// Quote normalisation
// =============================================================================
//
// Upstream payloads disagree on number formatting ("2,650.25", "$2650.25",
// "-0.45%") and on whether a percentage change is supplied at all. Everything
// downstream sees a single `Quote` shape.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::Bias;

/// A normalised price quote. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub sentiment: Bias,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// Payload as returned by a quote endpoint, before cleanup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuote {
    pub price: Option<serde_json::Value>,
    #[serde(default)]
    pub change: Option<serde_json::Value>,
    #[serde(default, alias = "changePercent", alias = "change_pct")]
    pub change_percent: Option<serde_json::Value>,
    #[serde(default, alias = "technical_summary", alias = "summary")]
    pub sentiment: Option<String>,
}

/// Parse a loosely formatted number. Thousands separators, currency and
/// percent signs are stripped.
pub fn parse_number(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(*c, ',' | '$' | '%' | '+') && !c.is_whitespace())
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

impl RawQuote {
    pub fn normalize(
        self,
        symbol: &str,
        source: &str,
        timestamp: DateTime<Utc>,
    ) -> EngineResult<Quote> {
        let price = self
            .price
            .as_ref()
            .and_then(parse_number)
            .ok_or_else(|| EngineError::unavailable(format!("{source}: no price for {symbol}")))?;
        if price <= 0.0 {
            return Err(EngineError::unavailable(format!(
                "{source}: non-positive price {price} for {symbol}"
            )));
        }

        let change = self.change.as_ref().and_then(parse_number).unwrap_or(0.0);
        let change_percent = self
            .change_percent
            .as_ref()
            .and_then(parse_number)
            .unwrap_or(change / price * 100.0);
        let sentiment = self
            .sentiment
            .as_deref()
            .map(Bias::from_text)
            .unwrap_or_default();

        Ok(Quote {
            symbol: symbol.to_uppercase(),
            price,
            change,
            change_percent,
            sentiment,
            source: source.to_string(),
            timestamp,
        })
    }
}
