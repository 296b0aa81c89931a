//! Factor weight presets.
//!
//! Each preset sums to 1.0; `FactorModel::new` re-checks that at startup.

use serde::{Deserialize, Serialize};

/// Major-currency strength factors, used for forex pairs and indices.
pub const CURRENCY_WEIGHTS: [(&str, f64); 6] = [
    ("USD", 0.35),
    ("EUR", 0.20),
    ("GBP", 0.15),
    ("JPY", 0.15),
    ("AUD", 0.08),
    ("CAD", 0.07),
];

/// Precious-metal drivers. Values are oriented so that +1 is bullish for gold.
pub const GOLD_WEIGHTS: [(&str, f64); 5] = [
    ("USD", 0.30),
    ("DXY", 0.25),
    ("YIELDS", 0.20),
    ("INFLATION", 0.15),
    ("GEOPOLITICAL", 0.10),
];

/// Macro-economic factors. Only ever set by hand through the API.
pub const ECONOMIC_WEIGHTS: [(&str, f64); 5] = [
    ("INTEREST_RATES", 0.30),
    ("INFLATION", 0.25),
    ("GDP", 0.20),
    ("EMPLOYMENT", 0.15),
    ("TRADE_BALANCE", 0.10),
];

/// Named factor sets held by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorSet {
    Currency,
    Gold,
    Economic,
}

impl FactorSet {
    pub fn weights(self) -> &'static [(&'static str, f64)] {
        match self {
            Self::Currency => &CURRENCY_WEIGHTS,
            Self::Gold => &GOLD_WEIGHTS,
            Self::Economic => &ECONOMIC_WEIGHTS,
        }
    }

    /// Factor set a symbol's fundamental bias is computed from.
    pub fn for_symbol(symbol: &str) -> Self {
        match symbol.to_uppercase().as_str() {
            "XAUUSD" | "XAGUSD" => Self::Gold,
            _ => Self::Currency,
        }
    }
}

/// Base and quote currencies of a six-letter forex pair.
///
/// `None` for metals (scored on the gold set as a whole) and for anything
/// that is not a plain pair, such as indices.
pub fn pair_legs(symbol: &str) -> Option<(&str, &str)> {
    let is_pair = symbol.len() == 6 && symbol.chars().all(|c| c.is_ascii_alphabetic());
    if !is_pair || FactorSet::for_symbol(symbol) != FactorSet::Currency {
        return None;
    }
    Some(symbol.split_at(3))
}

impl std::fmt::Display for FactorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Currency => write!(f, "currency"),
            Self::Gold => write!(f, "gold"),
            Self::Economic => write!(f, "economic"),
        }
    }
}
