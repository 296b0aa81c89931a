// =============================================================================
// Shared types used across the Confluence engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Directional market view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl Default for Bias {
    fn default() -> Self {
        Self::Neutral
    }
}

impl Bias {
    /// Classify free text ("Strong Buy", "bearish outlook", ...) into a bias.
    /// Anything unrecognised is neutral.
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("bullish") || lower.contains("buy") {
            Self::Bullish
        } else if lower.contains("bearish") || lower.contains("sell") {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }

    pub fn is_directional(self) -> bool {
        !matches!(self, Self::Neutral)
    }
}

impl std::fmt::Display for Bias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// Agreement strength between the technical and fundamental bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confluence {
    Strong,
    Moderate,
    Weak,
}

impl std::fmt::Display for Confluence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strong => write!(f, "strong"),
            Self::Moderate => write!(f, "moderate"),
            Self::Weak => write!(f, "weak"),
        }
    }
}

// =============================================================================
// Symbol classification
// =============================================================================

const COMMODITIES: [&str; 2] = ["XAUUSD", "XAGUSD"];
const INDICES: [&str; 3] = ["US100", "US30", "GER40"];
const MAJORS: [&str; 3] = ["EURUSD", "GBPUSD", "USDCHF"];

/// Instrument class used for volatility baselines and display precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolClass {
    Commodity,
    Index,
    JpyCross,
    Major,
    Other,
}

impl SymbolClass {
    pub fn from_symbol(symbol: &str) -> Self {
        let sym = symbol.to_uppercase();
        if COMMODITIES.contains(&sym.as_str()) {
            Self::Commodity
        } else if INDICES.contains(&sym.as_str()) {
            Self::Index
        } else if sym.contains("JPY") {
            Self::JpyCross
        } else if MAJORS.contains(&sym.as_str()) {
            Self::Major
        } else {
            Self::Other
        }
    }

    /// Decimal places used for every price this engine emits.
    pub fn precision(self) -> u32 {
        match self {
            Self::Commodity | Self::Index => 2,
            Self::JpyCross => 3,
            Self::Major | Self::Other => 5,
        }
    }
}

/// Round `value` to `decimals` places (half away from zero).
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Symbols the engine knows how to analyse, with display names.
pub const SUPPORTED_SYMBOLS: [(&str, &str); 15] = [
    ("XAUUSD", "Gold"),
    ("XAGUSD", "Silver"),
    ("EURUSD", "EUR/USD"),
    ("GBPUSD", "GBP/USD"),
    ("USDJPY", "USD/JPY"),
    ("USDCHF", "USD/CHF"),
    ("AUDUSD", "AUD/USD"),
    ("USDCAD", "USD/CAD"),
    ("NZDUSD", "NZD/USD"),
    ("EURGBP", "EUR/GBP"),
    ("EURJPY", "EUR/JPY"),
    ("GBPJPY", "GBP/JPY"),
    ("US100", "US 100"),
    ("US30", "US 30"),
    ("GER40", "GER 40"),
];

pub fn display_name(symbol: &str) -> Option<&'static str> {
    let sym = symbol.to_uppercase();
    SUPPORTED_SYMBOLS
        .iter()
        .find(|(s, _)| *s == sym)
        .map(|(_, name)| *name)
}
