// =============================================================================
// Macro Readings — raw market quotes to factor values
// =============================================================================
//
//   DXY          > 105  strong dollar        < 95  weak dollar
//   US 10Y yield > 4.5% bearish for metals   < 3.5% bullish for metals
//   USD pair     change% > +0.5 strong base  < -0.5 weak base
//
// Readings for the gold set are oriented so +1 means bullish for gold; a
// strong dollar therefore maps to -1 there.
// =============================================================================

use crate::factors::presets::FactorSet;
use crate::market_data::Quote;

const DXY_STRONG: f64 = 105.0;
const DXY_WEAK: f64 = 95.0;
const YIELD_HIGH: f64 = 4.5;
const YIELD_LOW: f64 = 3.5;
const PROXY_CHANGE_PCT: f64 = 0.5;

pub const DOLLAR_INDEX_SYMBOL: &str = "DXY";
pub const TREASURY_10Y_SYMBOL: &str = "US10Y";

/// What a fetched quote measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingKind {
    DollarIndex,
    TreasuryYield,
    /// Strength of `currency` read off its USD pair. `usd_base` is true for
    /// pairs quoted as USDxxx, where a rising pair means a weaker `currency`.
    CurrencyProxy {
        currency: &'static str,
        usd_base: bool,
    },
}

/// A quote to fetch and how to interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingRequest {
    pub quote_symbol: &'static str,
    pub kind: ReadingKind,
}

impl ReadingRequest {
    const fn new(quote_symbol: &'static str, kind: ReadingKind) -> Self {
        Self { quote_symbol, kind }
    }
}

/// Reading that measures `currency`, if the engine tracks it.
pub fn request_for_currency(currency: &str) -> Option<ReadingRequest> {
    let req = match currency.to_uppercase().as_str() {
        "USD" => ReadingRequest::new(DOLLAR_INDEX_SYMBOL, ReadingKind::DollarIndex),
        "EUR" => proxy("EURUSD", "EUR", false),
        "GBP" => proxy("GBPUSD", "GBP", false),
        "AUD" => proxy("AUDUSD", "AUD", false),
        "JPY" => proxy("USDJPY", "JPY", true),
        "CAD" => proxy("USDCAD", "CAD", true),
        _ => return None,
    };
    Some(req)
}

const fn proxy(symbol: &'static str, currency: &'static str, usd_base: bool) -> ReadingRequest {
    ReadingRequest::new(
        symbol,
        ReadingKind::CurrencyProxy { currency, usd_base },
    )
}

/// Readings needed to refresh the factor set `symbol` is scored against.
///
/// Metals need the dollar index and treasury yields. Six-letter forex pairs
/// need their base and quote currency strengths. Anything else (indices) is
/// driven by the dollar alone.
pub fn requests_for_symbol(symbol: &str) -> Vec<ReadingRequest> {
    let sym = symbol.to_uppercase();
    if FactorSet::for_symbol(&sym) == FactorSet::Gold {
        return vec![
            ReadingRequest::new(DOLLAR_INDEX_SYMBOL, ReadingKind::DollarIndex),
            ReadingRequest::new(TREASURY_10Y_SYMBOL, ReadingKind::TreasuryYield),
        ];
    }

    let mut requests = Vec::new();
    if sym.len() == 6 && sym.is_ascii() {
        for currency in [&sym[..3], &sym[3..]] {
            if let Some(req) = request_for_currency(currency) {
                if !requests.contains(&req) {
                    requests.push(req);
                }
            }
        }
    }
    if requests.is_empty() {
        requests.push(ReadingRequest::new(
            DOLLAR_INDEX_SYMBOL,
            ReadingKind::DollarIndex,
        ));
    }
    requests
}

fn band(value: f64, high: f64, low: f64) -> f64 {
    if value > high {
        1.0
    } else if value < low {
        -1.0
    } else {
        0.0
    }
}

/// Factor updates implied by `quote` for the given factor set.
pub fn updates_for(
    set: FactorSet,
    kind: ReadingKind,
    quote: &Quote,
) -> Vec<(&'static str, f64)> {
    match (set, kind) {
        (FactorSet::Currency, ReadingKind::DollarIndex) => {
            vec![("USD", band(quote.price, DXY_STRONG, DXY_WEAK))]
        }
        (FactorSet::Gold, ReadingKind::DollarIndex) => {
            let usd = -band(quote.price, DXY_STRONG, DXY_WEAK);
            vec![("USD", usd), ("DXY", usd)]
        }
        (FactorSet::Gold, ReadingKind::TreasuryYield) => {
            vec![("YIELDS", -band(quote.price, YIELD_HIGH, YIELD_LOW))]
        }
        (FactorSet::Currency, ReadingKind::CurrencyProxy { currency, usd_base }) => {
            let strength = band(quote.change_percent, PROXY_CHANGE_PCT, -PROXY_CHANGE_PCT);
            vec![(currency, if usd_base { -strength } else { strength })]
        }
        _ => Vec::new(),
    }
}
