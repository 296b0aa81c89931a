// =============================================================================
// Volatility Model — expected price range from symbol class and macro stress
// =============================================================================
//
// score     = base(class) + 15 if the symbol has a USD leg and a dollar
//                              factor is extreme
//                         + 10 if YIELDS is extreme (when enabled)
// range_pct = score / 10
// range     = price * range_pct / 100
//
// "Extreme" means |value| > 0.5, i.e. a factor pinned at -1 or +1.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::factors::Factor;
use crate::types::{round_to, SymbolClass};

const DOLLAR_FACTORS: [&str; 2] = ["USD", "DXY"];
const DOLLAR_LEG: &str = "USD";
const YIELDS_FACTOR: &str = "YIELDS";
const EXTREME: f64 = 0.5;
const DOLLAR_BONUS: f64 = 15.0;
const YIELDS_BONUS: f64 = 10.0;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityConfig {
    /// Add the yields bonus when the snapshot carries an extreme YIELDS factor.
    #[serde(default = "default_true")]
    pub yields_adjustment: bool,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            yields_adjustment: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityEstimate {
    pub score: f64,
    pub range_pct: f64,
    pub expected_range: f64,
    pub expected_high: f64,
    pub expected_low: f64,
}

#[derive(Debug, Clone, Default)]
pub struct VolatilityModel {
    config: VolatilityConfig,
}

impl VolatilityModel {
    pub fn new(config: VolatilityConfig) -> Self {
        Self { config }
    }

    fn base_score(class: SymbolClass) -> f64 {
        match class {
            SymbolClass::Commodity => 60.0,
            SymbolClass::JpyCross => 55.0,
            SymbolClass::Major => 45.0,
            SymbolClass::Index | SymbolClass::Other => 50.0,
        }
    }

    /// Volatility score for `symbol` given the current factor snapshot.
    ///
    /// Dollar stress only counts for symbols priced against or in USD;
    /// crosses like EURGBP and indices never take the dollar bonus.
    pub fn score(&self, symbol: &str, factors: &[Factor]) -> f64 {
        let extreme = |f: &Factor| (f.value as f64).abs() > EXTREME;
        let usd_linked = symbol.to_uppercase().contains(DOLLAR_LEG);

        let mut score = Self::base_score(SymbolClass::from_symbol(symbol));
        if usd_linked
            && factors
                .iter()
                .any(|f| DOLLAR_FACTORS.contains(&f.name.as_str()) && extreme(f))
        {
            score += DOLLAR_BONUS;
        }
        if self.config.yields_adjustment
            && factors
                .iter()
                .any(|f| f.name == YIELDS_FACTOR && extreme(f))
        {
            score += YIELDS_BONUS;
        }
        score
    }

    pub fn predict(
        &self,
        symbol: &str,
        factors: &[Factor],
        price: f64,
    ) -> EngineResult<VolatilityEstimate> {
        if !price.is_finite() || price <= 0.0 {
            return Err(EngineError::invalid(format!(
                "current price must be positive, got {price}"
            )));
        }

        let score = self.score(symbol, factors);
        let range_pct = score / 10.0;
        let expected_range = price * range_pct / 100.0;
        let precision = SymbolClass::from_symbol(symbol).precision();

        Ok(VolatilityEstimate {
            score,
            range_pct: round_to(range_pct, 2),
            expected_range: round_to(expected_range, precision),
            expected_high: round_to(price + expected_range, precision),
            expected_low: round_to(price - expected_range, precision),
        })
    }
}
