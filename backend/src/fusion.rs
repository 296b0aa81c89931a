// =============================================================================
// Signal Fusion — technical signal x fundamental bias x volatility
// =============================================================================
//
// Confidence:
//   same bias              min(tech * 0.6 + fund * 0.4, 98)   strong
//   fundamental neutral    tech * 0.9                         moderate
//   opposing               tech * 0.7                         weak
//
// Targets are stretched away from entry only when volatility.score exceeds
// the rescale threshold. The stop-loss never moves.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::factors::FundamentalPrediction;
use crate::signals::{EnhancedSignal, EnhancedSignalBuilder, TechnicalSignal};
use crate::types::{round_to, Bias, Confluence, SymbolClass};
use crate::volatility::VolatilityEstimate;

/// Ceiling on combined confidence.
pub const MAX_COMBINED_CONFIDENCE: f64 = 98.0;

const AGREE_TECH_WEIGHT: f64 = 0.6;
const AGREE_FUND_WEIGHT: f64 = 0.4;
const NEUTRAL_DISCOUNT: f64 = 0.9;
const CONFLICT_DISCOUNT: f64 = 0.7;

fn default_tp_multipliers() -> [f64; 3] {
    [1.2, 1.3, 1.4]
}

fn default_rescale_threshold() -> f64 {
    60.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Distance multipliers for tp1, tp2 and tp3.
    #[serde(default = "default_tp_multipliers")]
    pub tp_multipliers: [f64; 3],

    /// Targets are rescaled only when the volatility score is strictly above
    /// this value.
    #[serde(default = "default_rescale_threshold")]
    pub rescale_threshold: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self::tiered()
    }
}

impl FusionConfig {
    /// Wider stretch for further targets: 1.2 / 1.3 / 1.4.
    pub fn tiered() -> Self {
        Self {
            tp_multipliers: default_tp_multipliers(),
            rescale_threshold: default_rescale_threshold(),
        }
    }

    /// Same 1.3 stretch on every target.
    pub fn flat() -> Self {
        Self {
            tp_multipliers: [1.3; 3],
            rescale_threshold: default_rescale_threshold(),
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self
            .tp_multipliers
            .iter()
            .any(|m| !m.is_finite() || *m <= 0.0)
        {
            return Err(EngineError::invalid("tp multipliers must be positive"));
        }
        if !self.rescale_threshold.is_finite() {
            return Err(EngineError::invalid("rescale threshold must be finite"));
        }
        Ok(())
    }
}

/// Stateless fusion of one technical signal with the current fundamentals.
#[derive(Debug, Clone, Default)]
pub struct SignalFusionEngine {
    config: FusionConfig,
}

impl SignalFusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Combined confidence and confluence label for a pair of views.
    pub fn combine(
        technical_bias: Bias,
        technical_confidence: f64,
        fundamental: &FundamentalPrediction,
    ) -> (f64, Confluence) {
        let (combined, confluence) = if technical_bias == fundamental.bias {
            (
                (technical_confidence * AGREE_TECH_WEIGHT
                    + fundamental.confidence * AGREE_FUND_WEIGHT)
                    .min(MAX_COMBINED_CONFIDENCE),
                Confluence::Strong,
            )
        } else if fundamental.bias == Bias::Neutral {
            (technical_confidence * NEUTRAL_DISCOUNT, Confluence::Moderate)
        } else {
            (technical_confidence * CONFLICT_DISCOUNT, Confluence::Weak)
        };
        (round_to(combined, 2), confluence)
    }

    /// Take-profit levels after volatility rescaling.
    pub fn rescale_targets(&self, technical: &TechnicalSignal, volatility_score: f64) -> [f64; 3] {
        let targets = [technical.tp1, technical.tp2, technical.tp3];
        if volatility_score <= self.config.rescale_threshold || !technical.bias.is_directional() {
            return targets;
        }

        let entry = technical.entry;
        let precision = SymbolClass::from_symbol(&technical.symbol).precision();
        let mut out = targets;
        for (tp, m) in out.iter_mut().zip(self.config.tp_multipliers) {
            let stretched = match technical.bias {
                Bias::Bullish => entry + (*tp - entry) * m,
                _ => entry - (entry - *tp) * m,
            };
            *tp = round_to(stretched, precision);
        }
        out
    }

    /// Fuse a technical signal with a fundamental prediction and volatility
    /// estimate. `timestamp` is stamped on the output as given.
    pub fn fuse(
        &self,
        technical: Option<&TechnicalSignal>,
        fundamental: &FundamentalPrediction,
        volatility: &VolatilityEstimate,
        market_sentiment: Option<Bias>,
        timestamp: DateTime<Utc>,
    ) -> EngineResult<EnhancedSignal> {
        let technical = technical.ok_or_else(|| EngineError::invalid("missing signal"))?;
        technical.validate()?;

        let (confidence, confluence) =
            Self::combine(technical.bias, technical.confidence, fundamental);
        let targets = self.rescale_targets(technical, volatility.score);

        EnhancedSignalBuilder::new(technical)
            .confidence(confidence)
            .targets(targets)
            .fundamental(fundamental)
            .confluence(confluence)
            .volatility(volatility)
            .market_sentiment(market_sentiment)
            .timestamp(timestamp)
            .build()
    }
}
