// =============================================================================
// Factor Model — weighted macro factors to a 0..100 fundamental score
// =============================================================================
//
// score  = Σ value_i * weight_i          (theoretical range [-1, 1])
// norm   = (score + 1) / 2 * 100         (mapped onto [0, 100])
//
// Bias thresholds and the 95 confidence ceiling are fixed constants; they
// are shared with downstream consumers and must not drift.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::{round_to, Bias};

/// Normalised score above which the fundamental bias is bullish.
pub const BULLISH_THRESHOLD: f64 = 65.0;
/// Normalised score below which the fundamental bias is bearish.
pub const BEARISH_THRESHOLD: f64 = 35.0;
/// Ceiling on directional confidence.
pub const MAX_FUNDAMENTAL_CONFIDENCE: f64 = 95.0;
/// Confidence reported for a neutral bias.
pub const NEUTRAL_CONFIDENCE: f64 = 50.0;

/// Base-minus-quote strength gap beyond which a pair view is directional.
pub const PAIR_DIRECTION_THRESHOLD: f64 = 0.5;
const PAIR_CONFIDENCE_FLOOR: f64 = 70.0;
const PAIR_CONFIDENCE_PER_STEP: f64 = 15.0;

/// Added to fundamental confidence when the quote's own sentiment agrees.
pub const SENTIMENT_CONFIRMATION_BONUS: f64 = 10.0;
/// Ceiling on confidence after sentiment confirmation.
pub const MAX_CONFIRMED_CONFIDENCE: f64 = 98.0;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// A single weighted macro factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub name: String,
    pub weight: f64,
    /// -1 (bearish pressure), 0 (neutral), +1 (bullish pressure).
    pub value: i8,
}

/// Output of [`FactorModel::predict_bias`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalPrediction {
    pub bias: Bias,
    pub confidence: f64,
    pub score: f64,
    /// Factor set as it was when the prediction was taken.
    pub factors: Vec<Factor>,
}

impl FundamentalPrediction {
    /// Raise confidence when the quote's sentiment points the same way.
    ///
    /// Only directional agreement counts; a neutral quote sentiment is what
    /// unrecognised source text maps to.
    pub fn confirm_with(mut self, sentiment: Bias) -> Self {
        if sentiment.is_directional() && sentiment == self.bias {
            self.confidence = round_to(
                (self.confidence + SENTIMENT_CONFIRMATION_BONUS).min(MAX_CONFIRMED_CONFIDENCE),
                2,
            );
        }
        self
    }
}

/// A fixed set of weighted factors whose values are overwritten by fresh
/// readings. No history is kept.
#[derive(Debug, Clone)]
pub struct FactorModel {
    factors: Vec<Factor>,
}

impl FactorModel {
    /// Build a model from `(name, weight)` pairs.
    ///
    /// Weights must each lie in `[0, 1]` and sum to `1.0`. Names are
    /// case-insensitive and must be unique. All values start at 0.
    pub fn new(weights: &[(&str, f64)]) -> EngineResult<Self> {
        if weights.is_empty() {
            return Err(EngineError::invalid("factor set must not be empty"));
        }

        let mut factors: Vec<Factor> = Vec::with_capacity(weights.len());
        for (name, weight) in weights {
            let name = name.trim().to_uppercase();
            if name.is_empty() {
                return Err(EngineError::invalid("factor name must not be empty"));
            }
            if !(0.0..=1.0).contains(weight) {
                return Err(EngineError::invalid(format!(
                    "factor {name} weight {weight} outside [0, 1]"
                )));
            }
            if factors.iter().any(|f| f.name == name) {
                return Err(EngineError::invalid(format!("duplicate factor {name}")));
            }
            factors.push(Factor {
                name,
                weight: *weight,
                value: 0,
            });
        }

        let sum: f64 = factors.iter().map(|f| f.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::invalid(format!(
                "factor weights sum to {sum}, expected 1.0"
            )));
        }

        Ok(Self { factors })
    }

    /// Store a fresh reading for `name`.
    ///
    /// Out-of-range values are clamped to `[-1, 1]` and snapped to the
    /// nearest of {-1, 0, 1} rather than rejected. Returns the stored value.
    pub fn set_factor_value(&mut self, name: &str, value: f64) -> EngineResult<i8> {
        if !value.is_finite() {
            return Err(EngineError::invalid(format!(
                "factor {name} value must be finite"
            )));
        }
        let key = name.trim().to_uppercase();
        let factor = self
            .factors
            .iter_mut()
            .find(|f| f.name == key)
            .ok_or_else(|| EngineError::UnknownFactor(name.to_string()))?;

        factor.value = value.clamp(-1.0, 1.0).round() as i8;
        Ok(factor.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        let key = name.trim().to_uppercase();
        self.factors.iter().any(|f| f.name == key)
    }

    pub fn value(&self, name: &str) -> Option<i8> {
        let key = name.trim().to_uppercase();
        self.factors.iter().find(|f| f.name == key).map(|f| f.value)
    }

    /// Weighted sum of factor values, in `[-1, 1]`.
    pub fn raw_score(&self) -> f64 {
        self.factors
            .iter()
            .map(|f| f.value as f64 * f.weight)
            .sum()
    }

    /// Normalised fundamental score in `[0, 100]`, rounded to 2 decimals.
    pub fn score(&self) -> f64 {
        round_to((self.raw_score() + 1.0) / 2.0 * 100.0, 2)
    }

    pub fn predict_bias(&self) -> FundamentalPrediction {
        let score = self.score();
        let (bias, confidence) = bias_for_score(score);
        FundamentalPrediction {
            bias,
            confidence: round_to(confidence, 2),
            score,
            factors: self.snapshot(),
        }
    }

    /// Directional view on the pair `base`/`quote`.
    ///
    /// `diff = value(base) - value(quote)`, in `[-2, 2]`. Beyond
    /// ±[`PAIR_DIRECTION_THRESHOLD`] the view is directional with confidence
    /// `min(70 + |diff| * 15, 95)`; otherwise neutral at 50. A leg this model
    /// does not track makes the pair neutral. The score maps `diff` onto
    /// `[0, 100]`.
    pub fn predict_pair(&self, base: &str, quote: &str) -> FundamentalPrediction {
        let diff = match (self.value(base), self.value(quote)) {
            (Some(b), Some(q)) => f64::from(b) - f64::from(q),
            _ => 0.0,
        };

        let (bias, confidence) = if diff.abs() > PAIR_DIRECTION_THRESHOLD {
            let confidence = (PAIR_CONFIDENCE_FLOOR + diff.abs() * PAIR_CONFIDENCE_PER_STEP)
                .min(MAX_FUNDAMENTAL_CONFIDENCE);
            let bias = if diff > 0.0 { Bias::Bullish } else { Bias::Bearish };
            (bias, confidence)
        } else {
            (Bias::Neutral, NEUTRAL_CONFIDENCE)
        };

        FundamentalPrediction {
            bias,
            confidence: round_to(confidence, 2),
            score: round_to((diff + 2.0) / 4.0 * 100.0, 2),
            factors: self.snapshot(),
        }
    }

    pub fn snapshot(&self) -> Vec<Factor> {
        self.factors.clone()
    }
}

/// Map a normalised score onto `(bias, confidence)`.
pub fn bias_for_score(score: f64) -> (Bias, f64) {
    if score > BULLISH_THRESHOLD {
        (Bias::Bullish, score.min(MAX_FUNDAMENTAL_CONFIDENCE))
    } else if score < BEARISH_THRESHOLD {
        (Bias::Bearish, (100.0 - score).min(MAX_FUNDAMENTAL_CONFIDENCE))
    } else {
        (Bias::Neutral, NEUTRAL_CONFIDENCE)
    }
}
