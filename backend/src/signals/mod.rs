// =============================================================================
// Signals — technical input and the enhanced output record
// =============================================================================
//
// A `TechnicalSignal` arrives from an external charting front end and is
// never modified. Fusion produces an `EnhancedSignal` through
// `EnhancedSignalBuilder`, which validates every field before the record
// exists.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::factors::FundamentalPrediction;
use crate::types::{Bias, Confluence};
use crate::volatility::VolatilityEstimate;

fn default_confidence() -> f64 {
    50.0
}

/// Accept `2650.25` as well as `"2650.25"`.
fn deserialize_f64_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("not a number: {s:?}"))),
    }
}

// =============================================================================
// TechnicalSignal
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSignal {
    pub symbol: String,
    pub bias: Bias,
    #[serde(deserialize_with = "deserialize_f64_lenient")]
    pub entry: f64,
    #[serde(deserialize_with = "deserialize_f64_lenient")]
    pub tp1: f64,
    #[serde(deserialize_with = "deserialize_f64_lenient")]
    pub tp2: f64,
    #[serde(deserialize_with = "deserialize_f64_lenient")]
    pub tp3: f64,
    #[serde(deserialize_with = "deserialize_f64_lenient")]
    pub sl: f64,
    #[serde(
        default = "default_confidence",
        deserialize_with = "deserialize_f64_lenient"
    )]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl TechnicalSignal {
    pub fn validate(&self) -> EngineResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(EngineError::invalid("signal symbol is empty"));
        }
        check_price("entry", self.entry)?;
        for (field, value) in [("tp1", self.tp1), ("tp2", self.tp2), ("tp3", self.tp3), ("sl", self.sl)] {
            check_finite(field, value)?;
        }
        check_confidence(self.confidence)
    }
}

fn check_finite(field: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::invalid(format!("{field} must be finite")))
    }
}

fn check_price(field: &str, value: f64) -> EngineResult<()> {
    check_finite(field, value)?;
    if value <= 0.0 {
        return Err(EngineError::invalid(format!("{field} must be positive, got {value}")));
    }
    Ok(())
}

fn check_confidence(value: f64) -> EngineResult<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(EngineError::invalid(format!(
            "confidence {value} outside [0, 100]"
        )));
    }
    Ok(())
}

// =============================================================================
// EnhancedSignal
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedSignal {
    pub symbol: String,
    pub bias: Bias,
    pub entry: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub tp3: f64,
    pub sl: f64,
    /// Recombined technical + fundamental confidence.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub fundamental_bias: Bias,
    pub fundamental_score: f64,
    pub fundamental_confidence: f64,
    pub confluence: Confluence,
    pub volatility: VolatilityEstimate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_sentiment: Option<Bias>,
    pub timestamp: DateTime<Utc>,
}

/// Assembles an [`EnhancedSignal`] from named parts.
///
/// Every part except `market_sentiment` is required; `build` reports the
/// first one missing or out of range.
#[derive(Debug, Clone)]
pub struct EnhancedSignalBuilder {
    technical: TechnicalSignal,
    confidence: Option<f64>,
    targets: Option<[f64; 3]>,
    fundamental: Option<(Bias, f64, f64)>,
    confluence: Option<Confluence>,
    volatility: Option<VolatilityEstimate>,
    market_sentiment: Option<Bias>,
    timestamp: Option<DateTime<Utc>>,
}

impl EnhancedSignalBuilder {
    pub fn new(technical: &TechnicalSignal) -> Self {
        Self {
            technical: technical.clone(),
            confidence: None,
            targets: None,
            fundamental: None,
            confluence: None,
            volatility: None,
            market_sentiment: None,
            timestamp: None,
        }
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn targets(mut self, targets: [f64; 3]) -> Self {
        self.targets = Some(targets);
        self
    }

    pub fn fundamental(mut self, prediction: &FundamentalPrediction) -> Self {
        self.fundamental = Some((prediction.bias, prediction.score, prediction.confidence));
        self
    }

    pub fn confluence(mut self, confluence: Confluence) -> Self {
        self.confluence = Some(confluence);
        self
    }

    pub fn volatility(mut self, volatility: &VolatilityEstimate) -> Self {
        self.volatility = Some(volatility.clone());
        self
    }

    pub fn market_sentiment(mut self, sentiment: Option<Bias>) -> Self {
        self.market_sentiment = sentiment;
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn build(self) -> EngineResult<EnhancedSignal> {
        let missing = |field: &str| EngineError::invalid(format!("enhanced signal missing {field}"));

        self.technical.validate()?;
        let confidence = self.confidence.ok_or_else(|| missing("confidence"))?;
        check_finite("confidence", confidence)?;
        check_confidence(confidence)?;

        let [tp1, tp2, tp3] = self.targets.ok_or_else(|| missing("targets"))?;
        for (field, value) in [("tp1", tp1), ("tp2", tp2), ("tp3", tp3)] {
            check_finite(field, value)?;
        }

        let (fundamental_bias, fundamental_score, fundamental_confidence) =
            self.fundamental.ok_or_else(|| missing("fundamental prediction"))?;
        check_confidence(fundamental_score)?;
        check_confidence(fundamental_confidence)?;

        let confluence = self.confluence.ok_or_else(|| missing("confluence"))?;
        let volatility = self.volatility.ok_or_else(|| missing("volatility"))?;
        let timestamp = self.timestamp.ok_or_else(|| missing("timestamp"))?;

        let t = self.technical;
        Ok(EnhancedSignal {
            symbol: t.symbol.to_uppercase(),
            bias: t.bias,
            entry: t.entry,
            tp1,
            tp2,
            tp3,
            sl: t.sl,
            confidence,
            timeframe: t.timeframe,
            pattern: t.pattern,
            fundamental_bias,
            fundamental_score,
            fundamental_confidence,
            confluence,
            volatility,
            market_sentiment: self.market_sentiment,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gold_signal() -> TechnicalSignal {
        TechnicalSignal {
            symbol: "XAUUSD".to_string(),
            bias: Bias::Bullish,
            entry: 2650.0,
            tp1: 2665.0,
            tp2: 2680.0,
            tp3: 2700.0,
            sl: 2635.0,
            confidence: 80.0,
            timeframe: Some("H1".to_string()),
            pattern: None,
        }
    }

    fn estimate() -> VolatilityEstimate {
        VolatilityEstimate {
            score: 60.0,
            range_pct: 6.0,
            expected_range: 159.0,
            expected_high: 2809.0,
            expected_low: 2491.0,
        }
    }

    fn prediction() -> FundamentalPrediction {
        FundamentalPrediction {
            bias: Bias::Bullish,
            confidence: 90.0,
            score: 90.0,
            factors: Vec::new(),
        }
    }

    #[test]
    fn accepts_string_numbers() {
        let json = r#"{
            "symbol": "XAUUSD", "bias": "bullish",
            "entry": "2650.25", "tp1": 2665, "tp2": "2680", "tp3": "2700.5", "sl": "2635"
        }"#;
        let sig: TechnicalSignal = serde_json::from_str(json).unwrap();
        assert_eq!(sig.entry, 2650.25);
        assert_eq!(sig.tp3, 2700.5);
        assert_eq!(sig.confidence, 50.0);
        assert!(sig.timeframe.is_none());
    }

    #[test]
    fn rejects_non_numeric_string() {
        let json = r#"{"symbol":"X","bias":"bullish","entry":"abc","tp1":1,"tp2":1,"tp3":1,"sl":1}"#;
        assert!(serde_json::from_str::<TechnicalSignal>(json).is_err());
    }

    #[test]
    fn validate_rejects_bad_entry() {
        let mut sig = gold_signal();
        sig.entry = 0.0;
        assert!(sig.validate().is_err());
        sig.entry = 2650.0;
        sig.confidence = 120.0;
        assert!(sig.validate().is_err());
        sig.confidence = 80.0;
        sig.symbol = " ".to_string();
        assert!(sig.validate().is_err());
    }

    #[test]
    fn builder_assembles_all_fields() {
        let sig = gold_signal();
        let now = Utc::now();
        let out = EnhancedSignalBuilder::new(&sig)
            .confidence(84.0)
            .targets([2668.0, 2686.0, 2720.0])
            .fundamental(&prediction())
            .confluence(Confluence::Strong)
            .volatility(&estimate())
            .timestamp(now)
            .build()
            .unwrap();
        assert_eq!(out.tp1, 2668.0);
        assert_eq!(out.sl, 2635.0);
        assert_eq!(out.fundamental_bias, Bias::Bullish);
        assert_eq!(out.timeframe.as_deref(), Some("H1"));
        assert_eq!(out.timestamp, now);
        assert!(out.market_sentiment.is_none());
    }

    #[test]
    fn builder_reports_missing_part() {
        let err = EnhancedSignalBuilder::new(&gold_signal())
            .confidence(84.0)
            .targets([1.0, 2.0, 3.0])
            .build()
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(msg) if msg.contains("fundamental")));
    }

    #[test]
    fn builder_rejects_non_finite_target() {
        let err = EnhancedSignalBuilder::new(&gold_signal())
            .confidence(84.0)
            .targets([f64::INFINITY, 2.0, 3.0])
            .fundamental(&prediction())
            .confluence(Confluence::Strong)
            .volatility(&estimate())
            .timestamp(Utc::now())
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn serialises_rfc3339_timestamp() {
        let out = EnhancedSignalBuilder::new(&gold_signal())
            .confidence(84.0)
            .targets([2668.0, 2686.0, 2720.0])
            .fundamental(&prediction())
            .confluence(Confluence::Strong)
            .volatility(&estimate())
            .timestamp(Utc::now())
            .build()
            .unwrap();
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["confluence"], "strong");
        assert!(v["timestamp"].as_str().unwrap().contains('T'));
        assert!(v.get("market_sentiment").is_none());
    }
}
