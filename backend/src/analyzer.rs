// =============================================================================
// Analyzer — per-request orchestration
// =============================================================================
//
// Pipeline for one enhancement request:
//   1. Fetch the symbol quote (hard deadline)
//   2. Fetch macro readings and map them to factor values
//   3. Apply readings under the factor set's write lock, predict under read
//      (pairs base against quote), confirm with the quote's sentiment
//   4. Estimate volatility around the technical entry
//   5. Fuse, persist, notify
//
// An unreachable quote source downgrades step 5 to a technical-only answer;
// fundamentals are never invented. A failed macro reading only leaves the
// previous factor value in place.
// =============================================================================

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::error::{EngineError, EngineResult};
use crate::factors::presets::pair_legs;
use crate::factors::readings::{self, ReadingRequest};
use crate::factors::{FactorSet, FundamentalPrediction};
use crate::market_data::{fetch_with_timeout, Quote};
use crate::signals::{EnhancedSignal, TechnicalSignal};
use crate::types::{display_name, Bias};
use crate::volatility::VolatilityEstimate;

// =============================================================================
// Results
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PairAnalysis {
    pub symbol: String,
    pub name: String,
    pub factor_set: FactorSet,
    pub prediction: FundamentalPrediction,
    pub quote: Quote,
}

/// Outcome of an enhancement request.
#[derive(Debug, Clone)]
pub enum Enhancement {
    Enhanced {
        signal: EnhancedSignal,
        /// Store id, absent when persistence failed.
        id: Option<String>,
    },
    Unenhanced {
        signal: TechnicalSignal,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrencyStrength {
    pub currency: String,
    pub reading: Quote,
    /// Stored factor value after applying the reading.
    pub strength: i8,
    pub prediction: FundamentalPrediction,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolSentiment {
    pub symbol: String,
    pub bias: Bias,
    pub confidence: f64,
    pub score: f64,
    pub quote_sentiment: Bias,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketSentiment {
    pub overall: Bias,
    pub bullish: usize,
    pub bearish: usize,
    pub neutral: usize,
    pub symbols: Vec<SymbolSentiment>,
    /// Watch-list symbols whose analysis failed.
    pub skipped: Vec<String>,
}

fn normalize_symbol(symbol: &str) -> EngineResult<String> {
    let sym = symbol.trim().to_uppercase();
    if sym.is_empty() || !sym.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(EngineError::invalid(format!("invalid symbol {symbol:?}")));
    }
    Ok(sym)
}

// =============================================================================
// Analyzer
// =============================================================================

pub struct Analyzer;

impl Analyzer {
    /// Fetch fresh data for `symbol`, refresh its factor set and predict.
    pub async fn compute_fundamental_prediction(
        state: &Arc<AppState>,
        symbol: &str,
    ) -> EngineResult<PairAnalysis> {
        let symbol = normalize_symbol(symbol)?;
        let timeout = state.runtime_config.read().source_timeout();
        let source = state.quote_source.as_ref();
        let set = FactorSet::for_symbol(&symbol);

        let quote = fetch_with_timeout(source, &symbol, timeout).await?;

        // ── Macro readings ───────────────────────────────────────────────
        let requests = readings::requests_for_symbol(&symbol);
        let (primary, primary_quote) = (symbol.as_str(), &quote);
        let fetches = requests.iter().copied().map(move |req| async move {
            if req.quote_symbol == primary {
                return (req, Ok(primary_quote.clone()));
            }
            (req, fetch_with_timeout(source, req.quote_symbol, timeout).await)
        });
        let results: Vec<(ReadingRequest, EngineResult<Quote>)> = join_all(fetches).await;

        let mut updates = Vec::new();
        for (req, result) in results {
            match result {
                Ok(reading) => updates.extend(readings::updates_for(set, req.kind, &reading)),
                Err(e) => {
                    warn!(symbol = %symbol, reading = req.quote_symbol, error = %e, "macro reading failed, keeping previous value");
                    state.push_error_with_code(e.to_string(), Some(e.code().to_string()));
                }
            }
        }

        // Pairs are scored base against quote; metals and indices on the
        // basket. Agreeing quote sentiment then lifts confidence.
        let prediction = match pair_legs(&symbol) {
            Some((base, counter)) => {
                state
                    .factors
                    .apply_and_predict_pair(set, &updates, base, counter)?
            }
            None => state.factors.apply_and_predict(set, &updates)?,
        }
        .confirm_with(quote.sentiment);
        if !updates.is_empty() {
            state.increment_version();
        }

        debug!(
            symbol = %symbol,
            set = %set,
            score = prediction.score,
            bias = %prediction.bias,
            readings = updates.len(),
            "fundamental prediction"
        );

        Ok(PairAnalysis {
            name: display_name(&symbol).unwrap_or(symbol.as_str()).to_string(),
            symbol,
            factor_set: set,
            prediction,
            quote,
        })
    }

    /// Expected range around `price` from the current factor snapshot.
    pub fn compute_volatility(
        state: &Arc<AppState>,
        symbol: &str,
        price: f64,
    ) -> EngineResult<VolatilityEstimate> {
        let symbol = normalize_symbol(symbol)?;
        let snapshot = state.factors.snapshot(FactorSet::for_symbol(&symbol));
        state.volatility.predict(&symbol, &snapshot, price)
    }

    /// Enhance a technical signal with fundamentals and volatility.
    pub async fn enhance(
        state: &Arc<AppState>,
        technical: Option<TechnicalSignal>,
    ) -> EngineResult<Enhancement> {
        let technical = technical.ok_or_else(|| EngineError::invalid("missing signal"))?;
        technical.validate()?;

        let analysis = match Self::compute_fundamental_prediction(state, &technical.symbol).await {
            Ok(a) => a,
            Err(EngineError::SourceUnavailable(reason)) => {
                warn!(symbol = %technical.symbol, reason = %reason, "returning technical-only signal");
                state.push_error_with_code(reason.clone(), Some("source_unavailable".to_string()));
                return Ok(Enhancement::Unenhanced {
                    signal: technical,
                    reason,
                });
            }
            Err(e) => return Err(e),
        };

        let volatility = state.volatility.predict(
            &analysis.symbol,
            &analysis.prediction.factors,
            technical.entry,
        )?;

        let enhanced = state.fusion.fuse(
            Some(&technical),
            &analysis.prediction,
            &volatility,
            Some(analysis.quote.sentiment),
            Utc::now(),
        )?;

        // ── Best-effort side effects ─────────────────────────────────────
        let id = match state.store.append(enhanced.clone()) {
            Ok(id) => {
                state.increment_version();
                Some(id)
            }
            Err(e) => {
                warn!(symbol = %enhanced.symbol, error = %e, "failed to persist signal");
                state.push_error_with_code(format!("{e:#}"), Some("store".to_string()));
                None
            }
        };

        if let Err(e) = state.notifier.notify(&enhanced).await {
            warn!(symbol = %enhanced.symbol, channel = state.notifier.name(), error = %e, "alert not delivered");
            state.push_error_with_code(e.to_string(), Some(e.code().to_string()));
        }

        info!(
            symbol = %enhanced.symbol,
            confidence = enhanced.confidence,
            confluence = %enhanced.confluence,
            volatility = volatility.score,
            "signal enhanced"
        );

        Ok(Enhancement::Enhanced {
            signal: enhanced,
            id,
        })
    }

    /// Refresh one currency's strength factor from its USD pair.
    pub async fn currency_strength(
        state: &Arc<AppState>,
        currency: &str,
    ) -> EngineResult<CurrencyStrength> {
        let currency = currency.trim().to_uppercase();
        let req = readings::request_for_currency(&currency)
            .ok_or_else(|| EngineError::invalid(format!("unsupported currency {currency:?}")))?;
        let timeout = state.runtime_config.read().source_timeout();

        let reading = fetch_with_timeout(state.quote_source.as_ref(), req.quote_symbol, timeout).await?;
        let updates = readings::updates_for(FactorSet::Currency, req.kind, &reading);
        let prediction = state.factors.apply_and_predict(FactorSet::Currency, &updates)?;
        state.increment_version();

        let strength = prediction
            .factors
            .iter()
            .find(|f| f.name == currency)
            .map(|f| f.value)
            .unwrap_or_default();

        Ok(CurrencyStrength {
            currency,
            reading,
            strength,
            prediction,
        })
    }

    /// Analyse the configured watch-list concurrently.
    pub async fn market_sentiment(state: &Arc<AppState>) -> MarketSentiment {
        let symbols = state.runtime_config.read().symbols.clone();

        let analyses = join_all(
            symbols
                .iter()
                .map(|s| Self::compute_fundamental_prediction(state, s)),
        )
        .await;

        let mut out = MarketSentiment {
            overall: Bias::Neutral,
            bullish: 0,
            bearish: 0,
            neutral: 0,
            symbols: Vec::new(),
            skipped: Vec::new(),
        };
        for (symbol, result) in symbols.iter().zip(analyses) {
            match result {
                Ok(a) => {
                    match a.prediction.bias {
                        Bias::Bullish => out.bullish += 1,
                        Bias::Bearish => out.bearish += 1,
                        Bias::Neutral => out.neutral += 1,
                    }
                    out.symbols.push(SymbolSentiment {
                        symbol: a.symbol,
                        bias: a.prediction.bias,
                        confidence: a.prediction.confidence,
                        score: a.prediction.score,
                        quote_sentiment: a.quote.sentiment,
                    });
                }
                Err(e) => {
                    debug!(symbol = %symbol, error = %e, "skipped in market sentiment");
                    out.skipped.push(symbol.clone());
                }
            }
        }

        out.overall = if out.bullish > out.bearish {
            Bias::Bullish
        } else if out.bearish > out.bullish {
            Bias::Bearish
        } else {
            Bias::Neutral
        };
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::UnavailableSource;
    use crate::testing::{state_with, RecordingNotifier, ScriptedSource};
    use crate::types::Confluence;

    fn gold_source() -> ScriptedSource {
        ScriptedSource::new()
            .with("XAUUSD", 2650.0, 0.3)
            .with("DXY", 106.0, 0.1)
            .with("US10Y", 4.8, 0.0)
    }

    fn gold_long() -> TechnicalSignal {
        TechnicalSignal {
            symbol: "xauusd".to_string(),
            bias: Bias::Bullish,
            entry: 2650.0,
            tp1: 2665.0,
            tp2: 2680.0,
            tp3: 2700.0,
            sl: 2635.0,
            confidence: 80.0,
            timeframe: None,
            pattern: None,
        }
    }

    #[tokio::test]
    async fn gold_fundamentals_from_dollar_and_yields() {
        let state = state_with(Arc::new(gold_source()), Arc::default());
        let a = Analyzer::compute_fundamental_prediction(&state, "xauusd").await.unwrap();
        assert_eq!(a.symbol, "XAUUSD");
        assert_eq!(a.name, "Gold");
        assert_eq!(a.factor_set, FactorSet::Gold);
        // USD, DXY and YIELDS all -1: raw -0.75 -> 12.5
        assert_eq!(a.prediction.score, 12.5);
        assert_eq!(a.prediction.bias, Bias::Bearish);
        assert_eq!(a.prediction.confidence, 87.5);
        assert_eq!(a.quote.price, 2650.0);
    }

    #[tokio::test]
    async fn forex_pair_reuses_its_own_quote() {
        let source = Arc::new(
            ScriptedSource::new()
                .with("EURUSD", 1.08, 0.8)
                .with("DXY", 94.0, -0.4),
        );
        let state = state_with(source.clone(), Arc::default());
        let a = Analyzer::compute_fundamental_prediction(&state, "EURUSD").await.unwrap();
        // EUR +1 against USD -1: diff 2
        assert_eq!(a.prediction.score, 100.0);
        assert_eq!(a.prediction.bias, Bias::Bullish);
        assert_eq!(a.prediction.confidence, 95.0);
        assert_eq!(source.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn strong_dollar_splits_pairs_by_side() {
        let source = ScriptedSource::new()
            .with("DXY", 106.0, 0.0)
            .with("EURUSD", 1.08, 0.0)
            .with("USDJPY", 151.0, 0.0);
        let state = state_with(Arc::new(source), Arc::default());

        let eurusd = Analyzer::compute_fundamental_prediction(&state, "EURUSD").await.unwrap();
        assert_eq!(eurusd.prediction.bias, Bias::Bearish);
        assert_eq!(eurusd.prediction.confidence, 85.0);

        let usdjpy = Analyzer::compute_fundamental_prediction(&state, "USDJPY").await.unwrap();
        assert_eq!(usdjpy.prediction.bias, Bias::Bullish);
        assert_eq!(usdjpy.prediction.confidence, 85.0);
    }

    #[tokio::test]
    async fn strong_dollar_against_euro_long_is_weak_confluence() {
        let source = ScriptedSource::new()
            .with("DXY", 106.0, 0.0)
            .with("EURUSD", 1.08, 0.0);
        let state = state_with(Arc::new(source), Arc::default());
        let long = TechnicalSignal {
            symbol: "EURUSD".to_string(),
            bias: Bias::Bullish,
            entry: 1.08,
            tp1: 1.085,
            tp2: 1.09,
            tp3: 1.1,
            sl: 1.075,
            confidence: 80.0,
            timeframe: None,
            pattern: None,
        };
        let Enhancement::Enhanced { signal, .. } = Analyzer::enhance(&state, Some(long)).await.unwrap()
        else {
            panic!("expected enhanced signal");
        };
        assert_eq!(signal.fundamental_bias, Bias::Bearish);
        assert_eq!(signal.confluence, Confluence::Weak);
    }

    #[tokio::test]
    async fn agreeing_quote_sentiment_lifts_confidence() {
        let source = ScriptedSource::new()
            .with("DXY", 106.0, 0.0)
            .with("EURUSD", 1.08, 0.0)
            .with_sentiment("EURUSD", Bias::Bearish)
            .with("GBPUSD", 1.27, -0.9)
            .with_sentiment("GBPUSD", Bias::Bearish)
            .with("USDJPY", 151.0, 0.0)
            .with_sentiment("USDJPY", Bias::Bearish);
        let state = state_with(Arc::new(source), Arc::default());

        // 85 + 10
        let eurusd = Analyzer::compute_fundamental_prediction(&state, "EURUSD").await.unwrap();
        assert_eq!(eurusd.prediction.confidence, 95.0);
        // GBP -1 against USD +1: 95 + 10, capped
        let gbpusd = Analyzer::compute_fundamental_prediction(&state, "GBPUSD").await.unwrap();
        assert_eq!(gbpusd.prediction.confidence, 98.0);
        // Bullish view, bearish quote: unchanged
        let usdjpy = Analyzer::compute_fundamental_prediction(&state, "USDJPY").await.unwrap();
        assert_eq!(usdjpy.prediction.bias, Bias::Bullish);
        assert_eq!(usdjpy.prediction.confidence, 85.0);
    }

    #[tokio::test]
    async fn dollar_stress_skips_crosses_without_usd() {
        let source = ScriptedSource::new()
            .with("DXY", 106.0, 0.0)
            .with("EURUSD", 1.08, 0.0);
        let state = state_with(Arc::new(source), Arc::default());
        Analyzer::compute_fundamental_prediction(&state, "EURUSD").await.unwrap();

        assert_eq!(Analyzer::compute_volatility(&state, "EURUSD", 1.08).unwrap().score, 60.0);
        assert_eq!(Analyzer::compute_volatility(&state, "EURJPY", 160.0).unwrap().score, 55.0);
        assert_eq!(Analyzer::compute_volatility(&state, "EURGBP", 0.85).unwrap().score, 50.0);
    }

    #[tokio::test]
    async fn failed_reading_keeps_previous_value() {
        let source = ScriptedSource::new()
            .with("XAUUSD", 2650.0, 0.0)
            .with("DXY", 106.0, 0.0);
        let state = state_with(Arc::new(source), Arc::default());
        state.factors.set_value(FactorSet::Gold, "YIELDS", 1.0).unwrap();

        let a = Analyzer::compute_fundamental_prediction(&state, "XAUUSD").await.unwrap();
        let yields = a.prediction.factors.iter().find(|f| f.name == "YIELDS").unwrap();
        assert_eq!(yields.value, 1);
        assert_eq!(state.recent_errors.read().len(), 1);
    }

    #[tokio::test]
    async fn missing_primary_quote_is_unavailable() {
        let state = state_with(Arc::new(ScriptedSource::new()), Arc::default());
        let err = Analyzer::compute_fundamental_prediction(&state, "GBPUSD").await.unwrap_err();
        assert!(matches!(err, EngineError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn rejects_malformed_symbol() {
        let state = state_with(Arc::new(gold_source()), Arc::default());
        assert!(matches!(
            Analyzer::compute_fundamental_prediction(&state, "XAU/USD").await,
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn enhance_fuses_persists_and_notifies() {
        let notifier = Arc::new(RecordingNotifier::default());
        let state = state_with(Arc::new(gold_source()), notifier.clone());

        let out = Analyzer::enhance(&state, Some(gold_long())).await.unwrap();
        let Enhancement::Enhanced { signal, id } = out else {
            panic!("expected enhanced signal");
        };
        // Opposing views: 80 * 0.7
        assert_eq!(signal.confidence, 56.0);
        assert_eq!(signal.confluence, Confluence::Weak);
        // Commodity 60 + dollar 15 + yields 10
        assert_eq!(signal.volatility.score, 85.0);
        assert_eq!(signal.tp1, 2668.0);
        assert_eq!(signal.sl, 2635.0);
        assert_eq!(signal.symbol, "XAUUSD");

        let id = id.unwrap();
        assert_eq!(state.store.list().next().unwrap().id, id);
        assert_eq!(notifier.sent.read().len(), 1);
    }

    #[tokio::test]
    async fn enhance_falls_back_when_source_down() {
        let notifier = Arc::new(RecordingNotifier::default());
        let state = state_with(Arc::new(UnavailableSource), notifier.clone());

        let out = Analyzer::enhance(&state, Some(gold_long())).await.unwrap();
        match out {
            Enhancement::Unenhanced { signal, reason } => {
                assert_eq!(signal, gold_long());
                assert!(reason.contains("XAUUSD"));
            }
            other => panic!("expected fallback, got {other:?}"),
        }
        assert_eq!(state.store.list().count(), 0);
        assert!(notifier.sent.read().is_empty());
    }

    #[tokio::test]
    async fn enhance_requires_signal() {
        let state = state_with(Arc::new(gold_source()), Arc::default());
        let err = Analyzer::enhance(&state, None).await.unwrap_err();
        assert_eq!(err, EngineError::invalid("missing signal"));
    }

    #[tokio::test]
    async fn volatility_uses_current_snapshot() {
        let state = state_with(Arc::new(gold_source()), Arc::default());
        let before = Analyzer::compute_volatility(&state, "XAUUSD", 2650.0).unwrap();
        assert_eq!(before.score, 60.0);
        Analyzer::compute_fundamental_prediction(&state, "XAUUSD").await.unwrap();
        let after = Analyzer::compute_volatility(&state, "XAUUSD", 2650.0).unwrap();
        assert_eq!(after.score, 85.0);
        assert!(Analyzer::compute_volatility(&state, "XAUUSD", 0.0).is_err());
    }

    #[tokio::test]
    async fn jpy_strength_is_inverted() {
        let source = ScriptedSource::new().with("USDJPY", 151.2, 0.9);
        let state = state_with(Arc::new(source), Arc::default());
        let s = Analyzer::currency_strength(&state, "jpy").await.unwrap();
        assert_eq!(s.currency, "JPY");
        assert_eq!(s.strength, -1);
        assert!(Analyzer::currency_strength(&state, "CHF").await.is_err());
    }

    #[tokio::test]
    async fn sentiment_skips_failures() {
        let source = gold_source().with("USDJPY", 150.0, 0.0);
        let state = state_with(Arc::new(source), Arc::default());
        state.runtime_config.write().symbols =
            vec!["XAUUSD".to_string(), "EURUSD".to_string(), "USDJPY".to_string()];

        let m = Analyzer::market_sentiment(&state).await;
        assert_eq!(m.skipped, vec!["EURUSD"]);
        assert_eq!(m.symbols.len(), 2);
        // Gold bearish on a strong dollar, USDJPY bullish on the same reading.
        assert_eq!(m.bearish, 1);
        assert_eq!(m.bullish, 1);
        assert_eq!(m.overall, Bias::Neutral);
    }
}
