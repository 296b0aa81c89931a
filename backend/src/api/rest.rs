// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Handlers are thin: parse, delegate to `Analyzer` / `AppState`, wrap the
// result in the envelope.
//
// CORS is configured permissively; the chart front end is served from a
// different origin.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{ApiResponse, ApiResult};
use crate::analyzer::{
    Analyzer, CurrencyStrength, Enhancement, MarketSentiment, PairAnalysis,
};
use crate::app_state::{AppState, HealthSnapshot};
use crate::factors::{Factor, FactorSet, FundamentalPrediction};
use crate::sessions::{AutoAnalysisSession, DEFAULT_INTERVAL_SECS};
use crate::signals::{EnhancedSignal, TechnicalSignal};
use crate::store::StoredSignal;
use crate::types::SUPPORTED_SYMBOLS;
use crate::volatility::VolatilityEstimate;

const DEFAULT_SIGNAL_LIMIT: usize = 50;
const MAX_SIGNAL_LIMIT: usize = 500;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS, request tracing and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        // ── Analysis ────────────────────────────────────────────────
        .route("/api/analyze", post(analyze))
        .route("/api/enhance-signal", post(enhance_signal))
        .route("/api/currency-strength", get(currency_strength))
        .route("/api/volatility", post(volatility))
        .route("/api/market-sentiment", get(market_sentiment))
        // ── Factors & symbols ───────────────────────────────────────
        .route("/api/factors", get(get_factors).post(set_factor))
        .route("/api/symbols", get(symbols))
        // ── Stored signals ──────────────────────────────────────────
        .route("/api/signals", get(list_signals))
        .route("/api/signals/:id", delete(delete_signal))
        // ── Auto-analysis intents ───────────────────────────────────
        .route("/api/start-auto-analysis", post(start_auto_analysis))
        .route("/api/stop-auto-analysis", post(stop_auto_analysis))
        .route("/api/auto-analysis", get(auto_analysis))
        // ── Middleware & State ───────────────────────────────────────
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> ApiResponse<HealthSnapshot> {
    ApiResponse::ok(state.build_health())
}

// =============================================================================
// Analysis
// =============================================================================

#[derive(Debug, Deserialize)]
struct SymbolRequest {
    symbol: String,
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SymbolRequest>,
) -> ApiResult<PairAnalysis> {
    let analysis = Analyzer::compute_fundamental_prediction(&state, &req.symbol).await?;
    Ok(ApiResponse::ok(analysis))
}

#[derive(Debug, Deserialize)]
struct EnhanceRequest {
    #[serde(default)]
    signal: Option<TechnicalSignal>,
}

#[derive(Serialize)]
struct StoredView {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(flatten)]
    signal: EnhancedSignal,
}

#[derive(Serialize)]
#[serde(untagged)]
enum EnhanceView {
    Enhanced(StoredView),
    Technical(TechnicalSignal),
}

async fn enhance_signal(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnhanceRequest>,
) -> ApiResult<EnhanceView> {
    match Analyzer::enhance(&state, req.signal).await? {
        Enhancement::Enhanced { signal, id } => {
            Ok(ApiResponse::ok(EnhanceView::Enhanced(StoredView { id, signal })).enhanced(true))
        }
        Enhancement::Unenhanced { signal, reason } => Ok(ApiResponse::ok(
            EnhanceView::Technical(signal),
        )
        .enhanced(false)
        .message(format!("fundamental data unavailable: {reason}"))),
    }
}

#[derive(Debug, Deserialize)]
struct CurrencyQuery {
    #[serde(default)]
    currency: Option<String>,
}

async fn currency_strength(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CurrencyQuery>,
) -> ApiResult<CurrencyStrength> {
    let currency = q.currency.unwrap_or_else(|| "USD".to_string());
    let strength = Analyzer::currency_strength(&state, &currency).await?;
    Ok(ApiResponse::ok(strength))
}

#[derive(Debug, Deserialize)]
struct VolatilityRequest {
    symbol: String,
    current_price: f64,
}

async fn volatility(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VolatilityRequest>,
) -> ApiResult<VolatilityEstimate> {
    let estimate = Analyzer::compute_volatility(&state, &req.symbol, req.current_price)?;
    Ok(ApiResponse::ok(estimate))
}

async fn market_sentiment(State(state): State<Arc<AppState>>) -> ApiResponse<MarketSentiment> {
    ApiResponse::ok(Analyzer::market_sentiment(&state).await)
}

// =============================================================================
// Factors & symbols
// =============================================================================

#[derive(Debug, Serialize)]
struct FactorView {
    set: FactorSet,
    factors: Vec<Factor>,
    prediction: FundamentalPrediction,
}

#[derive(Debug, Deserialize)]
struct FactorQuery {
    #[serde(default)]
    set: Option<FactorSet>,
}

async fn get_factors(
    State(state): State<Arc<AppState>>,
    Query(q): Query<FactorQuery>,
) -> ApiResponse<FactorView> {
    let set = q.set.unwrap_or(FactorSet::Currency);
    let prediction = state.factors.predict(set);
    ApiResponse::ok(FactorView {
        set,
        factors: prediction.factors.clone(),
        prediction,
    })
}

#[derive(Debug, Deserialize)]
struct FactorUpdate {
    set: FactorSet,
    name: String,
    value: f64,
}

async fn set_factor(
    State(state): State<Arc<AppState>>,
    Json(update): Json<FactorUpdate>,
) -> ApiResult<FactorView> {
    let factors = state.factors.set_value(update.set, &update.name, update.value)?;
    state.increment_version();
    info!(set = %update.set, name = %update.name, value = update.value, "factor set manually");

    Ok(ApiResponse::ok(FactorView {
        set: update.set,
        factors,
        prediction: state.factors.predict(update.set),
    }))
}

#[derive(Debug, Serialize)]
struct SymbolInfo {
    symbol: &'static str,
    name: &'static str,
}

async fn symbols() -> ApiResponse<Vec<SymbolInfo>> {
    ApiResponse::ok(
        SUPPORTED_SYMBOLS
            .iter()
            .map(|&(symbol, name)| SymbolInfo { symbol, name })
            .collect(),
    )
}

// =============================================================================
// Stored signals
// =============================================================================

#[derive(Debug, Deserialize)]
struct LimitQuery {
    #[serde(default)]
    limit: Option<usize>,
}

async fn list_signals(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LimitQuery>,
) -> ApiResponse<Vec<StoredSignal>> {
    let limit = q.limit.unwrap_or(DEFAULT_SIGNAL_LIMIT).min(MAX_SIGNAL_LIMIT);
    ApiResponse::ok(state.store.list().take(limit).collect())
}

#[derive(Debug, Serialize)]
struct Removed {
    id: String,
}

async fn delete_signal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Removed> {
    state.store.remove(&id)?;
    state.increment_version();
    Ok(ApiResponse::ok(Removed { id }).message("signal deleted"))
}

// =============================================================================
// Auto-analysis intents
// =============================================================================

#[derive(Debug, Deserialize)]
struct StartAutoRequest {
    symbol: String,
    #[serde(default, alias = "interval_secs")]
    interval: Option<u64>,
}

async fn start_auto_analysis(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartAutoRequest>,
) -> ApiResult<AutoAnalysisSession> {
    let interval = req.interval.unwrap_or(DEFAULT_INTERVAL_SECS);
    let session = state.sessions.start(&req.symbol, interval)?;
    Ok(ApiResponse::ok(session).message("auto-analysis recorded"))
}

async fn stop_auto_analysis(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SymbolRequest>,
) -> ApiResult<AutoAnalysisSession> {
    let session = state.sessions.stop(&req.symbol)?;
    Ok(ApiResponse::ok(session).message("auto-analysis stopped"))
}

async fn auto_analysis(State(state): State<Arc<AppState>>) -> ApiResponse<Vec<AutoAnalysisSession>> {
    ApiResponse::ok(state.sessions.list())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::UnavailableSource;
    use crate::testing::{state_with, RecordingNotifier, ScriptedSource};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn gold_state() -> Arc<AppState> {
        let source = ScriptedSource::new()
            .with("XAUUSD", 2650.0, 0.3)
            .with("DXY", 106.0, 0.1)
            .with("US10Y", 4.8, 0.0);
        state_with(Arc::new(source), Arc::new(RecordingNotifier::default()))
    }

    async fn call(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn gold_signal_json() -> Value {
        json!({
            "symbol": "XAUUSD", "bias": "bullish",
            "entry": "2650.00", "tp1": "2665", "tp2": 2680, "tp3": 2700, "sl": 2635,
            "confidence": 80
        })
    }

    #[tokio::test]
    async fn health_reports_source() {
        let state = gold_state();
        let (status, body) = call(&state, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["source"], "scripted");
    }

    #[tokio::test]
    async fn analyze_returns_prediction() {
        let state = gold_state();
        let (status, body) = call(&state, post("/api/analyze", json!({"symbol": "XAUUSD"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["prediction"]["bias"], "bearish");
        assert_eq!(body["data"]["prediction"]["score"], 12.5);
        assert_eq!(body["data"]["factor_set"], "gold");
    }

    #[tokio::test]
    async fn analyze_unavailable_is_503() {
        let state = gold_state();
        let (status, body) = call(&state, post("/api/analyze", json!({"symbol": "GBPUSD"}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "source_unavailable");
    }

    #[tokio::test]
    async fn enhance_signal_persists() {
        let state = gold_state();
        let (status, body) = call(
            &state,
            post("/api/enhance-signal", json!({ "signal": gold_signal_json() })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enhanced"], true);
        assert_eq!(body["data"]["tp1"], 2668.0);
        assert_eq!(body["data"]["confluence"], "weak");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (_, listed) = call(&state, get("/api/signals?limit=10")).await;
        assert_eq!(listed["data"][0]["id"], id.as_str());
        let (_, health) = call(&state, get("/health")).await;
        assert_eq!(health["data"]["stored_signals"], 1);

        let del = Request::builder()
            .method("DELETE")
            .uri(format!("/api/signals/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(&state, del).await;
        assert_eq!(status, StatusCode::OK);

        let again = Request::builder()
            .method("DELETE")
            .uri(format!("/api/signals/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(&state, again).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn enhance_signal_falls_back_unenhanced() {
        let state = state_with(Arc::new(UnavailableSource), Arc::new(RecordingNotifier::default()));
        let (status, body) = call(
            &state,
            post("/api/enhance-signal", json!({ "signal": gold_signal_json() })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["enhanced"], false);
        assert_eq!(body["data"]["tp1"], 2665.0);
        assert!(body["data"].get("fundamental_bias").is_none());
        assert!(body["message"].as_str().unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn enhance_without_signal_is_400() {
        let state = gold_state();
        let (status, body) = call(&state, post("/api/enhance-signal", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");
    }

    #[tokio::test]
    async fn malformed_json_is_client_error() {
        let state = gold_state();
        let req = Request::builder()
            .method("POST")
            .uri("/api/analyze")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = call(&state, req).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn volatility_endpoint() {
        let state = gold_state();
        let (status, body) = call(
            &state,
            post("/api/volatility", json!({"symbol": "USDJPY", "current_price": 150.0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["score"], 55.0);
        assert_eq!(body["data"]["expected_high"], 158.25);

        let (status, _) = call(
            &state,
            post("/api/volatility", json!({"symbol": "USDJPY", "current_price": -1.0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn factor_update_and_unknown_factor() {
        let state = gold_state();
        let (status, body) = call(
            &state,
            post("/api/factors", json!({"set": "currency", "name": "usd", "value": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["prediction"]["score"], 67.5);
        assert_eq!(body["data"]["prediction"]["bias"], "bullish");

        let (status, body) = call(
            &state,
            post("/api/factors", json!({"set": "currency", "name": "CHF", "value": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "unknown_factor");

        let (_, body) = call(&state, get("/api/factors?set=economic")).await;
        assert_eq!(body["data"]["factors"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn currency_strength_defaults_to_usd() {
        let state = gold_state();
        let (status, body) = call(&state, get("/api/currency-strength")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["currency"], "USD");
        assert_eq!(body["data"]["strength"], 1);
    }

    #[tokio::test]
    async fn symbols_listed() {
        let state = gold_state();
        let (_, body) = call(&state, get("/api/symbols")).await;
        let list = body["data"].as_array().unwrap();
        assert_eq!(list.len(), SUPPORTED_SYMBOLS.len());
        assert_eq!(list[0]["symbol"], "XAUUSD");
    }

    #[tokio::test]
    async fn auto_analysis_lifecycle() {
        let state = gold_state();
        let (status, body) = call(
            &state,
            post("/api/start-auto-analysis", json!({"symbol": "eurusd", "interval": 600})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["symbol"], "EURUSD");

        let (_, body) = call(&state, get("/api/auto-analysis")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) =
            call(&state, post("/api/stop-auto-analysis", json!({"symbol": "EURUSD"}))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) =
            call(&state, post("/api/stop-auto-analysis", json!({"symbol": "EURUSD"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn market_sentiment_endpoint() {
        let state = gold_state();
        state.runtime_config.write().symbols = vec!["XAUUSD".to_string(), "GBPUSD".to_string()];
        let (status, body) = call(&state, get("/api/market-sentiment")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["overall"], "bearish");
        assert_eq!(body["data"]["skipped"][0], "GBPUSD");
    }
}
