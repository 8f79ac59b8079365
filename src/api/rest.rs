// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// `/_healthz`          liveness probe
// `/stock-data/`       bars + requested indicators for one symbol
// `/gemini/chat`       streamed chat relay (see `api::chat`)
//
// CORS is permissive; the chart front end is served from another origin.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::chat;
use crate::api::error::ApiError;
use crate::app_state::AppState;
use crate::indicators::engine::compute_indicators;
use crate::service_config::MarketDataConfig;
use crate::types::ChartPayload;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/_healthz", get(health))
        .route("/stock-data", get(stock_data))
        .route("/stock-data/", get(stock_data))
        .route("/gemini/chat", post(chat::chat))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server_time: i64,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Stock data
// =============================================================================

/// Query parameters of `/stock-data/`.  `indicators` may repeat.
#[derive(Debug, Default, PartialEq)]
struct StockDataQuery {
    symbol: Option<String>,
    period: Option<String>,
    interval: Option<String>,
    indicators: Vec<String>,
}

impl StockDataQuery {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "symbol" => query.symbol = Some(value),
                "period" => query.period = Some(value),
                "interval" => query.interval = Some(value),
                "indicators" => query.indicators.push(value),
                _ => {}
            }
        }
        query
    }

    fn resolve(self, defaults: &MarketDataConfig) -> (String, String, String, Vec<String>) {
        (
            self.symbol.unwrap_or_else(|| defaults.default_symbol.clone()),
            self.period.unwrap_or_else(|| defaults.default_period.clone()),
            self.interval.unwrap_or_else(|| defaults.default_interval.clone()),
            self.indicators,
        )
    }
}

async fn stock_data(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ChartPayload>, ApiError> {
    let (symbol, period, interval, indicators) =
        StockDataQuery::from_pairs(pairs).resolve(&state.config.market_data);

    let series = state
        .market_data
        .fetch_series(&symbol, &period, &interval)
        .await
        .map_err(|e| {
            warn!(symbol = %symbol, error = %e, "stock data fetch failed");
            ApiError::from(e)
        })?;

    let computed = compute_indicators(&series, &indicators);
    info!(
        symbol = %symbol,
        bars = series.len(),
        requested = indicators.len(),
        computed = computed.len(),
        "stock data served"
    );

    Ok(Json(ChartPayload::new(&series, computed)))
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::service_config::ServiceConfig;

    const CHART: &str = r#"{ "chart": { "result": [{
        "timestamp": [1000, 2000, 3000, 4000],
        "indicators": { "quote": [{
            "open":  [1.0, 2.0, 3.0, 4.0],
            "high":  [1.5, 2.5, 3.5, 4.5],
            "low":   [0.5, 1.5, 2.5, 3.5],
            "close": [1.0, 2.0, 3.0, 4.0]
        }] }
    }], "error": null } }"#;

    const NOT_FOUND: &str = r#"{ "chart": { "result": null,
        "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" } } }"#;

    /// Serve a fake chart provider: symbol `NONE` is unknown, anything else
    /// gets the four-bar fixture.
    async fn fake_provider() -> String {
        use axum::extract::Path;

        let app = Router::new().route(
            "/v8/finance/chart/:symbol",
            get(|Path(symbol): Path<String>| async move {
                if symbol == "NONE" {
                    (StatusCode::NOT_FOUND, NOT_FOUND)
                } else {
                    (StatusCode::OK, CHART)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn app(market_data_url: String, api_key: Option<&str>) -> Router {
        let mut config = ServiceConfig::default();
        config.market_data.base_url = market_data_url;
        config.chat.base_url = "http://127.0.0.1:1".to_string();
        config.chat.api_key = api_key.map(str::to_string);
        router(Arc::new(AppState::new(config).unwrap()))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_chat(app: Router, body: serde_json::Value) -> String {
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/gemini/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn query_collects_repeated_indicators() {
        let pairs = vec![
            ("symbol".to_string(), "MSFT".to_string()),
            ("indicators".to_string(), "SMA(20)".to_string()),
            ("indicators".to_string(), "RSI(14)".to_string()),
            ("unused".to_string(), "x".to_string()),
        ];
        let (symbol, period, interval, indicators) =
            StockDataQuery::from_pairs(pairs).resolve(&MarketDataConfig::default());
        assert_eq!(symbol, "MSFT");
        assert_eq!(period, "1y");
        assert_eq!(interval, "1d");
        assert_eq!(indicators, vec!["SMA(20)", "RSI(14)"]);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = get_json(app("http://127.0.0.1:1".into(), None).await, "/_healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn stock_data_returns_bars_and_indicators() {
        let app = app(fake_provider().await, None).await;
        let (status, body) =
            get_json(app, "/stock-data/?symbol=AAPL&indicators=SMA(2)&indicators=FOO(3)").await;

        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 4);
        assert_eq!(data[0]["time"], 1000.0);
        assert_eq!(data[3]["close"], 4.0);

        let indicators = body["indicators"].as_array().unwrap();
        assert_eq!(indicators.len(), 1);
        assert_eq!(indicators[0]["name"], "SMA(2)");
        let points = indicators[0]["data"].as_array().unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0]["time"], 2000.0);
        assert_eq!(points[0]["value"], 1.5);
    }

    #[tokio::test]
    async fn stock_data_without_trailing_slash() {
        let (status, body) = get_json(app(fake_provider().await, None).await, "/stock-data").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["indicators"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_symbol_is_404() {
        let (status, body) =
            get_json(app(fake_provider().await, None).await, "/stock-data/?symbol=NONE").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "No data found for the given symbol.");
    }

    #[tokio::test]
    async fn unreachable_provider_is_500() {
        let (status, body) = get_json(app("http://127.0.0.1:1".into(), None).await, "/stock-data/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().starts_with("An error occurred"));
    }

    #[tokio::test]
    async fn chat_without_key_reports_not_configured() {
        let app = app("http://127.0.0.1:1".into(), None).await;
        let body = post_chat(app, serde_json::json!({ "messages": [{ "role": "user", "content": "hi" }] })).await;
        assert_eq!(body, "data: {\"error\":\"Gemini API not configured.\"}\n\n");
    }

    #[tokio::test]
    async fn chat_with_no_messages_reports_error() {
        let app = app("http://127.0.0.1:1".into(), Some("test-key")).await;
        let body = post_chat(app, serde_json::json!({ "messages": [] })).await;
        assert_eq!(
            body,
            "data: {\"error\":\"An error occurred: conversation has no messages\"}\n\n"
        );
    }
}
