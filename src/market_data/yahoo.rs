// =============================================================================
// Yahoo Finance chart client — historical OHLC bars
// =============================================================================
//
// GET {base_url}/v8/finance/chart/{symbol}?range={period}&interval={interval}
//
// The response carries parallel arrays (`timestamp`, `open`, `high`, `low`,
// `close`).  Rows with any null OHLC value are dropped, then bars are sorted
// by time and duplicate timestamps collapse to the last row, so the result
// always satisfies the `TimeSeries` ordering invariant.
// =============================================================================

use std::time::Duration;

use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::service_config::MarketDataConfig;
use crate::types::{Bar, SeriesError, TimeSeries};

/// The chart API rejects requests without a browser-like user agent.
const CLIENT_USER_AGENT: &str = "Mozilla/5.0 (compatible; chart-indicator-service/0.1)";

/// Failures while fetching a series from the provider.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no data found for symbol {symbol}")]
    NoData { symbol: String },

    #[error("market data provider error {code}: {description}")]
    Provider { code: String, description: String },

    #[error("market data provider returned {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },

    #[error("invalid market data URL: {0}")]
    InvalidUrl(String),

    #[error("market data request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode market data response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("market data out of order: {0}")]
    Series(#[from] SeriesError),
}

// -----------------------------------------------------------------------------
// Wire format
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Option<ChartIndicators>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

/// HTTP client for the Yahoo Finance chart endpoint.
#[derive(Clone)]
pub struct YahooClient {
    base_url: String,
    client: reqwest::Client,
}

impl YahooClient {
    /// Build a client from configuration.
    pub fn new(config: &MarketDataConfig) -> anyhow::Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build reqwest client for YahooClient")?;

        debug!(base_url = %config.base_url, "YahooClient initialised");

        Ok(Self {
            base_url: config.base_url.clone(),
            client,
        })
    }

    fn chart_url(&self, symbol: &str) -> Result<Url, FetchError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| FetchError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        Ok(url)
    }

    /// Fetch `symbol` over `period` (e.g. `1y`) at `interval` (e.g. `1d`).
    #[instrument(skip(self), name = "yahoo::fetch_series")]
    pub async fn fetch_series(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<TimeSeries, FetchError> {
        let url = self.chart_url(symbol)?;

        let resp = self
            .client
            .get(url)
            .query(&[("range", period), ("interval", interval)])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        let envelope: ChartEnvelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => return Err(FetchError::Status { status, body }),
            Err(e) => return Err(FetchError::Decode(e)),
        };

        let bars = bars_from_chart(envelope, symbol)?;
        if bars.is_empty() {
            return Err(FetchError::NoData {
                symbol: symbol.to_string(),
            });
        }

        debug!(symbol, bars = bars.len(), "chart data retrieved");
        Ok(TimeSeries::new(bars)?)
    }
}

// -----------------------------------------------------------------------------
// Normalisation
// -----------------------------------------------------------------------------

/// Turn a decoded chart envelope into sorted, de-duplicated bars.
fn bars_from_chart(envelope: ChartEnvelope, symbol: &str) -> Result<Vec<Bar>, FetchError> {
    if let Some(err) = envelope.chart.error {
        if err.code.eq_ignore_ascii_case("not found") {
            return Err(FetchError::NoData {
                symbol: symbol.to_string(),
            });
        }
        return Err(FetchError::Provider {
            code: err.code,
            description: err.description,
        });
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let quote = result
        .indicators
        .and_then(|i| i.quote.into_iter().next())
        .unwrap_or_default();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    let mut dropped = 0usize;
    for (i, &time) in result.timestamp.iter().enumerate() {
        match (at(&quote.open, i), at(&quote.high, i), at(&quote.low, i), at(&quote.close, i)) {
            (Some(open), Some(high), Some(low), Some(close)) => bars.push(Bar {
                time,
                open,
                high,
                low,
                close,
            }),
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!(symbol, dropped, "dropped bars with missing OHLC values");
    }

    Ok(normalize_bars(bars))
}

fn at(column: &[Option<f64>], i: usize) -> Option<f64> {
    column.get(i).copied().flatten()
}

/// Sort by time and keep the last bar for each timestamp.
pub fn normalize_bars(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by_key(|b| b.time);
    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.time == bar.time => *last = bar,
            _ => out.push(bar),
        }
    }
    out
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "symbol": "AAPL" },
                "timestamp": [300, 100, 200, 400, 200],
                "indicators": {
                    "quote": [{
                        "open":  [3.0, 1.0, 2.0, null, 2.5],
                        "high":  [3.5, 1.5, 2.5, 4.5, 3.0],
                        "low":   [2.5, 0.5, 1.5, 3.5, 2.0],
                        "close": [3.2, 1.2, 2.2, 4.2, 2.7],
                        "volume": [10, 20, 30, 40, 50]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    fn decode(json: &str) -> ChartEnvelope {
        serde_json::from_str(json).unwrap()
    }

    fn bar(time: i64, close: f64) -> Bar {
        Bar { time, open: close, high: close, low: close, close }
    }

    #[test]
    fn parses_sorts_and_deduplicates() {
        let bars = bars_from_chart(decode(FIXTURE), "AAPL").unwrap();
        let times: Vec<i64> = bars.iter().map(|b| b.time).collect();
        assert_eq!(times, vec![100, 200, 300]);
        // The later duplicate for t=200 wins.
        assert_eq!(bars[1].close, 2.7);
        assert_eq!(bars[0], Bar { time: 100, open: 1.0, high: 1.5, low: 0.5, close: 1.2 });
    }

    #[test]
    fn not_found_error_maps_to_no_data() {
        let json = r#"{ "chart": { "result": null,
            "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" } } }"#;
        let err = bars_from_chart(decode(json), "ZZZZ").unwrap_err();
        assert!(matches!(err, FetchError::NoData { ref symbol } if symbol == "ZZZZ"));
    }

    #[test]
    fn other_provider_errors_are_preserved() {
        let json = r#"{ "chart": { "result": null,
            "error": { "code": "Bad Request", "description": "Invalid input - interval=7m is not supported" } } }"#;
        let err = bars_from_chart(decode(json), "AAPL").unwrap_err();
        assert!(matches!(err, FetchError::Provider { ref code, .. } if code == "Bad Request"));
    }

    #[test]
    fn result_without_timestamps_is_empty() {
        let json = r#"{ "chart": { "result": [{ "meta": {}, "indicators": { "quote": [{}] } }], "error": null } }"#;
        assert!(bars_from_chart(decode(json), "AAPL").unwrap().is_empty());
    }

    #[test]
    fn normalize_keeps_last_duplicate() {
        let bars = normalize_bars(vec![bar(2, 1.0), bar(1, 5.0), bar(2, 9.0)]);
        assert_eq!(bars, vec![bar(1, 5.0), bar(2, 9.0)]);
        assert!(TimeSeries::new(bars).is_ok());
    }

    #[test]
    fn chart_url_encodes_symbol() {
        let client = YahooClient::new(&MarketDataConfig {
            base_url: "http://localhost:1/".to_string(),
            ..MarketDataConfig::default()
        })
        .unwrap();
        let url = client.chart_url("BRK/B").unwrap();
        assert_eq!(url.as_str(), "http://localhost:1/v8/finance/chart/BRK%2FB");
    }

    #[tokio::test]
    async fn fetches_from_http_endpoint() {
        use axum::{routing::get, Router};

        let app = Router::new().route("/v8/finance/chart/:symbol", get(|| async { FIXTURE }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = YahooClient::new(&MarketDataConfig {
            base_url: format!("http://{addr}"),
            ..MarketDataConfig::default()
        })
        .unwrap();

        let series = client.fetch_series("AAPL", "1y", "1d").await.unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), &[1.2, 2.7, 3.2]);
    }
}
