// =============================================================================
// Indicator Engine — request strings in, chart series out
// =============================================================================
//
// For every request string, in order:
//   parse  -> dispatch on kind -> compute aligned values -> drop undefined
//   positions -> name the series after the request string verbatim.
//
// A request that cannot be served becomes `IndicatorOutcome::Skipped` with an
// inspectable reason.  Skips never abort the batch and never reorder it.
// =============================================================================

use thiserror::Error;
use tracing::{debug, warn};

use super::ema::calculate_ema;
use super::macd::calculate_macd;
use super::rsi::calculate_rsi;
use super::sma::calculate_sma;
use super::spec::{IndicatorKind, IndicatorSpec, SpecError};
use super::{to_points, window, IndicatorError};
use crate::types::{IndicatorSeries, TimeSeries};

pub const DEFAULT_SMA_PERIOD: i64 = 20;
pub const DEFAULT_EMA_PERIOD: i64 = 20;
pub const DEFAULT_RSI_PERIOD: i64 = 14;
pub const DEFAULT_MACD_FAST: i64 = 12;
pub const DEFAULT_MACD_SLOW: i64 = 26;
pub const DEFAULT_MACD_SIGNAL: i64 = 9;

/// Why a single request produced no series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("malformed indicator spec: {0}")]
    Malformed(#[from] SpecError),

    #[error("unknown indicator kind {0:?}")]
    UnknownKind(String),

    #[error("cannot compute indicator: {0}")]
    Invalid(#[from] IndicatorError),
}

/// Result of serving one request string.
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorOutcome {
    Computed(IndicatorSeries),
    Skipped { label: String, reason: SkipReason },
}

impl IndicatorOutcome {
    pub fn label(&self) -> &str {
        match self {
            Self::Computed(series) => &series.name,
            Self::Skipped { label, .. } => label,
        }
    }

    pub fn into_series(self) -> Option<IndicatorSeries> {
        match self {
            Self::Computed(series) => Some(series),
            Self::Skipped { .. } => None,
        }
    }
}

/// Compute the aligned values a parsed spec asks for.
///
/// For MACD only the MACD line is returned; signal and histogram are not part
/// of the single named series a request yields.
pub fn evaluate(series: &TimeSeries, spec: &IndicatorSpec) -> Result<Vec<Option<f64>>, SkipReason> {
    let closes = series.closes();
    let values = match spec.kind() {
        IndicatorKind::Sma => {
            let period = window("period", spec.param_or(0, DEFAULT_SMA_PERIOD))?;
            calculate_sma(closes, period)
        }
        IndicatorKind::Ema => {
            let period = window("period", spec.param_or(0, DEFAULT_EMA_PERIOD))?;
            calculate_ema(closes, period)
        }
        IndicatorKind::Rsi => {
            let period = window("period", spec.param_or(0, DEFAULT_RSI_PERIOD))?;
            calculate_rsi(closes, period)
        }
        IndicatorKind::Macd => {
            let fast = window("fast period", spec.param_or(0, DEFAULT_MACD_FAST))?;
            let slow = window("slow period", spec.param_or(1, DEFAULT_MACD_SLOW))?;
            let signal = window("signal period", spec.param_or(2, DEFAULT_MACD_SIGNAL))?;
            calculate_macd(closes, fast, slow, signal).macd
        }
        IndicatorKind::Unknown(name) => return Err(SkipReason::UnknownKind(name.clone())),
    };
    Ok(values)
}

/// Serve a single request string against `series`.
pub fn compute_one(series: &TimeSeries, request: &str) -> IndicatorOutcome {
    let result = IndicatorSpec::parse(request)
        .map_err(SkipReason::from)
        .and_then(|spec| evaluate(series, &spec));

    match result {
        Ok(values) => {
            let points = to_points(series, &values);
            debug!(indicator = %request, points = points.len(), "indicator computed");
            IndicatorOutcome::Computed(IndicatorSeries {
                name: request.to_string(),
                points,
            })
        }
        Err(reason) => IndicatorOutcome::Skipped {
            label: request.to_string(),
            reason,
        },
    }
}

/// Serve every request, keeping one outcome per request in request order.
pub fn compute_all<S: AsRef<str>>(series: &TimeSeries, requests: &[S]) -> Vec<IndicatorOutcome> {
    requests
        .iter()
        .map(|request| compute_one(series, request.as_ref()))
        .collect()
}

/// Serve every request and keep only the series that were computed.
///
/// Skipped requests are logged and dropped; the relative order of the rest is
/// preserved.
pub fn compute_indicators<S: AsRef<str>>(series: &TimeSeries, requests: &[S]) -> Vec<IndicatorSeries> {
    compute_all(series, requests)
        .into_iter()
        .filter_map(|outcome| {
            if let IndicatorOutcome::Skipped { reason, .. } = &outcome {
                warn!(indicator = %outcome.label(), reason = %reason, "could not calculate indicator; skipping");
            }
            outcome.into_series()
        })
        .collect()
}
