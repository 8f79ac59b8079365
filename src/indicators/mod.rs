// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators the chart can
// request.  Every function takes a slice of closes and returns a
// `Vec<Option<f64>>` of the same length, aligned by position: `None` marks a
// position where the formula is undefined (warm-up window, zero denominator,
// non-finite intermediate).  `None` positions are dropped, never encoded as
// zero or NaN, when the series is turned into chart points.

pub mod ema;
pub mod engine;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod spec;

use thiserror::Error;

use crate::types::{IndicatorPoint, TimeSeries};

/// Reasons an indicator cannot be computed at all for a given request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    #[error("{name} must be at least 1, got {value}")]
    InvalidParameter { name: &'static str, value: i64 },
}

/// Validate a window-style parameter and convert it to `usize`.
pub(crate) fn window(name: &'static str, value: i64) -> Result<usize, IndicatorError> {
    if value < 1 {
        return Err(IndicatorError::InvalidParameter { name, value });
    }
    usize::try_from(value).map_err(|_| IndicatorError::InvalidParameter { name, value })
}

/// Map a raw result to `None` unless it is a finite number.
pub(crate) fn finite(value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Pair each defined value with its bar's timestamp, dropping undefined
/// positions.
pub fn to_points(series: &TimeSeries, values: &[Option<f64>]) -> Vec<IndicatorPoint> {
    series
        .bars()
        .iter()
        .zip(values)
        .filter_map(|(bar, value)| {
            value.map(|v| IndicatorPoint {
                time: bar.time as f64,
                value: v,
            })
        })
        .collect()
}
