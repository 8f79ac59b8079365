// =============================================================================
// Shared types used across the chart indicator service
// =============================================================================
//
// `Bar` and `TimeSeries` are the normalised input to every indicator
// function.  `IndicatorSeries` and `ChartPayload` are the chart-ready output
// shapes returned over HTTP.
// =============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One OHLC price observation.  `time` is seconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Rejection raised when bars cannot form a valid [`TimeSeries`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("bar {index} has time {time}, which is not after the previous bar's time {previous}")]
    NotStrictlyIncreasing { index: usize, previous: i64, time: i64 },
}

/// Chronologically ordered, read-only sequence of bars.
///
/// Invariant: `time` is strictly increasing from one bar to the next.
/// Position `i` is the `i`-th bar in time; indicator windows count positions,
/// not calendar time.
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    bars: Vec<Bar>,
    closes: Vec<f64>,
}

impl TimeSeries {
    /// Build a series, rejecting bars that are not strictly ascending in time.
    pub fn new(bars: Vec<Bar>) -> Result<Self, SeriesError> {
        for (index, pair) in bars.windows(2).enumerate() {
            if pair[1].time <= pair[0].time {
                return Err(SeriesError::NotStrictlyIncreasing {
                    index: index + 1,
                    previous: pair[0].time,
                    time: pair[1].time,
                });
            }
        }
        let closes = bars.iter().map(|b| b.close).collect();
        Ok(Self { bars, closes })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Close prices, aligned by position with [`bars`](Self::bars).
    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// A single defined indicator value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub time: f64,
    pub value: f64,
}

/// Named indicator output.  Positions without a defined value are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    /// The request string exactly as the caller sent it.
    pub name: String,
    #[serde(rename = "data")]
    pub points: Vec<IndicatorPoint>,
}

/// OHLC record in the shape the chart front end consumes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcRecord {
    pub time: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl From<&Bar> for OhlcRecord {
    fn from(bar: &Bar) -> Self {
        Self {
            time: bar.time as f64,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
        }
    }
}

/// Response body of the stock-data endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartPayload {
    pub data: Vec<OhlcRecord>,
    pub indicators: Vec<IndicatorSeries>,
}

impl ChartPayload {
    pub fn new(series: &TimeSeries, indicators: Vec<IndicatorSeries>) -> Self {
        Self {
            data: series.bars().iter().map(OhlcRecord::from).collect(),
            indicators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(time: i64, close: f64) -> Bar {
        Bar { time, open: close, high: close, low: close, close }
    }

    #[test]
    fn series_accepts_ascending_bars() {
        let series = TimeSeries::new(vec![bar(1, 10.0), bar(2, 11.0), bar(5, 12.0)]).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), &[10.0, 11.0, 12.0]);
    }

    #[test]
    fn series_rejects_duplicate_timestamps() {
        let err = TimeSeries::new(vec![bar(1, 10.0), bar(1, 11.0)]).unwrap_err();
        assert_eq!(
            err,
            SeriesError::NotStrictlyIncreasing { index: 1, previous: 1, time: 1 }
        );
    }

    #[test]
    fn series_rejects_descending_bars() {
        assert!(TimeSeries::new(vec![bar(3, 1.0), bar(4, 1.0), bar(2, 1.0)]).is_err());
    }

    #[test]
    fn empty_series_is_valid() {
        let series = TimeSeries::new(Vec::new()).unwrap();
        assert!(series.is_empty());
        assert!(series.closes().is_empty());
    }

    #[test]
    fn indicator_series_serialises_points_as_data() {
        let s = IndicatorSeries {
            name: "ema(50)".to_string(),
            points: vec![IndicatorPoint { time: 1.0, value: 2.5 }],
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["name"], "ema(50)");
        assert_eq!(json["data"][0]["time"], 1.0);
        assert_eq!(json["data"][0]["value"], 2.5);
    }

    #[test]
    fn chart_payload_reexpresses_bars() {
        let series = TimeSeries::new(vec![Bar { time: 60, open: 1.0, high: 3.0, low: 0.5, close: 2.0 }]).unwrap();
        let payload = ChartPayload::new(&series, Vec::new());
        assert_eq!(
            payload.data,
            vec![OhlcRecord { time: 60.0, open: 1.0, high: 3.0, low: 0.5, close: 2.0 }]
        );
        assert!(payload.indicators.is_empty());
    }
}
