// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   macd      = EMA(fast) - EMA(slow)
//   signal    = EMA(signal_period) of macd
//   histogram = macd - signal
//
// Both EMAs use the recursive form seeded with the first close, so all three
// lines are defined from position 0 on well-formed input.
// =============================================================================

use super::ema::{calculate_ema, calculate_ema_sparse};

/// The three MACD lines, each aligned with the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdResult {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// Compute MACD, signal and histogram lines for `closes`.
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdResult {
    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);

    let macd: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => super::finite(f - s),
            _ => None,
        })
        .collect();

    let signal_line = calculate_ema_sparse(&macd, signal);

    let histogram = macd
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => super::finite(m - s),
            _ => None,
        })
        .collect();

    MacdResult {
        macd,
        signal: signal_line,
        histogram,
    }
}
