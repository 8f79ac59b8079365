// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// SMA_t = (close_{t-period+1} + ... + close_t) / period
//
// The first `period - 1` positions have no full window and stay undefined.

/// Compute the SMA of `closes` over a trailing `period`-sized window.
///
/// The result is aligned with `closes`; positions before `period - 1` are
/// `None`.  A `period` of zero yields an all-`None` series.
pub fn calculate_sma(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return result;
    }

    let period_f = period as f64;
    for end in (period - 1)..closes.len() {
        // Each window is summed afresh so no rounding error carries over.
        let sum: f64 = closes[end + 1 - period..=end].iter().sum();
        result[end] = super::finite(sum / period_f);
    }
    result
}
