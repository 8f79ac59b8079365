// =============================================================================
// Relative Strength Index (RSI) — simple-average form
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.  The delta
//          is undefined at position 0.
// Step 2 — Split deltas into gains (positive deltas, else 0) and losses
//          (absolute negative deltas, else 0).
// Step 3 — Average each over the trailing `period` deltas with a plain SMA.
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// When avg_loss is zero RS is unbounded and the position has no value.  It is
// reported as missing, not as 100.
// =============================================================================

use super::sma::calculate_sma;

/// Compute the RSI series for `closes` over `period` deltas.
///
/// The result is aligned with `closes`.  Positions `< period` are `None`
/// because the first delta only exists at position 1.
///
/// # Edge cases
/// - `period == 0` => all `None`
/// - `closes.len() <= period` => all `None`
/// - `avg_loss == 0` => `None` at that position
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return result;
    }

    // --- Deltas, gains and losses (index j is close position j + 1) ---------
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = deltas.iter().map(|&d| if d > 0.0 { d } else { 0.0 }).collect();
    let losses: Vec<f64> = deltas.iter().map(|&d| if d < 0.0 { -d } else { 0.0 }).collect();

    let avg_gains = calculate_sma(&gains, period);
    let avg_losses = calculate_sma(&losses, period);

    for (j, (avg_gain, avg_loss)) in avg_gains.iter().zip(&avg_losses).enumerate() {
        if let (Some(g), Some(l)) = (avg_gain, avg_loss) {
            result[j + 1] = rsi_from_averages(*g, *l);
        }
    }

    result
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// Returns `None` when `avg_loss` is zero or the result is non-finite.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        return None;
    }
    let rs = avg_gain / avg_loss;
    super::finite(100.0 - 100.0 / (1.0 + rs))
}
