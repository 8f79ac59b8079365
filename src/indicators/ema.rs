// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_0      = close_0
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// This is the recursive ("adjust = false") form seeded with the first close,
// so every position has a value and there is no warm-up gap.
// =============================================================================

/// Compute the EMA series for the given `values` and look-back `period`.
///
/// Returns one value per input position.
///
/// # Edge cases
/// - `period == 0` => all `None`
/// - empty input   => empty vec
/// - Once an intermediate value is non-finite, that position and every later
///   one is `None`; the recursion cannot recover from a broken state.
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;

    for &value in values {
        let next = match prev {
            None if result.is_empty() => super::finite(value),
            None => None,
            Some(p) => super::finite(value * multiplier + p * (1.0 - multiplier)),
        };
        result.push(next);
        prev = next;
    }

    result
}

/// EMA over a series that may itself contain undefined positions.
///
/// The recursion is seeded at the first defined value; positions before it
/// stay `None`.
pub fn calculate_ema_sparse(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let start = values.iter().position(Option::is_some).unwrap_or(values.len());
    let defined: Vec<f64> = values[start..].iter().map(|v| v.unwrap_or(f64::NAN)).collect();

    let mut result = vec![None; start];
    result.extend(calculate_ema(&defined, period));
    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::assert_close;

    #[test]
    fn ema_empty_input() {
        assert!(calculate_ema(&[], 5).is_empty());
    }

    #[test]
    fn ema_period_zero() {
        assert_eq!(calculate_ema(&[1.0, 2.0], 0), vec![None, None]);
    }

    #[test]
    fn ema_seeded_with_first_close() {
        let ema = calculate_ema(&[10.0, 11.0, 12.0], 20);
        assert_eq!(ema[0], Some(10.0));
    }

    #[test]
    fn ema_defined_at_every_position() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        for period in 1..=40 {
            let ema = calculate_ema(&closes, period);
            assert_eq!(ema.iter().flatten().count(), closes.len(), "period {period}");
        }
    }

    #[test]
    fn ema_period_one_is_identity() {
        let closes = [5.0, 7.5, 3.25, 9.0];
        let ema = calculate_ema(&closes, 1);
        for (value, close) in ema.iter().zip(closes) {
            assert_eq!(value.unwrap(), close);
        }
    }

    #[test]
    fn ema_known_values() {
        // period 3 => multiplier 0.5
        // 10, then 0.5*12 + 0.5*10 = 11, then 0.5*14 + 0.5*11 = 12.5
        let ema = calculate_ema(&[10.0, 12.0, 14.0], 3);
        assert_close(ema[0].unwrap(), 10.0);
        assert_close(ema[1].unwrap(), 11.0);
        assert_close(ema[2].unwrap(), 12.5);
    }

    #[test]
    fn ema_stops_after_non_finite_input() {
        let ema = calculate_ema(&[1.0, 2.0, f64::NAN, 4.0], 3);
        assert!(ema[0].is_some());
        assert!(ema[1].is_some());
        assert_eq!(ema[2], None);
        assert_eq!(ema[3], None);
    }

    #[test]
    fn ema_sparse_seeds_at_first_defined_value() {
        let ema = calculate_ema_sparse(&[None, None, Some(4.0), Some(6.0)], 3);
        assert_eq!(ema[0], None);
        assert_eq!(ema[1], None);
        assert_close(ema[2].unwrap(), 4.0);
        assert_close(ema[3].unwrap(), 5.0);
    }

    #[test]
    fn ema_sparse_all_undefined() {
        assert_eq!(calculate_ema_sparse(&[None, None], 3), vec![None, None]);
    }
}
