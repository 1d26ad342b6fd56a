//! SMA and RSI over close prices.
//!
//! Both return a series of the same length as the input with warmup entries
//! filled by the running partial average, so slicing and last-element access
//! behave uniformly regardless of window size.
//!
//! RSI uses Wilder's smoothing for average gain/loss:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//! - RSI = 100 - (100 / (1 + avg_gain / avg_loss)); 100 when avg_loss == 0

pub fn sma(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return Vec::new();
    }

    let mut values = Vec::with_capacity(closes.len());
    let mut window_sum = 0.0;

    for (i, close) in closes.iter().enumerate() {
        window_sum += close;
        if i >= period {
            window_sum -= closes[i - period];
        }
        let denom = (i + 1).min(period) as f64;
        values.push(window_sum / denom);
    }

    values
}

pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < 2 {
        return vec![50.0; closes.len()];
    }

    let mut values = Vec::with_capacity(closes.len());
    values.push(50.0);

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };

        let changes = i;
        if changes <= period {
            // Running simple mean over the changes seen so far.
            avg_gain = (avg_gain * (changes - 1) as f64 + gain) / changes as f64;
            avg_loss = (avg_loss * (changes - 1) as f64 + loss) / changes as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        }

        let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
            50.0
        } else if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        };
        values.push(rsi);
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sma_flat_series() {
        let closes = vec![100.0; 10];
        let values = sma(&closes, 3);
        assert_eq!(values.len(), 10);
        for v in values {
            assert_relative_eq!(v, 100.0);
        }
    }

    #[test]
    fn sma_window() {
        let closes = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let values = sma(&closes, 3);
        assert_relative_eq!(values[0], 1.0);
        assert_relative_eq!(values[1], 1.5);
        assert_relative_eq!(values[2], 2.0);
        assert_relative_eq!(values[3], 3.0);
        assert_relative_eq!(values[4], 4.0);
    }

    #[test]
    fn sma_zero_period_empty() {
        assert!(sma(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn rsi_same_length_as_input() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64).collect();
        assert_eq!(rsi(&closes, 14).len(), 30);
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let values = rsi(&closes, 14);
        assert_relative_eq!(*values.last().unwrap(), 100.0);
    }

    #[test]
    fn rsi_all_losses_near_zero() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let values = rsi(&closes, 14);
        assert!(*values.last().unwrap() < 1.0);
    }

    #[test]
    fn rsi_flat_series_neutral() {
        let closes = vec![100.0; 20];
        let values = rsi(&closes, 14);
        for v in values {
            assert_relative_eq!(v, 50.0);
        }
    }

    #[test]
    fn rsi_bounded() {
        let closes: Vec<f64> = (0..40)
            .map(|i| 100.0 + ((i * 7) % 13) as f64 - 6.0)
            .collect();
        for v in rsi(&closes, 14) {
            assert!((0.0..=100.0).contains(&v));
        }
    }
}
