//! Exponential Moving Average as an explicit fold state.
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1]
//! Seed: EMA[period-1] = SMA of the first `period` inputs.
//! Lookback: period - 1; before the seed completes the value is `None`.
//!
//! The same state drives both the incremental delta path (one `update` per
//! display bar) and the one-pass snapshot recomputation (`ema_series`), so
//! the two are algebraically identical at every index.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmaState {
    period: usize,
    alpha: f64,
    /// Running sum while seeding.
    seed_sum: f64,
    seed_count: usize,
    value: Option<f64>,
}

impl EmaState {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            seed_count: 0,
            value: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn lookback(&self) -> usize {
        self.period - 1
    }

    /// Fold in the next input and return the current value (`None` until the
    /// seed window fills).
    pub fn update(&mut self, x: f64) -> Option<f64> {
        match self.value {
            Some(prev) => {
                self.value = Some(self.alpha * x + (1.0 - self.alpha) * prev);
            }
            None => {
                self.seed_sum += x;
                self.seed_count += 1;
                if self.seed_count == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// One-pass EMA over a full series; `result[i]` is the state after folding
/// `values[..=i]`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut state = EmaState::new(period);
    values.iter().map(|&x| state.update(x)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-10;

    #[test]
    fn period_1_tracks_input() {
        let mut state = EmaState::new(1);
        assert_eq!(state.update(100.0), Some(100.0));
        assert_eq!(state.update(200.0), Some(200.0));
    }

    #[test]
    fn period_3_known_values() {
        // Inputs: 10, 11, 12, 13, 14; alpha = 0.5
        // Seed at index 2: SMA(10,11,12) = 11.0
        // EMA[3] = 0.5*13 + 0.5*11.0 = 12.0
        // EMA[4] = 0.5*14 + 0.5*12.0 = 13.0
        let result = ema_series(&[10.0, 11.0, 12.0, 13.0, 14.0], 3);
        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert!((result[2].unwrap() - 11.0).abs() < EPS);
        assert!((result[3].unwrap() - 12.0).abs() < EPS);
        assert!((result[4].unwrap() - 13.0).abs() < EPS);
    }

    #[test]
    fn incremental_matches_series() {
        let values: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let series = ema_series(&values, 9);

        let mut state = EmaState::new(9);
        for (i, &x) in values.iter().enumerate() {
            let incremental = state.update(x);
            match (incremental, series[i]) {
                (None, None) => {}
                (Some(a), Some(b)) => assert!((a - b).abs() < EPS, "divergence at {i}"),
                other => panic!("seed mismatch at {i}: {other:?}"),
            }
        }
    }

    #[test]
    fn lookback() {
        assert_eq!(EmaState::new(21).lookback(), 20);
        assert_eq!(EmaState::new(1).lookback(), 0);
    }
}
