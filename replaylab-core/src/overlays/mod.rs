//! Overlay indicators maintained alongside the display-bar stream.
//!
//! Overlays are causal folds: each display bar updates the state once, and
//! the value at bar `i` never depends on bars after `i`. The snapshot path
//! recomputes by folding the same states from the session's history anchor,
//! so windowed and incremental values agree at every alignment point.

pub mod calendar;
pub mod ema;
pub mod vwap;

pub use calendar::{SessionCalendar, SessionPhase};
pub use ema::{ema_series, EmaState};
pub use vwap::{vwap_series, VwapState};

use crate::domain::Bar;
use serde::{Deserialize, Serialize};

/// Overlay values attached to one display bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayPoint {
    pub ema9: Option<f64>,
    pub ema21: Option<f64>,
    pub ema50: Option<f64>,
    pub vwap: Option<f64>,
}

/// Combined overlay fold: EMA(9/21/50) over display closes plus the
/// session-anchored VWAP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayState {
    ema9: EmaState,
    ema21: EmaState,
    ema50: EmaState,
    vwap: VwapState,
}

impl OverlayState {
    pub fn new(calendar: SessionCalendar) -> Self {
        Self {
            ema9: EmaState::new(9),
            ema21: EmaState::new(21),
            ema50: EmaState::new(50),
            vwap: VwapState::new(calendar),
        }
    }

    /// Fold in one display bar.
    pub fn update(&mut self, bar: &Bar) -> OverlayPoint {
        OverlayPoint {
            ema9: self.ema9.update(bar.close),
            ema21: self.ema21.update(bar.close),
            ema50: self.ema50.update(bar.close),
            vwap: self.vwap.update(bar),
        }
    }

    /// Largest EMA lookback; the VWAP anchor is a calendar reset, not a
    /// rolling lookback.
    pub fn max_lookback(&self) -> usize {
        self.ema50.lookback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.3).sin() * 4.0;
                Bar {
                    ts: Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap()
                        + chrono::Duration::minutes(i as i64),
                    open: close - 0.2,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect()
    }

    #[test]
    fn ema_seeds_in_order() {
        let mut state = OverlayState::new(SessionCalendar::default());
        let points: Vec<OverlayPoint> = bars(60).iter().map(|b| state.update(b)).collect();

        assert!(points[7].ema9.is_none());
        assert!(points[8].ema9.is_some());
        assert!(points[19].ema21.is_none());
        assert!(points[20].ema21.is_some());
        assert!(points[48].ema50.is_none());
        assert!(points[49].ema50.is_some());
    }

    #[test]
    fn replaying_same_bars_reproduces_points() {
        let bars = bars(80);
        let mut a = OverlayState::new(SessionCalendar::default());
        let mut b = OverlayState::new(SessionCalendar::default());
        let pa: Vec<OverlayPoint> = bars.iter().map(|bar| a.update(bar)).collect();
        let pb: Vec<OverlayPoint> = bars.iter().map(|bar| b.update(bar)).collect();
        assert_eq!(pa, pb);
    }
}
