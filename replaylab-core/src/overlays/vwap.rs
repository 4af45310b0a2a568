//! Session-anchored VWAP state machine.
//!
//! A strict algebraic fold: cumulative Σ(typical_price·volume) / Σvolume
//! with explicit reset points. Anchored at the regular session open;
//! resets at each local-calendar-day boundary and at the transition into
//! the regular session. Before the open the value is `None`; after the
//! close it holds the last regular-session value flat. The same fold runs
//! one-pass over a window or incrementally bar-by-bar.

use super::calendar::{SessionCalendar, SessionPhase};
use crate::domain::Bar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VwapState {
    calendar: SessionCalendar,
    /// Local calendar day the accumulators belong to.
    day: Option<NaiveDate>,
    cum_pv: f64,
    cum_vol: f64,
    /// Last in-session value; held flat after the close.
    last: Option<f64>,
}

impl VwapState {
    pub fn new(calendar: SessionCalendar) -> Self {
        Self {
            calendar,
            day: None,
            cum_pv: 0.0,
            cum_vol: 0.0,
            last: None,
        }
    }

    fn reset_day(&mut self, day: NaiveDate) {
        self.day = Some(day);
        self.cum_pv = 0.0;
        self.cum_vol = 0.0;
        self.last = None;
    }

    /// Fold in one bar and return the VWAP as of that bar.
    pub fn update(&mut self, bar: &Bar) -> Option<f64> {
        let (date, _) = self.calendar.local(bar.ts);
        if self.day != Some(date) {
            self.reset_day(date);
        }

        match self.calendar.phase(bar.ts) {
            SessionPhase::PreOpen => None,
            SessionPhase::Regular => {
                self.cum_pv += bar.typical_price() * bar.volume;
                self.cum_vol += bar.volume;
                if self.cum_vol > 0.0 {
                    self.last = Some(self.cum_pv / self.cum_vol);
                }
                self.last
            }
            SessionPhase::PostClose => self.last,
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.last
    }
}

/// One-pass VWAP over a series; `result[i]` is the fold state after
/// `bars[..=i]`.
pub fn vwap_series(bars: &[Bar], calendar: SessionCalendar) -> Vec<Option<f64>> {
    let mut state = VwapState::new(calendar);
    bars.iter().map(|bar| state.update(bar)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar_at_utc(hour: u32, minute: u32, price: f64, volume: f64) -> Bar {
        Bar {
            ts: Utc.with_ymd_and_hms(2024, 1, 2, hour, minute, 0).unwrap(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    #[test]
    fn none_before_open() {
        let mut state = VwapState::new(SessionCalendar::default());
        // 13:00 UTC == 08:00 local: pre-open.
        assert_eq!(state.update(&bar_at_utc(13, 0, 100.0, 500.0)), None);
        // Pre-open volume must not leak into the session accumulators.
        let v = state.update(&bar_at_utc(14, 30, 110.0, 100.0)).unwrap();
        assert!((v - 110.0).abs() < 1e-12);
    }

    #[test]
    fn cumulative_weighting_in_session() {
        let mut state = VwapState::new(SessionCalendar::default());
        let v1 = state.update(&bar_at_utc(14, 30, 100.0, 100.0)).unwrap();
        assert!((v1 - 100.0).abs() < 1e-12);
        let v2 = state.update(&bar_at_utc(14, 31, 110.0, 300.0)).unwrap();
        // (100*100 + 110*300) / 400 = 107.5
        assert!((v2 - 107.5).abs() < 1e-12);
    }

    #[test]
    fn holds_flat_after_close() {
        let mut state = VwapState::new(SessionCalendar::default());
        let in_session = state.update(&bar_at_utc(15, 0, 100.0, 100.0)).unwrap();
        // 21:30 UTC == 16:30 local: post-close holds the last value.
        let post = state.update(&bar_at_utc(21, 30, 250.0, 999.0)).unwrap();
        assert_eq!(post, in_session);
    }

    #[test]
    fn resets_at_day_boundary() {
        let mut state = VwapState::new(SessionCalendar::default());
        state.update(&bar_at_utc(15, 0, 100.0, 100.0)).unwrap();

        let next_day = Bar {
            ts: Utc.with_ymd_and_hms(2024, 1, 3, 14, 30, 0).unwrap(),
            open: 50.0,
            high: 50.0,
            low: 50.0,
            close: 50.0,
            volume: 10.0,
        };
        let v = state.update(&next_day).unwrap();
        assert!((v - 50.0).abs() < 1e-12, "previous day leaked into VWAP");
    }

    #[test]
    fn next_day_pre_open_is_none_again() {
        let mut state = VwapState::new(SessionCalendar::default());
        state.update(&bar_at_utc(15, 0, 100.0, 100.0)).unwrap();

        let next_pre_open = Bar {
            ts: Utc.with_ymd_and_hms(2024, 1, 3, 13, 0, 0).unwrap(),
            open: 50.0,
            high: 50.0,
            low: 50.0,
            close: 50.0,
            volume: 10.0,
        };
        assert_eq!(state.update(&next_pre_open), None);
    }

    #[test]
    fn zero_volume_session_stays_none() {
        let mut state = VwapState::new(SessionCalendar::default());
        assert_eq!(state.update(&bar_at_utc(14, 30, 100.0, 0.0)), None);
    }

    #[test]
    fn one_pass_equals_incremental() {
        let bars: Vec<Bar> = (0..30)
            .map(|i| bar_at_utc(14, 30 + i, 100.0 + i as f64, 100.0 + (i * 7) as f64))
            .collect();
        let series = vwap_series(&bars, SessionCalendar::default());

        let mut state = VwapState::new(SessionCalendar::default());
        for (i, bar) in bars.iter().enumerate() {
            assert_eq!(state.update(bar), series[i], "divergence at bar {i}");
        }
    }
}
