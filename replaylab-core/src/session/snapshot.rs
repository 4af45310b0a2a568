//! Snapshot and delta payloads, and display-bucket aggregation.
//!
//! Display bars are execution bars aggregated into display-clock windows
//! aligned to unix-epoch multiples of the display period. Empty windows
//! produce no bucket, so gap handling is identical whether a window is
//! aggregated in one pass (snapshot) or appended incrementally (delta).

use crate::domain::{Bar, Fill, Order, Position, SessionId};
use crate::overlays::OverlayPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Floor a timestamp to its display-window start.
pub fn window_start(ts: DateTime<Utc>, tf_sec: u32) -> DateTime<Utc> {
    let secs = ts.timestamp().div_euclid(tf_sec as i64) * tf_sec as i64;
    DateTime::<Utc>::from_timestamp(secs, 0).expect("window start in range")
}

/// Aggregate the execution bars of one display window into a display bar.
/// `None` when the window holds no bars (market closed / gap).
pub fn aggregate_bucket(win_start: DateTime<Utc>, bars: &[Bar]) -> Option<Bar> {
    let first = bars.first()?;
    let last = bars.last()?;
    Some(Bar {
        ts: win_start,
        open: first.open,
        high: bars.iter().map(|b| b.high).fold(f64::MIN, f64::max),
        low: bars.iter().map(|b| b.low).fold(f64::MAX, f64::min),
        close: last.close,
        volume: bars.iter().map(|b| b.volume).sum(),
    })
}

/// Aggregate a sorted bar slice into display bars, skipping empty windows.
pub fn bucket_series(bars: &[Bar], tf_sec: u32) -> Vec<Bar> {
    let mut buckets = Vec::new();
    let mut run_start = 0;
    for i in 0..bars.len() {
        let here = window_start(bars[i].ts, tf_sec);
        if window_start(bars[run_start].ts, tf_sec) != here {
            let win = window_start(bars[run_start].ts, tf_sec);
            buckets.extend(aggregate_bucket(win, &bars[run_start..i]));
            run_start = i;
        }
    }
    if run_start < bars.len() {
        let win = window_start(bars[run_start].ts, tf_sec);
        buckets.extend(aggregate_bucket(win, &bars[run_start..]));
    }
    buckets
}

/// Trailing display-bar window with overlay values, parallel by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowPayload {
    pub bars: Vec<Bar>,
    pub overlays: Vec<OverlayPoint>,
}

/// The externally observable session snapshot. Derived on demand, never
/// stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayState {
    pub session_id: SessionId,
    pub symbol: String,
    pub exec_tf_sec: u32,
    pub disp_tf_sec: u32,
    /// Timestamp of the last consumed execution bar (the session start
    /// boundary until the first bar is consumed).
    pub cursor_exec_ts: DateTime<Utc>,
    /// Start of the next display window to consume.
    pub disp_cursor_start_ts: DateTime<Utc>,
    pub paused: bool,
    pub ended: bool,
    pub position: Position,
    pub orders: Vec<Order>,
    pub last_event_id: u64,
    pub extra: WindowPayload,
}

/// Incremental payload for one `step_delta` call.
///
/// `dropped` display bars fell off the left edge of the fixed-length
/// window; `append_bars`/`overlays_append` extend the right edge. When the
/// step fast-forwarded over empty windows, `windows_advanced` counts every
/// display period consumed (each of which journaled WINDOW_EMPTY).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDelta {
    pub dropped: usize,
    pub append_bars: Vec<Bar>,
    pub overlays_append: Vec<OverlayPoint>,
    pub fills: Vec<Fill>,
    pub windows_advanced: usize,
    pub ended: bool,
    pub last_event_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(minute: u32, second: u32, close: f64, volume: f64) -> Bar {
        Bar {
            ts: Utc
                .with_ymd_and_hms(2024, 1, 2, 14, minute, second)
                .unwrap(),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume,
        }
    }

    #[test]
    fn window_start_floors_to_period() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 14, 33, 40).unwrap();
        let start = window_start(ts, 300);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap());
        // Exact boundary maps to itself.
        assert_eq!(window_start(start, 300), start);
    }

    #[test]
    fn aggregate_bucket_ohlcv() {
        let bars = vec![
            bar(30, 0, 100.0, 10.0),
            bar(31, 0, 103.0, 20.0),
            bar(32, 0, 101.0, 30.0),
        ];
        let win = window_start(bars[0].ts, 300);
        let bucket = aggregate_bucket(win, &bars).unwrap();
        assert_eq!(bucket.ts, win);
        assert_eq!(bucket.open, 99.5); // first bar's open
        assert_eq!(bucket.high, 104.0); // max high
        assert_eq!(bucket.low, 99.0); // min low
        assert_eq!(bucket.close, 101.0); // last bar's close
        assert_eq!(bucket.volume, 60.0);
    }

    #[test]
    fn aggregate_empty_window_is_none() {
        let win = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        assert_eq!(aggregate_bucket(win, &[]), None);
    }

    #[test]
    fn bucket_series_skips_gaps() {
        // Two bars in the 14:30 window, a gap, one bar in the 14:45 window.
        let bars = vec![
            bar(30, 0, 100.0, 10.0),
            bar(33, 0, 101.0, 10.0),
            bar(46, 0, 105.0, 10.0),
        ];
        let buckets = bucket_series(&bars, 300);
        assert_eq!(buckets.len(), 2);
        assert_eq!(
            buckets[0].ts,
            Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap()
        );
        assert_eq!(
            buckets[1].ts,
            Utc.with_ymd_and_hms(2024, 1, 2, 14, 45, 0).unwrap()
        );
        assert_eq!(buckets[0].close, 101.0);
    }

    #[test]
    fn bucket_series_matches_manual_windows() {
        let bars: Vec<Bar> = (0..20).map(|i| bar(30 + i, 0, 100.0 + i as f64, 5.0)).collect();
        let buckets = bucket_series(&bars, 300);
        // 20 one-minute bars from 14:30 → windows 14:30, 14:35, 14:40, 14:45.
        assert_eq!(buckets.len(), 4);
        assert!(buckets.iter().all(|b| b.volume == 25.0));
    }
}
