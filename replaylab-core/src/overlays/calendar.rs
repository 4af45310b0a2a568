//! Exchange-local trading calendar.
//!
//! Local time is derived from UTC with a fixed offset. The regular session
//! is `[open, close)` on each local calendar day; DST shifts are not
//! modeled (a fixed offset keeps replay arithmetic reproducible across
//! environments).

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Where a timestamp falls relative to the regular session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    PreOpen,
    Regular,
    PostClose,
}

/// Fixed-offset exchange calendar with a single regular session per day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionCalendar {
    /// Offset from UTC in seconds (e.g. -18000 for US Eastern standard time).
    pub utc_offset_secs: i32,
    /// Regular session open, local time.
    pub open: NaiveTime,
    /// Regular session close, local time.
    pub close: NaiveTime,
}

impl Default for SessionCalendar {
    fn default() -> Self {
        Self {
            utc_offset_secs: -5 * 3600,
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        }
    }
}

impl SessionCalendar {
    /// Local calendar date and time-of-day for a UTC timestamp.
    pub fn local(&self, ts: DateTime<Utc>) -> (NaiveDate, NaiveTime) {
        let offset = FixedOffset::east_opt(self.utc_offset_secs)
            .expect("offset validated at construction");
        let local = offset.from_utc_datetime(&ts.naive_utc());
        (local.date_naive(), local.time())
    }

    pub fn phase(&self, ts: DateTime<Utc>) -> SessionPhase {
        let (_, time) = self.local(ts);
        if time < self.open {
            SessionPhase::PreOpen
        } else if time < self.close {
            SessionPhase::Regular
        } else {
            SessionPhase::PostClose
        }
    }

    /// Validity check used at session-config validation time.
    pub fn is_valid(&self) -> bool {
        FixedOffset::east_opt(self.utc_offset_secs).is_some() && self.open < self.close
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_bounds() {
        let cal = SessionCalendar::default();
        // 14:30 UTC == 09:30 US Eastern standard.
        let open_utc = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        assert_eq!(cal.phase(open_utc), SessionPhase::Regular);

        let pre = Utc.with_ymd_and_hms(2024, 1, 2, 14, 29, 0).unwrap();
        assert_eq!(cal.phase(pre), SessionPhase::PreOpen);

        // 21:00 UTC == 16:00 local: the close itself is post-session.
        let close_utc = Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap();
        assert_eq!(cal.phase(close_utc), SessionPhase::PostClose);
    }

    #[test]
    fn local_date_rolls_with_offset() {
        let cal = SessionCalendar::default();
        // 03:00 UTC is 22:00 the previous local day.
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap();
        let (date, time) = cal.local(ts);
        assert_eq!(date, chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(time, NaiveTime::from_hms_opt(22, 0, 0).unwrap());
    }

    #[test]
    fn validity() {
        assert!(SessionCalendar::default().is_valid());
        let mut cal = SessionCalendar::default();
        cal.close = cal.open;
        assert!(!cal.is_valid());
    }
}
