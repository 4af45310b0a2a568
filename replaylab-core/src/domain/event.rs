//! Journal event types.
//!
//! Every state-changing action produces exactly one event. The journal is
//! the sole source of truth for session history after the fact.

use super::ids::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of state transition an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    SessionStart,
    SessionEnd,
    OrderPlaced,
    OrderCanceled,
    OrderModified,
    Fill,
    Pause,
    Play,
    WindowEmpty,
}

/// One append-only journal entry.
///
/// `id` is assigned by the journal (monotonic across the sink). `ts_exec`
/// is the execution-clock cursor at the time of the event; `ts_market` is
/// the market timestamp the event refers to, when one exists (fills,
/// empty windows).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub session_id: SessionId,
    pub ts_exec: DateTime<Utc>,
    pub ts_market: Option<DateTime<Utc>>,
    pub event_type: EventType,
    pub payload: serde_json::Value,
}

/// An event as submitted to the journal, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub session_id: SessionId,
    pub ts_exec: DateTime<Utc>,
    pub ts_market: Option<DateTime<Utc>>,
    pub event_type: EventType,
    pub payload: serde_json::Value,
}

impl EventDraft {
    pub fn new(
        session_id: SessionId,
        ts_exec: DateTime<Utc>,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            session_id,
            ts_exec,
            ts_market: None,
            event_type,
            payload,
        }
    }

    pub fn with_market_ts(mut self, ts: DateTime<Utc>) -> Self {
        self.ts_market = Some(ts);
        self
    }

    pub fn into_event(self, id: u64) -> Event {
        Event {
            id,
            session_id: self.session_id,
            ts_exec: self.ts_exec,
            ts_market: self.ts_market,
            event_type: self.event_type,
            payload: self.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn event_type_wire_format() {
        let json = serde_json::to_string(&EventType::WindowEmpty).unwrap();
        assert_eq!(json, "\"WINDOW_EMPTY\"");
        let json = serde_json::to_string(&EventType::SessionStart).unwrap();
        assert_eq!(json, "\"SESSION_START\"");
    }

    #[test]
    fn draft_into_event_preserves_fields() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 14, 31, 0).unwrap();
        let draft = EventDraft::new(
            SessionId::new("s1"),
            ts,
            EventType::Fill,
            serde_json::json!({"price": 101.5}),
        )
        .with_market_ts(ts);

        let event = draft.into_event(9);
        assert_eq!(event.id, 9);
        assert_eq!(event.event_type, EventType::Fill);
        assert_eq!(event.ts_market, Some(ts));
        assert_eq!(event.payload["price"], 101.5);
    }
}
