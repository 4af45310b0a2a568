//! ReplaySession — the two-clock stepper.
//!
//! The execution clock advances by consuming raw bars; the display clock
//! advances by exactly one display period per step, independent of how
//! many bars (if any) fall inside the window. A session is a synchronous
//! state machine driven entirely by caller-issued operations: no
//! background ticking, no timers.

use crate::broker::BrokerSim;
use crate::data::MarketFeed;
use crate::domain::{
    Bar, EventDraft, EventType, Fill, Order, OrderId, OrderIdGen, OrderSide, Position, SessionId,
};
use crate::journal::{Journal, JournalError};
use crate::overlays::{OverlayPoint, OverlayState};
use crate::session::anchor::{derive_seed, select_anchor_index};
use crate::session::config::SessionConfig;
use crate::session::snapshot::{
    aggregate_bucket, bucket_series, window_start, ReplayState, StepDelta, WindowPayload,
};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

/// Session-level errors. Command misses (cancel/modify of a resolved
/// order) are boolean results, not errors; journal failures are fatal to
/// the operation that triggered them.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("no data for '{symbol}' in the requested range")]
    NoData { symbol: String },

    #[error(transparent)]
    Journal(#[from] JournalError),
}

/// `Active ⇄ Paused`, terminal `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    Ended,
}

/// Status recorded on the persisted summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Active,
    Ended,
    Error,
}

/// Terminal record produced by `end()`; the caller persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub symbol: String,
    pub exec_tf_sec: u32,
    pub disp_tf_sec: u32,
    pub t_start: DateTime<Utc>,
    pub t_end: DateTime<Utc>,
    pub seed: Option<u64>,
    pub status: SummaryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub summary_json: serde_json::Value,
}

/// Result of consuming one display window.
struct WindowResult {
    fills: Vec<Fill>,
    appended: Option<(Bar, OverlayPoint)>,
    dropped: usize,
}

/// How many empty display windows `step_delta` may fast-forward through
/// before giving up and returning the accumulated no-op ticks.
const DELTA_FAST_FORWARD_CAP: usize = 64;

/// One interactive replay run over a feed slice.
pub struct ReplaySession {
    id: SessionId,
    config: SessionConfig,
    feed: MarketFeed,
    broker: BrokerSim,
    journal: Arc<dyn Journal>,
    id_gen: OrderIdGen,
    status: SessionStatus,
    t_start: DateTime<Utc>,
    t_end: DateTime<Utc>,
    cursor_exec_ts: DateTime<Utc>,
    disp_cursor_start_ts: DateTime<Utc>,
    /// First feed index not yet consumed by the execution clock.
    next_exec_idx: usize,
    last_close: Option<f64>,
    seed: Option<u64>,
    last_event_id: u64,
    created_at: DateTime<Utc>,
    /// Fixed-length incremental display window (delta mode).
    ring: VecDeque<(Bar, OverlayPoint)>,
    overlay_state: OverlayState,
    summary: Option<SessionSummary>,
}

impl std::fmt::Debug for ReplaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaySession")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("feed", &self.feed)
            .field("broker", &self.broker)
            .field("journal", &"<dyn Journal>")
            .field("id_gen", &self.id_gen)
            .field("status", &self.status)
            .field("t_start", &self.t_start)
            .field("t_end", &self.t_end)
            .field("cursor_exec_ts", &self.cursor_exec_ts)
            .field("disp_cursor_start_ts", &self.disp_cursor_start_ts)
            .field("next_exec_idx", &self.next_exec_idx)
            .field("last_close", &self.last_close)
            .field("seed", &self.seed)
            .field("last_event_id", &self.last_event_id)
            .field("created_at", &self.created_at)
            .field("ring", &self.ring)
            .field("overlay_state", &self.overlay_state)
            .field("summary", &self.summary)
            .finish()
    }
}

impl ReplaySession {
    /// Create a session over `feed`, journaling SESSION_START.
    ///
    /// Fails with `InvalidConfig` for a bad clock ratio or bounds, and with
    /// `NoData` when the feed has no bars in the requested range. Never
    /// partially constructs: the session either exists with its start event
    /// journaled, or not at all.
    pub fn create(
        id: SessionId,
        config: SessionConfig,
        feed: &MarketFeed,
        journal: Arc<dyn Journal>,
    ) -> Result<Self, SessionError> {
        config.validate().map_err(SessionError::InvalidConfig)?;
        if feed.symbol() != config.symbol {
            return Err(SessionError::InvalidConfig(format!(
                "feed is for '{}', config wants '{}'",
                feed.symbol(),
                config.symbol
            )));
        }

        let exec_tf = Duration::seconds(i64::from(config.exec_tf_sec));
        let no_data = || SessionError::NoData {
            symbol: config.symbol.clone(),
        };

        // Resolve the feed slice, the anchor, and the session end.
        let (slice, disp_cursor, t_end, seed) = match (config.start, config.end) {
            (Some(start), end) => {
                let end_exclusive = end.unwrap_or(feed.last_ts() + exec_tf);
                let slice = feed.slice(start, end_exclusive).map_err(|_| no_data())?;
                let cursor = window_start(start, config.disp_tf_sec);
                (slice, cursor, end_exclusive, config.seed)
            }
            (None, end) => {
                let end_exclusive = end.unwrap_or(feed.last_ts() + exec_tf);
                let slice = feed
                    .slice(feed.first_ts(), end_exclusive)
                    .map_err(|_| no_data())?;

                // Seeded anchor: hash-derived so identical configs land on
                // identical anchors even without an explicit seed.
                let master_seed = config.seed.unwrap_or_else(|| {
                    let hash = blake3::hash(config.config_hash().as_bytes());
                    u64::from_le_bytes(hash.as_bytes()[..8].try_into().expect("32-byte hash"))
                });
                let mut rng = StdRng::seed_from_u64(derive_seed(master_seed, &config.symbol));
                let anchor_idx = select_anchor_index(slice.len(), &config.anchor, &mut rng);
                let anchor_ts = slice.get(anchor_idx).expect("index in range").ts;
                let cursor = window_start(anchor_ts, config.disp_tf_sec);
                (slice, cursor, end_exclusive, Some(master_seed))
            }
        };

        let (next_exec_idx, _) = slice.range_indices(disp_cursor, t_end);

        // Fold history (bars before the display cursor) into the overlay
        // state and the incremental window.
        let mut overlay_state = OverlayState::new(config.calendar);
        let mut ring = VecDeque::new();
        for bucket in bucket_series(&slice.bars()[..next_exec_idx], config.disp_tf_sec) {
            let point = overlay_state.update(&bucket);
            ring.push_back((bucket, point));
            if ring.len() > config.history_bars {
                ring.pop_front();
            }
        }

        let mut session = Self {
            id,
            broker: BrokerSim::new(),
            journal,
            id_gen: OrderIdGen::default(),
            status: SessionStatus::Active,
            t_start: disp_cursor,
            t_end,
            cursor_exec_ts: disp_cursor,
            disp_cursor_start_ts: disp_cursor,
            next_exec_idx,
            last_close: None,
            seed,
            last_event_id: 0,
            created_at: Utc::now(),
            ring,
            overlay_state,
            summary: None,
            feed: slice,
            config,
        };

        session.journal_event(
            EventType::SessionStart,
            json!({
                "symbol": session.config.symbol,
                "config_hash": session.config.config_hash(),
                "exec_tf_sec": session.config.exec_tf_sec,
                "disp_tf_sec": session.config.disp_tf_sec,
                "t_start": session.t_start,
                "t_end": session.t_end,
                "seed": session.seed,
            }),
            None,
        )?;
        Ok(session)
    }

    // ── Stepping ─────────────────────────────────────────────────────

    /// Advance the display clock by up to `disp_steps` periods, consuming
    /// every execution bar inside each window. Paused and ended sessions
    /// do not step. Returns the full snapshot.
    pub fn step(&mut self, disp_steps: u32) -> Result<ReplayState, SessionError> {
        if self.status == SessionStatus::Active {
            for _ in 0..disp_steps {
                if self.disp_cursor_start_ts >= self.t_end {
                    self.finish()?;
                    break;
                }
                self.step_one_window()?;
            }
        }
        Ok(self.state_payload())
    }

    /// Advance until one display bar is produced (or the session ends),
    /// fast-forwarding over empty windows up to a safety cap so playback
    /// does not appear stalled across data gaps. Returns only the
    /// increment.
    pub fn step_delta(&mut self) -> Result<StepDelta, SessionError> {
        let mut delta = StepDelta::default();
        if self.status == SessionStatus::Active {
            for _ in 0..DELTA_FAST_FORWARD_CAP {
                if self.disp_cursor_start_ts >= self.t_end {
                    self.finish()?;
                    break;
                }
                let result = self.step_one_window()?;
                delta.windows_advanced += 1;
                delta.dropped += result.dropped;
                delta.fills.extend(result.fills);
                if let Some((bucket, point)) = result.appended {
                    delta.append_bars.push(bucket);
                    delta.overlays_append.push(point);
                    break;
                }
            }
        }
        delta.ended = self.status == SessionStatus::Ended;
        delta.last_event_id = self.last_event_id;
        Ok(delta)
    }

    fn step_one_window(&mut self) -> Result<WindowResult, SessionError> {
        let win_start = self.disp_cursor_start_ts;
        let win_end = win_start + Duration::seconds(i64::from(self.config.disp_tf_sec));

        let (i0, i1) = self.feed.range_indices(win_start, win_end);
        let begin = i0.max(self.next_exec_idx);

        let mut fills = Vec::new();
        let mut win_bars = Vec::new();
        for idx in begin..i1 {
            let bar = self.feed.get(idx).expect("index in range").clone();
            self.cursor_exec_ts = bar.ts;
            self.last_close = Some(bar.close);
            let bar_fills = self.broker.evaluate_bar(&bar);
            for fill in &bar_fills {
                self.journal_fill(fill)?;
            }
            fills.extend(bar_fills);
            win_bars.push(bar);
        }
        self.next_exec_idx = self.next_exec_idx.max(i1);

        let mut appended = None;
        let mut dropped = 0;
        if win_bars.is_empty() {
            // Market closed or data gap: journaled so downstream
            // diagnostics can tell gaps from stalls.
            self.journal_event(
                EventType::WindowEmpty,
                json!({ "win_start": win_start, "win_end": win_end }),
                Some(win_start),
            )?;
        } else {
            let bucket = aggregate_bucket(win_start, &win_bars).expect("window is non-empty");
            let point = self.overlay_state.update(&bucket);
            self.ring.push_back((bucket.clone(), point));
            if self.ring.len() > self.config.history_bars {
                self.ring.pop_front();
                dropped = 1;
            }
            appended = Some((bucket, point));
        }

        // The display clock is wall-clock, not data-dependent: it advances
        // whether or not the window held bars.
        self.disp_cursor_start_ts = win_end;

        Ok(WindowResult {
            fills,
            appended,
            dropped,
        })
    }

    // ── Order operations ─────────────────────────────────────────────

    /// Place a limit order. Exactly one ORDER_PLACED event.
    pub fn place_limit(
        &mut self,
        side: OrderSide,
        price: f64,
        qty: f64,
        tag: Option<String>,
    ) -> Result<Order, SessionError> {
        self.check_open()?;
        validate_qty(qty)?;
        validate_price(price)?;

        let order = Order::limit(
            self.id_gen.next_id(),
            side,
            qty,
            price,
            tag,
            self.cursor_exec_ts,
        );
        self.journal_order_placed(&order)?;
        self.broker.place(order.clone());
        Ok(order)
    }

    /// Place a market order: fills immediately at the last known close (or
    /// the first available bar's close when nothing has been consumed yet).
    /// ORDER_PLACED plus one FILL event.
    pub fn place_market(
        &mut self,
        side: OrderSide,
        qty: f64,
        tag: Option<String>,
    ) -> Result<(Order, Option<f64>), SessionError> {
        self.check_open()?;
        validate_qty(qty)?;

        let order = Order::market(self.id_gen.next_id(), side, qty, tag, self.cursor_exec_ts);
        self.journal_order_placed(&order)?;
        self.broker.place(order.clone());

        let price = self.market_reference_price();
        match price {
            Some(price) => {
                let fill = self
                    .broker
                    .fill_market(&order.id, price, self.cursor_exec_ts)
                    .expect("order was just placed working");
                self.journal_fill(&fill)?;
                let filled = self.broker.order(&order.id).expect("order exists").clone();
                Ok((filled, Some(price)))
            }
            None => Ok((order, None)),
        }
    }

    /// Cancel a working order. `Ok(false)` means "already resolved".
    pub fn cancel(&mut self, order_id: &OrderId) -> Result<bool, SessionError> {
        if !self.broker.cancel(order_id) {
            return Ok(false);
        }
        self.journal_event(
            EventType::OrderCanceled,
            json!({ "order_id": order_id }),
            None,
        )?;
        Ok(true)
    }

    /// Re-price a working limit order. `Ok(false)` means "already resolved"
    /// or not a limit order.
    pub fn modify(&mut self, order_id: &OrderId, new_price: f64) -> Result<bool, SessionError> {
        validate_price(new_price)?;
        if !self.broker.modify(order_id, new_price) {
            return Ok(false);
        }
        self.journal_event(
            EventType::OrderModified,
            json!({ "order_id": order_id, "new_price": new_price }),
            None,
        )?;
        Ok(true)
    }

    /// Offset the full open position with a market order. `Ok(None)` when
    /// already flat.
    pub fn flatten_now(&mut self, tag: Option<String>) -> Result<Option<f64>, SessionError> {
        let qty = self.broker.position().qty;
        if qty == 0.0 {
            return Ok(None);
        }
        let side = if qty > 0.0 {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };
        let (_, price) = self.place_market(side, qty.abs(), tag)?;
        Ok(price)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Pause stepping. Returns whether a transition happened.
    pub fn pause(&mut self) -> Result<bool, SessionError> {
        if self.status != SessionStatus::Active {
            return Ok(false);
        }
        self.status = SessionStatus::Paused;
        self.journal_event(EventType::Pause, json!({}), None)?;
        Ok(true)
    }

    /// Resume stepping. Returns whether a transition happened.
    pub fn play(&mut self) -> Result<bool, SessionError> {
        if self.status != SessionStatus::Paused {
            return Ok(false);
        }
        self.status = SessionStatus::Active;
        self.journal_event(EventType::Play, json!({}), None)?;
        Ok(true)
    }

    /// Terminal transition. Idempotent: the first call journals
    /// SESSION_END and builds the summary; later calls return the same
    /// summary without a second event.
    pub fn end(&mut self) -> Result<SessionSummary, SessionError> {
        self.finish()?;
        Ok(self.summary.clone().expect("finish() built the summary"))
    }

    fn finish(&mut self) -> Result<(), SessionError> {
        self.status = SessionStatus::Ended;
        if self.summary.is_some() {
            return Ok(());
        }
        let realized_pnl = self.broker.position().realized_pnl;
        self.journal_event(
            EventType::SessionEnd,
            json!({ "realized_pnl": realized_pnl }),
            None,
        )?;
        let fill_count = self.journal.count_fills(&self.id)?;
        self.summary = Some(SessionSummary {
            session_id: self.id.clone(),
            symbol: self.config.symbol.clone(),
            exec_tf_sec: self.config.exec_tf_sec,
            disp_tf_sec: self.config.disp_tf_sec,
            t_start: self.t_start,
            t_end: self.t_end,
            seed: self.seed,
            status: SummaryStatus::Ended,
            created_at: self.created_at,
            updated_at: Utc::now(),
            summary_json: json!({
                "realized_pnl": realized_pnl,
                "fill_count": fill_count,
            }),
        });
        Ok(())
    }

    // ── Payloads ─────────────────────────────────────────────────────

    /// Full snapshot. The trailing window is recomputed in one pass from
    /// the session's history anchor, which makes it numerically identical
    /// to the incrementally maintained delta window at every alignment
    /// point.
    pub fn state_payload(&self) -> ReplayState {
        let buckets = bucket_series(
            &self.feed.bars()[..self.next_exec_idx],
            self.config.disp_tf_sec,
        );
        let mut overlay = OverlayState::new(self.config.calendar);
        let points: Vec<OverlayPoint> = buckets.iter().map(|b| overlay.update(b)).collect();
        let start = buckets.len().saturating_sub(self.config.history_bars);

        ReplayState {
            session_id: self.id.clone(),
            symbol: self.config.symbol.clone(),
            exec_tf_sec: self.config.exec_tf_sec,
            disp_tf_sec: self.config.disp_tf_sec,
            cursor_exec_ts: self.cursor_exec_ts,
            disp_cursor_start_ts: self.disp_cursor_start_ts,
            paused: self.status == SessionStatus::Paused,
            ended: self.status == SessionStatus::Ended,
            position: self.broker.position().clone(),
            orders: self.broker.orders().to_vec(),
            last_event_id: self.last_event_id,
            extra: WindowPayload {
                bars: buckets[start..].to_vec(),
                overlays: points[start..].to_vec(),
            },
        }
    }

    /// The incrementally maintained window as a payload — what a delta-mode
    /// consumer has reconstructed. Used by resync checks.
    pub fn delta_window(&self) -> WindowPayload {
        WindowPayload {
            bars: self.ring.iter().map(|(bar, _)| bar.clone()).collect(),
            overlays: self.ring.iter().map(|(_, point)| *point).collect(),
        }
    }

    /// Periodic full snapshot for delta-mode consumers to realign against.
    pub fn resync(&self) -> ReplayState {
        self.state_payload()
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn position(&self) -> &Position {
        self.broker.position()
    }

    pub fn orders(&self) -> &[Order] {
        self.broker.orders()
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn t_start(&self) -> DateTime<Utc> {
        self.t_start
    }

    pub fn t_end(&self) -> DateTime<Utc> {
        self.t_end
    }

    pub fn disp_cursor_start_ts(&self) -> DateTime<Utc> {
        self.disp_cursor_start_ts
    }

    pub fn cursor_exec_ts(&self) -> DateTime<Utc> {
        self.cursor_exec_ts
    }

    pub fn last_event_id(&self) -> u64 {
        self.last_event_id
    }

    // ── Internals ────────────────────────────────────────────────────

    fn check_open(&self) -> Result<(), SessionError> {
        if self.status == SessionStatus::Ended {
            return Err(SessionError::InvalidOrder("session has ended".into()));
        }
        Ok(())
    }

    fn market_reference_price(&self) -> Option<f64> {
        self.last_close
            .or_else(|| self.feed.get(self.next_exec_idx).map(|b| b.close))
            .or_else(|| self.feed.bars().last().map(|b| b.close))
    }

    fn journal_order_placed(&mut self, order: &Order) -> Result<(), SessionError> {
        let payload = serde_json::to_value(order).map_err(JournalError::from)?;
        self.journal_event(EventType::OrderPlaced, payload, None)
    }

    fn journal_fill(&mut self, fill: &Fill) -> Result<(), SessionError> {
        let payload = serde_json::to_value(fill).map_err(JournalError::from)?;
        self.journal_event(EventType::Fill, payload, Some(fill.ts))
    }

    fn journal_event(
        &mut self,
        event_type: EventType,
        payload: serde_json::Value,
        ts_market: Option<DateTime<Utc>>,
    ) -> Result<(), SessionError> {
        let mut draft = EventDraft::new(self.id.clone(), self.cursor_exec_ts, event_type, payload);
        if let Some(ts) = ts_market {
            draft = draft.with_market_ts(ts);
        }
        let event = self.journal.append(draft)?;
        self.last_event_id = event.id;
        Ok(())
    }
}

fn validate_qty(qty: f64) -> Result<(), SessionError> {
    if qty.is_finite() && qty > 0.0 {
        Ok(())
    } else {
        Err(SessionError::InvalidOrder(format!(
            "qty must be a positive finite number, got {qty}"
        )))
    }
}

fn validate_price(price: f64) -> Result<(), SessionError> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(SessionError::InvalidOrder(format!(
            "price must be a positive finite number, got {price}"
        )))
    }
}
