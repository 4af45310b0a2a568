//! ReplayLab Core — deterministic market replay and paper trading.
//!
//! This crate contains the heart of the replay engine:
//! - Domain types (bars, orders, fills, positions, events)
//! - MarketFeed: immutable time-ordered bar series with O(log n) range lookup
//! - BrokerSim: deterministic order matching against OHLC bars and
//!   position/PnL accounting
//! - Journal: append-only event sink with atomic monotonic ids
//! - Overlay indicators (EMA, session-anchored VWAP) as causal folds
//! - ReplaySession: the two-clock stepper with snapshot and delta payloads
//! - SessionRegistry: concurrency-safe id → live-session map

pub mod broker;
pub mod data;
pub mod domain;
pub mod journal;
pub mod overlays;
pub mod session;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the types shared across threads are Send + Sync.
    ///
    /// Sessions travel behind `Arc<Mutex<…>>` and journals behind
    /// `Arc<dyn Journal>`; if any of these loses Send/Sync the build breaks
    /// here rather than in a downstream service.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Order>();
        require_sync::<domain::Order>();
        require_send::<domain::Fill>();
        require_sync::<domain::Fill>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::Event>();
        require_sync::<domain::Event>();
        require_send::<domain::SessionId>();
        require_sync::<domain::SessionId>();
        require_send::<domain::OrderId>();
        require_sync::<domain::OrderId>();

        // Engine types
        require_send::<data::MarketFeed>();
        require_sync::<data::MarketFeed>();
        require_send::<broker::BrokerSim>();
        require_sync::<broker::BrokerSim>();
        require_send::<session::ReplaySession>();
        require_send::<session::SessionRegistry>();
        require_sync::<session::SessionRegistry>();
        require_send::<session::ReplayState>();
        require_sync::<session::ReplayState>();
        require_send::<session::SessionSummary>();
        require_sync::<session::SessionSummary>();

        // Journal sinks
        require_send::<journal::MemoryJournal>();
        require_sync::<journal::MemoryJournal>();
        require_send::<journal::JsonlJournal>();
        require_sync::<journal::JsonlJournal>();

        // Overlay folds
        require_send::<overlays::OverlayState>();
        require_sync::<overlays::OverlayState>();
    }
}
