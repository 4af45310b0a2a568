//! Data layer: the read-only bar feed consumed by replay sessions.

pub mod feed;

pub use feed::{FeedError, MarketFeed};
