//! MarketFeed — immutable, time-ordered view of OHLCV bars.
//!
//! Range lookups are half-open `[start, end)` and resolve in O(log n) via a
//! precomputed timestamp index. If the index is absent the lookup falls back
//! to a linear scan; both paths return the same range. Out-of-bounds times
//! yield a valid empty range, never an error.

use crate::domain::{Bar, Symbol};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from feed construction. Range queries never fail.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("no bars for symbol '{symbol}'")]
    Empty { symbol: String },

    #[error("bars for '{symbol}' not strictly increasing at position {position}")]
    OutOfOrder { symbol: String, position: usize },
}

/// Immutable bar series for one symbol. Gaps (market closures) are legal.
#[derive(Debug, Clone)]
pub struct MarketFeed {
    symbol: Symbol,
    bars: Vec<Bar>,
    /// Unix-second timestamps, parallel to `bars`. Built at load; range
    /// queries degrade to a linear scan when absent.
    ts_index: Option<Vec<i64>>,
}

impl MarketFeed {
    /// Build a feed, validating ordering and constructing the timestamp index.
    pub fn new(symbol: impl Into<Symbol>, bars: Vec<Bar>) -> Result<Self, FeedError> {
        let symbol = symbol.into();
        if bars.is_empty() {
            return Err(FeedError::Empty { symbol });
        }
        for (i, pair) in bars.windows(2).enumerate() {
            if pair[1].ts <= pair[0].ts {
                return Err(FeedError::OutOfOrder {
                    symbol,
                    position: i + 1,
                });
            }
        }
        let ts_index = Some(bars.iter().map(|b| b.ts.timestamp()).collect());
        Ok(Self {
            symbol,
            bars,
            ts_index,
        })
    }

    /// Build a feed without the timestamp index (linear-scan range lookups).
    pub fn new_unindexed(symbol: impl Into<Symbol>, bars: Vec<Bar>) -> Result<Self, FeedError> {
        let mut feed = Self::new(symbol, bars)?;
        feed.ts_index = None;
        Ok(feed)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_ts(&self) -> DateTime<Utc> {
        self.bars[0].ts
    }

    pub fn last_ts(&self) -> DateTime<Utc> {
        self.bars[self.bars.len() - 1].ts
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    /// Half-open index range of bars with `ts ∈ [start, end_exclusive)`.
    ///
    /// Always a valid (possibly empty) range: `0 <= i0 <= i1 <= len`.
    pub fn range_indices(
        &self,
        start: DateTime<Utc>,
        end_exclusive: DateTime<Utc>,
    ) -> (usize, usize) {
        if end_exclusive <= start {
            return (0, 0);
        }
        let (start_s, end_s) = (start.timestamp(), end_exclusive.timestamp());
        match &self.ts_index {
            Some(index) => {
                let i0 = index.partition_point(|&ts| ts < start_s);
                let i1 = index.partition_point(|&ts| ts < end_s);
                (i0, i1)
            }
            None => {
                let i0 = self
                    .bars
                    .iter()
                    .position(|b| b.ts.timestamp() >= start_s)
                    .unwrap_or(self.bars.len());
                let i1 = self
                    .bars
                    .iter()
                    .position(|b| b.ts.timestamp() >= end_s)
                    .unwrap_or(self.bars.len());
                (i0, i1)
            }
        }
    }

    /// Bars with `ts ∈ [start, end_exclusive)`.
    pub fn bars_in(&self, start: DateTime<Utc>, end_exclusive: DateTime<Utc>) -> &[Bar] {
        let (i0, i1) = self.range_indices(start, end_exclusive);
        &self.bars[i0..i1]
    }

    /// Restrict the feed to `[start, end_exclusive)`. Empty result is an
    /// `Empty` error so callers surface "no data" at session creation.
    pub fn slice(
        &self,
        start: DateTime<Utc>,
        end_exclusive: DateTime<Utc>,
    ) -> Result<MarketFeed, FeedError> {
        let (i0, i1) = self.range_indices(start, end_exclusive);
        if i0 == i1 {
            return Err(FeedError::Empty {
                symbol: self.symbol.clone(),
            });
        }
        MarketFeed::new(self.symbol.clone(), self.bars[i0..i1].to_vec())
    }
}
