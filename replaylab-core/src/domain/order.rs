//! Order types and the order lifecycle state machine.

use super::ids::OrderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The side that offsets this one.
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// Signed quantity multiplier: +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

/// What kind of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Fill at limit price or better when the bar range reaches it.
    Limit,
    /// Fill immediately at the last known close.
    Market,
}

/// Order lifecycle states. `Working` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Working,
    Filled,
    Canceled,
}

/// A simulated order.
///
/// Orders are never removed from the session's order list; canceled and
/// filled orders remain for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub qty: f64,
    pub limit_price: Option<f64>,
    pub tag: Option<String>,
    pub created_ts: DateTime<Utc>,
    pub status: OrderStatus,
}

impl Order {
    pub fn limit(
        id: OrderId,
        side: OrderSide,
        qty: f64,
        limit_price: f64,
        tag: Option<String>,
        created_ts: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            side,
            order_type: OrderType::Limit,
            qty,
            limit_price: Some(limit_price),
            tag,
            created_ts,
            status: OrderStatus::Working,
        }
    }

    pub fn market(
        id: OrderId,
        side: OrderSide,
        qty: f64,
        tag: Option<String>,
        created_ts: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            side,
            order_type: OrderType::Market,
            qty,
            limit_price: None,
            tag,
            created_ts,
            status: OrderStatus::Working,
        }
    }

    pub fn is_working(&self) -> bool {
        self.status == OrderStatus::Working
    }
}
