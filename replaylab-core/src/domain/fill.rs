use super::ids::OrderId;
use super::order::OrderSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of matching one order against one bar (or of an immediate market
/// fill). Ephemeral: turned into a journal entry and a position mutation,
/// not retained as a standalone entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub side: OrderSide,
    pub qty: f64,
    pub price: f64,
    pub ts: DateTime<Utc>,
}
