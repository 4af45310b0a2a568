//! BrokerSim — deterministic order matching and position/PnL accounting.
//!
//! OHLC bars carry no intrabar sequencing, so matching commits to one
//! reproducible convention: among the orders a bar makes eligible, the one
//! whose fill price is nearest the bar's open fills first (ties broken by
//! order id), and its side locks the bar — eligible orders on the other
//! side stay working and may fill on a later bar. Changing this rule
//! changes every downstream PnL guarantee, so it is preserved exactly.

use crate::domain::{Bar, Fill, Order, OrderId, OrderSide, OrderStatus, OrderType, Position};
use chrono::{DateTime, Utc};

/// Per-session order matcher and position accumulator.
///
/// Exclusively owns the order list and the position; the session exposes
/// both only through accessors. Orders are never removed — terminal orders
/// remain for audit.
#[derive(Debug, Default)]
pub struct BrokerSim {
    orders: Vec<Order>,
    position: Position,
}

impl BrokerSim {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an order to the working set. Shape validation (positive qty,
    /// finite prices) happens at the session boundary before this call.
    pub fn place(&mut self, order: Order) {
        self.orders.push(order);
    }

    /// Cancel a working order. Returns false for unknown or terminal orders
    /// so callers can treat a miss as "already resolved".
    pub fn cancel(&mut self, order_id: &OrderId) -> bool {
        match self.orders.iter_mut().find(|o| &o.id == order_id) {
            Some(order) if order.is_working() => {
                order.status = OrderStatus::Canceled;
                true
            }
            _ => false,
        }
    }

    /// Re-price a working limit order. Returns false for unknown, terminal,
    /// or market orders.
    pub fn modify(&mut self, order_id: &OrderId, new_price: f64) -> bool {
        match self.orders.iter_mut().find(|o| &o.id == order_id) {
            Some(order) if order.is_working() && order.order_type == OrderType::Limit => {
                order.limit_price = Some(new_price);
                true
            }
            _ => false,
        }
    }

    /// Match one execution bar against the working limit orders.
    ///
    /// 1. A buy limit is eligible when `bar.low <= limit`; a sell limit when
    ///    `bar.high >= limit`. The limit need not lie inside `[low, high]` —
    ///    a buy limit above the bar's high would have traded at open or
    ///    better and is still eligible.
    /// 2. The eligible order with fill price nearest `bar.open` (ties by
    ///    lexicographic order id) fills first and locks the bar to its side.
    /// 3. Every eligible order on the locked side fills at its own limit
    ///    price; the opposite side is skipped for this bar.
    pub fn evaluate_bar(&mut self, bar: &Bar) -> Vec<Fill> {
        let eligible: Vec<(usize, f64)> = self
            .orders
            .iter()
            .enumerate()
            .filter_map(|(i, order)| {
                if !order.is_working() || order.order_type != OrderType::Limit {
                    return None;
                }
                let limit = order.limit_price?;
                let reachable = match order.side {
                    OrderSide::Buy => bar.low <= limit,
                    OrderSide::Sell => bar.high >= limit,
                };
                reachable.then_some((i, limit))
            })
            .collect();

        if eligible.is_empty() {
            return Vec::new();
        }

        let &(first_idx, _) = eligible
            .iter()
            .min_by(|(ia, pa), (ib, pb)| {
                let da = (pa - bar.open).abs();
                let db = (pb - bar.open).abs();
                da.total_cmp(&db)
                    .then_with(|| self.orders[*ia].id.cmp(&self.orders[*ib].id))
            })
            .expect("eligible set is non-empty");
        let lock_side = self.orders[first_idx].side;

        let mut fills = Vec::new();
        for (i, limit) in eligible {
            if self.orders[i].side != lock_side {
                continue;
            }
            let fill = self.fill_order_at(i, limit, bar.ts);
            fills.push(fill);
        }
        fills
    }

    /// Fill a working order in full at `price` — the market-order path.
    ///
    /// Market orders bypass bar evaluation entirely: the session fills them
    /// at the last known close the moment they are placed.
    pub fn fill_market(
        &mut self,
        order_id: &OrderId,
        price: f64,
        ts: DateTime<Utc>,
    ) -> Option<Fill> {
        let idx = self
            .orders
            .iter()
            .position(|o| &o.id == order_id && o.is_working())?;
        Some(self.fill_order_at(idx, price, ts))
    }

    fn fill_order_at(&mut self, idx: usize, price: f64, ts: DateTime<Utc>) -> Fill {
        let order = &mut self.orders[idx];
        order.status = OrderStatus::Filled;
        let fill = Fill {
            order_id: order.id.clone(),
            side: order.side,
            qty: order.qty,
            price,
            ts,
        };
        self.apply_fill(&fill);
        fill
    }

    /// Mutate the position for one fill.
    ///
    /// Same-direction fills extend at a volume-weighted average price.
    /// Opposite-direction fills realize PnL on `min(|pos|, qty)` units at
    /// `(price - avg_price)` (sign flipped for shorts); any residual flips
    /// into a new position at the fill price.
    fn apply_fill(&mut self, fill: &Fill) {
        let pos = &mut self.position;
        let signed_qty = fill.side.sign() * fill.qty;

        if pos.qty == 0.0 || pos.qty.signum() == signed_qty.signum() {
            let total = pos.qty.abs() + fill.qty;
            pos.avg_price = (pos.avg_price * pos.qty.abs() + fill.price * fill.qty) / total;
            pos.qty += signed_qty;
            return;
        }

        let close_qty = pos.qty.abs().min(fill.qty);
        let direction = pos.qty.signum();
        pos.realized_pnl += (fill.price - pos.avg_price) * close_qty * direction;

        let residual = fill.qty - close_qty;
        if residual > 0.0 {
            // Over-close: the remainder becomes a new position at the fill price.
            pos.qty = fill.side.sign() * residual;
            pos.avg_price = fill.price;
        } else {
            pos.qty = direction * (pos.qty.abs() - close_qty);
            if pos.qty == 0.0 {
                pos.avg_price = 0.0;
            }
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn order(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| &o.id == order_id)
    }

    /// Working orders only.
    pub fn working_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.is_working())
    }
}
