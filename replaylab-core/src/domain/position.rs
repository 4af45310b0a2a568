use serde::{Deserialize, Serialize};

/// Net position for one session: signed quantity, volume-weighted average
/// entry price, and cumulative realized PnL.
///
/// `avg_price` is meaningful only when `qty != 0`. Mutated exclusively by
/// the broker's fill application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub qty: f64,
    pub avg_price: f64,
    pub realized_pnl: f64,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.qty == 0.0
    }

    pub fn is_long(&self) -> bool {
        self.qty > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.qty < 0.0
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.qty * (current_price - self.avg_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_flat() {
        let pos = Position::default();
        assert!(pos.is_flat());
        assert!(!pos.is_long());
        assert!(!pos.is_short());
        assert_eq!(pos.realized_pnl, 0.0);
    }

    #[test]
    fn unrealized_pnl_signs() {
        let long = Position {
            qty: 10.0,
            avg_price: 100.0,
            realized_pnl: 0.0,
        };
        assert_eq!(long.unrealized_pnl(110.0), 100.0);

        let short = Position {
            qty: -10.0,
            avg_price: 100.0,
            realized_pnl: 0.0,
        };
        assert_eq!(short.unrealized_pnl(110.0), -100.0);
    }
}
