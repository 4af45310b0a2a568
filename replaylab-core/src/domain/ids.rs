use serde::{Deserialize, Serialize};
use std::fmt;

/// Session ID — opaque string assigned by the caller or registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order ID.
///
/// Zero-padded decimal suffix (`ord-000042`) so that lexicographic order
/// equals creation order. The matcher relies on this for deterministic
/// tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<u64> for OrderId {
    fn from(n: u64) -> Self {
        Self(format!("ord-{n:06}"))
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates sequential order ids for one session.
#[derive(Debug, Clone, Default)]
pub struct OrderIdGen {
    next: u64,
}

impl OrderIdGen {
    pub fn next_id(&mut self) -> OrderId {
        self.next += 1;
        OrderId::from(self.next)
    }
}
