//! Replay session orchestration: configuration, anchoring, the two-clock
//! stepper, payload construction, and the session registry.

pub mod anchor;
pub mod config;
pub mod registry;
pub mod replay;
pub mod snapshot;

pub use config::{AnchorConstraints, SessionConfig};
pub use registry::SessionRegistry;
pub use replay::{ReplaySession, SessionError, SessionStatus, SessionSummary, SummaryStatus};
pub use snapshot::{ReplayState, StepDelta, WindowPayload};
