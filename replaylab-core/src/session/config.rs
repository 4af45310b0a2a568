//! Serializable replay session configuration.

use crate::overlays::SessionCalendar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Soft constraints on automatic anchor placement, in execution bars.
///
/// When the dataset cannot satisfy all three, they degrade in documented
/// order: history+future are kept first, then the age-from-end constraint,
/// and finally the anchor is placed as late as the history requirement
/// allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorConstraints {
    /// Trailing bars required behind the anchor (chart history).
    pub min_history_bars: usize,
    /// Leading bars required ahead of the anchor (practice runway).
    pub min_future_bars: usize,
    /// Minimum distance from the dataset's end, so a session does not start
    /// against the newest, most familiar data.
    pub min_age_bars: usize,
}

impl Default for AnchorConstraints {
    fn default() -> Self {
        Self {
            min_history_bars: 120,
            min_future_bars: 240,
            min_age_bars: 1_440,
        }
    }
}

/// Configuration for a single replay session.
///
/// `start`/`end` omitted means the anchor is chosen by the seeded selector
/// over the whole feed. `disp_tf_sec` must be an integer multiple of
/// `exec_tf_sec`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub symbol: String,

    #[serde(default)]
    pub start: Option<DateTime<Utc>>,

    #[serde(default)]
    pub end: Option<DateTime<Utc>>,

    /// Execution clock period in seconds.
    #[serde(default = "default_exec_tf")]
    pub exec_tf_sec: u32,

    /// Display clock period in seconds.
    #[serde(default = "default_disp_tf")]
    pub disp_tf_sec: u32,

    /// Master seed for anchor selection. `None` derives one from the config
    /// hash, keeping unseeded runs reproducible for identical configs.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Length of the trailing display-bar window shipped in snapshots.
    #[serde(default = "default_history_bars")]
    pub history_bars: usize,

    #[serde(default)]
    pub anchor: AnchorConstraints,

    #[serde(default)]
    pub calendar: SessionCalendar,
}

fn default_exec_tf() -> u32 {
    60
}

fn default_disp_tf() -> u32 {
    300
}

fn default_history_bars() -> usize {
    120
}

impl SessionConfig {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            start: None,
            end: None,
            exec_tf_sec: default_exec_tf(),
            disp_tf_sec: default_disp_tf(),
            seed: None,
            history_bars: default_history_bars(),
            anchor: AnchorConstraints::default(),
            calendar: SessionCalendar::default(),
        }
    }

    /// Structural validation. Returns a description of the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.symbol.is_empty() {
            return Err("symbol must not be empty".into());
        }
        if self.exec_tf_sec == 0 {
            return Err("exec_tf_sec must be positive".into());
        }
        if self.disp_tf_sec == 0 || self.disp_tf_sec % self.exec_tf_sec != 0 {
            return Err(format!(
                "disp_tf_sec ({}) must be a positive integer multiple of exec_tf_sec ({})",
                self.disp_tf_sec, self.exec_tf_sec
            ));
        }
        if self.history_bars == 0 {
            return Err("history_bars must be positive".into());
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end <= start {
                return Err(format!("end ({end}) must be after start ({start})"));
            }
        }
        if !self.calendar.is_valid() {
            return Err("calendar: open must precede close and offset must be valid".into());
        }
        Ok(())
    }

    /// Deterministic hash of the canonical JSON form. Recorded in the
    /// SESSION_START payload and used to derive a seed when none is given.
    pub fn config_hash(&self) -> String {
        let json = serde_json::to_string(self).expect("SessionConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
