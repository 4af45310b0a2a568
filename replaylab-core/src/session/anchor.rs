//! Seeded anchor selection.
//!
//! The anchor is the bar index where live stepping begins: bars before it
//! are chart history, bars after it are the practice runway. Seeds are
//! derived by hashing, not by RNG call order, so the same master seed and
//! symbol always land on the same anchor regardless of what else consumed
//! randomness.

use super::config::AnchorConstraints;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Derive the per-(seed, symbol) sub-seed via BLAKE3.
pub fn derive_seed(master_seed: u64, symbol: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&master_seed.to_le_bytes());
    hasher.update(symbol.as_bytes());
    let hash = hasher.finalize();
    u64::from_le_bytes(hash.as_bytes()[..8].try_into().expect("hash is 32 bytes"))
}

/// Pick an anchor index into a feed of `n` bars.
///
/// Constraint precedence when the dataset is too short to satisfy all
/// three: history+future > age-from-end > as-late-as-history-allows.
pub fn select_anchor_index(n: usize, constraints: &AnchorConstraints, rng: &mut StdRng) -> usize {
    assert!(n > 0, "anchor selection requires a non-empty feed");

    let lo = constraints.min_history_bars.min(n - 1);

    // All three constraints: the anchor must leave max(future, age) bars
    // between itself and the dataset end.
    let tail = constraints.min_future_bars.max(constraints.min_age_bars);
    if let Some(hi) = n.checked_sub(1 + tail) {
        if lo <= hi {
            return rng.gen_range(lo..=hi);
        }
    }

    // Drop the age constraint, keep history + future.
    if let Some(hi) = n.checked_sub(1 + constraints.min_future_bars) {
        if lo <= hi {
            return rng.gen_range(lo..=hi);
        }
    }

    // Too short for the runway: keep the history requirement and leave
    // whatever future remains.
    lo
}
