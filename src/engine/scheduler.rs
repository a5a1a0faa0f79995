//! Auto-flip scheduler.
//!
//! The host fires `tick` on a fixed cadence (`auto_flip.interval_secs`).
//! A tick resolves an auto flip only when auto-flip is unlocked, a side is
//! selected, nothing is in flight and the balance covers the auto stake;
//! otherwise it is skipped and the snapshot is returned unchanged.

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, warn};

use crate::config::EconomyConfig;
use crate::engine::coin::CoinSource;
use crate::engine::flip::resolve_flip;
use crate::engine::session::SessionState;
use crate::types::{FlipKind, FlipOutcome, Rejection, Side};

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    AutoFlipLocked,
    NoBetSelected,
    FlipInFlight,
    InsufficientBalance,
    /// The flip itself was rejected, e.g. a negative `auto_flip.stake`.
    Rejected(Rejection),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AutoFlipLocked => write!(f, "auto-flip locked"),
            SkipReason::NoBetSelected => write!(f, "no side selected"),
            SkipReason::FlipInFlight => write!(f, "flip in flight"),
            SkipReason::InsufficientBalance => write!(f, "balance below auto stake"),
            SkipReason::Rejected(rejection) => write!(f, "rejected: {rejection}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Flipped(FlipOutcome),
    Skipped(SkipReason),
}

/// Why the next tick would be skipped, or `None` if it would flip.
pub fn skip_reason(state: &SessionState, rules: &EconomyConfig) -> Option<SkipReason> {
    if !state.auto_flip_enabled {
        Some(SkipReason::AutoFlipLocked)
    } else if state.pending_bet.side.is_none() {
        Some(SkipReason::NoBetSelected)
    } else if state.in_flight.is_some() {
        Some(SkipReason::FlipInFlight)
    } else if state.balance < rules.auto_flip.stake {
        Some(SkipReason::InsufficientBalance)
    } else {
        None
    }
}

/// Run one scheduler tick against the selected side.
pub fn tick(
    state: &SessionState,
    rules: &EconomyConfig,
    coin: &mut dyn CoinSource,
    now: DateTime<Utc>,
) -> (SessionState, TickOutcome) {
    if let Some(reason) = skip_reason(state, rules) {
        debug!(reason = %reason, "Auto-flip tick skipped");
        return (state.clone(), TickOutcome::Skipped(reason));
    }
    let side: Option<Side> = state.pending_bet.side;
    match resolve_flip(state, rules, side, rules.auto_flip.stake, FlipKind::Auto, coin, now) {
        Ok((next, outcome)) => (next, TickOutcome::Flipped(outcome)),
        Err(rejection) => {
            let reason = match rejection {
                Rejection::AutoFlipLocked => SkipReason::AutoFlipLocked,
                Rejection::NoBetSelected => SkipReason::NoBetSelected,
                Rejection::FlipInFlight => SkipReason::FlipInFlight,
                Rejection::InsufficientBalance { .. } => SkipReason::InsufficientBalance,
                other => {
                    warn!(reason = %other, "Auto flip rejected");
                    SkipReason::Rejected(other)
                }
            };
            (state.clone(), TickOutcome::Skipped(reason))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
