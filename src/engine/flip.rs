//! Flip resolution.
//!
//! A flip is validated and locked in by `begin_flip`, then resolved by
//! `complete_flip` once the host's animation finishes. `resolve_flip`
//! does both in one step. While a wager is in flight every other flip
//! request is rejected, so interest and payouts can never double-apply.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::*;
use tracing::{debug, info};

use crate::config::EconomyConfig;
use crate::engine::accountant::Accountant;
use crate::engine::coin::CoinSource;
use crate::engine::loans;
use crate::engine::session::SessionState;
use crate::types::{round2, FlipKind, FlipOutcome, Rejection, Side, Wager};

/// Validate a flip request and mark it in flight.
///
/// Auto flips substitute the configured auto stake for `stake`.
pub fn begin_flip(
    state: &SessionState,
    rules: &EconomyConfig,
    bet: Option<Side>,
    stake: Decimal,
    kind: FlipKind,
) -> Result<(SessionState, Wager), Rejection> {
    if state.in_flight.is_some() {
        return Err(Rejection::FlipInFlight);
    }
    let side = bet.ok_or(Rejection::NoBetSelected)?;
    let stake = match kind {
        FlipKind::Manual => round2(stake),
        FlipKind::Auto => {
            if !state.auto_flip_enabled {
                return Err(Rejection::AutoFlipLocked);
            }
            rules.auto_flip.stake
        }
    };
    if stake < Decimal::ZERO {
        return Err(Rejection::NegativeStake(stake));
    }
    if stake > state.balance {
        return Err(Rejection::InsufficientBalance {
            needed: stake,
            available: state.balance,
        });
    }

    let wager = Wager { side, stake, kind };
    let mut next = state.clone();
    next.in_flight = Some(wager.clone());
    debug!(wager = %wager, "Flip started");
    Ok((next, wager))
}

/// Resolve the in-flight wager against a uniform draw `u` in `[0, 1)`.
///
/// Balance is not re-checked here. The stake was reserved at `begin_flip`
/// and only `spendable()` can be spent while the coin is in the air, so the
/// balance still covers it.
pub fn complete_flip(
    state: &SessionState,
    rules: &EconomyConfig,
    u: f64,
    now: DateTime<Utc>,
) -> Result<(SessionState, FlipOutcome), Rejection> {
    let wager = state.in_flight.clone().ok_or(Rejection::NoFlipInFlight)?;
    let mut next = state.clone();
    next.in_flight = None;

    let threshold = state.win_chance.to_f64().unwrap_or(0.0);
    let landed = if u < threshold { Side::Heads } else { Side::Tails };
    let won = wager.side == landed;

    let mut payout = Decimal::ZERO;
    let mut golden_applied = false;
    if won {
        golden_applied = state.golden_active(now);
        let golden_factor = if golden_applied {
            rules.golden.payout_factor
        } else {
            Decimal::ONE
        };
        payout = round2(state.payout_multiplier * golden_factor * wager.stake);
        next.balance = round2(next.balance + payout);
        if state.golden_owned {
            next.golden_until = Some(now + Duration::seconds(rules.golden.duration_secs));
        }
    } else {
        next.balance = round2(next.balance - wager.stake);
    }

    let interest_accrued = loans::accrue_interest(&mut next.loans, &rules.loans);
    next.flip_index += 1;

    let expired_loans = loans::sweep_expired(
        &mut next.balance,
        &mut next.loans,
        next.flip_index,
        &rules.loans,
    );
    let penalty_applied = !expired_loans.is_empty();

    let outcome = FlipOutcome {
        flip_index: next.flip_index,
        kind: wager.kind,
        bet: wager.side,
        landed,
        won,
        stake: wager.stake,
        payout,
        golden_applied,
        balance_after: next.balance,
        interest_accrued,
        expired_loans,
        penalty_applied,
    };
    Accountant::record_flip(&mut next.stats, &outcome);

    info!(
        flip = outcome.flip_index,
        kind = %outcome.kind,
        bet = %outcome.bet,
        landed = %outcome.landed,
        won = outcome.won,
        stake = format!("${:.2}", outcome.stake),
        payout = format!("${:.2}", outcome.payout),
        golden = outcome.golden_applied,
        balance = format!("${:.2}", outcome.balance_after),
        "Flip resolved"
    );
    Ok((next, outcome))
}

/// Validate, draw and resolve a flip in one step.
pub fn resolve_flip(
    state: &SessionState,
    rules: &EconomyConfig,
    bet: Option<Side>,
    stake: Decimal,
    kind: FlipKind,
    coin: &mut dyn CoinSource,
    now: DateTime<Utc>,
) -> Result<(SessionState, FlipOutcome), Rejection> {
    let (pending, _) = begin_flip(state, rules, bet, stake, kind)?;
    complete_flip(&pending, rules, coin.draw(), now)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
