//! Accountant — session statistics.
//!
//! Records every resolved flip, loan and purchase into `SessionStats`
//! so the host can show win rate, return-to-player and peak balance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::types::{FlipKind, FlipOutcome};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Running totals for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub manual_flips: u64,
    pub auto_flips: u64,
    pub wins: u64,
    pub losses: u64,
    pub total_wagered: Decimal,
    pub total_paid_out: Decimal,
    pub lost_stakes: Decimal,
    pub interest_accrued: Decimal,
    pub loans_opened: u64,
    pub loans_repaid: u64,
    pub loans_expired: u64,
    pub upgrades_bought: u64,
    pub upgrade_spend: Decimal,
    pub starting_balance: Decimal,
    pub peak_balance: Decimal,
}

impl SessionStats {
    pub fn new(starting_balance: Decimal) -> Self {
        Self {
            manual_flips: 0,
            auto_flips: 0,
            wins: 0,
            losses: 0,
            total_wagered: Decimal::ZERO,
            total_paid_out: Decimal::ZERO,
            lost_stakes: Decimal::ZERO,
            interest_accrued: Decimal::ZERO,
            loans_opened: 0,
            loans_repaid: 0,
            loans_expired: 0,
            upgrades_bought: 0,
            upgrade_spend: Decimal::ZERO,
            starting_balance,
            peak_balance: starting_balance,
        }
    }

    pub fn flips(&self) -> u64 {
        self.manual_flips + self.auto_flips
    }

    /// Win rate as a percentage. Returns 0.0 if no flips resolved.
    pub fn win_rate(&self) -> f64 {
        let flips = self.flips();
        if flips == 0 {
            0.0
        } else {
            (self.wins as f64 / flips as f64) * 100.0
        }
    }

    /// Paid out per unit wagered. Zero before the first non-zero stake.
    pub fn return_to_player(&self) -> Decimal {
        if self.total_wagered.is_zero() {
            Decimal::ZERO
        } else {
            self.total_paid_out / self.total_wagered
        }
    }

    /// Payouts minus losing stakes.
    pub fn net_result(&self) -> Decimal {
        self.total_paid_out - self.lost_stakes
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "flips={} (manual {} / auto {}) | W{}/L{} | win_rate={:.1}% | wagered=${:.2} | paid=${:.2} | interest=${:.2} | peak=${:.2}",
            self.flips(),
            self.manual_flips,
            self.auto_flips,
            self.wins,
            self.losses,
            self.win_rate(),
            self.total_wagered,
            self.total_paid_out,
            self.interest_accrued,
            self.peak_balance,
        )
    }
}

// ---------------------------------------------------------------------------
// Accountant
// ---------------------------------------------------------------------------

pub struct Accountant;

impl Accountant {
    /// Record a resolved flip.
    pub fn record_flip(stats: &mut SessionStats, outcome: &FlipOutcome) {
        match outcome.kind {
            FlipKind::Manual => stats.manual_flips += 1,
            FlipKind::Auto => stats.auto_flips += 1,
        }
        stats.total_wagered += outcome.stake;
        if outcome.won {
            stats.wins += 1;
            stats.total_paid_out += outcome.payout;
        } else {
            stats.losses += 1;
            stats.lost_stakes += outcome.stake;
        }
        stats.interest_accrued += outcome.interest_accrued;
        stats.loans_expired += outcome.expired_loans.len() as u64;
        Self::observe_balance(stats, outcome.balance_after);

        if outcome.penalty_applied {
            warn!(
                flip = outcome.flip_index,
                expired = outcome.expired_loans.len(),
                "Loan expiry penalty recorded"
            );
        }
        debug!(
            flip = outcome.flip_index,
            wins = stats.wins,
            losses = stats.losses,
            rtp = %stats.return_to_player().round_dp(4),
            "Flip recorded"
        );
    }

    pub fn record_loan_opened(stats: &mut SessionStats, balance_after: Decimal) {
        stats.loans_opened += 1;
        Self::observe_balance(stats, balance_after);
    }

    pub fn record_loan_repaid(stats: &mut SessionStats) {
        stats.loans_repaid += 1;
    }

    pub fn record_purchase(stats: &mut SessionStats, price: Decimal) {
        stats.upgrades_bought += 1;
        stats.upgrade_spend += price;
    }

    fn observe_balance(stats: &mut SessionStats, balance: Decimal) {
        if balance > stats.peak_balance {
            stats.peak_balance = balance;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
