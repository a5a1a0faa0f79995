//! Session snapshot.
//!
//! `SessionState` is the single aggregate the engine owns. Operations take
//! a snapshot by reference and hand back a new one; the host keeps the
//! current snapshot and renders from it.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::info;
use uuid::Uuid;

use crate::config::EconomyConfig;
use crate::engine::accountant::SessionStats;
use crate::types::{Loan, PendingBet, Wager};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub balance: Decimal,
    /// Resolved flips so far (manual and auto).
    pub flip_index: u64,
    pub pending_bet: PendingBet,
    /// Probability the coin lands heads.
    pub win_chance: Decimal,
    pub payout_multiplier: Decimal,
    /// End of the golden payout window, if one was ever started.
    pub golden_until: Option<DateTime<Utc>>,
    pub golden_owned: bool,
    pub auto_flip_enabled: bool,
    pub loans: Vec<Loan>,
    pub next_loan_id: u64,
    /// One-time upgrades already owned.
    pub purchased_once: BTreeSet<String>,
    /// Current price of each repeatable upgrade bought at least once.
    pub prices: BTreeMap<String, Decimal>,
    pub purchase_counts: BTreeMap<String, u32>,
    /// Wager of the flip currently animating, if any.
    pub in_flight: Option<Wager>,
    pub stats: SessionStats,
}

/// Create a fresh session with the baseline economy.
pub fn init_session(rules: &EconomyConfig) -> SessionState {
    let state = SessionState {
        session_id: Uuid::new_v4(),
        started_at: Utc::now(),
        balance: rules.starting_balance,
        flip_index: 0,
        pending_bet: PendingBet::default(),
        win_chance: rules.base_win_chance,
        payout_multiplier: rules.payout_multiplier,
        golden_until: None,
        golden_owned: false,
        auto_flip_enabled: false,
        loans: Vec::new(),
        next_loan_id: 1,
        purchased_once: BTreeSet::new(),
        prices: BTreeMap::new(),
        purchase_counts: BTreeMap::new(),
        in_flight: None,
        stats: SessionStats::new(rules.starting_balance),
    };
    info!(
        session = %state.session_id,
        balance = format!("${:.2}", state.balance),
        "Session started"
    );
    state
}

impl SessionState {
    /// Whether the golden payout window is open at `now`.
    pub fn golden_active(&self, now: DateTime<Utc>) -> bool {
        self.golden_until.is_some_and(|until| now < until)
    }

    /// Seconds left in the golden window (zero when inactive).
    pub fn golden_remaining(&self, now: DateTime<Utc>) -> Duration {
        match self.golden_until {
            Some(until) if now < until => until - now,
            _ => Duration::zero(),
        }
    }

    pub fn is_flipping(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Balance not reserved by the wager in flight.
    pub fn spendable(&self) -> Decimal {
        match &self.in_flight {
            Some(wager) => self.balance - wager.stake,
            None => self.balance,
        }
    }

    /// Total owed across all open loans.
    pub fn total_debt(&self) -> Decimal {
        self.loans.iter().map(|l| l.amount).sum()
    }

    /// Balance minus outstanding debt.
    pub fn net_worth(&self) -> Decimal {
        self.balance - self.total_debt()
    }

    pub fn loan(&self, id: u64) -> Option<&Loan> {
        self.loans.iter().find(|l| l.id == id)
    }

    /// Check the invariants every operation must preserve.
    pub fn check_invariants(&self, rules: &EconomyConfig) -> Result<(), String> {
        if self.win_chance < Decimal::ZERO || self.win_chance > rules.max_win_chance {
            return Err(format!("win chance {} outside [0, {}]", self.win_chance, rules.max_win_chance));
        }
        for loan in &self.loans {
            if loan.amount < loan.principal {
                return Err(format!("loan {} owes less than its principal", loan.id));
            }
            if loan.age(self.flip_index) >= rules.loans.term_flips {
                return Err(format!("loan {} outlived its term", loan.id));
            }
        }
        for id in &self.purchased_once {
            if self.prices.contains_key(id) {
                return Err(format!("one-time upgrade {id} has a repeat price"));
            }
        }
        Ok(())
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "balance=${:.2} | flips={} | heads chance={:.0}% | payout x{} | loans={} (owed ${:.2}) | auto-flip={}",
            self.balance,
            self.flip_index,
            self.win_chance * Decimal::ONE_HUNDRED,
            self.payout_multiplier,
            self.loans.len(),
            self.total_debt(),
            if self.auto_flip_enabled { "on" } else { "off" },
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FlipKind, Side};
    use rust_decimal_macros::dec;

    fn loan(id: u64, principal: Decimal, amount: Decimal, opened_at_flip: u64) -> Loan {
        Loan { id, principal, amount, opened_at_flip }
    }

    #[test]
    fn test_init_session_baseline() {
        let rules = EconomyConfig::default();
        let state = init_session(&rules);
        assert_eq!(state.balance, dec!(25));
        assert_eq!(state.flip_index, 0);
        assert_eq!(state.win_chance, dec!(0.5));
        assert_eq!(state.payout_multiplier, dec!(0.9));
        assert!(state.loans.is_empty());
        assert!(state.purchased_once.is_empty());
        assert!(!state.auto_flip_enabled);
        assert!(!state.is_flipping());
        assert!(state.check_invariants(&rules).is_ok());
    }

    #[test]
    fn test_golden_window() {
        let mut state = init_session(&EconomyConfig::default());
        let now = Utc::now();
        assert!(!state.golden_active(now));

        state.golden_until = Some(now + Duration::seconds(30));
        assert!(state.golden_active(now));
        assert!(state.golden_active(now + Duration::seconds(29)));
        assert!(!state.golden_active(now + Duration::seconds(30)));
        assert_eq!(state.golden_remaining(now + Duration::seconds(10)), Duration::seconds(20));
        assert_eq!(state.golden_remaining(now + Duration::seconds(45)), Duration::zero());
    }

    #[test]
    fn test_spendable_reserves_in_flight_stake() {
        let mut state = init_session(&EconomyConfig::default());
        assert_eq!(state.spendable(), dec!(25));
        state.in_flight = Some(Wager { side: Side::Heads, stake: dec!(10), kind: FlipKind::Manual });
        assert_eq!(state.spendable(), dec!(15));
    }

    #[test]
    fn test_debt_and_net_worth() {
        let mut state = init_session(&EconomyConfig::default());
        state.loans.push(loan(1, dec!(100), dec!(105), 0));
        state.loans.push(loan(2, dec!(20), dec!(20), 1));
        assert_eq!(state.total_debt(), dec!(125));
        assert_eq!(state.net_worth(), dec!(-100));
        assert_eq!(state.loan(2).unwrap().principal, dec!(20));
        assert!(state.loan(3).is_none());
    }

    #[test]
    fn test_invariants_catch_violations() {
        let rules = EconomyConfig::default();

        let mut state = init_session(&rules);
        state.win_chance = dec!(0.96);
        assert!(state.check_invariants(&rules).is_err());

        let mut state = init_session(&rules);
        state.loans.push(loan(1, dec!(100), dec!(99), 0));
        assert!(state.check_invariants(&rules).is_err());

        let mut state = init_session(&rules);
        state.flip_index = 10;
        state.loans.push(loan(1, dec!(100), dec!(160), 0));
        assert!(state.check_invariants(&rules).is_err());

        let mut state = init_session(&rules);
        state.purchased_once.insert("luck-boost".into());
        state.prices.insert("luck-boost".into(), dec!(600));
        assert!(state.check_invariants(&rules).is_err());
    }

    #[test]
    fn test_display() {
        let state = init_session(&EconomyConfig::default());
        let s = state.to_string();
        assert!(s.contains("balance=$25.00"));
        assert!(s.contains("heads chance=50%"));
        assert!(s.contains("auto-flip=off"));
    }
}
