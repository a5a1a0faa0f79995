//! Game — the host-facing owner of the current snapshot.
//!
//! Wraps the pure operations with the rules and coin they need, and swaps
//! in the new snapshot only when an operation succeeds.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::config::EconomyConfig;
use crate::engine::coin::CoinSource;
use crate::engine::session::{init_session, SessionState};
use crate::engine::shop::{self, ShopEntry};
use crate::engine::scheduler::{self, TickOutcome};
use crate::engine::{flip, loans};
use crate::types::{round2, FlipKind, FlipOutcome, PendingBet, Rejection, Side, Wager};

/// Record the side and stake chosen in the UI.
pub fn select_bet(
    state: &SessionState,
    side: Option<Side>,
    stake: Decimal,
) -> Result<SessionState, Rejection> {
    if stake < Decimal::ZERO {
        return Err(Rejection::NegativeStake(stake));
    }
    let mut next = state.clone();
    next.pending_bet = PendingBet {
        side,
        stake: round2(stake),
    };
    Ok(next)
}

pub struct Game {
    state: SessionState,
    rules: EconomyConfig,
    coin: Box<dyn CoinSource>,
}

impl Game {
    /// Start a fresh session.
    pub fn new(rules: EconomyConfig, coin: Box<dyn CoinSource>) -> Self {
        let state = init_session(&rules);
        Self { state, rules, coin }
    }

    /// Continue from a saved snapshot.
    pub fn resume(state: SessionState, rules: EconomyConfig, coin: Box<dyn CoinSource>) -> Self {
        Self { state, rules, coin }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn rules(&self) -> &EconomyConfig {
        &self.rules
    }

    pub fn shop(&self) -> Vec<ShopEntry> {
        shop::catalog_view(&self.state, &self.rules)
    }

    pub fn select_bet(&mut self, side: Option<Side>, stake: Decimal) -> Result<(), Rejection> {
        self.state = select_bet(&self.state, side, stake)?;
        Ok(())
    }

    /// Flip immediately with the selected bet.
    pub fn flip(&mut self, now: DateTime<Utc>) -> Result<FlipOutcome, Rejection> {
        let bet = self.state.pending_bet.clone();
        let (next, outcome) = flip::resolve_flip(
            &self.state,
            &self.rules,
            bet.side,
            bet.stake,
            FlipKind::Manual,
            self.coin.as_mut(),
            now,
        )?;
        self.state = next;
        Ok(outcome)
    }

    /// Lock in the selected bet while the coin animates.
    pub fn start_flip(&mut self) -> Result<Wager, Rejection> {
        let bet = self.state.pending_bet.clone();
        let (next, wager) =
            flip::begin_flip(&self.state, &self.rules, bet.side, bet.stake, FlipKind::Manual)?;
        self.state = next;
        Ok(wager)
    }

    /// Reveal the flip started by `start_flip`.
    pub fn finish_flip(&mut self, now: DateTime<Utc>) -> Result<FlipOutcome, Rejection> {
        if !self.state.is_flipping() {
            return Err(Rejection::NoFlipInFlight);
        }
        let u = self.coin.draw();
        let (next, outcome) = flip::complete_flip(&self.state, &self.rules, u, now)?;
        self.state = next;
        Ok(outcome)
    }

    pub fn buy_upgrade(&mut self, id: &str) -> Result<(), Rejection> {
        self.state = shop::buy_upgrade(&self.state, &self.rules, id)?;
        Ok(())
    }

    /// Open a loan; returns its id.
    pub fn open_loan(&mut self, amount: Decimal) -> Result<u64, Rejection> {
        let id = self.state.next_loan_id;
        self.state = loans::open_loan(&self.state, &self.rules, amount)?;
        Ok(id)
    }

    pub fn pay_off_loan(&mut self, loan_id: u64) -> Result<(), Rejection> {
        self.state = loans::pay_off_loan(&self.state, loan_id)?;
        Ok(())
    }

    /// One auto-flip scheduler tick.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let (next, outcome) = scheduler::tick(&self.state, &self.rules, self.coin.as_mut(), now);
        self.state = next;
        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
