//! Session simulator.
//!
//! Plays a long run of flips through the real engine with a fixed betting
//! policy to evaluate the economy: final and peak balance, max drawdown,
//! win rate, return-to-player and when (if ever) the player went bust.

use chrono::{Duration, Utc};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::fmt;
use tracing::{debug, info};

use crate::config::EconomyConfig;
use crate::engine::coin::CoinSource;
use crate::engine::game::Game;
use crate::engine::scheduler::TickOutcome;
use crate::types::{round2, Rejection, Side};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How much to stake on each flip.
#[derive(Debug, Clone, PartialEq)]
pub enum StakePolicy {
    /// The same amount every flip.
    Flat(Decimal),
    /// A fraction of the current balance, rounded to cents.
    Fraction(Decimal),
}

impl StakePolicy {
    pub fn stake_for(&self, balance: Decimal) -> Decimal {
        match self {
            StakePolicy::Flat(amount) => *amount,
            StakePolicy::Fraction(f) => round2(balance.max(Decimal::ZERO) * *f),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub flips: u64,
    pub side: Side,
    pub stake: StakePolicy,
    /// Upgrades bought (in order) whenever they become affordable.
    pub buy: Vec<String>,
    /// Simulated wall-clock seconds between flips (drives the golden window).
    pub seconds_per_flip: i64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            flips: 1000,
            side: Side::Heads,
            stake: StakePolicy::Flat(dec!(1)),
            buy: Vec::new(),
            seconds_per_flip: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub initial_balance: Decimal,
    pub final_balance: Decimal,
    pub peak_balance: Decimal,
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: f64,
    /// Manual and auto flips together.
    pub flips_played: u64,
    pub manual_flips: u64,
    pub auto_flips: u64,
    pub wins: u64,
    pub losses: u64,
    pub win_rate: f64,
    pub return_to_player: Decimal,
    pub upgrades_bought: Vec<String>,
    /// Flip index at which the next stake could no longer be covered.
    pub busted_at: Option<u64>,
    /// Balance after each flip, starting with the initial balance at index 0.
    pub balance_history: Vec<(u64, Decimal)>,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "flips played:     {} (manual {} / auto {})",
            self.flips_played, self.manual_flips, self.auto_flips
        )?;
        writeln!(f, "wins / losses:    {} / {} ({:.1}%)", self.wins, self.losses, self.win_rate * 100.0)?;
        writeln!(f, "balance:          ${:.2} -> ${:.2}", self.initial_balance, self.final_balance)?;
        writeln!(f, "peak balance:     ${:.2}", self.peak_balance)?;
        writeln!(f, "max drawdown:     ${:.2} ({:.1}%)", self.max_drawdown, self.max_drawdown_pct)?;
        writeln!(f, "return to player: {:.4}", self.return_to_player)?;
        if !self.upgrades_bought.is_empty() {
            writeln!(f, "upgrades bought:  {}", self.upgrades_bought.join(", "))?;
        }
        match self.busted_at {
            Some(flip) => write!(f, "busted at flip:   {flip}"),
            None => write!(f, "busted at flip:   never"),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

pub struct Simulator {
    rules: EconomyConfig,
    config: SimulationConfig,
}

impl Simulator {
    pub fn new(rules: EconomyConfig, config: SimulationConfig) -> Self {
        Self { rules, config }
    }

    /// Play up to `config.flips` manual flips, stopping early on bust.
    ///
    /// Auto-flip ticks fire on the simulated clock every
    /// `auto_flip.interval_secs`, so an unlocked accountant plays too.
    pub fn run(&self, coin: Box<dyn CoinSource>) -> SimulationReport {
        let mut game = Game::new(self.rules.clone(), coin);
        let initial_balance = game.state().balance;
        let start = Utc::now();
        let interval = self.rules.auto_flip.interval_secs.max(1) as i64;
        let mut ticks_fired: i64 = 0;
        let mut peak = initial_balance;
        let mut max_dd = Decimal::ZERO;
        let mut balance_history = vec![(0, initial_balance)];
        let mut upgrades_bought = Vec::new();
        let mut busted_at = None;

        let mut track = |balance: Decimal, flip_index: u64, history: &mut Vec<(u64, Decimal)>| {
            if balance > peak {
                peak = balance;
            }
            let dd = peak - balance;
            if dd > max_dd {
                max_dd = dd;
            }
            history.push((flip_index, balance));
        };

        for i in 0..self.config.flips {
            let elapsed = self.config.seconds_per_flip * i as i64;

            // Ticks due between the previous flip and this one
            while (ticks_fired + 1) * interval <= elapsed {
                ticks_fired += 1;
                let at = start + Duration::seconds(ticks_fired * interval);
                match game.tick(at) {
                    TickOutcome::Flipped(outcome) => {
                        track(outcome.balance_after, outcome.flip_index, &mut balance_history)
                    }
                    TickOutcome::Skipped(reason) => debug!(reason = %reason, "Simulated tick skipped"),
                }
            }

            for id in &self.config.buy {
                let already_applied = game.rules().upgrade(id).is_some_and(|def| {
                    !def.effect.stacks() && game.state().purchase_counts.contains_key(id)
                });
                if already_applied {
                    continue;
                }
                match game.buy_upgrade(id) {
                    Ok(()) => {
                        debug!(upgrade = %id, flip = i, "Simulator bought upgrade");
                        upgrades_bought.push(id.clone());
                    }
                    Err(Rejection::AlreadyOwned(_)) | Err(Rejection::InsufficientBalance { .. }) => {}
                    Err(other) => debug!(upgrade = %id, reason = %other, "Upgrade skipped"),
                }
            }

            let balance = game.state().balance;
            let stake = self.config.stake.stake_for(balance);
            if stake.is_zero() || stake > balance {
                busted_at = Some(game.state().flip_index);
                break;
            }
            if game.select_bet(Some(self.config.side), stake).is_err() {
                busted_at = Some(game.state().flip_index);
                break;
            }

            let now = start + Duration::seconds(elapsed);
            match game.flip(now) {
                Ok(outcome) => track(outcome.balance_after, outcome.flip_index, &mut balance_history),
                Err(reason) => {
                    debug!(reason = %reason, "Simulated flip rejected");
                    busted_at = Some(game.state().flip_index);
                    break;
                }
            }
        }

        let state = game.state();
        let stats = &state.stats;
        let flips_played = stats.flips();
        let max_drawdown_pct = if peak > Decimal::ZERO {
            (max_dd / peak * dec!(100)).to_f64().unwrap_or(0.0)
        } else {
            0.0
        };

        let report = SimulationReport {
            initial_balance,
            final_balance: state.balance,
            peak_balance: peak,
            max_drawdown: max_dd,
            max_drawdown_pct,
            flips_played,
            manual_flips: stats.manual_flips,
            auto_flips: stats.auto_flips,
            wins: stats.wins,
            losses: stats.losses,
            win_rate: if flips_played > 0 { stats.wins as f64 / flips_played as f64 } else { 0.0 },
            return_to_player: stats.return_to_player(),
            upgrades_bought,
            busted_at,
            balance_history,
        };

        info!(
            flips = report.flips_played,
            final_balance = format!("${:.2}", report.final_balance),
            peak = format!("${:.2}", report.peak_balance),
            busted = report.busted_at.is_some(),
            "Simulation complete"
        );
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
