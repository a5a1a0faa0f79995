//! Shared types for the COINFLIP engine.
//!
//! These types form the data model used across all modules.
//! They are kept free of engine logic so that the session, shop, loan
//! and scheduler modules can depend on them without circular references.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Round a currency amount to cents, half away from zero.
///
/// Applied immediately after every arithmetic step that produces money,
/// never deferred, so compounding accumulates rounding step by step.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// A face of the coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Heads,
    Tails,
}

impl Side {
    /// The opposite face.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Heads => Side::Tails,
            Side::Tails => Side::Heads,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Heads => write!(f, "Heads"),
            Side::Tails => write!(f, "Tails"),
        }
    }
}

/// Parse a side from user input (case-insensitive).
impl std::str::FromStr for Side {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "heads" | "head" | "h" => Ok(Side::Heads),
            "tails" | "tail" | "t" => Ok(Side::Tails),
            _ => Err(anyhow::anyhow!("Unknown side: {s}")),
        }
    }
}

/// Who triggered a flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlipKind {
    /// Player pressed the flip button; stake is the player's choice.
    Manual,
    /// Auto-flip tick; stake is the fixed auto stake.
    Auto,
}

impl fmt::Display for FlipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlipKind::Manual => write!(f, "manual"),
            FlipKind::Auto => write!(f, "auto"),
        }
    }
}

// ---------------------------------------------------------------------------
// Bets
// ---------------------------------------------------------------------------

/// The bet currently selected in the UI. Retained between flips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingBet {
    pub side: Option<Side>,
    pub stake: Decimal,
}

impl Default for PendingBet {
    fn default() -> Self {
        Self {
            side: None,
            stake: Decimal::ZERO,
        }
    }
}

/// A validated bet, locked in while its flip is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wager {
    pub side: Side,
    /// Effective stake (the fixed auto stake for auto flips).
    pub stake: Decimal,
    pub kind: FlipKind,
}

impl fmt::Display for Wager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ${:.2} on {}", self.kind, self.stake, self.side)
    }
}

// ---------------------------------------------------------------------------
// Loans
// ---------------------------------------------------------------------------

/// An open loan. `amount` compounds once per resolved flip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: u64,
    pub principal: Decimal,
    pub amount: Decimal,
    pub opened_at_flip: u64,
}

impl Loan {
    /// Number of resolved flips since the loan was opened.
    pub fn age(&self, flip_index: u64) -> u64 {
        flip_index.saturating_sub(self.opened_at_flip)
    }

    /// Interest accrued so far.
    pub fn interest(&self) -> Decimal {
        self.amount - self.principal
    }
}

impl fmt::Display for Loan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loan {} | owed ${:.2} (principal ${:.2}) | opened on flip {}",
            self.id, self.amount, self.principal, self.opened_at_flip,
        )
    }
}

// ---------------------------------------------------------------------------
// Flip outcome
// ---------------------------------------------------------------------------

/// Everything the presentation layer needs to narrate one resolved flip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlipOutcome {
    /// Flip index after this flip resolved.
    pub flip_index: u64,
    pub kind: FlipKind,
    pub bet: Side,
    pub landed: Side,
    pub won: bool,
    pub stake: Decimal,
    /// Amount credited on a win; zero on a loss.
    pub payout: Decimal,
    pub golden_applied: bool,
    pub balance_after: Decimal,
    /// Interest added across all loans by this flip.
    pub interest_accrued: Decimal,
    /// Ids of loans removed by the expiry sweep.
    pub expired_loans: Vec<u64>,
    /// Balance was reset to zero by a loan expiry.
    pub penalty_applied: bool,
}

impl FlipOutcome {
    /// Signed balance change from the bet alone (ignores the expiry penalty).
    pub fn net(&self) -> Decimal {
        if self.won {
            self.payout
        } else {
            -self.stake
        }
    }
}

impl fmt::Display for FlipOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.won {
            write!(
                f,
                "#{} {}: you won ${:.2}{} (10% of your winnings taxed)",
                self.flip_index,
                self.landed,
                self.payout,
                if self.golden_applied { " with the golden coin" } else { "" },
            )?;
        } else {
            write!(
                f,
                "#{} {}: you lost ${:.2}",
                self.flip_index, self.landed, self.stake,
            )?;
        }
        if self.penalty_applied {
            write!(f, " | loan expired, balance seized")?;
        }
        write!(f, " | balance ${:.2}", self.balance_after)
    }
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Why an engine operation was refused. The state is never modified
/// when one of these is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("No bet selected: pick heads or tails before flipping")]
    NoBetSelected,

    #[error("Stake cannot be negative: ${0:.2}")]
    NegativeStake(Decimal),

    #[error("Insufficient balance: need ${needed:.2}, have ${available:.2}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    #[error("A flip is already in flight")]
    FlipInFlight,

    #[error("No flip is in flight")]
    NoFlipInFlight,

    #[error("Auto-flip is not unlocked")]
    AutoFlipLocked,

    #[error("Unknown upgrade: {0}")]
    UnknownUpgrade(String),

    #[error("Upgrade already owned: {0}")]
    AlreadyOwned(String),

    #[error("Loan amount must be positive: ${0:.2}")]
    InvalidLoanAmount(Decimal),

    #[error("Too many open loans (limit {0})")]
    TooManyLoans(usize),

    #[error("Loan not found: {0}")]
    LoanNotFound(u64),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
