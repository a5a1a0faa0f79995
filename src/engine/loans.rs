//! Loans — open, pay off, per-flip interest and the expiry sweep.

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::{EconomyConfig, LoanConfig};
use crate::engine::accountant::Accountant;
use crate::engine::session::SessionState;
use crate::types::{round2, Loan, Rejection};

/// Open a loan and credit its principal to the balance.
///
/// Rejected for a non-positive amount (after rounding to cents) or when
/// the configured open-loan cap is reached.
pub fn open_loan(
    state: &SessionState,
    rules: &EconomyConfig,
    amount: Decimal,
) -> Result<SessionState, Rejection> {
    let principal = round2(amount);
    if principal <= Decimal::ZERO {
        return Err(Rejection::InvalidLoanAmount(amount));
    }
    if let Some(max) = rules.loans.max_open_loans {
        if state.loans.len() >= max {
            return Err(Rejection::TooManyLoans(max));
        }
    }

    let mut next = state.clone();
    let loan = Loan {
        id: next.next_loan_id,
        principal,
        amount: principal,
        opened_at_flip: next.flip_index,
    };
    next.next_loan_id += 1;
    next.balance = round2(next.balance + principal);
    Accountant::record_loan_opened(&mut next.stats, next.balance);

    info!(
        loan = loan.id,
        principal = format!("${:.2}", principal),
        flip = loan.opened_at_flip,
        balance = format!("${:.2}", next.balance),
        "Loan opened"
    );
    next.loans.push(loan);
    Ok(next)
}

/// Repay a loan in full at its current (compounded) amount.
pub fn pay_off_loan(state: &SessionState, loan_id: u64) -> Result<SessionState, Rejection> {
    let loan = state.loan(loan_id).ok_or(Rejection::LoanNotFound(loan_id))?;
    if state.spendable() < loan.amount {
        return Err(Rejection::InsufficientBalance {
            needed: loan.amount,
            available: state.spendable(),
        });
    }

    let mut next = state.clone();
    next.balance = round2(next.balance - loan.amount);
    next.loans.retain(|l| l.id != loan_id);
    Accountant::record_loan_repaid(&mut next.stats);

    info!(
        loan = loan_id,
        paid = format!("${:.2}", loan.amount),
        interest = format!("${:.2}", loan.interest()),
        balance = format!("${:.2}", next.balance),
        "Loan repaid"
    );
    Ok(next)
}

/// Compound every open loan once, rounding each to cents.
/// Returns the total interest added.
pub fn accrue_interest(loans: &mut [Loan], rules: &LoanConfig) -> Decimal {
    let factor = Decimal::ONE + rules.interest_per_flip;
    let mut added = Decimal::ZERO;
    for loan in loans.iter_mut() {
        let before = loan.amount;
        loan.amount = round2(loan.amount * factor);
        added += loan.amount - before;
        debug!(loan = loan.id, owed = %loan.amount, "Interest accrued");
    }
    added
}

/// Whether any loan has reached its term at `flip_index`.
pub fn any_expired(loans: &[Loan], flip_index: u64, rules: &LoanConfig) -> bool {
    loans.iter().any(|l| l.age(flip_index) >= rules.term_flips)
}

/// Expiry sweep. Once any loan reaches its term, every loan is written
/// off and the balance is seized (set to exactly zero). Returns the ids
/// removed; empty when nothing expired.
pub fn sweep_expired(
    balance: &mut Decimal,
    loans: &mut Vec<Loan>,
    flip_index: u64,
    rules: &LoanConfig,
) -> Vec<u64> {
    if !any_expired(loans, flip_index, rules) {
        return Vec::new();
    }
    let removed: Vec<u64> = loans.iter().map(|l| l.id).collect();
    warn!(
        flip = flip_index,
        loans = ?removed,
        seized = format!("${:.2}", balance),
        "Loan expired: all loans cleared and balance reset to zero"
    );
    loans.clear();
    *balance = Decimal::ZERO;
    removed
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
