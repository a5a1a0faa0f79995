//! Core engine — the session economy state machine.
//!
//! Every operation takes the current `SessionState` by reference and
//! returns a new snapshot (or a `Rejection` with the old one untouched).

pub mod accountant;
pub mod coin;
pub mod flip;
pub mod game;
pub mod loans;
pub mod scheduler;
pub mod session;
pub mod shop;

pub use flip::resolve_flip;
pub use loans::{open_loan, pay_off_loan};
pub use scheduler::tick;
pub use session::{init_session, SessionState};
pub use shop::buy_upgrade;
