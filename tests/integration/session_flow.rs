//! Full session flows: bets, loans, upgrades, auto-flip and persistence.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use coinflip::config::EconomyConfig;
use coinflip::engine::coin::ScriptedCoin;
use coinflip::engine::game::Game;
use coinflip::engine::scheduler::{SkipReason, TickOutcome};
use coinflip::engine::session::init_session;
use coinflip::storage;
use coinflip::types::{Rejection, Side};

fn game_with_balance(balance: Decimal, coin: ScriptedCoin) -> Game {
    let rules = EconomyConfig::default();
    let mut state = init_session(&rules);
    state.balance = balance;
    Game::resume(state, rules, Box::new(coin))
}

#[test]
fn test_forced_heads_win() {
    let mut game = Game::new(EconomyConfig::default(), Box::new(ScriptedCoin::heads()));
    game.select_bet(Some(Side::Heads), dec!(10)).unwrap();

    let outcome = game.flip(Utc::now()).unwrap();
    assert!(outcome.won);
    assert_eq!(outcome.payout, dec!(9));
    assert_eq!(game.state().balance, dec!(34));
    assert_eq!(game.state().flip_index, 1);
}

#[test]
fn test_insufficient_balance_is_a_no_op() {
    let mut game = Game::new(EconomyConfig::default(), Box::new(ScriptedCoin::heads()));
    game.select_bet(Some(Side::Heads), dec!(25.01)).unwrap();
    let before = game.state().clone();

    assert_eq!(
        game.flip(Utc::now()),
        Err(Rejection::InsufficientBalance { needed: dec!(25.01), available: dec!(25) })
    );
    assert_eq!(game.state(), &before);
}

#[test]
fn test_loan_expires_after_ten_flips() {
    let mut game = Game::new(EconomyConfig::default(), Box::new(ScriptedCoin::tails()));
    let id = game.open_loan(dec!(50)).unwrap();
    assert_eq!(game.state().balance, dec!(75));
    game.select_bet(Some(Side::Heads), dec!(1)).unwrap();

    for _ in 0..9 {
        let outcome = game.flip(Utc::now()).unwrap();
        assert!(!outcome.penalty_applied);
        assert!(game.state().check_invariants(game.rules()).is_ok());
    }
    assert_eq!(game.state().balance, dec!(66));
    assert!(game.state().loan(id).is_some());

    let outcome = game.flip(Utc::now()).unwrap();
    assert!(outcome.penalty_applied);
    assert_eq!(outcome.expired_loans, vec![id]);
    assert_eq!(game.state().balance, Decimal::ZERO);
    assert!(game.state().loans.is_empty());
    assert_eq!(game.state().stats.loans_expired, 1);
}

#[test]
fn test_loan_interest_then_repay() {
    let mut game = Game::new(EconomyConfig::default(), Box::new(ScriptedCoin::heads()));
    let id = game.open_loan(dec!(100)).unwrap();
    game.select_bet(Some(Side::Heads), dec!(10)).unwrap();

    for _ in 0..3 {
        game.flip(Utc::now()).unwrap();
    }
    // 100 -> 105 -> 110.25 -> 115.7625, rounded each step
    assert_eq!(game.state().loan(id).unwrap().amount, dec!(115.76));
    assert_eq!(game.state().balance, dec!(152));

    game.pay_off_loan(id).unwrap();
    assert_eq!(game.state().balance, dec!(36.24));
    assert!(game.state().loans.is_empty());
    assert_eq!(game.pay_off_loan(id), Err(Rejection::LoanNotFound(id)));
}

#[test]
fn test_luck_boost_is_one_time() {
    let mut game = game_with_balance(dec!(1200), ScriptedCoin::heads());
    game.buy_upgrade("luck-boost").unwrap();
    assert_eq!(game.state().win_chance, dec!(0.55));
    assert_eq!(game.state().balance, dec!(700));

    assert_eq!(
        game.buy_upgrade("luck-boost"),
        Err(Rejection::AlreadyOwned("luck-boost".into()))
    );
    assert_eq!(game.state().win_chance, dec!(0.55));
    assert_eq!(game.state().balance, dec!(700));
}

#[test]
fn test_temu_accountant_unlocks_auto_flip() {
    let mut game = game_with_balance(dec!(250), ScriptedCoin::heads());
    assert_eq!(game.tick(Utc::now()), TickOutcome::Skipped(SkipReason::AutoFlipLocked));

    game.buy_upgrade("temu-accountant").unwrap();
    assert!(game.state().auto_flip_enabled);
    assert_eq!(game.state().balance, dec!(50));
    assert_eq!(game.tick(Utc::now()), TickOutcome::Skipped(SkipReason::NoBetSelected));

    game.select_bet(Some(Side::Heads), dec!(1)).unwrap();
    match game.tick(Utc::now()) {
        TickOutcome::Flipped(outcome) => {
            assert_eq!(outcome.stake, dec!(10));
            assert_eq!(outcome.payout, dec!(9));
        }
        other => panic!("expected an auto flip, got {other:?}"),
    }
    assert_eq!(game.state().balance, dec!(59));

    // Repeat purchases get more expensive
    assert_eq!(
        game.buy_upgrade("temu-accountant"),
        Err(Rejection::InsufficientBalance { needed: dec!(240), available: dec!(59) })
    );
}

#[test]
fn test_golden_coin_window() {
    let mut game = game_with_balance(dec!(2000), ScriptedCoin::heads());
    game.buy_upgrade("golden-coin").unwrap();
    game.select_bet(Some(Side::Heads), dec!(10)).unwrap();
    let t0 = Utc::now();

    let first = game.flip(t0).unwrap();
    assert!(!first.golden_applied);
    assert_eq!(first.payout, dec!(9));

    let second = game.flip(t0 + Duration::seconds(10)).unwrap();
    assert!(second.golden_applied);
    assert_eq!(second.payout, dec!(18));

    // Window restarted at t0+10, so it closes at t0+40
    let third = game.flip(t0 + Duration::seconds(41)).unwrap();
    assert!(!third.golden_applied);
    assert_eq!(third.payout, dec!(9));
    assert_eq!(game.state().balance, dec!(536));
}

#[test]
fn test_two_phase_flip_and_resume_from_disk() {
    let mut path = std::env::temp_dir();
    path.push(format!("coinflip_it_{}.json", uuid::Uuid::new_v4()));
    let path = path.to_string_lossy().to_string();

    let mut game = Game::new(EconomyConfig::default(), Box::new(ScriptedCoin::tails()));
    game.select_bet(Some(Side::Tails), dec!(5)).unwrap();
    game.open_loan(dec!(20)).unwrap();
    game.start_flip().unwrap();

    assert!(storage::save_state(game.state(), Some(&path)).is_err());
    let outcome = game.finish_flip(Utc::now()).unwrap();
    assert!(outcome.won);
    storage::save_state(game.state(), Some(&path)).unwrap();

    let saved = storage::load_state(Some(&path)).unwrap().unwrap();
    assert_eq!(saved.session_id, game.state().session_id);
    assert_eq!(saved.balance, dec!(49.5));
    assert_eq!(saved.loans, game.state().loans);

    let mut resumed = Game::resume(saved, EconomyConfig::default(), Box::new(ScriptedCoin::tails()));
    resumed.flip(Utc::now()).unwrap();
    assert_eq!(resumed.state().flip_index, 2);
    assert_eq!(resumed.state().loans[0].amount, dec!(22.05));
    assert_eq!(resumed.state().balance, dec!(54));

    storage::delete_state(Some(&path)).unwrap();
}
