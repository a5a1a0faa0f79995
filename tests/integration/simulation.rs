//! Long-run simulation harness.
//!
//! Plays many flips through the simulator to check the economy holds its
//! invariants and that the house edge shows up over time.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

use coinflip::backtest::runner::{SimulationConfig, Simulator, StakePolicy};
use coinflip::config::EconomyConfig;
use coinflip::engine::coin::{RandomCoin, ScriptedCoin};
use coinflip::types::Side;

#[test]
fn test_house_edge_over_long_run() {
    let config = SimulationConfig {
        flips: 5000,
        side: Side::Heads,
        stake: StakePolicy::Flat(dec!(1)),
        ..SimulationConfig::default()
    };
    let mut rules = EconomyConfig::default();
    rules.starting_balance = dec!(100000);
    let report = Simulator::new(rules, config).run(Box::new(RandomCoin::new(Some(42))));

    assert_eq!(report.flips_played, 5000);
    assert!(report.busted_at.is_none());
    // Payouts are winnings only (0.9x the stake), so a fair coin
    // returns about 0.45 per unit wagered.
    let rtp = report.return_to_player.to_f64().unwrap();
    assert!(rtp > 0.40 && rtp < 0.50, "rtp {rtp}");
    assert!(report.final_balance < dec!(100000));
    assert!(report.win_rate > 0.45 && report.win_rate < 0.55);
}

#[test]
fn test_losing_streak_busts_default_session() {
    let config = SimulationConfig {
        flips: 50,
        side: Side::Tails,
        stake: StakePolicy::Flat(dec!(5)),
        ..SimulationConfig::default()
    };
    let report = Simulator::new(EconomyConfig::default(), config).run(Box::new(ScriptedCoin::heads()));

    assert_eq!(report.busted_at, Some(5));
    assert_eq!(report.final_balance, Decimal::ZERO);
    assert_eq!(report.losses, 5);
    assert_eq!(report.peak_balance, dec!(25));
}

#[test]
fn test_balance_history_matches_flips() {
    let config = SimulationConfig {
        flips: 40,
        stake: StakePolicy::Fraction(dec!(0.1)),
        ..SimulationConfig::default()
    };
    let report = Simulator::new(EconomyConfig::default(), config).run(Box::new(RandomCoin::new(Some(3))));

    assert_eq!(report.balance_history.len() as u64, report.flips_played + 1);
    assert_eq!(report.balance_history.last().unwrap().1, report.final_balance);
    assert!(report.balance_history.iter().all(|(_, b)| *b <= report.peak_balance));
    assert!(report.max_drawdown >= Decimal::ZERO);
}
