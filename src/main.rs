//! COINFLIP — heads-or-tails session economy
//!
//! Entry point. Loads configuration, initialises structured logging and
//! either runs the interactive `play` loop (restoring the session from disk)
//! or a batch `simulate` run over the same engine.

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use coinflip::backtest::runner::{SimulationConfig, Simulator, StakePolicy};
use coinflip::config::{self, AppConfig};
use coinflip::engine::coin::RandomCoin;
use coinflip::engine::game::Game;
use coinflip::engine::scheduler::TickOutcome;
use coinflip::storage;
use coinflip::types::{Rejection, Side};

const BANNER: &str = r#"
  ____ ___ ___ _   _ _____ _     ___ ____
 / ___/ _ \_ _| \ | |  ___| |   |_ _|  _ \
| |  | | | | ||  \| | |_  | |    | || |_) |
| |__| |_| | || |\  |  _| | |___ | ||  __/
 \____\___/___|_| \_|_|   |_____|___|_|

  Heads or tails. The house always taxes.
"#;

const HELP: &str = "\
commands:
  bet <heads|tails> [stake]   choose a side (and stake)
  flip                        flip the coin with the current bet
  shop                        list upgrades
  buy <id>                    buy an upgrade
  loan <amount>               borrow money (5% interest per flip, 10 flips to repay)
  payoff <id>                 repay a loan in full
  status                      balance, loans and stats
  save                        write the session to disk
  help                        this message
  quit                        save and exit";

#[derive(Parser, Debug)]
#[command(author, version, about = "Heads-or-tails session economy")]
struct Cli {
    /// Config file (falls back to COINFLIP_CONFIG, then config.toml).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play interactively.
    Play {
        /// Session file to resume from and save to.
        #[arg(long)]
        state: Option<String>,

        #[arg(long)]
        seed: Option<u64>,

        /// Start over, discarding any saved session.
        #[arg(long)]
        fresh: bool,
    },
    /// Run a batch of flips with a fixed policy and print the report.
    Simulate {
        #[arg(long, default_value = "1000")]
        flips: u64,

        #[arg(long, default_value = "heads")]
        side: Side,

        /// Flat stake per flip.
        #[arg(long, default_value = "1")]
        stake: Decimal,

        /// Stake this fraction of the balance instead of a flat amount.
        #[arg(long)]
        fraction: Option<Decimal>,

        #[arg(long)]
        seed: Option<u64>,

        /// Upgrade to buy as soon as it is affordable (repeatable).
        #[arg(long = "buy")]
        buy: Vec<String>,

        /// Print the balance after every flip.
        #[arg(long)]
        history: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .or_else(|| std::env::var("COINFLIP_CONFIG").ok())
        .unwrap_or_else(|| config::DEFAULT_CONFIG_FILE.to_string());
    let cfg = AppConfig::load_or_default(&config_path)?;

    init_logging();

    match cli.command {
        Some(Command::Simulate { flips, side, stake, fraction, seed, buy, history }) => {
            let policy = match fraction {
                Some(f) => StakePolicy::Fraction(f),
                None => StakePolicy::Flat(stake),
            };
            simulate(&cfg, flips, side, policy, seed, buy, history);
            Ok(())
        }
        Some(Command::Play { state, seed, fresh }) => play(cfg, state, seed, fresh).await,
        None => play(cfg, None, None, false).await,
    }
}

fn simulate(
    cfg: &AppConfig,
    flips: u64,
    side: Side,
    stake: StakePolicy,
    seed: Option<u64>,
    buy: Vec<String>,
    history: bool,
) {
    let seed = seed.or(cfg.session.seed);
    info!(flips, side = %side, stake = ?stake, seed = ?seed, "Starting simulation");

    let sim = Simulator::new(
        cfg.economy.clone(),
        SimulationConfig {
            flips,
            side,
            stake,
            buy,
            ..SimulationConfig::default()
        },
    );
    let report = sim.run(Box::new(RandomCoin::new(seed)));

    if history {
        for (flip, balance) in &report.balance_history {
            println!("{flip:>6}  ${balance:.2}");
        }
        println!();
    }
    println!("{report}");
}

/// What the input loop should do after a command.
enum Action {
    Continue,
    StartReveal,
    Quit,
}

async fn play(cfg: AppConfig, state_file: Option<String>, seed: Option<u64>, fresh: bool) -> Result<()> {
    let state_path = state_file.unwrap_or_else(|| cfg.session.state_file.clone());
    let seed = seed.or(cfg.session.seed);
    let rules = cfg.economy.clone();
    let coin = Box::new(RandomCoin::new(seed));

    if fresh {
        storage::delete_state(Some(&state_path))?;
    }

    // -- Restore or create the session ------------------------------------

    let mut game = match storage::load_state(Some(&state_path))? {
        Some(state) => {
            if let Err(problem) = state.check_invariants(&rules) {
                warn!(path = %state_path, problem = %problem, "Saved session looks inconsistent");
            }
            info!(balance = %state.balance, flips = state.flip_index, "Resumed saved session");
            Game::resume(state, rules, coin)
        }
        None => {
            let game = Game::new(rules, coin);
            info!(balance = %game.state().balance, "Fresh session");
            game
        }
    };

    println!("{BANNER}");
    info!(name = %cfg.session.name, session = %game.state().session_id, "COINFLIP starting up");
    println!("{}", game.state());
    println!("type `help` for commands\n");

    // -- Main loop ---------------------------------------------------------

    let period = Duration::from_secs(game.rules().auto_flip.interval_secs.max(1));
    let mut auto = tokio::time::interval_at(Instant::now() + period, period);
    auto.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let reveal_delay = Duration::from_millis(cfg.session.flip_delay_ms);
    let mut reveal_at: Option<Instant> = None;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = %e, "Failed to read input");
                        break;
                    }
                };
                match handle_command(&mut game, line.trim(), &state_path) {
                    Action::Continue => {}
                    Action::StartReveal => reveal_at = Some(Instant::now() + reveal_delay),
                    Action::Quit => break,
                }
            }
            _ = tokio::time::sleep_until(reveal_at.unwrap_or_else(Instant::now)), if reveal_at.is_some() => {
                reveal_at = None;
                reveal(&mut game);
            }
            _ = auto.tick() => {
                match game.tick(Utc::now()) {
                    TickOutcome::Flipped(outcome) => println!("[auto] {outcome}"),
                    TickOutcome::Skipped(reason) => debug!(reason = %reason, "Auto-flip skipped"),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    // A pending flip is revealed immediately so the snapshot can be saved.
    if game.state().is_flipping() {
        reveal(&mut game);
    }

    storage::save_state(game.state(), Some(&state_path))?;
    let state = game.state();
    info!(
        balance = format!("${:.2}", state.balance),
        flips = state.flip_index,
        debt = format!("${:.2}", state.total_debt()),
        "COINFLIP shut down cleanly."
    );
    println!("{}", state.stats);
    Ok(())
}

fn reveal(game: &mut Game) {
    match game.finish_flip(Utc::now()) {
        Ok(outcome) => println!("{outcome}"),
        Err(e) => warn!(reason = %e, "Reveal failed"),
    }
}

fn reject(command: &str, reason: Rejection) {
    warn!(command, reason = %reason, "Command rejected");
    println!("✗ {reason}");
}

fn handle_command(game: &mut Game, line: &str, state_path: &str) -> Action {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Action::Continue;
    };
    let arg = parts.next();

    match command {
        "bet" => {
            let Some(side) = arg.and_then(|s| s.parse::<Side>().ok()) else {
                println!("usage: bet <heads|tails> [stake]");
                return Action::Continue;
            };
            let stake = match parts.next().map(str::parse::<Decimal>) {
                Some(Ok(stake)) => stake,
                Some(Err(_)) => {
                    println!("stake must be a number");
                    return Action::Continue;
                }
                None => game.state().pending_bet.stake,
            };
            match game.select_bet(Some(side), stake) {
                Ok(()) => println!("betting ${:.2} on {side}", game.state().pending_bet.stake),
                Err(e) => reject(command, e),
            }
        }
        "flip" => match game.start_flip() {
            Ok(wager) => {
                println!("flipping... ({wager})");
                return Action::StartReveal;
            }
            Err(e) => reject(command, e),
        },
        "shop" => {
            for entry in game.shop() {
                println!("{entry}");
            }
        }
        "buy" => {
            let Some(id) = arg else {
                println!("usage: buy <id>");
                return Action::Continue;
            };
            match game.buy_upgrade(id) {
                Ok(()) => println!("bought {id} | {}", game.state()),
                Err(e) => reject(command, e),
            }
        }
        "loan" => {
            let Some(Ok(amount)) = arg.map(str::parse::<Decimal>) else {
                println!("usage: loan <amount>");
                return Action::Continue;
            };
            match game.open_loan(amount) {
                Ok(id) => println!(
                    "loan {id} opened | balance ${:.2} | repay within {} flips",
                    game.state().balance,
                    game.rules().loans.term_flips,
                ),
                Err(e) => reject(command, e),
            }
        }
        "payoff" => {
            let Some(Ok(id)) = arg.map(str::parse::<u64>) else {
                println!("usage: payoff <id>");
                return Action::Continue;
            };
            match game.pay_off_loan(id) {
                Ok(()) => println!("loan {id} repaid | balance ${:.2}", game.state().balance),
                Err(e) => reject(command, e),
            }
        }
        "status" => print_status(game),
        "save" => match storage::save_state(game.state(), Some(state_path)) {
            Ok(()) => println!("saved to {state_path}"),
            Err(e) => {
                warn!(error = %e, "Save failed");
                println!("✗ {e}");
            }
        },
        "help" => println!("{HELP}"),
        "quit" | "exit" => return Action::Quit,
        other => println!("unknown command `{other}` (try `help`)"),
    }
    Action::Continue
}

fn print_status(game: &Game) {
    let state = game.state();
    let now = Utc::now();
    println!("{state}");
    match state.pending_bet.side {
        Some(side) => println!("bet: ${:.2} on {side}", state.pending_bet.stake),
        None => println!("bet: no side selected"),
    }
    if state.golden_active(now) {
        println!("golden coin: {}s left", state.golden_remaining(now).num_seconds());
    }
    let term = game.rules().loans.term_flips;
    for loan in &state.loans {
        let left = term.saturating_sub(loan.age(state.flip_index));
        println!("  {loan} | {left} flips left");
    }
    println!("{}", state.stats);
}

/// Initialise the tracing subscriber with env-filter and optional JSON output.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("coinflip=info"));

    let json_logging = std::env::var("COINFLIP_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
