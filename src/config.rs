//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section has a default matching the reference economy, so a
//! partial file (or no file at all) still yields a playable session.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::engine::shop::{Pricing, UpgradeDef, UpgradeEffect};

/// Default config file path.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub economy: EconomyConfig,
}

/// Host-side settings (the CLI uses these; the engine never does).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub name: String,
    /// Reveal delay for a manual flip, matching the coin animation.
    pub flip_delay_ms: u64,
    /// Fixed RNG seed for reproducible sessions.
    pub seed: Option<u64>,
    pub state_file: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "COINFLIP".to_string(),
            flip_delay_ms: 800,
            seed: None,
            state_file: "coinflip_session.json".to_string(),
        }
    }
}

/// Every rule of the economy. Engine operations take this by reference.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EconomyConfig {
    pub starting_balance: Decimal,
    /// Probability the coin lands heads before any upgrade.
    pub base_win_chance: Decimal,
    pub max_win_chance: Decimal,
    /// Share of the stake paid out on a win (0.9 = 10% tax).
    pub payout_multiplier: Decimal,
    pub loans: LoanConfig,
    pub auto_flip: AutoFlipConfig,
    pub golden: GoldenConfig,
    pub upgrades: Vec<UpgradeDef>,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_balance: dec!(25),
            base_win_chance: dec!(0.5),
            max_win_chance: dec!(0.95),
            payout_multiplier: dec!(0.9),
            loans: LoanConfig::default(),
            auto_flip: AutoFlipConfig::default(),
            golden: GoldenConfig::default(),
            upgrades: default_upgrades(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoanConfig {
    /// Interest applied to every open loan per resolved flip.
    pub interest_per_flip: Decimal,
    /// Flips a loan may stay open before the expiry penalty.
    pub term_flips: u64,
    /// Cap on simultaneously open loans. `None` = unlimited.
    pub max_open_loans: Option<usize>,
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self {
            interest_per_flip: dec!(0.05),
            term_flips: 10,
            max_open_loans: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AutoFlipConfig {
    /// Stake substituted for every auto flip.
    pub stake: Decimal,
    pub interval_secs: u64,
}

impl Default for AutoFlipConfig {
    fn default() -> Self {
        Self {
            stake: dec!(10),
            interval_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GoldenConfig {
    pub payout_factor: Decimal,
    pub duration_secs: i64,
}

impl Default for GoldenConfig {
    fn default() -> Self {
        Self {
            payout_factor: dec!(2),
            duration_secs: 30,
        }
    }
}

/// The reference shop.
pub fn default_upgrades() -> Vec<UpgradeDef> {
    vec![
        UpgradeDef {
            id: "temu-accountant".to_string(),
            name: "Temu Accountant".to_string(),
            description: "Automatically gamble $10 once every 10s.".to_string(),
            cost: dec!(200),
            pricing: Pricing::Repeatable { increment: dec!(1.2) },
            effect: UpgradeEffect::AutoFlip,
        },
        UpgradeDef {
            id: "luck-boost".to_string(),
            name: "Luck Boost".to_string(),
            description: "Slightly increase win chance.".to_string(),
            cost: dec!(500),
            pricing: Pricing::OneTime,
            effect: UpgradeEffect::LuckBoost { step: dec!(0.05) },
        },
        UpgradeDef {
            id: "golden-coin".to_string(),
            name: "Golden Coin".to_string(),
            description: "Doubles coin value for 30s after a flip.".to_string(),
            cost: dec!(1500),
            pricing: Pricing::OneTime,
            effect: UpgradeEffect::GoldenCoin,
        },
    ]
}

impl EconomyConfig {
    /// Look up an upgrade definition by id.
    pub fn upgrade(&self, id: &str) -> Option<&UpgradeDef> {
        self.upgrades.iter().find(|u| u.id == id)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to the defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            info!(path, "No config file found, using default economy");
            return Ok(Self::default());
        }
        Self::load(path)
    }
}
