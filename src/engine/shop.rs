//! Upgrade shop.
//!
//! Upgrades come in two flavours: one-time (owned at most once) and
//! repeatable (price grows by a fixed factor after each purchase).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::config::EconomyConfig;
use crate::engine::accountant::Accountant;
use crate::engine::session::SessionState;
use crate::types::{round2, Rejection};

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pricing {
    /// Exclusive: can be bought once, then the purchase is disabled.
    OneTime,
    /// Price is multiplied by `increment` after every purchase.
    Repeatable { increment: Decimal },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpgradeEffect {
    /// Unlock the auto-flip scheduler.
    AutoFlip,
    /// Raise the heads chance by `step`, up to the configured cap.
    LuckBoost { step: Decimal },
    /// Wins start (or restart) the golden payout window.
    GoldenCoin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeDef {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Price of the first purchase.
    pub cost: Decimal,
    pub pricing: Pricing,
    pub effect: UpgradeEffect,
}

impl UpgradeEffect {
    /// Whether buying the effect again changes anything.
    pub fn stacks(&self) -> bool {
        matches!(self, UpgradeEffect::LuckBoost { .. })
    }
}

impl UpgradeDef {
    pub fn is_repeatable(&self) -> bool {
        matches!(self.pricing, Pricing::Repeatable { .. })
    }
}

/// One row of the shop panel.
#[derive(Debug, Clone, PartialEq)]
pub struct ShopEntry {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub owned: bool,
    pub affordable: bool,
    pub times_bought: u32,
}

impl fmt::Display for ShopEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.owned {
            "Owned"
        } else if self.affordable {
            "Available"
        } else {
            "Too expensive"
        };
        write!(
            f,
            "{:<16} ${:>9.2}  {:<13} {} ({})",
            self.id, self.price, status, self.name, self.description,
        )
    }
}

// ---------------------------------------------------------------------------
// Pricing & purchase
// ---------------------------------------------------------------------------

/// Current price of an upgrade in this session.
pub fn current_price(state: &SessionState, def: &UpgradeDef) -> Decimal {
    state.prices.get(&def.id).copied().unwrap_or(def.cost)
}

/// The shop as the player currently sees it.
pub fn catalog_view(state: &SessionState, rules: &EconomyConfig) -> Vec<ShopEntry> {
    rules
        .upgrades
        .iter()
        .map(|def| {
            let price = current_price(state, def);
            let owned = !def.is_repeatable() && state.purchased_once.contains(&def.id);
            ShopEntry {
                id: def.id.clone(),
                name: def.name.clone(),
                description: def.description.clone(),
                price,
                owned,
                affordable: state.spendable() >= price,
                times_bought: state.purchase_counts.get(&def.id).copied().unwrap_or(0),
            }
        })
        .collect()
}

/// Buy an upgrade and apply its effect.
pub fn buy_upgrade(
    state: &SessionState,
    rules: &EconomyConfig,
    id: &str,
) -> Result<SessionState, Rejection> {
    let def = rules
        .upgrade(id)
        .ok_or_else(|| Rejection::UnknownUpgrade(id.to_string()))?;

    if !def.is_repeatable() && state.purchased_once.contains(id) {
        return Err(Rejection::AlreadyOwned(id.to_string()));
    }
    let price = current_price(state, def);
    if state.spendable() < price {
        return Err(Rejection::InsufficientBalance {
            needed: price,
            available: state.spendable(),
        });
    }

    let mut next = state.clone();
    next.balance = round2(next.balance - price);
    match &def.pricing {
        Pricing::OneTime => {
            next.purchased_once.insert(def.id.clone());
        }
        Pricing::Repeatable { increment } => {
            next.prices.insert(def.id.clone(), round2(price * *increment));
        }
    }
    *next.purchase_counts.entry(def.id.clone()).or_insert(0) += 1;
    apply_effect(&mut next, rules, &def.effect);
    Accountant::record_purchase(&mut next.stats, price);

    info!(
        upgrade = %def.id,
        price = format!("${:.2}", price),
        next_price = format!("${:.2}", current_price(&next, def)),
        balance = format!("${:.2}", next.balance),
        "Upgrade purchased"
    );
    Ok(next)
}

fn apply_effect(state: &mut SessionState, rules: &EconomyConfig, effect: &UpgradeEffect) {
    match effect {
        UpgradeEffect::AutoFlip => state.auto_flip_enabled = true,
        UpgradeEffect::LuckBoost { step } => {
            state.win_chance = (state.win_chance + *step).min(rules.max_win_chance);
        }
        UpgradeEffect::GoldenCoin => state.golden_owned = true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::init_session;
    use rust_decimal_macros::dec;

    fn rich_state(rules: &EconomyConfig, balance: Decimal) -> SessionState {
        let mut state = init_session(rules);
        state.balance = balance;
        state
    }

    #[test]
    fn test_only_luck_boost_stacks() {
        assert!(UpgradeEffect::LuckBoost { step: dec!(0.05) }.stacks());
        assert!(!UpgradeEffect::AutoFlip.stacks());
        assert!(!UpgradeEffect::GoldenCoin.stacks());
    }

    #[test]
    fn test_luck_boost_is_exclusive() {
        let rules = EconomyConfig::default();
        let state = rich_state(&rules, dec!(5000));

        let once = buy_upgrade(&state, &rules, "luck-boost").unwrap();
        assert_eq!(once.win_chance, dec!(0.55));
        assert_eq!(once.balance, dec!(4500));
        assert!(once.purchased_once.contains("luck-boost"));

        let twice = buy_upgrade(&once, &rules, "luck-boost");
        assert_eq!(twice, Err(Rejection::AlreadyOwned("luck-boost".into())));
        assert_eq!(once.win_chance, dec!(0.55));
    }

    #[test]
    fn test_repeatable_price_grows() {
        let rules = EconomyConfig::default();
        let state = rich_state(&rules, dec!(1000));
        let def = rules.upgrade("temu-accountant").unwrap();
        assert_eq!(current_price(&state, def), dec!(200));

        let s1 = buy_upgrade(&state, &rules, "temu-accountant").unwrap();
        assert!(s1.auto_flip_enabled);
        assert_eq!(s1.balance, dec!(800));
        assert_eq!(current_price(&s1, def), dec!(240));

        let s2 = buy_upgrade(&s1, &rules, "temu-accountant").unwrap();
        assert_eq!(s2.balance, dec!(560));
        assert_eq!(current_price(&s2, def), dec!(288));

        let s3 = buy_upgrade(&s2, &rules, "temu-accountant").unwrap();
        assert_eq!(s3.balance, dec!(272));
        // 288 * 1.2 = 345.6
        assert_eq!(current_price(&s3, def), dec!(345.60));
        assert_eq!(s3.purchase_counts["temu-accountant"], 3);
        assert!(!s3.purchased_once.contains("temu-accountant"));
    }

    #[test]
    fn test_repeatable_price_rounded_to_cents() {
        let mut rules = EconomyConfig::default();
        rules.upgrades[0].cost = dec!(9.99);
        let state = rich_state(&rules, dec!(100));
        let next = buy_upgrade(&state, &rules, "temu-accountant").unwrap();
        // 9.99 * 1.2 = 11.988 -> 11.99
        assert_eq!(next.prices["temu-accountant"], dec!(11.99));
    }

    #[test]
    fn test_insufficient_balance_rejected() {
        let rules = EconomyConfig::default();
        let state = init_session(&rules);
        let result = buy_upgrade(&state, &rules, "golden-coin");
        assert_eq!(
            result,
            Err(Rejection::InsufficientBalance { needed: dec!(1500), available: dec!(25) })
        );
    }

    #[test]
    fn test_unknown_upgrade_rejected() {
        let rules = EconomyConfig::default();
        let state = rich_state(&rules, dec!(5000));
        assert_eq!(
            buy_upgrade(&state, &rules, "time-machine"),
            Err(Rejection::UnknownUpgrade("time-machine".into()))
        );
    }

    #[test]
    fn test_golden_coin_marks_eligibility() {
        let rules = EconomyConfig::default();
        let state = rich_state(&rules, dec!(1500));
        let next = buy_upgrade(&state, &rules, "golden-coin").unwrap();
        assert!(next.golden_owned);
        assert_eq!(next.balance, Decimal::ZERO);
        assert!(next.golden_until.is_none());
    }

    #[test]
    fn test_win_chance_never_exceeds_cap() {
        let mut rules = EconomyConfig::default();
        rules.upgrades.push(UpgradeDef {
            id: "lucky-charm".into(),
            name: "Lucky Charm".into(),
            description: "Stackable luck.".into(),
            cost: dec!(1),
            pricing: Pricing::Repeatable { increment: dec!(1) },
            effect: UpgradeEffect::LuckBoost { step: dec!(0.05) },
        });
        let mut state = rich_state(&rules, dec!(100));
        for _ in 0..20 {
            state = buy_upgrade(&state, &rules, "lucky-charm").unwrap();
            assert!(state.win_chance <= dec!(0.95));
        }
        assert_eq!(state.win_chance, dec!(0.95));
        assert!(state.check_invariants(&rules).is_ok());
    }

    #[test]
    fn test_catalog_view() {
        let rules = EconomyConfig::default();
        let state = rich_state(&rules, dec!(600));
        let state = buy_upgrade(&state, &rules, "luck-boost").unwrap();

        let view = catalog_view(&state, &rules);
        assert_eq!(view.len(), 3);
        let accountant = &view[0];
        assert_eq!(accountant.price, dec!(200));
        assert!(!accountant.owned);
        assert!(!accountant.affordable);

        let luck = &view[1];
        assert!(luck.owned);
        assert_eq!(luck.times_bought, 1);

        assert!(view[2].to_string().contains("Too expensive"));
    }
}
