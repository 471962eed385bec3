//! SL/TP Manager (base)
//! Grounded on spec §4.11 plus the original's `sl_tp_manager_v4.py`
//! trailing-state shape: partial exits at fixed fractions, break-even
//! after TP1, and a ratcheting ATR trail.

use crate::models::{Side, SlTpPlan, TpLevel};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SlTpConfig {
    pub use_partial_exits: bool,
    pub partial_fractions: (f64, f64, f64),
    pub use_break_even: bool,
    pub break_even_offset: f64,
    pub use_trailing: bool,
    pub trailing_distance: f64,
    pub trailing_atr_mult: f64,
}

impl Default for SlTpConfig {
    fn default() -> Self {
        Self {
            use_partial_exits: true,
            partial_fractions: (0.5, 0.3, 0.2),
            use_break_even: true,
            break_even_offset: 0.0,
            use_trailing: true,
            trailing_distance: 1.0,
            trailing_atr_mult: 1.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PartialCloseEvent {
    pub ticket: u64,
    pub level_index: u8,
    pub fraction: f64,
}

pub struct SlTpManager {
    config: SlTpConfig,
    plans: HashMap<u64, SlTpPlan>,
    sides: HashMap<u64, Side>,
}

impl SlTpManager {
    pub fn new(config: SlTpConfig) -> Self {
        Self { config, plans: HashMap::new(), sides: HashMap::new() }
    }

    pub fn plan(&self, ticket: u64) -> Option<&SlTpPlan> {
        self.plans.get(&ticket)
    }

    /// Installs a three-level plan when both take-profits are given
    /// and partial exits are enabled; otherwise a single full-size
    /// level at `tp1`.
    pub fn install(&mut self, ticket: u64, side: Side, entry: f64, sl: f64, tp1: f64, tp2: f64) {
        let levels = if self.config.use_partial_exits {
            let (f1, f2, f3) = self.config.partial_fractions;
            let tp3 = match side {
                Side::Buy => tp2 + (tp2 - tp1),
                Side::Sell => tp2 - (tp1 - tp2),
            };
            vec![
                TpLevel { level_index: 1, price: tp1, fraction_to_close: f1, closed: false },
                TpLevel { level_index: 2, price: tp2, fraction_to_close: f2, closed: false },
                TpLevel { level_index: 3, price: tp3, fraction_to_close: f3, closed: false },
            ]
        } else {
            vec![TpLevel { level_index: 1, price: tp1, fraction_to_close: 1.0, closed: false }]
        };

        self.plans.insert(
            ticket,
            SlTpPlan {
                ticket,
                levels,
                current_sl: sl,
                break_even_done: false,
                use_break_even: self.config.use_break_even,
                break_even_offset: self.config.break_even_offset,
                use_trailing: self.config.use_trailing,
                trailing_distance: self.config.trailing_distance,
                trailing_atr_mult: self.config.trailing_atr_mult,
                favorable_extreme: entry,
                entry_price: entry,
            },
        );
        self.sides.insert(ticket, side);
    }

    /// One tick's update for a single open ticket: crosses TP levels,
    /// applies break-even after TP1, and ratchets the trailing stop.
    /// Returns partial-close events for levels crossed this tick.
    pub fn update(&mut self, ticket: u64, current_price: f64, atr: f64) -> Vec<PartialCloseEvent> {
        let mut events = Vec::new();
        let Some(side) = self.sides.get(&ticket).copied() else { return events };
        let Some(plan) = self.plans.get_mut(&ticket) else { return events };

        for level in plan.levels.iter_mut() {
            if level.closed {
                continue;
            }
            let crossed = match side {
                Side::Buy => current_price >= level.price,
                Side::Sell => current_price <= level.price,
            };
            if crossed {
                level.closed = true;
                events.push(PartialCloseEvent { ticket, level_index: level.level_index, fraction: level.fraction_to_close });
            }
        }

        let tp1_hit = plan.levels.first().map(|l| l.closed).unwrap_or(false);
        if tp1_hit && plan.use_break_even && !plan.break_even_done {
            let entry_ref = plan.entry_price;
            plan.current_sl = match side {
                Side::Buy => entry_ref + plan.break_even_offset,
                Side::Sell => entry_ref - plan.break_even_offset,
            };
            plan.break_even_done = true;
        }

        if plan.use_trailing {
            let made_new_extreme = match side {
                Side::Buy => current_price > plan.favorable_extreme,
                Side::Sell => current_price < plan.favorable_extreme,
            };
            if made_new_extreme {
                plan.favorable_extreme = current_price;
                let trail_offset = plan.trailing_distance.max(atr * plan.trailing_atr_mult);
                let candidate_sl = match side {
                    Side::Buy => current_price - trail_offset,
                    Side::Sell => current_price + trail_offset,
                };
                let improves = match side {
                    Side::Buy => candidate_sl > plan.current_sl,
                    Side::Sell => candidate_sl < plan.current_sl,
                };
                if improves {
                    plan.current_sl = candidate_sl;
                }
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_with_partials_produces_three_levels_summing_to_one() {
        let mut manager = SlTpManager::new(SlTpConfig::default());
        manager.install(1, Side::Buy, 100.0, 99.0, 102.0, 104.0);
        let plan = manager.plan(1).unwrap();
        assert_eq!(plan.levels.len(), 3);
        assert!((plan.total_fraction() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tp1_cross_triggers_partial_close_and_break_even() {
        let mut manager = SlTpManager::new(SlTpConfig::default());
        manager.install(1, Side::Buy, 100.0, 99.0, 102.0, 104.0);
        let events = manager.update(1, 102.5, 0.5);
        assert_eq!(events.len(), 1);
        let plan = manager.plan(1).unwrap();
        assert!(plan.break_even_done);
    }

    #[test]
    fn trailing_stop_never_moves_unfavorably() {
        let mut manager = SlTpManager::new(SlTpConfig { trailing_distance: 1.0, ..SlTpConfig::default() });
        manager.install(1, Side::Buy, 100.0, 99.0, 110.0, 115.0);
        manager.update(1, 105.0, 0.5);
        let sl_after_first = manager.plan(1).unwrap().current_sl;
        manager.update(1, 103.0, 0.5);
        let sl_after_pullback = manager.plan(1).unwrap().current_sl;
        assert_eq!(sl_after_first, sl_after_pullback);
    }
}
