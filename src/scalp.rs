//! Scalp side-position manager
//! Grounded on the glossary's "Scalp" entry and `config.rs`'s
//! pre-existing `scalp_tp`/`scalp_sl`/`scalp_max_hold_minutes` fields:
//! a short-duration, fixed-distance side position independent of the
//! boss brain's own SL/TP plan, closed on whichever of take-profit,
//! stop-loss, or a hold-time timeout fires first.

use crate::models::Side;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ScalpConfig {
    pub tp_distance: f64,
    pub sl_distance: f64,
    pub max_hold_minutes: i64,
}

impl Default for ScalpConfig {
    fn default() -> Self {
        Self { tp_distance: 0.5, sl_distance: 0.3, max_hold_minutes: 15 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalpExit {
    TakeProfit,
    StopLoss,
    Timeout,
}

#[derive(Debug, Clone)]
struct ScalpTicket {
    side: Side,
    entry: f64,
    tp: f64,
    sl: f64,
    opened_at: DateTime<Utc>,
}

pub struct ScalpManager {
    config: ScalpConfig,
    tickets: HashMap<u64, ScalpTicket>,
}

impl ScalpManager {
    pub fn new(config: ScalpConfig) -> Self {
        Self { config, tickets: HashMap::new() }
    }

    pub fn open_scalp(&mut self, ticket: u64, side: Side, entry: f64, now: DateTime<Utc>) {
        let (tp, sl) = match side {
            Side::Buy => (entry + self.config.tp_distance, entry - self.config.sl_distance),
            Side::Sell => (entry - self.config.tp_distance, entry + self.config.sl_distance),
        };
        self.tickets.insert(ticket, ScalpTicket { side, entry, tp, sl, opened_at: now });
    }

    pub fn is_open(&self, ticket: u64) -> bool {
        self.tickets.contains_key(&ticket)
    }

    pub fn open_count(&self) -> usize {
        self.tickets.len()
    }

    /// Evaluates every open scalp ticket against the current price and
    /// clock, returning exits to apply. Closed tickets are dropped from
    /// tracking immediately.
    pub fn check_exits(&mut self, current_price: f64, now: DateTime<Utc>) -> Vec<(u64, ScalpExit)> {
        let mut exits = Vec::new();
        let max_hold = Duration::minutes(self.config.max_hold_minutes);

        for (&ticket, scalp) in self.tickets.iter() {
            let hit = match scalp.side {
                Side::Buy => {
                    if current_price >= scalp.tp {
                        Some(ScalpExit::TakeProfit)
                    } else if current_price <= scalp.sl {
                        Some(ScalpExit::StopLoss)
                    } else {
                        None
                    }
                }
                Side::Sell => {
                    if current_price <= scalp.tp {
                        Some(ScalpExit::TakeProfit)
                    } else if current_price >= scalp.sl {
                        Some(ScalpExit::StopLoss)
                    } else {
                        None
                    }
                }
            };
            let hit = hit.or_else(|| {
                if now - scalp.opened_at >= max_hold {
                    Some(ScalpExit::Timeout)
                } else {
                    None
                }
            });
            if let Some(exit) = hit {
                exits.push((ticket, exit));
            }
        }

        for (ticket, _) in &exits {
            self.tickets.remove(ticket);
        }
        exits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_scalp_hits_take_profit() {
        let mut manager = ScalpManager::new(ScalpConfig { tp_distance: 1.0, sl_distance: 1.0, max_hold_minutes: 15 });
        let now = Utc::now();
        manager.open_scalp(1, Side::Buy, 100.0, now);
        let exits = manager.check_exits(101.5, now);
        assert_eq!(exits, vec![(1, ScalpExit::TakeProfit)]);
        assert!(!manager.is_open(1));
    }

    #[test]
    fn sell_scalp_hits_stop_loss() {
        let mut manager = ScalpManager::new(ScalpConfig { tp_distance: 1.0, sl_distance: 1.0, max_hold_minutes: 15 });
        let now = Utc::now();
        manager.open_scalp(2, Side::Sell, 100.0, now);
        let exits = manager.check_exits(101.5, now);
        assert_eq!(exits, vec![(2, ScalpExit::StopLoss)]);
    }

    #[test]
    fn stale_scalp_times_out() {
        let mut manager = ScalpManager::new(ScalpConfig { tp_distance: 5.0, sl_distance: 5.0, max_hold_minutes: 10 });
        let now = Utc::now();
        manager.open_scalp(3, Side::Buy, 100.0, now);
        let exits = manager.check_exits(100.1, now + Duration::minutes(11));
        assert_eq!(exits, vec![(3, ScalpExit::Timeout)]);
    }

    #[test]
    fn untouched_scalp_stays_open() {
        let mut manager = ScalpManager::new(ScalpConfig::default());
        let now = Utc::now();
        manager.open_scalp(4, Side::Buy, 100.0, now);
        let exits = manager.check_exits(100.1, now);
        assert!(exits.is_empty());
        assert!(manager.is_open(4));
    }
}
