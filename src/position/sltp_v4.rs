//! SL/TP Manager v4 (liquidity-aware)
//! Grounded on `execution/sl_tp_manager_v4.py`: TP selection pulls from
//! the liquidity map instead of fixed R-multiples, runner mode invests
//! a leftover leg once TP1 is cleared, and trailing jumps between
//! liquidity levels rather than ticking continuously.

use crate::liquidity::{strength, LiquidityMap};
use crate::models::{LiquidityZone, Side};

const MIN_TP_STRENGTH: f64 = 0.55;
const RUNNER_TREND_SCORE_MIN: f64 = 0.65;
const RUNNER_AVG_STRENGTH_MAX: f64 = 0.60;
const MIN_RUNNER_CONFIDENCE: f64 = 0.65;

#[derive(Debug, Clone, Copy)]
pub struct LiquidityTpSetup {
    pub tp1: f64,
    pub tp2: Option<f64>,
    pub allow_runner: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrailingState {
    pub active: bool,
    pub last_level_stop: f64,
    pub runner_activated: bool,
    pub highest_favorable_price: f64,
    pub updates_count: u32,
}

/// Picks TP1 as the first zone beyond entry with `strength >= 0.55`,
/// TP2 as the next zone only if the trend score clears 0.55, and
/// enables runner mode only outside chaotic regimes when the
/// remaining zones are thin on average and trend score is strong.
pub fn create_setup(
    map: &LiquidityMap,
    symbol: &str,
    side: Side,
    entry: f64,
    trend_score: f64,
    market_regime_is_chaotic: bool,
) -> Option<LiquidityTpSetup> {
    let candidates: Vec<&LiquidityZone> = match side {
        Side::Buy => map.zones_above(symbol, entry),
        Side::Sell => map.zones_below(symbol, entry),
    };

    let mut eligible = candidates.into_iter().filter(|z| strength(z) >= MIN_TP_STRENGTH);
    let tp1_zone = eligible.next()?;
    let tp2_zone = if trend_score > 0.55 { eligible.next() } else { None };

    let remaining: Vec<&&LiquidityZone> = if tp2_zone.is_some() { eligible.by_ref().collect() } else { Vec::new() };
    let avg_remaining_strength = if remaining.is_empty() {
        0.0
    } else {
        remaining.iter().map(|z| strength(z)).sum::<f64>() / remaining.len() as f64
    };

    let allow_runner = !market_regime_is_chaotic
        && avg_remaining_strength < RUNNER_AVG_STRENGTH_MAX
        && trend_score >= RUNNER_TREND_SCORE_MIN;

    Some(LiquidityTpSetup { tp1: tp1_zone.price_center, tp2: tp2_zone.map(|z| z.price_center), allow_runner })
}

pub struct SlTpManagerV4 {
    min_rr: f64,
    min_tp_strength: f64,
    min_runner_confidence: f64,
    states: std::collections::HashMap<u64, TrailingState>,
}

impl Default for SlTpManagerV4 {
    fn default() -> Self {
        Self { min_rr: 1.5, min_tp_strength: MIN_TP_STRENGTH, min_runner_confidence: MIN_RUNNER_CONFIDENCE, states: Default::default() }
    }
}

impl SlTpManagerV4 {
    pub fn new(min_rr: f64, min_tp_strength: f64, min_runner_confidence: f64) -> Self {
        Self { min_rr, min_tp_strength, min_runner_confidence, states: Default::default() }
    }

    pub fn min_rr(&self) -> f64 {
        self.min_rr
    }

    pub fn min_tp_strength(&self) -> f64 {
        self.min_tp_strength
    }

    /// No-op unless runner mode is enabled for this ticket. Activates
    /// the runner leg once price clears TP1, then jumps the stop to
    /// successive liquidity levels rather than continuously trailing.
    pub fn update_trailing(
        &mut self,
        ticket: u64,
        setup: &LiquidityTpSetup,
        side: Side,
        current_price: f64,
        liquidity_levels_below_price: &[f64],
        confidence: f64,
    ) {
        if !setup.allow_runner || confidence < self.min_runner_confidence {
            return;
        }
        let state = self.states.entry(ticket).or_insert_with(|| TrailingState {
            active: true,
            last_level_stop: 0.0,
            runner_activated: false,
            highest_favorable_price: current_price,
            updates_count: 0,
        });

        let crossed_tp1 = match side {
            Side::Buy => current_price >= setup.tp1,
            Side::Sell => current_price <= setup.tp1,
        };
        if !crossed_tp1 {
            return;
        }
        state.runner_activated = true;

        let improved = match side {
            Side::Buy => current_price > state.highest_favorable_price,
            Side::Sell => current_price < state.highest_favorable_price,
        };
        if !improved {
            return;
        }
        state.highest_favorable_price = current_price;

        // Jump the stop to the nearest already-cleared liquidity level
        // behind price, never past the previous stop.
        if let Some(&candidate) = liquidity_levels_below_price.iter().max_by(|a, b| a.partial_cmp(b).unwrap()) {
            let improves = match side {
                Side::Buy => candidate > state.last_level_stop,
                Side::Sell => state.last_level_stop == 0.0 || candidate < state.last_level_stop,
            };
            if improves {
                state.last_level_stop = candidate;
                state.updates_count += 1;
            }
        }
    }

    pub fn state(&self, ticket: u64) -> Option<&TrailingState> {
        self.states.get(&ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LiquiditySource, LiquidityZone};
    use chrono::Utc;

    fn zone(center: f64, prob_hold: f64) -> LiquidityZone {
        LiquidityZone {
            symbol: "EURUSD".into(),
            source: LiquiditySource::PivotM15,
            price_center: center,
            price_range: 0.1,
            touch_count: 0,
            hold_count: 0,
            break_count: 0,
            sweep_count: 0,
            strength: 0.0,
            prob_hold,
            prob_break: 1.0 - prob_hold,
            last_tested: Some(Utc::now()),
        }
    }

    #[test]
    fn picks_first_strong_zone_as_tp1() {
        let mut map = LiquidityMap::new();
        map.upsert(zone(105.0, 0.3)); // too weak
        map.upsert(zone(110.0, 0.9)); // strong enough
        let setup = create_setup(&map, "EURUSD", Side::Buy, 100.0, 0.7, false).unwrap();
        assert_eq!(setup.tp1, 110.0);
    }

    #[test]
    fn no_eligible_zone_returns_none() {
        let mut map = LiquidityMap::new();
        map.upsert(zone(105.0, 0.1));
        assert!(create_setup(&map, "EURUSD", Side::Buy, 100.0, 0.7, false).is_none());
    }

    #[test]
    fn chaotic_regime_disables_runner() {
        let mut map = LiquidityMap::new();
        map.upsert(zone(110.0, 0.95));
        let setup = create_setup(&map, "EURUSD", Side::Buy, 100.0, 0.9, true).unwrap();
        assert!(!setup.allow_runner);
    }
}
