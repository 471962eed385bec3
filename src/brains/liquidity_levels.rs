//! Liquidity Levels Brain
//! Grounded on `brains/liquidity_levels.py`: VWAP, 50-period pivot, and
//! round-number candidate support/resistance levels. Always emits a
//! NEUTRAL signal carrying the candidate levels as metadata.

use crate::brains::{Brain, CandleWindow};
use crate::models::{BrainAction, BrainSignal, Context, FeatureValue};
use std::collections::HashMap;

const PIVOT_WINDOW: usize = 50;
const ROUND_STEP: f64 = 50.0;

pub struct LiquidityLevelsBrain;

impl Default for LiquidityLevelsBrain {
    fn default() -> Self {
        Self
    }
}

fn vwap(window: CandleWindow) -> Option<f64> {
    if window.is_empty() {
        return None;
    }
    let (pv, v): (f64, f64) = window.iter().fold((0.0, 0.0), |(pv, v), c| {
        let typical = (c.high + c.low + c.close) / 3.0;
        (pv + typical * c.tick_volume, v + c.tick_volume)
    });
    if v <= 0.0 {
        None
    } else {
        Some(pv / v)
    }
}

fn nearest_round(price: f64, step: f64) -> f64 {
    (price / step).round() * step
}

impl Brain for LiquidityLevelsBrain {
    fn id(&self) -> &'static str {
        "liquidity_levels"
    }

    fn name(&self) -> &'static str {
        "Liquidity Levels"
    }

    fn detect(&self, window: CandleWindow, _ctx: &Context) -> Option<BrainSignal> {
        if window.len() < PIVOT_WINDOW {
            return None;
        }
        let slice = &window[window.len() - PIVOT_WINDOW..];
        let pivot_high = slice.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let pivot_low = slice.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let last = window.last()?;
        let vw = vwap(slice).unwrap_or(last.close);
        let round_level = nearest_round(last.close, ROUND_STEP);

        let mut supports = vec![pivot_low];
        let mut resistances = vec![pivot_high];
        if vw < last.close {
            supports.push(vw);
        } else {
            resistances.push(vw);
        }
        if round_level < last.close {
            supports.push(round_level);
        } else {
            resistances.push(round_level);
        }

        let mut metadata = HashMap::new();
        metadata.insert(
            "nearest_supports".to_string(),
            FeatureValue::Text(supports.iter().map(|v| format!("{v:.5}")).collect::<Vec<_>>().join(",")),
        );
        metadata.insert(
            "nearest_resistances".to_string(),
            FeatureValue::Text(resistances.iter().map(|v| format!("{v:.5}")).collect::<Vec<_>>().join(",")),
        );

        Some(BrainSignal {
            brain_id: self.id().to_string(),
            action: BrainAction::Neutral,
            entry: last.close,
            sl: last.close,
            tp1: last.close,
            tp2: last.close,
            reasons: vec!["liquidity candidate levels computed".into()],
            metadata,
        })
    }

    fn score(&self, _signal: &BrainSignal, _ctx: &Context) -> f32 {
        50.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, FeatureBundle, Regime};
    use chrono::Utc;

    #[test]
    fn emits_metadata_with_support_and_resistance() {
        let brain = LiquidityLevelsBrain::default();
        let window: Vec<Candle> = (0..50)
            .map(|i| Candle { time: Utc::now(), open: 100.0, high: 100.0 + (i % 5) as f64, low: 99.0 - (i % 5) as f64, close: 100.0, tick_volume: 100.0 })
            .collect();
        let ctx = Context { symbol: "EURUSD".into(), timeframe: "M15".into(), features: FeatureBundle::new(), spread: 0.1, regime: Regime::Range };
        let signal = brain.detect(&window, &ctx).unwrap();
        assert!(signal.metadata.contains_key("nearest_supports"));
        assert!(signal.metadata.contains_key("nearest_resistances"));
    }
}
