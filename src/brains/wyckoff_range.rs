//! Wyckoff Range Brain
//! Grounded on `brains/wyckoff_range.py`: rejection wicks at the
//! extremes of the last 30-candle range.

use crate::brains::{Brain, CandleWindow};
use crate::models::{BrainAction, BrainSignal, Context, Regime};
use std::collections::HashMap;

const LOOKBACK: usize = 30;
const WICK_RATIO_MAX: f64 = 0.30;

pub struct WyckoffRangeBrain;

impl Default for WyckoffRangeBrain {
    fn default() -> Self {
        Self
    }
}

impl Brain for WyckoffRangeBrain {
    fn id(&self) -> &'static str {
        "wyckoff_range"
    }

    fn name(&self) -> &'static str {
        "Wyckoff Range"
    }

    fn detect(&self, window: CandleWindow, _ctx: &Context) -> Option<BrainSignal> {
        if window.len() < LOOKBACK {
            return None;
        }
        let slice = &window[window.len() - LOOKBACK..];
        let range_high = slice.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let range_low = slice.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let range_size = range_high - range_low;
        if range_size <= 0.0 {
            return None;
        }
        let last = slice.last()?;
        let body = (last.close - last.open).abs();
        let lower_wick = last.open.min(last.close) - last.low;
        let upper_wick = last.high - last.open.max(last.close);

        let near_low = (last.low - range_low).abs() / range_size < 0.1;
        let near_high = (range_high - last.high).abs() / range_size < 0.1;

        if near_low && lower_wick > 0.0 && body / range_size < WICK_RATIO_MAX {
            let entry = last.close;
            let sl = range_low;
            return Some(BrainSignal {
                brain_id: self.id().to_string(),
                action: BrainAction::Buy,
                entry,
                sl,
                tp1: (range_high + range_low) / 2.0,
                tp2: range_high,
                reasons: vec!["rejection wick at range low".into()],
                metadata: HashMap::new(),
            });
        }

        if near_high && upper_wick > 0.0 && body / range_size < WICK_RATIO_MAX {
            let entry = last.close;
            let sl = range_high;
            return Some(BrainSignal {
                brain_id: self.id().to_string(),
                action: BrainAction::Sell,
                entry,
                sl,
                tp1: (range_high + range_low) / 2.0,
                tp2: range_low,
                reasons: vec!["rejection wick at range high".into()],
                metadata: HashMap::new(),
            });
        }

        None
    }

    fn score(&self, _signal: &BrainSignal, ctx: &Context) -> f32 {
        if ctx.regime == Regime::Range {
            80.0
        } else {
            60.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, FeatureBundle};
    use chrono::Utc;

    fn candle(open: f64, close: f64, low: f64, high: f64) -> Candle {
        Candle { time: Utc::now(), open, high, low, close, tick_volume: 50.0 }
    }

    #[test]
    fn detects_buy_on_rejection_at_range_low() {
        let brain = WyckoffRangeBrain::default();
        let mut window = vec![candle(100.0, 100.2, 99.8, 100.4); 29];
        // A long lower wick at the floor of the range, small body.
        window.push(candle(99.85, 99.9, 98.0, 99.95));
        let ctx = Context {
            symbol: "EURUSD".into(),
            timeframe: "M15".into(),
            features: FeatureBundle::new(),
            spread: 0.2,
            regime: Regime::Range,
        };
        let signal = brain.detect(&window, &ctx);
        assert!(signal.is_some());
        assert_eq!(signal.unwrap().action, BrainAction::Buy);
    }
}
