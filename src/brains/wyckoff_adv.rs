//! Wyckoff Advanced Brain
//! Grounded on `brains/wyckoff_adv.py`: spring/upthrust/range-extreme
//! detection over the last 50 candles with a touch-count-penalized
//! confidence.

use crate::brains::{Brain, CandleWindow};
use crate::models::{BrainAction, BrainSignal, Context, Regime};
use std::collections::HashMap;

const LOOKBACK: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Setup {
    Spring,
    Upthrust,
    RangeExtreme,
}

pub struct WyckoffAdvancedBrain;

impl Default for WyckoffAdvancedBrain {
    fn default() -> Self {
        Self
    }
}

impl Brain for WyckoffAdvancedBrain {
    fn id(&self) -> &'static str {
        "wyckoff_adv"
    }

    fn name(&self) -> &'static str {
        "Wyckoff Advanced"
    }

    fn detect(&self, window: CandleWindow, ctx: &Context) -> Option<BrainSignal> {
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

        let touch_high = slice.iter().filter(|c| c.high >= range_high * 0.999).count() as u32;
        let touch_low = slice.iter().filter(|c| c.low <= range_low * 1.001).count() as u32;

        let setup = if last.low < range_low && last.close > range_low {
            Some(Setup::Spring)
        } else if last.high > range_high && last.close < range_high {
            Some(Setup::Upthrust)
        } else if touch_high >= 2 && touch_low >= 2 {
            Some(Setup::RangeExtreme)
        } else {
            None
        }?;

        let compression = {
            let recent = &slice[slice.len() - 10.min(slice.len())..];
            let recent_high = recent.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let recent_low = recent.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            recent_high - recent_low
        };

        let base_confidence = if compression < range_size * 0.6 { 0.6 } else { 0.45 };
        let touch_count = touch_high.max(touch_low);
        let mut confidence = (base_confidence - (touch_count.saturating_sub(2) as f64) * 0.1).max(0.2);
        if ctx.regime == Regime::Range {
            confidence += 0.1;
        }

        let (action, entry, sl, tp1, tp2, reason) = match setup {
            Setup::Spring => (
                BrainAction::Buy,
                last.close,
                range_low - range_size * 0.05,
                range_low + range_size * 0.5,
                range_high,
                "spring: false breakdown reclaimed",
            ),
            Setup::Upthrust => (
                BrainAction::Sell,
                last.close,
                range_high + range_size * 0.05,
                range_high - range_size * 0.5,
                range_low,
                "upthrust: false breakout rejected",
            ),
            Setup::RangeExtreme => (
                if last.close > (range_high + range_low) / 2.0 { BrainAction::Sell } else { BrainAction::Buy },
                last.close,
                if last.close > (range_high + range_low) / 2.0 { range_high } else { range_low },
                (range_high + range_low) / 2.0,
                if last.close > (range_high + range_low) / 2.0 { range_low } else { range_high },
                "range extreme with repeated tests",
            ),
        };

        let mut metadata = HashMap::new();
        metadata.insert("confidence".to_string(), crate::models::FeatureValue::Number(confidence));

        Some(BrainSignal {
            brain_id: self.id().to_string(),
            action,
            entry,
            sl,
            tp1,
            tp2,
            reasons: vec![reason.to_string()],
            metadata,
        })
    }

    fn score(&self, signal: &BrainSignal, _ctx: &Context) -> f32 {
        let confidence = signal
            .metadata
            .get("confidence")
            .and_then(|v| match v {
                crate::models::FeatureValue::Number(n) => Some(*n),
                _ => None,
            })
            .unwrap_or(0.5);
        (55.0 + confidence * 35.0) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, FeatureBundle};
    use chrono::Utc;

    fn flat(close: f64, low: f64, high: f64) -> Candle {
        Candle { time: Utc::now(), open: close, high, low, close, tick_volume: 10.0 }
    }

    #[test]
    fn detects_spring_when_low_breaks_then_recovers() {
        let brain = WyckoffAdvancedBrain::default();
        let mut window = vec![flat(100.0, 99.0, 101.0); 49];
        window.push(flat(99.5, 98.0, 99.6));
        let ctx = Context { symbol: "EURUSD".into(), timeframe: "M15".into(), features: FeatureBundle::new(), spread: 0.1, regime: crate::models::Regime::Range };
        let signal = brain.detect(&window, &ctx);
        assert!(signal.is_some());
        assert_eq!(signal.unwrap().action, BrainAction::Buy);
    }
}
