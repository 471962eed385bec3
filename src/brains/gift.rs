//! Gift Brain
//! Grounded on `brains/gift.py`: follow-through on a strong impulse
//! candle, invalidated by more than a 1/3 retracement on the next bar.

use crate::brains::{Brain, CandleWindow};
use crate::models::{BrainAction, BrainSignal, Context, Regime};
use std::collections::HashMap;

const STRONG_BODY_RATIO: f64 = 0.7;
const MAX_RETRACE: f64 = 1.0 / 3.0;

pub struct GiftBrain;

impl Default for GiftBrain {
    fn default() -> Self {
        Self
    }
}

impl Brain for GiftBrain {
    fn id(&self) -> &'static str {
        "gift"
    }

    fn name(&self) -> &'static str {
        "Gift"
    }

    fn detect(&self, window: CandleWindow, _ctx: &Context) -> Option<BrainSignal> {
        if window.len() < 2 {
            return None;
        }
        let impulse = &window[window.len() - 2];
        let follow = &window[window.len() - 1];

        let range = impulse.high - impulse.low;
        if range <= 0.0 {
            return None;
        }
        let body = (impulse.close - impulse.open).abs();
        if body / range < STRONG_BODY_RATIO {
            return None;
        }

        let bullish = impulse.close > impulse.open;
        let retrace = if bullish {
            (impulse.close - follow.low) / body
        } else {
            (follow.high - impulse.close) / body
        };
        if retrace > MAX_RETRACE {
            return None;
        }

        let entry = follow.close;
        if bullish {
            Some(BrainSignal {
                brain_id: self.id().to_string(),
                action: BrainAction::Buy,
                entry,
                sl: entry - body,
                tp1: entry + body,
                tp2: entry + body * 1.5,
                reasons: vec!["strong bullish impulse candle with shallow retracement".into()],
                metadata: HashMap::new(),
            })
        } else {
            Some(BrainSignal {
                brain_id: self.id().to_string(),
                action: BrainAction::Sell,
                entry,
                sl: entry + body,
                tp1: entry - body,
                tp2: entry - body * 1.5,
                reasons: vec!["strong bearish impulse candle with shallow retracement".into()],
                metadata: HashMap::new(),
            })
        }
    }

    fn score(&self, _signal: &BrainSignal, ctx: &Context) -> f32 {
        if matches!(ctx.regime, Regime::TrendUp | Regime::TrendDown) {
            75.0
        } else {
            50.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, FeatureBundle};
    use chrono::Utc;

    fn candle(open: f64, close: f64, low: f64, high: f64) -> Candle {
        Candle { time: Utc::now(), open, high, low, close, tick_volume: 10.0 }
    }

    #[test]
    fn detects_bullish_follow_through() {
        let brain = GiftBrain::default();
        let window = vec![candle(100.0, 101.0, 99.9, 101.1), candle(101.0, 101.2, 100.8, 101.3)];
        let ctx = Context {
            symbol: "EURUSD".into(),
            timeframe: "M15".into(),
            features: FeatureBundle::new(),
            spread: 0.1,
            regime: Regime::TrendUp,
        };
        let signal = brain.detect(&window, &ctx).unwrap();
        assert_eq!(signal.action, BrainAction::Buy);
    }

    #[test]
    fn rejects_deep_retracement() {
        let brain = GiftBrain::default();
        let window = vec![candle(100.0, 101.0, 99.9, 101.1), candle(101.0, 100.9, 100.2, 101.0)];
        let ctx = Context {
            symbol: "EURUSD".into(),
            timeframe: "M15".into(),
            features: FeatureBundle::new(),
            spread: 0.1,
            regime: Regime::TrendUp,
        };
        assert!(brain.detect(&window, &ctx).is_none());
    }
}
