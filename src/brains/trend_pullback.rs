//! Trend Pullback Brain
//! Grounded on `brains/trend_pullback.py`: MA20 vs MA89 trend filter with
//! a pullback-to-MA20 entry trigger.

use crate::brains::{sma, Brain, CandleWindow};
use crate::models::{BrainAction, BrainSignal, Context, Regime};
use std::collections::HashMap;

pub struct TrendPullbackBrain;

impl Default for TrendPullbackBrain {
    fn default() -> Self {
        Self
    }
}

impl Brain for TrendPullbackBrain {
    fn id(&self) -> &'static str {
        "trend_pullback"
    }

    fn name(&self) -> &'static str {
        "Trend Pullback"
    }

    fn detect(&self, window: CandleWindow, _ctx: &Context) -> Option<BrainSignal> {
        if window.len() < 89 {
            return None;
        }
        let ma20 = sma(window, 20)?;
        let ma89 = sma(window, 89)?;
        let last = window.last()?;

        if ma20 > ma89 && last.close > ma20 && last.low <= ma20 {
            let entry = last.close;
            let sl = last.low.min(ma89);
            let risk = (entry - sl).abs();
            return Some(BrainSignal {
                brain_id: self.id().to_string(),
                action: BrainAction::Buy,
                entry,
                sl,
                tp1: entry + risk * 1.5,
                tp2: entry + risk * 2.5,
                reasons: vec!["MA20 above MA89, pullback to MA20 on an up-trend".into()],
                metadata: HashMap::new(),
            });
        }

        if ma20 < ma89 && last.close < ma20 && last.high >= ma20 {
            let entry = last.close;
            let sl = last.high.max(ma89);
            let risk = (sl - entry).abs();
            return Some(BrainSignal {
                brain_id: self.id().to_string(),
                action: BrainAction::Sell,
                entry,
                sl,
                tp1: entry - risk * 1.5,
                tp2: entry - risk * 2.5,
                reasons: vec!["MA20 below MA89, pullback to MA20 on a down-trend".into()],
                metadata: HashMap::new(),
            });
        }

        None
    }

    fn score(&self, signal: &BrainSignal, ctx: &Context) -> f32 {
        let direction_matches = matches!(
            (signal.action, ctx.regime),
            (BrainAction::Buy, Regime::TrendUp) | (BrainAction::Sell, Regime::TrendDown)
        );
        if direction_matches {
            85.0
        } else {
            55.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, FeatureBundle};
    use chrono::Utc;

    fn candle(close: f64, low: f64, high: f64) -> Candle {
        Candle { time: Utc::now(), open: close, high, low, close, tick_volume: 100.0 }
    }

    fn ctx(regime: Regime) -> Context {
        Context { symbol: "EURUSD".into(), timeframe: "M15".into(), features: FeatureBundle::new(), spread: 0.5, regime }
    }

    #[test]
    fn detects_bullish_pullback_when_ma20_above_ma89() {
        let brain = TrendPullbackBrain::default();
        let mut window = vec![candle(100.0, 99.5, 100.5); 88];
        // drive MA20 above MA89 by ramping the last 20 closes up, then
        // pull the last candle's low down onto the MA20.
        for c in window.iter_mut().rev().take(20) {
            c.close += 5.0;
            c.high += 5.0;
            c.low += 5.0;
        }
        window.push(candle(105.5, 104.0, 106.0));
        let signal = brain.detect(&window, &ctx(Regime::TrendUp));
        assert!(signal.is_some());
        assert_eq!(signal.unwrap().action, BrainAction::Buy);
    }

    #[test]
    fn score_rewards_regime_alignment() {
        let brain = TrendPullbackBrain::default();
        let signal = BrainSignal {
            brain_id: "trend_pullback".into(),
            action: BrainAction::Buy,
            entry: 100.0,
            sl: 99.0,
            tp1: 101.5,
            tp2: 102.5,
            reasons: vec![],
            metadata: HashMap::new(),
        };
        assert_eq!(brain.score(&signal, &ctx(Regime::TrendUp)), 85.0);
        assert_eq!(brain.score(&signal, &ctx(Regime::Range)), 55.0);
    }
}
