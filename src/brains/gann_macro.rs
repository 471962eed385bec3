//! Gann Macro Brain
//! Grounded on `brains/gann_macro.py`: higher-timeframe support/
//! resistance zones derived from MA50 vs MA200 and a 200-period pivot.
//! Always emits a NEUTRAL signal carrying macro zone metadata; it is
//! consumed by the boss brain's macro gate, not scored as a directional
//! candidate.

use crate::brains::{sma, Brain, CandleWindow};
use crate::models::{BrainAction, BrainSignal, Context, FeatureValue};
use std::collections::HashMap;

const PIVOT_WINDOW: usize = 200;
const ZONE_BAND: f64 = 0.15;

pub struct GannMacroBrain;

impl Default for GannMacroBrain {
    fn default() -> Self {
        Self
    }
}

impl Brain for GannMacroBrain {
    fn id(&self) -> &'static str {
        "gann_macro"
    }

    fn name(&self) -> &'static str {
        "Gann Macro"
    }

    fn detect(&self, window: CandleWindow, _ctx: &Context) -> Option<BrainSignal> {
        if window.len() < 50 {
            return None;
        }
        let ma50 = sma(window, 50)?;
        let ma200 = sma(window, window.len().min(200).max(50))?;
        let pivot_slice = &window[window.len().saturating_sub(PIVOT_WINDOW)..];
        let pivot_high = pivot_slice.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let pivot_low = pivot_slice.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let last_close = window.last()?.close;

        let macro_trend = if ma50 > ma200 {
            "up"
        } else if ma50 < ma200 {
            "down"
        } else {
            "flat"
        };

        let support_zone = pivot_low + (last_close - pivot_low) * ZONE_BAND;
        let resistance_zone = pivot_high - (pivot_high - last_close) * ZONE_BAND;

        let mut metadata = HashMap::new();
        metadata.insert("support_zone".to_string(), FeatureValue::Number(support_zone));
        metadata.insert("resistance_zone".to_string(), FeatureValue::Number(resistance_zone));
        metadata.insert("macro_trend".to_string(), FeatureValue::Text(macro_trend.to_string()));

        Some(BrainSignal {
            brain_id: self.id().to_string(),
            action: BrainAction::Neutral,
            entry: last_close,
            sl: last_close,
            tp1: last_close,
            tp2: last_close,
            reasons: vec![format!("macro trend: {macro_trend}")],
            metadata,
        })
    }

    fn score(&self, _signal: &BrainSignal, _ctx: &Context) -> f32 {
        40.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, FeatureBundle, Regime};
    use chrono::Utc;

    #[test]
    fn reports_macro_trend_up_when_ma50_above_ma200() {
        let brain = GannMacroBrain::default();
        let mut window: Vec<Candle> = (0..60)
            .map(|i| Candle { time: Utc::now(), open: 100.0 + i as f64 * 0.1, high: 100.5 + i as f64 * 0.1, low: 99.5 + i as f64 * 0.1, close: 100.0 + i as f64 * 0.1, tick_volume: 10.0 })
            .collect();
        window.push(window.last().unwrap().clone());
        let ctx = Context { symbol: "EURUSD".into(), timeframe: "H1".into(), features: FeatureBundle::new(), spread: 0.1, regime: Regime::TrendUp };
        let signal = brain.detect(&window, &ctx).unwrap();
        assert_eq!(signal.action, BrainAction::Neutral);
        assert!(signal.metadata.contains_key("macro_trend"));
    }
}
