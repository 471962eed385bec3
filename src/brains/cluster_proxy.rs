//! Cluster Proxy Brain
//! Grounded on `brains/cluster_proxy.py`: tick-volume spikes combined
//! with absorption (wide range, small body) over the last 30 candles,
//! biased by recent direction when touch count is low.

use crate::brains::{Brain, CandleWindow};
use crate::models::{BrainAction, BrainSignal, Context};
use std::collections::HashMap;

const LOOKBACK: usize = 30;
const VOLUME_SPIKE_MULT: f64 = 1.5;
const ABSORPTION_RATIO: f64 = 2.0;
const PROXIMITY_STD_MULT: f64 = 0.2;

pub struct ClusterProxyBrain;

impl Default for ClusterProxyBrain {
    fn default() -> Self {
        Self
    }
}

impl Brain for ClusterProxyBrain {
    fn id(&self) -> &'static str {
        "cluster_proxy"
    }

    fn name(&self) -> &'static str {
        "Cluster Proxy"
    }

    fn detect(&self, window: CandleWindow, _ctx: &Context) -> Option<BrainSignal> {
        if window.len() < LOOKBACK + 2 {
            return None;
        }
        let slice = &window[window.len() - LOOKBACK..];
        let mean_vol = slice.iter().map(|c| c.tick_volume).sum::<f64>() / slice.len() as f64;
        let last = slice.last()?;
        let range = last.high - last.low;
        let body = (last.close - last.open).abs();

        let volume_spike = mean_vol > 0.0 && last.tick_volume > mean_vol * VOLUME_SPIKE_MULT;
        let absorption = body > 0.0 && range > body * ABSORPTION_RATIO;
        if !(volume_spike && absorption) {
            return None;
        }

        let mean_price = slice.iter().map(|c| c.close).sum::<f64>() / slice.len() as f64;
        let variance = slice.iter().map(|c| (c.close - mean_price).powi(2)).sum::<f64>() / slice.len() as f64;
        let std = variance.sqrt();
        let touch_count = slice
            .iter()
            .filter(|c| (c.close - last.close).abs() < std * PROXIMITY_STD_MULT)
            .count() as u32;

        if touch_count > 2 {
            return None;
        }

        let prev = &window[window.len() - 2];
        let bullish = last.close > prev.close;
        let entry = last.close;
        let sl = if bullish { last.low } else { last.high };

        let mut metadata = HashMap::new();
        metadata.insert(
            "touch_count".to_string(),
            crate::models::FeatureValue::Number(touch_count as f64),
        );

        Some(BrainSignal {
            brain_id: self.id().to_string(),
            action: if bullish { BrainAction::Buy } else { BrainAction::Sell },
            entry,
            sl,
            tp1: if bullish { entry + range } else { entry - range },
            tp2: if bullish { entry + range * 1.5 } else { entry - range * 1.5 },
            reasons: vec!["volume spike with absorption, low touch count".into()],
            metadata,
        })
    }

    fn score(&self, _signal: &BrainSignal, _ctx: &Context) -> f32 {
        45.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, FeatureBundle, Regime};
    use chrono::Utc;

    fn flat(close: f64) -> Candle {
        Candle { time: Utc::now(), open: close, high: close + 0.1, low: close - 0.1, close, tick_volume: 100.0 }
    }

    #[test]
    fn requires_both_volume_spike_and_absorption() {
        let brain = ClusterProxyBrain::default();
        let mut window = vec![flat(100.0); 31];
        let ctx = Context { symbol: "EURUSD".into(), timeframe: "M15".into(), features: FeatureBundle::new(), spread: 0.1, regime: Regime::Range };
        // No spike: nothing detected.
        assert!(brain.detect(&window, &ctx).is_none());

        // Inject a spike+absorption bar at the end.
        let last = window.len() - 1;
        window[last] = Candle { time: Utc::now(), open: 100.0, high: 101.0, low: 99.0, close: 100.2, tick_volume: 500.0 };
        let signal = brain.detect(&window, &ctx);
        assert!(signal.is_some());
    }
}
