//! Elliott Probability Brain
//! Grounded on `brains/elliott_prob.py`: swing-pivot extraction feeds a
//! small set of fixed-confidence pattern candidates (5-wave impulse up/
//! down, ABC correction, bearish divergence); the highest-confidence
//! candidate is chosen.

use crate::brains::{Brain, CandleWindow};
use crate::models::{BrainAction, BrainSignal, Context};
use std::collections::HashMap;

const SWING_LOOKBACK: usize = 5;

struct Pivot {
    index: usize,
    price: f64,
    is_high: bool,
}

struct Candidate {
    direction: BrainAction,
    confidence: f64,
    entry: f64,
    sl: f64,
    tp1: f64,
    tp2: f64,
    reason: &'static str,
}

pub struct ElliottProbBrain;

impl Default for ElliottProbBrain {
    fn default() -> Self {
        Self
    }
}

fn extract_pivots(window: CandleWindow, lookback: usize) -> Vec<Pivot> {
    let mut pivots = Vec::new();
    if window.len() < lookback * 2 + 1 {
        return pivots;
    }
    for i in lookback..window.len() - lookback {
        let slice = &window[i - lookback..=i + lookback];
        let center = window[i];
        if slice.iter().all(|c| c.high <= center.high) {
            pivots.push(Pivot { index: i, price: center.high, is_high: true });
        } else if slice.iter().all(|c| c.low >= center.low) {
            pivots.push(Pivot { index: i, price: center.low, is_high: false });
        }
    }
    pivots
}

fn generate_candidates(pivots: &[Pivot], last_close: f64) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    if pivots.len() < 5 {
        return candidates;
    }
    let recent = &pivots[pivots.len() - 5..];

    // 5-wave impulse bullish: alternating low-high-low-high-low ending
    // in an up-swing.
    if !recent[0].is_high && recent[4].is_high && recent.last().unwrap().price > recent[0].price {
        let impulse_range = recent[4].price - recent[0].price;
        candidates.push(Candidate {
            direction: BrainAction::Buy,
            confidence: 0.7,
            entry: last_close,
            sl: recent[0].price,
            tp1: last_close + impulse_range * 0.618,
            tp2: last_close + impulse_range,
            reason: "5-wave impulse bullish pattern",
        });
    }

    // 5-wave impulse bearish: mirror.
    if recent[0].is_high && !recent[4].is_high && recent.last().unwrap().price < recent[0].price {
        let impulse_range = recent[0].price - recent[4].price;
        candidates.push(Candidate {
            direction: BrainAction::Sell,
            confidence: 0.7,
            entry: last_close,
            sl: recent[0].price,
            tp1: last_close - impulse_range * 0.618,
            tp2: last_close - impulse_range,
            reason: "5-wave impulse bearish pattern",
        });
    }

    // ABC correction: three-pivot zig-zag after an opposing impulse.
    if pivots.len() >= 3 {
        let abc = &pivots[pivots.len() - 3..];
        let correction_range = (abc[2].price - abc[0].price).abs();
        if correction_range > 0.0 {
            let direction = if abc[2].price > abc[0].price { BrainAction::Buy } else { BrainAction::Sell };
            candidates.push(Candidate {
                direction,
                confidence: 0.6,
                entry: last_close,
                sl: abc[0].price,
                tp1: last_close + correction_range * if direction == BrainAction::Buy { 1.0 } else { -1.0 },
                tp2: last_close + correction_range * 1.5 * if direction == BrainAction::Buy { 1.0 } else { -1.0 },
                reason: "ABC correction pattern",
            });
        }
    }

    // Bearish divergence: last high lower than prior high while price
    // made a new extreme (approximated here via the last two highs).
    let highs: Vec<&Pivot> = pivots.iter().filter(|p| p.is_high).collect();
    if highs.len() >= 2 {
        let prev = highs[highs.len() - 2];
        let last = highs[highs.len() - 1];
        if last.price < prev.price && last.index > prev.index {
            candidates.push(Candidate {
                direction: BrainAction::Sell,
                confidence: 0.55,
                entry: last_close,
                sl: last.price,
                tp1: last_close - (prev.price - last.price),
                tp2: last_close - (prev.price - last.price) * 1.5,
                reason: "bearish divergence between swing highs",
            });
        }
    }

    candidates
}

impl Brain for ElliottProbBrain {
    fn id(&self) -> &'static str {
        "elliott_prob"
    }

    fn name(&self) -> &'static str {
        "Elliott Probability"
    }

    fn detect(&self, window: CandleWindow, _ctx: &Context) -> Option<BrainSignal> {
        let pivots = extract_pivots(window, SWING_LOOKBACK);
        let last_close = window.last()?.close;
        let candidates = generate_candidates(&pivots, last_close);
        let candidate_count = candidates.len();
        let best = candidates
            .into_iter()
            .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap())?;

        let mut metadata = HashMap::new();
        metadata.insert(
            "confidence".to_string(),
            crate::models::FeatureValue::Number(best.confidence),
        );
        metadata.insert(
            "candidate_count".to_string(),
            crate::models::FeatureValue::Number(candidate_count as f64),
        );

        Some(BrainSignal {
            brain_id: self.id().to_string(),
            action: best.direction,
            entry: best.entry,
            sl: best.sl,
            tp1: best.tp1,
            tp2: best.tp2,
            reasons: vec![best.reason.to_string()],
            metadata,
        })
    }

    fn score(&self, signal: &BrainSignal, _ctx: &Context) -> f32 {
        let number_field = |key: &str, default: f64| {
            signal
                .metadata
                .get(key)
                .and_then(|v| match v {
                    crate::models::FeatureValue::Number(n) => Some(*n),
                    _ => None,
                })
                .unwrap_or(default)
        };
        let confidence = number_field("confidence", 0.5);
        let candidate_count = number_field("candidate_count", 1.0);
        (confidence * 70.0 + (candidate_count * 15.0).min(30.0)).min(95.0) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_pivots_requires_enough_window() {
        let window: Vec<crate::models::Candle> = Vec::new();
        assert!(extract_pivots(&window, SWING_LOOKBACK).is_empty());
    }
}
