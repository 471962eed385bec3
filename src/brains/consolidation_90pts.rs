//! Consolidation 90pts Brain
//! Grounded on `brains/consolidation_90pts.py`: a literal stub in the
//! source, same treatment as `momentum.rs`.

use crate::brains::{Brain, CandleWindow};
use crate::models::{BrainSignal, Context};

pub struct Consolidation90ptsBrain;

impl Default for Consolidation90ptsBrain {
    fn default() -> Self {
        Self
    }
}

impl Brain for Consolidation90ptsBrain {
    fn id(&self) -> &'static str {
        "consolidation_90pts"
    }

    fn name(&self) -> &'static str {
        "Consolidation 90pts"
    }

    fn detect(&self, _window: CandleWindow, _ctx: &Context) -> Option<BrainSignal> {
        None
    }

    fn score(&self, _signal: &BrainSignal, _ctx: &Context) -> f32 {
        40.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureBundle;

    #[test]
    fn never_emits_a_signal() {
        let brain = Consolidation90ptsBrain::default();
        let ctx = Context {
            symbol: "EURUSD".into(),
            timeframe: "M15".into(),
            features: FeatureBundle::new(),
            spread: 0.2,
            regime: crate::models::Regime::Unknown,
        };
        assert!(brain.detect(&[], &ctx).is_none());
    }
}
