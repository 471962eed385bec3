//! Momentum Brain
//! Grounded on `brains/momentum.py`: a literal stub in the source
//! (`detect` always returns `None`, `score` is a fixed baseline).
//! Per the spec's open question, the contract is implemented but left
//! empty until the detection logic is specified.

use crate::brains::{Brain, CandleWindow};
use crate::models::{BrainSignal, Context};

pub struct MomentumBrain;

impl Default for MomentumBrain {
    fn default() -> Self {
        Self
    }
}

impl Brain for MomentumBrain {
    fn id(&self) -> &'static str {
        "momentum"
    }

    fn name(&self) -> &'static str {
        "Momentum"
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
        let brain = MomentumBrain::default();
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
