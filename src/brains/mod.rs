//! Brain Contract and Registry
//! Pilot in Command: Signal Production
//! Mission: a fixed-order set of pluggable, pure signal producers

use crate::models::{BrainSignal, Context};

pub mod cluster_proxy;
pub mod consolidation_90pts;
pub mod elliott_prob;
pub mod gann_macro;
pub mod gift;
pub mod liquidity_levels;
pub mod momentum;
pub mod trend_pullback;
pub mod wyckoff_adv;
pub mod wyckoff_range;

/// A window of recent candles, most-recent last.
pub type CandleWindow<'a> = &'a [crate::models::Candle];

/// Capability set a pluggable signal producer must satisfy. `detect`
/// is pure over the candle window; `score` returns a raw 0-100 number.
pub trait Brain: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn detect(&self, window: CandleWindow, ctx: &Context) -> Option<BrainSignal>;
    fn score(&self, signal: &BrainSignal, ctx: &Context) -> f32;
}

/// Fixed-order list of registered brains at boss construction; order
/// breaks ties.
pub struct BrainRegistry {
    brains: Vec<Box<dyn Brain>>,
}

impl BrainRegistry {
    pub fn new() -> Self {
        Self { brains: Vec::new() }
    }

    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register(Box::new(trend_pullback::TrendPullbackBrain::default()));
        reg.register(Box::new(wyckoff_range::WyckoffRangeBrain::default()));
        reg.register(Box::new(wyckoff_adv::WyckoffAdvancedBrain::default()));
        reg.register(Box::new(gift::GiftBrain::default()));
        reg.register(Box::new(gann_macro::GannMacroBrain::default()));
        reg.register(Box::new(liquidity_levels::LiquidityLevelsBrain::default()));
        reg.register(Box::new(cluster_proxy::ClusterProxyBrain::default()));
        reg.register(Box::new(elliott_prob::ElliottProbBrain::default()));
        reg.register(Box::new(momentum::MomentumBrain::default()));
        reg.register(Box::new(consolidation_90pts::Consolidation90ptsBrain::default()));
        reg
    }

    pub fn register(&mut self, brain: Box<dyn Brain>) {
        self.brains.push(brain);
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Brain> {
        self.brains.iter().map(|b| b.as_ref())
    }

    pub fn len(&self) -> usize {
        self.brains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brains.is_empty()
    }
}

impl Default for BrainRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Simple moving average over the last `n` closes.
pub fn sma(window: CandleWindow, n: usize) -> Option<f64> {
    if window.len() < n || n == 0 {
        return None;
    }
    let slice = &window[window.len() - n..];
    Some(slice.iter().map(|c| c.close).sum::<f64>() / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_preserves_registration_order() {
        let reg = BrainRegistry::with_defaults();
        let ids: Vec<&str> = reg.iter().map(|b| b.id()).collect();
        assert_eq!(ids.first(), Some(&"trend_pullback"));
        assert_eq!(reg.len(), 10);
    }
}
