//! Fill Model
//! Grounded on `execution/fill_model.py` verbatim: spread widens with
//! volatility, slippage is halved in simulation vs live, rejection is
//! checked before any price math runs.

use crate::models::Side;
use rand::Rng;

#[derive(Debug, Clone)]
pub struct FillModelConfig {
    pub spread_base: f64,
    pub spread_vol_mult: f64,
    pub slippage_base: f64,
    pub slippage_max: f64,
    pub rejection_prob: f64,
    pub max_spread: f64,
}

impl Default for FillModelConfig {
    fn default() -> Self {
        Self {
            spread_base: 0.5,
            spread_vol_mult: 0.1,
            slippage_base: 0.0,
            slippage_max: 0.3,
            rejection_prob: 0.01,
            max_spread: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FillOutcome {
    Filled { price: f64, spread: f64, slippage: f64 },
    Rejected,
}

pub struct FillModel {
    config: FillModelConfig,
}

impl FillModel {
    pub fn new(config: FillModelConfig) -> Self {
        Self { config }
    }

    pub fn validate_spread(&self, spread: f64) -> bool {
        spread <= self.config.max_spread
    }

    /// Simulates a fill for `requested` price given the current ATR.
    /// Rejection is checked first; slippage is randomized within
    /// `[slippage_base, slippage_range]`, where `slippage_range` is
    /// halved outside live trading.
    pub fn simulate_fill(&self, requested: f64, atr: f64, side: Side, is_live: bool, rng: &mut impl Rng) -> FillOutcome {
        if rng.gen::<f64>() < self.config.rejection_prob {
            return FillOutcome::Rejected;
        }

        let spread = self.config.spread_base + self.config.spread_vol_mult * atr;
        let slippage_range = if is_live { self.config.slippage_max } else { self.config.slippage_max * 0.5 };
        let random_slippage = if slippage_range > self.config.slippage_base {
            rng.gen_range(self.config.slippage_base..slippage_range)
        } else {
            self.config.slippage_base
        };

        let filled = match side {
            Side::Buy => requested + random_slippage + spread / 2.0,
            Side::Sell => requested - random_slippage - spread / 2.0,
        };

        FillOutcome::Filled { price: filled, spread, slippage: random_slippage }
    }

    /// Non-randomized worst-case fill using maximum slippage, used by
    /// pre-trade risk checks.
    pub fn estimate_worst_case_fill(&self, requested: f64, atr: f64, side: Side, is_live: bool) -> f64 {
        let spread = self.config.spread_base + self.config.spread_vol_mult * atr;
        let slippage = if is_live { self.config.slippage_max } else { self.config.slippage_max * 0.5 };
        match side {
            Side::Buy => requested + slippage + spread / 2.0,
            Side::Sell => requested - slippage - spread / 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn buy_fill_is_worse_than_requested() {
        let model = FillModel::new(FillModelConfig { rejection_prob: 0.0, ..FillModelConfig::default() });
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let outcome = model.simulate_fill(100.0, 1.0, Side::Buy, false, &mut rng);
        match outcome {
            FillOutcome::Filled { price, .. } => assert!(price >= 100.0),
            FillOutcome::Rejected => panic!("should not reject with rejection_prob 0.0"),
        }
    }

    #[test]
    fn sell_fill_is_worse_than_requested() {
        let model = FillModel::new(FillModelConfig { rejection_prob: 0.0, ..FillModelConfig::default() });
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let outcome = model.simulate_fill(100.0, 1.0, Side::Sell, false, &mut rng);
        match outcome {
            FillOutcome::Filled { price, .. } => assert!(price <= 100.0),
            FillOutcome::Rejected => panic!("should not reject with rejection_prob 0.0"),
        }
    }

    #[test]
    fn always_rejects_at_full_probability() {
        let model = FillModel::new(FillModelConfig { rejection_prob: 1.0, ..FillModelConfig::default() });
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(model.simulate_fill(100.0, 1.0, Side::Buy, false, &mut rng), FillOutcome::Rejected);
    }

    #[test]
    fn worst_case_fill_uses_full_slippage_in_live_mode() {
        let model = FillModel::new(FillModelConfig::default());
        let live = model.estimate_worst_case_fill(100.0, 1.0, Side::Buy, true);
        let sim = model.estimate_worst_case_fill(100.0, 1.0, Side::Buy, false);
        assert!(live >= sim);
    }

    #[test]
    fn spread_validation_respects_max() {
        let model = FillModel::new(FillModelConfig::default());
        assert!(model.validate_spread(4.9));
        assert!(!model.validate_spread(5.1));
    }
}
