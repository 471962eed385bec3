//! RL Gate
//! Grounded on `execution/rl_gate.py`: a thin policy layer between the
//! boss brain's ENTER decision and the capital manager's re-leverage
//! logic.

use super::{RlPolicy, RlState};
use crate::capital::CapitalManager;
use crate::models::{Decision, DecisionAction, RlAction};

pub struct RlGateConfig {
    pub enabled: bool,
}

impl Default for RlGateConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

pub struct RlGate {
    config: RlGateConfig,
}

impl RlGate {
    pub fn new(config: RlGateConfig) -> Self {
        Self { config }
    }

    /// Applies the RL layer on top of a boss decision. HOLD decisions
    /// pass through untouched; ENTER decisions may be downgraded to a
    /// conservative size or routed through the capital manager's
    /// re-leverage check.
    pub fn apply(
        &self,
        decision: Decision,
        policy: &mut RlPolicy,
        capital: &CapitalManager,
        confidence: f64,
        disagreement: f64,
        regime: crate::models::Regime,
        now: chrono::DateTime<chrono::Utc>,
        transition_active: bool,
        liquidity_strength: f64,
        daily_profit: f64,
    ) -> Decision {
        if !self.config.enabled {
            return decision;
        }
        if decision.action != DecisionAction::Enter {
            return decision;
        }

        let state = RlState::new(regime, now, confidence, disagreement);
        let action = policy.select_action(&state, &RlAction::ALL);

        match action {
            RlAction::Hold => {
                let mut held = Decision::skip("RL gate: HOLD selected");
                held.contributors = decision.contributors;
                held
            }
            RlAction::Enter => decision,
            RlAction::EnterConservative => {
                let mut adjusted = decision;
                if let Some(size) = adjusted.size {
                    adjusted.size = Some((size * 0.75).max(1.0));
                }
                adjusted
            }
            RlAction::EnterWithExtra => {
                let side = decision.side.unwrap_or(crate::models::Side::Buy);
                let (approved, reason) =
                    capital.can_realavancar(regime, confidence, disagreement, transition_active, liquidity_strength, daily_profit);
                if approved {
                    let mut adjusted = decision;
                    if let Some(size) = adjusted.size {
                        let base = size as i64;
                        let extra = capital.config().max_extra_contracts;
                        adjusted.size = Some((base + extra) as f64);
                    }
                    adjusted.reason = format!("{} [realavancagem: {}]", adjusted.reason, reason);
                    let _ = side;
                    adjusted
                } else {
                    decision
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capital::{CapitalConfig, CapitalManager};
    use crate::models::{DecisionAction, Regime};

    #[test]
    fn hold_decision_passes_through_untouched() {
        let gate = RlGate::new(RlGateConfig::default());
        let mut policy = RlPolicy::new(1);
        let capital = CapitalManager::new(CapitalConfig::default());
        let decision = Decision::skip("boss said hold");
        let result = gate.apply(decision, &mut policy, &capital, 0.6, 0.1, Regime::Range, chrono::Utc::now(), false, 0.8, 10.0);
        assert_eq!(result.action, DecisionAction::Skip);
    }

    #[test]
    fn disabled_gate_is_a_passthrough() {
        let gate = RlGate::new(RlGateConfig { enabled: false });
        let mut policy = RlPolicy::new(1);
        let capital = CapitalManager::new(CapitalConfig::default());
        let mut decision = Decision::skip("placeholder");
        decision.action = DecisionAction::Enter;
        decision.size = Some(2.0);
        let result = gate.apply(decision, &mut policy, &capital, 0.6, 0.1, Regime::Range, chrono::Utc::now(), false, 0.8, 10.0);
        assert_eq!(result.size, Some(2.0));
    }
}
