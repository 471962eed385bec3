//! RL Policy
//! Grounded on `training/reinforcement_policy.py`: Thompson-Sampling
//! Beta bandit per `(regime, state_hash, action)`, with per-regime
//! auto-freeze on reward deterioration. The original hashes state with
//! MD5 truncated to 8 hex chars; this rebuild uses `DefaultHasher`
//! (SipHash) over the same joined fields instead — MD5 buys nothing
//! here since the hash is never exposed outside the process, and
//! pulling in a dedicated crate for a non-cryptographic bucket key
//! would be the kind of ambient sprawl the engine elsewhere avoids.

pub mod gate;

use crate::models::{Regime, RlAction, RlActionValue};
use chrono::{DateTime, Timelike, Utc};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const FREEZE_DETERIORATION_THRESHOLD: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBucket {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisagreementBucket {
    Low,
    Medium,
    High,
}

pub fn discretize_confidence(confidence: f64) -> ConfidenceBucket {
    if confidence < 0.55 {
        ConfidenceBucket::Low
    } else if confidence < 0.70 {
        ConfidenceBucket::Medium
    } else {
        ConfidenceBucket::High
    }
}

pub fn discretize_disagreement(disagreement: f64) -> DisagreementBucket {
    if disagreement < 0.15 {
        DisagreementBucket::Low
    } else if disagreement < 0.35 {
        DisagreementBucket::Medium
    } else {
        DisagreementBucket::High
    }
}

#[derive(Debug, Clone)]
pub struct RlState {
    pub regime: Regime,
    pub hour_bucket: String,
    pub confidence: ConfidenceBucket,
    pub disagreement: DisagreementBucket,
}

impl RlState {
    pub fn new(regime: Regime, now: DateTime<Utc>, confidence: f64, disagreement: f64) -> Self {
        Self {
            regime,
            hour_bucket: format!("{:02}:00", now.hour()),
            confidence: discretize_confidence(confidence),
            disagreement: discretize_disagreement(disagreement),
        }
    }

    /// Deterministic 8-hex-char bucket key, joined the same way the
    /// original joins its MD5 input fields.
    pub fn to_hash(&self) -> String {
        let joined = format!(
            "{}_{}_{:?}_{:?}",
            self.regime.as_str(),
            self.hour_bucket,
            self.confidence,
            self.disagreement
        );
        let mut hasher = DefaultHasher::new();
        joined.hash(&mut hasher);
        format!("{:08x}", (hasher.finish() & 0xFFFF_FFFF) as u32)
    }
}

struct RegimeTable {
    states: HashMap<String, HashMap<RlAction, RlActionValue>>,
    frozen: bool,
    baseline_mean: Option<f64>,
}

impl RegimeTable {
    fn new() -> Self {
        Self { states: HashMap::new(), frozen: false, baseline_mean: None }
    }
}

/// Thompson-sampling bandit over `(regime, state_hash, action)` arms.
pub struct RlPolicy {
    tables: HashMap<Regime, RegimeTable>,
    rng: rand_chacha::ChaCha8Rng,
}

impl RlPolicy {
    pub fn new(seed: u64) -> Self {
        use rand::SeedableRng;
        Self { tables: HashMap::new(), rng: rand_chacha::ChaCha8Rng::seed_from_u64(seed) }
    }

    fn table_mut(&mut self, regime: Regime) -> &mut RegimeTable {
        self.tables.entry(regime).or_insert_with(RegimeTable::new)
    }

    /// Samples from every action's Beta(alpha, beta) and returns the
    /// argmax. Lazily initializes unseen actions to Beta(1, 1).
    pub fn select_action(&mut self, state: &RlState, available_actions: &[RlAction]) -> RlAction {
        use rand_distr::{Beta, Distribution};

        let hash = state.to_hash();
        let table = self.table_mut(state.regime);
        let entry = table.states.entry(hash).or_default();

        let mut best_action = RlAction::Hold;
        let mut best_sample = f64::MIN;
        for action in available_actions {
            let av = entry.entry(*action).or_insert_with(|| RlActionValue {
                action: *action,
                alpha: 1.0,
                beta: 1.0,
                count: 0,
                total_reward: 0.0,
                updated_at: Utc::now(),
            });
            let dist = Beta::new(av.alpha.max(1e-6), av.beta.max(1e-6)).expect("valid beta params");
            let sample = dist.sample(&mut self.rng);
            if sample > best_sample {
                best_sample = sample;
                best_action = *action;
            }
        }
        best_action
    }

    /// Updates the arm for `(state, action)` with a raw PnL reward. No
    /// effect if the regime is currently frozen.
    pub fn update_from_trade(&mut self, state: &RlState, action: RlAction, reward: f64, now: DateTime<Utc>) {
        let hash = state.to_hash();
        let regime = state.regime;
        {
            let table = self.table_mut(regime);
            if table.frozen {
                return;
            }
            let entry = table.states.entry(hash).or_default();
            let av = entry.entry(action).or_insert_with(|| RlActionValue {
                action,
                alpha: 1.0,
                beta: 1.0,
                count: 0,
                total_reward: 0.0,
                updated_at: now,
            });
            let normalized_reward = ((reward + 100.0) / 200.0).clamp(0.0, 1.0);
            if normalized_reward > 0.5 {
                av.alpha += normalized_reward;
            } else {
                av.beta += 1.0 - normalized_reward;
            }
            av.count += 1;
            av.total_reward += reward;
            av.updated_at = now;
        }
        self.check_freeze_regime(regime);
    }

    fn regime_mean_reward(&self, regime: Regime) -> Option<f64> {
        let table = self.tables.get(&regime)?;
        let mut total_reward = 0.0;
        let mut total_count = 0u64;
        for state in table.states.values() {
            for av in state.values() {
                total_reward += av.total_reward;
                total_count += av.count;
            }
        }
        if total_count == 0 {
            None
        } else {
            Some(total_reward / total_count as f64)
        }
    }

    fn check_freeze_regime(&mut self, regime: Regime) {
        let Some(current_mean) = self.regime_mean_reward(regime) else { return };
        let table = self.table_mut(regime);
        let baseline = *table.baseline_mean.get_or_insert(current_mean);
        let deterioration = (baseline - current_mean) / (baseline.abs() + 1e-6);
        if deterioration > FREEZE_DETERIORATION_THRESHOLD {
            table.frozen = true;
        }
    }

    pub fn is_frozen(&self, regime: Regime) -> bool {
        self.tables.get(&regime).map(|t| t.frozen).unwrap_or(false)
    }

    /// Unfreezes a regime and recomputes its baseline from current
    /// state, so the next deterioration check starts fresh.
    pub fn unfreeze_regime(&mut self, regime: Regime) {
        let mean = self.regime_mean_reward(regime);
        let table = self.table_mut(regime);
        table.frozen = false;
        table.baseline_mean = mean;
    }

    pub fn export_snapshot(&self, regime: Regime, id: u64) -> crate::models::PolicySnapshot {
        let mut flattened: HashMap<String, HashMap<String, RlActionValue>> = HashMap::new();
        let mut total_reward = 0.0;
        let mut total_count = 0u64;
        if let Some(table) = self.tables.get(&regime) {
            for (state_hash, actions) in &table.states {
                let mut action_map = HashMap::new();
                for (action, av) in actions {
                    action_map.insert(format!("{action:?}"), av.clone());
                    total_reward += av.total_reward;
                    total_count += av.count;
                }
                flattened.insert(state_hash.clone(), action_map);
            }
        }
        crate::models::PolicySnapshot {
            id,
            regime,
            taken_at: Utc::now(),
            table: flattened,
            mean_reward: if total_count > 0 { total_reward / total_count as f64 } else { 0.0 },
            sample_count: total_count,
        }
    }

    /// Restores a regime's α/β tables from a snapshot and re-seeds the
    /// freeze baseline to the snapshot's mean reward.
    pub fn restore_snapshot(&mut self, snapshot: &crate::models::PolicySnapshot) {
        let mut states: HashMap<String, HashMap<RlAction, RlActionValue>> = HashMap::new();
        for (state_hash, action_map) in &snapshot.table {
            let mut actions = HashMap::new();
            for av in action_map.values() {
                actions.insert(av.action, av.clone());
            }
            states.insert(state_hash.clone(), actions);
        }
        self.tables.insert(
            snapshot.regime,
            RegimeTable { states, frozen: false, baseline_mean: Some(snapshot.mean_reward) },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_for_same_inputs() {
        let now = Utc::now();
        let a = RlState::new(Regime::Range, now, 0.6, 0.1);
        let b = RlState::new(Regime::Range, now, 0.6, 0.1);
        assert_eq!(a.to_hash(), b.to_hash());
    }

    #[test]
    fn select_action_still_samples_while_frozen() {
        // Freezing blocks `update_from_trade` from moving the table, not
        // `select_action`'s sampling — a frozen regime still proposes a
        // legal action every bar.
        let mut policy = RlPolicy::new(42);
        policy.table_mut(Regime::Range).frozen = true;
        let state = RlState::new(Regime::Range, Utc::now(), 0.6, 0.1);
        let action = policy.select_action(&state, &RlAction::ALL);
        assert!(RlAction::ALL.contains(&action));
    }

    #[test]
    fn repeated_losses_eventually_freeze_the_regime() {
        let mut policy = RlPolicy::new(7);
        let state = RlState::new(Regime::TrendUp, Utc::now(), 0.6, 0.1);
        policy.update_from_trade(&state, RlAction::Enter, 50.0, Utc::now());
        for _ in 0..20 {
            policy.update_from_trade(&state, RlAction::Enter, -90.0, Utc::now());
        }
        assert!(policy.is_frozen(Regime::TrendUp));
    }
}
