//! Online updater
//! Grounded on spec §4.14: buffers closed-trade outcomes and flushes
//! them to the RL policy as one atomic batch, taking a policy snapshot
//! every N batches and pruning old ones per regime.

use crate::models::{PolicySnapshot, Regime, RlAction};
use crate::rl::{RlPolicy, RlState};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ClosedTradeOutcome {
    pub state: RlState,
    pub action: RlAction,
    pub reward: f64,
    pub closed_at: DateTime<Utc>,
}

pub struct OnlineUpdaterConfig {
    pub batch_size: usize,
    pub snapshot_interval: u32,
    pub keep_snapshots: usize,
}

impl Default for OnlineUpdaterConfig {
    fn default() -> Self {
        Self { batch_size: 10, snapshot_interval: 5, keep_snapshots: 20 }
    }
}

pub struct OnlineUpdater {
    config: OnlineUpdaterConfig,
    buffer: Vec<ClosedTradeOutcome>,
    batches_since_snapshot: HashMap<Regime, u32>,
    snapshots: HashMap<Regime, Vec<PolicySnapshot>>,
    next_snapshot_id: u64,
}

impl OnlineUpdater {
    pub fn new(config: OnlineUpdaterConfig) -> Self {
        Self {
            config,
            buffer: Vec::new(),
            batches_since_snapshot: HashMap::new(),
            snapshots: HashMap::new(),
            next_snapshot_id: 1,
        }
    }

    /// Adds one closed-trade outcome to the buffer; flushes the whole
    /// buffer as a single batch once it reaches `batch_size`.
    pub fn push(&mut self, outcome: ClosedTradeOutcome, policy: &mut RlPolicy) {
        self.buffer.push(outcome);
        if self.buffer.len() >= self.config.batch_size {
            self.flush(policy);
        }
    }

    fn flush(&mut self, policy: &mut RlPolicy) {
        let batch = std::mem::take(&mut self.buffer);
        let mut touched_regimes: Vec<Regime> = Vec::new();

        for outcome in &batch {
            policy.update_from_trade(&outcome.state, outcome.action, outcome.reward, outcome.closed_at);
            if !touched_regimes.contains(&outcome.state.regime) {
                touched_regimes.push(outcome.state.regime);
            }
        }

        for regime in touched_regimes {
            let counter = self.batches_since_snapshot.entry(regime).or_insert(0);
            *counter += 1;
            if *counter >= self.config.snapshot_interval {
                *counter = 0;
                self.take_snapshot(regime, policy);
            }
        }
    }

    fn take_snapshot(&mut self, regime: Regime, policy: &RlPolicy) {
        let snapshot = policy.export_snapshot(regime, self.next_snapshot_id);
        self.next_snapshot_id += 1;

        let entries = self.snapshots.entry(regime).or_default();
        entries.push(snapshot);
        if entries.len() > self.config.keep_snapshots {
            entries.remove(0);
        }
    }

    pub fn snapshots_for(&self, regime: Regime) -> &[PolicySnapshot] {
        self.snapshots.get(&regime).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Restores a regime's α/β tables from a prior snapshot, re-seeding
    /// the freeze baseline so deterioration is measured fresh from here.
    pub fn rollback_to_snapshot(&self, snapshot_id: u64, policy: &mut RlPolicy) -> Result<(), String> {
        for entries in self.snapshots.values() {
            if let Some(snapshot) = entries.iter().find(|s| s.id == snapshot_id) {
                policy.restore_snapshot(snapshot);
                return Ok(());
            }
        }
        Err(format!("no snapshot with id {snapshot_id}"))
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(regime: Regime, reward: f64) -> ClosedTradeOutcome {
        ClosedTradeOutcome {
            state: RlState::new(regime, Utc::now(), 0.6, 0.1),
            action: RlAction::Enter,
            reward,
            closed_at: Utc::now(),
        }
    }

    #[test]
    fn flush_happens_at_batch_size() {
        let mut updater = OnlineUpdater::new(OnlineUpdaterConfig { batch_size: 3, snapshot_interval: 100, keep_snapshots: 5 });
        let mut policy = RlPolicy::new(42);
        updater.push(outcome(Regime::TrendUp, 10.0), &mut policy);
        updater.push(outcome(Regime::TrendUp, 10.0), &mut policy);
        assert_eq!(updater.buffer_len(), 2);
        updater.push(outcome(Regime::TrendUp, 10.0), &mut policy);
        assert_eq!(updater.buffer_len(), 0);
    }

    #[test]
    fn snapshot_taken_after_interval_batches() {
        let mut updater = OnlineUpdater::new(OnlineUpdaterConfig { batch_size: 1, snapshot_interval: 2, keep_snapshots: 5 });
        let mut policy = RlPolicy::new(42);
        updater.push(outcome(Regime::Range, 10.0), &mut policy);
        assert!(updater.snapshots_for(Regime::Range).is_empty());
        updater.push(outcome(Regime::Range, 10.0), &mut policy);
        assert_eq!(updater.snapshots_for(Regime::Range).len(), 1);
    }

    #[test]
    fn keep_snapshots_caps_history_per_regime() {
        let mut updater = OnlineUpdater::new(OnlineUpdaterConfig { batch_size: 1, snapshot_interval: 1, keep_snapshots: 2 });
        let mut policy = RlPolicy::new(42);
        for _ in 0..5 {
            updater.push(outcome(Regime::Range, 10.0), &mut policy);
        }
        assert_eq!(updater.snapshots_for(Regime::Range).len(), 2);
    }

    #[test]
    fn rollback_unknown_snapshot_errors() {
        let updater = OnlineUpdater::new(OnlineUpdaterConfig::default());
        let mut policy = RlPolicy::new(42);
        assert!(updater.rollback_to_snapshot(999, &mut policy).is_err());
    }
}
