//! Meta-brain
//! Grounded on spec §4.13: aggregates closed-trade outcomes per
//! (regime, brain_id), decays confidence with wall-clock age, and
//! emits adjusted per-brain weights plus an allow/deny verdict.

use crate::models::{BrainPerformanceRecord, Regime};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

const MIN_TRADES_FOR_CONFIDENCE: u64 = 5;
const CONFIDENCE_DECAY_HALF_LIFE_DAYS: f64 = 30.0;
const DENY_THRESHOLD: f64 = 0.3;
const RISK_FLAG_PENALTY: f64 = 0.1;
const WEIGHT_MIN: f64 = 0.3;
const WEIGHT_MAX: f64 = 2.0;

#[derive(Debug, Clone)]
struct TradeOutcome {
    pnl: f64,
    mfe: f64,
    mae: f64,
}

#[derive(Default)]
struct Accumulator {
    outcomes: Vec<TradeOutcome>,
    cumulative_pnl: f64,
    peak_cumulative_pnl: f64,
    max_drawdown: f64,
}

impl Accumulator {
    fn record(&mut self, pnl: f64, mfe: f64, mae: f64) {
        self.outcomes.push(TradeOutcome { pnl, mfe, mae });
        self.cumulative_pnl += pnl;
        self.peak_cumulative_pnl = self.peak_cumulative_pnl.max(self.cumulative_pnl);
        let drawdown = self.peak_cumulative_pnl - self.cumulative_pnl;
        self.max_drawdown = self.max_drawdown.max(drawdown);
    }

    fn win_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let wins = self.outcomes.iter().filter(|o| o.pnl > 0.0).count();
        wins as f64 / self.outcomes.len() as f64
    }

    fn profit_factor(&self) -> f64 {
        let gross_win: f64 = self.outcomes.iter().filter(|o| o.pnl > 0.0).map(|o| o.pnl).sum();
        let gross_loss: f64 = self.outcomes.iter().filter(|o| o.pnl < 0.0).map(|o| o.pnl.abs()).sum();
        if gross_loss <= 0.0 {
            if gross_win > 0.0 {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            gross_win / gross_loss
        }
    }

    fn avg_rr(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .outcomes
            .iter()
            .filter(|o| o.mae.abs() > 1e-9)
            .map(|o| o.mfe.abs() / o.mae.abs())
            .sum();
        let n = self.outcomes.iter().filter(|o| o.mae.abs() > 1e-9).count();
        if n == 0 {
            0.0
        } else {
            sum / n as f64
        }
    }

    /// `min(1, 0.3 + 0.7 * log(n)/log(100))` once enough trades exist.
    fn base_confidence(&self) -> f64 {
        let n = self.outcomes.len() as u64;
        if n < MIN_TRADES_FOR_CONFIDENCE {
            return 0.3;
        }
        (0.3 + 0.7 * (n as f64).ln() / 100f64.ln()).min(1.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetaDecision {
    pub brain_weights: HashMap<String, f64>,
    pub allow_trading: bool,
    pub average_confidence: f64,
    pub sentiment: String,
    pub risk_level: String,
}

pub struct MetaBrain {
    accumulators: HashMap<(Regime, String), Accumulator>,
    last_update: HashMap<(Regime, String), DateTime<Utc>>,
}

impl Default for MetaBrain {
    fn default() -> Self {
        Self { accumulators: HashMap::new(), last_update: HashMap::new() }
    }
}

impl MetaBrain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_closed_trade(&mut self, regime: Regime, brain_id: &str, pnl: f64, mfe: f64, mae: f64, now: DateTime<Utc>) {
        let key = (regime, brain_id.to_string());
        self.accumulators.entry(key.clone()).or_default().record(pnl, mfe, mae);
        self.last_update.insert(key, now);
    }

    pub fn performance_record(&self, regime: Regime, brain_id: &str, now: DateTime<Utc>) -> Option<BrainPerformanceRecord> {
        let key = (regime, brain_id.to_string());
        let acc = self.accumulators.get(&key)?;
        let confidence = self.decayed_confidence(&key, now);
        Some(BrainPerformanceRecord {
            regime,
            brain_id: brain_id.to_string(),
            win_rate: acc.win_rate(),
            profit_factor: acc.profit_factor(),
            avg_rr: acc.avg_rr(),
            total_trades: acc.outcomes.len() as u64,
            total_pnl: acc.cumulative_pnl,
            max_drawdown: acc.max_drawdown,
            last_update: now,
            confidence,
        })
    }

    /// `c' = c * 0.5^(age_days / 30)`.
    fn decayed_confidence(&self, key: &(Regime, String), now: DateTime<Utc>) -> f64 {
        let Some(acc) = self.accumulators.get(key) else { return 0.3 };
        let base = acc.base_confidence();
        let Some(last) = self.last_update.get(key) else { return base };
        let age_days = (now - *last).num_seconds() as f64 / 86_400.0;
        base * 0.5f64.powf(age_days.max(0.0) / CONFIDENCE_DECAY_HALF_LIFE_DAYS)
    }

    /// Weight per brain for the given regime, normalized win-rate and
    /// profit-factor factors scaled by decayed confidence, clamped to
    /// `[0.3, 2.0]`. Brains with no history default to neutral (1.0).
    pub fn decide(&self, regime: Regime, brain_ids: &[String], active_risk_flags: u32, now: DateTime<Utc>) -> MetaDecision {
        let mut weights = HashMap::new();
        let mut confidences = Vec::new();

        for brain_id in brain_ids {
            let key = (regime, brain_id.clone());
            let weight = match self.accumulators.get(&key) {
                Some(acc) if !acc.outcomes.is_empty() => {
                    let win_rate_factor = acc.win_rate() / 0.5;
                    let pf = acc.profit_factor();
                    let pf_factor = if pf.is_finite() { (pf / 1.5).min(2.0) } else { 2.0 };
                    let confidence = self.decayed_confidence(&key, now);
                    confidences.push(confidence);
                    (win_rate_factor * pf_factor * confidence).clamp(WEIGHT_MIN, WEIGHT_MAX)
                }
                _ => 1.0,
            };
            weights.insert(brain_id.clone(), weight);
        }

        let average_confidence = if confidences.is_empty() {
            0.3
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };
        let adjusted = average_confidence - RISK_FLAG_PENALTY * active_risk_flags as f64;
        let allow_trading = adjusted >= DENY_THRESHOLD;

        let sentiment = if average_confidence >= 0.6 {
            "constructive"
        } else if average_confidence >= 0.4 {
            "neutral"
        } else {
            "cautious"
        }
        .to_string();

        let risk_level = if active_risk_flags == 0 {
            "low"
        } else if active_risk_flags <= 2 {
            "elevated"
        } else {
            "high"
        }
        .to_string();

        MetaDecision { brain_weights: weights, allow_trading, average_confidence, sentiment, risk_level }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn few_trades_yield_floor_confidence() {
        let mut meta = MetaBrain::new();
        let now = Utc::now();
        meta.record_closed_trade(Regime::TrendUp, "trend_rider", 10.0, 5.0, 2.0, now);
        let record = meta.performance_record(Regime::TrendUp, "trend_rider", now).unwrap();
        assert!((record.confidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn confidence_decays_with_wall_clock_age() {
        let mut meta = MetaBrain::new();
        let now = Utc::now();
        for _ in 0..10 {
            meta.record_closed_trade(Regime::TrendUp, "trend_rider", 10.0, 5.0, 2.0, now);
        }
        let fresh = meta.decayed_confidence(&(Regime::TrendUp, "trend_rider".to_string()), now);
        let later = meta.decayed_confidence(&(Regime::TrendUp, "trend_rider".to_string()), now + Duration::days(30));
        assert!(later < fresh);
        assert!((later - fresh / 2.0).abs() < 1e-6);
    }

    #[test]
    fn many_risk_flags_deny_trading() {
        let meta = MetaBrain::new();
        let decision = meta.decide(Regime::Range, &["trend_rider".to_string()], 5, Utc::now());
        assert!(!decision.allow_trading);
    }

    #[test]
    fn unknown_brain_defaults_to_neutral_weight() {
        let meta = MetaBrain::new();
        let decision = meta.decide(Regime::Range, &["unseen_brain".to_string()], 0, Utc::now());
        assert_eq!(decision.brain_weights["unseen_brain"], 1.0);
    }
}
