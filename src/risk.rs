//! Risk Manager
//! Grounded on `execution/risk_manager.py`: fail-fast pre-trade checks
//! over a session-scoped ledger, with a degrade-level circuit breaker
//! that halves size after repeated consecutive losses.

use crate::models::DailyRiskLedger;
use chrono::{DateTime, Timelike, Utc};

#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub daily_loss_limit: f64,
    pub daily_profit_target: f64,
    pub max_trades_per_day: u32,
    pub max_trades_per_hour: u32,
    pub max_consecutive_losses: u32,
    pub cooldown_seconds: i64,
    pub max_atr_pct: f64,
    pub max_brain_divergence: f64,
    pub degrade_steps: u32,
    pub degrade_factor: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            daily_loss_limit: 1_000.0,
            daily_profit_target: 0.0,
            max_trades_per_day: 20,
            max_trades_per_hour: 3,
            max_consecutive_losses: 3,
            cooldown_seconds: 180,
            max_atr_pct: 5.0,
            max_brain_divergence: 0.3,
            degrade_steps: 3,
            degrade_factor: 0.5,
        }
    }
}

pub struct RiskManager {
    config: RiskConfig,
    ledger: DailyRiskLedger,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self { config, ledger: DailyRiskLedger::default() }
    }

    pub fn ledger(&self) -> &DailyRiskLedger {
        &self.ledger
    }

    /// Fail-fast gate sequence: paused, daily loss, daily profit (if a
    /// target is set), trade-count caps, cooldown, consecutive
    /// losses (degrading on exhaustion), ATR volatility, and
    /// brain-score divergence.
    pub fn check_can_trade(&mut self, atr_pct: f64, brain_scores: &[f64], now: DateTime<Utc>) -> Result<(), String> {
        if self.ledger.paused {
            return Err(self.ledger.pause_reason.clone().unwrap_or_else(|| "trading paused".to_string()));
        }
        if self.ledger.daily_pnl <= -self.config.daily_loss_limit {
            self.ledger.paused = true;
            self.ledger.pause_reason = Some(format!("daily loss limit {} reached", self.config.daily_loss_limit));
            return Err(format!("daily loss limit {} reached", self.config.daily_loss_limit));
        }
        if self.config.daily_profit_target > 0.0 && self.ledger.daily_pnl >= self.config.daily_profit_target {
            self.ledger.paused = true;
            self.ledger.pause_reason = Some(format!("daily profit target {} reached", self.config.daily_profit_target));
            return Err(format!("daily profit target {} reached", self.config.daily_profit_target));
        }
        if self.ledger.trade_count >= self.config.max_trades_per_day {
            return Err(format!("max trades per day {} reached", self.config.max_trades_per_day));
        }

        let hour = now.hour();
        if self.ledger.last_hour != Some(hour) {
            self.ledger.hourly_count = 0;
            self.ledger.last_hour = Some(hour);
        }
        if self.ledger.hourly_count >= self.config.max_trades_per_hour {
            return Err(format!("max trades per hour {} reached", self.config.max_trades_per_hour));
        }

        if let Some(last_trade) = self.ledger.last_trade_time {
            let elapsed = (now - last_trade).num_seconds();
            if elapsed < self.config.cooldown_seconds {
                return Err(format!("cooldown active, {}s remaining", self.config.cooldown_seconds - elapsed));
            }
        }

        if self.ledger.consecutive_losses >= self.config.max_consecutive_losses {
            self.ledger.degrade_level += 1;
            if self.ledger.degrade_level >= self.config.degrade_steps {
                self.ledger.paused = true;
                self.ledger.pause_reason = Some("degrade steps exhausted".to_string());
            }
            return Err(format!("max consecutive losses {} reached", self.config.max_consecutive_losses));
        }

        if atr_pct > self.config.max_atr_pct {
            return Err(format!("volatility {atr_pct:.2}% exceeds max {}%", self.config.max_atr_pct));
        }

        if brain_scores.len() >= 2 {
            let max = brain_scores.iter().cloned().fold(f64::MIN, f64::max);
            let min = brain_scores.iter().cloned().fold(f64::MAX, f64::min);
            if max > 0.0 {
                let divergence = (max - min) / max;
                if divergence > self.config.max_brain_divergence {
                    return Err(format!("brain divergence {divergence:.2} exceeds max {}", self.config.max_brain_divergence));
                }
            }
        }

        Ok(())
    }

    /// `degrade_factor ^ degrade_level`, multiplied into the boss
    /// brain's size after every consecutive-loss escalation.
    pub fn get_position_size_factor(&self) -> f64 {
        self.config.degrade_factor.powi(self.ledger.degrade_level as i32)
    }

    pub fn record_trade_opened(&mut self, now: DateTime<Utc>) {
        self.ledger.trade_count += 1;
        self.ledger.hourly_count += 1;
        self.ledger.last_trade_time = Some(now);
    }

    pub fn record_trade_closed(&mut self, pnl: f64) {
        self.ledger.daily_pnl += pnl;
        if pnl < 0.0 {
            self.ledger.consecutive_losses += 1;
            self.ledger.consecutive_wins = 0;
        } else {
            self.ledger.consecutive_wins += 1;
            self.ledger.consecutive_losses = 0;
        }
        self.ledger.max_daily_drawdown = self.ledger.max_daily_drawdown.min(self.ledger.daily_pnl);
    }

    /// Session rollover: clears counters, relaxes the degrade level by
    /// one step (floored at zero), and lifts any pause.
    pub fn reset_daily(&mut self) {
        self.ledger.daily_pnl = 0.0;
        self.ledger.trade_count = 0;
        self.ledger.hourly_count = 0;
        self.ledger.last_hour = None;
        self.ledger.consecutive_losses = 0;
        self.ledger.consecutive_wins = 0;
        self.ledger.max_daily_drawdown = 0.0;
        self.ledger.degrade_level = self.ledger.degrade_level.saturating_sub(1);
        self.ledger.paused = false;
        self.ledger.pause_reason = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_loss_limit_blocks_trading() {
        let mut manager = RiskManager::new(RiskConfig::default());
        manager.record_trade_closed(-1_500.0);
        assert!(manager.check_can_trade(1.0, &[80.0, 75.0], Utc::now()).is_err());
    }

    #[test]
    fn consecutive_losses_trigger_degrade_and_eventually_pause() {
        let mut manager = RiskManager::new(RiskConfig { cooldown_seconds: 0, ..RiskConfig::default() });
        for _ in 0..3 {
            manager.record_trade_closed(-10.0);
        }
        let result = manager.check_can_trade(1.0, &[80.0, 75.0], Utc::now());
        assert!(result.is_err());
        assert_eq!(manager.ledger().degrade_level, 1);
        assert!(manager.get_position_size_factor() < 1.0);
    }

    #[test]
    fn brain_divergence_above_threshold_blocks() {
        let mut manager = RiskManager::new(RiskConfig::default());
        let result = manager.check_can_trade(1.0, &[90.0, 10.0], Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn reset_daily_relaxes_degrade_level_by_one() {
        let mut manager = RiskManager::new(RiskConfig { cooldown_seconds: 0, ..RiskConfig::default() });
        for _ in 0..3 {
            manager.record_trade_closed(-10.0);
        }
        let _ = manager.check_can_trade(1.0, &[80.0, 75.0], Utc::now());
        assert_eq!(manager.ledger().degrade_level, 1);
        manager.reset_daily();
        assert_eq!(manager.ledger().degrade_level, 0);
        assert!(!manager.ledger().paused);
    }
}
