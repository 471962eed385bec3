//! Session / bad-day filters
//! Grounded on `original_source/.../live/time_filter.py` and
//! `live/bad_day_filter.py`: two collaborators orthogonal to the risk
//! manager's degrade ladder, each producing its own independent
//! "stop trading" signal.

use chrono::{DateTime, Duration, NaiveTime, Utc};

const WIN_RATE_WINDOW: usize = 5;
const LOSS_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
        }
    }
}

/// Blocks bars outside `[start, end]`, broker-tz aware (the caller is
/// responsible for converting `now` into the broker's local time before
/// calling `is_blocked`).
pub struct SessionFilter {
    config: SessionConfig,
}

impl SessionFilter {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn is_blocked(&self, now: DateTime<Utc>) -> bool {
        if !self.config.enabled {
            return false;
        }
        let t = now.time();
        let inside = if self.config.start <= self.config.end {
            t >= self.config.start && t <= self.config.end
        } else {
            t >= self.config.start || t <= self.config.end
        };
        !inside
    }
}

#[derive(Debug, Clone)]
pub struct BadDayConfig {
    pub enabled: bool,
    pub first_n_trades: usize,
    pub max_daily_loss: f64,
    pub min_winrate: f64,
    pub consecutive_losses_max: u32,
}

impl Default for BadDayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            first_n_trades: 5,
            max_daily_loss: -100.0,
            min_winrate: 0.4,
            consecutive_losses_max: 3,
        }
    }
}

/// Same-day realized-drawdown pause, independent of `risk::RiskManager`'s
/// ledger: triggers on a consecutive-loss streak, a loss limit inside
/// the day's first N trades, or a sliding win-rate dipping below
/// threshold. A pause lasts until 17:00 UTC (rolling to the next day
/// if already past that hour).
pub struct BadDayFilter {
    config: BadDayConfig,
    daily_trades: Vec<f64>,
    consecutive_losses: u32,
    current_date: Option<chrono::NaiveDate>,
    paused_until: Option<DateTime<Utc>>,
    last_pause_reason: Option<String>,
}

impl BadDayFilter {
    pub fn new(config: BadDayConfig) -> Self {
        Self {
            config,
            daily_trades: Vec::new(),
            consecutive_losses: 0,
            current_date: None,
            paused_until: None,
            last_pause_reason: None,
        }
    }

    /// Feeds one closed trade's PnL. Returns the pause reason if this
    /// trade tripped a trigger (or if already paused from an earlier
    /// one today).
    pub fn check(&mut self, trade_pnl: f64, now: DateTime<Utc>) -> Option<String> {
        if !self.config.enabled {
            return None;
        }

        let date = now.date_naive();
        if self.current_date != Some(date) {
            self.daily_trades.clear();
            self.consecutive_losses = 0;
            self.current_date = Some(date);
        }

        if let Some(until) = self.paused_until {
            if now < until {
                return Some(format!("paused until {until}"));
            }
            self.paused_until = None;
        }

        self.daily_trades.push(trade_pnl);
        if trade_pnl < -LOSS_EPSILON {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }

        if self.consecutive_losses >= self.config.consecutive_losses_max {
            return Some(self.pause(format!("consecutive losses: {}", self.consecutive_losses), now));
        }

        if self.daily_trades.len() <= self.config.first_n_trades {
            let daily_pnl: f64 = self.daily_trades.iter().sum();
            if daily_pnl <= self.config.max_daily_loss {
                return Some(self.pause(format!("loss limit: {daily_pnl:.2}"), now));
            }
        }

        if self.daily_trades.len() >= WIN_RATE_WINDOW {
            let recent = &self.daily_trades[self.daily_trades.len() - WIN_RATE_WINDOW..];
            let wins = recent.iter().filter(|p| **p > LOSS_EPSILON).count();
            let win_rate = wins as f64 / WIN_RATE_WINDOW as f64;
            if win_rate < self.config.min_winrate {
                return Some(self.pause(format!("win rate: {win_rate:.2}"), now));
            }
        }

        None
    }

    fn pause(&mut self, reason: String, now: DateTime<Utc>) -> String {
        let mut until = now.date_naive().and_hms_opt(17, 0, 0).unwrap().and_utc();
        if until < now {
            until += Duration::days(1);
        }
        self.paused_until = Some(until);
        self.last_pause_reason = Some(reason.clone());
        reason
    }

    pub fn is_paused(&self, now: DateTime<Utc>) -> bool {
        self.paused_until.map(|until| now < until).unwrap_or(false)
    }

    pub fn reset(&mut self) {
        self.daily_trades.clear();
        self.consecutive_losses = 0;
        self.current_date = None;
        self.paused_until = None;
        self.last_pause_reason = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn consecutive_losses_trigger_pause() {
        let mut filter = BadDayFilter::new(BadDayConfig::default());
        let now = Utc::now();
        assert!(filter.check(-10.0, now).is_none());
        assert!(filter.check(-10.0, now).is_none());
        assert!(filter.check(-10.0, now).is_some());
    }

    #[test]
    fn winning_trade_resets_consecutive_losses() {
        let mut filter = BadDayFilter::new(BadDayConfig::default());
        let now = Utc::now();
        filter.check(-10.0, now);
        filter.check(-10.0, now);
        filter.check(5.0, now);
        assert_eq!(filter.consecutive_losses, 0);
    }

    #[test]
    fn session_filter_blocks_outside_window() {
        let config = SessionConfig {
            enabled: true,
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        };
        let filter = SessionFilter::new(config);
        let inside = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        let outside = Utc.with_ymd_and_hms(2026, 1, 5, 20, 0, 0).unwrap();
        assert!(!filter.is_blocked(inside));
        assert!(filter.is_blocked(outside));
    }

    #[test]
    fn disabled_session_filter_never_blocks() {
        let filter = SessionFilter::new(SessionConfig { enabled: false, ..SessionConfig::default() });
        assert!(!filter.is_blocked(Utc::now()));
    }
}
