//! Cross-Market Brain
//! Grounded on `brains/cross_market.py`: rolling correlation, a beta-
//! hedged spread, and z-score over-extension between the primary
//! symbol and one cross symbol. Produces a `CrossSignalKind` the boss
//! brain uses to scale its top candidate's weighted score.

use crate::models::{CrossFlag, CrossMarketMetric, CrossSignalKind};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct CrossMarketConfig {
    pub corr_fast_window: usize,
    pub corr_slow_window: usize,
    pub spread_window: usize,
    pub beta_window: usize,
    pub z_threshold: f64,
    pub corr_broken_band: (f64, f64),
    pub min_data_points: usize,
}

impl Default for CrossMarketConfig {
    fn default() -> Self {
        Self {
            corr_fast_window: 50,
            corr_slow_window: 200,
            spread_window: 200,
            beta_window: 200,
            z_threshold: 2.0,
            corr_broken_band: (-0.2, 0.2),
            min_data_points: 10,
        }
    }
}

pub struct CrossMarketBrain {
    config: CrossMarketConfig,
    primary_closes: Vec<f64>,
    cross_closes: Vec<f64>,
}

fn log_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let mean_a = a[a.len() - n..].iter().sum::<f64>() / n as f64;
    let mean_b = b[b.len() - n..].iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[a.len() - n + i] - mean_a;
        let db = b[b.len() - n + i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }
    let corr = cov / (var_a.sqrt() * var_b.sqrt());
    if corr.is_nan() {
        0.0
    } else {
        corr
    }
}

impl CrossMarketBrain {
    pub fn new(config: CrossMarketConfig) -> Self {
        Self { config, primary_closes: Vec::new(), cross_closes: Vec::new() }
    }

    /// Feeds a new bar's close price pair. Returns `None` until both
    /// series have enough history.
    pub fn update(
        &mut self,
        symbol: &str,
        primary_close: f64,
        cross_close: f64,
        now: DateTime<Utc>,
    ) -> Option<(CrossMarketMetric, CrossSignalKind)> {
        self.primary_closes.push(primary_close);
        self.cross_closes.push(cross_close);

        let min_len = self.primary_closes.len().min(self.cross_closes.len());
        if min_len < self.config.min_data_points {
            return None;
        }

        let primary_returns = log_returns(&self.primary_closes);
        let cross_returns = log_returns(&self.cross_closes);

        let corr_fast = if primary_returns.len() >= self.config.corr_fast_window {
            pearson(
                &primary_returns[primary_returns.len() - self.config.corr_fast_window..],
                &cross_returns[cross_returns.len() - self.config.corr_fast_window..],
            )
        } else {
            pearson(&primary_returns, &cross_returns)
        };
        let corr_slow = if primary_returns.len() >= self.config.corr_slow_window {
            pearson(
                &primary_returns[primary_returns.len() - self.config.corr_slow_window..],
                &cross_returns[cross_returns.len() - self.config.corr_slow_window..],
            )
        } else {
            corr_fast
        };

        let beta = if cross_returns.len() >= self.config.beta_window {
            let n = self.config.beta_window;
            let pr = &primary_returns[primary_returns.len() - n..];
            let cr = &cross_returns[cross_returns.len() - n..];
            let mean_c = cr.iter().sum::<f64>() / n as f64;
            let mean_p = pr.iter().sum::<f64>() / n as f64;
            let var_c = cr.iter().map(|v| (v - mean_c).powi(2)).sum::<f64>() / n as f64;
            if var_c.sqrt() > 1e-6 {
                let cov = pr.iter().zip(cr.iter()).map(|(p, c)| (p - mean_p) * (c - mean_c)).sum::<f64>() / n as f64;
                cov / var_c
            } else {
                1.0
            }
        } else {
            1.0
        };

        let (spread, spread_mean, spread_std, zscore) = if self.cross_closes.len() >= self.config.spread_window {
            let n = self.config.spread_window;
            let p = &self.primary_closes[self.primary_closes.len() - n..];
            let c = &self.cross_closes[self.cross_closes.len() - n..];
            let spreads: Vec<f64> = p.iter().zip(c.iter()).map(|(pi, ci)| pi - beta * ci).collect();
            let mean = spreads.iter().sum::<f64>() / n as f64;
            let variance = spreads.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
            let std = variance.sqrt();
            let last_spread = primary_close - beta * cross_close;
            let z = if std > 1e-6 { (last_spread - mean) / std } else { 0.0 };
            (last_spread, mean, std, z)
        } else {
            (0.0, 0.0, 0.0, 0.0)
        };

        let mut flags = Vec::new();
        if zscore > self.config.z_threshold {
            flags.push(CrossFlag::SpreadHigh);
        } else if zscore < -self.config.z_threshold {
            flags.push(CrossFlag::SpreadLow);
        }
        if corr_fast < self.config.corr_broken_band.0 || corr_fast > self.config.corr_broken_band.1 {
            flags.push(CrossFlag::CorrBroken);
        }

        let metric = CrossMarketMetric {
            timestamp: now,
            symbol: symbol.to_string(),
            corr_fast,
            corr_slow,
            beta,
            spread,
            spread_mean,
            spread_std,
            zscore,
            flags: flags.clone(),
        };

        let signal = generate_signal(&metric, &flags, self.config.z_threshold);
        Some((metric, signal))
    }
}

fn generate_signal(metric: &CrossMarketMetric, flags: &[CrossFlag], z_threshold: f64) -> CrossSignalKind {
    if flags.contains(&CrossFlag::CorrBroken) {
        return CrossSignalKind::MarketBroken;
    }

    if flags.contains(&CrossFlag::SpreadHigh) {
        return if metric.corr_fast > 0.3 { CrossSignalKind::ReduceBuy } else { CrossSignalKind::ConfirmSell };
    }
    if flags.contains(&CrossFlag::SpreadLow) {
        return if metric.corr_fast > 0.3 { CrossSignalKind::ConfirmBuy } else { CrossSignalKind::ReduceSell };
    }

    let _ = z_threshold;
    CrossSignalKind::Neutral
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_history_returns_none() {
        let mut brain = CrossMarketBrain::new(CrossMarketConfig::default());
        let result = brain.update("WIN", 100.0, 50.0, Utc::now());
        assert!(result.is_none());
    }

    #[test]
    fn enough_history_produces_neutral_by_default() {
        let mut brain = CrossMarketBrain::new(CrossMarketConfig::default());
        let mut last = None;
        for i in 0..15 {
            last = brain.update("WIN", 100.0 + i as f64 * 0.1, 50.0 + i as f64 * 0.05, Utc::now());
        }
        let (_, signal) = last.expect("should have a signal by now");
        assert_eq!(signal, CrossSignalKind::Neutral);
    }

    #[test]
    fn broken_correlation_flags_market_broken() {
        let mut brain = CrossMarketBrain::new(CrossMarketConfig::default());
        let mut last = None;
        // Primary trends up, cross oscillates with no relation -> near-zero corr.
        for i in 0..60 {
            let primary = 100.0 + i as f64 * 0.2;
            let cross = 50.0 + if i % 2 == 0 { 1.0 } else { -1.0 };
            last = brain.update("WIN", primary, cross, Utc::now());
        }
        let (_, signal) = last.expect("should have a signal");
        assert_eq!(signal, CrossSignalKind::MarketBroken);
    }
}
