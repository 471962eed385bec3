//! Boss Brain Arbitration
//! Grounded on spec §4.3's fail-fast gate sequence (no single Python
//! file covers this — the original spreads it across `brain_hub.py`
//! and `risk_adapter.py`); per-brain regime multipliers and the
//! sizing formula are lifted from those modules verbatim.

use crate::brains::BrainRegistry;
use crate::crossmarket::CrossMarketBrain;
use crate::models::{BrainAction, BrainSignal, Context, CrossSignalKind, Decision, DecisionAction, FeatureValue, Regime, Side};
use crate::news::NewsFilter;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Brains whose natural habitat is the `range` regime; they earn the
/// 1.2x range-specialist multiplier there.
const RANGE_SPECIALISTS: &[&str] = &["wyckoff_range", "wyckoff_adv", "cluster_proxy"];
/// Brains specialized for trending markets.
const TREND_SPECIALISTS: &[&str] = &["trend_pullback", "gift", "elliott_prob"];
/// Momentum-style brains get a smaller bump in high volatility.
const MOMENTUM_BRAINS: &[&str] = &["momentum", "consolidation_90pts"];

const MIN_RISK_REWARD: f64 = 1.2;
const CONFLUENCE_SCORE_THRESHOLD: f32 = 85.0;
const MIN_CONFLUENCE_AGREEING: usize = 2;

#[derive(Debug, Clone)]
pub struct BossConfig {
    pub risk_per_trade: f64,
    pub point_value: f64,
    pub min_lot: f64,
    pub lot_step: f64,
    pub spread_max: f64,
    pub spread_rolling_range_factor: f64,
}

impl Default for BossConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: 100.0,
            point_value: 1.0,
            min_lot: 1.0,
            lot_step: 1.0,
            spread_max: 3.0,
            spread_rolling_range_factor: 0.1,
        }
    }
}

struct Scored {
    signal: BrainSignal,
    weighted_score: f64,
}

fn regime_multiplier(brain_id: &str, regime: Regime) -> f64 {
    if RANGE_SPECIALISTS.contains(&brain_id) && regime == Regime::Range {
        return 1.2;
    }
    if TREND_SPECIALISTS.contains(&brain_id) && matches!(regime, Regime::TrendUp | Regime::TrendDown) {
        return 1.2;
    }
    if MOMENTUM_BRAINS.contains(&brain_id) && regime == Regime::HighVol {
        return 1.1;
    }
    1.0
}

pub struct BossBrain {
    config: BossConfig,
}

impl BossBrain {
    pub fn new(config: BossConfig) -> Self {
        Self { config }
    }

    /// Runs every gate in spec order, returning the first rejection or
    /// a fully-formed ENTER decision.
    #[allow(clippy::too_many_arguments)]
    pub fn decide(
        &self,
        registry: &BrainRegistry,
        window: &[crate::models::Candle],
        ctx: &Context,
        news: &mut NewsFilter,
        cross_market: Option<&CrossSignalKind>,
        rolling_avg_range: f64,
        now: DateTime<Utc>,
    ) -> Decision {
        // Gate 1: news.
        let block = news.is_blocked(now);
        if block.blocked {
            return Decision::skip(format!(
                "News block: {}",
                block.event.map(|e| e.title).unwrap_or_default()
            ));
        }
        let medium_risk_factor = news.get_risk_factor(now);

        // Gate 2: collect signals and weighted scores.
        let mut scored: Vec<Scored> = Vec::new();
        let mut contributors = Vec::new();
        let mut per_brain_metadata = HashMap::new();
        for brain in registry.iter() {
            let Some(signal) = brain.detect(window, ctx) else { continue };
            contributors.push(brain.id().to_string());
            let raw_score = brain.score(&signal, ctx);
            let weighted = raw_score as f64 * regime_multiplier(brain.id(), ctx.regime);
            per_brain_metadata.insert(
                format!("{}_action", brain.id()),
                FeatureValue::Text(format!("{:?}", signal.action)),
            );
            per_brain_metadata.insert(format!("{}_score", brain.id()), FeatureValue::Number(weighted));
            if signal.action != BrainAction::Neutral {
                scored.push(Scored { signal, weighted_score: weighted });
            }
        }

        if scored.is_empty() {
            return Decision::skip("no directional brain signal");
        }

        scored.sort_by(|a, b| b.weighted_score.partial_cmp(&a.weighted_score).unwrap());
        let mut top = scored.remove(0);

        // Gate 3: cross-market adjust.
        if let Some(kind) = cross_market {
            top.weighted_score *= kind.score_multiplier();
        }

        let side = top.signal.action.side().expect("directional signal always has a side");

        // Gate 4: macro gate — entry must sit on the macro-consistent
        // side (buy above support zone floor, sell below resistance
        // zone ceiling) when a macro zone is present in context.
        if let Some(support) = ctx.features.number("support_zone") {
            if side == Side::Buy && top.signal.entry < support {
                return Decision::skip("macro gate: entry below macro support zone");
            }
        }
        if let Some(resistance) = ctx.features.number("resistance_zone") {
            if side == Side::Sell && top.signal.entry > resistance {
                return Decision::skip("macro gate: entry above macro resistance zone");
            }
        }

        // Gate 5: confluence.
        let agreeing = scored.iter().filter(|s| s.signal.action == top.signal.action).count() + 1;
        if agreeing < MIN_CONFLUENCE_AGREEING && (top.weighted_score as f32) < CONFLUENCE_SCORE_THRESHOLD {
            return Decision::skip("confluence gate: insufficient agreement");
        }

        // Gate 6: risk-reward.
        let risk = (top.signal.entry - top.signal.sl).abs();
        let reward = (top.signal.tp1 - top.signal.entry).abs();
        if risk <= 0.0 || reward / risk < MIN_RISK_REWARD {
            return Decision::skip("risk-reward gate: below minimum 1.2");
        }

        // Gate 7: spread.
        let dynamic_max = self.config.spread_max.min(self.config.spread_rolling_range_factor * rolling_avg_range);
        if ctx.spread > dynamic_max {
            return Decision::skip(format!("spread gate: {:.3} exceeds {:.3}", ctx.spread, dynamic_max));
        }

        // Gate 8: position sizing.
        let raw = self.config.risk_per_trade / (risk * self.config.point_value);
        let stepped = (raw / self.config.lot_step).floor() * self.config.lot_step;
        let size = stepped.max(self.config.min_lot) * medium_risk_factor;

        per_brain_metadata.insert("medium_risk_factor".to_string(), FeatureValue::Number(medium_risk_factor));

        Decision {
            action: DecisionAction::Enter,
            side: Some(side),
            entry: Some(top.signal.entry),
            sl: Some(top.signal.sl),
            tp1: Some(top.signal.tp1),
            tp2: Some(top.signal.tp2),
            size: Some(size),
            confidence: (top.weighted_score / 100.0).min(1.0),
            reason: top.signal.explain(),
            contributors,
            metadata: per_brain_metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, FeatureBundle};
    use crate::news::NewsConfig;
    use chrono::Utc;

    fn window_trending_up() -> Vec<Candle> {
        (0..100)
            .map(|i| {
                let close = 100.0 + i as f64 * 0.2;
                Candle { time: Utc::now(), open: close, high: close + 0.3, low: close - 1.0, close, tick_volume: 100.0 }
            })
            .collect()
    }

    #[test]
    fn no_signals_skips() {
        let boss = BossBrain::new(BossConfig::default());
        let registry = BrainRegistry::new();
        let window = window_trending_up();
        let ctx = Context { symbol: "EURUSD".into(), timeframe: "M15".into(), features: FeatureBundle::new(), spread: 0.1, regime: Regime::TrendUp };
        let mut news = NewsFilter::new(NewsConfig::default(), Vec::new());
        let decision = boss.decide(&registry, &window, &ctx, &mut news, None, 1.0, Utc::now());
        assert_eq!(decision.action, DecisionAction::Skip);
    }

    #[test]
    fn news_block_takes_priority() {
        let boss = BossBrain::new(BossConfig::default());
        let registry = BrainRegistry::with_defaults();
        let window = window_trending_up();
        let ctx = Context { symbol: "EURUSD".into(), timeframe: "M15".into(), features: FeatureBundle::new(), spread: 0.1, regime: Regime::TrendUp };
        let events = vec![crate::models::NewsEvent {
            time: Utc::now(),
            title: "FOMC".into(),
            impact: crate::models::NewsImpact::High,
            country: "US".into(),
        }];
        let mut news = NewsFilter::new(NewsConfig::default(), events);
        let decision = boss.decide(&registry, &window, &ctx, &mut news, None, 1.0, Utc::now());
        assert_eq!(decision.action, DecisionAction::Skip);
        assert!(decision.reason.contains("News block"));
    }
}
