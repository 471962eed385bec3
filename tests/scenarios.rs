//! End-to-end scenario tests driving the real module wiring — a
//! `BossBrain` over a seeded candle window, the sim order router, and
//! the risk/RL/SL-TP managers — against an in-memory repository,
//! mirroring the scenarios walked through in the boss brain's gate
//! sequence and the risk/RL/position layers downstream of it.

use chrono::{Duration, TimeZone, Utc};
use trading_brains::boss::{BossBrain, BossConfig};
use trading_brains::brains::trend_pullback::TrendPullbackBrain;
use trading_brains::brains::BrainRegistry;
use trading_brains::execution::fill_model::{FillModel, FillModelConfig};
use trading_brains::execution::router::SimOrderRouter;
use trading_brains::execution::ExecutionEngine;
use trading_brains::models::{Candle, Context, Decision, DecisionAction, FeatureBundle, NewsEvent, NewsImpact, Regime, Side};
use trading_brains::news::{NewsConfig, NewsFilter};
use trading_brains::position::sltp::{SlTpConfig, SlTpManager};
use trading_brains::position::PositionTracker;
use trading_brains::repository::{Repository, SqliteRepository};
use trading_brains::risk::{RiskConfig, RiskManager};
use trading_brains::rl::{RlAction, RlPolicy, RlState};

fn flat_window() -> Vec<Candle> {
    (0..60)
        .map(|i| {
            let close = 100.0 + i as f64 * 0.01;
            Candle { time: Utc::now(), open: close, high: close + 0.2, low: close - 0.2, close, tick_volume: 100.0 }
        })
        .collect()
}

/// A window shaped exactly like `trend_pullback`'s own unit fixture:
/// 88 flat candles, the last 20 ramped up to pull MA20 above MA89,
/// then one pullback candle whose low touches MA20 while its close
/// stays above it — the brain's bullish-pullback trigger.
fn trend_pullback_window() -> Vec<Candle> {
    let mut window: Vec<Candle> = (0..88)
        .map(|_| Candle { time: Utc::now(), open: 100.0, high: 100.5, low: 99.5, close: 100.0, tick_volume: 100.0 })
        .collect();
    for c in window.iter_mut().rev().take(20) {
        c.close += 5.0;
        c.high += 5.0;
        c.low += 5.0;
    }
    window.push(Candle { time: Utc::now(), open: 105.5, high: 106.0, low: 104.0, close: 105.5, tick_volume: 100.0 });
    window
}

/// S1 — a single trend-pullback BUY signal, clean spread, positive
/// risk-reward: the boss brain should arbitrate to a full ENTER that
/// survives the sim router as exactly one open position. Only
/// `trend_pullback` is registered so the window's shape deterministically
/// drives a real ENTER rather than a scripted fixture.
#[tokio::test]
async fn s1_happy_enter_fills_one_open_position() {
    let boss = BossBrain::new(BossConfig {
        risk_per_trade: 0.5,
        point_value: 1.0,
        min_lot: 1.0,
        lot_step: 1.0,
        spread_max: 2.0,
        ..BossConfig::default()
    });
    let mut registry = BrainRegistry::new();
    registry.register(Box::new(TrendPullbackBrain::default()));
    let window = trend_pullback_window();
    let ctx = Context { symbol: "EURUSD".into(), timeframe: "M15".into(), features: FeatureBundle::new(), spread: 0.4, regime: Regime::TrendUp };
    let mut news = NewsFilter::new(NewsConfig::default(), Vec::new());

    let decision = boss.decide(&registry, &window, &ctx, &mut news, None, 5.0, Utc::now());
    assert_eq!(decision.action, DecisionAction::Enter);
    assert_eq!(decision.side, Some(Side::Buy));

    let router = SimOrderRouter::new(FillModel::new(FillModelConfig { rejection_prob: 0.0, ..FillModelConfig::default() }));
    let mut engine = ExecutionEngine::new(router, FillModel::new(FillModelConfig { rejection_prob: 0.0, ..FillModelConfig::default() }));
    let mut tracker = PositionTracker::new();
    let mut sltp = SlTpManager::new(SlTpConfig::default());

    engine.process(decision, &mut tracker, &mut sltp, "EURUSD", 0.3, 1001).await.unwrap();

    let open: Vec<_> = tracker.open_positions().collect();
    assert_eq!(open.len(), 1);
    assert!(engine.audit_log().iter().any(|a| a.success));
}

/// S2 — a HIGH impact event minutes away from the bar must block
/// before any signal scoring happens; no brain contributors recorded.
#[test]
fn s2_news_block_skips_before_signal_collection() {
    let boss = BossBrain::new(BossConfig::default());
    let registry = BrainRegistry::with_defaults();
    let window = flat_window();
    let ctx = Context { symbol: "EURUSD".into(), timeframe: "M15".into(), features: FeatureBundle::new(), spread: 0.5, regime: Regime::TrendUp };

    let now = Utc::now();
    let events = vec![NewsEvent { time: now + Duration::minutes(5), title: "FOMC Rate Decision".into(), impact: NewsImpact::High, country: "US".into() }];
    let mut news = NewsFilter::new(NewsConfig { minutes_before: 10, ..NewsConfig::default() }, events);

    let decision = boss.decide(&registry, &window, &ctx, &mut news, None, 5.0, now);

    assert_eq!(decision.action, DecisionAction::Skip);
    assert!(decision.reason.contains("News block"));
    assert!(decision.contributors.is_empty());
}

/// S3 — three consecutive losing trades push the risk manager's
/// degrade level up and halve the position-size factor; after enough
/// escalations trading pauses outright.
#[test]
fn s3_consecutive_losses_degrade_then_pause_sizing() {
    let mut risk = RiskManager::new(RiskConfig { cooldown_seconds: 0, max_consecutive_losses: 3, degrade_steps: 3, degrade_factor: 0.5, ..RiskConfig::default() });
    assert_eq!(risk.get_position_size_factor(), 1.0);

    for _ in 0..3 {
        risk.record_trade_closed(-50.0);
    }
    assert!(risk.check_can_trade(1.0, &[], Utc::now()).is_err());
    assert_eq!(risk.ledger().degrade_level, 1);
    assert_eq!(risk.get_position_size_factor(), 0.5);

    // A decision's size, scaled the way the bar loop scales it.
    let mut decision = Decision { action: DecisionAction::Enter, size: Some(4.0), ..Decision::skip("fixture") };
    let factor = risk.get_position_size_factor();
    decision.size = decision.size.map(|s| s * factor);
    assert_eq!(decision.size, Some(2.0));

    for _ in 0..3 {
        risk.record_trade_closed(-50.0);
    }
    let _ = risk.check_can_trade(1.0, &[], Utc::now());
    assert_eq!(risk.ledger().degrade_level, 2);
    assert!((risk.get_position_size_factor() - 0.25).abs() < 1e-9);

    for _ in 0..3 {
        risk.record_trade_closed(-50.0);
    }
    let result = risk.check_can_trade(1.0, &[], Utc::now());
    assert!(result.is_err());
    assert!(risk.ledger().paused);
    assert!(risk.ledger().pause_reason.as_deref().unwrap_or_default().contains("degrade"));
}

/// S4 — a BUY position's trailing stop ratchets forward on new highs
/// and holds steady on a pullback that doesn't make a new high.
#[test]
fn s4_trailing_stop_ratchets_and_holds_on_pullback() {
    let mut manager = SlTpManager::new(SlTpConfig { use_partial_exits: false, use_break_even: false, use_trailing: true, trailing_distance: 1.0, ..SlTpConfig::default() });
    manager.install(1, Side::Buy, 100.0, 98.0, 110.0, 115.0);

    manager.update(1, 101.0, 0.0);
    assert_eq!(manager.plan(1).unwrap().current_sl, 100.0);

    manager.update(1, 102.0, 0.0);
    assert_eq!(manager.plan(1).unwrap().current_sl, 101.0);

    manager.update(1, 101.5, 0.0);
    assert_eq!(manager.plan(1).unwrap().current_sl, 101.0, "a pullback that isn't a new high must not widen the stop");

    manager.update(1, 103.0, 0.0);
    assert_eq!(manager.plan(1).unwrap().current_sl, 102.0);
}

/// S5 — crossing TP1 fires a 50% partial close and moves the stop to
/// break-even plus the configured offset.
#[test]
fn s5_tp1_cross_partial_closes_and_moves_stop_to_break_even() {
    let mut manager = SlTpManager::new(SlTpConfig { use_partial_exits: true, partial_fractions: (0.5, 0.3, 0.2), use_break_even: true, break_even_offset: 0.5, use_trailing: false, ..SlTpConfig::default() });
    manager.install(1, Side::Buy, 100.0, 98.0, 102.0, 103.0);

    let events = manager.update(1, 102.0, 0.0);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].fraction, 0.5);

    let plan = manager.plan(1).unwrap();
    assert!(plan.break_even_done);
    assert_eq!(plan.current_sl, 100.5);
}

/// S6 — a regime's RL table freezes once its mean reward deteriorates
/// far enough past the baseline established by early good trades, RL
/// updates stop moving the table while frozen, and unfreezing restores
/// normal action selection.
#[test]
fn s6_rl_auto_freeze_then_unfreeze() {
    let mut policy = RlPolicy::new(99);
    let state = RlState::new(Regime::TrendUp, Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap(), 0.75, 0.05);

    for _ in 0..10 {
        policy.update_from_trade(&state, RlAction::Enter, 90.0, Utc::now());
    }
    assert!(!policy.is_frozen(Regime::TrendUp));

    for _ in 0..10 {
        policy.update_from_trade(&state, RlAction::Enter, -90.0, Utc::now());
    }
    assert!(policy.is_frozen(Regime::TrendUp));

    // Frozen regimes ignore further updates — alpha/beta stop moving.
    let snapshot_before = policy.export_snapshot(Regime::TrendUp, 1);
    policy.update_from_trade(&state, RlAction::Enter, -90.0, Utc::now());
    let snapshot_after = policy.export_snapshot(Regime::TrendUp, 2);
    assert_eq!(snapshot_before.sample_count, snapshot_after.sample_count);

    // select_action keeps proposing a legal action while frozen — only
    // update_from_trade is gated by the freeze.
    let action = policy.select_action(&state, &RlAction::ALL);
    assert!(RlAction::ALL.contains(&action));

    policy.unfreeze_regime(Regime::TrendUp);
    assert!(!policy.is_frozen(Regime::TrendUp));
    let action_after_unfreeze = policy.select_action(&state, &RlAction::ALL);
    assert!(RlAction::ALL.contains(&action_after_unfreeze));
}

/// Integrity smoke check: a fresh in-memory repository opens with no
/// open positions and no persisted decisions.
#[test]
fn repository_opens_clean_in_memory() {
    let repo = SqliteRepository::open_in_memory().unwrap();
    assert!(repo.fetch_open_positions().unwrap().is_empty());
    assert!(repo.fetch_latest_decisions("EURUSD", 10).unwrap().is_empty());
}
