//! Trading Brains Engine — process entrypoint
//! Owns CLI parsing, control files, the bar loop, and every piece of
//! ambient stack (tracing, metrics, a health endpoint) the library
//! crate stays silent about; everything the loop calls through lives
//! in `trading_brains`.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trading_brains::boss::{BossBrain, BossConfig};
use trading_brains::brains::BrainRegistry;
use trading_brains::capital::{CapitalConfig, CapitalManager};
use trading_brains::config::Config;
use trading_brains::crossmarket::{CrossMarketBrain, CrossMarketConfig};
use trading_brains::execution::fill_model::{FillModel, FillModelConfig};
use trading_brains::execution::router::SimOrderRouter;
use trading_brains::execution::ExecutionEngine;
use trading_brains::features::{self, regime_transition::RegimeTransitionDetector};
use trading_brains::meta::MetaBrain;
use trading_brains::models::{Candle, Context as BrainContext, Decision, DecisionAction, NewsImpact, Regime};
use trading_brains::news::{NewsConfig, NewsFilter};
use trading_brains::online_updater::{ClosedTradeOutcome, OnlineUpdater, OnlineUpdaterConfig};
use trading_brains::position::sltp::{SlTpConfig, SlTpManager};
use trading_brains::position::PositionTracker;
use trading_brains::repository::{Repository, SqliteRepository};
use trading_brains::risk::{RiskConfig, RiskManager};
use trading_brains::rl::gate::{RlGate, RlGateConfig};
use trading_brains::rl::{RlAction, RlPolicy, RlState};
use trading_brains::scalp::{ScalpConfig, ScalpManager};
use trading_brains::session::{BadDayConfig, BadDayFilter, SessionConfig, SessionFilter};
use trading_brains::uncertainty::calibrator::CalibrationMethod;
use trading_brains::uncertainty::{Calibrator, ConformalPredictor, Ensemble, UncertaintyConfig, UncertaintyGate, UncertaintyVerdict};

const MAX_WINDOW: usize = 500;
const N_UNCERTAINTY_FEATURES: usize = 5;
const BAR_INTERVAL_MS: u64 = 200;
const SIM_BAR_COUNT: u64 = 300;
const ROLLING_RANGE_WINDOW: usize = 20;

/// `liquidity::LiquidityMap` stays unwired from the hot path (see
/// DESIGN.md); this is the neutral value that keeps the re-leverage
/// gate's liquidity check from always failing until that module is
/// threaded through.
const LIQUIDITY_STRENGTH_PLACEHOLDER: f64 = 0.6;

#[derive(Parser)]
#[command(name = "trading-brains", about = "Multi-brain trading decision engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Creates the SQLite schema if it doesn't already exist.
    InitDb,
    /// Opens the database and checks the control files are sane.
    Healthcheck,
    /// Best-effort integrity pass over the persisted state.
    IntegrityCheck,
    /// Copies the database file to a timestamped sibling.
    BackupDb,
    /// Backs up the database and reports housekeeping status.
    Maintenance,
    /// Not implemented: reporting lives outside this engine's scope.
    DailyReport,
    /// Not implemented: reporting lives outside this engine's scope.
    WeeklyReport,
    /// Historical replay is out of scope; prints the reason and exits.
    Backtest {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        months: Option<u32>,
    },
    /// Not implemented: offline model training is out of scope.
    Train {
        #[arg(long, default_value_t = false)]
        replay: bool,
    },
    /// Not implemented: walk-forward validation is out of scope.
    WalkForward,
    /// Prints the last N persisted decisions for the configured symbol.
    ReplayLast {
        #[arg(long, default_value_t = 20)]
        n: usize,
    },
    /// Best-effort dump of recent decisions and open positions.
    ExportAudit {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Runs the bar loop against a synthetic feed, no capital at risk.
    LiveSim,
    /// Runs the bar loop with the live safety gates enforced.
    LiveReal,
    /// Not implemented: the web dashboard ships separately.
    Dashboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    init_tracing(&config.log_path);

    let cli = Cli::parse();
    match cli.command {
        Command::InitDb => cmd_init_db(&config),
        Command::Healthcheck => cmd_healthcheck(&config),
        Command::IntegrityCheck => cmd_integrity_check(&config),
        Command::BackupDb => cmd_backup_db(&config),
        Command::Maintenance => cmd_maintenance(&config),
        Command::DailyReport => cmd_not_implemented("daily-report"),
        Command::WeeklyReport => cmd_not_implemented("weekly-report"),
        Command::Backtest { from, to, months } => cmd_backtest(from, to, months),
        Command::Train { replay } => {
            let _ = replay;
            cmd_not_implemented("train")
        }
        Command::WalkForward => cmd_not_implemented("walk-forward"),
        Command::ReplayLast { n } => cmd_replay_last(&config, n),
        Command::ExportAudit { from, to } => cmd_export_audit(&config, from, to),
        Command::LiveSim => cmd_live(&config, false).await,
        Command::LiveReal => cmd_live(&config, true).await,
        Command::Dashboard => cmd_not_implemented("dashboard"),
    }
}

fn init_tracing(log_path: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).init();
    info!(log_path, "tracing initialized");
}

fn cmd_not_implemented(name: &str) -> Result<()> {
    println!("{name}: not implemented");
    Ok(())
}

fn cmd_init_db(config: &Config) -> Result<()> {
    ensure_parent_dir(&config.db_path)?;
    SqliteRepository::open(&config.db_path)?;
    println!("schema ready at {}", config.db_path);
    Ok(())
}

fn cmd_healthcheck(config: &Config) -> Result<()> {
    ensure_parent_dir(&config.db_path)?;
    let repo = SqliteRepository::open(&config.db_path)?;
    let open = repo.fetch_open_positions()?;
    println!("db ok, {} open position(s) tracked", open.len());
    println!("stop file present: {}", Path::new("data/STOP.txt").exists());
    println!("live ok file present: {}", Path::new("data/LIVE_OK.txt").exists());
    Ok(())
}

fn cmd_integrity_check(config: &Config) -> Result<()> {
    ensure_parent_dir(&config.db_path)?;
    let repo = SqliteRepository::open(&config.db_path)?;
    // No raw SQL access through the Repository trait by design; this
    // exercises every read path as a smoke check instead.
    let positions = repo.fetch_open_positions()?;
    let decisions = repo.fetch_latest_decisions(&config.symbol, 1)?;
    println!("integrity check passed: {} open position(s), {} recent decision row(s) readable", positions.len(), decisions.len());
    Ok(())
}

fn cmd_backup_db(config: &Config) -> Result<()> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S");
    let backup_path = format!("{}.{}.bak", config.db_path, stamp);
    std::fs::copy(&config.db_path, &backup_path)
        .with_context(|| format!("failed to copy {} to {}", config.db_path, backup_path))?;
    println!("backed up to {backup_path}");
    Ok(())
}

fn cmd_maintenance(config: &Config) -> Result<()> {
    cmd_backup_db(config)?;
    println!("maintenance pass complete");
    Ok(())
}

fn cmd_backtest(from: Option<String>, to: Option<String>, months: Option<u32>) -> Result<()> {
    println!(
        "backtest: not implemented (historical replay against recorded candles is out of scope); requested range from={from:?} to={to:?} months={months:?}"
    );
    Ok(())
}

fn cmd_replay_last(config: &Config, n: usize) -> Result<()> {
    ensure_parent_dir(&config.db_path)?;
    let repo = SqliteRepository::open(&config.db_path)?;
    let rows = repo.fetch_latest_decisions(&config.symbol, n)?;
    for row in &rows {
        println!("{row}");
    }
    println!("{} decision(s) printed", rows.len());
    Ok(())
}

fn cmd_export_audit(config: &Config, from: Option<String>, to: Option<String>) -> Result<()> {
    ensure_parent_dir(&config.db_path)?;
    let repo = SqliteRepository::open(&config.db_path)?;
    let decisions = repo.fetch_latest_decisions(&config.symbol, 1000)?;
    let open_positions = repo.fetch_open_positions()?;
    warn!(?from, ?to, "export-audit ignores date bounds: Repository exposes no ranged fetch");
    println!("{{\"decisions\":{},\"open_positions\":{}}}", decisions.len(), serde_json::to_string(&open_positions)?);
    Ok(())
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

// --- config bridges: top-level `Config` -> each module's own config type ---

fn parse_regime_list(names: &[String]) -> Vec<Regime> {
    names
        .iter()
        .filter_map(|n| match n.to_lowercase().as_str() {
            "trend_up" => Some(Regime::TrendUp),
            "trend_down" => Some(Regime::TrendDown),
            "range" => Some(Regime::Range),
            "high_vol" => Some(Regime::HighVol),
            "exhaustion" => Some(Regime::Exhaustion),
            "chaotic" => Some(Regime::Chaotic),
            "unknown" => Some(Regime::Unknown),
            _ => None,
        })
        .collect()
}

fn build_fill_config(config: &Config) -> FillModelConfig {
    FillModelConfig {
        spread_base: config.fill_model.spread_base,
        spread_vol_mult: config.fill_model.spread_vol_mult,
        slippage_base: config.fill_model.slippage_base,
        slippage_max: config.fill_model.slippage_max,
        rejection_prob: config.fill_model.rejection_prob,
        // config::FillModelConfig carries latency_ms instead of
        // max_spread; spread_max is the one top-level knob for it.
        max_spread: config.spread_max,
    }
}

fn build_risk_config(config: &Config) -> RiskConfig {
    RiskConfig {
        daily_loss_limit: config.risk.daily_loss_limit,
        daily_profit_target: config.risk.daily_profit_target,
        max_trades_per_day: config.risk.max_trades_per_day,
        max_trades_per_hour: config.risk.max_trades_per_hour,
        max_consecutive_losses: config.risk.max_consecutive_losses,
        cooldown_seconds: config.risk.cooldown_seconds,
        max_atr_pct: config.risk.max_atr_pct,
        max_brain_divergence: config.risk.max_brain_divergence,
        degrade_steps: config.risk.degrade_steps,
        degrade_factor: config.risk.degrade_factor,
    }
}

fn build_capital_config(config: &Config) -> CapitalConfig {
    CapitalConfig {
        capital: config.capital.operator_capital,
        margin_per_contract: config.capital.margin_per_contract,
        max_cap: config.capital.max_contracts_cap as i64,
        min_contracts: config.capital.min_contracts as i64,
        max_extra_contracts: config.capital.realavancagem_max_extra as i64,
        realavancagem_enabled: config.capital.realavancagem_enabled,
        forbidden_regimes: parse_regime_list(&config.capital.realavancagem_forbidden_regimes),
        allowed_regimes: parse_regime_list(&config.capital.realavancagem_allowed_regimes),
        min_confidence: config.capital.realavancagem_min_confidence,
        profit_required: config.capital.realavancagem_require_profit,
        min_profit: config.capital.realavancagem_min_profit,
    }
}

fn build_news_config(config: &Config) -> NewsConfig {
    let level = match config.news.impact_block.to_uppercase().as_str() {
        "HIGH" => NewsImpact::High,
        "LOW" => NewsImpact::Low,
        _ => NewsImpact::Medium,
    };
    NewsConfig {
        block_impact_level: level,
        minutes_before: config.news.block_minutes_before,
        minutes_after: config.news.block_minutes_after,
        reduce_risk_on_medium: config.news.reduce_risk_on_medium,
        medium_risk_factor: config.news.medium_risk_factor,
    }
}

fn build_crossmarket_config(config: &Config) -> CrossMarketConfig {
    CrossMarketConfig {
        corr_fast_window: config.crossmarket.corr_window_fast,
        corr_slow_window: config.crossmarket.corr_window_slow,
        spread_window: config.crossmarket.spread_window,
        beta_window: config.crossmarket.beta_window,
        z_threshold: config.crossmarket.z_threshold,
        corr_broken_band: (config.crossmarket.corr_broken_low, config.crossmarket.corr_broken_high),
        min_data_points: config.crossmarket.min_data_points,
    }
}

fn build_sltp_config(config: &Config) -> SlTpConfig {
    SlTpConfig {
        use_partial_exits: config.use_partial_exits,
        partial_fractions: (0.5, 0.3, 0.2),
        use_break_even: config.break_even_after_tp1,
        break_even_offset: config.break_even_offset,
        use_trailing: config.trailing_enabled,
        trailing_distance: config.trailing_distance,
        trailing_atr_mult: config.trailing_atr_mult,
    }
}

fn build_uncertainty_config(config: &Config) -> UncertaintyConfig {
    UncertaintyConfig {
        max_disagreement: config.max_model_disagreement,
        max_proba_std: config.max_proba_std,
        min_confidence: config.min_global_confidence,
    }
}

fn build_boss_config(config: &Config) -> BossConfig {
    BossConfig {
        risk_per_trade: config.risk_per_trade,
        point_value: config.point_value,
        min_lot: config.min_lot,
        lot_step: config.lot_step,
        spread_max: config.spread_max,
        spread_rolling_range_factor: BossConfig::default().spread_rolling_range_factor,
    }
}

fn build_session_config(config: &Config) -> SessionConfig {
    let start = NaiveTime::parse_from_str(&config.session_start, "%H:%M")
        .unwrap_or_else(|_| SessionConfig::default().start);
    let end = NaiveTime::parse_from_str(&config.session_end, "%H:%M").unwrap_or_else(|_| SessionConfig::default().end);
    SessionConfig { enabled: true, start, end }
}

fn build_scalp_config(config: &Config) -> ScalpConfig {
    ScalpConfig { tp_distance: config.scalp_tp, sl_distance: config.scalp_sl, max_hold_minutes: config.scalp_max_hold_minutes }
}

/// Bootstrap calibration/conformal sets so the uncertainty gate has
/// something to fit against before the first real closed trade comes
/// in. Replaced by the `train` pipeline once that's implemented.
fn bootstrap_calibration_set() -> Vec<(f64, f64)> {
    vec![(0.15, 0.0), (0.25, 0.0), (0.4, 0.0), (0.6, 1.0), (0.75, 1.0), (0.85, 1.0), (0.5, 0.0), (0.5, 1.0)]
}

fn bootstrap_conformal_set() -> Vec<(f64, f64, u8)> {
    vec![(0.85, 0.15, 0), (0.2, 0.8, 1), (0.7, 0.3, 0), (0.3, 0.7, 1), (0.6, 0.4, 0), (0.4, 0.6, 1)]
}

/// Deterministic ChaCha8-seeded random-walk candle generator. Stands
/// in for `BrokerAdapter::fetch_rates`, which the sim adapter returns
/// empty from by design.
struct SyntheticFeed {
    rng: ChaCha8Rng,
    last_close: f64,
    step_size: f64,
}

impl SyntheticFeed {
    fn new(seed: u64, start_price: f64, step_size: f64) -> Self {
        Self { rng: ChaCha8Rng::seed_from_u64(seed), last_close: start_price, step_size }
    }

    fn next_candle(&mut self, time: DateTime<Utc>) -> Candle {
        let drift = self.rng.gen_range(-1.0..1.0) * self.step_size;
        self.build_candle(time, drift)
    }

    /// A bar correlated with `primary_drift` plus its own noise —
    /// feeds the cross-market brain something with a real relationship
    /// to track instead of two independent walks.
    fn next_correlated_candle(&mut self, time: DateTime<Utc>, primary_drift: f64, beta: f64) -> Candle {
        let noise = self.rng.gen_range(-1.0..1.0) * self.step_size * 0.4;
        let drift = primary_drift * beta + noise;
        self.build_candle(time, drift)
    }

    fn build_candle(&mut self, time: DateTime<Utc>, drift: f64) -> Candle {
        let open = self.last_close;
        let close = (open + drift).max(0.01);
        let wick = self.rng.gen_range(0.0..self.step_size.max(0.001));
        let high = open.max(close) + wick;
        let low = (open.min(close) - wick).max(0.01);
        let tick_volume = self.rng.gen_range(50.0..500.0);
        self.last_close = close;
        Candle { time, open, high, low, close, tick_volume }
    }
}

/// What was true about the engine's state when a ticket was opened,
/// kept around so a later close can feed the right signals back into
/// the meta-brain and the RL policy.
struct EntryMeta {
    regime: Regime,
    confidence: f64,
    disagreement: f64,
    contributors: Vec<String>,
}

/// Everything one symbol's bar loop needs, wired once at startup.
struct SymbolEngine {
    symbol: String,
    window: Vec<Candle>,
    registry: BrainRegistry,
    boss: BossBrain,
    news: NewsFilter,
    cross_market: CrossMarketBrain,
    cross_feed: SyntheticFeed,
    risk: RiskManager,
    capital: CapitalManager,
    rl_policy: RlPolicy,
    rl_gate: RlGate,
    uncertainty_gate: UncertaintyGate,
    uncertainty_enabled: bool,
    ensemble: Ensemble,
    calibrator: Calibrator,
    conformal: ConformalPredictor,
    transition_detector: RegimeTransitionDetector,
    session_filter: SessionFilter,
    bad_day_filter: BadDayFilter,
    scalp: ScalpManager,
    tracker: PositionTracker,
    sltp: SlTpManager,
    execution: ExecutionEngine<SimOrderRouter>,
    feed: SyntheticFeed,
    online_updater: OnlineUpdater,
    meta: MetaBrain,
    entry_meta: HashMap<u64, EntryMeta>,
    chaotic_window: usize,
    magic: u64,
    last_date: Option<chrono::NaiveDate>,
}

impl SymbolEngine {
    fn new(config: &Config, symbol: String, seed: u64) -> Self {
        let fill_cfg = build_fill_config(config);
        let router = SimOrderRouter::new(FillModel::new(fill_cfg.clone()));
        let execution = ExecutionEngine::new(router, FillModel::new(fill_cfg));

        let calibration_set = bootstrap_calibration_set();
        let conformal_set = bootstrap_conformal_set();

        Self {
            symbol,
            window: Vec::new(),
            registry: BrainRegistry::with_defaults(),
            boss: BossBrain::new(build_boss_config(config)),
            news: NewsFilter::new(build_news_config(config), Vec::new()),
            cross_market: CrossMarketBrain::new(build_crossmarket_config(config)),
            cross_feed: SyntheticFeed::new(seed ^ 0xC0FFEE, 50.0, 0.25),
            risk: RiskManager::new(build_risk_config(config)),
            capital: CapitalManager::new(build_capital_config(config)),
            rl_policy: RlPolicy::new(seed),
            rl_gate: RlGate::new(RlGateConfig { enabled: config.rl.enabled }),
            uncertainty_gate: UncertaintyGate::new(build_uncertainty_config(config)),
            uncertainty_enabled: config.uncertainty_gate_enabled,
            ensemble: Ensemble::with_defaults(N_UNCERTAINTY_FEATURES),
            calibrator: Calibrator::fit(CalibrationMethod::Platt, &calibration_set),
            conformal: ConformalPredictor::fit(&conformal_set, config.conformal_alpha),
            transition_detector: RegimeTransitionDetector::new(),
            session_filter: SessionFilter::new(build_session_config(config)),
            bad_day_filter: BadDayFilter::new(BadDayConfig::default()),
            scalp: ScalpManager::new(build_scalp_config(config)),
            tracker: PositionTracker::new(),
            sltp: SlTpManager::new(build_sltp_config(config)),
            feed: SyntheticFeed::new(seed, 100.0, 0.3),
            online_updater: OnlineUpdater::new(OnlineUpdaterConfig {
                batch_size: config.rl.update_batch_size,
                snapshot_interval: config.rl.snapshot_interval,
                keep_snapshots: config.rl.keep_snapshots,
            }),
            meta: MetaBrain::new(),
            entry_meta: HashMap::new(),
            chaotic_window: config.chaotic_window,
            magic: 7700,
            last_date: None,
        }
    }

    fn rolling_avg_range(&self) -> f64 {
        let n = ROLLING_RANGE_WINDOW.min(self.window.len());
        if n == 0 {
            return 1.0;
        }
        let slice = &self.window[self.window.len() - n..];
        let sum: f64 = slice.iter().map(|c| c.high - c.low).sum();
        (sum / n as f64).max(1e-6)
    }

    async fn process_bar(&mut self, repo: &dyn Repository, now: DateTime<Utc>) -> Result<()> {
        let date = now.date_naive();
        if self.last_date != Some(date) {
            if self.last_date.is_some() {
                self.risk.reset_daily();
            }
            self.last_date = Some(date);
        }

        let candle = self.feed.next_candle(now);
        let primary_drift = candle.close - candle.open;
        let cross_candle = self.cross_feed.next_correlated_candle(now, primary_drift, 0.7);

        self.window.push(candle);
        if self.window.len() > MAX_WINDOW {
            self.window.remove(0);
        }
        repo.append_candle(&self.symbol, "M15", &candle)?;

        let open_at_bar_start: HashSet<u64> = self.tracker.open_positions().map(|p| p.ticket).collect();

        for (ticket, exit) in self.scalp.check_exits(candle.close, now) {
            info!(ticket, ?exit, "scalp exit");
            self.execution.apply_partial_close(ticket, 1.0, &mut self.tracker).await?;
        }

        let features = features::build_features(&self.window, self.chaotic_window);
        let regime = features::classify_regime(&self.window, self.chaotic_window);
        repo.append_regime_log(&self.symbol, now, regime)?;
        if let Some(event) = self.transition_detector.observe(regime, 0.75, now) {
            info!(?event, "regime transition");
        }

        let atr = features.number("atr14").unwrap_or(self.feed.step_size);

        let open_tickets: Vec<u64> = self.tracker.open_positions().map(|p| p.ticket).collect();
        for ticket in open_tickets {
            self.tracker.update_price(ticket, candle.close);
            for event in self.sltp.update(ticket, candle.close, atr) {
                self.execution.apply_partial_close(event.ticket, event.fraction, &mut self.tracker).await?;
            }
            if let Some(plan) = self.sltp.plan(ticket) {
                self.execution.update_stop(ticket, plan.current_sl).await?;
            }
        }

        let cross_signal = self.cross_market.update(&self.symbol, candle.close, cross_candle.close, now);
        let cross_kind = cross_signal.as_ref().map(|(_, kind)| kind);

        if self.session_filter.is_blocked(now) {
            repo.append_audit_entry("session_filter", false, Some("outside session window"))?;
            return self.finish_bar(repo, open_at_bar_start, now).await;
        }
        if self.bad_day_filter.is_paused(now) {
            repo.append_audit_entry("bad_day_filter", false, Some("paused for the day"))?;
            return self.finish_bar(repo, open_at_bar_start, now).await;
        }

        let atr_pct = if candle.close.abs() > 1e-9 { (atr / candle.close) * 100.0 } else { 0.0 };
        if let Err(reason) = self.risk.check_can_trade(atr_pct, &[], now) {
            repo.append_risk_event(&reason, "{}")?;
            repo.append_audit_entry("risk_gate", false, Some(&reason))?;
            return self.finish_bar(repo, open_at_bar_start, now).await;
        }

        let rolling_avg_range = self.rolling_avg_range();
        let ctx = BrainContext { symbol: self.symbol.clone(), timeframe: "M15".into(), features, spread: atr * 0.1, regime };

        let mut decision = self.boss.decide(&self.registry, &self.window, &ctx, &mut self.news, cross_kind, rolling_avg_range, now);
        for brain_id in &decision.contributors {
            if let Some(score) = ctx.features.number(&format!("{brain_id}_score")) {
                let payload = serde_json::json!({ "brain_id": brain_id, "weighted_score": score }).to_string();
                repo.append_brain_signal(&self.symbol, now, brain_id, &payload)?;
            }
        }

        // The boss brain sizes off risk_per_trade alone; the degrade
        // ladder is the risk manager's own state, applied here rather
        // than threaded into BossBrain's signature.
        if decision.action == DecisionAction::Enter {
            let factor = self.risk.get_position_size_factor();
            decision.size = decision.size.map(|size| size * factor);
        }

        let mut entry_disagreement = 0.0;
        if decision.action == DecisionAction::Enter {
            let feature_vec = [
                ctx.features.number("ma20").unwrap_or(0.0),
                ctx.features.number("ma50").unwrap_or(0.0),
                ctx.features.number("atr14").unwrap_or(0.0),
                ctx.features.number("rsi14").unwrap_or(50.0),
                ctx.features.number("volume_zscore").unwrap_or(0.0),
            ];
            let ensemble_out = self.ensemble.predict(&feature_vec);
            let calibrated_p1 = self.calibrator.calibrate(ensemble_out.proba_mean);
            let calibrated_p0 = 1.0 - calibrated_p1;
            let conformal_set = self.conformal.predict_set(calibrated_p0, calibrated_p1);
            entry_disagreement = ensemble_out.disagreement;

            if self.uncertainty_enabled {
                if let UncertaintyVerdict::Block { reason } =
                    self.uncertainty_gate.evaluate(ensemble_out.disagreement, ensemble_out.proba_std, calibrated_p0, calibrated_p1, &conformal_set)
                {
                    decision = Decision::skip(format!("uncertainty gate: {reason}"));
                }
            }

            if decision.action == DecisionAction::Enter {
                let transition_active = self.transition_detector.is_active(now);
                decision = self.rl_gate.apply(
                    decision,
                    &mut self.rl_policy,
                    &self.capital,
                    decision_confidence_hint(&decision),
                    entry_disagreement,
                    regime,
                    now,
                    transition_active,
                    LIQUIDITY_STRENGTH_PLACEHOLDER,
                    self.risk.ledger().daily_pnl,
                );
            }
        }

        repo.append_decision(&self.symbol, now, &decision)?;

        let contributors = decision.contributors.clone();
        let confidence = decision.confidence;
        let side = decision.side;
        self.execution.process(decision, &mut self.tracker, &mut self.sltp, &self.symbol, atr, self.magic).await?;

        let open_after_entry: HashSet<u64> = self.tracker.open_positions().map(|p| p.ticket).collect();
        for ticket in open_after_entry.difference(&open_at_bar_start) {
            self.risk.record_trade_opened(now);
            self.entry_meta.insert(*ticket, EntryMeta { regime, confidence, disagreement: entry_disagreement, contributors: contributors.clone() });
            if let (Some(position), Some(side)) = (self.tracker.get(*ticket), side) {
                self.scalp.open_scalp(*ticket, side, position.entry_price, now);
                repo.upsert_trade(position)?;
            }
        }

        let brain_ids: Vec<String> = self.registry.iter().map(|b| b.id().to_string()).collect();
        let meta_decision = self.meta.decide(regime, &brain_ids, self.risk.ledger().degrade_level, now);
        repo.append_meta_decision(regime, &meta_decision)?;

        self.finish_bar(repo, open_at_bar_start, now).await
    }

    /// Diffs the tracker's open set against what was open at the start
    /// of the bar to find tickets closed this tick, then feeds the
    /// outcome back into risk, the bad-day filter, the meta-brain, and
    /// the RL policy.
    async fn finish_bar(&mut self, repo: &dyn Repository, open_at_bar_start: HashSet<u64>, now: DateTime<Utc>) -> Result<()> {
        let open_now: HashSet<u64> = self.tracker.open_positions().map(|p| p.ticket).collect();
        let closed: Vec<u64> = open_at_bar_start.difference(&open_now).copied().collect();

        for ticket in closed {
            let Some(position) = self.tracker.get(ticket).cloned() else { continue };
            let pnl = position.pnl.unwrap_or(0.0);
            repo.upsert_trade(&position)?;
            self.risk.record_trade_closed(pnl);
            if let Some(reason) = self.bad_day_filter.check(pnl, now) {
                repo.append_risk_event(&reason, "{}")?;
            }

            if let Some(meta) = self.entry_meta.remove(&ticket) {
                let mfe = pnl.max(0.0);
                let mae = pnl.min(0.0);
                for brain_id in &meta.contributors {
                    self.meta.record_closed_trade(meta.regime, brain_id, pnl, mfe, mae, now);
                    if let Some(record) = self.meta.performance_record(meta.regime, brain_id, now) {
                        repo.upsert_brain_performance(&record)?;
                    }
                }

                let state = RlState::new(meta.regime, now, meta.confidence, meta.disagreement);
                let outcome = ClosedTradeOutcome { state, action: RlAction::Enter, reward: pnl, closed_at: now };
                self.online_updater.push(outcome, &mut self.rl_policy);
                for snapshot in self.online_updater.snapshots_for(meta.regime) {
                    repo.append_policy_snapshot(snapshot)?;
                }
            }
        }

        Ok(())
    }
}

fn decision_confidence_hint(decision: &Decision) -> f64 {
    decision.confidence
}

async fn cmd_live(config: &Config, live: bool) -> Result<()> {
    if live {
        config.validate_live_ready().map_err(anyhow::Error::msg)?;
        if config.require_live_ok_file && !Path::new("data/LIVE_OK.txt").exists() {
            anyhow::bail!("live-real requires ./data/LIVE_OK.txt to be present");
        }
        warn!("live-real: no real broker adapter is wired (out of scope); running the sim order router with live-mode safety gates enforced");
    }

    ensure_parent_dir(&config.db_path)?;
    let repo: Arc<dyn Repository> = Arc::new(SqliteRepository::open(&config.db_path)?);

    spawn_metrics_server().await?;

    let mut engines: Vec<SymbolEngine> =
        config.symbols.iter().enumerate().map(|(i, symbol)| SymbolEngine::new(config, symbol.clone(), 4242 + i as u64)).collect();

    let stop_path = Path::new("data/STOP.txt");
    let mut tick: u64 = 0;
    loop {
        if stop_path.exists() {
            info!("data/STOP.txt present, shutting down the bar loop");
            break;
        }
        let now = Utc::now();
        for engine in engines.iter_mut() {
            if let Err(e) = engine.process_bar(repo.as_ref(), now).await {
                warn!(symbol = %engine.symbol, error = %e, "bar processing failed");
            }
        }
        metrics::counter!("engine_bars_processed_total").increment(1);

        tick += 1;
        if !live && tick >= SIM_BAR_COUNT {
            info!(bars = tick, "live-sim reached its bar budget, exiting");
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(BAR_INTERVAL_MS)).await;
    }
    Ok(())
}

/// Starts the Prometheus exporter (its own listener) plus a tiny axum
/// health endpoint, both backgrounded for the life of the process.
async fn spawn_metrics_server() -> Result<()> {
    let metrics_addr: SocketAddr = "127.0.0.1:9898".parse().unwrap();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to install prometheus exporter")?;

    let app = axum::Router::new()
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let health_addr: SocketAddr = "127.0.0.1:9899".parse().unwrap();
    let listener = tokio::net::TcpListener::bind(health_addr).await.context("failed to bind health listener")?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "health server exited");
        }
    });
    info!(%metrics_addr, %health_addr, "metrics and health endpoints up");
    Ok(())
}
