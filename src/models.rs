//! Core Data Model
//! Pilot in Command: Shared Types
//! Mission: one flat, serializable vocabulary for every component

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// OHLC(V) record for a symbol at a timeframe. Input stream is
/// append-only and monotonically timestamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_volume: f64,
}

/// Coarse classification of current market conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    TrendUp,
    TrendDown,
    Range,
    HighVol,
    Exhaustion,
    Chaotic,
    Unknown,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::TrendUp => "trend_up",
            Regime::TrendDown => "trend_down",
            Regime::Range => "range",
            Regime::HighVol => "high_vol",
            Regime::Exhaustion => "exhaustion",
            Regime::Chaotic => "chaotic",
            Regime::Unknown => "unknown",
        }
    }
}

/// A tagged value inside a feature bundle or signal metadata map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

/// A mapping from name to numeric/categorical value computed from a
/// candle window. Built fresh every bar; not stored long-term.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureBundle(pub HashMap<String, FeatureValue>);

impl FeatureBundle {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn set_number(&mut self, key: &str, value: f64) {
        self.0.insert(key.to_string(), FeatureValue::Number(value));
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(FeatureValue::Number(v)) => Some(*v),
            _ => None,
        }
    }
}

/// Direction a brain or decision can propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Action a brain signal carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BrainAction {
    Buy,
    Sell,
    Neutral,
}

impl BrainAction {
    pub fn side(self) -> Option<Side> {
        match self {
            BrainAction::Buy => Some(Side::Buy),
            BrainAction::Sell => Some(Side::Sell),
            BrainAction::Neutral => None,
        }
    }
}

/// Produced by a brain for the current bar or absent. Immutable once
/// emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainSignal {
    pub brain_id: String,
    pub action: BrainAction,
    pub entry: f64,
    pub sl: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub reasons: Vec<String>,
    pub metadata: HashMap<String, FeatureValue>,
}

impl BrainSignal {
    pub fn explain(&self) -> String {
        self.reasons.join("; ")
    }
}

/// The candle window plus cheap context a brain needs to detect/score.
#[derive(Debug, Clone)]
pub struct Context {
    pub symbol: String,
    pub timeframe: String,
    pub features: FeatureBundle,
    pub spread: f64,
    pub regime: Regime,
}

/// Final arbitrated action of the boss brain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionAction {
    Enter,
    Skip,
    Close,
}

/// The boss brain's output; always either a complete order intent or a
/// justified skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    pub side: Option<Side>,
    pub entry: Option<f64>,
    pub sl: Option<f64>,
    pub tp1: Option<f64>,
    pub tp2: Option<f64>,
    pub size: Option<f64>,
    pub confidence: f64,
    pub reason: String,
    pub contributors: Vec<String>,
    pub metadata: HashMap<String, FeatureValue>,
}

impl Decision {
    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            action: DecisionAction::Skip,
            side: None,
            entry: None,
            sl: None,
            tp1: None,
            tp2: None,
            size: None,
            confidence: 0.0,
            reason: reason.into(),
            contributors: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

/// Status of a tracked position. Invariant: moves OPEN -> CLOSED once,
/// never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed,
    Rejected,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionState {
    pub ticket: u64,
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub entry_price: f64,
    pub open_time: DateTime<Utc>,
    pub sl: Option<f64>,
    pub tp: Option<f64>,
    pub status: PositionStatus,
    pub close_price: Option<f64>,
    pub close_time: Option<DateTime<Utc>>,
    pub pnl: Option<f64>,
    pub comment: String,
    pub magic: u64,
}

impl PositionState {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Unrealized (if open) or realized (if closed) P&L at `price`.
    pub fn pnl_at(&self, price: f64) -> f64 {
        let reference = if self.status == PositionStatus::Open {
            price
        } else {
            self.close_price.unwrap_or(self.entry_price)
        };
        match self.side {
            Side::Buy => (reference - self.entry_price) * self.volume,
            Side::Sell => (self.entry_price - reference) * self.volume,
        }
    }
}

/// One take-profit level inside an SL/TP plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TpLevel {
    pub level_index: u8,
    pub price: f64,
    pub fraction_to_close: f64,
    pub closed: bool,
}

/// Per-ticket SL/TP plan. Invariant: sum of fractions <= 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlTpPlan {
    pub ticket: u64,
    pub levels: Vec<TpLevel>,
    pub current_sl: f64,
    pub break_even_done: bool,
    pub use_break_even: bool,
    pub break_even_offset: f64,
    pub use_trailing: bool,
    pub trailing_distance: f64,
    pub trailing_atr_mult: f64,
    pub favorable_extreme: f64,
    pub entry_price: f64,
}

impl SlTpPlan {
    pub fn total_fraction(&self) -> f64 {
        self.levels.iter().map(|l| l.fraction_to_close).sum()
    }
}

/// Source of a liquidity zone estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquiditySource {
    VwapD,
    VwapW,
    HighD,
    LowD,
    PivotM1,
    PivotM5,
    PivotM15,
    Wyckoff,
    Cluster,
    Gann,
    Round,
    PrevClose,
    Sr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityZone {
    pub symbol: String,
    pub source: LiquiditySource,
    pub price_center: f64,
    pub price_range: f64,
    pub touch_count: u32,
    pub hold_count: u32,
    pub break_count: u32,
    pub sweep_count: u32,
    pub strength: f64,
    pub prob_hold: f64,
    pub prob_break: f64,
    pub last_tested: Option<DateTime<Utc>>,
}

/// Flags describing anomalous cross-market relationships on a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossFlag {
    SpreadHigh,
    SpreadLow,
    CorrBroken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossMarketMetric {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub corr_fast: f64,
    pub corr_slow: f64,
    pub beta: f64,
    pub spread: f64,
    pub spread_mean: f64,
    pub spread_std: f64,
    pub zscore: f64,
    pub flags: Vec<CrossFlag>,
}

/// Priority-ordered outcome of the cross-market brain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrossSignalKind {
    ConfirmBuy,
    ReduceBuy,
    ConfirmSell,
    ReduceSell,
    MarketBroken,
    Neutral,
}

impl CrossSignalKind {
    /// The multiplier spec §4.3 step 3 applies to the top candidate's
    /// weighted score.
    pub fn score_multiplier(self) -> f64 {
        match self {
            CrossSignalKind::MarketBroken => 0.3,
            CrossSignalKind::ReduceBuy | CrossSignalKind::ReduceSell => 0.7,
            CrossSignalKind::Neutral => 1.0,
            CrossSignalKind::ConfirmBuy | CrossSignalKind::ConfirmSell => 1.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NewsImpact {
    High,
    Medium,
    Low,
}

impl NewsImpact {
    /// Lower number = more impactful; mirrors the original's
    /// `{LOW: 3, MEDIUM: 2, HIGH: 1}` ordering.
    pub fn level(self) -> u8 {
        match self {
            NewsImpact::High => 1,
            NewsImpact::Medium => 2,
            NewsImpact::Low => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsEvent {
    pub time: DateTime<Utc>,
    pub title: String,
    pub impact: NewsImpact,
    pub country: String,
}

/// Rolling per-(regime, brain_id) performance record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainPerformanceRecord {
    pub regime: Regime,
    pub brain_id: String,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_rr: f64,
    pub total_trades: u64,
    pub total_pnl: f64,
    pub max_drawdown: f64,
    pub last_update: DateTime<Utc>,
    pub confidence: f64,
}

/// RL action set (spec §3, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RlAction {
    Hold,
    Enter,
    EnterConservative,
    EnterWithExtra,
}

impl RlAction {
    pub const ALL: [RlAction; 4] = [
        RlAction::Hold,
        RlAction::Enter,
        RlAction::EnterConservative,
        RlAction::EnterWithExtra,
    ];
}

/// Beta distribution over one (regime, state_hash, action) arm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RlActionValue {
    pub action: RlAction,
    pub alpha: f64,
    pub beta: f64,
    pub count: u64,
    pub total_reward: f64,
    pub updated_at: DateTime<Utc>,
}

impl RlActionValue {
    pub fn mean(&self) -> f64 {
        if self.alpha + self.beta <= 1.0 {
            0.5
        } else {
            self.alpha / (self.alpha + self.beta)
        }
    }
}

/// Immutable copy of a regime's RL table with metrics and a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub id: u64,
    pub regime: Regime,
    pub taken_at: DateTime<Utc>,
    pub table: HashMap<String, HashMap<String, RlActionValue>>,
    pub mean_reward: f64,
    pub sample_count: u64,
}

/// Session-scoped risk ledger, reset at session rollover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRiskLedger {
    pub daily_pnl: f64,
    pub trade_count: u32,
    pub hourly_count: u32,
    pub last_hour: Option<u32>,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub consecutive_losses: u32,
    pub consecutive_wins: u32,
    pub max_daily_drawdown: f64,
    pub degrade_level: u32,
    pub paused: bool,
    pub pause_reason: Option<String>,
}

impl Default for DailyRiskLedger {
    fn default() -> Self {
        Self {
            daily_pnl: 0.0,
            trade_count: 0,
            hourly_count: 0,
            last_hour: None,
            last_trade_time: None,
            consecutive_losses: 0,
            consecutive_wins: 0,
            max_daily_drawdown: 0.0,
            degrade_level: 0,
            paused: false,
            pause_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sltp_plan_fraction_invariant_holds_for_standard_split() {
        let plan = SlTpPlan {
            ticket: 1,
            levels: vec![
                TpLevel { level_index: 0, price: 102.0, fraction_to_close: 0.5, closed: false },
                TpLevel { level_index: 1, price: 103.0, fraction_to_close: 0.3, closed: false },
                TpLevel { level_index: 2, price: 104.0, fraction_to_close: 0.2, closed: false },
            ],
            current_sl: 98.0,
            break_even_done: false,
            use_break_even: true,
            break_even_offset: 0.5,
            use_trailing: false,
            trailing_distance: 0.0,
            trailing_atr_mult: 0.0,
            favorable_extreme: 100.0,
            entry_price: 100.0,
        };
        assert!((plan.total_fraction() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pnl_at_is_sign_correct_for_buy_and_sell() {
        let buy = PositionState {
            ticket: 1,
            symbol: "EURUSD".into(),
            side: Side::Buy,
            volume: 2.0,
            entry_price: 100.0,
            open_time: Utc::now(),
            sl: None,
            tp: None,
            status: PositionStatus::Open,
            close_price: None,
            close_time: None,
            pnl: None,
            comment: String::new(),
            magic: 0,
        };
        assert_eq!(buy.pnl_at(101.0), 2.0);

        let mut sell = buy.clone();
        sell.side = Side::Sell;
        assert_eq!(sell.pnl_at(101.0), -2.0);
    }

    #[test]
    fn news_impact_ordering_matches_original_blocking_semantics() {
        assert!(NewsImpact::High.level() < NewsImpact::Medium.level());
        assert!(NewsImpact::Medium.level() < NewsImpact::Low.level());
    }
}
