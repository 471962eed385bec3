//! Runtime Configuration
//! Pilot in Command: Settings
//! Mission: one flat, env-backed key-value store with sane defaults

use std::env;

fn env_str(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_num<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "y"))
        .unwrap_or(default)
}

fn env_csv(key: &str, default: &[&str]) -> Vec<String> {
    env::var(key)
        .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_else(|_| default.iter().map(|s| s.to_string()).collect())
}

#[derive(Debug, Clone)]
pub struct FillModelConfig {
    pub spread_base: f64,
    pub spread_vol_mult: f64,
    pub slippage_base: f64,
    pub slippage_max: f64,
    pub rejection_prob: f64,
    pub latency_ms: f64,
}

impl FillModelConfig {
    pub fn from_env() -> Self {
        Self {
            spread_base: env_num("FILL_MODEL_SPREAD_BASE", 1.0),
            spread_vol_mult: env_num("FILL_MODEL_SPREAD_VOL_MULT", 0.5),
            slippage_base: env_num("FILL_MODEL_SLIPPAGE_BASE", 0.0),
            slippage_max: env_num("FILL_MODEL_SLIPPAGE_MAX", 2.0),
            rejection_prob: env_num("FILL_MODEL_REJECTION_PROB", 0.01),
            latency_ms: env_num("FILL_MODEL_LATENCY_MS", 0.0),
        }
    }
}

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

impl RiskConfig {
    pub fn from_env() -> Self {
        Self {
            daily_loss_limit: env_num("DAILY_LOSS_LIMIT", 1000.0),
            daily_profit_target: env_num("DAILY_PROFIT_TARGET", 0.0),
            max_trades_per_day: env_num("MAX_TRADES_PER_DAY", 20),
            max_trades_per_hour: env_num("MAX_TRADES_PER_HOUR", 3),
            max_consecutive_losses: env_num("MAX_CONSECUTIVE_LOSSES", 3),
            cooldown_seconds: env_num("COOLDOWN_SECONDS", 180),
            max_atr_pct: env_num("MAX_ATR_PCT", 5.0),
            max_brain_divergence: env_num("MAX_BRAIN_DIVERGENCE", 0.3),
            degrade_steps: env_num("DEGRADE_STEPS", 3),
            degrade_factor: env_num("DEGRADE_FACTOR", 0.5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapitalConfig {
    pub operator_capital: f64,
    pub margin_per_contract: f64,
    pub max_contracts_cap: u32,
    pub min_contracts: u32,
    pub realavancagem_enabled: bool,
    pub realavancagem_max_extra: u32,
    pub realavancagem_min_confidence: f64,
    pub realavancagem_require_profit: bool,
    pub realavancagem_min_profit: f64,
    pub realavancagem_allowed_regimes: Vec<String>,
    pub realavancagem_forbidden_regimes: Vec<String>,
}

impl CapitalConfig {
    pub fn from_env() -> Self {
        Self {
            operator_capital: env_num("OPERATOR_CAPITAL_BRL", 10_000.0),
            margin_per_contract: env_num("MARGIN_PER_CONTRACT_BRL", 1_000.0),
            max_contracts_cap: env_num("MAX_CONTRACTS_CAP", 10),
            min_contracts: env_num("MIN_CONTRACTS", 1),
            realavancagem_enabled: env_bool("REALAVANCAGEM_ENABLED", false),
            realavancagem_max_extra: env_num("REALAVANCAGEM_MAX_EXTRA", 0),
            realavancagem_min_confidence: env_num("REALAVANCAGEM_MIN_CONFIDENCE", 0.7),
            realavancagem_require_profit: env_bool("REALAVANCAGEM_REQUIRE_PROFIT", true),
            realavancagem_min_profit: env_num("REALAVANCAGEM_MIN_PROFIT_BRL", 0.0),
            realavancagem_allowed_regimes: env_csv("REALAVANCAGEM_ALLOWED_REGIMES", &[]),
            realavancagem_forbidden_regimes: env_csv("REALAVANCAGEM_FORBIDDEN_REGIMES", &["chaotic"]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RlConfig {
    pub enabled: bool,
    pub initial_alpha: f64,
    pub initial_beta: f64,
    pub freeze_threshold: f64,
    pub update_batch_size: usize,
    pub snapshot_interval: u32,
    pub keep_snapshots: usize,
}

impl RlConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: env_bool("RL_ENABLED", true),
            initial_alpha: env_num("RL_INITIAL_ALPHA", 1.0),
            initial_beta: env_num("RL_INITIAL_BETA", 1.0),
            freeze_threshold: env_num("RL_FREEZE_THRESHOLD", 0.15),
            update_batch_size: env_num("RL_UPDATE_BATCH_SIZE", 10),
            snapshot_interval: env_num("RL_SNAPSHOT_INTERVAL", 5),
            keep_snapshots: env_num("RL_KEEP_SNAPSHOTS", 20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrossMarketConfig {
    pub symbols: Vec<String>,
    pub corr_window_fast: usize,
    pub corr_window_slow: usize,
    pub spread_window: usize,
    pub z_threshold: f64,
    pub beta_window: usize,
    pub corr_broken_low: f64,
    pub corr_broken_high: f64,
    pub min_data_points: usize,
}

impl CrossMarketConfig {
    pub fn from_env() -> Self {
        Self {
            symbols: env_csv("CROSSMARKET_SYMBOLS", &[]),
            corr_window_fast: env_num("CROSSMARKET_CORR_FAST", 20),
            corr_window_slow: env_num("CROSSMARKET_CORR_SLOW", 60),
            spread_window: env_num("CROSSMARKET_SPREAD_WINDOW", 60),
            z_threshold: env_num("CROSSMARKET_Z_THRESHOLD", 2.0),
            beta_window: env_num("CROSSMARKET_BETA_WINDOW", 60),
            corr_broken_low: env_num("CROSSMARKET_CORR_BROKEN_LOW", -0.2),
            corr_broken_high: env_num("CROSSMARKET_CORR_BROKEN_HIGH", 0.2),
            min_data_points: env_num("CROSSMARKET_MIN_DATA_POINTS", 10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub enabled: bool,
    pub csv_path: String,
    pub block_minutes_before: i64,
    pub block_minutes_after: i64,
    pub impact_block: String,
    pub reduce_risk_on_medium: bool,
    pub medium_risk_factor: f64,
}

impl NewsConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: env_bool("NEWS_ENABLED", true),
            csv_path: env_str("NEWS_CSV_PATH", "data/config/news_events.csv"),
            block_minutes_before: env_num("NEWS_BLOCK_MINUTES_BEFORE", 10),
            block_minutes_after: env_num("NEWS_BLOCK_MINUTES_AFTER", 10),
            impact_block: env_str("NEWS_IMPACT_BLOCK", "HIGH"),
            reduce_risk_on_medium: env_bool("NEWS_REDUCE_RISK_ON_MEDIUM", true),
            medium_risk_factor: env_num("NEWS_MEDIUM_RISK_FACTOR", 0.5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiquidityConfig {
    pub zone_expiry_hours: i64,
    pub decay_half_life_tests: f64,
    pub min_tp_strength: f64,
    pub min_rr: f64,
    pub min_runner_confidence: f64,
}

impl LiquidityConfig {
    pub fn from_env() -> Self {
        Self {
            zone_expiry_hours: env_num("LIQUIDITY_ZONE_EXPIRY_HOURS", 72),
            decay_half_life_tests: env_num("LIQUIDITY_DECAY_HALF_LIFE_TESTS", 5.0),
            min_tp_strength: env_num("LIQUIDITY_MIN_TP_STRENGTH", 0.55),
            min_rr: env_num("LIQUIDITY_MIN_RR", 1.5),
            min_runner_confidence: env_num("LIQUIDITY_MIN_RUNNER_CONFIDENCE", 0.65),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub symbol: String,
    pub symbols: Vec<String>,
    pub timeframes: Vec<String>,
    pub db_path: String,
    pub log_path: String,
    pub spread_max: f64,
    pub slippage: f64,
    pub risk_per_trade: f64,
    pub point_value: f64,
    pub min_lot: f64,
    pub lot_step: f64,
    pub enable_live_trading: bool,
    pub live_confirm_key: String,
    pub require_live_ok_file: bool,
    pub broker_tz: String,
    pub session_start: String,
    pub session_end: String,
    pub stale_data_minutes: i64,
    pub use_partial_exits: bool,
    pub break_even_after_tp1: bool,
    pub break_even_offset: f64,
    pub trailing_enabled: bool,
    pub trailing_atr_mult: f64,
    pub trailing_distance: f64,
    pub round_level_step: f64,
    pub chaotic_window: usize,
    pub uncertainty_gate_enabled: bool,
    pub max_model_disagreement: f64,
    pub max_proba_std: f64,
    pub min_global_confidence: f64,
    pub conformal_alpha: f64,
    pub regime_enabled: bool,
    pub transition_enabled: bool,
    pub scalp_tp: f64,
    pub scalp_sl: f64,
    pub scalp_max_hold_minutes: i64,

    pub fill_model: FillModelConfig,
    pub risk: RiskConfig,
    pub capital: CapitalConfig,
    pub rl: RlConfig,
    pub crossmarket: CrossMarketConfig,
    pub news: NewsConfig,
    pub liquidity: LiquidityConfig,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            symbol: env_str("SYMBOL", "EURUSD"),
            symbols: env_csv("SYMBOLS", &["EURUSD"]),
            timeframes: env_csv("TIMEFRAMES", &["M15"]),
            db_path: env_str("DB_PATH", "data/trading_brains.db"),
            log_path: env_str("LOG_PATH", "data/logs/engine.log"),
            spread_max: env_num("SPREAD_MAX", 2.0),
            slippage: env_num("SLIPPAGE", 1.0),
            risk_per_trade: env_num("RISK_PER_TRADE", 0.005),
            point_value: env_num("POINT_VALUE", 1.0),
            min_lot: env_num("MIN_LOT", 1.0),
            lot_step: env_num("LOT_STEP", 1.0),
            enable_live_trading: env_bool("ENABLE_LIVE_TRADING", false),
            live_confirm_key: env_str("LIVE_CONFIRM_KEY", ""),
            require_live_ok_file: env_bool("REQUIRE_LIVE_OK_FILE", true),
            broker_tz: env_str("BROKER_TZ", "UTC"),
            session_start: env_str("SESSION_START", "00:00"),
            session_end: env_str("SESSION_END", "23:59"),
            stale_data_minutes: env_num("STALE_DATA_MINUTES", 30),
            use_partial_exits: env_bool("USE_PARTIAL_EXITS", true),
            break_even_after_tp1: env_bool("BREAK_EVEN_AFTER_TP1", true),
            break_even_offset: env_num("BREAK_EVEN_OFFSET", 0.5),
            trailing_enabled: env_bool("TRAILING_ENABLED", true),
            trailing_atr_mult: env_num("TRAILING_ATR_MULT", 1.5),
            trailing_distance: env_num("TRAILING_DISTANCE", 1.0),
            round_level_step: env_num("ROUND_LEVEL_STEP", 50.0),
            chaotic_window: env_num("CHAOTIC_WINDOW", 10),
            uncertainty_gate_enabled: env_bool("UNCERTAINTY_GATE_ENABLED", true),
            max_model_disagreement: env_num("MAX_MODEL_DISAGREEMENT", 0.3),
            max_proba_std: env_num("MAX_PROBA_STD", 0.2),
            min_global_confidence: env_num("MIN_GLOBAL_CONFIDENCE", 0.55),
            conformal_alpha: env_num("CONFORMAL_ALPHA", 0.1),
            regime_enabled: env_bool("REGIME_ENABLED", true),
            transition_enabled: env_bool("TRANSITION_ENABLED", true),
            scalp_tp: env_num("SCALP_TP", 0.5),
            scalp_sl: env_num("SCALP_SL", 0.3),
            scalp_max_hold_minutes: env_num("SCALP_MAX_HOLD_MINUTES", 15),

            fill_model: FillModelConfig::from_env(),
            risk: RiskConfig::from_env(),
            capital: CapitalConfig::from_env(),
            rl: RlConfig::from_env(),
            crossmarket: CrossMarketConfig::from_env(),
            news: NewsConfig::from_env(),
            liquidity: LiquidityConfig::from_env(),
        }
    }

    /// `live-real` requires a non-default, non-blank confirm key and
    /// (when configured) the `LIVE_OK.txt` control file.
    pub fn validate_live_ready(&self) -> Result<(), String> {
        if self.live_confirm_key.trim().is_empty() || self.live_confirm_key == "CHANGE_ME" {
            return Err("live_confirm_key must not be blank nor the literal default".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_parse_accepts_truthy_variants() {
        std::env::set_var("TEST_BOOL_FLAG", "yes");
        assert!(env_bool("TEST_BOOL_FLAG", false));
        std::env::set_var("TEST_BOOL_FLAG", "0");
        assert!(!env_bool("TEST_BOOL_FLAG", true));
        std::env::remove_var("TEST_BOOL_FLAG");
    }

    #[test]
    fn live_confirm_key_rejects_blank_and_default() {
        let mut cfg = Config::from_env();
        cfg.live_confirm_key = "".into();
        assert!(cfg.validate_live_ready().is_err());
        cfg.live_confirm_key = "CHANGE_ME".into();
        assert!(cfg.validate_live_ready().is_err());
        cfg.live_confirm_key = "a-real-secret".into();
        assert!(cfg.validate_live_ready().is_ok());
    }
}
