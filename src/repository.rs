//! Repository
//! Grounded on `signals/db_storage.rs`: a single `rusqlite::Connection`
//! behind a `parking_lot::Mutex`, schema created idempotently at
//! startup, and JSON payload columns for per-event metadata.

use crate::meta::MetaDecision;
use crate::models::{BrainPerformanceRecord, Candle, Decision, PolicySnapshot, PositionState, Regime};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::sync::Arc;
use tracing::info;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS candles (
    symbol TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    open_time TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume REAL NOT NULL,
    PRIMARY KEY (symbol, timeframe, open_time)
);

CREATE TABLE IF NOT EXISTS brain_signals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    bar_time TEXT NOT NULL,
    brain_id TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_brain_signals_symbol_time ON brain_signals(symbol, bar_time DESC);

CREATE TABLE IF NOT EXISTS decisions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    bar_time TEXT NOT NULL,
    action TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_decisions_symbol_time ON decisions(symbol, bar_time DESC);

CREATE TABLE IF NOT EXISTS trades (
    ticket INTEGER PRIMARY KEY,
    symbol TEXT NOT NULL,
    side TEXT NOT NULL,
    volume REAL NOT NULL,
    entry_price REAL NOT NULL,
    open_time TEXT NOT NULL,
    close_price REAL,
    close_time TEXT,
    pnl REAL,
    status TEXT NOT NULL,
    payload_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_trades_status ON trades(status);

CREATE TABLE IF NOT EXISTS order_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket INTEGER,
    event_type TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS risk_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reason TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_trail (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    action TEXT NOT NULL,
    success INTEGER NOT NULL,
    reason TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS liquidity_levels (
    symbol TEXT NOT NULL,
    source TEXT NOT NULL,
    price_center REAL NOT NULL,
    payload_json TEXT NOT NULL,
    last_tested TEXT,
    PRIMARY KEY (symbol, source, price_center)
);

CREATE TABLE IF NOT EXISTS regime_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    bar_time TEXT NOT NULL,
    regime TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_regime_log_symbol_time ON regime_log(symbol, bar_time DESC);

CREATE TABLE IF NOT EXISTS regime_transitions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    from_regime TEXT NOT NULL,
    to_regime TEXT NOT NULL,
    confidence REAL NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS calibration_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    method TEXT NOT NULL,
    ece REAL NOT NULL,
    mce REAL NOT NULL,
    brier REAL NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS brain_performance (
    regime TEXT NOT NULL,
    brain_id TEXT NOT NULL,
    win_rate REAL NOT NULL,
    profit_factor REAL NOT NULL,
    avg_rr REAL NOT NULL,
    total_trades INTEGER NOT NULL,
    total_pnl REAL NOT NULL,
    max_drawdown REAL NOT NULL,
    confidence REAL NOT NULL,
    last_update TEXT NOT NULL,
    PRIMARY KEY (regime, brain_id)
);

CREATE TABLE IF NOT EXISTS meta_decisions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    regime TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rl_policy_snapshots (
    id INTEGER PRIMARY KEY,
    regime TEXT NOT NULL,
    taken_at TEXT NOT NULL,
    mean_reward REAL NOT NULL,
    sample_count INTEGER NOT NULL,
    table_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rl_snapshots_regime ON rl_policy_snapshots(regime, taken_at DESC);
"#;

/// Idempotent append/upsert persistence for every entity in the data
/// model, plus the typed fetches the boss loop and reports need.
pub trait Repository: Send + Sync {
    fn append_candle(&self, symbol: &str, timeframe: &str, candle: &Candle) -> Result<()>;
    fn append_brain_signal(&self, symbol: &str, bar_time: DateTime<Utc>, brain_id: &str, payload_json: &str) -> Result<()>;
    fn append_decision(&self, symbol: &str, bar_time: DateTime<Utc>, decision: &Decision) -> Result<()>;
    fn upsert_trade(&self, position: &PositionState) -> Result<()>;
    fn append_risk_event(&self, reason: &str, payload_json: &str) -> Result<()>;
    fn append_audit_entry(&self, action: &str, success: bool, reason: Option<&str>) -> Result<()>;
    fn append_regime_log(&self, symbol: &str, bar_time: DateTime<Utc>, regime: Regime) -> Result<()>;
    fn upsert_brain_performance(&self, record: &BrainPerformanceRecord) -> Result<()>;
    fn append_policy_snapshot(&self, snapshot: &PolicySnapshot) -> Result<()>;
    fn append_meta_decision(&self, regime: Regime, decision: &MetaDecision) -> Result<()>;

    fn fetch_latest_decisions(&self, symbol: &str, limit: usize) -> Result<Vec<String>>;
    fn fetch_open_positions(&self) -> Result<Vec<PositionState>>;
}

pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).with_context(|| format!("failed to open database at {db_path}"))?;
        conn.execute_batch(SCHEMA_SQL).context("failed to initialize schema")?;
        info!(db_path, "repository schema ready");
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        conn.execute_batch(SCHEMA_SQL).context("failed to initialize schema")?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }
}

impl Repository for SqliteRepository {
    fn append_candle(&self, symbol: &str, timeframe: &str, candle: &Candle) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO candles (symbol, timeframe, open_time, open, high, low, close, volume)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![symbol, timeframe, candle.time.to_rfc3339(), candle.open, candle.high, candle.low, candle.close, candle.tick_volume],
        )?;
        Ok(())
    }

    fn append_brain_signal(&self, symbol: &str, bar_time: DateTime<Utc>, brain_id: &str, payload_json: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO brain_signals (symbol, bar_time, brain_id, payload_json, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![symbol, bar_time.to_rfc3339(), brain_id, payload_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn append_decision(&self, symbol: &str, bar_time: DateTime<Utc>, decision: &Decision) -> Result<()> {
        let conn = self.conn.lock();
        let payload_json = serde_json::to_string(decision)?;
        conn.execute(
            "INSERT INTO decisions (symbol, bar_time, action, payload_json, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![symbol, bar_time.to_rfc3339(), format!("{:?}", decision.action), payload_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn upsert_trade(&self, position: &PositionState) -> Result<()> {
        let conn = self.conn.lock();
        let payload_json = serde_json::to_string(position)?;
        conn.execute(
            "INSERT INTO trades (ticket, symbol, side, volume, entry_price, open_time, close_price, close_time, pnl, status, payload_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(ticket) DO UPDATE SET
                volume=excluded.volume, close_price=excluded.close_price, close_time=excluded.close_time,
                pnl=excluded.pnl, status=excluded.status, payload_json=excluded.payload_json",
            params![
                position.ticket as i64,
                position.symbol,
                format!("{:?}", position.side),
                position.volume,
                position.entry_price,
                position.open_time.to_rfc3339(),
                position.close_price,
                position.close_time.map(|t| t.to_rfc3339()),
                position.pnl,
                format!("{:?}", position.status),
                payload_json,
            ],
        )?;
        Ok(())
    }

    fn append_risk_event(&self, reason: &str, payload_json: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO risk_events (reason, payload_json, created_at) VALUES (?1, ?2, ?3)",
            params![reason, payload_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn append_audit_entry(&self, action: &str, success: bool, reason: Option<&str>) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO audit_trail (action, success, reason, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![action, success as i64, reason, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn append_regime_log(&self, symbol: &str, bar_time: DateTime<Utc>, regime: Regime) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO regime_log (symbol, bar_time, regime, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![symbol, bar_time.to_rfc3339(), regime.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn upsert_brain_performance(&self, record: &BrainPerformanceRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO brain_performance (regime, brain_id, win_rate, profit_factor, avg_rr, total_trades, total_pnl, max_drawdown, confidence, last_update)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(regime, brain_id) DO UPDATE SET
                win_rate=excluded.win_rate, profit_factor=excluded.profit_factor, avg_rr=excluded.avg_rr,
                total_trades=excluded.total_trades, total_pnl=excluded.total_pnl, max_drawdown=excluded.max_drawdown,
                confidence=excluded.confidence, last_update=excluded.last_update",
            params![
                record.regime.as_str(),
                record.brain_id,
                record.win_rate,
                record.profit_factor,
                record.avg_rr,
                record.total_trades as i64,
                record.total_pnl,
                record.max_drawdown,
                record.confidence,
                record.last_update.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn append_policy_snapshot(&self, snapshot: &PolicySnapshot) -> Result<()> {
        let conn = self.conn.lock();
        let table_json = serde_json::to_string(&snapshot.table)?;
        conn.execute(
            "INSERT OR REPLACE INTO rl_policy_snapshots (id, regime, taken_at, mean_reward, sample_count, table_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                snapshot.id as i64,
                snapshot.regime.as_str(),
                snapshot.taken_at.to_rfc3339(),
                snapshot.mean_reward,
                snapshot.sample_count as i64,
                table_json,
            ],
        )?;
        Ok(())
    }

    fn append_meta_decision(&self, regime: Regime, decision: &MetaDecision) -> Result<()> {
        let conn = self.conn.lock();
        let payload_json = serde_json::to_string(decision)?;
        conn.execute(
            "INSERT INTO meta_decisions (regime, payload_json, created_at) VALUES (?1, ?2, ?3)",
            params![regime.as_str(), payload_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn fetch_latest_decisions(&self, symbol: &str, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT payload_json FROM decisions WHERE symbol = ?1 ORDER BY bar_time DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![symbol, limit as i64], |row| row.get::<_, String>(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn fetch_open_positions(&self) -> Result<Vec<PositionState>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT payload_json FROM trades WHERE status = 'Open'")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows.filter_map(|r| r.ok()) {
            if let Ok(position) = serde_json::from_str::<PositionState>(&row) {
                out.push(position);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Decision, DecisionAction, Side};

    #[test]
    fn schema_initializes_on_in_memory_db() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let candle = Candle { time: Utc::now(), open: 1.0, high: 1.1, low: 0.9, close: 1.05, tick_volume: 100.0 };
        repo.append_candle("EURUSD", "M15", &candle).unwrap();
    }

    #[test]
    fn trade_upsert_then_fetch_open_roundtrips() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let position = PositionState {
            ticket: 1,
            symbol: "EURUSD".into(),
            side: Side::Buy,
            volume: 1.0,
            entry_price: 100.0,
            open_time: Utc::now(),
            sl: Some(99.0),
            tp: Some(103.0),
            status: crate::models::PositionStatus::Open,
            close_price: None,
            close_time: None,
            pnl: None,
            comment: String::new(),
            magic: 1,
        };
        repo.upsert_trade(&position).unwrap();
        let open = repo.fetch_open_positions().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].ticket, 1);
    }

    #[test]
    fn decision_append_and_fetch() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let decision = Decision::skip("no signals");
        repo.append_decision("EURUSD", Utc::now(), &decision).unwrap();
        let latest = repo.fetch_latest_decisions("EURUSD", 10).unwrap();
        assert_eq!(latest.len(), 1);
        assert!(matches!(decision.action, DecisionAction::Skip));
    }
}
