//! Order Router
//! Grounded on spec §4.9 and the teacher's `vault/execution.rs`
//! `ExecutionAdapter` async-trait split between a paper/sim adapter
//! and a live client adapter.

use crate::error::{EngineError, EngineResult};
use crate::execution::fill_model::{FillModel, FillOutcome};
use crate::models::{PositionState, PositionStatus, Side};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub entry: f64,
    pub sl: f64,
    pub tp: f64,
    pub atr: f64,
    pub magic: u64,
    pub comment: String,
}

impl PlaceOrderRequest {
    /// Side-aware bracket ordering plus basic sanity: only the
    /// execution engine is allowed to construct this, and only after
    /// this passes.
    pub fn validate(&self) -> EngineResult<()> {
        if self.volume <= 0.0 {
            return Err(EngineError::Validation(format!("volume must be positive, got {}", self.volume)));
        }
        let ok = match self.side {
            Side::Buy => self.sl < self.entry && self.entry < self.tp,
            Side::Sell => self.tp < self.entry && self.entry < self.sl,
        };
        if !ok {
            return Err(EngineError::Validation(format!(
                "bracket invalid for {:?}: sl={} entry={} tp={}",
                self.side, self.sl, self.entry, self.tp
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderResult {
    Filled { ticket: u64, price: f64 },
    Rejected { reason: String },
    Error { reason: String },
}

#[async_trait]
pub trait OrderRouter: Send + Sync {
    async fn place_order(&self, request: PlaceOrderRequest) -> EngineResult<OrderResult>;
    async fn modify_order(&self, ticket: u64, sl: Option<f64>, tp: Option<f64>) -> EngineResult<()>;
    async fn close_position(&self, ticket: u64, volume: Option<f64>, close_price: f64) -> EngineResult<OrderResult>;
    async fn get_position(&self, ticket: u64) -> EngineResult<Option<PositionState>>;
    async fn get_all_positions(&self) -> EngineResult<Vec<PositionState>>;
}

/// Assigns tickets from a monotonic counter and prices fills through
/// the shared fill model; never touches a real broker.
pub struct SimOrderRouter {
    fill_model: FillModel,
    next_ticket: AtomicU64,
    positions: Mutex<HashMap<u64, PositionState>>,
}

impl SimOrderRouter {
    pub fn new(fill_model: FillModel) -> Self {
        Self { fill_model, next_ticket: AtomicU64::new(1), positions: Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl OrderRouter for SimOrderRouter {
    async fn place_order(&self, request: PlaceOrderRequest) -> EngineResult<OrderResult> {
        request.validate()?;
        let mut rng = rand::thread_rng();
        match self.fill_model.simulate_fill(request.entry, request.atr, request.side, false, &mut rng) {
            FillOutcome::Rejected => Ok(OrderResult::Rejected { reason: "simulated rejection".to_string() }),
            FillOutcome::Filled { price, .. } => {
                let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
                let position = PositionState {
                    ticket,
                    symbol: request.symbol,
                    side: request.side,
                    volume: request.volume,
                    entry_price: price,
                    open_time: Utc::now(),
                    sl: Some(request.sl),
                    tp: Some(request.tp),
                    status: PositionStatus::Open,
                    close_price: None,
                    close_time: None,
                    pnl: None,
                    comment: request.comment,
                    magic: request.magic,
                };
                self.positions.lock().insert(ticket, position);
                Ok(OrderResult::Filled { ticket, price })
            }
        }
    }

    async fn modify_order(&self, ticket: u64, sl: Option<f64>, tp: Option<f64>) -> EngineResult<()> {
        let mut positions = self.positions.lock();
        let position = positions
            .get_mut(&ticket)
            .ok_or_else(|| EngineError::Validation(format!("unknown ticket {ticket}")))?;
        if sl.is_some() {
            position.sl = sl;
        }
        if tp.is_some() {
            position.tp = tp;
        }
        Ok(())
    }

    async fn close_position(&self, ticket: u64, volume: Option<f64>, close_price: f64) -> EngineResult<OrderResult> {
        let mut positions = self.positions.lock();
        let position = positions
            .get_mut(&ticket)
            .ok_or_else(|| EngineError::Validation(format!("unknown ticket {ticket}")))?;

        let requested_volume = volume.unwrap_or(position.volume);
        if requested_volume >= position.volume {
            position.status = PositionStatus::Closed;
            position.close_price = Some(close_price);
            position.close_time = Some(Utc::now());
            position.pnl = Some(position.pnl_at(close_price));
            position.volume = 0.0;
        } else {
            position.volume -= requested_volume;
        }
        Ok(OrderResult::Filled { ticket, price: close_price })
    }

    async fn get_position(&self, ticket: u64) -> EngineResult<Option<PositionState>> {
        Ok(self.positions.lock().get(&ticket).cloned())
    }

    async fn get_all_positions(&self) -> EngineResult<Vec<PositionState>> {
        Ok(self.positions.lock().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::fill_model::FillModelConfig;

    fn valid_buy_request() -> PlaceOrderRequest {
        PlaceOrderRequest {
            symbol: "EURUSD".into(),
            side: Side::Buy,
            volume: 1.0,
            entry: 100.0,
            sl: 99.0,
            tp: 102.0,
            atr: 0.5,
            magic: 1,
            comment: "test".into(),
        }
    }

    #[test]
    fn buy_bracket_validates() {
        assert!(valid_buy_request().validate().is_ok());
    }

    #[test]
    fn inverted_buy_bracket_fails_validation() {
        let mut req = valid_buy_request();
        req.sl = 103.0;
        assert!(req.validate().is_err());
    }

    #[tokio::test]
    async fn sim_router_assigns_monotonic_tickets() {
        let router = SimOrderRouter::new(FillModel::new(FillModelConfig { rejection_prob: 0.0, ..FillModelConfig::default() }));
        let first = router.place_order(valid_buy_request()).await.unwrap();
        let second = router.place_order(valid_buy_request()).await.unwrap();
        match (first, second) {
            (OrderResult::Filled { ticket: t1, .. }, OrderResult::Filled { ticket: t2, .. }) => assert!(t2 > t1),
            _ => panic!("expected both fills"),
        }
    }
}
