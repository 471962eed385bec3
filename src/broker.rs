//! Broker/market adapter
//! Grounded on spec §6's external interface and, for the async/trait
//! shape, `execution/router.rs`'s `OrderRouter`: a thin seam between
//! the engine and whatever terminal actually holds the account.

use crate::models::Candle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct OrderReceipt {
    pub ticket: u64,
    pub retcode: i32,
    pub filled_price: f64,
    pub reason: String,
}

impl OrderReceipt {
    pub fn is_success(&self) -> bool {
        self.retcode == 0
    }
}

#[derive(Debug, Clone)]
pub struct ModifyReceipt {
    pub retcode: i32,
}

#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    async fn connect(&self) -> bool;
    async fn ensure_symbol(&self, symbol: &str) -> bool;
    async fn fetch_rates(&self, symbol: &str, timeframe: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> anyhow::Result<Vec<Candle>>;
    async fn fetch_latest_rates(&self, symbol: &str, timeframe: &str, n: usize) -> anyhow::Result<Vec<Candle>>;
    #[allow(clippy::too_many_arguments)]
    async fn place_order(
        &self,
        symbol: &str,
        side: crate::models::Side,
        volume: f64,
        price: f64,
        sl: f64,
        tp: f64,
        comment: &str,
        magic: u64,
    ) -> anyhow::Result<OrderReceipt>;
    async fn modify_order(&self, ticket: u64, sl: Option<f64>, tp: Option<f64>) -> anyhow::Result<ModifyReceipt>;
    async fn close_position(&self, ticket: u64, volume: f64) -> anyhow::Result<OrderReceipt>;
    async fn shutdown(&self);
}

/// In-process adapter over the sim router and fill model, used by
/// `live-sim` and backtests. Holds no real account state.
pub struct SimBrokerAdapter {
    router: crate::execution::router::SimOrderRouter,
    atr_estimate: f64,
}

impl SimBrokerAdapter {
    pub fn new(fill_model: crate::execution::fill_model::FillModel, atr_estimate: f64) -> Self {
        Self { router: crate::execution::router::SimOrderRouter::new(fill_model), atr_estimate }
    }
}

#[async_trait]
impl BrokerAdapter for SimBrokerAdapter {
    async fn connect(&self) -> bool {
        true
    }

    async fn ensure_symbol(&self, _symbol: &str) -> bool {
        true
    }

    async fn fetch_rates(&self, _symbol: &str, _timeframe: &str, _from: DateTime<Utc>, _to: DateTime<Utc>) -> anyhow::Result<Vec<Candle>> {
        Ok(Vec::new())
    }

    async fn fetch_latest_rates(&self, _symbol: &str, _timeframe: &str, _n: usize) -> anyhow::Result<Vec<Candle>> {
        Ok(Vec::new())
    }

    async fn place_order(
        &self,
        symbol: &str,
        side: crate::models::Side,
        volume: f64,
        price: f64,
        sl: f64,
        tp: f64,
        comment: &str,
        magic: u64,
    ) -> anyhow::Result<OrderReceipt> {
        use crate::execution::router::{OrderResult, OrderRouter, PlaceOrderRequest};

        let request = PlaceOrderRequest {
            symbol: symbol.to_string(),
            side,
            volume,
            entry: price,
            sl,
            tp,
            atr: self.atr_estimate,
            magic,
            comment: comment.to_string(),
        };
        let result = self.router.place_order(request).await?;
        Ok(match result {
            OrderResult::Filled { ticket, price } => OrderReceipt { ticket, retcode: 0, filled_price: price, reason: "filled".into() },
            OrderResult::Rejected { reason } => OrderReceipt { ticket: 0, retcode: 1, filled_price: 0.0, reason },
            OrderResult::Error { reason } => OrderReceipt { ticket: 0, retcode: 2, filled_price: 0.0, reason },
        })
    }

    async fn modify_order(&self, ticket: u64, sl: Option<f64>, tp: Option<f64>) -> anyhow::Result<ModifyReceipt> {
        use crate::execution::router::OrderRouter;

        match self.router.modify_order(ticket, sl, tp).await {
            Ok(()) => Ok(ModifyReceipt { retcode: 0 }),
            Err(_) => Ok(ModifyReceipt { retcode: 1 }),
        }
    }

    async fn close_position(&self, ticket: u64, volume: f64) -> anyhow::Result<OrderReceipt> {
        use crate::execution::router::{OrderResult, OrderRouter};

        let Ok(Some(position)) = self.router.get_position(ticket).await else {
            return Ok(OrderReceipt { ticket, retcode: 1, filled_price: 0.0, reason: "unknown ticket".into() });
        };
        let result = self.router.close_position(ticket, Some(volume), position.entry_price).await?;
        Ok(match result {
            OrderResult::Filled { ticket, price } => OrderReceipt { ticket, retcode: 0, filled_price: price, reason: "closed".into() },
            OrderResult::Rejected { reason } => OrderReceipt { ticket, retcode: 1, filled_price: 0.0, reason },
            OrderResult::Error { reason } => OrderReceipt { ticket, retcode: 2, filled_price: 0.0, reason },
        })
    }

    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::fill_model::{FillModel, FillModelConfig};
    use crate::models::Side;

    #[tokio::test]
    async fn sim_broker_round_trips_an_order() {
        let adapter = SimBrokerAdapter::new(FillModel::new(FillModelConfig { rejection_prob: 0.0, ..FillModelConfig::default() }), 0.5);
        let receipt = adapter.place_order("EURUSD", Side::Buy, 1.0, 100.0, 99.0, 102.0, "test", 42).await.unwrap();
        assert!(receipt.is_success());
        let close = adapter.close_position(receipt.ticket, 1.0).await.unwrap();
        assert!(close.is_success());
    }
}
