//! Execution Engine
//! Grounded on spec §4.7: the sole owner of `PlaceOrderRequest`
//! construction and `router.place_order` calls, with an audit trace
//! per decision.

pub mod fill_model;
pub mod router;

use crate::error::EngineResult;
use crate::models::{Decision, DecisionAction};
use crate::position::PositionTracker;
use crate::position::sltp::SlTpManager;
use fill_model::FillModel;
use router::{OrderResult, OrderRouter, PlaceOrderRequest};

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: DecisionAction,
    pub success: bool,
    pub reason: String,
}

pub struct ExecutionEngine<R: OrderRouter> {
    router: R,
    fill_model: FillModel,
    audit_log: Vec<AuditEntry>,
}

impl<R: OrderRouter> ExecutionEngine<R> {
    pub fn new(router: R, fill_model: FillModel) -> Self {
        Self { router, fill_model, audit_log: Vec::new() }
    }

    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit_log
    }

    fn audit(&mut self, action: DecisionAction, success: bool, reason: impl Into<String>) {
        self.audit_log.push(AuditEntry { action, success, reason: reason.into() });
    }

    /// Runs one tick's decision against the router. `atr` feeds the
    /// fill model's spread estimate; `magic` tags the order for this
    /// strategy instance.
    pub async fn process(
        &mut self,
        decision: Decision,
        tracker: &mut PositionTracker,
        sltp: &mut SlTpManager,
        symbol: &str,
        atr: f64,
        magic: u64,
    ) -> EngineResult<()> {
        match decision.action {
            DecisionAction::Skip => {
                self.audit(DecisionAction::Skip, true, decision.reason);
                Ok(())
            }
            DecisionAction::Close => {
                if let Some(oldest) = tracker.oldest_open_ticket() {
                    let position = tracker.get(oldest).cloned();
                    let close_price = position.map(|p| p.entry_price).unwrap_or(0.0);
                    match self.router.close_position(oldest, None, close_price).await {
                        Ok(OrderResult::Filled { price, .. }) => {
                            tracker.close(oldest, None, Some(price));
                            self.audit(DecisionAction::Close, true, format!("closed ticket {oldest}"));
                        }
                        Ok(OrderResult::Rejected { reason }) | Ok(OrderResult::Error { reason }) => {
                            self.audit(DecisionAction::Close, false, reason);
                        }
                        Err(e) => self.audit(DecisionAction::Close, false, e.to_string()),
                    }
                } else {
                    self.audit(DecisionAction::Close, false, "no open position to close");
                }
                Ok(())
            }
            DecisionAction::Enter => {
                let (side, entry, sl, tp1, tp2, size) = match (
                    decision.side,
                    decision.entry,
                    decision.sl,
                    decision.tp1,
                    decision.tp2,
                    decision.size,
                ) {
                    (Some(s), Some(e), Some(sl), Some(tp1), Some(tp2), Some(sz)) => (s, e, sl, tp1, tp2, sz),
                    _ => {
                        self.audit(DecisionAction::Enter, false, "incomplete ENTER decision");
                        return Ok(());
                    }
                };

                let request = PlaceOrderRequest {
                    symbol: symbol.to_string(),
                    side,
                    volume: size,
                    entry,
                    sl,
                    tp: tp1,
                    atr,
                    magic,
                    comment: decision.reason.clone(),
                };

                match self.router.place_order(request).await {
                    Ok(OrderResult::Filled { ticket, price }) => {
                        tracker.add_from_fill(ticket, symbol, side, size, price, Some(sl), Some(tp1), magic);
                        sltp.install(ticket, side, price, sl, tp1, tp2);
                        self.audit(DecisionAction::Enter, true, format!("filled ticket {ticket} at {price}"));
                    }
                    Ok(OrderResult::Rejected { reason }) => {
                        self.audit(DecisionAction::Enter, false, format!("rejected: {reason}"));
                    }
                    Ok(OrderResult::Error { reason }) => {
                        self.audit(DecisionAction::Enter, false, format!("error: {reason}"));
                    }
                    Err(e) => self.audit(DecisionAction::Enter, false, e.to_string()),
                }
                Ok(())
            }
        }
    }

    /// Closes a fraction of an open ticket through the router, used by
    /// the bar loop when the SL/TP manager reports a crossed TP level.
    pub async fn apply_partial_close(
        &mut self,
        ticket: u64,
        fraction: f64,
        tracker: &mut PositionTracker,
    ) -> EngineResult<()> {
        let Some(position) = tracker.get(ticket).cloned() else {
            self.audit(DecisionAction::Close, false, format!("partial close on unknown ticket {ticket}"));
            return Ok(());
        };
        let volume = position.volume * fraction;
        match self.router.close_position(ticket, Some(volume), position.entry_price).await {
            Ok(OrderResult::Filled { price, .. }) => {
                tracker.close(ticket, Some(volume), Some(price));
                self.audit(DecisionAction::Close, true, format!("partial close {volume} on ticket {ticket}"));
            }
            Ok(OrderResult::Rejected { reason }) | Ok(OrderResult::Error { reason }) => {
                self.audit(DecisionAction::Close, false, reason);
            }
            Err(e) => self.audit(DecisionAction::Close, false, e.to_string()),
        }
        Ok(())
    }

    /// Pushes a ratcheted stop to the router after the SL/TP manager
    /// advances a ticket's trailing stop.
    pub async fn update_stop(&mut self, ticket: u64, new_sl: f64) -> EngineResult<()> {
        self.router.modify_order(ticket, Some(new_sl), None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::fill_model::FillModelConfig;
    use crate::execution::router::SimOrderRouter;
    use crate::models::Decision;
    use crate::position::sltp::SlTpConfig;

    #[tokio::test]
    async fn skip_decision_writes_audit_only() {
        let router = SimOrderRouter::new(FillModel::new(FillModelConfig::default()));
        let mut engine = ExecutionEngine::new(router, FillModel::new(FillModelConfig::default()));
        let mut tracker = PositionTracker::new();
        let mut sltp = SlTpManager::new(SlTpConfig::default());
        engine.process(Decision::skip("nothing to do"), &mut tracker, &mut sltp, "EURUSD", 0.5, 1).await.unwrap();
        assert_eq!(engine.audit_log().len(), 1);
        assert!(engine.audit_log()[0].success);
    }

    #[tokio::test]
    async fn enter_decision_with_missing_fields_is_audited_as_failure() {
        let router = SimOrderRouter::new(FillModel::new(FillModelConfig::default()));
        let mut engine = ExecutionEngine::new(router, FillModel::new(FillModelConfig::default()));
        let mut tracker = PositionTracker::new();
        let mut sltp = SlTpManager::new(SlTpConfig::default());
        let mut decision = Decision::skip("placeholder");
        decision.action = DecisionAction::Enter;
        engine.process(decision, &mut tracker, &mut sltp, "EURUSD", 0.5, 1).await.unwrap();
        assert!(!engine.audit_log()[0].success);
    }
}
