//! Position Tracker
//! Grounded on `execution/position_tracker.py`: a flat ticket->state
//! map with partial-close support and a reconciliation pass against
//! the broker's own view of open positions.

pub mod sltp;
pub mod sltp_v4;

use crate::models::{PositionState, PositionStatus, Side};
use chrono::Utc;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ReconcileReport {
    /// Tracked as OPEN here but absent from the broker's list — closed
    /// locally as a divergence.
    pub divergences: Vec<u64>,
    /// Open at the broker but not tracked here — surfaced as an alert,
    /// never silently adopted.
    pub missing: Vec<u64>,
    pub reconciled: bool,
}

#[derive(Default)]
pub struct PositionTracker {
    positions: HashMap<u64, PositionState>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self { positions: HashMap::new() }
    }

    pub fn add_from_fill(
        &mut self,
        ticket: u64,
        symbol: &str,
        side: Side,
        volume: f64,
        entry_price: f64,
        sl: Option<f64>,
        tp: Option<f64>,
        magic: u64,
    ) {
        self.positions.insert(
            ticket,
            PositionState {
                ticket,
                symbol: symbol.to_string(),
                side,
                volume,
                entry_price,
                open_time: Utc::now(),
                sl,
                tp,
                status: PositionStatus::Open,
                close_price: None,
                close_time: None,
                pnl: None,
                comment: String::new(),
                magic,
            },
        );
    }

    pub fn get(&self, ticket: u64) -> Option<&PositionState> {
        self.positions.get(&ticket)
    }

    pub fn get_mut(&mut self, ticket: u64) -> Option<&mut PositionState> {
        self.positions.get_mut(&ticket)
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &PositionState> {
        self.positions.values().filter(|p| p.is_open())
    }

    pub fn oldest_open_ticket(&self) -> Option<u64> {
        self.open_positions().min_by_key(|p| p.open_time).map(|p| p.ticket)
    }

    /// Full close if `volume` is absent or covers the remaining size;
    /// otherwise reduces volume and leaves the position OPEN.
    pub fn close(&mut self, ticket: u64, volume: Option<f64>, close_price: Option<f64>) {
        let Some(position) = self.positions.get_mut(&ticket) else { return };
        let requested = volume.unwrap_or(position.volume);
        let price = close_price.unwrap_or(position.entry_price);

        if requested >= position.volume {
            position.status = PositionStatus::Closed;
            position.close_price = Some(price);
            position.close_time = Some(Utc::now());
            position.pnl = Some(position.pnl_at(price));
            position.volume = 0.0;
        } else {
            position.volume -= requested;
        }
    }

    pub fn update_price(&mut self, ticket: u64, current_price: f64) {
        if let Some(position) = self.positions.get_mut(&ticket) {
            if position.is_open() {
                position.pnl = Some(position.pnl_at(current_price));
            }
        }
    }

    /// Compares tracked OPEN tickets against the broker's reported
    /// open tickets. Internal-only tickets get auto-closed as
    /// divergences; broker-only tickets are reported but never
    /// silently adopted into the tracker.
    pub fn reconcile_with_broker(&mut self, broker_open_tickets: &[u64]) -> ReconcileReport {
        let broker_set: std::collections::HashSet<u64> = broker_open_tickets.iter().copied().collect();
        let tracked_open: Vec<u64> = self.open_positions().map(|p| p.ticket).collect();

        let divergences: Vec<u64> = tracked_open.iter().copied().filter(|t| !broker_set.contains(t)).collect();
        let missing: Vec<u64> = broker_open_tickets.iter().copied().filter(|t| !self.positions.contains_key(t)).collect();

        for ticket in &divergences {
            self.close(*ticket, None, None);
        }

        ReconcileReport { reconciled: divergences.is_empty() && missing.is_empty(), divergences, missing }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_close_reduces_volume_without_closing() {
        let mut tracker = PositionTracker::new();
        tracker.add_from_fill(1, "EURUSD", Side::Buy, 3.0, 100.0, Some(99.0), Some(103.0), 1);
        tracker.close(1, Some(1.0), Some(101.0));
        let position = tracker.get(1).unwrap();
        assert!(position.is_open());
        assert_eq!(position.volume, 2.0);
    }

    #[test]
    fn full_close_marks_closed_with_pnl() {
        let mut tracker = PositionTracker::new();
        tracker.add_from_fill(1, "EURUSD", Side::Buy, 1.0, 100.0, Some(99.0), Some(103.0), 1);
        tracker.close(1, None, Some(102.0));
        let position = tracker.get(1).unwrap();
        assert!(!position.is_open());
        assert_eq!(position.pnl, Some(2.0));
    }

    #[test]
    fn reconcile_closes_tracked_only_divergences_and_reports_missing() {
        let mut tracker = PositionTracker::new();
        tracker.add_from_fill(1, "EURUSD", Side::Buy, 1.0, 100.0, Some(99.0), Some(103.0), 1);
        tracker.add_from_fill(2, "EURUSD", Side::Sell, 1.0, 100.0, Some(101.0), Some(97.0), 1);
        let report = tracker.reconcile_with_broker(&[2, 3]);
        assert_eq!(report.divergences, vec![1]);
        assert_eq!(report.missing, vec![3]);
        assert!(!tracker.get(1).unwrap().is_open());
        assert!(!tracker.positions.contains_key(&3));
    }
}
