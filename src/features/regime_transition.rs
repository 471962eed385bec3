//! Regime Transition Detector
//! Grounded on `regime_transition.py`'s `VALID_TRANSITIONS` adjacency:
//! only certain regime pairs count as a meaningful transition, and a
//! detected transition stays "active" for a short window afterward so
//! downstream gates (capital manager's re-leverage block, in
//! particular) can see it.

use crate::models::Regime;
use chrono::{DateTime, Duration, Utc};

const CONFIDENCE_THRESHOLD: f64 = 0.6;
const ACTIVE_WINDOW_MINUTES: i64 = 10;

fn valid_transitions(from: Regime) -> &'static [Regime] {
    match from {
        Regime::Range => &[Regime::TrendUp, Regime::TrendDown, Regime::HighVol],
        Regime::TrendUp => &[Regime::Exhaustion, Regime::Range, Regime::HighVol],
        Regime::TrendDown => &[Regime::Exhaustion, Regime::Range, Regime::HighVol],
        Regime::Exhaustion => &[Regime::Range, Regime::Chaotic],
        Regime::HighVol => &[Regime::Range, Regime::Chaotic],
        Regime::Chaotic => &[Regime::Range, Regime::Unknown],
        Regime::Unknown => &[Regime::Range, Regime::TrendUp, Regime::TrendDown],
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionEvent {
    pub from: Regime,
    pub to: Regime,
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
}

/// Tracks the last observed regime and, when a valid transition fires,
/// keeps it "active" for `ACTIVE_WINDOW_MINUTES` so a single bar's
/// transition isn't forgotten the instant the regime label updates
/// again next bar.
#[derive(Debug, Default)]
pub struct RegimeTransitionDetector {
    last_regime: Option<Regime>,
    active_event: Option<TransitionEvent>,
}

impl RegimeTransitionDetector {
    pub fn new() -> Self {
        Self { last_regime: None, active_event: None }
    }

    /// Feeds the latest classified regime and its confidence (0..=1).
    /// Returns `Some` only on the bar the transition is first observed.
    pub fn observe(&mut self, regime: Regime, confidence: f64, now: DateTime<Utc>) -> Option<TransitionEvent> {
        let prev = self.last_regime.replace(regime);

        let Some(prev) = prev else {
            return None;
        };
        if prev == regime {
            return None;
        }
        if confidence <= CONFIDENCE_THRESHOLD {
            return None;
        }
        if !valid_transitions(prev).contains(&regime) {
            return None;
        }

        let event = TransitionEvent { from: prev, to: regime, confidence, detected_at: now };
        self.active_event = Some(event.clone());
        Some(event)
    }

    /// True if a valid transition was observed within the last
    /// `ACTIVE_WINDOW_MINUTES` of `now`. The capital manager consults
    /// this to suppress re-leverage during regime churn.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match &self.active_event {
            Some(ev) => now - ev.detected_at <= Duration::minutes(ACTIVE_WINDOW_MINUTES),
            None => false,
        }
    }

    pub fn last_event(&self) -> Option<&TransitionEvent> {
        self.active_event.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_never_fires() {
        let mut det = RegimeTransitionDetector::new();
        assert!(det.observe(Regime::Range, 0.9, Utc::now()).is_none());
    }

    #[test]
    fn low_confidence_transition_is_ignored() {
        let mut det = RegimeTransitionDetector::new();
        det.observe(Regime::Range, 0.9, Utc::now());
        assert!(det.observe(Regime::TrendUp, 0.5, Utc::now()).is_none());
    }

    #[test]
    fn invalid_pair_is_ignored() {
        let mut det = RegimeTransitionDetector::new();
        det.observe(Regime::TrendUp, 0.9, Utc::now());
        // TrendUp -> TrendDown is not in the valid adjacency.
        assert!(det.observe(Regime::TrendDown, 0.9, Utc::now()).is_none());
    }

    #[test]
    fn valid_high_confidence_transition_fires_and_stays_active() {
        let mut det = RegimeTransitionDetector::new();
        let t0 = Utc::now();
        det.observe(Regime::Range, 0.9, t0);
        let event = det.observe(Regime::TrendUp, 0.8, t0).expect("should fire");
        assert_eq!(event.from, Regime::Range);
        assert_eq!(event.to, Regime::TrendUp);
        assert!(det.is_active(t0 + Duration::minutes(5)));
        assert!(!det.is_active(t0 + Duration::minutes(11)));
    }
}
