//! Split conformal prediction over a binary label space. Calibration
//! scores are nonconformity = 1 − proba(true class); the (1−α)
//! empirical quantile of those scores becomes the inclusion threshold
//! for new points.

#[derive(Debug, Clone)]
pub struct ConformalSet {
    pub classes: Vec<u8>,
    pub ambiguous: bool,
}

pub struct ConformalPredictor {
    threshold: f64,
    alpha: f64,
}

impl ConformalPredictor {
    /// `calibration_scores` are per-example `(proba_class0, proba_class1, true_label)`.
    pub fn fit(calibration_scores: &[(f64, f64, u8)], alpha: f64) -> Self {
        let mut nonconformity: Vec<f64> = calibration_scores
            .iter()
            .map(|(p0, p1, label)| 1.0 - if *label == 0 { *p0 } else { *p1 })
            .collect();
        nonconformity.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let threshold = if nonconformity.is_empty() {
            1.0
        } else {
            let n = nonconformity.len() as f64;
            let rank = (((n + 1.0) * (1.0 - alpha)).ceil() as usize).clamp(1, nonconformity.len());
            nonconformity[rank - 1]
        };

        Self { threshold, alpha }
    }

    /// Returns the set of classes whose nonconformity score (1 − proba)
    /// does not exceed the fitted threshold. A set of size != 1 is
    /// ambiguous (either the model is unsure between both classes, or
    /// it rejects both).
    pub fn predict_set(&self, proba_class0: f64, proba_class1: f64) -> ConformalSet {
        let mut classes = Vec::new();
        if 1.0 - proba_class0 <= self.threshold {
            classes.push(0);
        }
        if 1.0 - proba_class1 <= self.threshold {
            classes.push(1);
        }
        ConformalSet { ambiguous: classes.len() != 1, classes }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confident_correct_calibration_yields_tight_threshold() {
        let data = vec![(0.95, 0.05, 0u8), (0.05, 0.95, 1u8), (0.9, 0.1, 0u8), (0.1, 0.9, 1u8)];
        let predictor = ConformalPredictor::fit(&data, 0.1);
        let set = predictor.predict_set(0.95, 0.05);
        assert!(!set.ambiguous);
        assert_eq!(set.classes, vec![0]);
    }

    #[test]
    fn ambiguous_prediction_near_decision_boundary() {
        let data = vec![(0.5, 0.5, 0u8), (0.5, 0.5, 1u8), (0.6, 0.4, 0u8), (0.4, 0.6, 1u8)];
        let predictor = ConformalPredictor::fit(&data, 0.5);
        let set = predictor.predict_set(0.5, 0.5);
        assert!(set.ambiguous);
    }

    #[test]
    fn empty_calibration_set_defaults_to_permissive_threshold() {
        let predictor = ConformalPredictor::fit(&[], 0.1);
        let set = predictor.predict_set(0.5, 0.5);
        assert_eq!(set.classes.len(), 2);
    }
}
