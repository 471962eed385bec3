//! Three disjoint learners voting on the same feature vector. Each is
//! deliberately simple and deterministic — the point is disagreement
//! measurement, not predictive power.

use nalgebra::DVector;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

trait Learner: Send + Sync {
    fn predict_proba(&self, features: &[f64]) -> f64;
}

/// Logistic-regression-style linear learner over fixed weights.
struct LinearLearner {
    weights: DVector<f64>,
    bias: f64,
}

impl Learner for LinearLearner {
    fn predict_proba(&self, features: &[f64]) -> f64 {
        let n = self.weights.len().min(features.len());
        if n == 0 {
            return 0.5;
        }
        let dot: f64 = (0..n).map(|i| self.weights[i] * features[i]).sum();
        sigmoid(dot + self.bias)
    }
}

/// Single-split decision stump: majority vote across feature signs.
struct TreeLearner {
    thresholds: Vec<f64>,
}

impl Learner for TreeLearner {
    fn predict_proba(&self, features: &[f64]) -> f64 {
        if features.is_empty() {
            return 0.5;
        }
        let votes: f64 = features
            .iter()
            .zip(self.thresholds.iter().cycle())
            .map(|(f, t)| if f > t { 1.0 } else { 0.0 })
            .sum();
        (votes / features.len() as f64).clamp(0.01, 0.99)
    }
}

/// Weighted stump ensemble approximating gradient boosting's additive
/// structure with fixed, decreasing stage weights.
struct BoostedTreeLearner {
    thresholds: Vec<f64>,
    stage_weights: Vec<f64>,
}

impl Learner for BoostedTreeLearner {
    fn predict_proba(&self, features: &[f64]) -> f64 {
        if features.is_empty() {
            return 0.5;
        }
        let mut score = 0.0;
        for (i, f) in features.iter().enumerate() {
            let t = self.thresholds[i % self.thresholds.len().max(1)];
            let w = self.stage_weights[i % self.stage_weights.len().max(1)];
            score += if *f > t { w } else { -w };
        }
        sigmoid(score)
    }
}

#[derive(Debug, Clone)]
pub struct EnsembleOutput {
    pub prediction: u8,
    pub per_model_probas: Vec<f64>,
    pub proba_mean: f64,
    pub proba_std: f64,
    pub disagreement: f64,
}

pub struct Ensemble {
    learners: Vec<Box<dyn Learner>>,
}

impl Ensemble {
    /// Builds the default three-learner panel over `n_features`
    /// inputs with evenly-spaced thresholds and decaying boost weights.
    pub fn with_defaults(n_features: usize) -> Self {
        let weights = DVector::from_iterator(n_features, (0..n_features).map(|i| 1.0 / (i as f64 + 1.0)));
        let thresholds: Vec<f64> = (0..n_features.max(1)).map(|i| (i as f64) * 0.1).collect();
        let stage_weights: Vec<f64> = (0..n_features.max(1)).map(|i| 1.0 / (i as f64 + 2.0)).collect();

        Self {
            learners: vec![
                Box::new(LinearLearner { weights, bias: 0.0 }),
                Box::new(TreeLearner { thresholds: thresholds.clone() }),
                Box::new(BoostedTreeLearner { thresholds, stage_weights }),
            ],
        }
    }

    pub fn predict(&self, features: &[f64]) -> EnsembleOutput {
        let probas: Vec<f64> = self.learners.iter().map(|l| l.predict_proba(features)).collect();
        let mean = probas.iter().sum::<f64>() / probas.len() as f64;
        let variance = probas.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / probas.len() as f64;
        let std = variance.sqrt();
        let mean_clamped = mean.max(1e-6);
        EnsembleOutput {
            prediction: if mean >= 0.5 { 1 } else { 0 },
            per_model_probas: probas,
            proba_mean: mean,
            proba_std: std,
            disagreement: std / mean_clamped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreeing_learners_have_low_disagreement() {
        let ensemble = Ensemble::with_defaults(4);
        let output = ensemble.predict(&[0.0, 0.0, 0.0, 0.0]);
        assert!(output.per_model_probas.len() == 3);
        assert!(output.disagreement >= 0.0);
    }

    #[test]
    fn strong_positive_features_push_prediction_up() {
        let ensemble = Ensemble::with_defaults(4);
        let output = ensemble.predict(&[5.0, 5.0, 5.0, 5.0]);
        assert!(output.proba_mean > 0.4);
    }
}
