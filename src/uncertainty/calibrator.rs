//! Platt-scaling calibrator with reliability-diagnostic reporting
//! (ECE/MCE/Brier). Isotonic regression is offered as the monotone,
//! non-parametric alternative via pool-adjacent-violators.

const PLATT_LEARNING_RATE: f64 = 0.1;
const PLATT_ITERATIONS: usize = 200;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Clone, Copy)]
pub enum CalibrationMethod {
    Platt,
    Isotonic,
}

#[derive(Debug, Clone)]
pub struct CalibrationReport {
    pub ece: f64,
    pub mce: f64,
    pub brier: f64,
}

pub struct Calibrator {
    method: CalibrationMethod,
    platt_a: f64,
    platt_b: f64,
    isotonic_points: Vec<(f64, f64)>,
}

impl Calibrator {
    /// Fits on a held-out `(raw_proba, outcome)` set, `outcome` in
    /// {0.0, 1.0}.
    pub fn fit(method: CalibrationMethod, calibration_set: &[(f64, f64)]) -> Self {
        match method {
            CalibrationMethod::Platt => {
                let (a, b) = fit_platt(calibration_set);
                Self { method, platt_a: a, platt_b: b, isotonic_points: Vec::new() }
            }
            CalibrationMethod::Isotonic => {
                let points = fit_isotonic(calibration_set);
                Self { method, platt_a: 1.0, platt_b: 0.0, isotonic_points: points }
            }
        }
    }

    pub fn calibrate(&self, raw_proba: f64) -> f64 {
        match self.method {
            CalibrationMethod::Platt => sigmoid(self.platt_a * raw_proba + self.platt_b),
            CalibrationMethod::Isotonic => isotonic_lookup(&self.isotonic_points, raw_proba),
        }
    }

    pub fn report(&self, held_out: &[(f64, f64)]) -> CalibrationReport {
        reliability_report(held_out, |raw| self.calibrate(raw))
    }
}

fn fit_platt(data: &[(f64, f64)]) -> (f64, f64) {
    let mut a = 1.0;
    let mut b = 0.0;
    if data.is_empty() {
        return (a, b);
    }
    for _ in 0..PLATT_ITERATIONS {
        let mut grad_a = 0.0;
        let mut grad_b = 0.0;
        for (raw, outcome) in data {
            let p = sigmoid(a * raw + b);
            let err = p - outcome;
            grad_a += err * raw;
            grad_b += err;
        }
        let n = data.len() as f64;
        a -= PLATT_LEARNING_RATE * grad_a / n;
        b -= PLATT_LEARNING_RATE * grad_b / n;
    }
    (a, b)
}

/// Pool-adjacent-violators on data sorted by raw probability, yielding
/// a monotone non-decreasing step function.
fn fit_isotonic(data: &[(f64, f64)]) -> Vec<(f64, f64)> {
    if data.is_empty() {
        return Vec::new();
    }
    let mut sorted: Vec<(f64, f64)> = data.to_vec();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    let mut blocks: Vec<(f64, f64, usize)> = sorted.iter().map(|(x, y)| (*x, *y, 1usize)).collect();
    loop {
        let mut merged = false;
        let mut i = 0;
        while i + 1 < blocks.len() {
            if blocks[i].1 > blocks[i + 1].1 {
                let (x0, y0, n0) = blocks[i];
                let (_x1, y1, n1) = blocks[i + 1];
                let total = n0 + n1;
                let merged_y = (y0 * n0 as f64 + y1 * n1 as f64) / total as f64;
                blocks[i] = (x0, merged_y, total);
                blocks.remove(i + 1);
                merged = true;
            } else {
                i += 1;
            }
        }
        if !merged {
            break;
        }
    }
    blocks.into_iter().map(|(x, y, _)| (x, y)).collect()
}

fn isotonic_lookup(points: &[(f64, f64)], raw: f64) -> f64 {
    if points.is_empty() {
        return raw;
    }
    for window in points.windows(2) {
        let (x0, y0) = window[0];
        let (x1, y1) = window[1];
        if raw >= x0 && raw <= x1 {
            if (x1 - x0).abs() < 1e-12 {
                return y0;
            }
            let t = (raw - x0) / (x1 - x0);
            return y0 + t * (y1 - y0);
        }
    }
    if raw < points[0].0 {
        points[0].1
    } else {
        points[points.len() - 1].1
    }
}

/// Expected/Maximum Calibration Error over 10 equal-width bins, plus
/// Brier score.
fn reliability_report(data: &[(f64, f64)], calibrate: impl Fn(f64) -> f64) -> CalibrationReport {
    const BINS: usize = 10;
    let mut bin_conf = vec![0.0; BINS];
    let mut bin_acc = vec![0.0; BINS];
    let mut bin_count = vec![0usize; BINS];
    let mut brier_sum = 0.0;

    for (raw, outcome) in data {
        let calibrated = calibrate(*raw);
        brier_sum += (calibrated - outcome).powi(2);
        let bin = ((calibrated * BINS as f64) as usize).min(BINS - 1);
        bin_conf[bin] += calibrated;
        bin_acc[bin] += outcome;
        bin_count[bin] += 1;
    }

    let n = data.len().max(1) as f64;
    let mut ece = 0.0;
    let mut mce: f64 = 0.0;
    for b in 0..BINS {
        if bin_count[b] == 0 {
            continue;
        }
        let count = bin_count[b] as f64;
        let avg_conf = bin_conf[b] / count;
        let avg_acc = bin_acc[b] / count;
        let gap = (avg_conf - avg_acc).abs();
        ece += (count / n) * gap;
        mce = mce.max(gap);
    }

    CalibrationReport { ece, mce, brier: brier_sum / n }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platt_fit_on_perfectly_separable_data_is_monotone() {
        let data = vec![(0.1, 0.0), (0.2, 0.0), (0.8, 1.0), (0.9, 1.0)];
        let cal = Calibrator::fit(CalibrationMethod::Platt, &data);
        assert!(cal.calibrate(0.9) > cal.calibrate(0.1));
    }

    #[test]
    fn isotonic_preserves_monotonicity() {
        let data = vec![(0.1, 0.2), (0.3, 0.1), (0.5, 0.6), (0.9, 0.8)];
        let cal = Calibrator::fit(CalibrationMethod::Isotonic, &data);
        assert!(cal.calibrate(0.9) >= cal.calibrate(0.1));
    }

    #[test]
    fn report_produces_bounded_metrics() {
        let data = vec![(0.1, 0.0), (0.9, 1.0), (0.5, 1.0), (0.5, 0.0)];
        let cal = Calibrator::fit(CalibrationMethod::Platt, &data);
        let report = cal.report(&data);
        assert!(report.ece >= 0.0 && report.ece <= 1.0);
        assert!(report.brier >= 0.0 && report.brier <= 1.0);
    }
}
