//! Regime Classifier
//! Grounded on spec §4.2's heuristic (authoritative over the HMM path
//! `regime_detector.py` takes in the original): ATR-over-mean-close
//! ratio gates high volatility, MA20 slope gates trend direction, a
//! configurable "chaotic" window overrides both when recent range
//! expansion is extreme.

use crate::features::{atr, ma_slope};
use crate::models::{Candle, Regime};

const MIN_WINDOW: usize = 50;
const HIGH_VOL_ATR_RATIO: f64 = 0.01;
const EXHAUSTION_RSI_HIGH: f64 = 80.0;
const EXHAUSTION_RSI_LOW: f64 = 20.0;

/// Classifies the current regime from a candle window. Windows shorter
/// than `MIN_WINDOW` are always `Unknown` — too little history to trust
/// any of the downstream heuristics.
pub fn classify(window: &[Candle], chaotic_window: usize) -> Regime {
    if window.len() < MIN_WINDOW {
        return Regime::Unknown;
    }

    if is_chaotic(window, chaotic_window) {
        return Regime::Chaotic;
    }

    let mean_close = {
        let n = window.len().min(50);
        let slice = &window[window.len() - n..];
        slice.iter().map(|c| c.close).sum::<f64>() / n as f64
    };

    let atr_ratio = atr(window, 14).map(|a| a / mean_close).unwrap_or(0.0);
    if mean_close > 0.0 && atr_ratio > HIGH_VOL_ATR_RATIO {
        return Regime::HighVol;
    }

    if let Some(rsi) = crate::features::rsi(window, 14) {
        if rsi > EXHAUSTION_RSI_HIGH || rsi < EXHAUSTION_RSI_LOW {
            return Regime::Exhaustion;
        }
    }

    match ma_slope(window, 20) {
        Some(slope) if slope > 0.0 => Regime::TrendUp,
        Some(slope) if slope < 0.0 => Regime::TrendDown,
        _ => Regime::Range,
    }
}

/// A regime is "chaotic" when the last `chaotic_window` candles' range
/// expands sharply against the preceding same-length window — a proxy
/// for a volatility shock wide enough that the other heuristics would
/// mislabel it as a clean trend or range.
fn is_chaotic(window: &[Candle], chaotic_window: usize) -> bool {
    if chaotic_window == 0 || window.len() < chaotic_window * 2 {
        return false;
    }
    let recent = &window[window.len() - chaotic_window..];
    let prior = &window[window.len() - chaotic_window * 2..window.len() - chaotic_window];

    let recent_range = recent.iter().map(|c| c.high - c.low).sum::<f64>();
    let prior_range = prior.iter().map(|c| c.high - c.low).sum::<f64>();
    if prior_range <= 0.0 {
        return false;
    }
    recent_range / prior_range > 3.0
}
