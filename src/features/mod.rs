//! Feature Builder
//! Pilot in Command: Feature Engineering
//! Mission: turn a raw candle window into the bundle every downstream
//! component reads

use crate::models::{Candle, FeatureBundle};

pub mod regime;
pub mod regime_transition;

const MIN_WINDOW_FOR_FEATURES: usize = 50;

/// Average True Range over the last `n` candles (Wilder's simple mean
/// variant, sufficient for the regime heuristic this feeds).
pub fn atr(window: &[Candle], n: usize) -> Option<f64> {
    if window.len() < n + 1 || n == 0 {
        return None;
    }
    let slice = &window[window.len() - n..];
    let mut true_ranges = Vec::with_capacity(n);
    for i in 0..slice.len() {
        let idx = window.len() - n + i;
        let prev_close = window[idx - 1].close;
        let c = &window[idx];
        let tr = (c.high - c.low)
            .max((c.high - prev_close).abs())
            .max((c.low - prev_close).abs());
        true_ranges.push(tr);
    }
    Some(true_ranges.iter().sum::<f64>() / true_ranges.len() as f64)
}

pub fn sma(window: &[Candle], n: usize) -> Option<f64> {
    crate::brains::sma(window, n)
}

/// Slope of an MA over its own last two values (simple finite
/// difference), used by the regime heuristic.
pub fn ma_slope(window: &[Candle], ma_period: usize) -> Option<f64> {
    if window.len() < ma_period + 1 {
        return None;
    }
    let ma_now = sma(window, ma_period)?;
    let ma_prev = sma(&window[..window.len() - 1], ma_period)?;
    Some(ma_now - ma_prev)
}

pub fn rsi(window: &[Candle], n: usize) -> Option<f64> {
    if window.len() < n + 1 {
        return None;
    }
    let slice = &window[window.len() - n - 1..];
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in slice.windows(2) {
        let diff = pair[1].close - pair[0].close;
        if diff >= 0.0 {
            gains += diff;
        } else {
            losses -= diff;
        }
    }
    if gains + losses == 0.0 {
        return Some(50.0);
    }
    let rs = if losses == 0.0 { f64::INFINITY } else { gains / losses };
    Some(100.0 - 100.0 / (1.0 + rs))
}

pub fn volume_zscore(window: &[Candle], n: usize) -> Option<f64> {
    if window.len() < n {
        return None;
    }
    let slice = &window[window.len() - n..];
    let mean = slice.iter().map(|c| c.tick_volume).sum::<f64>() / n as f64;
    let variance = slice.iter().map(|c| (c.tick_volume - mean).powi(2)).sum::<f64>() / n as f64;
    let std = variance.sqrt();
    if std <= 0.0 {
        return Some(0.0);
    }
    Some((window.last()?.tick_volume - mean) / std)
}

/// Builds the full feature bundle for the current bar. Windows shorter
/// than the minimum required length degrade gracefully: the regime is
/// `unknown` and other indicators that need the same length are
/// simply absent from the bundle.
pub fn build_features(window: &[Candle], chaotic_window: usize) -> FeatureBundle {
    let mut bundle = FeatureBundle::new();

    if window.len() < MIN_WINDOW_FOR_FEATURES {
        bundle.set_number("window_len", window.len() as f64);
        return bundle;
    }

    if let Some(ma20) = sma(window, 20) {
        bundle.set_number("ma20", ma20);
    }
    if let Some(ma50) = sma(window, 50) {
        bundle.set_number("ma50", ma50);
    }
    if let Some(atr14) = atr(window, 14) {
        bundle.set_number("atr14", atr14);
    }
    if let Some(rsi14) = rsi(window, 14) {
        bundle.set_number("rsi14", rsi14);
    }
    if let Some(vz) = volume_zscore(window, 20) {
        bundle.set_number("volume_zscore", vz);
    }

    let regime = regime::classify(window, chaotic_window);
    bundle.0.insert(
        "regime".to_string(),
        crate::models::FeatureValue::Text(regime.as_str().to_string()),
    );

    bundle
}

pub use regime::classify as classify_regime;


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle(close: f64) -> Candle {
        Candle { time: Utc::now(), open: close, high: close + 0.2, low: close - 0.2, close, tick_volume: 100.0 }
    }

    #[test]
    fn short_window_degrades_to_window_len_only() {
        let window: Vec<Candle> = (0..10).map(|i| candle(100.0 + i as f64)).collect();
        let bundle = build_features(&window, 10);
        assert_eq!(bundle.number("window_len"), Some(10.0));
        assert!(bundle.number("ma20").is_none());
    }

    #[test]
    fn full_window_populates_indicators() {
        let window: Vec<Candle> = (0..60).map(|i| candle(100.0 + (i as f64) * 0.05)).collect();
        let bundle = build_features(&window, 10);
        assert!(bundle.number("ma20").is_some());
        assert!(bundle.number("atr14").is_some());
    }
}
