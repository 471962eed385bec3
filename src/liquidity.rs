//! Liquidity Map
//! Grounded on spec §3's liquidity zone model: `strength = prob_hold ×
//! decay(test_count)`, zones expiring after N untested hours. No
//! single Python module covers this (`liquidity_map.py`/
//! `stop_selector.py`/`target_selector.py` are named in the original
//! index but not read in full); the formula is taken directly from
//! the spec's data model section.

use crate::models::{LiquiditySource, LiquidityZone};
use chrono::{DateTime, Duration, Utc};

const EXPIRY_HOURS: i64 = 72;
const DECAY_RATE: f64 = 0.08;

/// Exponential decay in zone reliability with repeated tests — each
/// test erodes confidence that the zone will hold again.
pub fn decay(test_count: u32) -> f64 {
    (-DECAY_RATE * test_count as f64).exp()
}

pub fn strength(zone: &LiquidityZone) -> f64 {
    zone.prob_hold * decay(zone.touch_count)
}

pub fn is_expired(zone: &LiquidityZone, now: DateTime<Utc>) -> bool {
    match zone.last_tested {
        Some(last) => now - last > Duration::hours(EXPIRY_HOURS),
        None => false,
    }
}

#[derive(Default)]
pub struct LiquidityMap {
    zones: Vec<LiquidityZone>,
}

impl LiquidityMap {
    pub fn new() -> Self {
        Self { zones: Vec::new() }
    }

    pub fn upsert(&mut self, zone: LiquidityZone) {
        if let Some(existing) = self
            .zones
            .iter_mut()
            .find(|z| z.symbol == zone.symbol && z.source == zone.source && (z.price_center - zone.price_center).abs() < zone.price_range)
        {
            *existing = zone;
        } else {
            self.zones.push(zone);
        }
    }

    /// Drops zones untested for longer than `EXPIRY_HOURS`.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) {
        self.zones.retain(|z| !is_expired(z, now));
    }

    /// Zones above `price`, sorted nearest-first — candidate
    /// resistances/take-profits for a long.
    pub fn zones_above(&self, symbol: &str, price: f64) -> Vec<&LiquidityZone> {
        let mut above: Vec<&LiquidityZone> =
            self.zones.iter().filter(|z| z.symbol == symbol && z.price_center > price).collect();
        above.sort_by(|a, b| a.price_center.partial_cmp(&b.price_center).unwrap());
        above
    }

    /// Zones below `price`, sorted nearest-first — candidate
    /// supports/take-profits for a short.
    pub fn zones_below(&self, symbol: &str, price: f64) -> Vec<&LiquidityZone> {
        let mut below: Vec<&LiquidityZone> =
            self.zones.iter().filter(|z| z.symbol == symbol && z.price_center < price).collect();
        below.sort_by(|a, b| b.price_center.partial_cmp(&a.price_center).unwrap());
        below
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn zone(center: f64, touch_count: u32, prob_hold: f64) -> LiquidityZone {
        LiquidityZone {
            symbol: "EURUSD".into(),
            source: LiquiditySource::PivotM15,
            price_center: center,
            price_range: 0.1,
            touch_count,
            hold_count: 0,
            break_count: 0,
            sweep_count: 0,
            strength: 0.0,
            prob_hold,
            prob_break: 1.0 - prob_hold,
            last_tested: Some(Utc::now()),
        }
    }

    #[test]
    fn more_touches_decay_strength() {
        let fresh = strength(&zone(100.0, 0, 0.8));
        let tested = strength(&zone(100.0, 5, 0.8));
        assert!(tested < fresh);
    }

    #[test]
    fn zones_above_sorted_nearest_first() {
        let mut map = LiquidityMap::new();
        map.upsert(zone(110.0, 0, 0.8));
        map.upsert(zone(105.0, 0, 0.8));
        let above = map.zones_above("EURUSD", 100.0);
        assert_eq!(above[0].price_center, 105.0);
        assert_eq!(above[1].price_center, 110.0);
    }

    #[test]
    fn expired_zone_is_pruned() {
        let mut map = LiquidityMap::new();
        let mut old_zone = zone(100.0, 0, 0.8);
        old_zone.last_tested = Some(Utc::now() - Duration::hours(200));
        map.upsert(old_zone);
        map.prune_expired(Utc::now());
        assert!(map.zones_above("EURUSD", 0.0).is_empty());
    }
}
