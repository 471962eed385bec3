//! News Filter
//! Grounded on `news/news_filter.py`: blocks trading inside a window
//! around high/medium impact news events and scales risk for medium
//! events outside the block window. CSV parsing of the calendar itself
//! is out of scope (spec Non-goal); events are constructed by the
//! caller and fed in directly.

use crate::models::{NewsEvent, NewsImpact};
use chrono::{DateTime, Duration, Utc};

const MAX_BLOCK_HISTORY: usize = 1000;

#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub block_impact_level: NewsImpact,
    pub minutes_before: i64,
    pub minutes_after: i64,
    pub reduce_risk_on_medium: bool,
    pub medium_risk_factor: f64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            block_impact_level: NewsImpact::High,
            minutes_before: 15,
            minutes_after: 15,
            reduce_risk_on_medium: true,
            medium_risk_factor: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockDecision {
    pub blocked: bool,
    pub event: Option<NewsEvent>,
}

pub struct NewsFilter {
    config: NewsConfig,
    events: Vec<NewsEvent>,
    block_history: Vec<(DateTime<Utc>, String)>,
}

impl NewsFilter {
    pub fn new(config: NewsConfig, events: Vec<NewsEvent>) -> Self {
        Self { config, events, block_history: Vec::new() }
    }

    fn in_window(&self, event: &NewsEvent, now: DateTime<Utc>) -> bool {
        let time_until = (event.time - now).num_minutes();
        let time_after = (now - event.time).num_minutes();
        (-self.config.minutes_before..=0).contains(&time_until) || (0..=self.config.minutes_after).contains(&time_after)
    }

    /// Trading is blocked if any event at or above the configured
    /// impact threshold (numerically `<=` since High=1 is the most
    /// impactful) falls inside its timing window around `now`.
    pub fn is_blocked(&mut self, now: DateTime<Utc>) -> BlockDecision {
        for event in &self.events {
            if event.impact.level() <= self.config.block_impact_level.level() && self.in_window(event, now) {
                self.block_history.push((now, event.title.clone()));
                if self.block_history.len() > MAX_BLOCK_HISTORY {
                    let excess = self.block_history.len() - MAX_BLOCK_HISTORY;
                    self.block_history.drain(0..excess);
                }
                return BlockDecision { blocked: true, event: Some(event.clone()) };
            }
        }
        BlockDecision { blocked: false, event: None }
    }

    /// Risk scaling factor applied outside the hard block window: 1.0
    /// normally, `medium_risk_factor` if inside a MEDIUM event's window
    /// and `reduce_risk_on_medium` is set.
    pub fn get_risk_factor(&self, now: DateTime<Utc>) -> f64 {
        if !self.config.reduce_risk_on_medium {
            return 1.0;
        }
        for event in &self.events {
            if event.impact == NewsImpact::Medium && self.in_window(event, now) {
                return self.config.medium_risk_factor;
            }
        }
        1.0
    }

    pub fn export_stats(&self) -> NewsStats {
        NewsStats {
            total_events: self.events.len(),
            total_blocks: self.block_history.len(),
            last_block: self.block_history.last().map(|(t, title)| (*t, title.clone())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewsStats {
    pub total_events: usize,
    pub total_blocks: usize,
    pub last_block: Option<(DateTime<Utc>, String)>,
}
