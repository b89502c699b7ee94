//! Alert Manager Implementation

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Alert configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Frames between two alarms for the same key (default: 45, ~3s at 15fps)
    pub cooldown_frames: u64,
    /// Maximum alarms per throttle window
    pub max_alerts_per_window: usize,
    /// Throttle window length in frames (default: 9000, ~10min at 15fps)
    pub window_frames: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_frames: 45,
            max_alerts_per_window: 20,
            window_frames: 9000,
        }
    }
}

/// State of an alert
#[derive(Debug, Clone)]
pub struct AlertState {
    /// Frame on which this alert last fired
    pub last_fired: u64,
    /// Number of times fired
    pub fire_count: usize,
}

/// Alert manager for cooldown and throttling
pub struct AlertManager {
    /// Configuration
    config: AlertConfig,
    /// Alert states by key
    states: HashMap<String, AlertState>,
    /// Alarms fired in current window
    window_count: usize,
    /// Window start frame
    window_start: u64,
}

impl AlertManager {
    /// Create a new alert manager
    pub fn new(config: AlertConfig) -> Self {
        info!("Creating alert manager with config: {:?}", config);
        Self {
            config,
            states: HashMap::new(),
            window_count: 0,
            window_start: 0,
        }
    }

    /// Check if an alarm should sound for `key` on `frame`
    pub fn should_fire(&mut self, key: &str, frame: u64) -> bool {
        // Reset window counter if needed
        if frame.saturating_sub(self.window_start) >= self.config.window_frames {
            self.window_count = 0;
            self.window_start = frame;
        }

        // Check window throttle
        if self.window_count >= self.config.max_alerts_per_window {
            warn!("Alarm throttled: max alarms per window reached");
            return false;
        }

        // Check cooldown
        if let Some(state) = self.states.get(key) {
            if frame.saturating_sub(state.last_fired) < self.config.cooldown_frames {
                debug!("Alarm {} suppressed: in cooldown period", key);
                return false;
            }
        }

        true
    }

    /// Record that an alarm was fired
    pub fn record_fire(&mut self, key: &str, frame: u64) {
        self.window_count += 1;

        let state = self.states.entry(key.to_string()).or_insert(AlertState {
            last_fired: frame,
            fire_count: 0,
        });

        state.last_fired = frame;
        state.fire_count += 1;

        info!("Alarm recorded: {} (count: {})", key, state.fire_count);
    }

    /// `should_fire` followed by `record_fire` when it passes
    pub fn evaluate(&mut self, key: &str, frame: u64) -> bool {
        let fire = self.should_fire(key, frame);
        if fire {
            self.record_fire(key, frame);
        }
        fire
    }

    /// Times the alarm for `key` has fired
    pub fn fire_count(&self, key: &str) -> usize {
        self.states.get(key).map(|s| s.fire_count).unwrap_or(0)
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}
