//! Gauge speed configuration

use serde::{Deserialize, Serialize};

/// Gauge fill tuning scalars
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    /// Gauge points gained per tick at relative speed 1.0 (default: 5)
    pub base_gauge_speed: f64,
    /// Upper bound on any relative speed, i.e. actions per round (default: 3)
    pub max_actions_per_turn: f64,
    /// Multiplier applied to the charge-speed formula (default: 3)
    pub base_skill_wait_gauge_speed: f64,
    /// Advance multiplier while fast-forward is held (default: 2)
    pub fast_forward: f64,

    /// Roll `agility + rand(0..5 + agility/4)` at every round start (default: true)
    pub speed_variance: bool,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            base_gauge_speed: 5.0,
            max_actions_per_turn: 3.0,
            base_skill_wait_gauge_speed: 3.0,
            fast_forward: 2.0,

            speed_variance: true,
        }
    }
}
