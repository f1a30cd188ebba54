//! # Battle Configuration
//!
//! Every tuning scalar and policy flag of a battle, fixed for the battle's
//! duration.
//!
//! ## Presets
//! - `AtbConfig::atb()` - concurrent gauges (menus do not stop time)
//! - `AtbConfig::ctb()` - strict queue (one participant in flight at a time)
//!
//! ```rust
//! use atb_core::engine::config::{AtbConfig, SchedulingMode};
//!
//! let config = AtbConfig::ctb();
//! assert_eq!(config.mode, SchedulingMode::StrictQueue);
//! ```

mod speed_config;
mod wait_config;

pub use speed_config::SpeedConfig;
pub use wait_config::WaitConfig;

use serde::{Deserialize, Serialize};

use crate::error::{AtbError, Result};

/// Scheduling policy selected at battle start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    /// All gauges fill at once, even while a command menu is open.
    #[default]
    Concurrent,
    /// Ticking is tied to dispatch; exactly one participant in flight.
    StrictQueue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtbConfig {
    #[serde(default)]
    pub mode: SchedulingMode,
    #[serde(default)]
    pub speed: SpeedConfig,
    #[serde(default)]
    pub wait: WaitConfig,
    /// Draw gauges for non-player participants
    #[serde(default = "default_true")]
    pub show_enemy_gauge: bool,
    /// Ignore re-entrant round-start calls made by an external round-order extension
    #[serde(default)]
    pub round_order_compat: bool,
    /// Seed for the speed roll and escape checks
    #[serde(default)]
    pub seed: u64,
}

fn default_true() -> bool {
    true
}

impl Default for AtbConfig {
    fn default() -> Self {
        Self {
            mode: SchedulingMode::Concurrent,
            speed: SpeedConfig::default(),
            wait: WaitConfig::default(),
            show_enemy_gauge: true,
            round_order_compat: false,
            seed: 0,
        }
    }
}

impl AtbConfig {
    /// Concurrent active-time battle (default)
    pub fn atb() -> Self {
        Self::default()
    }

    /// Strict-queue conditional-turn battle
    pub fn ctb() -> Self {
        Self { mode: SchedulingMode::StrictQueue, ..Self::default() }
    }

    /// For tests: no speed roll, no UI suspension
    pub fn deterministic() -> Self {
        let mut cfg = Self::atb();
        cfg.speed.speed_variance = false;
        cfg.wait.wait_animation = false;
        cfg.wait.wait_select_skill_or_item = false;
        cfg
    }

    pub fn is_strict_queue(&self) -> bool {
        self.mode == SchedulingMode::StrictQueue
    }

    /// Multiplier passed to `advance` for the current fast-forward state.
    pub fn fast_forward_multiplier(&self, held: bool) -> f64 {
        if held {
            self.speed.fast_forward
        } else {
            1.0
        }
    }

    pub fn validate(&self) -> Result<()> {
        let speed = &self.speed;
        if !(speed.base_gauge_speed.is_finite() && speed.base_gauge_speed > 0.0) {
            return Err(AtbError::InvalidConfig(format!(
                "base_gauge_speed must be positive, got {}",
                speed.base_gauge_speed
            )));
        }
        if !(speed.max_actions_per_turn.is_finite() && speed.max_actions_per_turn >= 1.0) {
            return Err(AtbError::InvalidConfig(format!(
                "max_actions_per_turn must be at least 1, got {}",
                speed.max_actions_per_turn
            )));
        }
        if !(speed.base_skill_wait_gauge_speed.is_finite()
            && speed.base_skill_wait_gauge_speed > 0.0)
        {
            return Err(AtbError::InvalidConfig(format!(
                "base_skill_wait_gauge_speed must be positive, got {}",
                speed.base_skill_wait_gauge_speed
            )));
        }
        if !(speed.fast_forward.is_finite() && speed.fast_forward >= 1.0) {
            return Err(AtbError::InvalidConfig(format!(
                "fast_forward must be at least 1, got {}",
                speed.fast_forward
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: AtbConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

// ========== Tests ==========

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = AtbConfig::default();
        assert_eq!(cfg.mode, SchedulingMode::Concurrent);
        assert!((cfg.speed.base_gauge_speed - 5.0).abs() < f64::EPSILON);
        assert!((cfg.speed.max_actions_per_turn - 3.0).abs() < f64::EPSILON);
        assert!((cfg.speed.base_skill_wait_gauge_speed - 3.0).abs() < f64::EPSILON);
        assert!((cfg.speed.fast_forward - 2.0).abs() < f64::EPSILON);
        assert!(cfg.wait.wait_select_skill_or_item);
        assert!(cfg.wait.wait_animation);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        assert!(!AtbConfig::atb().is_strict_queue());
        assert!(AtbConfig::ctb().is_strict_queue());
        assert!(AtbConfig::atb().show_enemy_gauge);

        let det = AtbConfig::deterministic();
        assert!(!det.speed.speed_variance);
        assert!(!det.wait.wait_animation);
    }

    #[test]
    fn test_fast_forward_multiplier() {
        let cfg = AtbConfig::default();
        assert!((cfg.fast_forward_multiplier(false) - 1.0).abs() < f64::EPSILON);
        assert!((cfg.fast_forward_multiplier(true) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_rejects_bad_speeds() {
        let mut cfg = AtbConfig::default();
        cfg.speed.base_gauge_speed = 0.0;
        assert!(matches!(cfg.validate(), Err(AtbError::InvalidConfig(_))));

        let mut cfg = AtbConfig::default();
        cfg.speed.max_actions_per_turn = 0.5;
        assert!(cfg.validate().is_err());

        let mut cfg = AtbConfig::default();
        cfg.speed.fast_forward = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let cfg = AtbConfig::from_json(r#"{ "mode": "strict_queue", "seed": 9 }"#).unwrap();
        assert!(cfg.is_strict_queue());
        assert_eq!(cfg.seed, 9);
        assert!(cfg.show_enemy_gauge);
        assert!((cfg.speed.base_gauge_speed - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_serialization() {
        let cfg = AtbConfig::ctb();
        let json = serde_json::to_string(&cfg).unwrap();
        let parsed = AtbConfig::from_json(&json).unwrap();
        assert_eq!(parsed.mode, cfg.mode);
        assert_eq!(parsed.wait.wait_animation, cfg.wait.wait_animation);
    }
}
