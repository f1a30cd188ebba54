//! Tick suspension configuration

use serde::{Deserialize, Serialize};

/// Which UI activity suspends gauge ticking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Suspend while a skill or item list / target is being picked (default: true).
    /// Concurrent mode only; the top-level command menu never suspends.
    pub wait_select_skill_or_item: bool,
    /// Suspend while an action animation is playing (default: true)
    pub wait_animation: bool,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self { wait_select_skill_or_item: true, wait_animation: true }
    }
}
