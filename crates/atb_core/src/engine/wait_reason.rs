//! Named tick-suspension reasons.
//!
//! Ticking is active only while no reason is raised. Each surrounding system
//! raises and lowers its own reason, so one system releasing its hold never
//! resumes time underneath another.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WaitReason {
    /// An action is resolving (strict queue: the whole dispatch cycle)
    Turn,
    /// Top-level party command menu is open
    Pause,
    /// Generic host menu overlay
    MenuOpen,
    /// Skill/item list or target selection is open
    SelectSkillOrItem,
    /// Action animation is playing
    Animation,
}

impl WaitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitReason::Turn => "turn",
            WaitReason::Pause => "pause",
            WaitReason::MenuOpen => "menuOpen",
            WaitReason::SelectSkillOrItem => "selectSkillOrItem",
            WaitReason::Animation => "animation",
        }
    }
}

impl fmt::Display for WaitReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite gate: empty set means time flows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitGate {
    reasons: BTreeSet<WaitReason>,
}

impl WaitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the reason was not already raised.
    pub fn raise(&mut self, reason: WaitReason) -> bool {
        self.reasons.insert(reason)
    }

    /// Returns `true` if the reason was raised.
    pub fn lower(&mut self, reason: WaitReason) -> bool {
        self.reasons.remove(&reason)
    }

    pub fn is_raised(&self, reason: WaitReason) -> bool {
        self.reasons.contains(&reason)
    }

    pub fn is_open(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn reasons(&self) -> impl Iterator<Item = WaitReason> + '_ {
        self.reasons.iter().copied()
    }
}
