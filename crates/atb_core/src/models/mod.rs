//! Participant-facing model types
//!
//! The engine never reaches into host battler types. Hosts expose their
//! battlers through the narrow [`Combatant`] trait; [`Battler`] is a plain
//! value implementation used by the JSON API and tests.

pub mod directive;

pub use directive::{
    AutoRemoval, ContentDb, DirectiveCatalog, DirectiveError, SkillDef, SkillDirectives,
    SkillEntry, StatusDef, StatusDirectives, StatusEntry,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable battle-scoped participant identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusId(pub u32);

/// Which side of the encounter a participant fights on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Player-controlled party members
    Party,
    /// Opponents (non-player)
    Troop,
}

impl Side {
    pub fn is_player(&self) -> bool {
        matches!(self, Side::Party)
    }

    pub fn opponent(&self) -> Side {
        match self {
            Side::Party => Side::Troop,
            Side::Troop => Side::Party,
        }
    }
}

/// Capabilities the scheduler needs from a host battler.
pub trait Combatant {
    fn id(&self) -> ParticipantId;
    fn side(&self) -> Side;
    /// Relative-speed attribute
    fn agility(&self) -> f64;
    /// Bonus added to the speed roll and to basic-attack charges
    fn attack_speed(&self) -> f64 {
        0.0
    }
    fn is_alive(&self) -> bool;
    fn can_move(&self) -> bool;

    /// Whether a command menu must be opened for this participant.
    /// Confused or auto-battle party members return `false`.
    fn needs_command_input(&self) -> bool {
        self.side().is_player()
    }

    fn can_act(&self) -> bool {
        self.is_alive() && self.can_move()
    }
}

/// Plain value battler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battler {
    pub id: ParticipantId,
    #[serde(default)]
    pub name: String,
    pub side: Side,
    pub agility: f64,
    #[serde(default)]
    pub attack_speed: f64,
    #[serde(default = "default_true")]
    pub alive: bool,
    #[serde(default = "default_true")]
    pub can_move: bool,
    /// Acts without command input (confusion, auto-battle)
    #[serde(default)]
    pub auto_battle: bool,
}

fn default_true() -> bool {
    true
}

impl Battler {
    pub fn new(id: u32, side: Side, agility: f64) -> Self {
        Self {
            id: ParticipantId(id),
            name: String::new(),
            side,
            agility,
            attack_speed: 0.0,
            alive: true,
            can_move: true,
            auto_battle: false,
        }
    }

    pub fn party(id: u32, agility: f64) -> Self {
        Self::new(id, Side::Party, agility)
    }

    pub fn troop(id: u32, agility: f64) -> Self {
        Self::new(id, Side::Troop, agility)
    }
}

impl Combatant for Battler {
    fn id(&self) -> ParticipantId {
        self.id
    }

    fn side(&self) -> Side {
        self.side
    }

    fn agility(&self) -> f64 {
        self.agility
    }

    fn attack_speed(&self) -> f64 {
        self.attack_speed
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn can_move(&self) -> bool {
        self.can_move
    }

    fn needs_command_input(&self) -> bool {
        self.side.is_player() && !self.auto_battle
    }
}

/// The action a participant is about to perform, resolved from content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub skill_id: SkillId,
    /// Basic attack: the attack-speed bonus joins the charge formula
    pub is_attack: bool,
    /// Skill speed modifier
    pub speed_modifier: f64,
    /// `<SkillWait>`: wait through a charge cycle before executing
    pub requires_charge: bool,
    pub target: Option<ParticipantId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_helpers() {
        assert!(Side::Party.is_player());
        assert!(!Side::Troop.is_player());
        assert_eq!(Side::Party.opponent(), Side::Troop);
    }

    #[test]
    fn test_battler_capabilities() {
        let mut hero = Battler::party(1, 12.0);
        assert!(hero.can_act());
        assert!(hero.needs_command_input());

        hero.auto_battle = true;
        assert!(!hero.needs_command_input());

        hero.can_move = false;
        assert!(!hero.can_act());

        let slime = Battler::troop(2, 6.0);
        assert!(!slime.needs_command_input());
    }

    #[test]
    fn test_battler_json_defaults() {
        let b: Battler =
            serde_json::from_str(r#"{ "id": 4, "side": "troop", "agility": 8.0 }"#).unwrap();
        assert_eq!(b.id, ParticipantId(4));
        assert!(b.alive);
        assert!(b.can_move);
        assert!(!b.auto_battle);
    }
}
