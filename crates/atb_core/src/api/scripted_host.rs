//! Deterministic host used by the JSON API: flat damage, scripted party
//! commands, fixed-length action animations.

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::engine::{ActionChoice, BattleHost, CommandInput};
use crate::error::{AtbError, Result};
use crate::models::{Battler, ParticipantId, PlannedAction, SkillId};

/// Skill used when a member has no script left and no `skill` of its own.
pub const DEFAULT_SKILL: SkillId = SkillId(1);

fn default_hp() -> u32 {
    100
}

fn default_power() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMember {
    #[serde(flatten)]
    pub battler: Battler,
    #[serde(default = "default_hp")]
    pub hp: u32,
    /// Damage dealt by every action
    #[serde(default = "default_power")]
    pub power: u32,
    /// Skill used by AI turns and once the command script runs out
    #[serde(default)]
    pub skill: Option<SkillId>,
    /// Party command script, consumed in order
    #[serde(default)]
    pub commands: Vec<ScriptedCommand>,
}

/// One scripted command-menu session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptedCommand {
    Skill {
        skill: SkillId,
        #[serde(default)]
        target: Option<ParticipantId>,
        /// Frames spent in the top-level menu
        #[serde(default)]
        browse_frames: u32,
        /// Frames spent in the skill list / target window
        #[serde(default)]
        select_frames: u32,
    },
    Escape {
        #[serde(default)]
        browse_frames: u32,
    },
}

impl ScriptedCommand {
    fn target(&self) -> Option<ParticipantId> {
        match self {
            ScriptedCommand::Skill { target, .. } => *target,
            ScriptedCommand::Escape { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedHost {
    members: Vec<Battler>,
    hp: FxHashMap<ParticipantId, u32>,
    power: FxHashMap<ParticipantId, u32>,
    skills: FxHashMap<ParticipantId, SkillId>,
    scripts: FxHashMap<ParticipantId, VecDeque<ScriptedCommand>>,
    /// Polls spent on the front command of each script
    polls: FxHashMap<ParticipantId, u32>,
    action_frames: u32,
    busy: u32,
    pending_hit: Option<(ParticipantId, ParticipantId)>,
}

impl ScriptedHost {
    pub fn new(members: &[ScenarioMember], action_frames: u32) -> Result<Self> {
        let mut host = Self {
            members: Vec::with_capacity(members.len()),
            hp: FxHashMap::default(),
            power: FxHashMap::default(),
            skills: FxHashMap::default(),
            scripts: FxHashMap::default(),
            polls: FxHashMap::default(),
            action_frames,
            busy: 0,
            pending_hit: None,
        };

        for member in members {
            let id = member.battler.id;
            if host.hp.contains_key(&id) {
                return Err(AtbError::DuplicateParticipant(id));
            }
            let mut battler = member.battler.clone();
            if member.hp == 0 {
                battler.alive = false;
            }
            host.members.push(battler);
            host.hp.insert(id, member.hp);
            host.power.insert(id, member.power);
            if let Some(skill) = member.skill {
                host.skills.insert(id, skill);
            }
            host.scripts.insert(id, member.commands.iter().cloned().collect());
        }

        for member in members {
            for target in member.commands.iter().filter_map(ScriptedCommand::target) {
                if !host.hp.contains_key(&target) {
                    return Err(AtbError::UnknownParticipant(target));
                }
            }
        }
        Ok(host)
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.hp.contains_key(&id)
    }

    pub fn hp(&self, id: ParticipantId) -> Option<u32> {
        self.hp.get(&id).copied()
    }

    /// Advance the animation clock by one frame.
    pub fn end_frame(&mut self) {
        self.busy = self.busy.saturating_sub(1);
    }

    fn default_choice(&self, id: ParticipantId) -> ActionChoice {
        ActionChoice { skill: self.skills.get(&id).copied().unwrap_or(DEFAULT_SKILL), target: None }
    }

    fn member(&self, id: ParticipantId) -> Option<&Battler> {
        self.members.iter().find(|m| m.id == id)
    }

    fn resolve_target(
        &self,
        actor: ParticipantId,
        action: &PlannedAction,
    ) -> Option<ParticipantId> {
        if let Some(target) = action.target {
            return self.member(target).filter(|m| m.alive).map(|m| m.id);
        }
        let side = self.member(actor)?.side;
        self.members
            .iter()
            .find(|m| m.side == side.opponent() && m.alive)
            .map(|m| m.id)
    }
}

impl BattleHost for ScriptedHost {
    type Member = Battler;

    fn members(&self) -> &[Battler] {
        &self.members
    }

    fn make_action(&mut self, participant: ParticipantId) -> Option<ActionChoice> {
        Some(self.default_choice(participant))
    }

    fn poll_command(&mut self, participant: ParticipantId) -> CommandInput {
        let Some(front) = self.scripts.get(&participant).and_then(|s| s.front()).cloned() else {
            return CommandInput::Chosen(self.default_choice(participant));
        };
        let polls = self.polls.entry(participant).or_insert(0);
        *polls += 1;
        let polled = *polls;

        let input = match front {
            ScriptedCommand::Skill { skill, target, browse_frames, select_frames } => {
                if polled <= browse_frames {
                    return CommandInput::Browsing;
                }
                if polled <= browse_frames + select_frames {
                    return CommandInput::SelectingSkillOrItem;
                }
                CommandInput::Chosen(ActionChoice { skill, target })
            }
            ScriptedCommand::Escape { browse_frames } => {
                if polled <= browse_frames {
                    return CommandInput::Browsing;
                }
                CommandInput::Escape
            }
        };

        self.polls.remove(&participant);
        if let Some(script) = self.scripts.get_mut(&participant) {
            script.pop_front();
        }
        input
    }

    fn is_action_valid(&self, participant: ParticipantId, action: &PlannedAction) -> bool {
        self.resolve_target(participant, action).is_some()
    }

    fn start_action(&mut self, participant: ParticipantId, action: &PlannedAction) {
        self.pending_hit = self.resolve_target(participant, action).map(|t| (participant, t));
        self.busy = self.action_frames;
    }

    fn is_busy(&self) -> bool {
        self.busy > 0
    }

    fn on_action_end(&mut self, _participant: ParticipantId) {
        let Some((attacker, target)) = self.pending_hit.take() else {
            return;
        };
        let damage = self.power.get(&attacker).copied().unwrap_or(0);
        let Some(hp) = self.hp.get_mut(&target) else {
            return;
        };
        *hp = hp.saturating_sub(damage);
        if *hp == 0 {
            if let Some(member) = self.members.iter_mut().find(|m| m.id == target) {
                member.alive = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(battler: Battler, commands: Vec<ScriptedCommand>) -> ScenarioMember {
        ScenarioMember { battler, hp: 20, power: 10, skill: None, commands }
    }

    fn planned(target: Option<ParticipantId>) -> PlannedAction {
        PlannedAction {
            skill_id: DEFAULT_SKILL,
            is_attack: true,
            speed_modifier: 0.0,
            requires_charge: false,
            target,
        }
    }

    #[test]
    fn test_rejects_duplicates_and_unknown_targets() {
        let a = member(Battler::party(1, 10.0), vec![]);
        assert!(matches!(
            ScriptedHost::new(&[a.clone(), a.clone()], 0),
            Err(AtbError::DuplicateParticipant(ParticipantId(1)))
        ));

        let bad = member(
            Battler::party(1, 10.0),
            vec![ScriptedCommand::Skill {
                skill: SkillId(1),
                target: Some(ParticipantId(9)),
                browse_frames: 0,
                select_frames: 0,
            }],
        );
        assert!(matches!(
            ScriptedHost::new(&[bad], 0),
            Err(AtbError::UnknownParticipant(ParticipantId(9)))
        ));
    }

    #[test]
    fn test_command_script_progression() {
        let hero = member(
            Battler::party(1, 10.0),
            vec![
                ScriptedCommand::Skill {
                    skill: SkillId(5),
                    target: None,
                    browse_frames: 1,
                    select_frames: 2,
                },
                ScriptedCommand::Escape { browse_frames: 0 },
            ],
        );
        let mut host = ScriptedHost::new(&[hero], 0).unwrap();
        let id = ParticipantId(1);
        assert_eq!(host.poll_command(id), CommandInput::Browsing);
        assert_eq!(host.poll_command(id), CommandInput::SelectingSkillOrItem);
        assert_eq!(host.poll_command(id), CommandInput::SelectingSkillOrItem);
        assert_eq!(
            host.poll_command(id),
            CommandInput::Chosen(ActionChoice { skill: SkillId(5), target: None })
        );
        assert_eq!(host.poll_command(id), CommandInput::Escape);
        assert_eq!(
            host.poll_command(id),
            CommandInput::Chosen(ActionChoice { skill: DEFAULT_SKILL, target: None })
        );
    }

    #[test]
    fn test_damage_and_death() {
        let hero = member(Battler::party(1, 10.0), vec![]);
        let slime = member(Battler::troop(2, 10.0), vec![]);
        let mut host = ScriptedHost::new(&[hero, slime], 2).unwrap();

        host.start_action(ParticipantId(1), &planned(None));
        assert!(host.is_busy());
        host.end_frame();
        host.end_frame();
        assert!(!host.is_busy());
        host.on_action_end(ParticipantId(1));
        assert_eq!(host.hp(ParticipantId(2)), Some(10));

        host.start_action(ParticipantId(1), &planned(Some(ParticipantId(2))));
        host.on_action_end(ParticipantId(1));
        assert_eq!(host.hp(ParticipantId(2)), Some(0));
        assert!(!host.members()[1].alive);
        assert!(!host.is_action_valid(ParticipantId(1), &planned(Some(ParticipantId(2)))));
        assert!(!host.is_action_valid(ParticipantId(1), &planned(None)));
    }
}
