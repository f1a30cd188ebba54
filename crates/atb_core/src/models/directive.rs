//! Note-field directives
//!
//! Status and skill definitions carry free-text notes. Three tags matter to
//! the scheduler:
//!
//! ```text
//! <ReduceGauge value=300>   status: drain the bearer's gauge when applied (1..=1000)
//! <Quick>                   status: bearer always ready, everyone else frozen
//! <SkillWait>               skill:  charge through a gauge cycle before executing
//! ```
//!
//! Notes are parsed once when content is loaded; the catalog hands out the
//! typed descriptors by id afterwards.

use fxhash::FxHashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ParticipantId, PlannedAction, SkillId, StatusId};
use crate::engine::gauge::GAUGE_MAX;

static REDUCE_GAUGE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<\s*ReduceGauge\s+value=(\d+)\s*>").expect("ReduceGauge pattern is valid")
});
static QUICK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\s*Quick\s*>").expect("Quick pattern is valid"));
static SKILL_WAIT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\s*SkillWait\s*>").expect("SkillWait pattern is valid"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("status {status}: ReduceGauge value {value} outside 1..={max}")]
    ReduceGaugeOutOfRange { status: u32, value: String, max: u32 },

    #[error("duplicate status id {0}")]
    DuplicateStatus(u32),

    #[error("duplicate skill id {0}")]
    DuplicateSkill(u32),
}

/// Parsed status directives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusDirectives {
    pub reduce_gauge: Option<u32>,
    pub quicken: bool,
}

impl StatusDirectives {
    pub fn parse(status: StatusId, note: &str) -> Result<Self, DirectiveError> {
        let reduce_gauge = match REDUCE_GAUGE_TAG.captures(note) {
            Some(caps) => {
                let raw = &caps[1];
                match raw.parse::<u32>() {
                    Ok(value) if (1..=GAUGE_MAX).contains(&value) => Some(value),
                    _ => {
                        return Err(DirectiveError::ReduceGaugeOutOfRange {
                            status: status.0,
                            value: raw.to_string(),
                            max: GAUGE_MAX,
                        })
                    }
                }
            }
            None => None,
        };

        Ok(Self { reduce_gauge, quicken: QUICK_TAG.is_match(note) })
    }

    pub fn is_empty(&self) -> bool {
        self.reduce_gauge.is_none() && !self.quicken
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkillDirectives {
    pub charge: bool,
}

impl SkillDirectives {
    pub fn parse(note: &str) -> Self {
        Self { charge: SKILL_WAIT_TAG.is_match(note) }
    }
}

/// When a status counts its duration down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoRemoval {
    /// Removed only by the host
    #[default]
    None,
    /// One step per completed action of the bearer
    ActionEnd,
    /// One step per completed round
    RoundEnd,
}

/// Status definition as authored in content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDef {
    pub id: StatusId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub auto_removal: AutoRemoval,
    /// Steps until auto-removal (ignored for `AutoRemoval::None`)
    #[serde(default)]
    pub duration: u32,
}

/// Skill definition as authored in content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDef {
    pub id: SkillId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub note: String,
    /// Speed modifier added to the charge formula
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub is_attack: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentDb {
    #[serde(default)]
    pub statuses: Vec<StatusDef>,
    #[serde(default)]
    pub skills: Vec<SkillDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusEntry {
    pub directives: StatusDirectives,
    pub auto_removal: AutoRemoval,
    pub duration: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillEntry {
    pub directives: SkillDirectives,
    pub speed: f64,
    pub is_attack: bool,
}

/// Immutable per-battle cache of parsed directives.
#[derive(Debug, Clone, Default)]
pub struct DirectiveCatalog {
    statuses: FxHashMap<StatusId, StatusEntry>,
    skills: FxHashMap<SkillId, SkillEntry>,
}

impl DirectiveCatalog {
    pub fn from_content(content: &ContentDb) -> Result<Self, DirectiveError> {
        let mut catalog = Self::default();

        for def in &content.statuses {
            let entry = StatusEntry {
                directives: StatusDirectives::parse(def.id, &def.note)?,
                auto_removal: def.auto_removal,
                duration: def.duration,
            };
            if catalog.statuses.insert(def.id, entry).is_some() {
                return Err(DirectiveError::DuplicateStatus(def.id.0));
            }
        }

        for def in &content.skills {
            let entry = SkillEntry {
                directives: SkillDirectives::parse(&def.note),
                speed: def.speed,
                is_attack: def.is_attack,
            };
            if catalog.skills.insert(def.id, entry).is_some() {
                return Err(DirectiveError::DuplicateSkill(def.id.0));
            }
        }

        Ok(catalog)
    }

    pub fn status(&self, id: StatusId) -> Option<&StatusEntry> {
        self.statuses.get(&id)
    }

    pub fn skill(&self, id: SkillId) -> Option<&SkillEntry> {
        self.skills.get(&id)
    }

    /// Resolve a skill choice into a planned action. Unknown skills yield `None`.
    pub fn plan_action(
        &self,
        skill: SkillId,
        target: Option<ParticipantId>,
    ) -> Option<PlannedAction> {
        let entry = self.skills.get(&skill)?;
        Some(PlannedAction {
            skill_id: skill,
            is_attack: entry.is_attack,
            speed_modifier: entry.speed,
            requires_charge: entry.directives.charge,
            target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reduce_gauge() {
        let d = StatusDirectives::parse(StatusId(1), "Slow <ReduceGauge value=300>").unwrap();
        assert_eq!(d.reduce_gauge, Some(300));
        assert!(!d.quicken);

        let d = StatusDirectives::parse(StatusId(1), "< ReduceGauge  value=1000 >").unwrap();
        assert_eq!(d.reduce_gauge, Some(1000));
    }

    #[test]
    fn test_parse_reduce_gauge_out_of_range() {
        let err = StatusDirectives::parse(StatusId(5), "<ReduceGauge value=0>").unwrap_err();
        assert!(matches!(err, DirectiveError::ReduceGaugeOutOfRange { status: 5, .. }));

        assert!(StatusDirectives::parse(StatusId(5), "<ReduceGauge value=1001>").is_err());
        assert!(
            StatusDirectives::parse(StatusId(5), "<ReduceGauge value=99999999999999999999>")
                .is_err()
        );
    }

    #[test]
    fn test_parse_quick_and_plain() {
        let d = StatusDirectives::parse(StatusId(2), "<Quick>").unwrap();
        assert!(d.quicken);
        assert_eq!(d.reduce_gauge, None);

        let d = StatusDirectives::parse(StatusId(3), "just poison").unwrap();
        assert!(d.is_empty());
    }

    #[test]
    fn test_parse_skill_wait() {
        assert!(SkillDirectives::parse("<SkillWait>").charge);
        assert!(SkillDirectives::parse("charge < SkillWait >").charge);
        assert!(!SkillDirectives::parse("<SkillWaitX>").charge);
    }

    #[test]
    fn test_catalog_plan_action() {
        let content = ContentDb {
            statuses: vec![],
            skills: vec![
                SkillDef {
                    id: SkillId(1),
                    name: "Attack".into(),
                    note: String::new(),
                    speed: 0.0,
                    is_attack: true,
                },
                SkillDef {
                    id: SkillId(10),
                    name: "Meteor".into(),
                    note: "<SkillWait>".into(),
                    speed: -2.0,
                    is_attack: false,
                },
            ],
        };
        let catalog = DirectiveCatalog::from_content(&content).unwrap();

        let attack = catalog.plan_action(SkillId(1), Some(ParticipantId(3))).unwrap();
        assert!(attack.is_attack);
        assert!(!attack.requires_charge);
        assert_eq!(attack.target, Some(ParticipantId(3)));

        let meteor = catalog.plan_action(SkillId(10), None).unwrap();
        assert!(meteor.requires_charge);
        assert!((meteor.speed_modifier + 2.0).abs() < f64::EPSILON);

        assert!(catalog.plan_action(SkillId(99), None).is_none());
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let def = StatusDef {
            id: StatusId(4),
            name: String::new(),
            note: String::new(),
            auto_removal: AutoRemoval::None,
            duration: 0,
        };
        let content = ContentDb { statuses: vec![def.clone(), def], skills: vec![] };
        assert_eq!(
            DirectiveCatalog::from_content(&content).unwrap_err(),
            DirectiveError::DuplicateStatus(4)
        );
    }
}
