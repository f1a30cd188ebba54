//! JSON API
//!
//! `simulate_battle_json` runs a scripted battle end to end against the
//! built-in [`ScriptedHost`] and returns the event trace.
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "config": { "mode": "strict_queue", "seed": 7 },
//!   "content": { "skills": [{ "id": 1, "is_attack": true }] },
//!   "members": [
//!     { "id": 1, "side": "party", "agility": 12, "hp": 80, "power": 15 },
//!     { "id": 2, "side": "troop", "agility": 9, "hp": 40 }
//!   ],
//!   "status_events": [{ "frame": 30, "participant": 2, "status": 4 }]
//! }
//! ```

pub mod scripted_host;

pub use scripted_host::{ScenarioMember, ScriptedCommand, ScriptedHost, DEFAULT_SKILL};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{AtbConfig, BattleEvent, BattleHost, BattleOutcome, Encounter};
use crate::error::{AtbError, Result};
use crate::models::{ContentDb, ParticipantId, StatusId};
use crate::session::{BattleSession, GaugeView};

pub const SCHEMA_VERSION: u8 = 1;

fn default_max_frames() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleRequest {
    pub schema_version: u8,
    #[serde(default)]
    pub config: AtbConfig,
    #[serde(default)]
    pub content: ContentDb,
    pub members: Vec<ScenarioMember>,
    #[serde(default)]
    pub encounter: Encounter,
    #[serde(default)]
    pub status_events: Vec<ScriptedStatus>,
    /// Frames each action animation keeps the host busy
    #[serde(default)]
    pub action_frames: u32,
    #[serde(default)]
    pub fast_forward: bool,
    #[serde(default = "default_max_frames")]
    pub max_frames: u64,
}

/// Status applied (or removed) right before the given frame runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedStatus {
    pub frame: u64,
    pub participant: ParticipantId,
    pub status: StatusId,
    #[serde(default)]
    pub remove: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEvent {
    pub frame: u64,
    #[serde(flatten)]
    pub event: BattleEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberState {
    pub participant: ParticipantId,
    pub hp: u32,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleResponse {
    pub schema_version: u8,
    /// `None` when `max_frames` ran out first
    pub outcome: Option<BattleOutcome>,
    pub frames: u64,
    pub rounds: u32,
    pub events: Vec<FrameEvent>,
    pub gauges: Vec<GaugeView>,
    pub members: Vec<MemberState>,
}

/// Simulate a battle from a JSON request.
pub fn simulate_battle_json(request_json: &str) -> Result<String> {
    let request: BattleRequest = serde_json::from_str(request_json)?;
    let response = simulate_battle(&request)?;
    serde_json::to_string(&response).map_err(|e| AtbError::SerializationError(e.to_string()))
}

pub fn simulate_battle(request: &BattleRequest) -> Result<BattleResponse> {
    if request.schema_version != SCHEMA_VERSION {
        return Err(AtbError::SchemaVersion {
            found: request.schema_version,
            expected: SCHEMA_VERSION,
        });
    }

    let mut host = ScriptedHost::new(&request.members, request.action_frames)?;
    if let Some(unknown) =
        request.status_events.iter().find(|s| !host.contains(s.participant))
    {
        return Err(AtbError::UnknownParticipant(unknown.participant));
    }
    let mut session = BattleSession::new(request.config.clone(), &request.content)?;
    session.set_fast_forward(request.fast_forward);

    let mut scripted = request.status_events.clone();
    scripted.sort_by_key(|s| s.frame);
    let mut scripted = scripted.into_iter().peekable();

    let mut events: Vec<FrameEvent> = session
        .on_battle_start(host.members(), request.encounter)
        .into_iter()
        .map(|event| FrameEvent { frame: 0, event })
        .collect();

    while !session.is_finished() && session.frame() < request.max_frames {
        let frame = session.frame() + 1;
        while let Some(status) = scripted.next_if(|s| s.frame <= frame) {
            let produced = if status.remove {
                session.on_status_removed(status.participant, status.status)
            } else {
                session.on_status_applied(status.participant, status.status)
            };
            events.extend(produced.into_iter().map(|event| FrameEvent { frame, event }));
        }

        for event in session.update(&mut host) {
            let follow_up = match event {
                BattleEvent::StatusExpired { participant, status } => {
                    session.on_status_removed(participant, status)
                }
                _ => Vec::new(),
            };
            events.push(FrameEvent { frame, event });
            events.extend(follow_up.into_iter().map(|event| FrameEvent { frame, event }));
        }
        host.end_frame();
    }

    let members = host
        .members()
        .iter()
        .map(|m| MemberState { participant: m.id, hp: host.hp(m.id).unwrap_or(0), alive: m.alive })
        .collect();

    info!(
        outcome = ?session.outcome(),
        frames = session.frame(),
        rounds = session.round(),
        "battle simulated"
    );

    Ok(BattleResponse {
        schema_version: SCHEMA_VERSION,
        outcome: session.outcome(),
        frames: session.frame(),
        rounds: session.round(),
        events,
        gauges: session.gauge_views(host.members()),
        members,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn request(extra: Value) -> String {
        let mut base = json!({
            "schema_version": 1,
            "config": { "speed": { "speed_variance": false }, "wait": { "wait_animation": false } },
            "content": {
                "skills": [{ "id": 1, "name": "Attack", "is_attack": true }],
                "statuses": [{ "id": 4, "name": "Slow", "note": "<ReduceGauge value=300>" }]
            },
            "members": [
                { "id": 1, "side": "party", "agility": 10, "hp": 100, "power": 100 },
                { "id": 2, "side": "troop", "agility": 10, "hp": 50, "power": 1 }
            ]
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        base.to_string()
    }

    fn run(extra: Value) -> Value {
        let out = simulate_battle_json(&request(extra)).unwrap();
        serde_json::from_str(&out).unwrap()
    }

    #[test]
    fn test_simulate_victory() {
        let out = run(json!({}));
        assert_eq!(out["schema_version"], 1);
        assert_eq!(out["outcome"], "victory");
        assert_eq!(out["rounds"], 1);

        let events = out["events"].as_array().unwrap();
        let first_action = events.iter().find(|e| e["type"] == "action_started").unwrap();
        // enemy precedence on the shared ready frame
        assert_eq!(first_action["participant"], 2);
        assert_eq!(first_action["frame"], 201);

        let members = out["members"].as_array().unwrap();
        assert_eq!(members[0]["hp"], 99);
        assert_eq!(members[1]["alive"], false);
    }

    #[test]
    fn test_simulate_preemptive_escape() {
        let out = run(json!({
            "encounter": "preemptive",
            "members": [
                { "id": 1, "side": "party", "agility": 10, "commands": [{ "kind": "escape" }] },
                { "id": 2, "side": "troop", "agility": 10 }
            ]
        }));
        assert_eq!(out["outcome"], "escaped");
        assert_eq!(out["frames"], 2);
    }

    #[test]
    fn test_scripted_status_drains_gauge() {
        let out = run(json!({
            "status_events": [{ "frame": 101, "participant": 1, "status": 4 }],
            "max_frames": 101
        }));
        let events = out["events"].as_array().unwrap();
        let reduced = events.iter().find(|e| e["type"] == "gauge_reduced").unwrap();
        assert_eq!(reduced["amount"], 300);
        assert_eq!(reduced["frame"], 101);
        // 99 ticks before the drain, one after
        let hero = &out["gauges"][0];
        assert!((hero["ratio"].as_f64().unwrap() - 0.2).abs() < 1e-9);
        assert!(out["outcome"].is_null());
    }

    #[test]
    fn test_deterministic_with_variance() {
        let extra = json!({ "config": { "seed": 11 } });
        let a = simulate_battle_json(&request(extra.clone())).unwrap();
        let b = simulate_battle_json(&request(extra)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_schema_version_mismatch() {
        let err = simulate_battle_json(&request(json!({ "schema_version": 9 }))).unwrap_err();
        assert!(matches!(err, AtbError::SchemaVersion { found: 9, expected: 1 }));
    }

    #[test]
    fn test_unknown_status_participant() {
        let err = simulate_battle_json(&request(json!({
            "status_events": [{ "frame": 1, "participant": 7, "status": 4 }]
        })))
        .unwrap_err();
        assert!(matches!(err, AtbError::UnknownParticipant(ParticipantId(7))));
    }

    #[test]
    fn test_malformed_json() {
        let err = simulate_battle_json("{ not json").unwrap_err();
        assert!(matches!(err, AtbError::DeserializationError(_)));
        assert!(err.is_request_error());
    }
}
