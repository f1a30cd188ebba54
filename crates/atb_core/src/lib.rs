//! # atb_core - Active-Time Battle Gauge Scheduler
//!
//! Decides which battle participant acts next. Every participant owns a
//! gauge that fills at a speed relative to the slowest participant of the
//! round; a full gauge makes its owner eligible to act.
//!
//! ## Features
//! - Concurrent (ATB) and strict-queue (CTB) scheduling
//! - Delayed actions that charge through a second gauge cycle
//! - Status directives: instant gauge drain and quicken
//! - Deterministic per seed (speed roll and escape checks)
//! - JSON API for scripted battles
//!
//! ```rust
//! use atb_core::{AtbConfig, BattleSession, ContentDb};
//!
//! let session = BattleSession::new(AtbConfig::ctb(), &ContentDb::default()).unwrap();
//! assert_eq!(session.round(), 0);
//! ```

// Engine entry points take the engine, catalog, host and rng side by side
#![allow(clippy::too_many_arguments)]
// Struct initialization pattern used intentionally
#![allow(clippy::field_reassign_with_default)]

pub mod api;
pub mod engine;
pub mod error;
pub mod models;
pub mod session;

// Re-export main API functions
pub use api::{
    simulate_battle, simulate_battle_json, BattleRequest, BattleResponse, SCHEMA_VERSION,
};
pub use error::{AtbError, Result};

pub use engine::{
    AtbConfig, BattleEvent, BattleHost, BattleOutcome, Encounter, Gauge, GaugePurpose, Phase,
    SchedulerEngine, SchedulingMode, StatusEffectHook, TurnCoordinator, WaitReason, GAUGE_MAX,
};
pub use models::{
    Battler, Combatant, ContentDb, ParticipantId, PlannedAction, Side, SkillId, StatusId,
};
pub use session::{BattleSession, GaugeView};
