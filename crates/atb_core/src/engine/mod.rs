pub mod config;
pub mod coordinator;
pub mod debug_flags;
pub mod gauge;
pub mod scheduler;
pub mod status_hook;
pub mod wait_reason;

pub use config::{AtbConfig, SchedulingMode, SpeedConfig, WaitConfig};
pub use coordinator::{
    judge_outcome, ActionChoice, BattleEvent, BattleHost, BattleOutcome, CommandInput, Encounter,
    Phase, TurnCoordinator,
};
pub use gauge::{Gauge, GaugePurpose, GAUGE_MAX};
pub use scheduler::{ReadyEvent, RosterDiff, SchedulerEngine};
pub use status_hook::{ActiveStatus, StatusEffect, StatusEffectHook};
pub use wait_reason::{WaitGate, WaitReason};
