//! Turn coordinator
//!
//! Drives the battle phases on top of the [`SchedulerEngine`]:
//!
//! ```text
//! Start ─▶ Turn ◀──────────────┐
//!           │  ready player     │ command chosen / charge started
//!           ├────────▶ Input ───┤
//!           │  action started   │
//!           ├────────▶ Action ──┘ host no longer busy
//!           │  round complete
//!           └────────▶ TurnEnd ─▶ Turn (next round)
//!                        any ─▶ BattleEnd
//! ```
//!
//! One participant is in flight at a time. In strict-queue mode the `turn`
//! wait reason is raised for the whole flight, so ticking and dispatch move
//! in lock-step. In concurrent mode gauges keep filling while a command menu
//! is open.
//!
//! Enemy precedence is a single rule applied at dispatch and while a player
//! is still choosing: if a non-player is also ready, the player goes back to
//! the head of the queue and the non-player acts first.

use fxhash::FxHashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::config::{AtbConfig, SchedulingMode, WaitConfig};
use super::gauge::GaugePurpose;
use super::scheduler::SchedulerEngine;
use super::wait_reason::WaitReason;
use crate::models::{
    Combatant, DirectiveCatalog, ParticipantId, PlannedAction, Side, SkillId, StatusId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    Input,
    Turn,
    Action,
    TurnEnd,
    BattleEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encounter {
    #[default]
    Normal,
    /// Opponents start with full gauges
    Surprise,
    /// Allies start with full gauges; escape always succeeds
    Preemptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleOutcome {
    Victory,
    Defeat,
    Escaped,
}

/// A skill choice before it is resolved against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionChoice {
    pub skill: SkillId,
    #[serde(default)]
    pub target: Option<ParticipantId>,
}

/// State of a party member's command menu, polled once per update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandInput {
    /// Top-level command list
    Browsing,
    /// Skill/item list or target window
    SelectingSkillOrItem,
    Chosen(ActionChoice),
    Escape,
}

/// What the coordinator needs from the surrounding battle system.
pub trait BattleHost {
    type Member: Combatant;

    /// Current roster in registration order.
    fn members(&self) -> &[Self::Member];

    /// Action for a participant that needs no command input. `None` skips the turn.
    fn make_action(&mut self, participant: ParticipantId) -> Option<ActionChoice>;

    fn poll_command(&mut self, participant: ParticipantId) -> CommandInput;

    /// Target still valid, resources available, etc.
    fn is_action_valid(&self, _participant: ParticipantId, _action: &PlannedAction) -> bool {
        true
    }

    fn start_action(&mut self, participant: ParticipantId, action: &PlannedAction);

    /// Animation or message still playing.
    fn is_busy(&self) -> bool {
        false
    }

    fn on_action_end(&mut self, _participant: ParticipantId) {}
}

/// Coordinator output, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BattleEvent {
    BattleStarted { encounter: Encounter },
    RoundStarted { round: u32 },
    RoundEnded { round: u32 },
    ParticipantAttached { participant: ParticipantId },
    ParticipantRetired { participant: ParticipantId },
    Ready { participant: ParticipantId, purpose: GaugePurpose },
    Dispatched { participant: ParticipantId },
    /// A ready player was put back so `by` could act first
    Deferred { participant: ParticipantId, by: ParticipantId },
    /// Queued participant could no longer act
    DispatchCancelled { participant: ParticipantId },
    CommandRequested { participant: ParticipantId },
    ChargeStarted { participant: ParticipantId, skill: SkillId },
    ActionStarted { participant: ParticipantId, skill: SkillId, target: Option<ParticipantId> },
    ActionInvalid { participant: ParticipantId, skill: SkillId },
    ActionSkipped { participant: ParticipantId },
    ActionCompleted { participant: ParticipantId },
    EscapeFailed { next_ratio: f64 },
    EscapeSucceeded,
    GaugeReduced { participant: ParticipantId, amount: u32 },
    QuickenStarted { participant: ParticipantId },
    QuickenEnded { participant: ParticipantId },
    StatusExpired { participant: ParticipantId, status: StatusId },
    BattleEnded { outcome: BattleOutcome },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    AwaitingCommand,
    Executing,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    participant: ParticipantId,
    stage: Stage,
}

fn find<C: Combatant>(roster: &[C], id: ParticipantId) -> Option<&C> {
    roster.iter().find(|c| c.id() == id)
}

/// Defeat is checked before victory.
pub fn judge_outcome<C: Combatant>(roster: &[C]) -> Option<BattleOutcome> {
    let party_alive = roster.iter().any(|c| c.side().is_player() && c.is_alive());
    let troop_alive = roster.iter().any(|c| !c.side().is_player() && c.is_alive());
    if !party_alive {
        Some(BattleOutcome::Defeat)
    } else if !troop_alive {
        Some(BattleOutcome::Victory)
    } else {
        None
    }
}

/// `0.5 * party mean agility / troop mean agility`
pub fn initial_escape_ratio<C: Combatant>(roster: &[C]) -> f64 {
    let mean = |side: Side| {
        let values: Vec<f64> = roster
            .iter()
            .filter(|c| c.side() == side && c.is_alive())
            .map(|c| c.agility())
            .collect();
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };
    let troop = mean(Side::Troop);
    if troop <= 0.0 {
        return 1.0;
    }
    0.5 * mean(Side::Party) / troop
}

#[derive(Debug, Clone)]
pub struct TurnCoordinator {
    mode: SchedulingMode,
    wait: WaitConfig,
    round_order_compat: bool,
    phase: Phase,
    round: u32,
    round_started: bool,
    subject: Option<InFlight>,
    /// Actions waiting for their charge to finish
    charging: FxHashMap<ParticipantId, PlannedAction>,
    encounter: Encounter,
    escape_ratio: f64,
    outcome: Option<BattleOutcome>,
}

impl TurnCoordinator {
    pub fn new(config: &AtbConfig) -> Self {
        Self {
            mode: config.mode,
            wait: config.wait.clone(),
            round_order_compat: config.round_order_compat,
            phase: Phase::Start,
            round: 0,
            round_started: false,
            subject: None,
            charging: FxHashMap::default(),
            encounter: Encounter::Normal,
            escape_ratio: 0.5,
            outcome: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn outcome(&self) -> Option<BattleOutcome> {
        self.outcome
    }

    pub fn encounter(&self) -> Encounter {
        self.encounter
    }

    pub fn escape_ratio(&self) -> f64 {
        self.escape_ratio
    }

    /// Participant currently in flight.
    pub fn subject(&self) -> Option<ParticipantId> {
        self.subject.map(|s| s.participant)
    }

    pub fn is_awaiting_command(&self, participant: ParticipantId) -> bool {
        matches!(
            self.subject,
            Some(s) if s.participant == participant && s.stage == Stage::AwaitingCommand
        )
    }

    pub fn charging_action(&self, participant: ParticipantId) -> Option<&PlannedAction> {
        self.charging.get(&participant)
    }

    fn is_strict(&self) -> bool {
        self.mode == SchedulingMode::StrictQueue
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub fn start_battle<C: Combatant>(
        &mut self,
        engine: &mut SchedulerEngine,
        roster: &[C],
        encounter: Encounter,
        events: &mut Vec<BattleEvent>,
    ) {
        for participant in engine.build_roster(roster).attached {
            events.push(BattleEvent::ParticipantAttached { participant });
        }
        match encounter {
            Encounter::Surprise => engine.on_surprise(),
            Encounter::Preemptive => engine.on_preemptive(),
            Encounter::Normal => {}
        }
        self.encounter = encounter;
        self.escape_ratio = initial_escape_ratio(roster);
        self.phase = Phase::Start;
        info!(?encounter, escape_ratio = self.escape_ratio, "battle started");
        events.push(BattleEvent::BattleStarted { encounter });
    }

    /// Rebuild the roster and roll speeds for a new round.
    ///
    /// With `round_order_compat` on, calls made while a round is already
    /// running are ignored and `false` is returned.
    pub fn start_round<C: Combatant, R: Rng>(
        &mut self,
        engine: &mut SchedulerEngine,
        roster: &[C],
        rng: &mut R,
        events: &mut Vec<BattleEvent>,
    ) -> bool {
        if self.round_started {
            if self.round_order_compat {
                debug!(round = self.round, "round already started");
                return false;
            }
            engine.end_round();
        }

        self.round += 1;
        let diff = engine.build_roster(roster);
        for participant in diff.attached {
            events.push(BattleEvent::ParticipantAttached { participant });
        }
        for participant in diff.retired {
            self.charging.remove(&participant);
            if self.subject() == Some(participant) {
                self.release_subject(engine);
            }
            events.push(BattleEvent::ParticipantRetired { participant });
        }
        engine.roll_speeds(roster, rng);
        self.round_started = true;
        info!(round = self.round, "round started");
        events.push(BattleEvent::RoundStarted { round: self.round });
        true
    }

    fn end_round(&mut self, engine: &mut SchedulerEngine, events: &mut Vec<BattleEvent>) {
        engine.end_round();
        self.round_started = false;
        info!(round = self.round, "round ended");
        events.push(BattleEvent::RoundEnded { round: self.round });
    }

    fn finish(
        &mut self,
        engine: &mut SchedulerEngine,
        outcome: BattleOutcome,
        events: &mut Vec<BattleEvent>,
    ) {
        self.release_subject(engine);
        self.phase = Phase::BattleEnd;
        self.outcome = Some(outcome);
        info!(?outcome, round = self.round, "battle ended");
        events.push(BattleEvent::BattleEnded { outcome });
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Run one frame.
    pub fn update<H: BattleHost, R: Rng>(
        &mut self,
        engine: &mut SchedulerEngine,
        catalog: &DirectiveCatalog,
        host: &mut H,
        rng: &mut R,
        multiplier: f64,
    ) -> Vec<BattleEvent> {
        let mut events = Vec::new();
        if self.phase == Phase::BattleEnd {
            return events;
        }
        if let Some(outcome) = judge_outcome(host.members()) {
            self.finish(engine, outcome, &mut events);
            return events;
        }

        match self.phase {
            Phase::Start => {
                self.start_round(engine, host.members(), rng, &mut events);
                self.phase = Phase::Turn;
            }
            Phase::Input | Phase::Turn => {
                self.update_turn(engine, catalog, host, rng, multiplier, &mut events);
            }
            Phase::Action => self.update_action(engine, host, multiplier, &mut events),
            Phase::TurnEnd => {
                self.end_round(engine, &mut events);
                self.start_round(engine, host.members(), rng, &mut events);
                self.phase = Phase::Turn;
            }
            Phase::BattleEnd => {}
        }
        events
    }

    fn update_turn<H: BattleHost, R: Rng>(
        &mut self,
        engine: &mut SchedulerEngine,
        catalog: &DirectiveCatalog,
        host: &mut H,
        rng: &mut R,
        multiplier: f64,
        events: &mut Vec<BattleEvent>,
    ) {
        Self::tick(engine, host.members(), multiplier, events);
        self.defer_to_troop(engine);
        if self.subject.is_none() {
            self.dispatch_next(engine, catalog, host, events);
        }

        if matches!(self.subject, Some(s) if s.stage == Stage::AwaitingCommand) {
            self.poll_input(engine, catalog, host, rng, events);
        }

        if self.phase == Phase::Turn
            && self.subject.is_none()
            && engine.round_complete(host.members())
        {
            self.phase = Phase::TurnEnd;
        }
    }

    /// Advance then collect. Gauges keep filling during an action unless a
    /// wait reason (`animation`, `turn`) holds them.
    fn tick<C: Combatant>(
        engine: &mut SchedulerEngine,
        roster: &[C],
        multiplier: f64,
        events: &mut Vec<BattleEvent>,
    ) {
        engine.advance(multiplier, roster);
        for ready in engine.collect_ready(roster) {
            events.push(BattleEvent::Ready {
                participant: ready.participant,
                purpose: ready.purpose,
            });
        }
    }

    fn update_action<H: BattleHost>(
        &mut self,
        engine: &mut SchedulerEngine,
        host: &mut H,
        multiplier: f64,
        events: &mut Vec<BattleEvent>,
    ) {
        Self::tick(engine, host.members(), multiplier, events);
        if host.is_busy() {
            return;
        }
        match self.subject {
            Some(s) => self.complete(engine, host, s.participant, events),
            None => self.phase = Phase::Turn,
        }
        if engine.round_complete(host.members()) {
            self.phase = Phase::TurnEnd;
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn awaits_input<C: Combatant>(
        engine: &SchedulerEngine,
        roster: &[C],
        id: ParticipantId,
    ) -> bool {
        let charging = engine.gauge(id).is_some_and(|g| g.purpose() == GaugePurpose::SkillWait);
        !charging && find(roster, id).is_some_and(|m| m.needs_command_input())
    }

    /// Pop the next participant, letting a ready non-player go ahead of a
    /// player that would need command input.
    fn take_next<C: Combatant>(
        engine: &mut SchedulerEngine,
        roster: &[C],
        events: &mut Vec<BattleEvent>,
    ) -> Option<ParticipantId> {
        let id = engine.next_ready()?;
        let is_player = engine.side_of(id).is_some_and(|s| s.is_player());
        if is_player && Self::awaits_input(engine, roster, id) {
            if let Some(enemy) = engine.next_ready_excluding(Side::Party) {
                engine.requeue_front(id);
                debug!(deferred = %id, by = %enemy, "enemy precedence");
                events.push(BattleEvent::Deferred { participant: id, by: enemy });
                return Some(enemy);
            }
        }
        Some(id)
    }

    fn dispatch_next<H: BattleHost>(
        &mut self,
        engine: &mut SchedulerEngine,
        catalog: &DirectiveCatalog,
        host: &mut H,
        events: &mut Vec<BattleEvent>,
    ) {
        loop {
            let Some(id) = Self::take_next(engine, host.members(), events) else {
                return;
            };
            let (can_act, needs_input) = match find(host.members(), id) {
                Some(m) => (m.can_act(), Self::awaits_input(engine, host.members(), id)),
                None => (false, false),
            };
            if !can_act {
                engine.cancel_dispatch(id);
                self.charging.remove(&id);
                events.push(BattleEvent::DispatchCancelled { participant: id });
                continue;
            }
            self.dispatch(engine, catalog, host, id, needs_input, events);
            return;
        }
    }

    fn dispatch<H: BattleHost>(
        &mut self,
        engine: &mut SchedulerEngine,
        catalog: &DirectiveCatalog,
        host: &mut H,
        id: ParticipantId,
        needs_input: bool,
        events: &mut Vec<BattleEvent>,
    ) {
        debug!(participant = %id, "dispatched");
        events.push(BattleEvent::Dispatched { participant: id });
        if self.is_strict() {
            engine.raise_wait(WaitReason::Turn);
        }

        let charged = engine.gauge(id).is_some_and(|g| g.purpose() == GaugePurpose::SkillWait);
        if charged {
            self.subject = Some(InFlight { participant: id, stage: Stage::Executing });
            let action = self.charging.remove(&id);
            self.execute(engine, host, id, action, events);
            return;
        }

        if needs_input {
            self.subject = Some(InFlight { participant: id, stage: Stage::AwaitingCommand });
            self.phase = Phase::Input;
            events.push(BattleEvent::CommandRequested { participant: id });
            return;
        }

        self.subject = Some(InFlight { participant: id, stage: Stage::Executing });
        let action = host.make_action(id).and_then(|c| catalog.plan_action(c.skill, c.target));
        self.proceed(engine, host, id, action, events);
    }

    /// A player is still choosing while a non-player became ready: put the
    /// player back at the head so the next dispatch lets the non-player go first.
    fn defer_to_troop(&mut self, engine: &mut SchedulerEngine) {
        let Some(current) = self.subject else {
            return;
        };
        if current.stage != Stage::AwaitingCommand || !engine.has_ready_on(Side::Troop) {
            return;
        }
        engine.requeue_front(current.participant);
        self.release_subject(engine);
    }

    fn poll_input<H: BattleHost, R: Rng>(
        &mut self,
        engine: &mut SchedulerEngine,
        catalog: &DirectiveCatalog,
        host: &mut H,
        rng: &mut R,
        events: &mut Vec<BattleEvent>,
    ) {
        let Some(current) = self.subject else {
            return;
        };
        let id = current.participant;

        if !find(host.members(), id).is_some_and(|m| m.can_act()) {
            engine.cancel_dispatch(id);
            events.push(BattleEvent::DispatchCancelled { participant: id });
            self.release_subject(engine);
            return;
        }

        match host.poll_command(id) {
            CommandInput::Browsing => {
                engine.lower_wait(WaitReason::SelectSkillOrItem);
            }
            CommandInput::SelectingSkillOrItem => {
                if !self.is_strict() && self.wait.wait_select_skill_or_item {
                    engine.raise_wait(WaitReason::SelectSkillOrItem);
                }
            }
            CommandInput::Chosen(choice) => {
                engine.lower_wait(WaitReason::SelectSkillOrItem);
                self.subject = Some(InFlight { participant: id, stage: Stage::Executing });
                self.phase = Phase::Turn;
                let action = catalog.plan_action(choice.skill, choice.target);
                self.proceed(engine, host, id, action, events);
            }
            CommandInput::Escape => {
                engine.lower_wait(WaitReason::SelectSkillOrItem);
                self.attempt_escape(engine, host.members(), rng, events);
            }
        }
    }

    // =========================================================================
    // Actions
    // =========================================================================

    fn proceed<H: BattleHost>(
        &mut self,
        engine: &mut SchedulerEngine,
        host: &mut H,
        id: ParticipantId,
        action: Option<PlannedAction>,
        events: &mut Vec<BattleEvent>,
    ) {
        match action {
            Some(action) if action.requires_charge => {
                engine.begin_charged_action(id, &action);
                events.push(BattleEvent::ChargeStarted { participant: id, skill: action.skill_id });
                self.charging.insert(id, action);
                self.release_subject(engine);
            }
            action => self.execute(engine, host, id, action, events),
        }
    }

    fn execute<H: BattleHost>(
        &mut self,
        engine: &mut SchedulerEngine,
        host: &mut H,
        id: ParticipantId,
        action: Option<PlannedAction>,
        events: &mut Vec<BattleEvent>,
    ) {
        let Some(action) = action else {
            events.push(BattleEvent::ActionSkipped { participant: id });
            self.complete(engine, host, id, events);
            return;
        };
        if !host.is_action_valid(id, &action) {
            events.push(BattleEvent::ActionInvalid { participant: id, skill: action.skill_id });
            self.complete(engine, host, id, events);
            return;
        }

        host.start_action(id, &action);
        if self.wait.wait_animation {
            engine.raise_wait(WaitReason::Animation);
        }
        debug!(participant = %id, skill = action.skill_id.0, "action started");
        events.push(BattleEvent::ActionStarted {
            participant: id,
            skill: action.skill_id,
            target: action.target,
        });
        self.phase = Phase::Action;
    }

    /// Every dispatched action ends here, executed or not.
    fn complete<H: BattleHost>(
        &mut self,
        engine: &mut SchedulerEngine,
        host: &mut H,
        id: ParticipantId,
        events: &mut Vec<BattleEvent>,
    ) {
        host.on_action_end(id);
        engine.on_action_complete(id);
        self.charging.remove(&id);
        events.push(BattleEvent::ActionCompleted { participant: id });
        self.release_subject(engine);
    }

    fn release_subject(&mut self, engine: &mut SchedulerEngine) {
        self.subject = None;
        engine.lower_wait(WaitReason::Turn);
        engine.lower_wait(WaitReason::Animation);
        engine.lower_wait(WaitReason::SelectSkillOrItem);
        if self.phase != Phase::BattleEnd {
            self.phase = Phase::Turn;
        }
    }

    // =========================================================================
    // Escape
    // =========================================================================

    /// Roll an escape. A preemptive battle always escapes.
    pub fn attempt_escape<C: Combatant, R: Rng>(
        &mut self,
        engine: &mut SchedulerEngine,
        roster: &[C],
        rng: &mut R,
        events: &mut Vec<BattleEvent>,
    ) -> bool {
        let success =
            self.encounter == Encounter::Preemptive || rng.gen::<f64>() < self.escape_ratio;
        if success {
            events.push(BattleEvent::EscapeSucceeded);
            self.finish(engine, BattleOutcome::Escaped, events);
        } else {
            self.escape_failed(engine, roster, events);
        }
        success
    }

    /// Failed escape: gauges are reset in the opponents' favour and the
    /// next attempt becomes more likely.
    pub fn escape_failed<C: Combatant>(
        &mut self,
        engine: &mut SchedulerEngine,
        roster: &[C],
        events: &mut Vec<BattleEvent>,
    ) {
        self.escape_ratio += 0.1;
        engine.on_escape_failure(roster);
        self.release_subject(engine);
        info!(next_ratio = self.escape_ratio, "escape failed");
        events.push(BattleEvent::EscapeFailed { next_ratio: self.escape_ratio });
    }
}
