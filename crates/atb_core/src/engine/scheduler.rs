//! Gauge scheduler
//!
//! Owns one [`Gauge`] per tracked participant and the ready queue.
//!
//! ## Per tick
//! 1. `advance` fills every gauge (skipped while any wait reason is raised)
//! 2. `collect_ready` queues every gauge that reached max
//! 3. the coordinator pops with `next_ready`
//!
//! All gauges are advanced before any readiness is evaluated, and queue ties
//! follow roster registration order.
//!
//! ## Relative speed
//! ```text
//! speed_i = attribute_i / min(attribute)           (capped at max_actions_per_turn)
//! charge  = (attribute + skill_speed [+ attack_speed]) * base_skill_wait / min(attribute)
//! ```

use fxhash::{FxHashMap, FxHashSet};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace};

use super::config::{AtbConfig, SchedulingMode, SpeedConfig};
use super::debug_flags::{gauge_trace_enabled, queue_trace_enabled};
use super::gauge::{Gauge, GaugePurpose};
use super::wait_reason::{WaitGate, WaitReason};
use crate::models::{Combatant, ParticipantId, PlannedAction, Side};

/// A gauge plus the per-round inputs of its speed formula.
#[derive(Debug, Clone)]
struct Slot {
    gauge: Gauge,
    side: Side,
    /// Speed attribute rolled at round start
    attribute: f64,
    attack_speed: f64,
}

/// Membership change produced by `build_roster`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterDiff {
    pub attached: Vec<ParticipantId>,
    pub retired: Vec<ParticipantId>,
}

impl RosterDiff {
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty() && self.retired.is_empty()
    }
}

/// A gauge that became ready during `collect_ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyEvent {
    pub participant: ParticipantId,
    pub purpose: GaugePurpose,
}

#[derive(Debug, Clone, Copy)]
struct Liveness {
    alive: bool,
    can_move: bool,
}

fn liveness_of<C: Combatant>(roster: &[C]) -> FxHashMap<ParticipantId, Liveness> {
    roster
        .iter()
        .map(|c| (c.id(), Liveness { alive: c.is_alive(), can_move: c.can_move() }))
        .collect()
}

#[derive(Debug, Clone)]
pub struct SchedulerEngine {
    mode: SchedulingMode,
    speed: SpeedConfig,
    slots: Vec<Slot>,
    ready_queue: VecDeque<ParticipantId>,
    completed_this_round: FxHashSet<ParticipantId>,
    wait: WaitGate,
}

impl SchedulerEngine {
    pub fn new(config: &AtbConfig) -> Self {
        Self {
            mode: config.mode,
            speed: config.speed.clone(),
            slots: Vec::new(),
            ready_queue: VecDeque::new(),
            completed_this_round: FxHashSet::default(),
            wait: WaitGate::new(),
        }
    }

    fn slot(&self, id: ParticipantId) -> Option<&Slot> {
        self.slots.iter().find(|s| s.gauge.participant() == id)
    }

    fn slot_mut(&mut self, id: ParticipantId) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.gauge.participant() == id)
    }

    // =========================================================================
    // Roster
    // =========================================================================

    /// Attach gauges for newcomers and retire gauges of departed participants.
    ///
    /// Dead participants stay tracked; only leaving the roster retires a gauge.
    pub fn build_roster<C: Combatant>(&mut self, roster: &[C]) -> RosterDiff {
        let mut diff = RosterDiff::default();

        for member in roster {
            let id = member.id();
            if self.slot(id).is_none() {
                self.slots.push(Slot {
                    gauge: Gauge::new(id),
                    side: member.side(),
                    attribute: member.agility() + member.attack_speed(),
                    attack_speed: member.attack_speed(),
                });
                diff.attached.push(id);
            }
        }

        let present: FxHashSet<ParticipantId> = roster.iter().map(|c| c.id()).collect();
        let retired: Vec<ParticipantId> = self
            .slots
            .iter()
            .map(|s| s.gauge.participant())
            .filter(|id| !present.contains(id))
            .collect();
        for id in &retired {
            self.slots.retain(|s| s.gauge.participant() != *id);
            self.ready_queue.retain(|q| q != id);
            self.completed_this_round.remove(id);
        }
        diff.retired = retired;

        if !diff.is_empty() {
            debug!(attached = ?diff.attached, retired = ?diff.retired, "roster rebuilt");
        }
        diff
    }

    pub fn is_tracked(&self, id: ParticipantId) -> bool {
        self.slot(id).is_some()
    }

    pub fn tracked(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.slots.iter().map(|s| s.gauge.participant())
    }

    pub fn side_of(&self, id: ParticipantId) -> Option<Side> {
        self.slot(id).map(|s| s.side)
    }

    pub fn gauge(&self, id: ParticipantId) -> Option<&Gauge> {
        self.slot(id).map(|s| &s.gauge)
    }

    /// Speed attribute currently used for `id` (rolled at round start).
    pub fn attribute(&self, id: ParticipantId) -> Option<f64> {
        self.slot(id).map(|s| s.attribute)
    }

    // =========================================================================
    // Speed
    // =========================================================================

    /// Roll every tracked participant's speed attribute for the new round,
    /// then recompute relative speeds.
    ///
    /// With variance on, the attribute is `agility + rand(0..5 + agility/4) +
    /// attack_speed`; otherwise `agility + attack_speed`.
    pub fn roll_speeds<C: Combatant, R: Rng>(&mut self, roster: &[C], rng: &mut R) {
        for member in roster {
            let variance = self.speed.speed_variance;
            let Some(slot) = self.slot_mut(member.id()) else {
                continue;
            };
            let agility = member.agility().max(0.0);
            let spread = (5.0 + agility / 4.0).floor() as u32;
            let bonus = if variance && spread > 0 { rng.gen_range(0..spread) as f64 } else { 0.0 };
            slot.attribute = agility + bonus + member.attack_speed();
            slot.attack_speed = member.attack_speed();
        }
        self.recompute_speeds();
    }

    fn min_attribute(&self) -> f64 {
        self.slots
            .iter()
            .map(|s| s.attribute)
            .filter(|a| a.is_finite() && *a > 0.0)
            .fold(None, |min: Option<f64>, a| Some(min.map_or(a, |m| m.min(a))))
            .unwrap_or(1.0)
    }

    /// `speed_i = attribute_i / min(attribute)`, capped. Participants charging
    /// a delayed action keep their charge speed.
    pub fn recompute_speeds(&mut self) {
        let min = self.min_attribute();
        let cap = self.speed.max_actions_per_turn;
        for slot in &mut self.slots {
            if slot.gauge.purpose() == GaugePurpose::SkillWait {
                continue;
            }
            slot.gauge.set_speed(slot.attribute / min, cap);
        }
        debug!(min_attribute = min, "relative speeds recomputed");
    }

    /// Restore the normal relative speed of a single participant.
    pub fn recompute_speed_for(&mut self, id: ParticipantId) {
        let min = self.min_attribute();
        let cap = self.speed.max_actions_per_turn;
        if let Some(slot) = self.slot_mut(id) {
            slot.gauge.set_speed(slot.attribute / min, cap);
        }
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Advance every gauge by one tick. Returns `false` when suspended.
    pub fn advance<C: Combatant>(&mut self, multiplier: f64, roster: &[C]) -> bool {
        if !self.wait.is_open() {
            return false;
        }
        let liveness = liveness_of(roster);
        let base = self.speed.base_gauge_speed;
        for slot in &mut self.slots {
            let Some(live) = liveness.get(&slot.gauge.participant()) else {
                continue;
            };
            slot.gauge.tick(base, multiplier, live.alive, live.can_move);
        }
        if gauge_trace_enabled() {
            for slot in &self.slots {
                trace!(
                    participant = %slot.gauge.participant(),
                    value = slot.gauge.value(),
                    speed = slot.gauge.speed(),
                    "gauge"
                );
            }
        }
        true
    }

    /// Queue every gauge that reached max.
    ///
    /// Dead participants are forced to zero first. In concurrent mode the queue
    /// is then stably repartitioned so non-players precede players.
    pub fn collect_ready<C: Combatant>(&mut self, roster: &[C]) -> Vec<ReadyEvent> {
        let liveness = liveness_of(roster);
        let mut events = Vec::new();

        for slot in &mut self.slots {
            let id = slot.gauge.participant();
            let alive = liveness.get(&id).is_some_and(|l| l.alive);
            if !alive {
                slot.gauge.set_value(0.0);
            }
            if slot.gauge.is_ready() {
                slot.gauge.mark_dispatched();
                if !self.ready_queue.contains(&id) {
                    self.ready_queue.push_back(id);
                }
                events.push(ReadyEvent { participant: id, purpose: slot.gauge.purpose() });
            }
        }

        if self.mode == SchedulingMode::Concurrent {
            self.prioritize_troop();
        }
        if queue_trace_enabled() {
            trace!(queue = ?self.ready_queue, "ready queue");
        }
        events
    }

    /// Stable partition: every non-player entry ahead of every player entry.
    fn prioritize_troop(&mut self) {
        let (troop, party): (Vec<ParticipantId>, Vec<ParticipantId>) =
            self.ready_queue.iter().copied().partition(|id| !self.is_player(*id));
        self.ready_queue = troop.into_iter().chain(party).collect();
    }

    fn is_player(&self, id: ParticipantId) -> bool {
        self.side_of(id).is_some_and(|s| s.is_player())
    }

    fn is_frozen(&self, id: ParticipantId) -> bool {
        self.gauge(id).is_some_and(|g| g.is_stopped())
    }

    // =========================================================================
    // Ready queue
    // =========================================================================

    pub fn ready_queue(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.ready_queue.iter().copied()
    }

    pub fn is_queued(&self, id: ParticipantId) -> bool {
        self.ready_queue.contains(&id)
    }

    /// Pop the first entry whose gauge is not frozen.
    pub fn next_ready(&mut self) -> Option<ParticipantId> {
        let pos = self.ready_queue.iter().position(|id| !self.is_frozen(*id))?;
        self.ready_queue.remove(pos)
    }

    /// Like `next_ready`, skipping entries on the `excluded` side.
    pub fn next_ready_excluding(&mut self, excluded: Side) -> Option<ParticipantId> {
        let pos = self
            .ready_queue
            .iter()
            .position(|id| !self.is_frozen(*id) && self.side_of(*id) != Some(excluded))?;
        self.ready_queue.remove(pos)
    }

    /// Whether a non-frozen entry of `side` is waiting in the queue.
    pub fn has_ready_on(&self, side: Side) -> bool {
        self.ready_queue
            .iter()
            .any(|id| !self.is_frozen(*id) && self.side_of(*id) == Some(side))
    }

    /// Put a participant back at the head of the queue.
    pub fn requeue_front(&mut self, id: ParticipantId) {
        self.ready_queue.retain(|q| *q != id);
        self.ready_queue.push_front(id);
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Start charging a delayed action: clear the gauge and install the charge speed.
    pub fn begin_charged_action(&mut self, id: ParticipantId, action: &PlannedAction) -> bool {
        let min = self.min_attribute();
        let cap = self.speed.max_actions_per_turn;
        let base_wait = self.speed.base_skill_wait_gauge_speed;
        let Some(slot) = self.slot_mut(id) else {
            return false;
        };
        let mut charge = slot.attribute + action.speed_modifier;
        if action.is_attack {
            charge += slot.attack_speed;
        }
        slot.gauge.reset();
        slot.gauge.set_speed(charge * base_wait / min, cap);
        slot.gauge.set_purpose(GaugePurpose::SkillWait);
        debug!(participant = %id, speed = slot.gauge.speed(), "charge started");
        true
    }

    /// Leave the charge: clear the gauge and restore the normal relative speed.
    pub fn end_charged_action(&mut self, id: ParticipantId) {
        let Some(slot) = self.slot_mut(id) else {
            return;
        };
        slot.gauge.reset();
        slot.gauge.set_purpose(GaugePurpose::Time);
        self.recompute_speed_for(id);
        debug!(participant = %id, "charge ended");
    }

    /// Clear the actor's gauge and record the completion for this round.
    pub fn on_action_complete(&mut self, id: ParticipantId) {
        let Some(slot) = self.slot_mut(id) else {
            return;
        };
        let was_charging = slot.gauge.purpose() == GaugePurpose::SkillWait;
        slot.gauge.reset();
        self.completed_this_round.insert(id);
        if was_charging {
            self.end_charged_action(id);
        }
    }

    /// Release a dispatched participant that cannot act (died or stunned while
    /// queued). The gauge restarts from zero; no completion is recorded.
    pub fn cancel_dispatch(&mut self, id: ParticipantId) {
        self.ready_queue.retain(|q| *q != id);
        let Some(slot) = self.slot_mut(id) else {
            return;
        };
        let was_charging = slot.gauge.purpose() == GaugePurpose::SkillWait;
        slot.gauge.reset();
        if was_charging {
            self.end_charged_action(id);
        }
    }

    pub fn has_completed(&self, id: ParticipantId) -> bool {
        self.completed_this_round.contains(&id)
    }

    pub fn completed_count(&self) -> usize {
        self.completed_this_round.len()
    }

    /// Every participant currently able to act has completed an action.
    pub fn round_complete<C: Combatant>(&self, roster: &[C]) -> bool {
        roster
            .iter()
            .filter(|c| c.can_act() && self.is_tracked(c.id()))
            .all(|c| self.completed_this_round.contains(&c.id()))
    }

    pub fn end_round(&mut self) {
        self.completed_this_round.clear();
    }

    // =========================================================================
    // Battle events
    // =========================================================================

    /// Failed escape: surviving allies restart from zero, surviving opponents
    /// get a full gauge.
    ///
    /// The queue is emptied, so every gauge drops its dispatched mark, the
    /// dead included; otherwise a revived participant could never queue again.
    pub fn on_escape_failure<C: Combatant>(&mut self, roster: &[C]) {
        self.completed_this_round.clear();
        self.ready_queue.clear();
        let liveness = liveness_of(roster);
        for slot in &mut self.slots {
            slot.gauge.reset();
            let alive = liveness.get(&slot.gauge.participant()).is_some_and(|l| l.alive);
            if alive && !slot.side.is_player() {
                slot.gauge.fill();
            }
        }
        debug!("escape failed: gauges reset");
    }

    /// Ambushed: every opponent starts full.
    pub fn on_surprise(&mut self) {
        self.fill_side(Side::Troop);
    }

    /// Preemptive strike: every ally starts full.
    pub fn on_preemptive(&mut self) {
        self.fill_side(Side::Party);
    }

    fn fill_side(&mut self, side: Side) {
        for slot in self.slots.iter_mut().filter(|s| s.side == side) {
            slot.gauge.fill();
        }
    }

    // =========================================================================
    // Status hooks
    // =========================================================================

    pub fn apply_gauge_reduction(&mut self, id: ParticipantId, amount: u32) {
        if let Some(slot) = self.slot_mut(id) {
            slot.gauge.drain(amount);
        }
    }

    /// Quicken `id` and freeze every other tracked participant.
    pub fn apply_quicken(&mut self, id: ParticipantId) {
        for slot in &mut self.slots {
            if slot.gauge.participant() == id {
                slot.gauge.start_quicken();
            } else {
                slot.gauge.stop();
            }
        }
    }

    pub fn clear_quicken(&mut self, id: ParticipantId) {
        for slot in &mut self.slots {
            if slot.gauge.participant() == id {
                slot.gauge.end_quicken();
            } else {
                slot.gauge.resume();
            }
        }
    }

    // =========================================================================
    // Suspension
    // =========================================================================

    pub fn raise_wait(&mut self, reason: WaitReason) -> bool {
        self.wait.raise(reason)
    }

    pub fn lower_wait(&mut self, reason: WaitReason) -> bool {
        self.wait.lower(reason)
    }

    pub fn is_suspended(&self) -> bool {
        !self.wait.is_open()
    }

    pub fn wait_gate(&self) -> &WaitGate {
        &self.wait
    }
}
