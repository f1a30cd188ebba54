//! Status effect interplay with the gauges.
//!
//! The host reports status lifecycle; the hook looks the status up in the
//! [`DirectiveCatalog`] and forwards its directives to the scheduler:
//! - `<ReduceGauge value=N>` drains N points once, when first applied
//! - `<Quick>` quickens the bearer and freezes everyone else until removed
//!
//! The hook also counts down statuses with an auto-removal timing and
//! reports the ones that expired. Removing them stays the host's job.

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::scheduler::SchedulerEngine;
use crate::models::{AutoRemoval, DirectiveCatalog, ParticipantId, StatusId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStatus {
    pub status: StatusId,
    pub auto_removal: AutoRemoval,
    /// Countdown steps left; ignored for `AutoRemoval::None`
    pub remaining: u32,
    pub quicken: bool,
}

/// What applying a status did to the gauges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusEffect {
    pub gauge_reduced: Option<u32>,
    pub quickened: bool,
}

impl StatusEffect {
    pub fn is_empty(&self) -> bool {
        self.gauge_reduced.is_none() && !self.quickened
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusEffectHook {
    active: FxHashMap<ParticipantId, Vec<ActiveStatus>>,
}

impl StatusEffectHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self, participant: ParticipantId) -> &[ActiveStatus] {
        self.active.get(&participant).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_status(&self, participant: ParticipantId, status: StatusId) -> bool {
        self.statuses(participant).iter().any(|s| s.status == status)
    }

    fn holds_quicken(&self, participant: ParticipantId) -> bool {
        self.statuses(participant).iter().any(|s| s.quicken)
    }

    /// A status was added to `participant`.
    ///
    /// Re-applying a status the participant already has only refreshes its
    /// countdown; directive effects fire on the first application.
    pub fn on_status_applied(
        &mut self,
        engine: &mut SchedulerEngine,
        catalog: &DirectiveCatalog,
        participant: ParticipantId,
        status: StatusId,
    ) -> StatusEffect {
        let Some(entry) = catalog.status(status) else {
            return StatusEffect::default();
        };

        let list = self.active.entry(participant).or_default();
        if let Some(existing) = list.iter_mut().find(|s| s.status == status) {
            existing.remaining = entry.duration;
            return StatusEffect::default();
        }
        list.push(ActiveStatus {
            status,
            auto_removal: entry.auto_removal,
            remaining: entry.duration,
            quicken: entry.directives.quicken,
        });

        let mut effect = StatusEffect::default();
        if let Some(amount) = entry.directives.reduce_gauge {
            engine.apply_gauge_reduction(participant, amount);
            effect.gauge_reduced = Some(amount);
        }
        if entry.directives.quicken {
            engine.apply_quicken(participant);
            effect.quickened = true;
        }
        if !effect.is_empty() {
            debug!(
                participant = %participant,
                status = status.0,
                ?effect,
                "status directives applied"
            );
        }
        effect
    }

    /// A status was removed from `participant`. Returns `true` if a quicken
    /// effect ended.
    pub fn on_status_removed(
        &mut self,
        engine: &mut SchedulerEngine,
        participant: ParticipantId,
        status: StatusId,
    ) -> bool {
        let Some(list) = self.active.get_mut(&participant) else {
            return false;
        };
        let Some(pos) = list.iter().position(|s| s.status == status) else {
            return false;
        };
        let removed = list.remove(pos);
        if list.is_empty() {
            self.active.remove(&participant);
        }

        if removed.quicken && !self.holds_quicken(participant) {
            self.release_quicken(engine, participant);
            return true;
        }
        false
    }

    /// All statuses of `participant` were cleared at once (death, recovery).
    /// Returns the statuses that were tracked.
    pub fn on_statuses_cleared(
        &mut self,
        engine: &mut SchedulerEngine,
        participant: ParticipantId,
    ) -> Vec<StatusId> {
        let Some(list) = self.active.remove(&participant) else {
            return Vec::new();
        };
        if list.iter().any(|s| s.quicken) {
            self.release_quicken(engine, participant);
        }
        list.into_iter().map(|s| s.status).collect()
    }

    /// Stop tracking a participant that left the roster.
    pub fn forget(&mut self, engine: &mut SchedulerEngine, participant: ParticipantId) {
        self.on_statuses_cleared(engine, participant);
    }

    fn release_quicken(&self, engine: &mut SchedulerEngine, participant: ParticipantId) {
        engine.clear_quicken(participant);
        // another bearer still holds its own quicken
        let mut others: Vec<ParticipantId> = self
            .active
            .iter()
            .filter(|(id, list)| **id != participant && list.iter().any(|s| s.quicken))
            .map(|(id, _)| *id)
            .collect();
        others.sort();
        for other in others {
            engine.apply_quicken(other);
        }
        debug!(participant = %participant, "quicken released");
    }

    /// The bearer finished an action: count down its action-end statuses.
    pub fn on_action_end(&mut self, participant: ParticipantId) -> Vec<StatusId> {
        let Some(list) = self.active.get_mut(&participant) else {
            return Vec::new();
        };
        count_down(list, AutoRemoval::ActionEnd)
    }

    /// A round ended: count down every round-end status.
    pub fn on_round_end(&mut self) -> Vec<(ParticipantId, StatusId)> {
        let mut expired = Vec::new();
        for (participant, list) in self.active.iter_mut() {
            for status in count_down(list, AutoRemoval::RoundEnd) {
                expired.push((*participant, status));
            }
        }
        expired.sort();
        expired
    }
}

/// Decrement matching timers; statuses reaching zero are reported once.
fn count_down(list: &mut [ActiveStatus], timing: AutoRemoval) -> Vec<StatusId> {
    let mut expired = Vec::new();
    for status in list.iter_mut().filter(|s| s.auto_removal == timing && s.remaining > 0) {
        status.remaining -= 1;
        if status.remaining == 0 {
            expired.push(status.status);
        }
    }
    expired
}
