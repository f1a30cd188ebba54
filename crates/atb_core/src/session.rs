//! # Battle session
//!
//! One owned value per battle: the scheduler, the coordinator, the status
//! hook, the parsed directive catalog and the seeded RNG. Constructed at
//! battle start and dropped at battle end; nothing outlives it.
//!
//! ```text
//! host frame loop
//!   └─ session.update(&mut host)
//!        ├─ coordinator.update   (tick, collect, dispatch)
//!        └─ status countdowns    (ActionCompleted / RoundEnded)
//! ```

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{
    AtbConfig, BattleEvent, BattleHost, BattleOutcome, Encounter, GaugePurpose, Phase,
    SchedulerEngine, StatusEffectHook, TurnCoordinator, WaitReason,
};
use crate::error::Result;
use crate::models::{Combatant, ContentDb, DirectiveCatalog, ParticipantId, StatusId};

/// Per-participant gauge state for the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeView {
    pub participant: ParticipantId,
    /// `value / GAUGE_MAX` in [0, 1]
    pub ratio: f64,
    pub ready: bool,
    /// Full and queued, waiting for its turn to be dispatched
    pub dispatched: bool,
    pub purpose: GaugePurpose,
    pub visible: bool,
}

#[derive(Debug, Clone)]
pub struct BattleSession {
    config: AtbConfig,
    engine: SchedulerEngine,
    coordinator: TurnCoordinator,
    hook: StatusEffectHook,
    catalog: DirectiveCatalog,
    rng: ChaCha8Rng,
    fast_forward: bool,
    frame: u64,
}

impl BattleSession {
    /// Validate the config and parse every directive in `content` once.
    pub fn new(config: AtbConfig, content: &ContentDb) -> Result<Self> {
        let catalog = DirectiveCatalog::from_content(content)?;
        Self::with_catalog(config, catalog)
    }

    pub fn with_catalog(config: AtbConfig, catalog: DirectiveCatalog) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine: SchedulerEngine::new(&config),
            coordinator: TurnCoordinator::new(&config),
            hook: StatusEffectHook::new(),
            catalog,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            fast_forward: false,
            frame: 0,
            config,
        })
    }

    pub fn config(&self) -> &AtbConfig {
        &self.config
    }

    pub fn engine(&self) -> &SchedulerEngine {
        &self.engine
    }

    pub fn coordinator(&self) -> &TurnCoordinator {
        &self.coordinator
    }

    pub fn hook(&self) -> &StatusEffectHook {
        &self.hook
    }

    pub fn catalog(&self) -> &DirectiveCatalog {
        &self.catalog
    }

    pub fn phase(&self) -> Phase {
        self.coordinator.phase()
    }

    pub fn outcome(&self) -> Option<BattleOutcome> {
        self.coordinator.outcome()
    }

    pub fn round(&self) -> u32 {
        self.coordinator.round()
    }

    /// Frames run through `update` so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn is_finished(&self) -> bool {
        self.phase() == Phase::BattleEnd
    }

    // ========== Lifecycle ==========

    pub fn on_battle_start<C: Combatant>(
        &mut self,
        roster: &[C],
        encounter: Encounter,
    ) -> Vec<BattleEvent> {
        let mut events = Vec::new();
        self.coordinator.start_battle(&mut self.engine, roster, encounter, &mut events);
        events
    }

    /// External round start. Ignored mid-round when `round_order_compat` is on.
    pub fn on_round_start<C: Combatant>(&mut self, roster: &[C]) -> Vec<BattleEvent> {
        let mut events = Vec::new();
        self.coordinator.start_round(&mut self.engine, roster, &mut self.rng, &mut events);
        self.forget_retired(&events);
        events
    }

    pub fn on_surprise(&mut self) {
        self.engine.on_surprise();
    }

    pub fn on_preemptive(&mut self) {
        self.engine.on_preemptive();
    }

    /// The host resolved an escape attempt itself and it failed.
    pub fn on_escape_attempt_failed<C: Combatant>(&mut self, roster: &[C]) -> Vec<BattleEvent> {
        let mut events = Vec::new();
        self.coordinator.escape_failed(&mut self.engine, roster, &mut events);
        events
    }

    /// Roll an escape with the session RNG.
    pub fn attempt_escape<C: Combatant>(&mut self, roster: &[C]) -> Vec<BattleEvent> {
        let mut events = Vec::new();
        self.coordinator.attempt_escape(&mut self.engine, roster, &mut self.rng, &mut events);
        events
    }

    // ========== Frame ==========

    /// Run one frame. Statuses whose countdown ran out are reported as
    /// `StatusExpired` right after the event that triggered them.
    pub fn update<H: BattleHost>(&mut self, host: &mut H) -> Vec<BattleEvent> {
        self.frame += 1;
        let multiplier = self.config.fast_forward_multiplier(self.fast_forward);
        let raw = self.coordinator.update(
            &mut self.engine,
            &self.catalog,
            host,
            &mut self.rng,
            multiplier,
        );

        let mut events = Vec::with_capacity(raw.len());
        for event in raw {
            let expired: Vec<(ParticipantId, StatusId)> = match &event {
                BattleEvent::ActionCompleted { participant } => self
                    .hook
                    .on_action_end(*participant)
                    .into_iter()
                    .map(|status| (*participant, status))
                    .collect(),
                BattleEvent::RoundEnded { .. } => self.hook.on_round_end(),
                BattleEvent::ParticipantRetired { participant } => {
                    self.hook.forget(&mut self.engine, *participant);
                    Vec::new()
                }
                _ => Vec::new(),
            };
            events.push(event);
            events.extend(expired.into_iter().map(|(participant, status)| {
                BattleEvent::StatusExpired { participant, status }
            }));
        }
        events
    }

    fn forget_retired(&mut self, events: &[BattleEvent]) {
        for event in events {
            if let BattleEvent::ParticipantRetired { participant } = event {
                self.hook.forget(&mut self.engine, *participant);
            }
        }
    }

    pub fn set_fast_forward(&mut self, held: bool) {
        self.fast_forward = held;
    }

    pub fn is_fast_forward(&self) -> bool {
        self.fast_forward
    }

    /// Suspend ticking for a host-side reason (menus, cut-ins).
    pub fn raise_wait(&mut self, reason: WaitReason) -> bool {
        self.engine.raise_wait(reason)
    }

    pub fn lower_wait(&mut self, reason: WaitReason) -> bool {
        self.engine.lower_wait(reason)
    }

    // ========== Statuses ==========

    pub fn on_status_applied(
        &mut self,
        participant: ParticipantId,
        status: StatusId,
    ) -> Vec<BattleEvent> {
        let effect =
            self.hook.on_status_applied(&mut self.engine, &self.catalog, participant, status);
        let mut events = Vec::new();
        if let Some(amount) = effect.gauge_reduced {
            events.push(BattleEvent::GaugeReduced { participant, amount });
        }
        if effect.quickened {
            events.push(BattleEvent::QuickenStarted { participant });
        }
        events
    }

    pub fn on_status_removed(
        &mut self,
        participant: ParticipantId,
        status: StatusId,
    ) -> Vec<BattleEvent> {
        if self.hook.on_status_removed(&mut self.engine, participant, status) {
            vec![BattleEvent::QuickenEnded { participant }]
        } else {
            Vec::new()
        }
    }

    /// Every status of `participant` is about to be cleared.
    pub fn on_statuses_cleared(&mut self, participant: ParticipantId) -> Vec<BattleEvent> {
        let had_quicken = self.hook.statuses(participant).iter().any(|s| s.quicken);
        let cleared = self.hook.on_statuses_cleared(&mut self.engine, participant);
        debug!(participant = %participant, count = cleared.len(), "statuses cleared");
        if had_quicken {
            vec![BattleEvent::QuickenEnded { participant }]
        } else {
            Vec::new()
        }
    }

    // ========== Views ==========

    /// Gauges in roster order. Non-player gauges are hidden when
    /// `show_enemy_gauge` is off, and once the participant is dead.
    pub fn gauge_views<C: Combatant>(&self, roster: &[C]) -> Vec<GaugeView> {
        roster
            .iter()
            .filter_map(|member| {
                let gauge = self.engine.gauge(member.id())?;
                let visible = member.side().is_player()
                    || (self.config.show_enemy_gauge && member.is_alive());
                Some(GaugeView {
                    participant: member.id(),
                    ratio: gauge.fill_ratio(),
                    ready: gauge.is_ready(),
                    dispatched: gauge.is_dispatched(),
                    purpose: gauge.purpose(),
                    visible,
                })
            })
            .collect()
    }
}
