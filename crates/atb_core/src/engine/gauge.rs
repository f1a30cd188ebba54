//! Readiness gauge
//!
//! One gauge per roster participant. The value races from 0 to
//! [`GAUGE_MAX`]; reaching max makes the participant eligible to act.
//!
//! ```text
//! Time:      0 ──fill──▶ 1000 ─ready─▶ dispatched ─action─▶ reset ─▶ 0
//! SkillWait: 0 ──charge─▶ 1000 ─ready─▶ dispatched ─action executes─▶ Time
//! ```

use serde::{Deserialize, Serialize};

use crate::models::ParticipantId;

/// Gauge ceiling; a gauge is full at exactly this value.
pub const GAUGE_MAX: u32 = 1000;

/// Floor for any installed speed so a negative skill modifier cannot stall a gauge.
pub const MIN_GAUGE_SPEED: f64 = 0.05;

const MAX: f64 = GAUGE_MAX as f64;

/// What the gauge is currently counting toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugePurpose {
    /// Normal readiness race
    #[default]
    Time,
    /// Counting down a delayed-action charge
    SkillWait,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gauge {
    participant: ParticipantId,
    value: f64,
    speed: f64,
    purpose: GaugePurpose,
    /// Frozen by someone else's quicken or by escape handling
    stopped: bool,
    /// Reached max and already queued; not ready again until `reset`
    dispatched_pending: bool,
    quickened: bool,
}

impl Gauge {
    pub fn new(participant: ParticipantId) -> Self {
        Self {
            participant,
            value: 0.0,
            speed: 1.0,
            purpose: GaugePurpose::Time,
            stopped: false,
            dispatched_pending: false,
            quickened: false,
        }
    }

    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    /// Current value, truncated to whole gauge points.
    pub fn value(&self) -> u32 {
        self.value as u32
    }

    pub fn raw_value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = if value.is_nan() { 0.0 } else { value.clamp(0.0, MAX) };
    }

    /// Subtract `amount` points, clamped at zero.
    pub fn drain(&mut self, amount: u32) {
        self.set_value(self.value - amount as f64);
    }

    pub fn fill(&mut self) {
        self.value = MAX;
    }

    /// `value / GAUGE_MAX` in [0, 1]
    pub fn fill_ratio(&self) -> f64 {
        self.value / MAX
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Install a relative speed, capped at `max_actions_per_turn`.
    pub fn set_speed(&mut self, raw: f64, max_actions_per_turn: f64) {
        let speed = if raw.is_nan() { MIN_GAUGE_SPEED } else { raw.min(max_actions_per_turn) };
        self.speed = speed.max(MIN_GAUGE_SPEED);
    }

    pub fn purpose(&self) -> GaugePurpose {
        self.purpose
    }

    pub fn set_purpose(&mut self, purpose: GaugePurpose) {
        self.purpose = purpose;
    }

    /// Advance one tick.
    ///
    /// No-op while stopped, dispatched, dead, or unable to move. A quickened
    /// gauge jumps straight to max.
    pub fn tick(
        &mut self,
        base_gauge_speed: f64,
        multiplier: f64,
        alive: bool,
        can_move: bool,
    ) {
        if self.stopped || self.dispatched_pending || !alive || !can_move {
            return;
        }
        if self.quickened {
            self.fill();
            return;
        }
        self.set_value(self.value + self.speed * base_gauge_speed * multiplier);
    }

    pub fn mark_dispatched(&mut self) {
        self.dispatched_pending = true;
    }

    pub fn is_dispatched(&self) -> bool {
        self.dispatched_pending
    }

    /// Zero the value and clear the dispatched flag.
    pub fn reset(&mut self) {
        self.value = 0.0;
        self.dispatched_pending = false;
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn resume(&mut self) {
        self.stopped = false;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn start_quicken(&mut self) {
        self.quickened = true;
    }

    pub fn end_quicken(&mut self) {
        self.quickened = false;
    }

    pub fn is_quickened(&self) -> bool {
        self.quickened
    }

    pub fn is_ready(&self) -> bool {
        !self.stopped && !self.dispatched_pending && self.value >= MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gauge() -> Gauge {
        Gauge::new(ParticipantId(1))
    }

    #[test]
    fn test_set_value_clamps() {
        let mut g = gauge();
        g.set_value(1500.0);
        assert_eq!(g.value(), GAUGE_MAX);
        g.set_value(-20.0);
        assert_eq!(g.value(), 0);
        g.set_value(f64::NAN);
        assert_eq!(g.value(), 0);
    }

    #[test]
    fn test_set_speed_caps() {
        let mut g = gauge();
        g.set_speed(5.0, 3.0);
        assert!((g.speed() - 3.0).abs() < f64::EPSILON);
        g.set_speed(1.5, 3.0);
        assert!((g.speed() - 1.5).abs() < f64::EPSILON);
        g.set_speed(-4.0, 3.0);
        assert!((g.speed() - MIN_GAUGE_SPEED).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tick_fills_by_speed() {
        let mut g = gauge();
        g.set_speed(2.0, 3.0);
        g.tick(5.0, 1.0, true, true);
        assert_eq!(g.value(), 10);
        g.tick(5.0, 2.0, true, true);
        assert_eq!(g.value(), 30);
    }

    #[test]
    fn test_tick_skipped_when_blocked() {
        let mut g = gauge();
        g.tick(5.0, 1.0, false, true);
        g.tick(5.0, 1.0, true, false);
        assert_eq!(g.value(), 0);

        g.stop();
        g.tick(5.0, 1.0, true, true);
        assert_eq!(g.value(), 0);
        g.resume();

        g.mark_dispatched();
        g.tick(5.0, 1.0, true, true);
        assert_eq!(g.value(), 0);
    }

    #[test]
    fn test_quicken_forces_max() {
        let mut g = gauge();
        g.start_quicken();
        g.tick(5.0, 1.0, true, true);
        assert!(g.is_ready());
        g.end_quicken();
        g.reset();
        g.tick(5.0, 1.0, true, true);
        assert_eq!(g.value(), 5);
    }

    #[test]
    fn test_stop_wins_over_quicken() {
        let mut g = gauge();
        g.start_quicken();
        g.stop();
        g.tick(5.0, 1.0, true, true);
        assert_eq!(g.value(), 0);
        assert!(!g.is_ready());
    }

    #[test]
    fn test_ready_requires_full_and_not_dispatched() {
        let mut g = gauge();
        g.set_value(999.0);
        assert!(!g.is_ready());
        g.fill();
        assert!(g.is_ready());
        g.mark_dispatched();
        assert!(!g.is_ready());
        g.reset();
        assert!(!g.is_ready());
        assert!(!g.is_dispatched());
        assert_eq!(g.value(), 0);
    }

    #[test]
    fn test_drain() {
        let mut g = gauge();
        g.set_value(500.0);
        g.drain(300);
        assert_eq!(g.value(), 200);
        g.drain(300);
        assert_eq!(g.value(), 0);
    }

    #[test]
    fn test_fill_ratio() {
        let mut g = gauge();
        g.set_value(250.0);
        assert!((g.fill_ratio() - 0.25).abs() < 1e-9);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Tick(f64),
        SetSpeed(f64),
        Drain(u32),
        Fill,
        Reset,
        Dispatch,
        Stop,
        Resume,
        Quicken,
        EndQuicken,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0.0f64..4.0).prop_map(Op::Tick),
            (-10.0f64..10.0).prop_map(Op::SetSpeed),
            (0u32..2000).prop_map(Op::Drain),
            Just(Op::Fill),
            Just(Op::Reset),
            Just(Op::Dispatch),
            Just(Op::Stop),
            Just(Op::Resume),
            Just(Op::Quicken),
            Just(Op::EndQuicken),
        ]
    }

    proptest! {
        #[test]
        fn prop_value_and_speed_stay_bounded(ops in prop::collection::vec(op_strategy(), 0..64)) {
            let mut g = gauge();
            for op in ops {
                match op {
                    Op::Tick(m) => g.tick(5.0, m, true, true),
                    Op::SetSpeed(s) => g.set_speed(s, 3.0),
                    Op::Drain(n) => g.drain(n),
                    Op::Fill => g.fill(),
                    Op::Reset => g.reset(),
                    Op::Dispatch => g.mark_dispatched(),
                    Op::Stop => g.stop(),
                    Op::Resume => g.resume(),
                    Op::Quicken => g.start_quicken(),
                    Op::EndQuicken => g.end_quicken(),
                }
                prop_assert!(g.raw_value() >= 0.0 && g.raw_value() <= MAX);
                prop_assert!(g.speed() <= 3.0 && g.speed() >= MIN_GAUGE_SPEED);
                if g.is_stopped() || g.is_dispatched() {
                    prop_assert!(!g.is_ready());
                }
            }
        }
    }
}
