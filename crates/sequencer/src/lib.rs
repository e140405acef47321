//! Slide transition state machine.
//!
//! The controller owns the active slide index and the two-phase
//! `Idle -> Exiting -> Idle` cycle. Callers feed it discrete advance/select
//! requests plus a monotonically increasing clock through [`TransitionController::tick`];
//! everything else in the pipeline only reads [`TransitionState`].

use std::time::{Duration, Instant};

use slideconfig::Timing;
use tracing::{debug, trace};

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("slide deck is empty")]
    EmptyDeck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

impl Direction {
    pub fn sign(self) -> i32 {
        match self {
            Direction::Backward => -1,
            Direction::Forward => 1,
        }
    }

    pub fn from_delta(delta: i64) -> Option<Self> {
        match delta.signum() {
            1 => Some(Direction::Forward),
            -1 => Some(Direction::Backward),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Exiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSwap {
    pub target: usize,
    pub direction: Direction,
    pub started_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionState {
    pub active_index: usize,
    pub direction: Direction,
    pub phase: Phase,
    pub last_trigger: Option<Instant>,
    pub pending: Option<PendingSwap>,
    /// Incremented each time a new slide is committed.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Accepted { target: usize },
    Debounced,
    Busy,
    Unchanged,
}

impl AdvanceOutcome {
    pub fn is_accepted(self) -> bool {
        matches!(self, AdvanceOutcome::Accepted { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideChange {
    pub previous: usize,
    pub index: usize,
    pub direction: Direction,
    pub generation: u64,
    pub committed_at: Instant,
}

#[derive(Debug, Clone)]
pub struct TransitionController {
    state: TransitionState,
    slide_count: usize,
    debounce: Duration,
    dwell: Duration,
}

impl TransitionController {
    pub fn new(slide_count: usize, timing: &Timing) -> Result<Self, SequencerError> {
        if slide_count == 0 {
            return Err(SequencerError::EmptyDeck);
        }
        Ok(Self {
            state: TransitionState {
                active_index: 0,
                direction: Direction::Forward,
                phase: Phase::Idle,
                last_trigger: None,
                pending: None,
                generation: 0,
            },
            slide_count,
            debounce: timing.debounce,
            dwell: timing.dwell,
        })
    }

    pub fn state(&self) -> &TransitionState {
        &self.state
    }

    pub fn slide_count(&self) -> usize {
        self.slide_count
    }

    pub fn active_index(&self) -> usize {
        self.state.active_index
    }

    pub fn advance(&mut self, direction: Direction, now: Instant) -> AdvanceOutcome {
        if self.slide_count <= 1 {
            return AdvanceOutcome::Unchanged;
        }
        let target = wrap_index(
            self.state.active_index as i64 + i64::from(direction.sign()),
            self.slide_count,
        );
        self.request(target, direction, now)
    }

    /// Jumps straight to `target`, wrapped into the deck. Direction is the
    /// sign of the numeric difference, not the shortest cyclic path.
    pub fn select_index(&mut self, target: i64, now: Instant) -> AdvanceOutcome {
        let target = wrap_index(target, self.slide_count);
        let delta = target as i64 - self.state.active_index as i64;
        match Direction::from_delta(delta) {
            Some(direction) => self.request(target, direction, now),
            None => AdvanceOutcome::Unchanged,
        }
    }

    fn request(&mut self, target: usize, direction: Direction, now: Instant) -> AdvanceOutcome {
        if let Some(last) = self.state.last_trigger {
            if now.saturating_duration_since(last) < self.debounce {
                trace!(target, "advance debounced");
                return AdvanceOutcome::Debounced;
            }
        }
        if self.state.phase == Phase::Exiting {
            trace!(target, "advance ignored while exiting");
            return AdvanceOutcome::Busy;
        }

        self.state.phase = Phase::Exiting;
        self.state.last_trigger = Some(now);
        self.state.pending = Some(PendingSwap {
            target,
            direction,
            started_at: now,
        });
        debug!(
            from = self.state.active_index,
            to = target,
            direction = direction.sign(),
            "transition started"
        );
        AdvanceOutcome::Accepted { target }
    }

    /// Commits a pending swap once the dwell window has elapsed.
    pub fn tick(&mut self, now: Instant) -> Option<SlideChange> {
        let pending = self.state.pending?;
        if now.saturating_duration_since(pending.started_at) < self.dwell {
            return None;
        }

        let previous = self.state.active_index;
        self.state.active_index = pending.target;
        self.state.direction = pending.direction;
        self.state.phase = Phase::Idle;
        self.state.pending = None;
        self.state.generation += 1;
        debug!(
            index = pending.target,
            generation = self.state.generation,
            "slide committed"
        );
        Some(SlideChange {
            previous,
            index: pending.target,
            direction: pending.direction,
            generation: self.state.generation,
            committed_at: now,
        })
    }
}

pub fn wrap_index(index: i64, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    index.rem_euclid(count as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(count: usize) -> TransitionController {
        TransitionController::new(count, &Timing::default()).unwrap()
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn rejects_empty_deck() {
        assert!(matches!(
            TransitionController::new(0, &Timing::default()),
            Err(SequencerError::EmptyDeck)
        ));
    }

    #[test]
    fn debounce_drops_second_request() {
        let mut ctl = controller(7);
        let start = Instant::now();
        assert!(ctl.advance(Direction::Forward, start).is_accepted());
        assert_eq!(
            ctl.advance(Direction::Forward, start + ms(300)),
            AdvanceOutcome::Debounced
        );
        assert!(ctl.tick(start + ms(500)).is_some());
        assert_eq!(
            ctl.advance(Direction::Forward, start + ms(700)),
            AdvanceOutcome::Debounced
        );
        assert_eq!(ctl.active_index(), 1);
        assert!(ctl.tick(start + ms(2_000)).is_none());
    }

    #[test]
    fn two_spaced_requests_commit_twice() {
        let mut ctl = controller(7);
        let start = Instant::now();
        assert!(ctl.advance(Direction::Forward, start).is_accepted());
        ctl.tick(start + ms(500));
        assert!(ctl
            .advance(Direction::Forward, start + ms(900))
            .is_accepted());
        ctl.tick(start + ms(1_400));
        assert_eq!(ctl.active_index(), 2);
        assert_eq!(ctl.state().generation, 2);
    }

    #[test]
    fn request_exactly_at_debounce_boundary_is_accepted() {
        let mut ctl = controller(3);
        let start = Instant::now();
        ctl.advance(Direction::Forward, start);
        ctl.tick(start + ms(500));
        assert!(ctl
            .advance(Direction::Forward, start + ms(800))
            .is_accepted());
    }

    #[test]
    fn wraps_cyclically() {
        let mut ctl = controller(7);
        let mut now = Instant::now();
        ctl.select_index(6, now);
        ctl.tick(now + ms(500));
        assert_eq!(ctl.active_index(), 6);

        now += ms(1_000);
        ctl.advance(Direction::Forward, now);
        ctl.tick(now + ms(500));
        assert_eq!(ctl.active_index(), 0);

        now += ms(1_000);
        ctl.advance(Direction::Backward, now);
        ctl.tick(now + ms(500));
        assert_eq!(ctl.active_index(), 6);
    }

    #[test]
    fn select_direction_follows_numeric_sign() {
        let mut ctl = controller(7);
        let mut now = Instant::now();
        ctl.select_index(2, now);
        ctl.tick(now + ms(500));

        now += ms(1_000);
        ctl.select_index(5, now);
        let change = ctl.tick(now + ms(500)).unwrap();
        assert_eq!(change.direction, Direction::Forward);

        now += ms(1_000);
        ctl.select_index(2, now);
        ctl.tick(now + ms(500));
        now += ms(1_000);
        ctl.select_index(0, now);
        let change = ctl.tick(now + ms(500)).unwrap();
        assert_eq!(change.direction, Direction::Backward);
    }

    #[test]
    fn select_same_index_leaves_clock_untouched() {
        let mut ctl = controller(4);
        let now = Instant::now();
        assert_eq!(ctl.select_index(0, now), AdvanceOutcome::Unchanged);
        assert_eq!(ctl.state().last_trigger, None);
        assert!(ctl.advance(Direction::Forward, now).is_accepted());
    }

    #[test]
    fn select_wraps_out_of_range_targets() {
        let mut ctl = controller(7);
        let now = Instant::now();
        assert_eq!(
            ctl.select_index(9, now),
            AdvanceOutcome::Accepted { target: 2 }
        );
        assert_eq!(wrap_index(-1, 7), 6);
    }

    #[test]
    fn index_changes_only_after_dwell() {
        let mut ctl = controller(7);
        let start = Instant::now();
        ctl.advance(Direction::Forward, start);
        assert_eq!(ctl.state().phase, Phase::Exiting);
        assert!(ctl.tick(start + ms(499)).is_none());
        assert_eq!(ctl.active_index(), 0);
        let change = ctl.tick(start + ms(500)).unwrap();
        assert_eq!(change.previous, 0);
        assert_eq!(change.index, 1);
        assert_eq!(ctl.state().phase, Phase::Idle);
        assert_eq!(ctl.state().direction, Direction::Forward);
    }

    #[test]
    fn busy_when_exiting_with_short_debounce() {
        let timing = Timing {
            debounce: ms(100),
            dwell: ms(100),
            texture_timeout: Duration::from_secs(3),
        };
        let mut ctl = TransitionController::new(3, &timing).unwrap();
        let start = Instant::now();
        ctl.advance(Direction::Forward, start);
        // still exiting because tick has not run yet
        assert_eq!(
            ctl.advance(Direction::Forward, start + ms(150)),
            AdvanceOutcome::Busy
        );
    }

    #[test]
    fn single_slide_never_transitions() {
        let mut ctl = controller(1);
        let now = Instant::now();
        assert_eq!(
            ctl.advance(Direction::Forward, now),
            AdvanceOutcome::Unchanged
        );
        assert_eq!(ctl.select_index(5, now), AdvanceOutcome::Unchanged);
        assert_eq!(ctl.state().phase, Phase::Idle);
    }
}
