//! Change detection and save scheduling.
//!
//! The controller compares the live block list against the last persisted
//! snapshot and hands out [`SaveTicket`]s. Only one ticket can be in flight:
//! the `Saving` state is entered in [`SaveController::begin`] with no
//! suspension point between the check and the transition, so overlapping
//! triggers collapse into a single write.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use stepwise_core::BlockSequence;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::persistence::AgentPersistence;

/// Default time between timer saves.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveState {
    /// Live blocks equal the persisted snapshot.
    Clean,
    /// Live blocks differ from the persisted snapshot.
    Dirty,
    /// A write is in flight.
    Saving,
}

impl fmt::Display for SaveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Clean => "clean",
            Self::Dirty => "dirty",
            Self::Saving => "saving",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveTrigger {
    Timer,
    Manual,
    Shortcut,
}

impl fmt::Display for SaveTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Timer => "timer",
            Self::Manual => "manual",
            Self::Shortcut => "shortcut",
        })
    }
}

/// Why a trigger did not produce a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Another save is in flight.
    InFlight,
    /// Nothing changed since the last save.
    Clean,
    /// Timer saves are disabled outside edit mode.
    EditModeOff,
    /// The ticket does not belong to the save in flight.
    Stale,
    /// The user dismissed the name prompt for a new agent.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InFlight => "a save is already in flight",
            Self::Clean => "no unsaved changes",
            Self::EditModeOff => "edit mode is off",
            Self::Stale => "stale save ticket",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Permission to write one captured block list.
#[derive(Debug)]
pub struct SaveTicket {
    seq: u64,
    trigger: SaveTrigger,
    blocks: BlockSequence,
}

impl SaveTicket {
    pub fn trigger(&self) -> SaveTrigger {
        self.trigger
    }

    /// The exact block list this save writes.
    pub fn blocks(&self) -> &BlockSequence {
        &self.blocks
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum SaveOutcome {
    Saved { trigger: SaveTrigger },
    Skipped { reason: SkipReason },
    Failed { trigger: SaveTrigger, message: String },
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// Tracks dirtiness and serializes saves for one agent.
#[derive(Debug)]
pub struct SaveController<C> {
    clock: C,
    interval: Duration,
    edit_mode: bool,
    state: SaveState,
    snapshot: BlockSequence,
    next_timer: Option<Duration>,
    in_flight: Option<u64>,
    issued: u64,
}

impl<C: Clock> SaveController<C> {
    pub fn new(clock: C, interval: Duration, edit_mode: bool) -> Self {
        Self {
            clock,
            interval,
            edit_mode,
            state: SaveState::Clean,
            snapshot: BlockSequence::new(),
            next_timer: None,
            in_flight: None,
            issued: 0,
        }
    }

    /// Adopts `snapshot` as the persisted state, dropping any pending work.
    pub fn reset(&mut self, snapshot: BlockSequence) {
        self.snapshot = snapshot;
        self.state = SaveState::Clean;
        self.next_timer = None;
        self.in_flight = None;
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    pub fn snapshot(&self) -> &BlockSequence {
        &self.snapshot
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn edit_mode(&self) -> bool {
        self.edit_mode
    }

    /// Time at which the armed timer fires, if any.
    pub fn next_timer(&self) -> Option<Duration> {
        self.next_timer
    }

    pub fn set_edit_mode(&mut self, on: bool) {
        self.edit_mode = on;
        if !on {
            self.next_timer = None;
        } else if self.state == SaveState::Dirty {
            self.arm();
        }
    }

    fn arm(&mut self) {
        if self.edit_mode && self.next_timer.is_none() {
            self.next_timer = Some(self.clock.now() + self.interval);
        }
    }

    fn settle(&mut self, state: SaveState) {
        self.state = state;
        match state {
            SaveState::Dirty => self.arm(),
            SaveState::Clean => self.next_timer = None,
            SaveState::Saving => {}
        }
    }

    /// Re-evaluates dirtiness against `live`. No-op while a save is in
    /// flight; [`complete`](Self::complete) re-evaluates afterwards.
    pub fn observe(&mut self, live: &BlockSequence) {
        if self.state == SaveState::Saving {
            return;
        }
        let next = if *live == self.snapshot {
            SaveState::Clean
        } else {
            SaveState::Dirty
        };
        if next != self.state {
            debug!(from = %self.state, to = %next, "save state changed");
        }
        self.settle(next);
    }

    fn try_begin(
        &mut self,
        trigger: SaveTrigger,
        live: &BlockSequence,
    ) -> Result<SaveTicket, SkipReason> {
        self.observe(live);
        let skip = match self.state {
            SaveState::Saving => Some(SkipReason::InFlight),
            SaveState::Clean => Some(SkipReason::Clean),
            SaveState::Dirty if trigger == SaveTrigger::Timer && !self.edit_mode => {
                Some(SkipReason::EditModeOff)
            }
            SaveState::Dirty => None,
        };
        if let Some(reason) = skip {
            debug!(?trigger, ?reason, "save skipped");
            return Err(reason);
        }

        self.issued += 1;
        self.in_flight = Some(self.issued);
        self.state = SaveState::Saving;
        Ok(SaveTicket {
            seq: self.issued,
            trigger,
            blocks: live.clone(),
        })
    }

    /// Claims the right to save `live`. Returns `None` if a save is already
    /// in flight, if nothing changed, or for a timer trigger outside edit
    /// mode.
    pub fn begin(&mut self, trigger: SaveTrigger, live: &BlockSequence) -> Option<SaveTicket> {
        self.try_begin(trigger, live).ok()
    }

    /// Records the result of writing `ticket` and re-evaluates against
    /// `live`, which may have moved on while the write ran.
    pub fn complete(
        &mut self,
        ticket: SaveTicket,
        result: Result<(), String>,
        live: &BlockSequence,
    ) -> SaveOutcome {
        if self.in_flight != Some(ticket.seq) {
            warn!(seq = ticket.seq, "ignoring completion of a stale save ticket");
            return SaveOutcome::Skipped {
                reason: SkipReason::Stale,
            };
        }
        self.in_flight = None;

        match result {
            Ok(()) => {
                self.snapshot = ticket.blocks;
                self.state = SaveState::Clean;
                self.observe(live);
                debug!(trigger = ?ticket.trigger, state = %self.state, "save completed");
                SaveOutcome::Saved {
                    trigger: ticket.trigger,
                }
            }
            Err(message) => {
                warn!(trigger = ?ticket.trigger, error = %message, "save failed");
                self.settle(SaveState::Dirty);
                SaveOutcome::Failed {
                    trigger: ticket.trigger,
                    message,
                }
            }
        }
    }

    /// Issues a timer ticket if the controller is dirty in edit mode and the
    /// armed interval has elapsed. The timer re-arms on every firing.
    pub fn poll(&mut self, live: &BlockSequence) -> Option<SaveTicket> {
        if self.state == SaveState::Saving {
            return None;
        }
        self.observe(live);
        let due = self.next_timer?;
        let now = self.clock.now();
        if now < due {
            return None;
        }
        self.next_timer = Some(now + self.interval);
        self.begin(SaveTrigger::Timer, live)
    }

    /// Writes a ticket through `persistence` and completes it.
    pub fn persist<P: AgentPersistence + ?Sized>(
        &mut self,
        ticket: SaveTicket,
        agent_id: &str,
        live: &BlockSequence,
        persistence: &P,
    ) -> SaveOutcome {
        let result = persistence
            .save_agent(agent_id, ticket.blocks())
            .map_err(|e| e.to_string());
        self.complete(ticket, result, live)
    }

    /// Runs begin, write and complete for a synchronous caller.
    pub fn save_now<P: AgentPersistence + ?Sized>(
        &mut self,
        trigger: SaveTrigger,
        agent_id: &str,
        live: &BlockSequence,
        persistence: &P,
    ) -> SaveOutcome {
        match self.try_begin(trigger, live) {
            Ok(ticket) => self.persist(ticket, agent_id, live, persistence),
            Err(reason) => SaveOutcome::Skipped { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::RecordingPersistence;
    use pretty_assertions::assert_eq;
    use stepwise_core::Block;
    use stepwise_core::block::{BlockKind, SearchPayload};

    fn live_with(n: usize) -> BlockSequence {
        let mut seq = BlockSequence::new();
        for i in 0..n {
            let block = Block::builder(BlockKind::Search(SearchPayload::default()))
                .id(format!("blk-{i}"))
                .name(format!("step {i}"))
                .build();
            seq.insert(block, None).unwrap();
        }
        seq
    }

    fn controller(clock: &ManualClock) -> SaveController<&ManualClock> {
        SaveController::new(clock, DEFAULT_INTERVAL, true)
    }

    #[test]
    fn observe_tracks_deep_equality() {
        let clock = ManualClock::new();
        let mut ctl = controller(&clock);
        ctl.observe(&live_with(0));
        assert_eq!(ctl.state(), SaveState::Clean);

        ctl.observe(&live_with(1));
        assert_eq!(ctl.state(), SaveState::Dirty);

        // Back to the snapshot content.
        ctl.observe(&live_with(0));
        assert_eq!(ctl.state(), SaveState::Clean);
    }

    #[test]
    fn overlapping_triggers_write_once() {
        let clock = ManualClock::new();
        let store = RecordingPersistence::default();
        let mut ctl = controller(&clock);
        let live = live_with(2);

        let ticket = ctl.begin(SaveTrigger::Timer, &live).unwrap();
        assert_eq!(ctl.state(), SaveState::Saving);
        assert!(ctl.begin(SaveTrigger::Manual, &live).is_none());
        assert_eq!(
            ctl.save_now(SaveTrigger::Shortcut, "ag-1", &live, &store),
            SaveOutcome::Skipped {
                reason: SkipReason::InFlight
            }
        );

        let outcome = ctl.persist(ticket, "ag-1", &live, &store);
        assert!(outcome.is_saved());
        assert_eq!(store.save_count(), 1);
        assert_eq!(ctl.state(), SaveState::Clean);
    }

    #[test]
    fn failed_save_returns_to_dirty() {
        let clock = ManualClock::new();
        let store = RecordingPersistence::default();
        store.fail_saves(true);
        let mut ctl = controller(&clock);
        let live = live_with(1);

        let outcome = ctl.save_now(SaveTrigger::Manual, "ag-1", &live, &store);
        assert!(matches!(outcome, SaveOutcome::Failed { trigger: SaveTrigger::Manual, .. }));
        assert_eq!(ctl.state(), SaveState::Dirty);
        assert!(ctl.snapshot().is_empty());

        store.fail_saves(false);
        assert!(ctl.save_now(SaveTrigger::Manual, "ag-1", &live, &store).is_saved());
        assert_eq!(ctl.state(), SaveState::Clean);
    }

    #[test]
    fn second_save_without_edits_is_skipped() {
        let clock = ManualClock::new();
        let store = RecordingPersistence::default();
        let mut ctl = controller(&clock);
        let live = live_with(1);

        assert!(ctl.save_now(SaveTrigger::Manual, "ag-1", &live, &store).is_saved());
        assert_eq!(
            ctl.save_now(SaveTrigger::Manual, "ag-1", &live, &store),
            SaveOutcome::Skipped {
                reason: SkipReason::Clean
            }
        );
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn edits_during_save_leave_controller_dirty() {
        let clock = ManualClock::new();
        let mut ctl = controller(&clock);
        let before = live_with(1);
        let ticket = ctl.begin(SaveTrigger::Manual, &before).unwrap();

        let after = live_with(2);
        ctl.observe(&after);
        assert_eq!(ctl.state(), SaveState::Saving);

        assert!(ctl.complete(ticket, Ok(()), &after).is_saved());
        assert_eq!(ctl.snapshot(), &before);
        assert_eq!(ctl.state(), SaveState::Dirty);
    }

    #[test]
    fn stale_ticket_is_ignored() {
        let clock = ManualClock::new();
        let mut ctl = controller(&clock);
        let live = live_with(1);
        let ticket = ctl.begin(SaveTrigger::Manual, &live).unwrap();
        ctl.reset(BlockSequence::new());

        let outcome = ctl.complete(ticket, Ok(()), &live);
        assert_eq!(
            outcome,
            SaveOutcome::Skipped {
                reason: SkipReason::Stale
            }
        );
        assert!(ctl.snapshot().is_empty());
    }

    #[test]
    fn timer_fires_after_interval_while_dirty() {
        let clock = ManualClock::new();
        let store = RecordingPersistence::default();
        let mut ctl = controller(&clock);
        let live = live_with(1);

        ctl.observe(&live);
        assert_eq!(ctl.next_timer(), Some(DEFAULT_INTERVAL));
        clock.advance(Duration::from_secs(59));
        assert!(ctl.poll(&live).is_none());

        clock.advance(Duration::from_secs(1));
        let ticket = ctl.poll(&live).unwrap();
        assert_eq!(ticket.trigger(), SaveTrigger::Timer);
        assert!(ctl.persist(ticket, "ag-1", &live, &store).is_saved());
        assert_eq!(ctl.next_timer(), None);
    }

    #[test]
    fn timer_keeps_firing_while_saves_fail() {
        let clock = ManualClock::new();
        let store = RecordingPersistence::default();
        store.fail_saves(true);
        let mut ctl = controller(&clock);
        let live = live_with(1);
        ctl.observe(&live);

        for _ in 0..3 {
            clock.advance(DEFAULT_INTERVAL);
            let ticket = ctl.poll(&live).unwrap();
            let outcome = ctl.persist(ticket, "ag-1", &live, &store);
            assert!(matches!(outcome, SaveOutcome::Failed { .. }));
        }
        assert_eq!(store.save_count(), 3);
        assert_eq!(ctl.state(), SaveState::Dirty);
    }

    #[test]
    fn timer_requires_edit_mode() {
        let clock = ManualClock::new();
        let mut ctl = SaveController::new(&clock, DEFAULT_INTERVAL, false);
        let live = live_with(1);

        ctl.observe(&live);
        assert_eq!(ctl.next_timer(), None);
        assert!(ctl.begin(SaveTrigger::Timer, &live).is_none());
        clock.advance(DEFAULT_INTERVAL * 2);
        assert!(ctl.poll(&live).is_none());

        // Manual saves still go through.
        assert!(ctl.begin(SaveTrigger::Manual, &live).is_some());
    }

    #[test]
    fn enabling_edit_mode_arms_pending_timer() {
        let clock = ManualClock::new();
        let mut ctl = SaveController::new(&clock, DEFAULT_INTERVAL, false);
        ctl.observe(&live_with(1));
        clock.advance(Duration::from_secs(10));
        ctl.set_edit_mode(true);
        assert_eq!(ctl.next_timer(), Some(Duration::from_secs(70)));
        ctl.set_edit_mode(false);
        assert_eq!(ctl.next_timer(), None);
    }
}
