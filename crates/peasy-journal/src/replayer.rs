//! Time travel over a recording
//!
//! Two ways to go back in time:
//! - move a cursor over the recorded states (`goto`, `step_forward`,
//!   `step_backward`), which needs states to have been recorded
//! - re-dispatch the recorded actions into a fresh store with
//!   [`Replayer::replay_into`] and compare against what was recorded

use crate::{Error, JournalEntry, Recording, Result};
use peasy_core::{Store, Value};
use tracing::{debug, warn};

/// State of the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    /// Not positioned on any entry
    Idle,
    /// Positioned on an entry
    Paused,
    /// Positioned on the last entry
    Finished,
}

/// Replayer for recorded sessions
pub struct Replayer<'a> {
    recording: &'a Recording,
    cursor: Option<usize>,
}

impl<'a> Replayer<'a> {
    pub fn new(recording: &'a Recording) -> Self {
        Self {
            recording,
            cursor: None,
        }
    }

    pub fn state(&self) -> ReplayState {
        match self.cursor {
            None => ReplayState::Idle,
            Some(index) if index + 1 >= self.recording.len() => ReplayState::Finished,
            Some(_) => ReplayState::Paused,
        }
    }

    /// Sequence number under the cursor
    pub fn current_seq(&self) -> Option<u64> {
        self.current_entry().map(JournalEntry::seq)
    }

    pub fn current_entry(&self) -> Option<&'a JournalEntry> {
        self.cursor.and_then(|index| self.recording.entries().get(index))
    }

    /// Recorded state under the cursor
    pub fn current_state(&self) -> Option<&'a Value> {
        self.current_entry().and_then(JournalEntry::state)
    }

    pub fn first_seq(&self) -> Option<u64> {
        self.recording.stats().first_seq
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.recording.stats().last_seq
    }

    /// Move to entry `seq` and return the state recorded there
    pub fn goto(&mut self, seq: u64) -> Result<&'a Value> {
        let index = self.recording.index_of(seq).ok_or(Error::EntryNotFound(seq))?;
        self.move_to(index)
    }

    /// Advance one entry. Returns `None` once at the end.
    pub fn step_forward(&mut self) -> Result<Option<&'a Value>> {
        let next = self.cursor.map_or(0, |index| index + 1);
        if next >= self.recording.len() {
            return Ok(None);
        }
        self.move_to(next).map(Some)
    }

    /// Go back one entry. Returns `None` at the start.
    pub fn step_backward(&mut self) -> Result<Option<&'a Value>> {
        match self.cursor {
            Some(index) if index > 0 => self.move_to(index - 1).map(Some),
            _ => Ok(None),
        }
    }

    pub fn reset(&mut self) {
        self.cursor = None;
    }

    /// Dispatch the recorded actions up to and including `until` (all when
    /// `None`) into `store`, in order.
    ///
    /// `store` should start from the recording's initial state. After every
    /// action that has a recorded state, the store's state is compared with
    /// it; mismatching sequence numbers end up in [`ReplayReport::divergent`].
    /// Actions that a mutator dispatched itself are recorded too, so a store
    /// whose mutators dispatch will replay those twice and diverge.
    pub fn replay_into(&self, store: &Store, until: Option<u64>) -> Result<ReplayReport> {
        let mut report = ReplayReport::default();
        for entry in self.recording.entries() {
            let seq = entry.seq();
            if until.is_some_and(|until| seq > until) {
                break;
            }
            let Some(action) = entry.action() else {
                continue;
            };
            store.dispatch(action.clone())?;
            report.replayed += 1;

            if let Some(expected) = entry.state() {
                if &store.get_state() != expected {
                    warn!(seq, action = %action.kind, "replayed state diverges from recording");
                    report.divergent.push(seq);
                }
            }
        }
        debug!(
            replayed = report.replayed,
            divergent = report.divergent.len(),
            "replay finished"
        );
        Ok(report)
    }

    fn move_to(&mut self, index: usize) -> Result<&'a Value> {
        let entry = &self.recording.entries()[index];
        self.cursor = Some(index);
        entry.state().ok_or(Error::StateNotRecorded(entry.seq()))
    }
}

/// Outcome of [`Replayer::replay_into`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Number of actions dispatched
    pub replayed: usize,
    /// Entries whose replayed state differs from the recorded one
    pub divergent: Vec<u64>,
}

impl ReplayReport {
    pub fn is_faithful(&self) -> bool {
        self.divergent.is_empty()
    }
}
