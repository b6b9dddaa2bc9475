//! Recording inspector
//!
//! A [`Journal`] is an [`Inspector`]: hand it to
//! [`StoreConfig::with_inspector`](peasy_core::StoreConfig::with_inspector)
//! with dev tools enabled and it records the initial state and every applied
//! action. [`Journal::recording`] freezes what was captured so far into a
//! [`Recording`] that the auditor, replayer and exporter work on.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use peasy_core::{ActionMessage, Inspector, Value};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// One recorded step of a store's life
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalEntry {
    /// The store was created
    Init {
        seq: u64,
        recorded_at: DateTime<Utc>,
        /// Initial state, if states are being kept
        state: Option<Value>,
    },
    /// An action went through the update pipeline
    Action {
        seq: u64,
        recorded_at: DateTime<Utc>,
        action: ActionMessage,
        /// State right after the action, if states are being kept
        state: Option<Value>,
    },
}

impl JournalEntry {
    pub fn seq(&self) -> u64 {
        match self {
            JournalEntry::Init { seq, .. } | JournalEntry::Action { seq, .. } => *seq,
        }
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        match self {
            JournalEntry::Init { recorded_at, .. } | JournalEntry::Action { recorded_at, .. } => {
                *recorded_at
            }
        }
    }

    pub fn state(&self) -> Option<&Value> {
        match self {
            JournalEntry::Init { state, .. } | JournalEntry::Action { state, .. } => {
                state.as_ref()
            }
        }
    }

    /// The recorded action, `None` for an init entry
    pub fn action(&self) -> Option<&ActionMessage> {
        match self {
            JournalEntry::Action { action, .. } => Some(action),
            JournalEntry::Init { .. } => None,
        }
    }
}

/// Configuration for the journal
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Whether recording starts enabled
    pub recording_enabled: bool,
    /// Keep the resulting state with every entry
    pub record_states: bool,
    /// Maximum number of entries to keep (0 = unlimited)
    pub max_entries: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            recording_enabled: true,
            record_states: true,
            max_entries: 0,
        }
    }
}

/// Live recorder attached to a store
#[derive(Debug)]
pub struct Journal {
    config: JournalConfig,
    inner: Mutex<JournalInner>,
}

#[derive(Debug, Default)]
struct JournalInner {
    recording: bool,
    entries: Vec<JournalEntry>,
    next_seq: u64,
}

impl Journal {
    /// Create a journal that records from the start
    pub fn new() -> Self {
        Self::with_config(JournalConfig::default())
    }

    pub fn with_config(config: JournalConfig) -> Self {
        Self {
            inner: Mutex::new(JournalInner {
                recording: config.recording_enabled,
                ..Default::default()
            }),
            config,
        }
    }

    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    pub fn start_recording(&self) {
        self.inner.lock().recording = true;
    }

    pub fn stop_recording(&self) {
        self.inner.lock().recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.inner.lock().recording
    }

    /// Number of entries currently kept
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Drop every entry. Sequence numbers keep counting.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Freeze the entries recorded so far
    pub fn recording(&self) -> Recording {
        Recording {
            entries: self.inner.lock().entries.clone(),
        }
    }

    pub fn stats(&self) -> JournalStats {
        JournalStats::of(&self.inner.lock().entries)
    }

    /// State right after entry `seq`
    pub fn state_at(&self, seq: u64) -> Result<Value> {
        find_state(&self.inner.lock().entries, seq)
    }

    /// The most recently recorded state, if any
    pub fn latest_state(&self) -> Option<Value> {
        self.inner
            .lock()
            .entries
            .iter()
            .rev()
            .find_map(|entry| entry.state().cloned())
    }

    fn record<F>(&self, make: F, state: &Value)
    where
        F: FnOnce(u64, DateTime<Utc>, Option<Value>) -> JournalEntry,
    {
        let mut inner = self.inner.lock();
        if !inner.recording {
            return;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let state = self.config.record_states.then(|| state.clone());
        inner.entries.push(make(seq, Utc::now(), state));

        let max = self.config.max_entries;
        if max > 0 && inner.entries.len() > max {
            let excess = inner.entries.len() - max;
            inner.entries.drain(..excess);
        }
        trace!(seq, kept = inner.entries.len(), "journal entry recorded");
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector for Journal {
    fn on_init(&self, state: &Value) {
        self.record(
            |seq, recorded_at, state| JournalEntry::Init {
                seq,
                recorded_at,
                state,
            },
            state,
        );
    }

    fn on_action(&self, msg: &ActionMessage, state: &Value) {
        self.record(
            |seq, recorded_at, state| JournalEntry::Action {
                seq,
                recorded_at,
                action: msg.clone(),
                state,
            },
            state,
        );
    }
}

/// A frozen list of journal entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    entries: Vec<JournalEntry>,
}

impl Recording {
    pub fn new(entries: Vec<JournalEntry>) -> Self {
        Self { entries }
    }

    /// Load a recording previously written by
    /// [`Exporter::recording_to_ron`](crate::Exporter::recording_to_ron)
    pub fn from_ron(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, seq: u64) -> Option<&JournalEntry> {
        self.entries.iter().find(|entry| entry.seq() == seq)
    }

    /// Position of entry `seq` in [`entries`](Self::entries)
    pub fn index_of(&self, seq: u64) -> Option<usize> {
        self.entries.iter().position(|entry| entry.seq() == seq)
    }

    /// State right after entry `seq`
    pub fn state_at(&self, seq: u64) -> Result<Value> {
        find_state(&self.entries, seq)
    }

    /// Entries with `start <= seq <= end`
    pub fn entries_in_range(&self, start: u64, end: u64) -> Result<Vec<&JournalEntry>> {
        if start > end {
            return Err(Error::InvalidRange(start, end));
        }
        Ok(self
            .entries
            .iter()
            .filter(|entry| (start..=end).contains(&entry.seq()))
            .collect())
    }

    /// Recorded actions in order, with their sequence numbers
    pub fn actions(&self) -> impl Iterator<Item = (u64, &ActionMessage)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.action().map(|action| (entry.seq(), action)))
    }

    pub fn stats(&self) -> JournalStats {
        JournalStats::of(&self.entries)
    }
}

fn find_state(entries: &[JournalEntry], seq: u64) -> Result<Value> {
    let entry = entries
        .iter()
        .find(|entry| entry.seq() == seq)
        .ok_or(Error::EntryNotFound(seq))?;
    entry.state().cloned().ok_or(Error::StateNotRecorded(seq))
}

/// Statistics about recorded entries
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JournalStats {
    pub total_entries: usize,
    pub init_count: usize,
    pub action_count: usize,
    pub first_seq: Option<u64>,
    pub last_seq: Option<u64>,
    pub first_recorded: Option<DateTime<Utc>>,
    pub last_recorded: Option<DateTime<Utc>>,
}

impl JournalStats {
    fn of(entries: &[JournalEntry]) -> Self {
        let action_count = entries.iter().filter(|e| e.action().is_some()).count();
        Self {
            total_entries: entries.len(),
            init_count: entries.len() - action_count,
            action_count,
            first_seq: entries.first().map(JournalEntry::seq),
            last_seq: entries.last().map(JournalEntry::seq),
            first_recorded: entries.first().map(JournalEntry::recorded_at),
            last_recorded: entries.last().map(JournalEntry::recorded_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(n: i64) -> Value {
        Value::map([("value", n)])
    }

    fn bump(journal: &Journal, n: i64) {
        journal.on_action(&ActionMessage::new("increment", 1i64), &counter(n));
    }

    #[test]
    fn test_records_init_and_actions() {
        let journal = Journal::new();
        journal.on_init(&counter(0));
        bump(&journal, 1);
        bump(&journal, 2);

        let stats = journal.stats();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.init_count, 1);
        assert_eq!(stats.action_count, 2);
        assert_eq!(stats.first_seq, Some(0));
        assert_eq!(stats.last_seq, Some(2));
        assert_eq!(journal.state_at(1).unwrap(), counter(1));
        assert_eq!(journal.latest_state(), Some(counter(2)));
    }

    #[test]
    fn test_stopped_journal_records_nothing() {
        let journal = Journal::new();
        journal.stop_recording();
        bump(&journal, 1);
        assert!(journal.is_empty());

        journal.start_recording();
        bump(&journal, 2);
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn test_max_entries_drops_oldest() {
        let journal = Journal::with_config(JournalConfig {
            max_entries: 2,
            ..Default::default()
        });
        for n in 1..=5 {
            bump(&journal, n);
        }
        let recording = journal.recording();
        let seqs: Vec<u64> = recording.entries().iter().map(JournalEntry::seq).collect();
        assert_eq!(seqs, vec![3, 4]);
        assert!(matches!(journal.state_at(0), Err(Error::EntryNotFound(0))));
    }

    #[test]
    fn test_states_can_be_left_out() {
        let journal = Journal::with_config(JournalConfig {
            record_states: false,
            ..Default::default()
        });
        bump(&journal, 1);
        assert!(matches!(
            journal.state_at(0),
            Err(Error::StateNotRecorded(0))
        ));
        assert!(journal.latest_state().is_none());
    }

    #[test]
    fn test_clear_keeps_sequence_running() {
        let journal = Journal::new();
        bump(&journal, 1);
        journal.clear();
        bump(&journal, 2);
        assert_eq!(journal.recording().entries()[0].seq(), 1);
    }

    #[test]
    fn test_range_queries() {
        let journal = Journal::new();
        journal.on_init(&counter(0));
        for n in 1..=4 {
            bump(&journal, n);
        }
        let recording = journal.recording();
        assert_eq!(recording.entries_in_range(1, 3).unwrap().len(), 3);
        assert!(matches!(
            recording.entries_in_range(3, 1),
            Err(Error::InvalidRange(3, 1))
        ));
        assert_eq!(recording.actions().count(), 4);
        assert_eq!(recording.index_of(2), Some(2));
    }
}
