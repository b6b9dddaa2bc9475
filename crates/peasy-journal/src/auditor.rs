//! Auditing and analytics for recorded actions

use crate::{JournalEntry, Recording};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Auditor for querying and analyzing a recording
pub struct Auditor<'a> {
    recording: &'a Recording,
}

impl<'a> Auditor<'a> {
    pub fn new(recording: &'a Recording) -> Self {
        Self { recording }
    }

    /// Generate a summary of everything recorded
    pub fn generate_report(&self) -> AuditReport {
        let stats = self.recording.stats();
        let mut action_counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut namespace_counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut unchanged_actions = 0;

        let mut previous = None;
        for entry in self.recording.entries() {
            if let Some(action) = entry.action() {
                *action_counts.entry(action.kind.clone()).or_insert(0) += 1;
                *namespace_counts
                    .entry(namespace_of(&action.kind).to_string())
                    .or_insert(0) += 1;
                if let (Some(before), Some(after)) = (previous, entry.state()) {
                    if after == before {
                        unchanged_actions += 1;
                    }
                }
            }
            if let Some(state) = entry.state() {
                previous = Some(state);
            }
        }

        AuditReport {
            total_entries: stats.total_entries,
            total_actions: stats.action_count,
            first_recorded: stats.first_recorded,
            last_recorded: stats.last_recorded,
            action_counts,
            namespace_counts,
            unchanged_actions,
        }
    }

    /// Entries matching every criterion of `query`
    pub fn query(&self, query: &AuditQuery) -> Vec<&'a JournalEntry> {
        self.recording
            .entries()
            .iter()
            .filter(|entry| query.matches(entry))
            .collect()
    }

    /// How many times the action `name` was recorded
    pub fn count_action(&self, name: &str) -> u64 {
        self.recording
            .actions()
            .filter(|(_, action)| action.kind == name)
            .count() as u64
    }

    /// Every distinct action name, sorted
    pub fn unique_actions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .recording
            .actions()
            .map(|(_, action)| action.kind.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Namespace part of an action name; root actions yield ""
fn namespace_of(name: &str) -> &str {
    name.rsplit_once('.').map(|(ns, _)| ns).unwrap_or("")
}

/// Filter for [`Auditor::query`]
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub start_seq: Option<u64>,
    pub end_seq: Option<u64>,
    /// Exact action name
    pub action: Option<String>,
    /// Actions declared in this namespace or below it
    pub namespace: Option<String>,
    pub include_init: bool,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seq(mut self, seq: u64) -> Self {
        self.start_seq = Some(seq);
        self
    }

    pub fn to_seq(mut self, seq: u64) -> Self {
        self.end_seq = Some(seq);
        self
    }

    pub fn action(mut self, name: impl Into<String>) -> Self {
        self.action = Some(name.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_init(mut self) -> Self {
        self.include_init = true;
        self
    }

    fn matches(&self, entry: &JournalEntry) -> bool {
        let seq = entry.seq();
        if self.start_seq.is_some_and(|start| seq < start) {
            return false;
        }
        if self.end_seq.is_some_and(|end| seq > end) {
            return false;
        }
        let Some(action) = entry.action() else {
            return self.include_init && self.action.is_none() && self.namespace.is_none();
        };
        if let Some(ref name) = self.action {
            if &action.kind != name {
                return false;
            }
        }
        if let Some(ref namespace) = self.namespace {
            let inside = action
                .kind
                .strip_prefix(namespace.as_str())
                .is_some_and(|rest| rest.starts_with('.'));
            if !inside {
                return false;
            }
        }
        true
    }
}

/// Summary produced by [`Auditor::generate_report`]
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub total_entries: usize,
    pub total_actions: usize,
    pub first_recorded: Option<DateTime<Utc>>,
    pub last_recorded: Option<DateTime<Utc>>,
    pub action_counts: BTreeMap<String, u64>,
    /// Actions per declaring namespace ("" for root actions)
    pub namespace_counts: BTreeMap<String, u64>,
    /// Actions whose recorded state equals the one before them
    pub unchanged_actions: u64,
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Audit Report ===")?;
        writeln!(f, "Entries: {}", self.total_entries)?;
        writeln!(f, "Actions: {}", self.total_actions)?;
        writeln!(f, "Without state change: {}", self.unchanged_actions)?;
        if let (Some(first), Some(last)) = (self.first_recorded, self.last_recorded) {
            writeln!(f, "Recorded: {} - {}", first.to_rfc3339(), last.to_rfc3339())?;
        }

        writeln!(f, "\nBy action:")?;
        for (name, count) in &self.action_counts {
            writeln!(f, "  {}: {}", name, count)?;
        }
        writeln!(f, "\nBy namespace:")?;
        for (namespace, count) in &self.namespace_counts {
            let label = if namespace.is_empty() { "<root>" } else { namespace };
            writeln!(f, "  {}: {}", label, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Journal;
    use peasy_core::{ActionMessage, Inspector, Value};

    fn recording() -> Recording {
        let journal = Journal::new();
        let state = |n: i64| Value::map([("todos", Value::map([("count", n)]))]);
        journal.on_init(&state(0));
        journal.on_action(&ActionMessage::new("todos.add", "a"), &state(1));
        journal.on_action(&ActionMessage::new("todos.add", "b"), &state(2));
        journal.on_action(&ActionMessage::new("todos.filter.set", "done"), &state(2));
        journal.on_action(&ActionMessage::new(".logState", ()), &state(2));
        journal.recording()
    }

    #[test]
    fn test_report_counts() {
        let recording = recording();
        let report = Auditor::new(&recording).generate_report();
        assert_eq!(report.total_entries, 5);
        assert_eq!(report.total_actions, 4);
        assert_eq!(report.action_counts["todos.add"], 2);
        assert_eq!(report.namespace_counts["todos"], 2);
        assert_eq!(report.namespace_counts["todos.filter"], 1);
        assert_eq!(report.namespace_counts[""], 1);
        assert_eq!(report.unchanged_actions, 2);

        let text = report.to_string();
        assert!(text.contains("Audit Report"));
        assert!(text.contains("<root>: 1"));
    }

    #[test]
    fn test_query_by_namespace_and_range() {
        let recording = recording();
        let auditor = Auditor::new(&recording);

        assert_eq!(auditor.query(&AuditQuery::new().namespace("todos")).len(), 3);
        assert_eq!(auditor.query(&AuditQuery::new().namespace("todo")).len(), 0);
        assert_eq!(
            auditor
                .query(&AuditQuery::new().action("todos.add").from_seq(2))
                .len(),
            1
        );
        assert_eq!(auditor.query(&AuditQuery::new().to_seq(1)).len(), 1);
        assert_eq!(auditor.query(&AuditQuery::new().to_seq(1).with_init()).len(), 2);
    }

    #[test]
    fn test_unique_actions() {
        let recording = recording();
        let auditor = Auditor::new(&recording);
        assert_eq!(
            auditor.unique_actions(),
            vec![".logState", "todos.add", "todos.filter.set"]
        );
        assert_eq!(auditor.count_action("todos.add"), 2);
        assert_eq!(auditor.count_action("todos.remove"), 0);
    }
}
