//! Peasy Journal - recording, auditing, replay and export for stores
//!
//! This crate plugs into `peasy-core`'s inspection hook:
//!
//! - **Journal**: an [`Inspector`](peasy_core::Inspector) that records the
//!   initial state and every applied action
//! - **Auditor**: query and summarize a recording
//! - **Replayer**: walk recorded states, or re-dispatch into a fresh store
//! - **Exporter**: export a recording to RON, JSON, CSV or text
//!
//! # Example
//!
//! ```
//! use peasy_core::{Model, Outcome, Store, StoreConfig};
//! use peasy_journal::{Auditor, Exporter, Journal, Replayer};
//! use std::sync::Arc;
//!
//! let model = Model::new().namespace(
//!     "counter",
//!     Model::new().data("value", 0i64).mutator("increment", |draft, _, _| {
//!         let value = draft.get_int("value")?;
//!         draft.set("value", value + 1)?;
//!         Ok(Outcome::Commit)
//!     }),
//! );
//!
//! // Record a session
//! let journal = Arc::new(Journal::new());
//! let config = StoreConfig::new()
//!     .with_dev_tools(true)
//!     .with_inspector(journal.clone());
//! let store = Store::new(model, config)?;
//! store.call("counter.increment", ())?;
//! store.call("counter.increment", ())?;
//!
//! let recording = journal.recording();
//!
//! // Audit the session
//! let report = Auditor::new(&recording).generate_report();
//! assert_eq!(report.total_actions, 2);
//!
//! // Go back to right after the first increment
//! let mut replayer = Replayer::new(&recording);
//! let state = replayer.goto(1)?;
//! assert_eq!(state.get_path(&"counter.value".into()).and_then(|v| v.as_int()), Some(1));
//!
//! // Export for external analysis
//! let text = Exporter::new(&recording).to_text();
//! assert!(text.contains("counter.increment"));
//! # Ok::<(), peasy_journal::Error>(())
//! ```

mod auditor;
mod error;
mod exporter;
mod journal;
mod replayer;

pub use auditor::{AuditQuery, AuditReport, Auditor};
pub use error::{Error, Result};
pub use exporter::{ExportFormat, Exporter};
pub use journal::{Journal, JournalConfig, JournalEntry, JournalStats, Recording};
pub use replayer::{ReplayReport, ReplayState, Replayer};
