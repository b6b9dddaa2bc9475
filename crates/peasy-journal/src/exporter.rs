//! Export recordings to various formats

use crate::{Error, JournalEntry, JournalStats, Recording, Result};
use serde::Serialize;
use std::io::Write;

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// RON format (Rust Object Notation)
    Ron,
    /// JSON format (requires serde_json feature)
    Json,
    /// CSV format (actions only)
    Csv,
    /// Human-readable text format
    Text,
}

/// Exporter for a recording
pub struct Exporter<'a> {
    recording: &'a Recording,
}

impl<'a> Exporter<'a> {
    pub fn new(recording: &'a Recording) -> Self {
        Self { recording }
    }

    /// Export to a string in the specified format
    pub fn export(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Ron => self.to_ron(),
            ExportFormat::Json => self.to_json(),
            ExportFormat::Csv => self.to_csv(),
            ExportFormat::Text => Ok(self.to_text()),
        }
    }

    /// Export to a writer
    pub fn export_to<W: Write>(&self, writer: &mut W, format: ExportFormat) -> Result<()> {
        let content = self.export(format)?;
        writer.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Export entries and stats to RON
    pub fn to_ron(&self) -> Result<String> {
        let export = ExportData::from_recording(self.recording);
        ron::ser::to_string_pretty(&export, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Export the bare recording to RON, readable by
    /// [`Recording::from_ron`]
    pub fn recording_to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(self.recording, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Export entries and stats to JSON
    #[cfg(feature = "serde_json")]
    pub fn to_json(&self) -> Result<String> {
        let export = ExportData::from_recording(self.recording);
        serde_json::to_string_pretty(&export).map_err(|e| Error::Serialization(e.to_string()))
    }

    #[cfg(not(feature = "serde_json"))]
    pub fn to_json(&self) -> Result<String> {
        Err(Error::ExportError(
            "JSON export requires the 'serde_json' feature".to_string(),
        ))
    }

    /// Export to CSV (actions only, payloads as compact RON)
    pub fn to_csv(&self) -> Result<String> {
        let mut output = String::new();
        output.push_str("seq,recorded_at,type,payload\n");

        for (seq, action) in self.recording.actions() {
            let recorded_at = self
                .recording
                .get(seq)
                .map(|entry| entry.recorded_at().to_rfc3339())
                .unwrap_or_default();
            let payload =
                ron::to_string(&action.payload).map_err(|e| Error::Serialization(e.to_string()))?;

            output.push_str(&format!(
                "{},{},{},{}\n",
                seq,
                recorded_at,
                csv_field(&action.kind),
                csv_field(&payload)
            ));
        }

        Ok(output)
    }

    /// Export to human-readable text
    pub fn to_text(&self) -> String {
        let mut output = String::new();
        let stats = self.recording.stats();

        output.push_str("=== Journal Export ===\n\n");
        output.push_str(&format!("Total entries: {}\n", stats.total_entries));
        output.push_str(&format!("Actions: {}\n", stats.action_count));
        if let (Some(first), Some(last)) = (stats.first_seq, stats.last_seq) {
            output.push_str(&format!("Sequence range: {} - {}\n", first, last));
        }

        output.push_str("\n=== Entries ===\n\n");

        for entry in self.recording.entries() {
            let at = entry.recorded_at().format("%H:%M:%S%.3f");
            match entry {
                JournalEntry::Init { seq, .. } => {
                    output.push_str(&format!("  #{} {} [INIT]\n", seq, at));
                }
                JournalEntry::Action { seq, action, .. } => {
                    output.push_str(&format!("  #{} {} {}\n", seq, at, action.kind));
                    if !action.payload.is_null() {
                        output.push_str(&format!("      payload: {}\n", action.payload));
                    }
                }
            }
            if let Some(state) = entry.state() {
                output.push_str(&format!("      state: {}\n", state));
            }
        }

        output
    }

    /// Export only entries with `start <= seq <= end`
    pub fn export_range(&self, start: u64, end: u64, format: ExportFormat) -> Result<String> {
        let entries: Vec<JournalEntry> = self
            .recording
            .entries_in_range(start, end)?
            .into_iter()
            .cloned()
            .collect();
        let filtered = FilteredExport { entries };

        match format {
            ExportFormat::Ron => {
                ron::ser::to_string_pretty(&filtered, ron::ser::PrettyConfig::default())
                    .map_err(|e| Error::Serialization(e.to_string()))
            }
            #[cfg(feature = "serde_json")]
            ExportFormat::Json => serde_json::to_string_pretty(&filtered)
                .map_err(|e| Error::Serialization(e.to_string())),
            #[cfg(not(feature = "serde_json"))]
            ExportFormat::Json => Err(Error::ExportError(
                "JSON export requires the 'serde_json' feature".to_string(),
            )),
            _ => Err(Error::ExportError(
                "Range export only supports RON and JSON".to_string(),
            )),
        }
    }
}

/// Quote a CSV field, doubling embedded quotes
fn csv_field(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Data structure for full export
#[derive(Debug, Clone, Serialize)]
struct ExportData {
    version: u32,
    stats: JournalStats,
    entries: Vec<JournalEntry>,
}

impl ExportData {
    fn from_recording(recording: &Recording) -> Self {
        Self {
            version: 1,
            stats: recording.stats(),
            entries: recording.entries().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct FilteredExport {
    entries: Vec<JournalEntry>,
}
