//! Session history: an append-only in-memory question/answer log.
//!
//! Entries are never mutated or removed through the public contract;
//! the log lives for the process lifetime and can be exported in full
//! to a CSV file (overwrite, not append) on demand.

use anyhow::{Context, Result};
use std::path::Path;

use crate::models::HistoryEntry;

/// Fixed export column order.
const EXPORT_HEADER: [&str; 4] = ["timestamp", "question", "answer", "source"];

#[derive(Debug, Default)]
pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry to the end of the log.
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// All entries in insertion order (oldest first).
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the whole log to `path` as CSV, overwriting any
    /// existing file. The in-memory log is untouched regardless of
    /// the outcome.
    pub fn export(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to open export file: {}", path.display()))?;

        writer.write_record(EXPORT_HEADER)?;
        for entry in &self.entries {
            writer.write_record([
                entry.timestamp.as_str(),
                entry.question.as_str(),
                entry.answer.as_str(),
                entry.source_display.as_str(),
            ])?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write export file: {}", path.display()))?;

        Ok(())
    }
}

/// Current local time in the log's timestamp format.
pub fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
