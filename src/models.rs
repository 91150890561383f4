//! Core data models used throughout askdocs.
//!
//! These types represent the records, chunks, and answers that flow
//! through the loading, indexing, and question-answering pipeline.

use std::collections::{BTreeMap, BTreeSet};

/// Metadata key that always carries the originating filename.
pub const SOURCE_KEY: &str = "source";

/// Normalized unit of ingested text plus provenance metadata.
///
/// Produced by a format parser and finalized by the loader, which
/// overwrites `metadata["source"]` with the originating filename no
/// matter what the parser populated.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl DocumentRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// The originating filename, if the loader has stamped it.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(|s| s.as_str())
    }
}

/// A chunk of one record's text, ready for embedding and retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    /// Index of the record this chunk came from, within its batch.
    pub record_index: usize,
    /// Source filename copied from the record for attribution.
    pub source: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// Generated answer text plus the unique source filenames consulted.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: BTreeSet<String>,
}

impl Answer {
    /// Comma-joined unique sources, or `N/A` when none were retrieved.
    pub fn source_display(&self) -> String {
        if self.sources.is_empty() {
            "N/A".to_string()
        } else {
            self.sources
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

/// One logged question/answer/source/timestamp tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Local wall-clock time, formatted `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
    pub question: String,
    pub answer: String,
    pub source_display: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_display_joins_unique_sources() {
        let mut sources = BTreeSet::new();
        sources.insert("a.pdf".to_string());
        sources.insert("b.txt".to_string());
        let answer = Answer {
            text: "ok".to_string(),
            sources,
        };
        assert_eq!(answer.source_display(), "a.pdf, b.txt");
    }

    #[test]
    fn source_display_empty_is_na() {
        let answer = Answer {
            text: "ok".to_string(),
            sources: BTreeSet::new(),
        };
        assert_eq!(answer.source_display(), "N/A");
    }
}
