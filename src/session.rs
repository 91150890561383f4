//! Session orchestration: the explicit context object owning the
//! upload folder, the parser registry, the query engine, and the
//! history log.
//!
//! A session moves between two resting states:
//!
//! ```text
//! Empty ──reload() finds records──▶ Indexed ──ask()──▶ (answering) ──▶ Indexed
//!   ▲                                  │
//!   └──────reload() finds nothing──────┘
//! ```
//!
//! The query engine is built once on entering Indexed and reused for
//! every question. Uploading new files requires a reload, which
//! rebuilds the index from the full current folder contents, not just
//! the delta.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::answer::{self, AnswerProvider};
use crate::config::{AnswerConfig, Config};
use crate::engine::QueryEngine;
use crate::history::{now_timestamp, HistoryStore};
use crate::index::Index;
use crate::loader::{load_dir, LoadWarning, ParserRegistry};
use crate::models::{Answer, HistoryEntry};

/// User-visible notice for the empty state.
pub const NO_DOCUMENTS_NOTICE: &str =
    "No documents indexed yet. Upload some files to get started.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No documents indexed; queries are rejected.
    Empty,
    /// Index built and query engine ready.
    Indexed,
}

/// Outcome of copying files into the upload folder.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub accepted: Vec<String>,
    /// Rejected files with the reason (unsupported extension, I/O error).
    pub rejected: Vec<(String, String)>,
}

/// Outcome of a full reload of the upload folder.
#[derive(Debug, Default)]
pub struct ReloadReport {
    pub records: usize,
    pub chunks: usize,
    pub warnings: Vec<LoadWarning>,
    pub skipped: Vec<String>,
}

/// Builds a fresh answer provider each time the index is rebuilt.
pub type AnswererFactory =
    Box<dyn Fn(&AnswerConfig) -> Result<Box<dyn AnswerProvider>> + Send + Sync>;

pub struct Session {
    config: Config,
    registry: ParserRegistry,
    history: HistoryStore,
    engine: Option<QueryEngine>,
    answerer_factory: AnswererFactory,
}

impl Session {
    /// Create a session with the built-in parser registry, ensuring
    /// the upload folder exists.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_registry(config, ParserRegistry::with_builtins())
    }

    pub fn with_registry(config: Config, registry: ParserRegistry) -> Result<Self> {
        std::fs::create_dir_all(&config.storage.upload_dir)?;
        Ok(Self {
            config,
            registry,
            history: HistoryStore::new(),
            engine: None,
            answerer_factory: Box::new(answer::create_provider),
        })
    }

    /// Replace the answer provider factory. Seam for tests and
    /// embedders that bring their own provider.
    pub fn set_answerer_factory(&mut self, factory: AnswererFactory) {
        self.answerer_factory = factory;
    }

    pub fn state(&self) -> SessionState {
        if self.engine.is_some() {
            SessionState::Indexed
        } else {
            SessionState::Empty
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.storage.upload_dir
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Copy files into the upload folder, filtered by the registered
    /// extension allow-list. The folder is append-only: nothing is
    /// ever deleted here. Call [`reload`](Self::reload) afterwards to
    /// rebuild the index over the full folder contents.
    pub fn upload(&mut self, paths: &[PathBuf]) -> UploadReport {
        let mut report = UploadReport::default();

        for path in paths {
            let filename = match path.file_name() {
                Some(name) => name.to_string_lossy().to_string(),
                None => {
                    report
                        .rejected
                        .push((path.display().to_string(), "not a file".to_string()));
                    continue;
                }
            };

            let extension = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if !self.registry.supports(&extension) {
                report.rejected.push((
                    filename,
                    format!("unsupported extension (allowed: {})", self.registry.extensions().join(", ")),
                ));
                continue;
            }

            let dest = self.config.storage.upload_dir.join(&filename);
            match std::fs::copy(path, &dest) {
                Ok(_) => report.accepted.push(filename),
                Err(e) => report.rejected.push((filename, e.to_string())),
            }
        }

        report
    }

    /// Rebuild the index from the full current folder contents.
    ///
    /// With zero valid records the session stays (or falls back to)
    /// Empty and no answer provider is constructed, so a missing API
    /// key only surfaces once there is something to index.
    pub async fn reload(&mut self) -> Result<ReloadReport> {
        let outcome = load_dir(&self.config.storage.upload_dir, &self.registry)?;

        let mut report = ReloadReport {
            records: outcome.records.len(),
            chunks: 0,
            warnings: outcome.warnings,
            skipped: outcome.skipped,
        };

        if outcome.records.is_empty() {
            self.engine = None;
            return Ok(report);
        }

        let index = Index::build(
            &outcome.records,
            &self.config.chunking,
            &self.config.embedding,
        )
        .await?;
        report.chunks = index.chunk_count();

        let answerer = (self.answerer_factory)(&self.config.answer)?;
        self.engine = Some(QueryEngine::new(
            index,
            answerer,
            self.config.retrieval.top_k,
        ));

        Ok(report)
    }

    /// Answer one question and log it.
    ///
    /// Rejected in the Empty state without ever invoking the query
    /// path. A history entry is appended only for a successful answer;
    /// a failed external call leaves the log untouched.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let engine = match &self.engine {
            Some(engine) => engine,
            None => bail!("{}", NO_DOCUMENTS_NOTICE),
        };

        let answer = engine.ask(question).await?;

        self.history.append(HistoryEntry {
            timestamp: now_timestamp(),
            question: question.to_string(),
            answer: answer.text.clone(),
            source_display: answer.source_display(),
        });

        Ok(answer)
    }

    /// Export the full history log to `path` (CSV, overwrite).
    pub fn export_history(&self, path: &Path) -> Result<()> {
        self.history.export(path)
    }
}
