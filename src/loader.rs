//! Document loader: folder scan, extension dispatch, provenance stamping.
//!
//! The loader walks an upload folder, routes each file to the parser
//! registered for its extension, and aggregates per-file outcomes into
//! a success list and a warnings list. A file with no registered parser
//! is a filtered no-op, not an error; a parser failure is recovered
//! locally and reported as a warning naming the file. Partial failure
//! never aborts the batch.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::path::Path;
use walkdir::WalkDir;

use crate::models::{DocumentRecord, SOURCE_KEY};
use crate::parse::{CsvParser, DocumentParser, DocxParser, PdfParser, TextParser};

/// Extension-keyed parser table. New formats register here without
/// touching the loader or the session orchestration.
pub struct ParserRegistry {
    parsers: HashMap<String, Box<dyn DocumentParser>>,
}

impl ParserRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the built-in formats: pdf, docx, txt, csv.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("pdf", Box::new(PdfParser));
        registry.register("docx", Box::new(DocxParser));
        registry.register("txt", Box::new(TextParser));
        registry.register("csv", Box::new(CsvParser));
        registry
    }

    /// Register a parser for a file extension (without the dot).
    pub fn register(&mut self, extension: &str, parser: Box<dyn DocumentParser>) {
        self.parsers.insert(extension.to_lowercase(), parser);
    }

    pub fn get(&self, extension: &str) -> Option<&dyn DocumentParser> {
        self.parsers.get(&extension.to_lowercase()).map(|p| p.as_ref())
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.parsers.contains_key(&extension.to_lowercase())
    }

    /// Registered extensions in sorted order.
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.parsers.keys().map(|k| k.as_str()).collect();
        exts.sort_unstable();
        exts
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Non-fatal per-file failure surfaced to the user.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    pub file: String,
    pub reason: String,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "could not read {}: {}", self.file, self.reason)
    }
}

/// Aggregated result of loading one folder.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub records: Vec<DocumentRecord>,
    pub warnings: Vec<LoadWarning>,
    /// Filenames skipped because no parser is registered for them.
    pub skipped: Vec<String>,
}

/// Load every supported file in `dir` into document records.
///
/// Files are visited in sorted filename order for deterministic
/// output. Every successfully parsed record has its `source` metadata
/// overwritten with the originating filename, overriding anything the
/// parser itself populated.
pub fn load_dir(dir: &Path, registry: &ParserRegistry) -> Result<LoadOutcome> {
    if !dir.exists() {
        bail!("upload folder does not exist: {}", dir.display());
    }

    let mut entries: Vec<_> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();
    entries.sort_by_key(|e| e.file_name().to_os_string());

    let mut outcome = LoadOutcome::default();

    for entry in entries {
        let path = entry.path();
        let filename = entry.file_name().to_string_lossy().to_string();

        let extension = match path.extension() {
            Some(ext) => ext.to_string_lossy().to_lowercase(),
            None => {
                outcome.skipped.push(filename);
                continue;
            }
        };

        let parser = match registry.get(&extension) {
            Some(parser) => parser,
            None => {
                outcome.skipped.push(filename);
                continue;
            }
        };

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                outcome.warnings.push(LoadWarning {
                    file: filename,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        match parser.parse(&bytes) {
            Ok(mut records) => {
                for record in &mut records {
                    record
                        .metadata
                        .insert(SOURCE_KEY.to_string(), filename.clone());
                }
                outcome.records.extend(records);
            }
            Err(e) => {
                outcome.warnings.push(LoadWarning {
                    file: filename,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::ParseError;
    use std::fs;
    use tempfile::TempDir;

    /// Parser that stamps a bogus source, to prove the loader overwrites it.
    struct SelfishParser;

    impl DocumentParser for SelfishParser {
        fn format(&self) -> &str {
            "selfish"
        }

        fn parse(&self, bytes: &[u8]) -> Result<Vec<DocumentRecord>, ParseError> {
            let mut record = DocumentRecord::new(String::from_utf8_lossy(bytes).to_string());
            record
                .metadata
                .insert(SOURCE_KEY.to_string(), "wrong-name".to_string());
            Ok(vec![record])
        }
    }

    struct FailingParser;

    impl DocumentParser for FailingParser {
        fn format(&self) -> &str {
            "bad"
        }

        fn parse(&self, _bytes: &[u8]) -> Result<Vec<DocumentRecord>, ParseError> {
            Err(ParseError::Io("boom".to_string()))
        }
    }

    #[test]
    fn mixed_folder_loads_supported_and_skips_unsupported() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.txt"), "hello").unwrap();
        fs::write(tmp.path().join("data.csv"), "a,b\n1,2\n").unwrap();
        fs::write(tmp.path().join("image.xyz"), "binary").unwrap();

        let registry = ParserRegistry::with_builtins();
        let outcome = load_dir(tmp.path(), &registry).unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.skipped, vec!["image.xyz".to_string()]);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn source_metadata_always_matches_filename() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("report.sfx"), "content").unwrap();

        let mut registry = ParserRegistry::new();
        registry.register("sfx", Box::new(SelfishParser));
        let outcome = load_dir(tmp.path(), &registry).unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].source(), Some("report.sfx"));
    }

    #[test]
    fn parser_failure_warns_and_continues() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "fine").unwrap();
        fs::write(tmp.path().join("b.bad"), "doomed").unwrap();

        let mut registry = ParserRegistry::with_builtins();
        registry.register("bad", Box::new(FailingParser));
        let outcome = load_dir(tmp.path(), &registry).unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].file, "b.bad");
        assert!(outcome.warnings[0].to_string().contains("b.bad"));
    }

    #[test]
    fn corrupt_pdf_produces_warning_naming_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("broken.pdf"), "not a pdf").unwrap();
        fs::write(tmp.path().join("ok.txt"), "good").unwrap();

        let registry = ParserRegistry::with_builtins();
        let outcome = load_dir(tmp.path(), &registry).unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].file, "broken.pdf");
    }

    #[test]
    fn missing_folder_is_an_error() {
        let registry = ParserRegistry::with_builtins();
        assert!(load_dir(Path::new("/no/such/folder"), &registry).is_err());
    }

    #[test]
    fn files_load_in_sorted_order() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("z.txt"), "last").unwrap();
        fs::write(tmp.path().join("a.txt"), "first").unwrap();

        let registry = ParserRegistry::with_builtins();
        let outcome = load_dir(tmp.path(), &registry).unwrap();

        let sources: Vec<_> = outcome
            .records
            .iter()
            .map(|r| r.source().unwrap().to_string())
            .collect();
        assert_eq!(sources, vec!["a.txt", "z.txt"]);
    }
}
