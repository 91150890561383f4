//! End-to-end pipeline tests: load → index → ask → history → export.
//!
//! The external LLM is replaced by a stub answer provider, so these
//! tests run entirely offline.

use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use std::io::Write;
use tempfile::TempDir;

use askdocs::answer::AnswerProvider;
use askdocs::config::Config;
use askdocs::loader::{load_dir, ParserRegistry};
use askdocs::session::{Session, SessionState};

/// Minimal docx (ZIP) containing word/document.xml with the given text.
fn minimal_docx_with_text(phrase: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            phrase
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

struct CannedAnswerer(String);

#[async_trait]
impl AnswerProvider for CannedAnswerer {
    fn name(&self) -> &str {
        "canned"
    }

    async fn generate(&self, _question: &str, _context: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

struct OutageAnswerer;

#[async_trait]
impl AnswerProvider for OutageAnswerer {
    fn name(&self) -> &str {
        "outage"
    }

    async fn generate(&self, _question: &str, _context: &str) -> Result<String> {
        anyhow::bail!("connection refused")
    }
}

fn session_in(tmp: &TempDir, canned: &str) -> Session {
    let mut config = Config::default();
    config.storage.upload_dir = tmp.path().join("uploads");
    let mut session = Session::new(config).unwrap();
    let canned = canned.to_string();
    session.set_answerer_factory(Box::new(move |_| {
        Ok(Box::new(CannedAnswerer(canned.clone())) as Box<dyn AnswerProvider>)
    }));
    session
}

#[test]
fn loader_handles_mixed_supported_and_unsupported_files() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("contract.docx"),
        minimal_docx_with_text("The deadline is March 1."),
    )
    .unwrap();
    fs::write(tmp.path().join("notes.txt"), "Meeting notes.").unwrap();
    fs::write(tmp.path().join("log.csv"), "date,event\n2025-03-01,kickoff\n").unwrap();
    fs::write(tmp.path().join("b.xyz"), "mystery bytes").unwrap();
    fs::write(tmp.path().join("broken.pdf"), "not a pdf at all").unwrap();

    let registry = ParserRegistry::with_builtins();
    let outcome = load_dir(tmp.path(), &registry).unwrap();

    // one record per supported, parseable file
    assert_eq!(outcome.records.len(), 3);
    // unsupported extension is a filtered no-op, not a warning
    assert_eq!(outcome.skipped, vec!["b.xyz".to_string()]);
    // the corrupt pdf is a warning naming the file, batch continues
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].file, "broken.pdf");

    // provenance: every record's source equals its originating filename
    let mut sources: Vec<&str> = outcome.records.iter().map(|r| r.source().unwrap()).collect();
    sources.sort_unstable();
    assert_eq!(sources, vec!["contract.docx", "log.csv", "notes.txt"]);
}

#[tokio::test]
async fn ask_attributes_answer_to_uploaded_docx() {
    let tmp = TempDir::new().unwrap();
    let mut session = session_in(&tmp, "The deadline is March 1.");

    let staging = tmp.path().join("staging");
    fs::create_dir_all(&staging).unwrap();
    fs::write(
        staging.join("contract.docx"),
        minimal_docx_with_text("The project deadline is March 1."),
    )
    .unwrap();

    let upload = session.upload(&[staging.join("contract.docx")]);
    assert_eq!(upload.accepted, vec!["contract.docx".to_string()]);

    let report = session.reload().await.unwrap();
    assert_eq!(report.records, 1);
    assert_eq!(session.state(), SessionState::Indexed);

    let answer = session.ask("What is the deadline?").await.unwrap();
    assert!(!answer.text.is_empty());
    assert_eq!(
        answer.sources.iter().collect::<Vec<_>>(),
        vec!["contract.docx"]
    );

    let entries = session.history().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].question, "What is the deadline?");
    assert_eq!(entries[0].source_display, "contract.docx");
}

#[tokio::test]
async fn history_export_roundtrip_and_idempotence() {
    let tmp = TempDir::new().unwrap();
    let mut session = session_in(&tmp, "answer text");
    fs::write(
        session.upload_dir().join("facts.txt"),
        "alpha facts\n\nbeta facts",
    )
    .unwrap();
    session.reload().await.unwrap();

    session.ask("first question about alpha").await.unwrap();
    session.ask("second question about beta").await.unwrap();

    let export_path = tmp.path().join("history.csv");
    session.export_history(&export_path).unwrap();

    // round-trip: same number of rows, same order as appended
    let mut reader = csv::Reader::from_path(&export_path).unwrap();
    assert_eq!(
        reader.headers().unwrap().iter().collect::<Vec<_>>(),
        vec!["timestamp", "question", "answer", "source"]
    );
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][1], "first question about alpha");
    assert_eq!(&rows[1][1], "second question about beta");

    // idempotence: exporting again with no new entries is byte-identical
    let first = fs::read(&export_path).unwrap();
    session.export_history(&export_path).unwrap();
    let second = fs::read(&export_path).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn empty_folder_disables_the_query_path() {
    let tmp = TempDir::new().unwrap();
    let mut session = session_in(&tmp, "never called");

    let report = session.reload().await.unwrap();
    assert_eq!(report.records, 0);
    assert_eq!(session.state(), SessionState::Empty);

    let err = session.ask("anything at all").await.unwrap_err();
    assert!(err.to_string().contains("No documents indexed yet"));
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn upload_of_only_invalid_files_reports_no_documents() {
    let tmp = TempDir::new().unwrap();
    let mut session = session_in(&tmp, "never called");

    let staging = tmp.path().join("staging");
    fs::create_dir_all(&staging).unwrap();
    fs::write(staging.join("garbage.pdf"), "definitely not a pdf").unwrap();

    let upload = session.upload(&[staging.join("garbage.pdf")]);
    assert_eq!(upload.accepted.len(), 1); // allow-listed extension copies fine

    let report = session.reload().await.unwrap();
    assert_eq!(report.records, 0);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].file, "garbage.pdf");
    // zero valid records leaves the session Empty, not silently half-built
    assert_eq!(session.state(), SessionState::Empty);
}

#[tokio::test]
async fn external_failure_leaves_history_and_session_intact() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.upload_dir = tmp.path().join("uploads");
    let mut session = Session::new(config).unwrap();
    session.set_answerer_factory(Box::new(|_| {
        Ok(Box::new(OutageAnswerer) as Box<dyn AnswerProvider>)
    }));

    fs::write(session.upload_dir().join("a.txt"), "some indexed text").unwrap();
    session.reload().await.unwrap();

    assert!(session.ask("indexed").await.is_err());
    assert!(session.history().is_empty());
    assert_eq!(session.state(), SessionState::Indexed);
}

#[tokio::test]
async fn new_uploads_rebuild_over_the_whole_folder() {
    let tmp = TempDir::new().unwrap();
    let mut session = session_in(&tmp, "ok");

    let staging = tmp.path().join("staging");
    fs::create_dir_all(&staging).unwrap();
    fs::write(staging.join("first.txt"), "first document body").unwrap();
    fs::write(staging.join("second.txt"), "second document body").unwrap();

    session.upload(&[staging.join("first.txt")]);
    let first = session.reload().await.unwrap();
    assert_eq!(first.records, 1);

    session.upload(&[staging.join("second.txt")]);
    let second = session.reload().await.unwrap();
    assert_eq!(second.records, 2);

    // both files answer with full-folder attribution available
    let answer = session.ask("second document").await.unwrap();
    assert!(answer.sources.contains("second.txt"));
}

#[tokio::test]
async fn registered_custom_format_flows_through_the_pipeline() {
    use askdocs::models::DocumentRecord;
    use askdocs::parse::{DocumentParser, ParseError};

    struct UppercaseParser;

    impl DocumentParser for UppercaseParser {
        fn format(&self) -> &str {
            "up"
        }

        fn parse(&self, bytes: &[u8]) -> Result<Vec<DocumentRecord>, ParseError> {
            Ok(vec![DocumentRecord::new(
                String::from_utf8_lossy(bytes).to_uppercase(),
            )])
        }
    }

    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.upload_dir = tmp.path().join("uploads");

    let mut registry = ParserRegistry::with_builtins();
    registry.register("up", Box::new(UppercaseParser));
    let mut session = Session::with_registry(config, registry).unwrap();
    session.set_answerer_factory(Box::new(|_| {
        Ok(Box::new(CannedAnswerer("ok".to_string())) as Box<dyn AnswerProvider>)
    }));

    fs::write(session.upload_dir().join("memo.up"), "quarterly results").unwrap();
    let report = session.reload().await.unwrap();
    assert_eq!(report.records, 1);

    let answer = session.ask("QUARTERLY").await.unwrap();
    assert!(answer.sources.contains("memo.up"));
}

#[test]
fn upload_rejects_paths_outside_the_allow_list() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.upload_dir = tmp.path().join("uploads");
    let mut session = Session::new(config).unwrap();

    let staging = tmp.path().join("staging");
    fs::create_dir_all(&staging).unwrap();
    fs::write(staging.join("slides.pptx"), "zip bytes").unwrap();

    let report = session.upload(&[staging.join("slides.pptx")]);
    assert!(report.accepted.is_empty());
    assert_eq!(report.rejected.len(), 1);
    assert!(report.rejected[0].1.contains("unsupported extension"));
}
