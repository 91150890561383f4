//! Interactive question-answering shell.
//!
//! One session per process: documents are loaded and indexed once on
//! startup, every free-text line is answered against that index, and
//! the history log lives until the shell exits (or is exported).

use anyhow::Result;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::config::Config;
use crate::history::HistoryStore;
use crate::models::Answer;
use crate::session::{ReloadReport, Session, SessionState, NO_DOCUMENTS_NOTICE};

/// Truncation width for answers in the history listing.
const HISTORY_ANSWER_CHARS: usize = 100;

pub async fn run_shell(config: Config) -> Result<()> {
    let export_default = config.history.export_path.clone();
    let mut session = Session::new(config)?;

    println!("askdocs — ask questions from your documents");
    println!("Type a question, or :help for commands.");

    let report = session.reload().await?;
    print_reload_report(&report);
    if session.state() == SessionState::Empty {
        println!("{}", NO_DOCUMENTS_NOTICE);
    }

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix(':') {
            let mut parts = command.split_whitespace();
            match parts.next() {
                Some("quit") | Some("q") => break,
                Some("help") => print_help(),
                Some("upload") => {
                    let paths: Vec<PathBuf> = parts.map(PathBuf::from).collect();
                    if paths.is_empty() {
                        println!("usage: :upload <file>...");
                        continue;
                    }
                    let upload = session.upload(&paths);
                    for name in &upload.accepted {
                        println!("uploaded {}", name);
                    }
                    for (name, reason) in &upload.rejected {
                        eprintln!("rejected {}: {}", name, reason);
                    }
                    reload(&mut session).await;
                }
                Some("reload") => reload(&mut session).await,
                Some("history") => print_history(session.history()),
                Some("export") => {
                    let path = parts
                        .next()
                        .map(PathBuf::from)
                        .unwrap_or_else(|| export_default.clone());
                    match session.export_history(&path) {
                        Ok(()) => println!(
                            "History saved to {} ({} entries).",
                            path.display(),
                            session.history().len()
                        ),
                        Err(e) => eprintln!("Export failed: {:#}", e),
                    }
                }
                Some(other) => println!("Unknown command :{} (try :help)", other),
                None => print_help(),
            }
            continue;
        }

        // anything else is a question
        if session.state() == SessionState::Empty {
            println!("{}", NO_DOCUMENTS_NOTICE);
            continue;
        }
        match session.ask(input).await {
            Ok(answer) => print_answer(&answer),
            Err(e) => eprintln!("Query failed: {:#}", e),
        }
    }

    Ok(())
}

async fn reload(session: &mut Session) {
    match session.reload().await {
        Ok(report) => {
            print_reload_report(&report);
            if session.state() == SessionState::Empty {
                println!("{}", NO_DOCUMENTS_NOTICE);
            }
        }
        Err(e) => eprintln!("Reload failed: {:#}", e),
    }
}

fn print_reload_report(report: &ReloadReport) {
    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }
    if !report.skipped.is_empty() {
        println!("skipped {} unsupported file(s)", report.skipped.len());
    }
    if report.records > 0 {
        println!(
            "indexed {} record(s) in {} chunk(s)",
            report.records, report.chunks
        );
    }
}

fn print_answer(answer: &Answer) {
    println!();
    println!("Answer: {}", answer.text);
    println!("Sources: {}", answer.source_display());
    println!();
}

/// Most recent first, answers truncated for display.
fn print_history(history: &HistoryStore) {
    if history.is_empty() {
        println!("(no history yet)");
        return;
    }
    for entry in history.entries().iter().rev() {
        println!("[{}]", entry.timestamp);
        println!("Q: {}", entry.question);
        println!("A: {}", truncate_chars(&entry.answer, HISTORY_ANSWER_CHARS));
        println!("From: {}", entry.source_display);
        println!("---");
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :upload <file>...   copy files into the upload folder and reindex");
    println!("  :reload             reindex the upload folder");
    println!("  :history            show past questions and answers (most recent first)");
    println!("  :export [path]      save history as CSV (overwrites)");
    println!("  :quit               exit");
    println!("Anything else is treated as a question.");
}
