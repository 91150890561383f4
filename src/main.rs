//! # askdocs CLI
//!
//! Ask questions from your documents. Files are loaded from an upload
//! folder, indexed in memory for the lifetime of the process, and
//! answered through a hosted LLM with source attribution.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `askdocs upload <file>...` | Copy files into the upload folder |
//! | `askdocs ask "<question>"` | One-shot: load, index, answer |
//! | `askdocs status` | List uploaded files and their support status |
//! | `askdocs shell` | Interactive session with history and export |
//!
//! ## Examples
//!
//! ```bash
//! # Stage some documents
//! askdocs upload contract.pdf minutes.docx
//!
//! # One-shot question (index is rebuilt each run)
//! askdocs ask "What is the deadline?"
//!
//! # Interactive session: many questions over one index build
//! askdocs shell
//! ```
//!
//! Answer generation requires `TOGETHER_API_KEY` in the environment
//! (or an `[answer]` config section pointing at a local Ollama).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use askdocs::config;
use askdocs::loader::ParserRegistry;
use askdocs::session::{Session, SessionState, NO_DOCUMENTS_NOTICE};
use askdocs::shell;
use askdocs::status;

/// askdocs — ask questions from your documents.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file; every setting has a default, so the file is
/// optional.
#[derive(Parser)]
#[command(
    name = "askdocs",
    about = "Ask questions from your documents",
    version,
    long_about = "askdocs loads PDF, DOCX, TXT, and CSV files from an upload folder, \
    indexes them in memory, and answers natural language questions through a hosted \
    LLM with source attribution. A session history log can be exported as CSV."
)]
struct Cli {
    /// Path to configuration file (TOML). Optional; defaults apply.
    #[arg(long, global = true, default_value = "./config/askdocs.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Copy files into the upload folder.
    ///
    /// Only files whose extension has a registered parser (pdf, docx,
    /// txt, csv) are accepted; everything else is rejected with a
    /// notice. The folder is append-only.
    Upload {
        /// Files to upload.
        files: Vec<PathBuf>,
    },

    /// Ask one question against the uploaded documents.
    ///
    /// Loads the upload folder, builds the in-memory index, retrieves
    /// the most relevant chunks, and prints the generated answer with
    /// its source files. The index is rebuilt on every run.
    Ask {
        /// The question to answer.
        question: String,

        /// Number of source chunks consulted (overrides config).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// List the upload folder contents and their support status.
    Status,

    /// Start an interactive session.
    ///
    /// Documents are indexed once; every free-text line is answered
    /// against that index. `:history` shows past answers,
    /// `:export` saves them as CSV, `:upload` adds files and
    /// rebuilds the index over the full folder.
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Upload { files } => {
            if files.is_empty() {
                println!("Nothing to upload.");
                return Ok(());
            }
            let mut session = Session::new(cfg)?;
            let report = session.upload(&files);
            for name in &report.accepted {
                println!("uploaded {}", name);
            }
            for (name, reason) in &report.rejected {
                eprintln!("rejected {}: {}", name, reason);
            }
            println!(
                "{} uploaded, {} rejected",
                report.accepted.len(),
                report.rejected.len()
            );
        }
        Commands::Ask { question, top_k } => {
            if let Some(k) = top_k {
                cfg.retrieval.top_k = k;
            }
            let mut session = Session::new(cfg)?;
            let report = session.reload().await?;
            for warning in &report.warnings {
                eprintln!("warning: {}", warning);
            }
            if session.state() == SessionState::Empty {
                println!("{}", NO_DOCUMENTS_NOTICE);
                return Ok(());
            }
            let answer = session.ask(&question).await?;
            println!("Answer: {}", answer.text);
            println!("Sources: {}", answer.source_display());
        }
        Commands::Status => {
            status::show_status(&cfg, &ParserRegistry::with_builtins())?;
        }
        Commands::Shell => {
            shell::run_shell(cfg).await?;
        }
    }

    Ok(())
}
