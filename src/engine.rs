//! Query engine: retrieval plus answer synthesis.
//!
//! Built once when the session enters its indexed state and reused for
//! every subsequent question; the index is never rebuilt per query.

use anyhow::Result;
use std::collections::BTreeSet;

use crate::answer::{build_context, AnswerProvider};
use crate::index::Index;
use crate::models::Answer;

pub struct QueryEngine {
    index: Index,
    answerer: Box<dyn AnswerProvider>,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(index: Index, answerer: Box<dyn AnswerProvider>, top_k: usize) -> Self {
        Self {
            index,
            answerer,
            top_k,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.index.chunk_count()
    }

    /// Answer one question against the index.
    ///
    /// Failures (retrieval or the external answer call) propagate to
    /// the caller as query-level errors; the engine itself stays
    /// usable for the next question.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let chunks = self.index.retrieve(question, self.top_k).await?;
        let context = build_context(&chunks);
        let text = self.answerer.generate(question, &context).await?;

        let sources: BTreeSet<String> = chunks.into_iter().map(|c| c.source).collect();

        Ok(Answer { text, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, EmbeddingConfig};
    use crate::models::{DocumentRecord, SOURCE_KEY};
    use async_trait::async_trait;

    struct EchoAnswerer;

    #[async_trait]
    impl AnswerProvider for EchoAnswerer {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, question: &str, _context: &str) -> Result<String> {
            Ok(format!("echo: {}", question))
        }
    }

    struct FailingAnswerer;

    #[async_trait]
    impl AnswerProvider for FailingAnswerer {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate(&self, _question: &str, _context: &str) -> Result<String> {
            anyhow::bail!("service unavailable")
        }
    }

    async fn indexed(records: Vec<DocumentRecord>) -> Index {
        Index::build(
            &records,
            &ChunkingConfig::default(),
            &EmbeddingConfig::default(),
        )
        .await
        .unwrap()
    }

    fn record(source: &str, text: &str) -> DocumentRecord {
        let mut r = DocumentRecord::new(text);
        r.metadata
            .insert(SOURCE_KEY.to_string(), source.to_string());
        r
    }

    #[tokio::test]
    async fn ask_returns_answer_with_unique_sources() {
        let index = indexed(vec![
            record("contract.pdf", "The deadline is March 1.\n\nThe deadline is firm."),
            record("notes.txt", "Unrelated grocery list."),
        ])
        .await;
        let engine = QueryEngine::new(index, Box::new(EchoAnswerer), 3);

        let answer = engine.ask("What is the deadline?").await.unwrap();
        assert!(!answer.text.is_empty());
        assert!(answer.sources.contains("contract.pdf"));
        // the unrelated file never matches, so only one source remains
        assert_eq!(answer.sources.len(), 1);
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let index = indexed(vec![record("a.txt", "some text here")]).await;
        let engine = QueryEngine::new(index, Box::new(FailingAnswerer), 3);

        assert!(engine.ask("text").await.is_err());
    }
}
