//! In-memory semantic index over document records.
//!
//! Built once per batch of loaded records and rebuilt wholesale
//! whenever the document set changes; nothing is persisted across
//! runs. Records are chunked on paragraph boundaries, then (when an
//! embedding provider is enabled) one vector per chunk is generated in
//! batches. Retrieval is brute-force cosine similarity over all
//! stored vectors; with embeddings disabled it falls back to keyword
//! term-overlap scoring so the pipeline still works offline.

use anyhow::{bail, Result};

use crate::chunk::chunk_record;
use crate::config::{ChunkingConfig, EmbeddingConfig};
use crate::embedding;
use crate::models::{Chunk, DocumentRecord};

/// Opaque retrieval structure mapping semantic content back to chunks.
pub struct Index {
    chunks: Vec<Chunk>,
    /// One vector per chunk, parallel to `chunks`; `None` when the
    /// embedding provider is disabled.
    vectors: Option<Vec<Vec<f32>>>,
    embedding: EmbeddingConfig,
}

impl Index {
    /// Build an index from a non-empty batch of records.
    ///
    /// Callers must not attempt to build from an empty record set;
    /// the session refuses to enter its indexed state instead.
    pub async fn build(
        records: &[DocumentRecord],
        chunking: &ChunkingConfig,
        embedding_config: &EmbeddingConfig,
    ) -> Result<Self> {
        if records.is_empty() {
            bail!("nothing to index: no document records");
        }

        let mut chunks = Vec::new();
        for (record_index, record) in records.iter().enumerate() {
            let source = record.source().unwrap_or("(unknown)");
            chunks.extend(chunk_record(
                record_index,
                source,
                &record.text,
                chunking.max_tokens,
            ));
        }

        if chunks.is_empty() {
            bail!("nothing to index: all records were empty");
        }

        let vectors = if embedding_config.is_enabled() {
            let mut vectors = Vec::with_capacity(chunks.len());
            for batch in chunks.chunks(embedding_config.batch_size) {
                let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
                vectors.extend(embedding::embed_texts(embedding_config, &texts).await?);
            }
            Some(vectors)
        } else {
            None
        };

        Ok(Self {
            chunks,
            vectors,
            embedding: embedding_config.clone(),
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Retrieve the `top_k` chunks most relevant to the question.
    ///
    /// Scores by cosine similarity when vectors are present, keyword
    /// term-overlap otherwise. Keyword retrieval drops zero-match
    /// chunks, so an unrelated question can return fewer than `top_k`
    /// results (or none).
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<Chunk>> {
        let mut scored: Vec<(f64, &Chunk)> = match &self.vectors {
            Some(vectors) => {
                let query_vec = embedding::embed_query(&self.embedding, question).await?;
                self.chunks
                    .iter()
                    .zip(vectors.iter())
                    .map(|(chunk, vec)| {
                        (embedding::cosine_similarity(&query_vec, vec) as f64, chunk)
                    })
                    .collect()
            }
            None => {
                let question_lower = question.to_lowercase();
                let terms: Vec<&str> = question_lower.split_whitespace().collect();
                if terms.is_empty() {
                    return Ok(Vec::new());
                }
                self.chunks
                    .iter()
                    .filter_map(|chunk| {
                        let text_lower = chunk.text.to_lowercase();
                        let matches = terms.iter().filter(|t| text_lower.contains(*t)).count();
                        if matches > 0 {
                            Some((matches as f64, chunk))
                        } else {
                            None
                        }
                    })
                    .collect()
            }
        };

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored.into_iter().map(|(_, chunk)| chunk.clone()).collect())
    }
}
