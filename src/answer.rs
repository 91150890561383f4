//! Answer synthesis through a hosted LLM.
//!
//! The pipeline's only contract with the language model is one
//! synchronous request (question + retrieved context) → one response
//! (answer text). [`AnswerProvider`] is the seam: the query engine
//! holds a trait object, so tests substitute a stub and never touch
//! the network.
//!
//! Implementations:
//! - **[`TogetherProvider`]** — Together AI chat completions
//!   (OpenAI-compatible). Requires `TOGETHER_API_KEY` in the
//!   environment.
//! - **[`OllamaProvider`]** — a local Ollama instance's `/api/chat`
//!   endpoint.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::AnswerConfig;
use crate::models::Chunk;

/// Generates one answer from a question and its retrieved context.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Provider name for status output.
    fn name(&self) -> &str;

    /// Produce answer text for the question, grounded in `context`.
    async fn generate(&self, question: &str, context: &str) -> Result<String>;
}

/// Build the context block from retrieved chunks: numbered excerpts,
/// each labelled with its source filename.
pub fn build_context(chunks: &[Chunk]) -> String {
    let mut context = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        context.push_str(&format!(
            "[{}] {}\n\n{}\n\n---\n\n",
            i + 1,
            chunk.source,
            chunk.text
        ));
    }
    context
}

/// Build the full grounded prompt sent to the model.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a document-grounded assistant. Answer the question using ONLY the \
         excerpts below. If the answer is not in the excerpts, say that the \
         information is not available in the provided documents.\n\n\
         EXCERPTS:\n{context}\n\
         QUESTION: {question}\n\n\
         Answer:",
        context = context,
        question = question
    )
}

/// Create the configured [`AnswerProvider`].
pub fn create_provider(config: &AnswerConfig) -> Result<Box<dyn AnswerProvider>> {
    match config.provider.as_str() {
        "together" => Ok(Box::new(TogetherProvider::new(config)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config))),
        other => bail!("Unknown answer provider: {}", other),
    }
}

// ============ Together ============

/// Answer provider backed by the Together AI chat completions API.
pub struct TogetherProvider {
    api_key: String,
    model: String,
    url: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl TogetherProvider {
    pub fn new(config: &AnswerConfig) -> Result<Self> {
        let api_key = std::env::var("TOGETHER_API_KEY")
            .map_err(|_| anyhow::anyhow!("TOGETHER_API_KEY environment variable not set"))?;
        Ok(Self {
            api_key,
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.together.xyz/v1/chat/completions".to_string()),
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl AnswerProvider for TogetherProvider {
    fn name(&self) -> &str {
        "together"
    }

    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": build_prompt(question, context) }
            ],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(&self.url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Together API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Together API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Answer request failed after retries")))
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))
}

// ============ Ollama ============

/// Answer provider backed by a local Ollama instance.
pub struct OllamaProvider {
    model: String,
    url: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl OllamaProvider {
    pub fn new(config: &AnswerConfig) -> Self {
        Self {
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        }
    }
}

#[async_trait]
impl AnswerProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": build_prompt(question, context) }
            ],
            "stream": false,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(format!("{}/api/chat", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return json
                            .get("message")
                            .and_then(|m| m.get("content"))
                            .and_then(|t| t.as_str())
                            .map(|s| s.trim().to_string())
                            .ok_or_else(|| {
                                anyhow::anyhow!("Invalid Ollama response: missing message.content")
                            });
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Ollama API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Ollama API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow::anyhow!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url,
                        e
                    ));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Answer request failed after retries")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_record;

    #[test]
    fn context_numbers_chunks_and_names_sources() {
        let chunks: Vec<Chunk> = chunk_record(0, "contract.pdf", "The deadline is March 1.", 512)
            .into_iter()
            .chain(chunk_record(1, "notes.txt", "Payment due on signing.", 512))
            .collect();
        let context = build_context(&chunks);
        assert!(context.contains("[1] contract.pdf"));
        assert!(context.contains("[2] notes.txt"));
        assert!(context.contains("The deadline is March 1."));
    }

    #[test]
    fn prompt_embeds_question_and_context() {
        let prompt = build_prompt("What is the deadline?", "[1] a.pdf\n\ntext\n");
        assert!(prompt.contains("QUESTION: What is the deadline?"));
        assert!(prompt.contains("[1] a.pdf"));
    }

    #[test]
    fn chat_response_parsing() {
        let json = serde_json::json!({
            "choices": [ { "message": { "content": "  March 1.  " } } ]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "March 1.");

        let bad = serde_json::json!({ "choices": [] });
        assert!(parse_chat_response(&bad).is_err());
    }
}
