//! LLM-based text summarization.
//!
//! Short texts are summarized in a single call. Longer texts go through a
//! map-reduce pass: each chunk is summarized, then the ordered partial
//! summaries are merged into one result.

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::llm::{CompletionOptions, LlmClient, LlmResult, prompt_within};
use crate::memory::core::config::MemoryConfig;
use crate::memory::core::errors::{CoreError, CoreResult};
use crate::memory::summarization::chunker::{SummaryChunk, TextChunker};

/// How a summary was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMethod {
    /// One call over the whole text.
    Direct,
    /// Per-chunk summaries merged by a final call.
    Chunked,
}

impl SummaryMethod {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Chunked => "chunked",
        }
    }
}

impl fmt::Display for SummaryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a summarization request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryOutcome {
    /// Leading part of the source text, `...` appended when cut.
    pub original_preview: String,
    /// Final summary.
    pub summary: String,
    /// Source length in characters.
    pub original_length: usize,
    /// Strategy used.
    pub method: SummaryMethod,
    /// Number of chunks summarized (chunked method only).
    pub chunks_processed: Option<usize>,
    /// Model that produced the summary.
    pub model: String,
}

/// Summarizes arbitrary text through the configured completion backend.
pub struct Summarizer {
    client: Arc<dyn LlmClient>,
    config: Arc<MemoryConfig>,
    chunker: TextChunker,
}

impl Summarizer {
    /// Create a summarizer.
    ///
    /// # Errors
    /// Returns a configuration error if the chunk settings are invalid.
    pub fn new(client: Arc<dyn LlmClient>, config: Arc<MemoryConfig>) -> CoreResult<Self> {
        let chunker = TextChunker::from_config(&config.summary)?;
        Ok(Self {
            client,
            config,
            chunker,
        })
    }

    /// Summarize `text`, choosing the direct or chunked strategy by length.
    ///
    /// # Errors
    /// Returns a validation error for empty text, a configuration error when
    /// the credential is missing, and a service error if any call fails.
    pub async fn summarize(&self, text: &str) -> CoreResult<SummaryOutcome> {
        if text.trim().is_empty() {
            return Err(CoreError::missing("text"));
        }
        self.config.llm.require_credential()?;

        let original_length = text.chars().count();
        let (summary, method, chunks_processed) =
            if original_length <= self.config.summary.direct_threshold {
                info!(original_length, "summarizing text directly");
                let summary = self.call(direct_prompt(text)).await.inspect_err(|err| {
                    warn!(error = %err, "direct summary failed");
                })?;
                (summary, SummaryMethod::Direct, None)
            } else {
                let (summary, chunks) = self.summarize_chunked(text).await?;
                (summary, SummaryMethod::Chunked, Some(chunks))
            };

        Ok(SummaryOutcome {
            original_preview: preview(text, self.config.summary.preview_chars),
            summary,
            original_length,
            method,
            chunks_processed,
            model: self.client.model().to_string(),
        })
    }

    async fn summarize_chunked(&self, text: &str) -> CoreResult<(String, usize)> {
        let chunks = self.chunker.chunk(text);
        let chunk_count = chunks.len();
        info!(
            chunks = chunk_count,
            chunk_size = self.chunker.max_chunk_size(),
            overlap = self.chunker.overlap(),
            "summarizing text in chunks"
        );

        // `buffered` yields results in input order whatever the concurrency.
        let partials: Vec<String> = stream::iter(chunks)
            .map(|chunk| self.summarize_chunk(chunk))
            .buffered(self.config.summary.concurrency.max(1))
            .try_collect()
            .await
            .inspect_err(|err| warn!(error = %err, "chunk summary failed, aborting"))?;

        let summary = self.reduce(partials).await?;
        Ok((summary, chunk_count))
    }

    async fn summarize_chunk(&self, chunk: SummaryChunk) -> LlmResult<String> {
        debug!(index = chunk.index, start = chunk.start, "summarizing chunk");
        self.call(chunk_prompt(&chunk.text)).await
    }

    /// Fold ordered partial summaries into one.
    async fn reduce(&self, mut partials: Vec<String>) -> CoreResult<String> {
        let max_chars = self.config.summary.merge_max_chars;

        if partials.len() == 1 {
            return Ok(partials.remove(0));
        }

        while partials.len() > 2 && joined_len(&partials) > max_chars {
            debug!(partials = partials.len(), "partial summaries over budget, merging in groups");
            let mut merged = Vec::new();
            for group in group_partials(partials, max_chars) {
                if group.len() == 1 {
                    merged.extend(group);
                } else {
                    merged.push(self.call(merge_prompt(&group)).await?);
                }
            }
            partials = merged;
        }

        let summary = self.call(merge_prompt(&partials)).await.inspect_err(|err| {
            warn!(error = %err, "merge of partial summaries failed");
        })?;
        Ok(summary)
    }

    async fn call(&self, prompt: String) -> LlmResult<String> {
        let options = CompletionOptions {
            temperature: self.config.llm.summary_temperature,
            max_tokens: self.config.llm.max_tokens,
        };
        prompt_within(
            self.client.as_ref(),
            &prompt,
            options,
            self.config.llm.timeout(),
        )
        .await
    }
}

fn direct_prompt(text: &str) -> String {
    format!("Write a concise summary of the following text:\n\n{text}")
}

fn chunk_prompt(chunk: &str) -> String {
    format!("Write a concise summary of the following passage:\n\n{chunk}")
}

fn merge_prompt(partials: &[String]) -> String {
    format!(
        "Merge the following partial summaries into one complete, coherent summary:\n\n{}",
        partials.join("\n\n")
    )
}

fn joined_len(partials: &[String]) -> usize {
    partials.iter().map(|p| p.chars().count() + 2).sum()
}

/// Split partials into ordered groups that fit `max_chars`, at least two per
/// group (only the last group may hold one).
fn group_partials(partials: Vec<String>, max_chars: usize) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0;

    for partial in partials {
        let len = partial.chars().count() + 2;
        if current.len() >= 2 && current_len + len > max_chars {
            groups.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current_len += len;
        current.push(partial);
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups
}

/// First `max_chars` characters of `text`, with `...` when truncated.
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
