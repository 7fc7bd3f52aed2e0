//! Text summarization: chunking plus LLM map-reduce.

pub mod chunker;
pub mod summarizer;

pub use chunker::{SummaryChunk, TextChunker, chunk_text};
pub use summarizer::{SummaryMethod, SummaryOutcome, Summarizer, preview};
