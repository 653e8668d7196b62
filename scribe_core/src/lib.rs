#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Meeting-transcript to notes pipeline.
//!
//! The crate owns the chunking-and-reassembly logic: token budget arithmetic,
//! overlapping windows, the per-stage transform, and the orchestrator that
//! chains section extraction, topic sorting and summarization. The completion
//! service and the tokenizer are injected through the [`LLMProvider`] and
//! [`Tokenizer`] traits.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod budget;
pub mod chunker;
pub mod error;
pub mod pipeline;
pub mod prompt;
pub mod stage;
pub mod transcript;

#[cfg(test)]
pub(crate) mod testing;

pub use chunker::{Chunk, ChunkParams, Chunks, TokenText};
pub use error::{Error, Result};
pub use pipeline::{
    Phase, Pipeline, PipelineOutput, PipelineSettings, PipelineState, RunOptions, TopicDirective,
};
pub use prompt::PromptEnvelope;
pub use stage::{ResponseFilter, StageKind, StageResult, TransformStage};
pub use transcript::{JargonMap, clean_transcript};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Everything a single completion call needs.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub const fn accumulate(&mut self, other: &Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<LLMResponse>;
    fn name(&self) -> &str;
}

#[async_trait]
impl<P: LLMProvider + ?Sized> LLMProvider for Arc<P> {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<LLMResponse> {
        (**self).complete(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Opaque token unit produced by a [`Tokenizer`].
pub type Token = u32;

/// Ordered token units for one string.
pub type TokenSequence = Vec<Token>;

/// Converts text to token units and back.
///
/// Implementations must be deterministic for a fixed encoding. Failing to load
/// the underlying vocabulary is a construction error, not a per-call one.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> TokenSequence;

    /// Decode a token window back to text.
    ///
    /// `decode(encode(s))` must be semantically stable, but need not be
    /// byte-identical to `s`.
    fn decode(&self, tokens: &[Token]) -> anyhow::Result<String>;

    /// Raw bytes of a token window. Unlike [`Tokenizer::decode`], a window
    /// that starts or ends inside a multi-byte character is not an error.
    fn decode_bytes(&self, tokens: &[Token]) -> anyhow::Result<Vec<u8>> {
        self.decode(tokens).map(String::into_bytes)
    }

    fn length(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    fn name(&self) -> &str;
}

impl<T: Tokenizer + ?Sized> Tokenizer for Arc<T> {
    fn encode(&self, text: &str) -> TokenSequence {
        (**self).encode(text)
    }

    fn decode(&self, tokens: &[Token]) -> anyhow::Result<String> {
        (**self).decode(tokens)
    }

    fn decode_bytes(&self, tokens: &[Token]) -> anyhow::Result<Vec<u8>> {
        (**self).decode_bytes(tokens)
    }

    fn length(&self, text: &str) -> usize {
        (**self).length(text)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
