//! Test doubles: a one-token-per-char tokenizer and a scripted provider.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{CompletionRequest, LLMProvider, LLMResponse, Token, TokenSequence, Tokenizer, Usage};

pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> TokenSequence {
        text.chars().map(u32::from).collect()
    }

    fn decode(&self, tokens: &[Token]) -> anyhow::Result<String> {
        tokens
            .iter()
            .map(|&t| char::from_u32(t).ok_or_else(|| anyhow::anyhow!("invalid token {t}")))
            .collect()
    }

    fn name(&self) -> &'static str {
        "chars"
    }
}

/// One token per UTF-8 byte, so windows routinely split characters.
pub struct ByteTokenizer;

impl Tokenizer for ByteTokenizer {
    fn encode(&self, text: &str) -> TokenSequence {
        text.bytes().map(u32::from).collect()
    }

    fn decode(&self, tokens: &[Token]) -> anyhow::Result<String> {
        Ok(String::from_utf8(self.decode_bytes(tokens)?)?)
    }

    fn decode_bytes(&self, tokens: &[Token]) -> anyhow::Result<Vec<u8>> {
        tokens
            .iter()
            .map(|&t| u8::try_from(t).map_err(|_| anyhow::anyhow!("invalid token {t}")))
            .collect()
    }

    fn name(&self) -> &'static str {
        "bytes"
    }
}

pub enum Reply {
    Text(String),
    Fail(String),
}

/// Replays scripted replies in order and records every request.
/// Once the script runs out it echoes a fixed reply.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Reply::Text((*t).to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn request(&self, index: usize) -> CompletionRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<LLMResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(content)) => Ok(LLMResponse {
                content,
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
            }),
            Some(Reply::Fail(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(LLMResponse {
                content: "- ok".to_string(),
                usage: None,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
