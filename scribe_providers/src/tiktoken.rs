use anyhow::{Context, anyhow};
use scribe_core::{Token, TokenSequence, Tokenizer};
use tiktoken_rs::CoreBPE;
use tracing::info;

/// BPE tokenizer backed by tiktoken-rs.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
    encoding: String,
}

impl TiktokenTokenizer {
    /// Load an encoding by name: `r50k_base` (alias `gpt2`), `p50k_base`,
    /// `cl100k_base` or `o200k_base`.
    ///
    /// # Errors
    /// Returns an error if the encoding is unknown or cannot be loaded.
    pub fn new(encoding: &str) -> anyhow::Result<Self> {
        let lower = encoding.to_ascii_lowercase();
        let (canonical, bpe) = match lower.as_str() {
            "gpt2" | "r50k_base" => ("r50k_base", tiktoken_rs::r50k_base()),
            "p50k_base" => ("p50k_base", tiktoken_rs::p50k_base()),
            "cl100k_base" => ("cl100k_base", tiktoken_rs::cl100k_base()),
            "o200k_base" => ("o200k_base", tiktoken_rs::o200k_base()),
            _ => return Err(anyhow!("Unsupported tokenizer encoding: {encoding}")),
        };
        let bpe = bpe.with_context(|| format!("load {canonical}"))?;
        info!("Loaded tokenizer encoding {canonical}");
        Ok(Self {
            bpe,
            encoding: canonical.to_string(),
        })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> TokenSequence {
        self.bpe.encode_ordinary(text)
    }

    fn decode(&self, tokens: &[Token]) -> anyhow::Result<String> {
        self.bpe.decode(tokens.to_vec()).with_context(|| {
            format!(
                "decode a window of {} tokens with {}",
                tokens.len(),
                self.encoding
            )
        })
    }

    /// Tokens must come from [`TiktokenTokenizer::encode`] with the same encoding.
    #[expect(
        clippy::used_underscore_items,
        reason = "only raw byte decoding entry point tiktoken-rs exports"
    )]
    fn decode_bytes(&self, tokens: &[Token]) -> anyhow::Result<Vec<u8>> {
        Ok(self
            .bpe
            ._decode_native_and_split(tokens.to_vec())
            .flatten()
            .collect())
    }

    fn name(&self) -> &str {
        &self.encoding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scribe_core::prompt::{DEFAULT_PERSONA, DEFAULT_SYSTEM_ROLE};
    use scribe_core::{
        CompletionRequest, LLMProvider, LLMResponse, Pipeline, PipelineSettings, RunOptions,
        TransformStage,
    };
    use std::sync::{Arc, Mutex};

    /// Keeps the transcript body of every section request.
    #[derive(Default)]
    struct RecordingProvider {
        bodies: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LLMProvider for RecordingProvider {
        async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<LLMResponse> {
            let content = &request.messages[1].content;
            let start = content.find("###").unwrap() + 3;
            let body = content[start..content.len() - 3].to_string();
            self.bodies.lock().unwrap().push(body);
            Ok(LLMResponse {
                content: "- ok".to_string(),
                usage: None,
            })
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    #[test]
    fn gpt2_alias_loads_r50k() {
        let tokenizer = TiktokenTokenizer::new("gpt2").unwrap();
        assert_eq!(tokenizer.name(), "r50k_base");
    }

    #[test]
    fn unknown_encoding_is_an_initialization_error() {
        assert!(TiktokenTokenizer::new("not-an-encoding").is_err());
    }

    #[test]
    fn round_trips_ascii() {
        let tokenizer = TiktokenTokenizer::new("r50k_base").unwrap();
        let text = "Let's review the Q3 roadmap and hiring plan.";
        let tokens = tokenizer.encode(text);
        assert!(!tokens.is_empty());
        assert_eq!(tokenizer.length(text), tokens.len());
        assert_eq!(tokenizer.decode(&tokens).unwrap(), text);
    }

    #[test]
    fn window_cutting_into_an_emoji_is_not_text_but_has_bytes() {
        let tokenizer = TiktokenTokenizer::new("r50k_base").unwrap();
        let text = "🚀 launch day 🚀";
        let tokens = tokenizer.encode(text);
        let inner = &tokens[1..tokens.len() - 1];
        assert!(tokenizer.decode(inner).is_err());

        let mut bytes = tokenizer.decode_bytes(&tokens[..1]).unwrap();
        bytes.extend(tokenizer.decode_bytes(&tokens[1..]).unwrap());
        assert_eq!(bytes, text.as_bytes());
    }

    #[tokio::test]
    async fn zero_overlap_sections_keep_every_character() {
        let tokenizer = Arc::new(TiktokenTokenizer::new("r50k_base").unwrap());
        let input = "会议 讨论 预算 招聘 路线图 🚀 发布 日期 确定 负责人 跟进";
        let overhead = TransformStage::section(DEFAULT_PERSONA)
            .overhead(tokenizer.as_ref(), DEFAULT_SYSTEM_ROLE)
            .total();

        for window in 2..12 {
            let provider = Arc::new(RecordingProvider::default());
            let settings = PipelineSettings {
                total_budget: window + 1024 + overhead,
                section_max_tokens: 1024,
                overlap: 0,
                ..PipelineSettings::default()
            };
            let pipeline = Pipeline::new(Arc::clone(&provider), Arc::clone(&tokenizer), settings);
            pipeline.run(input, &RunOptions::default()).await.unwrap();

            let joined: String = provider.bodies.lock().unwrap().concat();
            assert_eq!(joined, pipeline.prepare(input), "window {window}");
        }
    }

    #[test]
    fn empty_input_encodes_to_nothing() {
        let tokenizer = TiktokenTokenizer::new("cl100k_base").unwrap();
        assert!(tokenizer.encode("").is_empty());
        assert_eq!(tokenizer.decode(&[]).unwrap(), "");
    }
}
