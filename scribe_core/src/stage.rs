//! One external call for one body of text, followed by response filtering.

use std::fmt;

use tracing::debug;

use crate::budget::{Overhead, available_body_tokens, require_positive};
use crate::error::{Error, Result};
use crate::prompt::PromptEnvelope;
use crate::{ChatMessage, CompletionRequest, LLMProvider, Tokenizer, Usage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Sectioning,
    TopicSorting,
    Summarizing,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sectioning => "section",
            Self::TopicSorting => "topic-sort",
            Self::Summarizing => "summary",
        })
    }
}

/// How a raw completion is cleaned up before it is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFilter {
    /// Trim every line and drop the blank ones.
    KeepNonBlankLines,
    /// Drop blank lines at either end, keep everything in between verbatim.
    TrimBlankEdges,
}

impl ResponseFilter {
    #[must_use]
    pub fn apply(self, response: &str) -> String {
        match self {
            Self::KeepNonBlankLines => response
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            Self::TrimBlankEdges => {
                let lines: Vec<&str> = response.split('\n').collect();
                let is_blank = |line: &&str| line.trim().is_empty();
                let Some(first) = lines.iter().position(|l| !is_blank(l)) else {
                    return String::new();
                };
                let last = lines.iter().rposition(|l| !is_blank(l)).unwrap_or(first);
                lines[first..=last].join("\n")
            }
        }
    }
}

/// Filtered output of one call. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub chunk_index: usize,
    pub text: String,
    pub usage: Option<Usage>,
}

/// Model parameters shared by all stages of a run.
#[derive(Debug, Clone)]
pub struct CallSettings<'a> {
    pub model: &'a str,
    pub temperature: f32,
    pub system_role: &'a str,
}

/// A stage's instruction envelope plus its filtering policy.
#[derive(Debug, Clone)]
pub struct TransformStage {
    kind: StageKind,
    envelope: PromptEnvelope,
    filter: ResponseFilter,
}

impl TransformStage {
    #[must_use]
    pub const fn new(kind: StageKind, envelope: PromptEnvelope, filter: ResponseFilter) -> Self {
        Self {
            kind,
            envelope,
            filter,
        }
    }

    #[must_use]
    pub fn section(persona: &str) -> Self {
        Self::new(
            StageKind::Sectioning,
            PromptEnvelope::section(persona),
            ResponseFilter::KeepNonBlankLines,
        )
    }

    #[must_use]
    pub fn topic_sort(persona: &str, topics: &[String]) -> Self {
        Self::new(
            StageKind::TopicSorting,
            PromptEnvelope::topic(persona, topics),
            ResponseFilter::TrimBlankEdges,
        )
    }

    #[must_use]
    pub fn summary(persona: &str) -> Self {
        Self::new(
            StageKind::Summarizing,
            PromptEnvelope::summary(persona),
            ResponseFilter::TrimBlankEdges,
        )
    }

    #[must_use]
    pub const fn kind(&self) -> StageKind {
        self.kind
    }

    #[must_use]
    pub const fn envelope(&self) -> &PromptEnvelope {
        &self.envelope
    }

    pub fn overhead<T: Tokenizer + ?Sized>(&self, tokenizer: &T, system_role: &str) -> Overhead {
        Overhead::measure(tokenizer, &self.envelope, system_role)
    }

    /// Body window for a chunked stage: what is left after reserving
    /// `reserved_output` and this stage's overhead.
    pub fn body_window<T: Tokenizer + ?Sized>(
        &self,
        tokenizer: &T,
        system_role: &str,
        reserved_output: usize,
        total_budget: usize,
    ) -> Result<usize> {
        let overhead = self.overhead(tokenizer, system_role);
        let available = available_body_tokens(total_budget, reserved_output, overhead.total());
        require_positive(self.kind, available, total_budget)
    }

    /// Output allowance for a single-call stage whose body is already fixed.
    ///
    /// The body is treated as part of the overhead and the remainder becomes
    /// the `max_tokens` ceiling. Fails when nothing is left for the response.
    pub fn output_allowance<T: Tokenizer + ?Sized>(
        &self,
        tokenizer: &T,
        body: &str,
        system_role: &str,
        total_budget: usize,
    ) -> Result<usize> {
        let overhead = self.overhead(tokenizer, system_role);
        let body_tokens = tokenizer.length(body);
        let available = available_body_tokens(total_budget, body_tokens, overhead.total());
        require_positive(self.kind, available, total_budget)
    }

    /// Send `body` through the completion service and filter the reply.
    ///
    /// Provider failures are not retried here; they end the run with the
    /// stage and chunk index attached.
    pub async fn run<P: LLMProvider + ?Sized>(
        &self,
        provider: &P,
        settings: &CallSettings<'_>,
        body: &str,
        max_tokens: usize,
        chunk_index: usize,
    ) -> Result<StageResult> {
        let request = CompletionRequest {
            model: settings.model.to_string(),
            temperature: settings.temperature,
            max_tokens,
            messages: vec![
                ChatMessage::system(settings.system_role),
                ChatMessage::user(self.envelope.wrap(body)),
            ],
        };

        debug!(
            "{} stage request: chunk={}, body_len={}, max_tokens={}",
            self.kind,
            chunk_index,
            body.len(),
            max_tokens
        );

        let response =
            provider
                .complete(&request)
                .await
                .map_err(|source| Error::ExternalService {
                    stage: self.kind,
                    chunk: chunk_index,
                    source,
                })?;

        Ok(StageResult {
            chunk_index,
            text: self.filter.apply(&response.content),
            usage: response.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use crate::testing::{CharTokenizer, Reply, ScriptedProvider};

    const SETTINGS: CallSettings<'static> = CallSettings {
        model: "gpt-3.5-turbo",
        temperature: 0.0,
        system_role: "sys",
    };

    #[test]
    fn section_filter_drops_blank_lines_and_trims() {
        let raw = ["- a", "", "  b  ", "- c"].join("\n");
        assert_eq!(ResponseFilter::KeepNonBlankLines.apply(&raw), "- a\nb\n- c");
    }

    #[test]
    fn section_filter_handles_crlf_and_whitespace_lines() {
        let raw = "- one\r\n   \r\n- two\r\n";
        assert_eq!(ResponseFilter::KeepNonBlankLines.apply(raw), "- one\n- two");
    }

    #[test]
    fn edge_filter_keeps_internal_blank_lines() {
        let raw = "\n\n## Budget\n- a\n\n## Hiring\n  - b\n\n";
        assert_eq!(
            ResponseFilter::TrimBlankEdges.apply(raw),
            "## Budget\n- a\n\n## Hiring\n  - b"
        );
    }

    #[test]
    fn edge_filter_on_blank_response_is_empty() {
        assert_eq!(ResponseFilter::TrimBlankEdges.apply("\n \n"), "");
        assert_eq!(ResponseFilter::TrimBlankEdges.apply(""), "");
    }

    #[test]
    fn body_window_subtracts_envelope_system_and_output() {
        let stage = TransformStage::new(
            StageKind::Sectioning,
            PromptEnvelope::delimited("ab"),
            ResponseFilter::KeepNonBlankLines,
        );
        // overhead: "ab######" = 8, "sys" = 3
        assert_eq!(stage.body_window(&CharTokenizer, "sys", 50, 100).unwrap(), 39);
        assert!(matches!(
            stage.body_window(&CharTokenizer, "sys", 89, 100),
            Err(Error::BudgetExceeded { .. })
        ));
    }

    #[test]
    fn output_allowance_fails_when_body_fills_budget() {
        let stage = TransformStage::summary("");
        let overhead = stage.overhead(&CharTokenizer, "sys").total();
        let fits = "x".repeat(10);
        assert_eq!(
            stage
                .output_allowance(&CharTokenizer, &fits, "sys", overhead + 11)
                .unwrap(),
            1
        );
        assert!(matches!(
            stage.output_allowance(&CharTokenizer, &fits, "sys", overhead + 10),
            Err(Error::BudgetExceeded {
                stage: StageKind::Summarizing,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn run_sends_system_and_wrapped_user_message() {
        let provider = ScriptedProvider::texts(&["\n- point one\n\n- point two\n"]);
        let stage = TransformStage::section("");
        let result = stage
            .run(&provider, &SETTINGS, "hello world", 1024, 0)
            .await
            .unwrap();

        assert_eq!(result.text, "- point one\n- point two");
        assert_eq!(result.chunk_index, 0);
        assert!(result.usage.is_some());

        let request = provider.request(0);
        assert_eq!(request.max_tokens, 1024);
        assert_eq!(request.model, "gpt-3.5-turbo");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, "sys");
        assert_eq!(request.messages[1].role, Role::User);
        assert!(request.messages[1].content.ends_with("###hello world###"));
    }

    #[tokio::test]
    async fn run_reports_stage_and_chunk_on_failure() {
        let provider = ScriptedProvider::new(vec![Reply::Fail("401 unauthorized".into())]);
        let stage = TransformStage::topic_sort("", &[]);
        let err = stage
            .run(&provider, &SETTINGS, "notes", 100, 7)
            .await
            .unwrap_err();
        match err {
            Error::ExternalService { stage, chunk, .. } => {
                assert_eq!(stage, StageKind::TopicSorting);
                assert_eq!(chunk, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
