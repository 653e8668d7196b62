//! Section extraction, optional topic sorting and optional summarization,
//! chained so that each stage's output is the next stage's body.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::chunker::{ChunkParams, TokenText, chunk};
use crate::error::{Error, Result};
use crate::prompt::{DEFAULT_PERSONA, DEFAULT_SYSTEM_ROLE};
use crate::stage::{CallSettings, StageResult, TransformStage};
use crate::transcript::{JargonMap, clean_transcript};
use crate::{LLMProvider, Tokenizer, Usage};

/// Separator between the summary and the notes in the rendered output.
pub const NOTES_HEADER: &str = "\n\nNotes:\n";

/// Model and budget parameters for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "PipelineSettings::default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    /// Ceiling on instruction + body + output tokens for any single request.
    #[serde(default = "PipelineSettings::default_total_budget")]
    pub total_budget: usize,
    /// Output tokens reserved for each section-extraction call.
    #[serde(default = "PipelineSettings::default_section_max_tokens")]
    pub section_max_tokens: usize,
    /// Tokens repeated at the start of the next chunk.
    #[serde(default = "PipelineSettings::default_overlap")]
    pub overlap: usize,
    #[serde(default = "PipelineSettings::default_persona")]
    pub persona: String,
    #[serde(default = "PipelineSettings::default_system_role")]
    pub system_role: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            temperature: 0.0,
            total_budget: Self::default_total_budget(),
            section_max_tokens: Self::default_section_max_tokens(),
            overlap: Self::default_overlap(),
            persona: Self::default_persona(),
            system_role: Self::default_system_role(),
        }
    }
}

impl PipelineSettings {
    fn default_model() -> String {
        "gpt-3.5-turbo".to_string()
    }

    const fn default_total_budget() -> usize {
        4000
    }

    const fn default_section_max_tokens() -> usize {
        1024
    }

    const fn default_overlap() -> usize {
        50
    }

    fn default_persona() -> String {
        DEFAULT_PERSONA.to_string()
    }

    fn default_system_role() -> String {
        DEFAULT_SYSTEM_ROLE.to_string()
    }
}

/// Whether and how to regroup the notes by topic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TopicDirective {
    #[default]
    None,
    /// Let the model infer the groupings.
    Auto,
    Topics(Vec<String>),
}

impl TopicDirective {
    /// `"none"` or blank → [`TopicDirective::None`], `"auto"` → [`TopicDirective::Auto`],
    /// anything else is a comma-separated topic list.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Self::None;
        }
        if trimmed.eq_ignore_ascii_case("auto") {
            return Self::Auto;
        }
        let topics: Vec<String> = trimmed
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if topics.is_empty() {
            Self::None
        } else {
            Self::Topics(topics)
        }
    }
}

impl fmt::Display for TopicDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Auto => f.write_str("auto"),
            Self::Topics(topics) => f.write_str(&topics.join(", ")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub topics: TopicDirective,
    pub summarize: bool,
}

/// Orchestrator phases. Only ever move forward; a stage that is skipped is
/// never entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Cleaning,
    Sectioning,
    TopicSorting,
    Summarizing,
    Done,
}

/// Per-run accumulator, dropped when the run ends.
#[derive(Debug)]
pub struct PipelineState {
    pub run_id: Uuid,
    phase: Phase,
    results: Vec<StageResult>,
    usage: Usage,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::now_v7(),
            phase: Phase::Cleaning,
            results: Vec::new(),
            usage: Usage::default(),
        }
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn results(&self) -> &[StageResult] {
        &self.results
    }

    #[must_use]
    pub const fn usage(&self) -> Usage {
        self.usage
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(next > self.phase, "phase {next:?} after {:?}", self.phase);
        info!(run_id = %self.run_id, "Phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    fn count_usage(&mut self, result: &StageResult) {
        if let Some(usage) = &result.usage {
            self.usage.accumulate(usage);
        }
    }

    fn record(&mut self, result: StageResult) {
        self.count_usage(&result);
        self.results.push(result);
    }

    /// Section results in chunk order, newline-joined.
    fn joined_results(&self) -> String {
        self.results
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Final product of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub notes: String,
    pub summary: Option<String>,
    pub usage: Usage,
    pub chunks: usize,
}

impl PipelineOutput {
    /// Summary, notes header, then notes; or just the notes.
    #[must_use]
    pub fn render(&self) -> String {
        match &self.summary {
            Some(summary) => format!("{summary}{NOTES_HEADER}{}", self.notes),
            None => self.notes.clone(),
        }
    }
}

pub struct Pipeline<P, T>
where
    P: LLMProvider,
    T: Tokenizer,
{
    provider: P,
    tokenizer: T,
    settings: PipelineSettings,
    jargon: JargonMap,
}

impl<P, T> Pipeline<P, T>
where
    P: LLMProvider,
    T: Tokenizer,
{
    pub fn new(provider: P, tokenizer: T, settings: PipelineSettings) -> Self {
        Self {
            provider,
            tokenizer,
            settings,
            jargon: JargonMap::default(),
        }
    }

    /// Substitutions applied to the cleaned transcript before sectioning.
    #[must_use]
    pub fn with_jargon(mut self, jargon: JargonMap) -> Self {
        self.jargon = jargon;
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    fn call_settings(&self) -> CallSettings<'_> {
        CallSettings {
            model: &self.settings.model,
            temperature: self.settings.temperature,
            system_role: &self.settings.system_role,
        }
    }

    /// Run every phase over a raw transcript.
    pub async fn run(&self, raw: &str, options: &RunOptions) -> Result<PipelineOutput> {
        let mut state = PipelineState::new();
        info!(
            run_id = %state.run_id,
            "Starting run: provider={}, tokenizer={}, model={}, topics={}, summary={}",
            self.provider.name(),
            self.tokenizer.name(),
            self.settings.model,
            options.topics,
            options.summarize
        );

        let text = self.prepare(raw);

        state.advance(Phase::Sectioning);
        let full_notes = self.process_sections(&text, &mut state).await?;
        let chunks = state.results().len();

        let notes = self
            .sort_by_topic(full_notes, &options.topics, &mut state)
            .await?;

        let summary = if options.summarize {
            self.summarize(&notes, &mut state).await?
        } else {
            info!("Summary not requested, skipping");
            None
        };

        state.advance(Phase::Done);
        let usage = state.usage();
        info!(
            run_id = %state.run_id,
            "Run complete: chunks={}, prompt_tokens={}, completion_tokens={}, total_tokens={}",
            chunks,
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens
        );

        Ok(PipelineOutput {
            notes,
            summary,
            usage,
            chunks,
        })
    }

    /// Clean transcript markup and apply jargon substitutions.
    #[must_use]
    pub fn prepare(&self, raw: &str) -> String {
        let cleaned = clean_transcript(raw);
        self.jargon.apply(&cleaned)
    }

    /// Chunk `text` to fit the section budget and extract notes from each chunk
    /// in order. Empty input produces empty notes without any call.
    pub async fn process_sections(&self, text: &str, state: &mut PipelineState) -> Result<String> {
        let stage = TransformStage::section(&self.settings.persona);
        let tokens = self.tokenizer.encode(text);
        if tokens.is_empty() {
            info!("Input is empty, no sections to process");
            return Ok(String::new());
        }

        let window = stage.body_window(
            &self.tokenizer,
            &self.settings.system_role,
            self.settings.section_max_tokens,
            self.settings.total_budget,
        )?;
        let params = ChunkParams::new(window, self.settings.overlap)?;
        let decoded = TokenText::decode(&self.tokenizer, &tokens).map_err(Error::Tokenizer)?;
        let chunks = chunk(tokens.len(), params);
        let total = chunks.len();

        info!(
            "Processing input text by section using the following prompt: \"{}\"",
            stage.envelope().instruction()
        );
        info!(
            "Input is {} tokens, window {} tokens, overlap {} tokens, {} chunk(s)",
            tokens.len(),
            params.window(),
            params.overlap(),
            total
        );

        let call = self.call_settings();
        for chunk in chunks {
            let body = decoded.body(&chunk);
            if body.is_empty() {
                debug!("Chunk {} lies inside one character, carried by the next chunk", chunk.index);
                continue;
            }
            let result = stage
                .run(
                    &self.provider,
                    &call,
                    body,
                    self.settings.section_max_tokens,
                    chunk.index,
                )
                .await?;
            info!("Section {}/{} processed:\n{}", chunk.index + 1, total, result.text);
            state.record(result);
        }

        Ok(state.joined_results())
    }

    /// Regroup `full_notes` by topic with a single call. `None` returns the
    /// notes untouched. Notes too large for one request are an error, never
    /// truncated.
    pub async fn sort_by_topic(
        &self,
        full_notes: String,
        directive: &TopicDirective,
        state: &mut PipelineState,
    ) -> Result<String> {
        let topics: &[String] = match directive {
            TopicDirective::None => {
                info!("Topic sorting not requested, skipping");
                return Ok(full_notes);
            }
            TopicDirective::Auto => &[],
            TopicDirective::Topics(topics) => topics,
        };
        if full_notes.trim().is_empty() {
            info!("No notes to sort by topic");
            return Ok(full_notes);
        }

        state.advance(Phase::TopicSorting);
        let stage = TransformStage::topic_sort(&self.settings.persona, topics);
        info!(
            "Sorting text by topic using the following prompt: \"{}\"",
            stage.envelope().instruction()
        );
        let result = self.single_call(&stage, &full_notes).await?;
        state.count_usage(&result);
        info!("Notes sorted by topic:\n{}", result.text);
        Ok(result.text)
    }

    /// Key Takeaways / Action Items summary of `notes`, one call.
    /// Returns `None` when there is nothing to summarize.
    pub async fn summarize(
        &self,
        notes: &str,
        state: &mut PipelineState,
    ) -> Result<Option<String>> {
        if notes.trim().is_empty() {
            info!("No notes to summarize");
            return Ok(None);
        }

        state.advance(Phase::Summarizing);
        let stage = TransformStage::summary(&self.settings.persona);
        info!(
            "Summarizing text using the following prompt: \"{}\"",
            stage.envelope().instruction()
        );
        let result = self.single_call(&stage, notes).await?;
        state.count_usage(&result);
        info!("Summary:\n{}", result.text);
        Ok(Some(result.text))
    }

    async fn single_call(&self, stage: &TransformStage, body: &str) -> Result<StageResult> {
        let max_tokens = stage.output_allowance(
            &self.tokenizer,
            body,
            &self.settings.system_role,
            self.settings.total_budget,
        )?;
        stage
            .run(&self.provider, &self.call_settings(), body, max_tokens, 0)
            .await
    }
}
