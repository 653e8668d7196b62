//! Stage instructions and the envelope that wraps a body into one request.

/// Default persona prefixed to every stage instruction.
pub const DEFAULT_PERSONA: &str = "You are to act as an expert project manager.";

/// Default system role text sent with every request.
pub const DEFAULT_SYSTEM_ROLE: &str = "You are a helpful assistant.";

/// Separates instruction from body, and closes the body.
pub const DELIMITER: &str = "###";

const SECTION_INSTRUCTION: &str =
    "Paraphrase each thought into bullet point statements. Do not include an intro or conclusion.";

const TOPIC_INSTRUCTION: &str = "Separate the following notes into sections by topic. Do not change the wording or order of notes.";

const SUMMARY_INSTRUCTION: &str = "Summarize the following meeting notes in Key Takeaways and Action Items. Key Takeaways and Action Items should not repeat each other.";

/// Preamble and postamble around a chunk-derived body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptEnvelope {
    pub preamble: String,
    pub postamble: String,
}

impl PromptEnvelope {
    /// Envelope for `instruction`, delimited by [`DELIMITER`] on both sides of the body.
    #[must_use]
    pub fn delimited(instruction: &str) -> Self {
        Self {
            preamble: format!("{instruction}{DELIMITER}"),
            postamble: DELIMITER.to_string(),
        }
    }

    #[must_use]
    pub fn section(persona: &str) -> Self {
        Self::delimited(&section_instruction(persona))
    }

    /// Topic-sort envelope. An empty `topics` slice lets the model pick groupings.
    #[must_use]
    pub fn topic(persona: &str, topics: &[String]) -> Self {
        Self::delimited(&topic_instruction(persona, topics))
    }

    #[must_use]
    pub fn summary(persona: &str) -> Self {
        Self::delimited(&summary_instruction(persona))
    }

    /// The fixed-length text whose token count is charged against the budget.
    #[must_use]
    pub fn overhead_text(&self) -> String {
        format!("{}{}", self.preamble, self.postamble)
    }

    #[must_use]
    pub fn wrap(&self, body: &str) -> String {
        let mut payload =
            String::with_capacity(self.preamble.len() + body.len() + self.postamble.len());
        payload.push_str(&self.preamble);
        payload.push_str(body);
        payload.push_str(&self.postamble);
        payload
    }

    /// The instruction without its trailing delimiter, for progress logs.
    #[must_use]
    pub fn instruction(&self) -> &str {
        self.preamble
            .strip_suffix(DELIMITER)
            .unwrap_or(&self.preamble)
    }
}

fn with_persona(persona: &str, instruction: &str) -> String {
    if persona.is_empty() {
        instruction.to_string()
    } else {
        format!("{persona} {instruction}")
    }
}

#[must_use]
pub fn section_instruction(persona: &str) -> String {
    with_persona(persona, SECTION_INSTRUCTION)
}

#[must_use]
pub fn topic_instruction(persona: &str, topics: &[String]) -> String {
    let base = with_persona(persona, TOPIC_INSTRUCTION);
    if topics.is_empty() {
        base
    } else {
        format!("{base} Topics: {}", topics.join(", "))
    }
}

#[must_use]
pub fn summary_instruction(persona: &str) -> String {
    with_persona(persona, SUMMARY_INSTRUCTION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_places_body_between_delimiters() {
        let env = PromptEnvelope::delimited("Do it.");
        assert_eq!(env.wrap("body"), "Do it.###body###");
        assert_eq!(env.overhead_text(), "Do it.######");
        assert_eq!(env.instruction(), "Do it.");
    }

    #[test]
    fn section_prompt_carries_persona() {
        let env = PromptEnvelope::section(DEFAULT_PERSONA);
        assert!(env.preamble.starts_with(
            "You are to act as an expert project manager. Paraphrase each thought"
        ));
        assert!(env.preamble.ends_with("###"));
    }

    #[test]
    fn topic_prompt_lists_explicit_topics() {
        let topics = vec!["Budget".to_string(), "Hiring".to_string()];
        let instruction = topic_instruction(DEFAULT_PERSONA, &topics);
        assert!(instruction.ends_with("Topics: Budget, Hiring"));
    }

    #[test]
    fn auto_topic_prompt_has_no_topic_list() {
        let instruction = topic_instruction(DEFAULT_PERSONA, &[]);
        assert!(!instruction.contains("Topics:"));
        assert!(instruction.ends_with("Do not change the wording or order of notes."));
    }

    #[test]
    fn empty_persona_is_omitted() {
        assert_eq!(
            summary_instruction(""),
            "Summarize the following meeting notes in Key Takeaways and Action Items. Key Takeaways and Action Items should not repeat each other."
        );
    }
}
