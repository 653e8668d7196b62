//! Token budget arithmetic shared by every stage.
//!
//! A request may occupy at most `total_budget` tokens: instruction envelope,
//! system role text, body, and the reserved model output. The body gets
//! whatever is left.

use crate::error::{Error, Result};
use crate::prompt::PromptEnvelope;
use crate::stage::StageKind;
use crate::Tokenizer;

/// Tokens left for variable content once output and overhead are reserved.
///
/// Signed on purpose: an over-committed budget comes back negative instead of
/// wrapping, so the caller can reject it.
#[must_use]
pub fn available_body_tokens(total_budget: usize, reserved_output: usize, overhead: usize) -> i64 {
    to_i64(total_budget)
        .saturating_sub(to_i64(reserved_output))
        .saturating_sub(to_i64(overhead))
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Fixed per-request token cost of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overhead {
    pub envelope_tokens: usize,
    pub system_role_tokens: usize,
}

impl Overhead {
    /// Measure the envelope and system role text with `tokenizer`.
    ///
    /// Recomputed on every stage invocation since each stage has its own envelope.
    pub fn measure<T: Tokenizer + ?Sized>(
        tokenizer: &T,
        envelope: &PromptEnvelope,
        system_role: &str,
    ) -> Self {
        Self {
            envelope_tokens: tokenizer.length(&envelope.overhead_text()),
            system_role_tokens: tokenizer.length(system_role),
        }
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.envelope_tokens.saturating_add(self.system_role_tokens)
    }
}

/// Turn a computed allowance into a usable size, or fail the stage.
///
/// On failure the error reports the smallest budget that would have left
/// room for a single body token.
pub fn require_positive(stage: StageKind, available: i64, budget: usize) -> Result<usize> {
    if available <= 0 {
        return Err(Error::BudgetExceeded {
            stage,
            required: to_i64(budget).saturating_sub(available).saturating_add(1),
            budget,
        });
    }
    usize::try_from(available).map_err(|_| Error::BudgetExceeded {
        stage,
        required: available,
        budget,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CharTokenizer;

    #[test]
    fn subtracts_output_and_overhead() {
        assert_eq!(available_body_tokens(4000, 1024, 76), 2900);
    }

    #[test]
    fn monotonically_decreasing_in_reserved_output_and_overhead() {
        let mut prev = i64::MAX;
        for reserved in (0..5000).step_by(250) {
            let v = available_body_tokens(4000, reserved, 100);
            assert!(v < prev);
            prev = v;
        }
        let mut prev = i64::MAX;
        for overhead in (0..5000).step_by(250) {
            let v = available_body_tokens(4000, 1024, overhead);
            assert!(v < prev);
            prev = v;
        }
    }

    #[test]
    fn overflowing_inputs_go_negative_and_are_rejected() {
        let available = available_body_tokens(4000, 3000, 1500);
        assert_eq!(available, -500);
        let err = require_positive(StageKind::Sectioning, available, 4000).unwrap_err();
        assert!(matches!(
            err,
            Error::BudgetExceeded {
                stage: StageKind::Sectioning,
                required: 4501,
                budget: 4000
            }
        ));
    }

    #[test]
    fn zero_is_rejected() {
        assert!(require_positive(StageKind::TopicSorting, 0, 10).is_err());
        assert_eq!(require_positive(StageKind::TopicSorting, 1, 10).unwrap(), 1);
    }

    #[test]
    fn huge_values_do_not_wrap() {
        let v = available_body_tokens(10, usize::MAX, usize::MAX);
        assert!(v < 0);
    }

    #[test]
    fn overhead_counts_envelope_and_system_role() {
        let envelope = PromptEnvelope::delimited("abc");
        let overhead = Overhead::measure(&CharTokenizer, &envelope, "role");
        // "abc###" + "###"
        assert_eq!(overhead.envelope_tokens, 9);
        assert_eq!(overhead.system_role_tokens, 4);
        assert_eq!(overhead.total(), 13);
    }
}
