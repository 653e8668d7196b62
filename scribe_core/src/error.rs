use std::path::PathBuf;

use thiserror::Error;

use crate::stage::StageKind;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way a run can end early. All variants are fatal to the run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(
        "Incorrect format in {path} line {line}: expected two strings separated by a comma, got {content:?}"
    )]
    JargonFormat {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "{stage} stage does not fit the token budget: needs {required} tokens, budget is {budget}"
    )]
    BudgetExceeded {
        stage: StageKind,
        required: i64,
        budget: usize,
    },

    #[error("Completion service failed during {stage} stage (chunk {chunk}): {source:#}")]
    ExternalService {
        stage: StageKind,
        chunk: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Tokenizer error: {0:#}")]
    Tokenizer(anyhow::Error),

    #[error("Could not write output to file {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Process exit code for this failure class.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) | Self::JargonFormat { .. } => 2,
            Self::InputNotFound(_) => 3,
            Self::BudgetExceeded { .. } => 4,
            Self::ExternalService { .. } => 5,
            Self::OutputWrite { .. } => 6,
            Self::Io { .. } | Self::Tokenizer(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_service_message_names_stage_and_chunk() {
        let err = Error::ExternalService {
            stage: StageKind::Sectioning,
            chunk: 3,
            source: anyhow::anyhow!("status 429: rate limited"),
        };
        let msg = err.to_string();
        assert!(msg.contains("section"));
        assert!(msg.contains("chunk 3"));
        assert!(msg.contains("429"));
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn exit_codes_are_distinct_per_class() {
        let codes = [
            Error::Configuration("x".into()).exit_code(),
            Error::InputNotFound(PathBuf::from("a.vtt")).exit_code(),
            Error::BudgetExceeded {
                stage: StageKind::Summarizing,
                required: 5000,
                budget: 4000,
            }
            .exit_code(),
            Error::OutputWrite {
                path: PathBuf::from("out.txt"),
                source: std::io::Error::other("denied"),
            }
            .exit_code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
