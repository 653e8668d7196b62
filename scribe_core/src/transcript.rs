//! Transcript cleanup and jargon substitution, applied before sectioning.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::info;

use crate::error::{Error, Result};

static TIMESTAMP_LINE: OnceLock<Regex> = OnceLock::new();
static VOICE_OPEN: OnceLock<Regex> = OnceLock::new();
static WHITESPACE: OnceLock<Regex> = OnceLock::new();

#[expect(
    clippy::expect_used,
    reason = "Static regex patterns validated at compile time"
)]
fn compile(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("Static regex pattern is guaranteed to be valid"))
}

fn timestamp_line() -> &'static Regex {
    compile(
        &TIMESTAMP_LINE,
        r"(?m)^\d{2}:\d{2}:\d{2}[.,]\d{3} --> \d{2}:\d{2}:\d{2}[.,]\d{3}[^\n]*(\n|$)",
    )
}

fn voice_open() -> &'static Regex {
    compile(&VOICE_OPEN, r"<v [^>]+>")
}

fn whitespace() -> &'static Regex {
    compile(&WHITESPACE, r"\s+")
}

/// Strip cue timestamps, blank lines and `<v NAME>` speaker tags, then
/// collapse all whitespace to single spaces.
#[must_use]
pub fn clean_transcript(text: &str) -> String {
    let text = timestamp_line().replace_all(text, "");
    let text = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let text = voice_open().replace_all(&text, "");
    let text = text.replace("</v>", "");
    whitespace().replace_all(&text, " ").trim().to_string()
}

/// Ordered `term -> replacement` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JargonMap {
    pairs: Vec<(String, String)>,
}

impl JargonMap {
    /// Parse one `term,replacement` pair per line.
    ///
    /// A line with anything other than exactly two comma-separated fields is
    /// rejected. Whitespace-only lines are skipped. `path` is only used in
    /// error messages.
    pub fn parse(content: &str, path: impl AsRef<Path>) -> Result<Self> {
        let mut pairs = Vec::new();
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            let [term, replacement] = fields.as_slice() else {
                return Err(Error::JargonFormat {
                    path: path.as_ref().to_path_buf(),
                    line: i + 1,
                    content: line.to_string(),
                });
            };
            pairs.push(((*term).to_string(), (*replacement).to_string()));
        }
        Ok(Self { pairs })
    }

    /// Load from `path`. A missing file yields an empty map; a malformed one
    /// is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            info!(
                "{} file not found. Skipping jargon replacement...",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let map = Self::parse(&content, path)?;
        info!("Loaded {} jargon replacement(s) from {}", map.len(), path.display());
        Ok(map)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Replace every occurrence of each term, in file order.
    #[must_use]
    pub fn apply(&self, text: &str) -> String {
        self.pairs
            .iter()
            .filter(|(term, _)| !term.is_empty())
            .fold(text.to_string(), |acc, (term, replacement)| {
                acc.replace(term.as_str(), replacement)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VTT: &str = "WEBVTT\n\n00:00:01.000 --> 00:00:04.500\n<v Dana Lee>Let's start with the budget.</v>\n\n00:00:04.500 --> 00:00:09.000\n<v Sam>   We are over   by ten percent.</v>\n";

    #[test]
    fn cleans_vtt_cues_and_speaker_tags() {
        assert_eq!(
            clean_transcript(VTT),
            "WEBVTT Let's start with the budget. We are over by ten percent."
        );
    }

    #[test]
    fn accepts_srt_style_timestamps() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\nHello there\n";
        assert_eq!(clean_transcript(srt), "1 Hello there");
    }

    #[test]
    fn plain_text_only_collapses_whitespace() {
        assert_eq!(clean_transcript("  a\tb\n\n c  "), "a b c");
        assert_eq!(clean_transcript(""), "");
    }

    #[test]
    fn jargon_replaces_all_occurrences() {
        let map = JargonMap::parse("ACME,Atlas Corp\n", "jargon.txt").unwrap();
        let out = map.apply("ACME met ACME's partners");
        assert_eq!(out, "Atlas Corp met Atlas Corp's partners");
        assert!(!out.contains("ACME"));
    }

    #[test]
    fn jargon_pairs_apply_in_file_order() {
        let map = JargonMap::parse("k8s,kube\nkube,Kubernetes\n", "jargon.txt").unwrap();
        assert_eq!(map.apply("k8s"), "Kubernetes");
    }

    #[test]
    fn jargon_line_with_wrong_field_count_is_rejected() {
        for bad in ["ACME", "a,b,c"] {
            let err = JargonMap::parse(&format!("X,Y\n{bad}\n"), "jargon.txt").unwrap_err();
            match err {
                Error::JargonFormat { line, content, .. } => {
                    assert_eq!(line, 2);
                    assert_eq!(content, bad);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn blank_jargon_lines_are_skipped() {
        let map = JargonMap::parse("\nA,B\n   \n", "jargon.txt").unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn missing_jargon_file_is_empty_map() {
        let map = JargonMap::load("/nonexistent/scribe/jargon.txt").unwrap();
        assert!(map.is_empty());
        assert_eq!(map.apply("ACME"), "ACME");
    }

    #[test]
    fn jargon_file_is_loaded_from_disk() {
        let path = std::env::temp_dir().join(format!("scribe-jargon-{}.txt", uuid::Uuid::now_v7()));
        std::fs::write(&path, "ACME,Atlas Corp\n").unwrap();
        let map = JargonMap::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(map.apply("ACME"), "Atlas Corp");
    }
}
