use std::path::PathBuf;

use scribe_config::Config;
use scribe_core::TransformStage;
use scribe_providers::TiktokenTokenizer;
use tracing::info;

/// Strategy for displaying configuration information.
///
/// Prints the effective configuration (file plus environment) with the API
/// key masked, and the section window the token budget leaves per chunk.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = Option<PathBuf>;

    async fn execute(&self, config_path: Self::Input) -> anyhow::Result<()> {
        let config = Config::load(config_path.as_deref())?;

        println!("=== scribe Configuration ===\n");

        println!("OpenAI:");
        println!("  API Key: {}", mask_secret(&config.openai.api_key));
        println!(
            "  Organization: {}",
            config.openai.organization.as_deref().unwrap_or("(not set)")
        );
        println!("  Base URL: {}", config.openai.base_url);
        println!("  Timeout: {}s", config.openai.timeout_secs);
        println!();

        let settings = config.settings();
        println!("Pipeline:");
        println!("  Model: {}", settings.model);
        println!("  Temperature: {}", settings.temperature);
        println!("  Total Budget: {} tokens", settings.total_budget);
        println!("  Section Max Tokens: {}", settings.section_max_tokens);
        println!("  Overlap: {} tokens", settings.overlap);
        println!("  Tokenizer: {}", config.pipeline.encoding);
        println!("  Persona: {}", truncate(&settings.persona, 60));
        println!("  System Role: {}", truncate(&settings.system_role, 60));

        info!("Measuring section overhead");
        match TiktokenTokenizer::new(&config.pipeline.encoding) {
            Ok(tokenizer) => {
                let window = TransformStage::section(&settings.persona).body_window(
                    &tokenizer,
                    &settings.system_role,
                    settings.section_max_tokens,
                    settings.total_budget,
                );
                match window {
                    Ok(window) => println!("  Section Window: {window} tokens"),
                    Err(e) => println!("  Section Window: invalid ({e})"),
                }
            }
            Err(e) => println!("  Section Window: tokenizer unavailable ({e:#})"),
        }
        println!();

        println!("Jargon:");
        let jargon = &config.jargon_path;
        if jargon.is_file() {
            println!("  File: {}", jargon.display());
        } else {
            println!("  File: {} (not found, replacement skipped)", jargon.display());
        }
        println!();

        println!("Retry:");
        if config.retry.delays_secs.is_empty() {
            println!("  Disabled (single attempt)");
        } else {
            let delays: Vec<String> = config
                .retry
                .delays_secs
                .iter()
                .map(|d| format!("{d}s"))
                .collect();
            println!("  Delays: {}", delays.join(", "));
        }

        Ok(())
    }
}

fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        "(not set)".to_string()
    } else if secret.len() > 8 && secret.is_ascii() {
        format!("{}...{}", &secret[..4], &secret[secret.len() - 4..])
    } else {
        "***".to_string()
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}
