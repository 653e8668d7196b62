use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use scribe_core::{Error, PipelineSettings, Result};

/// Value written by `scribe init`; rejected by [`Config::validate`].
pub const API_KEY_PLACEHOLDER: &str = "your-openai-api-key-here";

const API_KEY_ENV: &str = "OPENAI_API_KEY";
const ORG_ID_ENV: &str = "OPENAI_ORG_ID";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default = "Config::default_jargon_path")]
    pub jargon_path: PathBuf,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default = "OpenAiConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "OpenAiConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            organization: None,
            base_url: Self::default_base_url(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl OpenAiConfig {
    fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }

    const fn default_timeout_secs() -> u64 {
        120
    }
}

/// Model and budget settings plus the tokenizer encoding that measures them.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineConfig {
    #[serde(flatten)]
    pub settings: PipelineSettings,
    #[serde(default = "PipelineConfig::default_encoding")]
    pub encoding: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            settings: PipelineSettings::default(),
            encoding: Self::default_encoding(),
        }
    }
}

impl PipelineConfig {
    fn default_encoding() -> String {
        "r50k_base".to_string()
    }
}

/// Backoff toward the completion service. Empty means no retries.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RetryConfig {
    #[serde(default)]
    pub delays_secs: Vec<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai: OpenAiConfig::default(),
            pipeline: PipelineConfig::default(),
            jargon_path: Self::default_jargon_path(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    fn default_jargon_path() -> PathBuf {
        PathBuf::from("jargon.txt")
    }

    pub fn config_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| Error::Configuration("Cannot find home directory".to_string()))?
            .join("scribe"))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load from `path` (or `~/scribe/config.json`), then apply environment
    /// overrides. A missing file means defaults plus environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(|source| Error::Io {
                path: config_path.clone(),
                source,
            })?;
            let config = Self::from_json(&content).map_err(|e| {
                Error::Configuration(format!("{}: {e}", config_path.display()))
            })?;
            info!("Loaded config from {}", config_path.display());
            config
        } else if path.is_some() {
            return Err(Error::Configuration(format!(
                "Config file not found at: {}",
                config_path.display()
            )));
        } else {
            info!(
                "No config file at {}, using defaults and environment",
                config_path.display()
            );
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_json(content: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Override credentials from `lookup` (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.is_empty()) {
            self.openai.api_key = key;
        }
        if let Some(org) = lookup(ORG_ID_ENV).filter(|v| !v.is_empty()) {
            self.openai.organization = Some(org);
        }
    }

    /// Reject configurations that cannot make a single request.
    pub fn validate(&self) -> Result<()> {
        let key = self.openai.api_key.trim();
        if key.is_empty() || key == API_KEY_PLACEHOLDER {
            return Err(Error::Configuration(format!(
                "{API_KEY_ENV} must be set in the environment or in the config file"
            )));
        }
        let settings = &self.pipeline.settings;
        if settings.total_budget == 0 {
            return Err(Error::Configuration(
                "pipeline.total_budget must be greater than zero".to_string(),
            ));
        }
        if settings.overlap >= settings.total_budget {
            return Err(Error::Configuration(format!(
                "pipeline.overlap ({}) must be smaller than pipeline.total_budget ({})",
                settings.overlap, settings.total_budget
            )));
        }
        Ok(())
    }

    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.pipeline.settings
    }

    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir).map_err(|source| Error::Io {
            path: config_dir.clone(),
            source,
        })?;
        Ok(config_dir)
    }

    pub fn create_config() -> Result<PathBuf> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");

        if config_path.exists() {
            return Err(Error::Configuration(format!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            )));
        }

        Self::write_template(&config_path)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Add your OpenAI API key (or export OPENAI_API_KEY / OPENAI_ORG_ID)");
        println!("   2. Optionally create a jargon.txt with one 'term,replacement' per line");
        println!("   3. Run 'scribe run <transcript.vtt>' to produce notes");
        println!();
        println!("🔧 Configuration options:");
        println!("   - pipeline.model: chat model to use (gpt-3.5-turbo, gpt-4o-mini, etc.)");
        println!("   - pipeline.total_budget: token ceiling for a single request");
        println!("   - pipeline.overlap: tokens shared between consecutive chunks");
        println!("   - retry.delays_secs: backoff between retries (empty = no retries)");
        println!();
        Ok(config_path)
    }

    fn write_template(path: &Path) -> Result<()> {
        let mut template = Self::default();
        template.openai.api_key = API_KEY_PLACEHOLDER.to_string();
        let json = serde_json::to_string_pretty(&template)
            .map_err(|e| Error::Configuration(format!("serialize config template: {e}")))?;
        std::fs::write(path, json).map_err(|source| Error::OutputWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}
