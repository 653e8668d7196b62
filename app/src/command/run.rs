//! Resolve input, topics and output, then hand the transcript to the pipeline.

use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use scribe_config::Config;
use scribe_core::{Error, JargonMap, Pipeline, RunOptions, TopicDirective};
use scribe_providers::{OpenAiProvider, RetryPolicy, TiktokenTokenizer};
use tracing::info;

/// `--topics` value meaning "ask on stdin".
pub const PROMPT_TOPICS: &str = "prompt";

/// Input parameters for the Run command strategy.
#[derive(Debug, Clone)]
pub struct RunInput {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    /// Raw `--topics` value; `None` or [`PROMPT_TOPICS`] asks interactively
    pub topics: Option<String>,
    pub summary: bool,
    pub model: Option<String>,
    pub jargon: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Strategy for executing the Run command.
///
/// Everything that touches the terminal or the filesystem happens here, so the
/// pipeline only ever sees already-resolved strings.
#[derive(Debug, Clone, Copy)]
pub struct RunStrategy;

impl super::CommandStrategy for RunStrategy {
    type Input = RunInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load(input.config.as_deref())?;
        config.validate()?;

        let text = read_input(&input.input)?;
        let jargon = JargonMap::load(input.jargon.as_ref().unwrap_or(&config.jargon_path))?;
        let topics = resolve_topics(input.topics.as_deref())?;

        let tokenizer = TiktokenTokenizer::new(&config.pipeline.encoding).map_err(Error::Tokenizer)?;
        let provider = OpenAiProvider::new(
            config.openai.api_key.clone(),
            config.openai.organization.clone(),
        )
        .with_base_url(config.openai.base_url.clone())
        .with_retry(RetryPolicy::from_secs(&config.retry.delays_secs))
        .with_timeout(Duration::from_secs(config.openai.timeout_secs))
        .map_err(|e| Error::Configuration(format!("HTTP client: {e:#}")))?;

        let mut settings = config.settings().clone();
        if let Some(model) = input.model {
            settings.model = model;
        }

        let pipeline = Pipeline::new(provider, tokenizer, settings).with_jargon(jargon);
        let options = RunOptions {
            topics,
            summarize: input.summary,
        };
        let output = pipeline.run(&text, &options).await?;

        let output_path = input
            .output
            .unwrap_or_else(|| default_output_path(&input.input));
        write_output(&output_path, &output.render())?;

        println!(
            "\nYour summary of notes have been written to \"{}\".",
            output_path.display()
        );
        Ok(())
    }
}

fn read_input(path: &Path) -> Result<String, Error> {
    if !path.is_file() {
        return Err(Error::InputNotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Read {} bytes from {}", text.len(), path.display());
    Ok(text)
}

/// `<dir>/<stem>_output.txt` next to the input.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "notes".into(), |s| s.to_string_lossy());
    input.with_file_name(format!("{stem}_output.txt"))
}

fn write_output(path: &Path, contents: &str) -> Result<(), Error> {
    std::fs::write(path, contents).map_err(|source| Error::OutputWrite {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve_topics(arg: Option<&str>) -> Result<TopicDirective, Error> {
    match arg {
        Some(value) if value != PROMPT_TOPICS => Ok(TopicDirective::parse(value)),
        _ => {
            let stdin = std::io::stdin();
            if !stdin.is_terminal() {
                info!("stdin is not a terminal, skipping topic sorting");
                return Ok(TopicDirective::None);
            }
            ask_topics(&mut stdin.lock(), &mut std::io::stdout())
        }
    }
}

fn ask_topics(reader: &mut impl BufRead, writer: &mut impl Write) -> Result<TopicDirective, Error> {
    let io_err = |source| Error::Io {
        path: PathBuf::from("<stdin>"),
        source,
    };
    write!(writer, "What topics would you like to sort notes by? ").map_err(io_err)?;
    writer.flush().map_err(io_err)?;

    let mut answer = String::new();
    reader.read_line(&mut answer).map_err(io_err)?;
    Ok(TopicDirective::parse(&answer))
}
