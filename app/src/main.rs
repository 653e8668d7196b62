#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod command;

use command::{CommandStrategy, InfoStrategy, InitStrategy, RunInput, RunStrategy, VersionStrategy};

#[derive(Parser)]
#[command(name = "scribe")]
#[command(
    about = "Turn meeting transcripts into structured notes using a chat completion service",
    long_about = None
)]
struct Cli {
    /// Config file (defaults to ~/scribe/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a transcript into notes
    Run {
        /// The input text file to process
        input: PathBuf,

        /// Output file (defaults to the input name with an `_output.txt` suffix)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sort notes by topic: a comma-separated list, `auto`, or `none`.
        /// Omitted or given without a value, the topics are asked for at runtime
        #[arg(short, long, num_args = 0..=1, default_missing_value = command::PROMPT_TOPICS)]
        topics: Option<String>,

        /// Generate a summary of the notes
        #[arg(short, long)]
        summary: bool,

        /// Model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Jargon substitution file (defaults to the configured `jargon_path`)
        #[arg(short, long)]
        jargon: Option<PathBuf>,
    },
    /// Create the configuration file
    Init,
    /// Show the effective configuration
    Info,
    /// Show version
    Version,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {e}");
    }
}

/// Exit code for a failed command: the pipeline's own classification when
/// the failure came from it, 1 otherwise.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<scribe_core::Error>()
        .map_or(1, scribe_core::Error::exit_code)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            input,
            output,
            topics,
            summary,
            model,
            jargon,
        } => {
            RunStrategy
                .execute(RunInput {
                    input,
                    output,
                    topics,
                    summary,
                    model,
                    jargon,
                    config: cli.config,
                })
                .await
        }
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Info => InfoStrategy.execute(cli.config).await,
        Commands::Version => VersionStrategy.execute(()).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn topics_flag_without_value_asks_at_runtime() {
        let cli = Cli::try_parse_from(["scribe", "run", "meeting.vtt", "-t", "-s"]).unwrap();
        let Commands::Run { topics, summary, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(topics.as_deref(), Some(command::PROMPT_TOPICS));
        assert!(summary);
    }

    #[test]
    fn topics_list_and_output_are_parsed() {
        let cli = Cli::try_parse_from([
            "scribe",
            "run",
            "meeting.vtt",
            "--topics",
            "Budget,Hiring",
            "-o",
            "notes.txt",
        ])
        .unwrap();
        let Commands::Run {
            input,
            output,
            topics,
            summary,
            ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(input, PathBuf::from("meeting.vtt"));
        assert_eq!(output, Some(PathBuf::from("notes.txt")));
        assert_eq!(topics.as_deref(), Some("Budget,Hiring"));
        assert!(!summary);
    }

    #[test]
    fn pipeline_errors_keep_their_exit_code() {
        let err = anyhow::Error::from(scribe_core::Error::InputNotFound(PathBuf::from("x.vtt")));
        assert_eq!(exit_code(&err), 3);
        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }
}
