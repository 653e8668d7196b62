//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy type with its own input type, so
//! dispatch in `main` is monomorphized and every command resolves its own
//! configuration before doing any work.

mod info;
mod init;
mod run;
mod version;

pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use run::{PROMPT_TOPICS, RunInput, RunStrategy};
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
///
/// # Example
/// ```rust,ignore
/// struct MyStrategy;
///
/// impl CommandStrategy for MyStrategy {
///     type Input = MyInput;
///
///     async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
///         // Command logic here
///         Ok(())
///     }
/// }
/// ```
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    ///
    /// # Errors
    /// Returns an error if command execution fails. Pipeline failures are
    /// passed through as `scribe_core::Error` so `main` can pick the exit code.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}
