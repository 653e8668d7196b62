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

mod openai;
pub mod retry;
mod tiktoken;

pub use openai::{ApiError, OpenAiProvider};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use tiktoken::TiktokenTokenizer;
