//! Error types for the completion service.

use thiserror::Error;

/// Failures surfaced by [`crate::Llm`].
///
/// Variants wrapping an external call keep the original failure as their
/// `source()`, so callers can still downcast to the underlying reqwest,
/// candle or hub error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("price history for {ticker} unavailable: {source}")]
    DataProvider {
        ticker: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to load model {model}: {source}")]
    ModelLoad {
        model: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("text generation failed: {0}")]
    Generation(#[source] anyhow::Error),

    #[error("sentiment classification failed: {0}")]
    Classification(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
