use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("could not load {what}")]
    FetchFailed {
        what: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{0}")]
    MutationRejected(String),

    #[error(
        "{name}: {}",
        message.as_deref().unwrap_or("protected system provider, cannot be deleted")
    )]
    ProtectedProvider {
        name: String,
        /// Message returned by the store, if it sent one.
        message: Option<String>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
