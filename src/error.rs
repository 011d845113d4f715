//! Error types and result handling for kcli.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! # Example
//!
//! ```rust
//! use kcli::{Error, Result};
//!
//! fn check_topic(topic: &str) -> Result<()> {
//!     if topic.is_empty() {
//!         return Err(Error::InvalidConfiguration("topic must not be empty".to_string()));
//!     }
//!     Ok(())
//! }
//!
//! match check_topic("") {
//!     Ok(()) => println!("Topic accepted"),
//!     Err(Error::InvalidConfiguration(msg)) => eprintln!("Bad configuration: {}", msg),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for kcli operations.
///
/// Every variant is returned to the caller; nothing in the library exits the
/// process on its own.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad broker list, empty topic, or conflicting flag combination.
    ///
    /// Always detected before any network I/O.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The broker rejected the SASL credentials.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// A read or close failure while streaming that was not caused by
    /// cancellation.
    #[error("Consume error: {0}")]
    ConsumeFailure(String),

    /// The single publish attempt failed.
    #[error("Produce error: {0}")]
    ProduceFailure(String),

    /// The publish did not complete before the deadline.
    #[error("Produce timed out after {timeout:?}")]
    ProduceTimeout {
        /// The deadline the caller asked for
        timeout: Duration,
    },

    /// The payload file could not be read.
    #[error("Failed to read payload from {path:?}: {source}")]
    PayloadReadFailure {
        /// Path that was requested
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Kafka client error that has not been classified by a pipeline.
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    /// JSON serialization error when rendering messages.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error, typically from writing rendered output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Profile file or environment could not be loaded.
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),
}

impl Error {
    /// Maps a broker error raised while consuming.
    ///
    /// SASL rejections become [`Error::Authentication`], everything else is a
    /// [`Error::ConsumeFailure`].
    pub fn consume(err: KafkaError) -> Self {
        if is_auth_error(&err) {
            Error::Authentication(err.to_string())
        } else {
            Error::ConsumeFailure(err.to_string())
        }
    }

    /// Maps a broker error raised while producing.
    pub fn produce(err: KafkaError) -> Self {
        if is_auth_error(&err) {
            Error::Authentication(err.to_string())
        } else {
            Error::ProduceFailure(err.to_string())
        }
    }
}

fn is_auth_error(err: &KafkaError) -> bool {
    matches!(
        err.rdkafka_error_code(),
        Some(RDKafkaErrorCode::Authentication) | Some(RDKafkaErrorCode::SaslAuthenticationFailed)
    )
}

/// A convenient Result type alias for kcli operations.
///
/// This is equivalent to `std::result::Result<T, kcli::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
