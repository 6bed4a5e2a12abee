//! Error types and result handling for grid-loadgen.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! Only errors raised before the pipeline starts are fatal. Per-record
//! ([`Error::Serialization`], [`Error::InvalidRecord`]) and per-batch
//! ([`Error::Publish`]) errors are logged by the publishing workers, which
//! keep running.
//!
//! # Example
//!
//! ```rust
//! use grid_loadgen::{Error, Result};
//!
//! fn connect_to_broker() -> Result<()> {
//!     Err(Error::Connection("broker localhost:9092 unreachable".to_string()))
//! }
//!
//! match connect_to_broker() {
//!     Ok(()) => println!("Connected"),
//!     Err(Error::Connection(msg)) => eprintln!("Connection error: {}", msg),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for grid-loadgen operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value, detected before anything starts.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configuration file or environment could not be parsed.
    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// Kafka client or producer error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// JSON serialization error when encoding a reading.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A reading that cannot be represented on the wire.
    #[error("Invalid record: {message}")]
    InvalidRecord {
        /// What was wrong with the record
        message: String,
    },

    /// I/O error, typically from signal handler registration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The broker could not be reached at startup.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A whole batch failed to publish.
    ///
    /// `records` is the size of the batch handed to the broker, all of
    /// which are counted as failed.
    #[error("Failed to publish batch of {records} records: {source}")]
    Publish {
        /// Number of records in the failed batch
        records: usize,
        /// Underlying cause reported by the broker client
        #[source]
        source: Box<Error>,
    },

    /// Every consumer of the queue has gone away.
    #[error("Queue closed")]
    QueueClosed,

    /// Cancellation was observed at a blocking point.
    ///
    /// This is not really an error but uses the error mechanism
    /// to cleanly exit the generation loop.
    #[error("Shutdown requested")]
    Shutdown,
}

/// A convenient Result type alias for grid-loadgen operations.
///
/// This is equivalent to `std::result::Result<T, grid_loadgen::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
