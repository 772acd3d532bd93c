//! Error types for the knowledge graph pipeline

use thiserror::Error;

/// Result type alias for this library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a knowledge graph
#[derive(Error, Debug)]
pub enum Error {
    /// A mention points at a sentence that does not exist, or its
    /// start/head/end indices are inconsistent
    #[error("Malformed coreference cluster {cluster}: {reason}")]
    MalformedCluster { cluster: String, reason: String },

    /// A mention's token span falls outside its sentence
    #[error(
        "Mention span {start}..{end} is out of range for sentence {sentence} ({len} tokens)"
    )]
    IndexOutOfRange {
        sentence: usize,
        start: usize,
        end: usize,
        len: usize,
    },

    /// A cluster has no mentions to choose a canonical form from
    #[error("Coreference cluster {0} has no mentions")]
    EmptyCluster(String),

    /// An external collaborator (CoreNLP server, OpenIE process) failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Error parsing a JSON payload
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error writing a CSV output file
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// RDF store or serialization error
    #[error("Graph error: {0}")]
    Graph(String),
}
