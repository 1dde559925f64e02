use thiserror::Error;

/// Errors surfaced by the analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The input byte stream could not be decoded as audio. Fatal for the
    /// run; no partial results are produced.
    #[error("failed to decode audio: {0}")]
    Decode(String),

    /// Pipeline configuration violates a construction-time invariant.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The classification oracle failed for one chunk. The run is aborted;
    /// columns already committed to the timeline stay valid.
    #[error("classification failed for chunk {chunk_index}: {message}")]
    Oracle { chunk_index: usize, message: String },

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    /// The caller cancelled the run before it finished.
    #[error("analysis cancelled")]
    Cancelled,
}

/// Violations of the timeline aggregator's append contract.
#[derive(Debug, Error, PartialEq)]
pub enum TimelineError {
    #[error("expected chunk index {expected}, got {got}")]
    OutOfOrder { expected: usize, got: usize },

    #[error("score vector has {got} entries, taxonomy has {expected}")]
    ScoreLength { expected: usize, got: usize },

    #[error("timeline is finalized; no further appends are allowed")]
    Finalized,
}
