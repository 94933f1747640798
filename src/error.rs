//! Error types of the analysis stages and the pipeline.

use crate::parser::ParsingError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NexnetError>;

/// Errors after parsing: character selection, state assignment and
/// reconstruction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Ancestral state reconstruction failed: {0}")]
    AsrFailure(String),

    #[error("Unknown character: {0}")]
    UnknownCharacter(String),

    #[error("Tree does not match input: {0}")]
    TreeMismatch(String),

    #[error("State {state} outside of declared states 1..={num_states}")]
    StateOutOfRange { state: usize, num_states: usize },
}

/// Top-level error of [TransmissionPipeline](crate::pipeline::TransmissionPipeline).
#[derive(Error, Debug)]
pub enum NexnetError {
    #[error("{0}")]
    Parsing(#[from] ParsingError),

    #[error("{0}")]
    Analysis(#[from] AnalysisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
