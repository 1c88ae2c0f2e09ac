//! Error types for the FormCoach system.

use thiserror::Error;

use crate::types::SessionId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Session {session_id} is not ready (phase: {phase})")]
    SessionNotReady { session_id: SessionId, phase: String },

    #[error("Unknown priority joint token: {0:?}")]
    InvalidPriorityToken(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template unavailable: {0}")]
    TemplateUnavailable(String),

    #[error("Scoring error: {0}")]
    Scoring(String),

    #[error("Collaborator unavailable: {0}")]
    Collaborator(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient data: need {required} samples, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Source exhausted: {0}")]
    SourceExhausted(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
