use thiserror::Error;

use crate::models::directive::DirectiveError;
use crate::models::ParticipantId;

/// Errors surfaced by the outer layers (config loading, content loading, JSON API).
///
/// The scheduling engine itself never fails: out-of-range values are clamped and
/// missing data is reported as `None`.
#[derive(Error, Debug)]
pub enum AtbError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid directive: {0}")]
    Directive(#[from] DirectiveError),

    #[error("Unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    #[error("Duplicate participant: {0}")]
    DuplicateParticipant(ParticipantId),

    #[error("Unsupported schema version: found {found}, expected {expected}")]
    SchemaVersion { found: u8, expected: u8 },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl AtbError {
    /// Whether the caller can fix the request and retry.
    pub fn is_request_error(&self) -> bool {
        match self {
            AtbError::InvalidConfig(_) => true,
            AtbError::Directive(_) => true,
            AtbError::UnknownParticipant(_) => true,
            AtbError::DuplicateParticipant(_) => true,
            AtbError::SchemaVersion { .. } => true,
            AtbError::DeserializationError(_) => true,
            AtbError::SerializationError(_) => false,
        }
    }
}

impl From<serde_json::Error> for AtbError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            AtbError::DeserializationError(err.to_string())
        } else {
            AtbError::SerializationError(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AtbError>;
