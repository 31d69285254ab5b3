//! Error types for Quote Intake.

use uuid::Uuid;

/// Top-level error type for the intake service.
///
/// Lookup and submission failures never reach it: the vehicle provider turns
/// them into empty results and the submission dispatcher only logs them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Entry gate error: {0}")]
    Gate(#[from] GateError),

    #[error("Step engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Session {id} not found")]
    SessionNotFound { id: Uuid },
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Entry gate (ZIP code) rejections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("ZIP code must be exactly five digits, got {input:?}")]
    InvalidZip { input: String },

    #[error("Quote flow already started")]
    AlreadyStarted,
}

/// Step engine invariant violations.
///
/// None of these occur under correct construction; they exist so that a
/// misuse is reported instead of silently corrupting the cursor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Step list is empty")]
    EmptyStepList,

    #[error("Engine is {state}, expected {expected}")]
    InvalidState { state: String, expected: String },

    #[error("Cursor {cursor} out of bounds for step list of length {len}")]
    CursorOutOfBounds { cursor: isize, len: usize },

    #[error("Current step is {current}, action needs {expected}")]
    WrongStep { current: String, expected: String },
}

/// Failures talking to the vehicle data services.
///
/// These never cross the provider boundary: the provider converts them into
/// empty results. They are surfaced only by the low-level client.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Request to {service} failed: {reason}")]
    RequestFailed { service: String, reason: String },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },

    #[error("Malformed identifier: {0}")]
    MalformedIdentifier(String),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Submission transport failures. Logged, never shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Submission to {url} failed: {reason}")]
    SendFailed { url: String, reason: String },

    #[error("Submission to {url} rejected with status {status}")]
    Rejected { url: String, status: u16 },
}

/// Result type alias for the intake service.
pub type Result<T> = std::result::Result<T, Error>;
