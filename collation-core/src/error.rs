//! Error types for collation operations

use serde::Serialize;
use std::time::Duration;

/// Structured error payload shared between service and CLI.
///
/// Used as the HTTP error body in collation-service and as the `--json`
/// error output of the CLI.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub hint: String,
}

impl ErrorEnvelope {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            hint: hint.into(),
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self::new("internal_error", msg, "Check service logs for details")
    }
}

impl From<&CollationError> for ErrorEnvelope {
    fn from(err: &CollationError) -> Self {
        Self::new(err.code(), err.to_string(), err.hint())
    }
}

/// Failure reported by an alignment engine adapter.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine cannot run in this environment (missing executable,
    /// unwritable temp folder, server unreachable).
    #[error("Alignment engine unavailable: {0}")]
    Unavailable(String),

    #[error("Alignment engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("Alignment engine failed ({status}): {detail}")]
    Failed { status: String, detail: String },

    #[error("Alignment cancelled")]
    Cancelled,

    #[error("Alignment engine returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Alignment engine IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True when the failure comes from configuration or environment rather
    /// than from the data sent to the engine.
    pub fn is_environment(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollationError {
    #[error("Duplicate siglum: {0}")]
    DuplicateSiglum(String),

    #[error("Witness {0} has no tokens to collate")]
    EmptyWitness(String),

    #[error("Malformed collation engine output: {0}")]
    MalformedEngineOutput(String),

    #[error("Column index {index} out of range (table width {width})")]
    ColumnIndexOutOfRange { index: usize, width: usize },

    #[error("Unknown siglum: {0}")]
    UnknownSiglum(String),

    #[error("At least 2 witnesses are needed for a collation, found {found}")]
    NotEnoughWitnesses { found: usize },

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid token reference {reference} for witness {siglum}")]
    InvalidReference { siglum: String, reference: usize },

    #[error("Invalid row for witness {siglum}: expected {expected} references, got {found}")]
    RowLengthMismatch {
        siglum: String,
        expected: usize,
        found: usize,
    },

    #[error("Language cannot be blank")]
    InvalidLanguage,

    #[error(
        "Unknown normalizer: {0} (expected one of {names})",
        names = crate::normalizer::NORMALIZER_NAMES.join(", ")
    )]
    UnknownNormalizer(String),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl CollationError {
    /// Stable snake_case code used in error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateSiglum(_) => "duplicate_siglum",
            Self::EmptyWitness(_) => "empty_witness",
            Self::MalformedEngineOutput(_) => "malformed_engine_output",
            Self::ColumnIndexOutOfRange { .. } => "column_out_of_range",
            Self::UnknownSiglum(_) => "unknown_siglum",
            Self::NotEnoughWitnesses { .. } => "not_enough_witnesses",
            Self::InvalidToken(_) => "invalid_token",
            Self::InvalidReference { .. } => "invalid_reference",
            Self::RowLengthMismatch { .. } => "row_length_mismatch",
            Self::InvalidLanguage => "invalid_language",
            Self::UnknownNormalizer(_) => "unknown_normalizer",
            Self::ConfigParse(_) => "config_parse",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
            Self::Engine(EngineError::Unavailable(_)) => "engine_unavailable",
            Self::Engine(EngineError::Timeout(_)) => "engine_timeout",
            Self::Engine(EngineError::Failed { .. }) => "engine_failed",
            Self::Engine(EngineError::InvalidResponse(_)) => "engine_invalid_response",
            Self::Engine(EngineError::Cancelled) => "engine_cancelled",
            Self::Engine(EngineError::Io(_)) => "engine_io_error",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            Self::DuplicateSiglum(_) => "Give every witness a distinct siglum",
            Self::EmptyWitness(_) => "Remove witnesses without text from the request",
            Self::NotEnoughWitnesses { .. } => "Provide at least two witnesses",
            Self::MalformedEngineOutput(_) => "The alignment engine output could not be used; check the engine version",
            Self::Engine(e) if e.is_environment() => "Check the alignment engine configuration and that it is running",
            Self::Engine(EngineError::Timeout(_)) => "Increase engine.timeout or collate fewer witnesses",
            Self::Engine(_) => "Could not align witnesses; check the engine logs",
            Self::UnknownNormalizer(_) => "Use one of the built-in normalizer names",
            Self::ConfigParse(_) => "Fix the TOML configuration file",
            _ => "",
        }
    }

    /// True for errors caused by the witnesses or the engine's reply,
    /// as opposed to configuration or environment problems.
    pub fn is_data_error(&self) -> bool {
        match self {
            Self::Engine(EngineError::Cancelled) => false,
            Self::Engine(e) => !e.is_environment(),
            Self::Io(_) | Self::ConfigParse(_) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_classify_environment_vs_data() {
        let unavailable = CollationError::from(EngineError::Unavailable("no java".into()));
        assert!(!unavailable.is_data_error());
        assert_eq!(unavailable.code(), "engine_unavailable");

        let failed = CollationError::from(EngineError::Failed {
            status: "exit 1".into(),
            detail: "boom".into(),
        });
        assert!(failed.is_data_error());

        let malformed = CollationError::MalformedEngineOutput("missing table".into());
        assert!(malformed.is_data_error());

        let cancelled = CollationError::from(EngineError::Cancelled);
        assert!(!cancelled.is_data_error());
        assert_eq!(cancelled.code(), "engine_cancelled");
    }

    #[test]
    fn envelope_from_error_carries_code_and_hint() {
        let err = CollationError::NotEnoughWitnesses { found: 1 };
        let envelope = ErrorEnvelope::from(&err);
        assert_eq!(envelope.code, "not_enough_witnesses");
        assert!(envelope.message.contains("found 1"));
        assert_eq!(envelope.hint, "Provide at least two witnesses");
    }
}
