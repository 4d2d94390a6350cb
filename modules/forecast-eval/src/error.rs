//! Typed errors for the evaluation pipeline.
//!
//! Only [`EvalError`] is ever returned to callers, and only for run-level
//! problems (bad configuration, unreadable inputs). Per-record problems are
//! carried as data: failed extractions become `ExtractedInfo::Failed`,
//! unresolved geo names become `error_<name>` markers, and missing station
//! rows are logged and skipped.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// Run-level errors. Any of these aborts the whole batch.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Two varying argument sequences handed to the task runner differ in length
    #[error("varying argument lengths differ: {left} vs {right}")]
    ArgumentLengthMismatch { left: usize, right: usize },

    /// Task runner configured without workers
    #[error("task runner needs at least one worker")]
    NoWorkers,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Result files are never overwritten
    #[error("refusing to overwrite existing file: {0}")]
    OutputExists(PathBuf),

    /// Reference tables are structurally unusable (no columns, no stations)
    #[error("reference data error: {0}")]
    Reference(String),

    #[error("template error: {0}")]
    Template(String),
}

/// Result type alias for pipeline operations.
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Why a single extraction attempt was rejected. Consumed by the retry loop.
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    /// The model call itself failed
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The response text is not a JSON object
    #[error("malformed output: {reason}")]
    MalformedOutput { raw: String, reason: String },

    /// Parsed, but the structure breaks the field/type contract
    #[error("schema invalid: {reason}")]
    SchemaInvalid { payload: Value, reason: String },
}

impl AttemptError {
    /// Payload recorded when this is the last failure before giving up:
    /// the error text, the raw response, or the rejected structure.
    pub fn into_payload(self) -> Value {
        match self {
            AttemptError::TransportFailure(message) => Value::String(message),
            AttemptError::MalformedOutput { raw, .. } => Value::String(raw),
            AttemptError::SchemaInvalid { payload, .. } => payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_invalid_keeps_the_rejected_structure() {
        let payload = json!({"specific_regions": "oops"});
        let err = AttemptError::SchemaInvalid {
            payload: payload.clone(),
            reason: "specific_regions is not a list".into(),
        };
        assert_eq!(err.into_payload(), payload);
    }

    #[test]
    fn malformed_output_keeps_raw_text() {
        let err = AttemptError::MalformedOutput {
            raw: "not json".into(),
            reason: "expected value".into(),
        };
        assert_eq!(err.into_payload(), json!("not json"));
    }
}
