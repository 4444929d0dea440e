//! Failure taxonomy for a session.
//!
//! Every failure here is a recoverable session state: identifier rejections
//! re-prompt, load failures are retried and then wait for a manual retry, and
//! submission failures leave the records in place for a resubmit.

use thiserror::Error;

/// Participant identifier rejected at entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier must contain '@'")]
    MissingAt,
}

/// Word-list acquisition failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("word-list request failed: {0}")]
    Transport(String),
    #[error("word-list service returned status {0}")]
    Status(u16),
    #[error("word-list response was malformed: {0}")]
    Malformed(String),
    #[error("word list unavailable after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<LoadError> },
    #[error("loading was cancelled")]
    Cancelled,
}

/// Results submission failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("results request failed: {0}")]
    Transport(String),
    #[error("results rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("a submission is already in flight")]
    InFlight,
    #[error("results are not ready for submission")]
    NotReady,
}

impl SubmitError {
    /// Fallback message when a rejection body carries no usable `error` field.
    pub const GENERIC_MESSAGE: &'static str = "Failed to save results";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("response read without a stimulus onset")]
    NoOnset,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("config json: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_load_error_names_last_cause() {
        let err = LoadError::Exhausted {
            attempts: 4,
            last: Box::new(LoadError::Status(503)),
        };
        let msg = err.to_string();
        assert!(msg.contains("4 attempts"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn rejected_submit_error_display() {
        let err = SubmitError::Rejected {
            status: 400,
            message: "missing email".into(),
        };
        assert_eq!(err.to_string(), "results rejected (400): missing email");
    }
}
