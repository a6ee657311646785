//! Total classification of provider failures.
//!
//! The status code decides wherever it is specific enough. Message wording
//! is only consulted for statuses that do not settle the class on their own,
//! since providers do not promise a stable error vocabulary.

use crate::error::CallFailure;

const QUOTA_WORDS: &[&str] = &["quota", "billing", "exceeded your current"];

const OVERLOAD_WORDS: &[&str] = &[
    "overloaded",
    "rate limit",
    "rate-limit",
    "too many requests",
    "try again later",
    "temporarily unavailable",
];

const MISSING_MODEL_WORDS: &[&str] = &[
    "not found",
    "not supported",
    "does not exist",
    "is not available",
];

/// What a failed call means for the rest of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// The model's quota is spent; other models may still work.
    QuotaExceeded,
    /// Transient; retry the same model with backoff.
    Overloaded,
    /// The model does not exist or does not serve this method; skip it.
    ModelUnavailable,
    /// No response at all; retried like `Overloaded`.
    Transport,
    /// Anything else. Expected to recur for every model.
    Other,
}

fn mentions(text: &str, words: &[&str]) -> bool {
    words.iter().any(|word| text.contains(word))
}

impl FailureClass {
    /// Classify a failure. Every failure maps to exactly one class.
    pub fn classify(failure: &CallFailure) -> Self {
        let (status, message) = match failure {
            CallFailure::Transport(_) => return Self::Transport,
            CallFailure::Status { status, message } => (*status, message.to_lowercase()),
        };

        match status {
            429 if mentions(&message, QUOTA_WORDS) => Self::QuotaExceeded,
            429 | 500 | 503 => Self::Overloaded,
            404 => Self::ModelUnavailable,
            _ if mentions(&message, MISSING_MODEL_WORDS) => Self::ModelUnavailable,
            _ if mentions(&message, OVERLOAD_WORDS) => Self::Overloaded,
            _ => Self::Other,
        }
    }

    /// Returns `true` for classes retried on the same model.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Overloaded | Self::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16, message: &str) -> CallFailure {
        CallFailure::Status {
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_quota_needs_429_and_wording() {
        assert_eq!(
            FailureClass::classify(&status(429, "You exceeded your current Quota")),
            FailureClass::QuotaExceeded
        );
        assert_eq!(
            FailureClass::classify(&status(429, "Resource has been exhausted")),
            FailureClass::Overloaded
        );
        assert_eq!(
            FailureClass::classify(&status(403, "billing account disabled")),
            FailureClass::Other
        );
    }

    #[test]
    fn test_server_errors_are_overloaded() {
        assert_eq!(FailureClass::classify(&status(500, "")), FailureClass::Overloaded);
        assert_eq!(
            FailureClass::classify(&status(503, "The model is overloaded")),
            FailureClass::Overloaded
        );
        assert_eq!(
            FailureClass::classify(&status(502, "upstream is overloaded")),
            FailureClass::Overloaded
        );
    }

    #[test]
    fn test_missing_model() {
        assert_eq!(
            FailureClass::classify(&status(404, "whatever")),
            FailureClass::ModelUnavailable
        );
        assert_eq!(
            FailureClass::classify(&status(
                400,
                "models/gemini-x is not supported for generateContent"
            )),
            FailureClass::ModelUnavailable
        );
    }

    #[test]
    fn test_other_and_transport() {
        assert_eq!(
            FailureClass::classify(&status(401, "API key not valid")),
            FailureClass::Other
        );
        assert_eq!(
            FailureClass::classify(&CallFailure::Transport("connection reset".into())),
            FailureClass::Transport
        );
    }

    #[test]
    fn test_retryable() {
        assert!(FailureClass::Overloaded.is_retryable());
        assert!(FailureClass::Transport.is_retryable());
        assert!(!FailureClass::QuotaExceeded.is_retryable());
        assert!(!FailureClass::ModelUnavailable.is_retryable());
        assert!(!FailureClass::Other.is_retryable());
    }
}
