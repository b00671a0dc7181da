use thiserror::Error;

/// Error types for credential exchange synchronization
///
/// `Precondition`, `Submission` and `Timeout` are terminal for a flow step and are
/// never retried by the orchestrator. The remaining variants come from the
/// ambient layers (configuration, transport, ingestion).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IssuanceError {
    /// A required memory entry is absent
    #[error("actor '{actor}' has no memory of '{key}'")]
    Precondition { actor: String, key: String },

    /// The agent answered a submission with an unexpected status code
    #[error("{method} {path} returned status {actual}, expected {expected}: {body}")]
    Submission { method: String, path: String, expected: u16, actual: u16, body: String },

    /// A poll ran out of time before its predicate held
    #[error("{0}")]
    Timeout(String),

    /// A poll was aborted because the owning run was torn down
    #[error("{0}")]
    Cancelled(String),

    /// Configuration related errors
    #[error("{0}")]
    Configuration(String),

    /// Serialization/deserialization errors
    #[error("{0}")]
    Serialization(String),

    /// Network/IO errors
    #[error("{0}")]
    Network(String),

    /// Push-event delivery errors
    #[error("{0}")]
    Ingestion(String)
}

impl IssuanceError {
    pub fn precondition(actor: impl Into<String>, key: impl Into<String>) -> Self {
        IssuanceError::Precondition { actor: actor.into(), key: key.into() }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, IssuanceError::Precondition { .. })
    }

    pub fn is_submission(&self) -> bool {
        matches!(self, IssuanceError::Submission { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, IssuanceError::Timeout(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, IssuanceError::Cancelled(_))
    }
}

/// Convert from anyhow::Error
impl From<anyhow::Error> for IssuanceError {
    fn from(err: anyhow::Error) -> Self {
        IssuanceError::Configuration(err.to_string())
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for IssuanceError {
    fn from(err: std::io::Error) -> Self {
        IssuanceError::Configuration(err.to_string())
    }
}

/// Convert from serde_yaml::Error
impl From<serde_yaml::Error> for IssuanceError {
    fn from(err: serde_yaml::Error) -> Self {
        IssuanceError::Serialization(err.to_string())
    }
}

/// Convert from serde_json::Error
impl From<serde_json::Error> for IssuanceError {
    fn from(err: serde_json::Error) -> Self {
        IssuanceError::Serialization(err.to_string())
    }
}

/// Convert from reqwest::Error
impl From<reqwest::Error> for IssuanceError {
    fn from(err: reqwest::Error) -> Self {
        IssuanceError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_is_distinguishable() {
        let timeout = IssuanceError::Timeout("Holder bob: protocol state did not reach OFFER_RECEIVED".to_string());
        let submission = IssuanceError::Submission {
            method:   "POST".to_string(),
            path:     "/issue-credentials/credential-offers".to_string(),
            expected: 201,
            actual:   400,
            body:     "{}".to_string()
        };
        let precondition = IssuanceError::precondition("bob", "thid");

        assert!(timeout.is_timeout() && !timeout.is_submission());
        assert!(submission.is_submission() && !submission.is_timeout());
        assert!(precondition.is_precondition() && !precondition.is_timeout());
    }

    #[test]
    fn test_messages_carry_context() {
        let submission = IssuanceError::Submission {
            method:   "POST".to_string(),
            path:     "/records/1/accept-offer".to_string(),
            expected: 200,
            actual:   404,
            body:     "not found".to_string()
        };
        assert_eq!(
            submission.to_string(),
            "POST /records/1/accept-offer returned status 404, expected 200: not found"
        );
        assert_eq!(IssuanceError::precondition("bob", "thid").to_string(), "actor 'bob' has no memory of 'thid'");
    }
}
