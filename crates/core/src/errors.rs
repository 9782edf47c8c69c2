use thiserror::Error;

use crate::domain::submission::SubmissionStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: SubmissionStatus, to: SubmissionStatus },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Stable machine-readable class used by operator tooling.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(_) => "domain_validation",
            Self::Persistence(_) => "persistence",
            Self::Integration(_) => "integration",
            Self::Configuration(_) => "config_validation",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => 2,
            Self::Persistence(_) => 4,
            Self::Integration(_) => 5,
            Self::Domain(_) => 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::submission::SubmissionStatus;
    use crate::errors::{ApplicationError, DomainError};

    #[test]
    fn invalid_transition_message_names_both_statuses() {
        let error = DomainError::InvalidTransition {
            from: SubmissionStatus::UnderReview,
            to: SubmissionStatus::QuoteSent,
        };

        assert_eq!(
            error.to_string(),
            "invalid status transition from under_review to quote_sent"
        );
    }

    #[test]
    fn domain_errors_classify_as_domain_validation() {
        let error = ApplicationError::from(DomainError::InvalidInput("days".to_owned()));

        assert_eq!(error.error_class(), "domain_validation");
        assert_eq!(error.exit_code(), 6);
    }

    #[test]
    fn configuration_errors_use_config_exit_code() {
        let error = ApplicationError::Configuration("bad database url".to_owned());

        assert_eq!(error.error_class(), "config_validation");
        assert_eq!(error.exit_code(), 2);
    }
}
