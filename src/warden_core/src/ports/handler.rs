use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use crate::domain::{
    credential::Credential,
    failure::{FailureCategory, HandlerFailure},
    handler_result::HandlerResult,
    principal::Principal,
};

static HANDLER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:-]*$").expect("handler name pattern is valid")
});

pub fn is_valid_handler_name(name: &str) -> bool {
    HANDLER_NAME.is_match(name)
}

// AuthenticationHandler port trait and errors
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Account not found")]
    AccountNotFound,
    #[error("Bad credentials")]
    BadCredentials,
    #[error("Account disabled")]
    AccountDisabled,
    #[error("Credential expired")]
    CredentialExpired,
    #[error("Handler unavailable: {0}")]
    Unavailable(String),
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl HandlerError {
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::AccountNotFound => FailureCategory::AccountNotFound,
            Self::BadCredentials => FailureCategory::BadCredentials,
            Self::AccountDisabled => FailureCategory::AccountDisabled,
            Self::CredentialExpired => FailureCategory::CredentialExpired,
            Self::Unavailable(_) => FailureCategory::HandlerUnavailable,
            Self::Unexpected(_) => FailureCategory::Unknown,
        }
    }

    pub fn into_failure(self, handler_name: impl Into<String>) -> HandlerFailure {
        let category = self.category();
        match self {
            Self::Unavailable(message) | Self::Unexpected(message) => {
                HandlerFailure::with_message(handler_name, category, message)
            }
            _ => HandlerFailure::new(handler_name, category),
        }
    }
}

impl PartialEq for HandlerError {
    fn eq(&self, other: &Self) -> bool {
        self.category() == other.category()
    }
}

/// A pluggable unit that verifies one kind of credential.
///
/// Implementations are shared between concurrent authentication calls, so any
/// internal state must be synchronised.
#[async_trait]
pub trait AuthenticationHandler: Send + Sync {
    /// Unique name of this handler instance; keys the result maps.
    fn name(&self) -> &str;

    fn supports(&self, credential: &Credential) -> bool;

    async fn authenticate(&self, credential: &Credential) -> Result<HandlerResult, HandlerError>;

    /// Overrides the manager-wide timeout for this handler.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

// PrincipalResolver port trait
/// Turns the principal a handler produced into the principal the rest of the
/// system should see (directory lookup, id normalisation, ...).
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    async fn resolve(
        &self,
        credential: &Credential,
        principal: &Principal,
    ) -> Result<Principal, HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_names() {
        assert!(is_valid_handler_name("ldap"));
        assert!(is_valid_handler_name("db.primary:v2"));
        assert!(!is_valid_handler_name(""));
        assert!(!is_valid_handler_name("-leading"));
        assert!(!is_valid_handler_name("has space"));
    }

    #[test]
    fn errors_map_onto_categories() {
        let failure = HandlerError::Unavailable("connection refused".into()).into_failure("ldap");
        assert_eq!(failure.category(), FailureCategory::HandlerUnavailable);
        assert_eq!(failure.message(), Some("connection refused"));

        let failure = HandlerError::BadCredentials.into_failure("db");
        assert_eq!(failure.category(), FailureCategory::BadCredentials);
        assert_eq!(failure.message(), None);

        assert_eq!(
            HandlerError::Unexpected("boom".into()).category(),
            FailureCategory::Unknown
        );
    }
}
