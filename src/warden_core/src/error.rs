use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::domain::{
    failure::{FailureCategory, HandlerFailure},
    handler_map::HandlerMap,
    handler_result::HandlerResult,
};

pub const NO_SUPPORTED_HANDLERS_MESSAGE: &str = "no supported handlers for given credentials";

/// How an authentication failure came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No handler supported any of the presented credentials.
    NoSupportedHandlers,
    /// Every attempted handler failed.
    AllFailed,
    /// Some handlers succeeded but the policy deemed it insufficient.
    PartialSuccess,
}

/// Structured authentication failure.
///
/// Carries the per-handler failures and the successes gathered at the time of
/// failure, both as read-only maps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthenticationFailure {
    message: String,
    handler_errors: HandlerMap<HandlerFailure>,
    handler_successes: HandlerMap<HandlerResult>,
}

impl AuthenticationFailure {
    /// No handlers were attempted.
    pub fn no_handlers() -> Self {
        Self::with_message(NO_SUPPORTED_HANDLERS_MESSAGE)
    }

    /// No handlers were attempted, with a custom message.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self::with_message_and_maps(message, HandlerMap::new(), HandlerMap::new())
    }

    /// Handlers were attempted and none succeeded.
    pub fn from_failures(handler_errors: HandlerMap<HandlerFailure>) -> Self {
        Self::new(handler_errors, HandlerMap::new())
    }

    /// Handlers were attempted; the summary counts entries in both maps.
    pub fn new(
        handler_errors: HandlerMap<HandlerFailure>,
        handler_successes: HandlerMap<HandlerResult>,
    ) -> Self {
        let message = format!(
            "{} errors, {} successes",
            handler_errors.len(),
            handler_successes.len()
        );
        Self::with_message_and_maps(message, handler_errors, handler_successes)
    }

    pub fn with_message_and_maps(
        message: impl Into<String>,
        handler_errors: HandlerMap<HandlerFailure>,
        handler_successes: HandlerMap<HandlerResult>,
    ) -> Self {
        Self {
            message: message.into(),
            handler_errors,
            handler_successes,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Handler name to failure.
    pub fn handler_errors(&self) -> &HandlerMap<HandlerFailure> {
        &self.handler_errors
    }

    /// Handler name to success.
    pub fn handler_successes(&self) -> &HandlerMap<HandlerResult> {
        &self.handler_successes
    }

    /// Handler name to failure category, sorted by name.
    pub fn failure_categories(&self) -> BTreeMap<&str, FailureCategory> {
        self.handler_errors
            .iter()
            .map(|(name, failure)| (name, failure.category()))
            .collect()
    }

    pub fn kind(&self) -> FailureKind {
        if !self.handler_successes.is_empty() {
            FailureKind::PartialSuccess
        } else if !self.handler_errors.is_empty() {
            FailureKind::AllFailed
        } else {
            FailureKind::NoSupportedHandlers
        }
    }
}

impl fmt::Display for AuthenticationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AuthenticationFailure {}

/// Error returned by the authentication manager.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("Authentication failed: {0}")]
    Rejected(#[from] AuthenticationFailure),
    #[error("Authentication cancelled by caller")]
    Cancelled,
}

impl AuthenticationError {
    pub fn failure(&self) -> Option<&AuthenticationFailure> {
        match self {
            Self::Rejected(failure) => Some(failure),
            Self::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Category of the call as a whole. A rejection has none of its own; its
    /// handler categories are on [`AuthenticationFailure`].
    pub fn category(&self) -> Option<FailureCategory> {
        match self {
            Self::Rejected(_) => None,
            Self::Cancelled => Some(FailureCategory::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{credential::CredentialKind, principal::Principal};

    fn errors() -> HandlerMap<HandlerFailure> {
        [
            HandlerFailure::new("ldap", FailureCategory::AccountNotFound),
            HandlerFailure::with_message("db", FailureCategory::BadCredentials, "wrong password"),
        ]
        .into_iter()
        .map(|failure| (failure.handler_name().to_string(), failure))
        .collect()
    }

    fn successes() -> HandlerMap<HandlerResult> {
        let result = HandlerResult::new(
            "token",
            CredentialKind::Token,
            Principal::new("alice"),
        );
        std::iter::once(("token".to_string(), result)).collect()
    }

    #[test]
    fn cancellation_carries_its_own_category() {
        let cancelled = AuthenticationError::Cancelled;
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.category(), Some(FailureCategory::Cancelled));

        let rejected = AuthenticationError::from(AuthenticationFailure::new(errors(), successes()));
        assert_eq!(rejected.category(), None);
        assert!(rejected.failure().is_some());
    }

    #[test]
    fn no_handlers_has_default_message_and_empty_maps() {
        let failure = AuthenticationFailure::no_handlers();

        assert_eq!(failure.message(), NO_SUPPORTED_HANDLERS_MESSAGE);
        assert!(failure.handler_errors().is_empty());
        assert!(failure.handler_successes().is_empty());
        assert_eq!(failure.kind(), FailureKind::NoSupportedHandlers);
    }

    #[test]
    fn failures_only_summarises_counts() {
        let failure = AuthenticationFailure::from_failures(errors());

        assert_eq!(failure.message(), "2 errors, 0 successes");
        assert_eq!(failure.kind(), FailureKind::AllFailed);
    }

    #[test]
    fn mixed_maps_round_trip() {
        let failure = AuthenticationFailure::new(errors(), successes());

        assert_eq!(failure.message(), "2 errors, 1 successes");
        assert_eq!(failure.handler_errors(), &errors());
        assert_eq!(failure.handler_successes(), &successes());
        assert_eq!(failure.kind(), FailureKind::PartialSuccess);
        assert_eq!(
            failure.failure_categories(),
            BTreeMap::from([
                ("db", FailureCategory::BadCredentials),
                ("ldap", FailureCategory::AccountNotFound),
            ])
        );
    }

    #[test]
    fn explicit_message_wins_over_summary() {
        let failure =
            AuthenticationFailure::with_message_and_maps("locked out", errors(), successes());
        assert_eq!(failure.to_string(), "locked out");
        assert_eq!(failure.handler_errors().len(), 2);
    }

    #[test]
    fn rejected_error_exposes_failure() {
        let error = AuthenticationError::from(AuthenticationFailure::no_handlers());
        assert!(!error.is_cancelled());
        assert!(error.failure().is_some());
        assert!(AuthenticationError::Cancelled.failure().is_none());
    }
}
