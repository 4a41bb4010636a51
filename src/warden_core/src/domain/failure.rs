use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a handler attempt did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    AccountNotFound,
    BadCredentials,
    AccountDisabled,
    CredentialExpired,
    /// Timeout or transient outage.
    HandlerUnavailable,
    /// Reported for a call the caller cancelled, see `AuthenticationError::category`.
    Cancelled,
    /// Unexpected handler-internal fault, including panics.
    Unknown,
}

impl FailureCategory {
    pub const ALL: [FailureCategory; 7] = [
        Self::AccountNotFound,
        Self::BadCredentials,
        Self::AccountDisabled,
        Self::CredentialExpired,
        Self::HandlerUnavailable,
        Self::Cancelled,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccountNotFound => "account_not_found",
            Self::BadCredentials => "bad_credentials",
            Self::AccountDisabled => "account_disabled",
            Self::CredentialExpired => "credential_expired",
            Self::HandlerUnavailable => "handler_unavailable",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure record of one handler attempt. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerFailure {
    handler_name: String,
    category: FailureCategory,
    message: Option<String>,
}

impl HandlerFailure {
    pub fn new(handler_name: impl Into<String>, category: FailureCategory) -> Self {
        Self {
            handler_name: handler_name.into(),
            category,
            message: None,
        }
    }

    pub fn with_message(
        handler_name: impl Into<String>,
        category: FailureCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            handler_name: handler_name.into(),
            category,
            message: Some(message.into()),
        }
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub fn category(&self) -> FailureCategory {
        self.category
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {} ({message})", self.handler_name, self.category),
            None => write!(f, "{}: {}", self.handler_name, self.category),
        }
    }
}
