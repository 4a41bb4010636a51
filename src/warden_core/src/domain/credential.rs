use std::fmt;

use secrecy::Secret;
use serde::{Deserialize, Serialize};

/// Discriminant of a [`Credential`], used to route credentials to handlers
/// without looking at their contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    UsernamePassword,
    Token,
    Certificate,
    Custom(String),
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UsernamePassword => f.write_str("username_password"),
            Self::Token => f.write_str("token"),
            Self::Certificate => f.write_str("certificate"),
            Self::Custom(kind) => write!(f, "custom:{kind}"),
        }
    }
}

/// Input presented for verification.
///
/// Secret material is kept behind [`Secret`] so it never shows up in `Debug`
/// output or tracing fields.
#[derive(Debug, Clone)]
pub enum Credential {
    UsernamePassword {
        username: String,
        password: Secret<String>,
    },
    /// Bearer token (JWT, API key, ...).
    Token(Secret<String>),
    Certificate {
        subject: String,
        der: Vec<u8>,
    },
    /// Anything the built-in variants do not cover.
    Custom {
        kind: String,
        payload: serde_json::Value,
    },
}

impl Credential {
    pub fn username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UsernamePassword {
            username: username.into(),
            password: Secret::new(password.into()),
        }
    }

    pub fn token(token: impl Into<String>) -> Self {
        Self::Token(Secret::new(token.into()))
    }

    pub fn certificate(subject: impl Into<String>, der: Vec<u8>) -> Self {
        Self::Certificate {
            subject: subject.into(),
            der,
        }
    }

    pub fn custom(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::Custom {
            kind: kind.into(),
            payload,
        }
    }

    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::UsernamePassword { .. } => CredentialKind::UsernamePassword,
            Self::Token(_) => CredentialKind::Token,
            Self::Certificate { .. } => CredentialKind::Certificate,
            Self::Custom { kind, .. } => CredentialKind::Custom(kind.clone()),
        }
    }

    /// Non-secret identifier, safe to log.
    pub fn id(&self) -> &str {
        match self {
            Self::UsernamePassword { username, .. } => username,
            Self::Token(_) => "token",
            Self::Certificate { subject, .. } => subject,
            Self::Custom { kind, .. } => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_secrets() {
        let credential = Credential::username_password("alice", "hunter2");
        let debug = format!("{credential:?}");

        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));

        let token = Credential::token("eyJhbGciOi.secret.sig");
        assert!(!format!("{token:?}").contains("secret.sig"));
    }

    #[test]
    fn id_never_exposes_token_material() {
        assert_eq!(Credential::token("abc").id(), "token");
        assert_eq!(Credential::certificate("CN=alice", vec![1, 2]).id(), "CN=alice");
    }

    #[test]
    fn kind_discriminates_variants() {
        assert_eq!(
            Credential::username_password("a", "b").kind(),
            CredentialKind::UsernamePassword
        );
        assert_eq!(
            Credential::custom("otp", serde_json::json!({"code": "123456"})).kind(),
            CredentialKind::Custom("otp".to_string())
        );
        assert_eq!(CredentialKind::Custom("otp".into()).to_string(), "custom:otp");
    }
}
