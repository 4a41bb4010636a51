use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashSet;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use warden_core::{
    AuthenticationHandler, Credential, CredentialKind, HandlerError, HandlerResult, Principal,
};

use crate::config::constants::handlers::JWT_HANDLER_NAME;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token lifetime")]
    InvalidLifetime,
    #[error("Token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub issuer: Option<String>,
    pub leeway_seconds: u64,
}

impl JwtConfig {
    pub fn new(secret: Secret<String>) -> Self {
        Self {
            secret,
            issuer: None,
            leeway_seconds: 0,
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.secret.expose_secret().as_bytes()
    }
}

/// Registered claims the handler reads; everything else lands in `extra` and
/// becomes principal attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenClaims {
    pub fn new(subject: impl Into<String>, time_to_live: chrono::Duration) -> Result<Self, TokenError> {
        let exp = Utc::now()
            .checked_add_signed(time_to_live)
            .ok_or(TokenError::InvalidLifetime)?
            .timestamp();
        Ok(Self {
            sub: subject.into(),
            exp,
            jti: None,
            iss: None,
            extra: Map::new(),
        })
    }

    #[must_use]
    pub fn with_jti(mut self, jti: impl Into<String>) -> Self {
        self.jti = Some(jti.into());
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.iss = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

/// Validates HS256 bearer tokens.
#[derive(Clone)]
pub struct JwtTokenHandler {
    name: String,
    config: JwtConfig,
    revoked: Arc<DashSet<String>>,
}

impl JwtTokenHandler {
    pub fn new(config: JwtConfig) -> Self {
        Self::named(JWT_HANDLER_NAME, config)
    }

    pub fn named(name: impl Into<String>, config: JwtConfig) -> Self {
        Self {
            name: name.into(),
            config,
            revoked: Arc::new(DashSet::new()),
        }
    }

    pub fn issue(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        let token = encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.as_bytes()),
        )?;
        Ok(token)
    }

    /// Rejects every later presentation of the token id as a disabled account.
    pub fn revoke(&self, jti: impl Into<String>) {
        self.revoked.insert(jti.into());
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.revoked.contains(jti)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.config.leeway_seconds;
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }
}

#[async_trait]
impl AuthenticationHandler for JwtTokenHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::Token(_))
    }

    #[tracing::instrument(name = "Token authentication", skip_all, fields(handler = %self.name))]
    async fn authenticate(&self, credential: &Credential) -> Result<HandlerResult, HandlerError> {
        let Credential::Token(token) = credential else {
            return Err(HandlerError::Unexpected(format!(
                "unsupported credential kind {}",
                credential.kind()
            )));
        };

        let claims = decode::<TokenClaims>(
            token.expose_secret(),
            &DecodingKey::from_secret(self.config.as_bytes()),
            &self.validation(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => HandlerError::CredentialExpired,
            kind => {
                tracing::debug!(error = ?kind, "Token rejected");
                HandlerError::BadCredentials
            }
        })?;

        if let Some(jti) = claims.jti.as_deref()
            && self.is_revoked(jti)
        {
            tracing::debug!(jti, "Token has been revoked");
            return Err(HandlerError::AccountDisabled);
        }

        let TokenClaims {
            sub,
            exp,
            jti,
            iss,
            extra,
        } = claims;

        let principal = extra
            .into_iter()
            .fold(Principal::new(sub), |principal, (name, value)| match value {
                Value::Array(values) => principal.with_attribute_values(name, values),
                value => principal.with_attribute(name, value),
            });

        let mut result =
            HandlerResult::new(&self.name, CredentialKind::Token, principal).with_metadata("exp", exp);
        if let Some(jti) = jti {
            result = result.with_metadata("jti", jti);
        }
        if let Some(iss) = iss {
            result = result.with_metadata("iss", iss);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::FailureCategory;

    fn handler() -> JwtTokenHandler {
        JwtTokenHandler::new(JwtConfig::new(Secret::new("top-secret-signing-key".to_string())))
    }

    fn bearer(token: String) -> Credential {
        Credential::token(token)
    }

    async fn category(handler: &JwtTokenHandler, token: String) -> FailureCategory {
        handler
            .authenticate(&bearer(token))
            .await
            .unwrap_err()
            .category()
    }

    #[tokio::test]
    async fn valid_token_yields_principal_and_metadata() {
        let handler = handler();
        let claims = TokenClaims::new("alice", chrono::Duration::minutes(5))
            .unwrap()
            .with_jti("t-1")
            .with_claim("roles", vec!["admin", "ops"])
            .with_claim("mail", "alice@example.com");
        let token = handler.issue(&claims).unwrap();

        let result = handler.authenticate(&bearer(token)).await.unwrap();

        assert_eq!(result.handler_name(), "jwt");
        assert_eq!(result.principal().id(), "alice");
        assert_eq!(
            result.principal().attributes()["roles"],
            vec![Value::from("admin"), Value::from("ops")]
        );
        assert_eq!(
            result.principal().attribute("mail"),
            Some(&Value::from("alice@example.com"))
        );
        assert_eq!(result.metadata()["jti"], Value::from("t-1"));
        assert_eq!(result.metadata()["exp"], Value::from(claims.exp));
    }

    #[tokio::test]
    async fn expired_token_is_credential_expired() {
        let handler = handler();
        let claims = TokenClaims::new("alice", chrono::Duration::minutes(-10)).unwrap();
        let token = handler.issue(&claims).unwrap();

        assert_eq!(category(&handler, token).await, FailureCategory::CredentialExpired);
    }

    #[tokio::test]
    async fn forged_or_malformed_token_is_bad_credentials() {
        let handler = handler();
        let forger =
            JwtTokenHandler::new(JwtConfig::new(Secret::new("someone-else".to_string())));
        let claims = TokenClaims::new("alice", chrono::Duration::minutes(5)).unwrap();

        let forged = forger.issue(&claims).unwrap();
        assert_eq!(category(&handler, forged).await, FailureCategory::BadCredentials);
        assert_eq!(
            category(&handler, "not.a.jwt".to_string()).await,
            FailureCategory::BadCredentials
        );
    }

    #[tokio::test]
    async fn issuer_is_checked_when_configured() {
        let handler = JwtTokenHandler::new(
            JwtConfig::new(Secret::new("top-secret-signing-key".to_string())).with_issuer("warden"),
        );
        let claims = TokenClaims::new("alice", chrono::Duration::minutes(5)).unwrap();

        let foreign = handler.issue(&claims.clone().with_issuer("elsewhere")).unwrap();
        assert_eq!(category(&handler, foreign).await, FailureCategory::BadCredentials);

        let own = handler.issue(&claims.with_issuer("warden")).unwrap();
        let result = handler.authenticate(&bearer(own)).await.unwrap();
        assert_eq!(result.metadata()["iss"], Value::from("warden"));
    }

    #[tokio::test]
    async fn revoked_token_is_account_disabled() {
        let handler = handler();
        let claims = TokenClaims::new("alice", chrono::Duration::minutes(5))
            .unwrap()
            .with_jti("t-2");
        let token = handler.issue(&claims).unwrap();

        handler.revoke("t-2");

        assert!(handler.is_revoked("t-2"));
        assert_eq!(category(&handler, token).await, FailureCategory::AccountDisabled);
    }

    #[test]
    fn supports_only_tokens() {
        let handler = handler();
        assert!(handler.supports(&Credential::token("abc")));
        assert!(!handler.supports(&Credential::username_password("alice", "secret")));
    }
}
