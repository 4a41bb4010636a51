use std::collections::HashMap;
use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordVerifier, Version,
    password_hash::{self, PasswordHasher, SaltString, rand_core},
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use warden_core::{
    Attributes, AuthenticationHandler, Credential, CredentialKind, HandlerError, HandlerResult,
    Principal,
};

use crate::config::constants::{argon2 as cost, handlers::PASSWORD_HANDLER_NAME};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountStoreError {
    #[error("Account already exists")]
    AccountAlreadyExists,
    #[error("Account not found")]
    AccountNotFound,
    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// Account to be stored; the password is hashed on insert.
#[derive(Debug)]
pub struct NewAccount {
    username: String,
    password: Secret<String>,
    disabled: bool,
    password_expired: bool,
    attributes: Attributes,
}

impl NewAccount {
    pub fn new(username: impl Into<String>, password: Secret<String>) -> Self {
        Self {
            username: username.into(),
            password,
            disabled: false,
            password_expired: false,
            attributes: Attributes::new(),
        }
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    #[must_use]
    pub fn password_expired(mut self) -> Self {
        self.password_expired = true;
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }
}

#[derive(Debug, Clone)]
struct Account {
    password_hash: Secret<String>,
    disabled: bool,
    password_expired: bool,
    attributes: Attributes,
}

/// Username/password handler over an in-process account table with argon2id
/// hashes.
#[derive(Debug, Clone)]
pub struct InMemoryPasswordHandler {
    name: String,
    accounts: Arc<RwLock<HashMap<String, Account>>>,
}

impl Default for InMemoryPasswordHandler {
    fn default() -> Self {
        Self::new(PASSWORD_HANDLER_NAME)
    }
}

impl InMemoryPasswordHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accounts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn add_account(&self, account: NewAccount) -> Result<(), AccountStoreError> {
        if self.accounts.read().await.contains_key(&account.username) {
            return Err(AccountStoreError::AccountAlreadyExists);
        }

        let password_hash = compute_password_hash(account.password)
            .await
            .map_err(AccountStoreError::Hashing)?;

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.username) {
            return Err(AccountStoreError::AccountAlreadyExists);
        }
        accounts.insert(
            account.username,
            Account {
                password_hash,
                disabled: account.disabled,
                password_expired: account.password_expired,
                attributes: account.attributes,
            },
        );
        Ok(())
    }

    pub async fn set_disabled(&self, username: &str, disabled: bool) -> Result<(), AccountStoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(username)
            .ok_or(AccountStoreError::AccountNotFound)?;
        account.disabled = disabled;
        Ok(())
    }

    pub async fn remove_account(&self, username: &str) -> Result<(), AccountStoreError> {
        let mut accounts = self.accounts.write().await;
        accounts
            .remove(username)
            .ok_or(AccountStoreError::AccountNotFound)?;
        Ok(())
    }
}

#[async_trait]
impl AuthenticationHandler for InMemoryPasswordHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::UsernamePassword { .. })
    }

    #[tracing::instrument(name = "Password authentication", skip_all, fields(handler = %self.name))]
    async fn authenticate(&self, credential: &Credential) -> Result<HandlerResult, HandlerError> {
        let Credential::UsernamePassword { username, password } = credential else {
            return Err(HandlerError::Unexpected(format!(
                "unsupported credential kind {}",
                credential.kind()
            )));
        };

        // Cloned so the table is not locked while hashing.
        let account = self
            .accounts
            .read()
            .await
            .get(username)
            .cloned()
            .ok_or(HandlerError::AccountNotFound)?;

        let matches = verify_password_hash(account.password_hash, password.clone())
            .await
            .map_err(HandlerError::Unexpected)?;
        if !matches {
            return Err(HandlerError::BadCredentials);
        }
        if account.disabled {
            return Err(HandlerError::AccountDisabled);
        }
        if account.password_expired {
            return Err(HandlerError::CredentialExpired);
        }

        Ok(HandlerResult::new(
            &self.name,
            CredentialKind::UsernamePassword,
            Principal::with_attributes(username.clone(), account.attributes),
        ))
    }
}

fn hasher() -> Result<Argon2<'static>, String> {
    let params = Params::new(cost::MEMORY_COST_KIB, cost::ITERATIONS, cost::PARALLELISM, None)
        .map_err(|e| e.to_string())?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

#[tracing::instrument(name = "Verify password hash", skip_all)]
async fn verify_password_hash(
    expected_password_hash: Secret<String>,
    password_candidate: Secret<String>,
) -> Result<bool, String> {
    let current_span: tracing::Span = tracing::Span::current();
    tokio::task::spawn_blocking(move || {
        current_span.in_scope(|| {
            let expected_password_hash = PasswordHash::new(expected_password_hash.expose_secret())
                .map_err(|e| e.to_string())?;

            match hasher()?.verify_password(
                password_candidate.expose_secret().as_bytes(),
                &expected_password_hash,
            ) {
                Ok(()) => Ok(true),
                Err(password_hash::Error::Password) => Ok(false),
                Err(e) => Err(e.to_string()),
            }
        })
    })
    .await
    .map_err(|e| e.to_string())?
}

#[tracing::instrument(name = "Computing password hash", skip_all)]
async fn compute_password_hash(password: Secret<String>) -> Result<Secret<String>, String> {
    let current_span: tracing::Span = tracing::Span::current();
    tokio::task::spawn_blocking(move || {
        current_span.in_scope(move || {
            let salt = SaltString::generate(rand_core::OsRng);
            hasher()?
                .hash_password(password.expose_secret().as_bytes(), &salt)
                .map(|hash| Secret::new(hash.to_string()))
                .map_err(|e| e.to_string())
        })
    })
    .await
    .map_err(|e| e.to_string())?
}
