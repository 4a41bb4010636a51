use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{
    credential::CredentialKind,
    failure::HandlerFailure,
    handler_map::HandlerMap,
    handler_result::HandlerResult,
    principal::{Attributes, Principal},
};

/// Successful outcome of an authentication attempt.
///
/// Authentication attributes describe the attempt itself (which handlers
/// succeeded, which methods were used) and are distinct from the principal's
/// attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Authentication {
    attempt_id: Uuid,
    authenticated_at: DateTime<Utc>,
    principal: Principal,
    attributes: Attributes,
    credential_kinds: Vec<CredentialKind>,
    successes: HandlerMap<HandlerResult>,
    failures: HandlerMap<HandlerFailure>,
}

impl Authentication {
    pub fn new(
        attempt_id: Uuid,
        principal: Principal,
        credential_kinds: Vec<CredentialKind>,
        successes: HandlerMap<HandlerResult>,
        failures: HandlerMap<HandlerFailure>,
    ) -> Self {
        Self {
            attempt_id,
            authenticated_at: Utc::now(),
            principal,
            attributes: Attributes::new(),
            credential_kinds,
            successes,
            failures,
        }
    }

    /// Appends values to an authentication attribute.
    pub fn add_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn authenticated_at(&self) -> DateTime<Utc> {
        self.authenticated_at
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn credential_kinds(&self) -> &[CredentialKind] {
        &self.credential_kinds
    }

    pub fn successes(&self) -> &HandlerMap<HandlerResult> {
        &self.successes
    }

    pub fn failures(&self) -> &HandlerMap<HandlerFailure> {
        &self.failures
    }
}
