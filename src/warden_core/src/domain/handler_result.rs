use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{credential::CredentialKind, principal::Principal};

/// Success record of one handler attempt. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerResult {
    handler_name: String,
    credential_kind: CredentialKind,
    principal: Principal,
    metadata: BTreeMap<String, Value>,
}

impl HandlerResult {
    pub fn new(
        handler_name: impl Into<String>,
        credential_kind: CredentialKind,
        principal: Principal,
    ) -> Self {
        Self {
            handler_name: handler_name.into(),
            credential_kind,
            principal,
            metadata: BTreeMap::new(),
        }
    }

    /// Attaches credential-specific claims (token ids, certificate serials, ...).
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub fn credential_kind(&self) -> &CredentialKind {
        &self.credential_kind
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    /// Copy of this result with the principal swapped out, used after a
    /// principal resolver has run.
    pub fn with_principal(&self, principal: Principal) -> Self {
        Self {
            handler_name: self.handler_name.clone(),
            credential_kind: self.credential_kind.clone(),
            principal,
            metadata: self.metadata.clone(),
        }
    }

    /// The same result filed under another handler name.
    #[must_use]
    pub fn with_handler_name(mut self, handler_name: impl Into<String>) -> Self {
        self.handler_name = handler_name.into();
        self
    }
}
