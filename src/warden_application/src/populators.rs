use std::collections::BTreeSet;

use warden_core::{Authentication, AuthenticationMetadataPopulator, Credential};

pub const SUCCESSFUL_HANDLERS_ATTRIBUTE: &str = "successfulAuthenticationHandlers";
pub const AUTHENTICATION_METHOD_ATTRIBUTE: &str = "authenticationMethod";

/// Records the names of the handlers that succeeded.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuccessfulHandlersPopulator;

impl AuthenticationMetadataPopulator for SuccessfulHandlersPopulator {
    fn populate(&self, authentication: &mut Authentication, _credentials: &[Credential]) {
        let names: Vec<String> = authentication
            .successes()
            .keys()
            .map(str::to_string)
            .collect();
        for name in names {
            authentication.add_attribute(SUCCESSFUL_HANDLERS_ATTRIBUTE, name);
        }
    }
}

/// Records the kinds of credential that were presented, once each.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialKindPopulator;

impl AuthenticationMetadataPopulator for CredentialKindPopulator {
    fn populate(&self, authentication: &mut Authentication, credentials: &[Credential]) {
        let kinds: BTreeSet<String> = credentials
            .iter()
            .map(|credential| credential.kind().to_string())
            .collect();
        for kind in kinds {
            authentication.add_attribute(AUTHENTICATION_METHOD_ATTRIBUTE, kind);
        }
    }
}
