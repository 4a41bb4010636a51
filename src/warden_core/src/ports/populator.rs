use crate::domain::{authentication::Authentication, credential::Credential};

/// Adds attributes describing an accepted authentication attempt.
pub trait AuthenticationMetadataPopulator: Send + Sync {
    /// Whether this populator applies to the given credential. A populator runs
    /// once per attempt if it supports at least one presented credential.
    fn supports(&self, _credential: &Credential) -> bool {
        true
    }

    fn populate(&self, authentication: &mut Authentication, credentials: &[Credential]);
}
