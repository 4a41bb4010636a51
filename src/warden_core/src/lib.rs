pub mod domain;
pub mod error;
pub mod ports;
pub mod strategies;

// Re-export commonly used types for convenience
pub use domain::{
    authentication::Authentication,
    credential::{Credential, CredentialKind},
    failure::{FailureCategory, HandlerFailure},
    handler_map::HandlerMap,
    handler_result::HandlerResult,
    principal::{Attributes, Principal},
};

pub use error::{
    AuthenticationError, AuthenticationFailure, FailureKind, NO_SUPPORTED_HANDLERS_MESSAGE,
};

pub use ports::{
    handler::{AuthenticationHandler, HandlerError, PrincipalResolver, is_valid_handler_name},
    populator::AuthenticationMetadataPopulator,
};

pub use strategies::policy::{
    AllMustSucceed, AnySucceeded, AuthenticationPolicy, Decision, PrincipalMerger,
    RequiredHandlers,
};
