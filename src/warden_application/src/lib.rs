mod aggregate;
mod attempt;
pub mod config;
pub mod manager;
pub mod populators;
pub mod registry;

pub use config::{DEFAULT_HANDLER_TIMEOUT, DEFAULT_MAX_CONCURRENCY, ExecutionMode, ManagerConfig};
pub use manager::{AuthenticationManager, ManagerBuildError};
pub use populators::{
    AUTHENTICATION_METHOD_ATTRIBUTE, CredentialKindPopulator, SUCCESSFUL_HANDLERS_ATTRIBUTE,
    SuccessfulHandlersPopulator,
};
pub use registry::{HandlerRegistry, RegisteredHandler, RegistryError};
