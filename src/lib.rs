//! # Warden - Authentication Orchestration
//!
//! Facade crate re-exporting the public API of the warden components.
//! Register handlers, pick a policy, and let the [`AuthenticationManager`]
//! run every compatible handler against the presented credentials.
//!
//! ## Structure
//!
//! - **Core domain types**: `Credential`, `Principal`, `HandlerResult`, `Authentication`, etc.
//! - **Ports**: `AuthenticationHandler`, `PrincipalResolver`, `AuthenticationMetadataPopulator`
//! - **Policies**: `AnySucceeded`, `AllMustSucceed`, `RequiredHandlers`
//! - **Orchestration**: `HandlerRegistry`, `ManagerConfig`, `AuthenticationManager`
//! - **Adapters**: settings loading, tracing setup, password and JWT handlers

// ============================================================================
// Core Domain Types
// ============================================================================

/// Core domain types and value objects
pub mod core {
    pub use warden_core::*;
}

pub use warden_core::{
    Attributes, Authentication, Credential, CredentialKind, FailureCategory, HandlerFailure,
    HandlerMap, HandlerResult, Principal,
};

// ============================================================================
// Errors
// ============================================================================

pub use warden_core::{
    AuthenticationError, AuthenticationFailure, FailureKind, HandlerError,
    NO_SUPPORTED_HANDLERS_MESSAGE,
};
pub use warden_application::{ManagerBuildError, RegistryError};

// ============================================================================
// Ports
// ============================================================================

pub use warden_core::{AuthenticationHandler, AuthenticationMetadataPopulator, PrincipalResolver};

// ============================================================================
// Policies
// ============================================================================

/// Decision rules over handler outcomes
pub mod policies {
    pub use warden_core::{
        AllMustSucceed, AnySucceeded, AuthenticationPolicy, Decision, PrincipalMerger,
        RequiredHandlers,
    };
}

pub use policies::{AllMustSucceed, AnySucceeded, AuthenticationPolicy, Decision, RequiredHandlers};

// ============================================================================
// Orchestration (Application Layer)
// ============================================================================

pub mod application {
    pub use warden_application::*;
}

pub use warden_application::{
    AuthenticationManager, CredentialKindPopulator, ExecutionMode, HandlerRegistry,
    ManagerConfig, SuccessfulHandlersPopulator,
};

// ============================================================================
// Adapters (Infrastructure)
// ============================================================================

/// Infrastructure adapters
pub mod adapters {
    /// Settings loading
    pub mod config {
        pub use warden_adapters::config::*;
    }

    /// Reference authentication handlers
    pub mod handlers {
        pub use warden_adapters::handlers::*;
    }

    pub use warden_adapters::telemetry;
}

pub use warden_adapters::{
    InMemoryPasswordHandler, JwtConfig, JwtTokenHandler, NewAccount, Settings, TokenClaims,
    init_tracing,
};

// ============================================================================
// Re-export common external dependencies
// ============================================================================

/// Re-export async-trait for implementing handler traits
pub use async_trait::async_trait;

/// Re-export secrecy for working with secrets
pub use secrecy::{ExposeSecret, Secret};

/// Re-export for cancelling an authentication call
pub use tokio_util::sync::CancellationToken;
