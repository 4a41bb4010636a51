use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;
use warden_core::{AuthenticationHandler, Credential, PrincipalResolver, is_valid_handler_name};

use crate::attempt::panic_message;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Handler already registered: {0}")]
    DuplicateHandler(String),
    #[error("Invalid handler name: {0:?}")]
    InvalidHandlerName(String),
}

/// A handler plus the optional resolver applied to its principal.
#[derive(Clone)]
pub struct RegisteredHandler {
    handler: Arc<dyn AuthenticationHandler>,
    resolver: Option<Arc<dyn PrincipalResolver>>,
}

impl RegisteredHandler {
    pub fn name(&self) -> &str {
        self.handler.name()
    }

    pub fn handler(&self) -> &Arc<dyn AuthenticationHandler> {
        &self.handler
    }

    pub fn resolver(&self) -> Option<&Arc<dyn PrincipalResolver>> {
        self.resolver.as_ref()
    }

    /// Asks the handler whether it takes `credential`. A panic comes back as
    /// its message.
    pub(crate) fn support(&self, credential: &Credential) -> Result<bool, String> {
        panic::catch_unwind(AssertUnwindSafe(|| self.handler.supports(credential)))
            .map_err(|panic| panic_message(panic.as_ref()))
    }
}

impl fmt::Debug for RegisteredHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredHandler")
            .field("name", &self.name())
            .field("has_resolver", &self.resolver.is_some())
            .finish()
    }
}

/// Ordered set of handlers, unique by name.
///
/// Registration order decides dispatch order, and with it which success is
/// "first" when principals are merged.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: Vec<RegisteredHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H) -> Result<&mut Self, RegistryError>
    where
        H: AuthenticationHandler + 'static,
    {
        self.register_shared(Arc::new(handler), None)
    }

    pub fn register_with_resolver<H, R>(
        &mut self,
        handler: H,
        resolver: R,
    ) -> Result<&mut Self, RegistryError>
    where
        H: AuthenticationHandler + 'static,
        R: PrincipalResolver + 'static,
    {
        self.register_shared(Arc::new(handler), Some(Arc::new(resolver)))
    }

    /// Registers a handler that is also held elsewhere.
    pub fn register_shared(
        &mut self,
        handler: Arc<dyn AuthenticationHandler>,
        resolver: Option<Arc<dyn PrincipalResolver>>,
    ) -> Result<&mut Self, RegistryError> {
        let name = handler.name();
        if !is_valid_handler_name(name) {
            return Err(RegistryError::InvalidHandlerName(name.to_string()));
        }
        if self.contains(name) {
            return Err(RegistryError::DuplicateHandler(name.to_string()));
        }

        tracing::debug!(handler = name, "Registered authentication handler");
        self.handlers.push(RegisteredHandler { handler, resolver });
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.iter().any(|entry| entry.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(RegisteredHandler::name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handlers supporting `credential`, in registration order. A handler
    /// whose check panics is left out.
    pub fn resolve(&self, credential: &Credential) -> Vec<&RegisteredHandler> {
        self.handlers
            .iter()
            .filter(|entry| entry.support(credential) == Ok(true))
            .collect()
    }

    /// Like [`resolve`](Self::resolve), but keeps handlers whose check
    /// panicked, paired with the panic message, so they can be reported as
    /// failed attempts.
    pub(crate) fn candidates(
        &self,
        credential: &Credential,
    ) -> Vec<(&RegisteredHandler, Option<String>)> {
        self.handlers
            .iter()
            .filter_map(|entry| match entry.support(credential) {
                Ok(true) => Some((entry, None)),
                Ok(false) => None,
                Err(message) => Some((entry, Some(message))),
            })
            .collect()
    }
}
