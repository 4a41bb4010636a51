//! Execution of a single (credential, handler) pair.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use warden_core::{Credential, FailureCategory, HandlerFailure, HandlerResult};

use crate::registry::RegisteredHandler;

/// One planned handler invocation. `index` is the dispatch position: credential
/// order first, then registration order. `fault` holds the panic message when
/// the handler already panicked while being matched to the credential.
pub(crate) struct Attempt {
    pub(crate) index: usize,
    pub(crate) credential: Arc<Credential>,
    pub(crate) handler: RegisteredHandler,
    pub(crate) fault: Option<String>,
}

pub(crate) struct Completed {
    pub(crate) index: usize,
    pub(crate) handler_name: String,
    pub(crate) outcome: Result<HandlerResult, HandlerFailure>,
}

/// Waits for a limiter permit, then runs the attempt. `None` means the
/// limiter was closed and the attempt never ran.
pub(crate) async fn run_bounded(
    permits: Arc<Semaphore>,
    attempt: Attempt,
    default_timeout: Duration,
) -> Option<Completed> {
    let _permit = permits.acquire_owned().await.ok()?;
    Some(run(attempt, default_timeout).await)
}

/// Runs the handler under its timeout. Errors, panics and timeouts all come
/// back as a failure; nothing escapes.
pub(crate) async fn run(attempt: Attempt, default_timeout: Duration) -> Completed {
    let name = attempt.handler.name().to_string();
    let outcome = match attempt.fault.as_deref() {
        Some(message) => Err(panicked(&name, message)),
        None => guarded(&attempt, &name, default_timeout).await,
    };

    match &outcome {
        Ok(result) => tracing::debug!(
            handler = %name,
            credential = attempt.credential.id(),
            principal = result.principal().id(),
            "Handler succeeded"
        ),
        Err(failure) => tracing::debug!(
            handler = %name,
            credential = attempt.credential.id(),
            category = %failure.category(),
            "Handler failed"
        ),
    }

    Completed {
        index: attempt.index,
        handler_name: name,
        outcome,
    }
}

/// Failure recorded for a handler whose task died without reporting.
pub(crate) fn lost(handler_name: &str, reason: impl fmt::Display) -> HandlerFailure {
    tracing::error!(handler = handler_name, %reason, "Authentication task failed");
    HandlerFailure::with_message(
        handler_name,
        FailureCategory::Unknown,
        format!("handler task failed: {reason}"),
    )
}

async fn guarded(
    attempt: &Attempt,
    name: &str,
    default_timeout: Duration,
) -> Result<HandlerResult, HandlerFailure> {
    let handler = attempt.handler.handler();
    let timeout = match panic::catch_unwind(AssertUnwindSafe(|| handler.timeout())) {
        Ok(timeout) => timeout.unwrap_or(default_timeout),
        Err(panic) => return Err(panicked(name, &panic_message(panic.as_ref()))),
    };

    let work = AssertUnwindSafe(invoke(&attempt.handler, &attempt.credential)).catch_unwind();
    match tokio::time::timeout(timeout, work).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(panic)) => Err(panicked(name, &panic_message(panic.as_ref()))),
        Err(_) => {
            tracing::warn!(handler = name, ?timeout, "Authentication handler timed out");
            Err(HandlerFailure::with_message(
                name,
                FailureCategory::HandlerUnavailable,
                format!("timed out after {}ms", timeout.as_millis()),
            ))
        }
    }
}

fn panicked(name: &str, message: &str) -> HandlerFailure {
    tracing::error!(handler = name, panic = message, "Authentication handler panicked");
    HandlerFailure::with_message(
        name,
        FailureCategory::Unknown,
        format!("handler panicked: {message}"),
    )
}

async fn invoke(
    handler: &RegisteredHandler,
    credential: &Credential,
) -> Result<HandlerResult, HandlerFailure> {
    let name = handler.name();
    let mut result = handler
        .handler()
        .authenticate(credential)
        .await
        .map_err(|e| e.into_failure(name))?;

    if result.handler_name() != name {
        tracing::warn!(
            handler = name,
            reported = result.handler_name(),
            "Handler result names another handler; filing it under the registered name"
        );
        result = result.with_handler_name(name);
    }

    let Some(resolver) = handler.resolver() else {
        return Ok(result);
    };

    let principal = resolver
        .resolve(credential, result.principal())
        .await
        .map_err(|e| e.into_failure(name))?;
    Ok(result.with_principal(principal))
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
