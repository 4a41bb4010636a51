use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;
use warden_core::{
    Authentication, AuthenticationError, AuthenticationFailure, AuthenticationMetadataPopulator,
    AuthenticationPolicy, Credential, Decision,
};

use crate::aggregate::Aggregate;
use crate::attempt::{self, Attempt, Completed};
use crate::config::{ExecutionMode, ManagerConfig};
use crate::registry::HandlerRegistry;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManagerBuildError {
    #[error("Policy refers to unregistered handler: {0}")]
    UnknownHandler(String),
}

/// Runs every compatible handler against the presented credentials and lets
/// the policy decide.
///
/// One manager is meant to be shared by many concurrent calls. The result maps
/// of a call are local to it; only the concurrency limiter is shared.
pub struct AuthenticationManager {
    registry: HandlerRegistry,
    policy: Arc<dyn AuthenticationPolicy>,
    populators: Vec<Arc<dyn AuthenticationMetadataPopulator>>,
    config: ManagerConfig,
    permits: Arc<Semaphore>,
}

impl AuthenticationManager {
    pub fn new<P>(
        registry: HandlerRegistry,
        policy: P,
        config: ManagerConfig,
    ) -> Result<Self, ManagerBuildError>
    where
        P: AuthenticationPolicy + 'static,
    {
        Self::with_shared_policy(registry, Arc::new(policy), config)
    }

    pub fn with_shared_policy(
        registry: HandlerRegistry,
        policy: Arc<dyn AuthenticationPolicy>,
        config: ManagerConfig,
    ) -> Result<Self, ManagerBuildError> {
        let unknown = policy
            .referenced_handlers()
            .into_iter()
            .find(|name| !registry.contains(name))
            .map(str::to_string);
        if let Some(name) = unknown {
            return Err(ManagerBuildError::UnknownHandler(name));
        }

        let permits = config.max_concurrency.clamp(1, Semaphore::MAX_PERMITS);
        Ok(Self {
            registry,
            policy,
            populators: Vec::new(),
            config,
            permits: Arc::new(Semaphore::new(permits)),
        })
    }

    #[must_use]
    pub fn with_populator<M>(mut self, populator: M) -> Self
    where
        M: AuthenticationMetadataPopulator + 'static,
    {
        self.populators.push(Arc::new(populator));
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Authenticates the credentials, in order.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::Rejected`] when no handler supports any
    /// credential or when the policy rejects the gathered outcomes.
    pub async fn authenticate(
        &self,
        credentials: &[Credential],
    ) -> Result<Authentication, AuthenticationError> {
        self.authenticate_with_cancellation(credentials, CancellationToken::new())
            .await
    }

    /// Like [`authenticate`](Self::authenticate), but gives up as soon as
    /// `cancel` fires: in-flight handlers are aborted, their results dropped,
    /// and [`AuthenticationError::Cancelled`] is returned.
    #[tracing::instrument(
        name = "AuthenticationManager::authenticate",
        skip_all,
        fields(attempt_id = tracing::field::Empty, credentials = credentials.len())
    )]
    pub async fn authenticate_with_cancellation(
        &self,
        credentials: &[Credential],
        cancel: CancellationToken,
    ) -> Result<Authentication, AuthenticationError> {
        let attempt_id = Uuid::new_v4();
        tracing::Span::current().record("attempt_id", tracing::field::display(attempt_id));

        let plan = self.plan(credentials);
        if plan.is_empty() {
            tracing::info!("No supported authentication handlers for the presented credentials");
            return Err(AuthenticationFailure::no_handlers().into());
        }

        let mut aggregate = Aggregate::new(&plan);
        match self.config.execution {
            ExecutionMode::Sequential => self.run_sequential(plan, &mut aggregate, &cancel).await?,
            ExecutionMode::Concurrent => self.run_concurrent(plan, &mut aggregate, &cancel).await?,
        }

        let (successes, failures) = aggregate.maps();
        match self.policy.resolve(&successes, &failures) {
            Decision::Accept(principal) => {
                tracing::info!(
                    principal = principal.id(),
                    successes = successes.len(),
                    failures = failures.len(),
                    "Authentication accepted"
                );
                let kinds = credentials.iter().map(Credential::kind).collect();
                let mut authentication =
                    Authentication::new(attempt_id, principal, kinds, successes, failures);
                self.populate(&mut authentication, credentials);
                Ok(authentication)
            }
            Decision::Reject => {
                tracing::info!(
                    successes = successes.len(),
                    failures = failures.len(),
                    "Authentication rejected by policy"
                );
                Err(AuthenticationFailure::new(failures, successes).into())
            }
        }
    }

    fn plan(&self, credentials: &[Credential]) -> Vec<Attempt> {
        let mut plan = Vec::new();
        for credential in credentials {
            let handlers = self.registry.candidates(credential);
            if handlers.is_empty() {
                tracing::debug!(
                    credential = credential.id(),
                    kind = %credential.kind(),
                    "No handler supports credential"
                );
                continue;
            }

            let credential = Arc::new(credential.clone());
            for (handler, fault) in handlers {
                let index = plan.len();
                plan.push(Attempt {
                    index,
                    credential: Arc::clone(&credential),
                    handler: handler.clone(),
                    fault,
                });
            }
        }
        plan
    }

    async fn run_sequential(
        &self,
        plan: Vec<Attempt>,
        aggregate: &mut Aggregate,
        cancel: &CancellationToken,
    ) -> Result<(), AuthenticationError> {
        for attempt in plan {
            let completed = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!("Authentication cancelled by caller");
                    return Err(AuthenticationError::Cancelled);
                }
                completed = attempt::run_bounded(
                    Arc::clone(&self.permits),
                    attempt,
                    self.config.handler_timeout,
                ) => completed,
            };

            let Some(completed) = completed else {
                continue;
            };
            aggregate.record(completed);
            if self.is_settled(aggregate) {
                break;
            }
        }
        Ok(())
    }

    async fn run_concurrent(
        &self,
        plan: Vec<Attempt>,
        aggregate: &mut Aggregate,
        cancel: &CancellationToken,
    ) -> Result<(), AuthenticationError> {
        let stop_dispatch = cancel.child_token();
        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::with_capacity(plan.len());

        for attempt in plan {
            let permits = Arc::clone(&self.permits);
            let stop = stop_dispatch.clone();
            let timeout = self.config.handler_timeout;
            let owner = (attempt.index, attempt.handler.name().to_string());
            let handle = tasks.spawn(
                async move {
                    // Only attempts still waiting for a permit observe the stop
                    // signal; running ones finish on their own.
                    let permit = tokio::select! {
                        biased;
                        () = stop.cancelled() => None,
                        permit = permits.acquire_owned() => permit.ok(),
                    };
                    let _permit = permit?;
                    Some(attempt::run(attempt, timeout).await)
                }
                .instrument(tracing::Span::current()),
            );
            spawned.insert(handle.id(), owner);
        }

        loop {
            let joined = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tasks.abort_all();
                    tracing::info!("Authentication cancelled by caller");
                    return Err(AuthenticationError::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };

            let Some(joined) = joined else {
                return Ok(());
            };
            if self.record_joined(joined, &mut spawned, aggregate) {
                stop_dispatch.cancel();
                tasks.detach_all();
                return Ok(());
            }
        }
    }

    /// Files one joined task into the aggregate and reports whether the
    /// decision is settled. A task that died is filed as an `Unknown` failure
    /// of the handler it was running.
    fn record_joined(
        &self,
        joined: Result<Option<Completed>, JoinError>,
        spawned: &mut HashMap<task::Id, (usize, String)>,
        aggregate: &mut Aggregate,
    ) -> bool {
        let completed = match joined {
            Ok(Some(completed)) => completed,
            Ok(None) => return false,
            Err(error) => {
                let Some((index, handler_name)) = spawned.remove(&error.id()) else {
                    tracing::error!(%error, "Untracked authentication task failed");
                    return false;
                };
                let failure = attempt::lost(&handler_name, &error);
                Completed {
                    index,
                    handler_name,
                    outcome: Err(failure),
                }
            }
        };
        aggregate.record(completed);
        self.is_settled(aggregate)
    }

    fn is_settled(&self, aggregate: &Aggregate) -> bool {
        let settled = self.config.fail_fast && aggregate.is_settled(self.policy.as_ref());
        if settled {
            tracing::debug!("Policy decision settled; skipping remaining handlers");
        }
        settled
    }

    fn populate(&self, authentication: &mut Authentication, credentials: &[Credential]) {
        for populator in &self.populators {
            if credentials.iter().any(|credential| populator.supports(credential)) {
                populator.populate(authentication, credentials);
            }
        }
    }
}

impl fmt::Debug for AuthenticationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationManager")
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .field("populators", &self.populators.len())
            .field("config", &self.config)
            .finish()
    }
}
