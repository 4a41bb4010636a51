use std::sync::Arc;
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use warden_application::{
    AuthenticationManager, DEFAULT_HANDLER_TIMEOUT, DEFAULT_MAX_CONCURRENCY, ExecutionMode,
    HandlerRegistry, ManagerBuildError, ManagerConfig,
};
use warden_core::{AllMustSucceed, AnySucceeded, AuthenticationPolicy, RequiredHandlers};

use super::constants::{self, env};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Config(#[from] ConfigError),
    #[error("Settings do not match the registered handlers: {0}")]
    Manager(#[from] ManagerBuildError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Any,
    All,
    Required,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    pub kind: PolicyKind,
    /// Only read for [`PolicyKind::Required`].
    pub handlers: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionSetting {
    Sequential,
    #[default]
    Concurrent,
}

impl From<ExecutionSetting> for ExecutionMode {
    fn from(value: ExecutionSetting) -> Self {
        match value {
            ExecutionSetting::Sequential => ExecutionMode::Sequential,
            ExecutionSetting::Concurrent => ExecutionMode::Concurrent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub policy: PolicySettings,
    pub authoritative_handler: Option<String>,
    pub fail_fast: bool,
    pub max_concurrency: usize,
    pub handler_timeout_ms: u64,
    pub execution: ExecutionSetting,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            policy: PolicySettings::default(),
            authoritative_handler: None,
            fail_fast: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            handler_timeout_ms: u64::try_from(DEFAULT_HANDLER_TIMEOUT.as_millis())
                .unwrap_or(u64::MAX),
            execution: ExecutionSetting::default(),
        }
    }
}

impl Settings {
    /// Reads `.env`, the optional `config/warden` file, then `WARDEN__*`
    /// environment variables, later sources overriding earlier ones.
    pub fn load() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();
        Self::from_builder(
            Config::builder().add_source(File::with_name(constants::CONFIG_FILE).required(false)),
        )
    }

    pub(crate) fn from_builder(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<Self, SettingsError> {
        let settings = builder
            .add_source(
                Environment::with_prefix(env::PREFIX)
                    .separator(env::SEPARATOR)
                    .list_separator(env::LIST_SEPARATOR)
                    .with_list_parse_key("policy.handlers")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig::default()
            .with_execution(self.execution.into())
            .with_fail_fast(self.fail_fast)
            .with_max_concurrency(self.max_concurrency)
            .with_handler_timeout(Duration::from_millis(self.handler_timeout_ms))
    }

    pub fn policy(&self) -> Arc<dyn AuthenticationPolicy> {
        let authority = self.authoritative_handler.as_deref();
        match self.policy.kind {
            PolicyKind::Any => {
                let policy = AnySucceeded::new();
                Arc::new(match authority {
                    Some(name) => policy.with_authoritative_handler(name),
                    None => policy,
                })
            }
            PolicyKind::All => {
                let policy = AllMustSucceed::new();
                Arc::new(match authority {
                    Some(name) => policy.with_authoritative_handler(name),
                    None => policy,
                })
            }
            PolicyKind::Required => {
                let policy = RequiredHandlers::new(self.policy.handlers.iter().cloned());
                Arc::new(match authority {
                    Some(name) => policy.with_authoritative_handler(name),
                    None => policy,
                })
            }
        }
    }

    /// Builds a manager over `registry`. Fails when the policy names a handler
    /// that was never registered.
    #[tracing::instrument(name = "Building authentication manager", skip_all)]
    pub fn build_manager(
        &self,
        registry: HandlerRegistry,
    ) -> Result<AuthenticationManager, SettingsError> {
        let manager = AuthenticationManager::with_shared_policy(
            registry,
            self.policy(),
            self.manager_config(),
        )?;
        tracing::info!(
            policy = ?self.policy.kind,
            execution = ?self.execution,
            fail_fast = self.fail_fast,
            "Authentication manager ready"
        );
        Ok(manager)
    }
}
