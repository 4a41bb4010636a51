pub mod config;
pub mod handlers;
pub mod telemetry;

pub use config::{ExecutionSetting, PolicyKind, PolicySettings, Settings, SettingsError};
pub use handlers::{
    AccountStoreError, InMemoryPasswordHandler, JwtConfig, JwtTokenHandler, NewAccount,
    TokenClaims, TokenError,
};
pub use telemetry::init_tracing;
