pub mod in_memory_password;
pub mod jwt_token;

pub use in_memory_password::{AccountStoreError, InMemoryPasswordHandler, NewAccount};
pub use jwt_token::{JwtConfig, JwtTokenHandler, TokenClaims, TokenError};
