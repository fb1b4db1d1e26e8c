// Zakura gateway security core
// Decision: Framework-free engines; the gateway crate wires them into axum middleware
// Decision: Everything here is immutable after startup and safe to share across requests

pub mod authn;
pub mod authz;
pub mod config;
pub mod error;
pub mod identity;
pub mod password;
pub mod principal;
pub mod token;

pub use authn::Authenticator;
pub use authz::{AccessPolicy, Decision, RuleSet};
pub use config::{AuthConfig, JwtConfig};
pub use error::{AuthError, AuthzError, ConfigError, IdentityStoreError, TokenError};
pub use identity::{IdentityRecord, IdentityStore, InMemoryIdentityStore, RemoteIdentityStore};
pub use principal::{Principal, Role, SecurityContext};
pub use token::{IssuedToken, TokenClaims, TokenCodec};
