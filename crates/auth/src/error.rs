// Error taxonomy for the gateway security core
// Decision: One enum per engine so callers can match exhaustively on what that engine can produce
// Decision: Variants carry no attacker-supplied data; the HTTP edge maps them to generic responses

use std::time::Duration;
use thiserror::Error;

use crate::principal::Role;

/// Credential codec failures, in the order they are checked
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Signature does not match the token contents
    #[error("token signature is invalid")]
    InvalidSignature,

    /// Signature is valid but the token is past its expiry
    #[error("token has expired")]
    Expired,

    /// Token is not a well-formed HS256 token with the expected claims
    #[error("token is malformed")]
    Malformed,

    /// Token could not be produced
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Authentication engine failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Unknown user or wrong password (deliberately indistinguishable)
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is disabled")]
    AccountDisabled,

    /// Token subject no longer exists in the identity store
    #[error("identity no longer exists")]
    IdentityGone,

    /// Identity store did not answer in time or failed
    #[error("identity lookup timed out")]
    LookupTimeout,

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Authorization engine denials
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    /// Caller is authenticated but lacks the role the matching rule requires
    #[error("insufficient role: {required} required")]
    InsufficientRole { required: Role },

    #[error("authentication required")]
    Unauthenticated,
}

/// Identity store adapter failures
#[derive(Debug, Error)]
pub enum IdentityStoreError {
    #[error("identity store request failed: {0}")]
    Transport(String),

    #[error("identity store returned unexpected status {0}")]
    UnexpectedStatus(u16),

    #[error("identity store returned an invalid record: {0}")]
    InvalidRecord(String),
}

/// Startup configuration problems. Any of these must stop the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("signing secret is missing")]
    MissingSecret,

    #[error("signing secret must be at least {min} bytes, got {actual}")]
    WeakSecret { min: usize, actual: usize },

    #[error("token TTL must be greater than zero")]
    ZeroTtl,

    #[error("token TTL must be at most {max:?}, got {actual:?}")]
    TtlTooLong { max: Duration, actual: Duration },

    #[error("lookup timeout must be greater than zero, got {0:?}")]
    InvalidTimeout(Duration),

    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPathPattern { pattern: String, reason: String },

    #[error("invalid method pattern '{0}'")]
    InvalidMethod(String),

    #[error("invalid authorization rules: {0}")]
    InvalidRules(String),

    #[error("invalid identity seed: {0}")]
    InvalidIdentitySeed(String),
}
