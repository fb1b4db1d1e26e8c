// Authentication engine
// Decision: Token roles are never trusted; every token authentication re-resolves the identity
//           so disabling an account or revoking a role takes effect before the token expires
// Decision: Every identity store call is bounded by the configured lookup timeout and fails closed
// Decision: Unknown user and wrong password produce the same error and roughly the same latency

use std::sync::Arc;
use std::time::Duration;

use crate::config::AuthConfig;
use crate::error::{AuthError, ConfigError};
use crate::identity::{IdentityRecord, IdentityStore};
use crate::password::{decoy_hash, verify_password_blocking};
use crate::principal::{parse_roles, Principal};
use crate::token::{IssuedToken, TokenCodec};

/// Produces principals from bearer tokens or username/password pairs
#[derive(Clone)]
pub struct Authenticator {
    codec: Arc<TokenCodec>,
    identities: Arc<dyn IdentityStore>,
    lookup_timeout: Duration,
}

impl Authenticator {
    pub fn new(
        codec: Arc<TokenCodec>,
        identities: Arc<dyn IdentityStore>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            codec,
            identities,
            lookup_timeout,
        }
    }

    /// Validate the configuration and build the codec. Errors here are startup-fatal.
    pub fn from_config(
        config: &AuthConfig,
        identities: Arc<dyn IdentityStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(
            Arc::new(TokenCodec::new(config.jwt.clone())),
            identities,
            config.lookup_timeout,
        ))
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Authenticate a bearer token
    #[tracing::instrument(name = "authenticate_by_token", skip_all)]
    pub async fn authenticate_by_token(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.codec.verify(token)?;

        let record = self
            .lookup(claims.identity())
            .await?
            .ok_or(AuthError::IdentityGone)?;

        if !record.active {
            tracing::debug!(identity = %record.username, "Token presented for disabled account");
            return Err(AuthError::AccountDisabled);
        }

        Ok(principal_from(record))
    }

    /// Authenticate a username/password pair
    #[tracing::instrument(name = "authenticate_by_credentials", skip(self, password))]
    pub async fn authenticate_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Principal, AuthError> {
        let record = self.lookup(username).await?;

        let (hash, record) = match record {
            Some(record) => match record.password_hash.clone() {
                Some(hash) => (hash, Some(record)),
                None => (decoy_hash().to_string(), None),
            },
            None => (decoy_hash().to_string(), None),
        };

        let valid = verify_password_blocking(password.to_string(), hash)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("Password verification error: {}", e);
                false
            });

        let record = match record {
            Some(record) if valid => record,
            _ => return Err(AuthError::InvalidCredentials),
        };

        if !record.active {
            return Err(AuthError::AccountDisabled);
        }

        Ok(principal_from(record))
    }

    /// Authenticate credentials and issue a token for the resulting principal
    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedToken, AuthError> {
        let principal = self.authenticate_by_credentials(username, password).await?;
        let token = self.codec.issue(&principal)?;
        tracing::info!(identity = %principal.identity(), "Issued access token");
        Ok(token)
    }

    /// Bounded identity lookup. Timeout and adapter failure both map to LookupTimeout.
    async fn lookup(&self, username: &str) -> Result<Option<IdentityRecord>, AuthError> {
        match tokio::time::timeout(self.lookup_timeout, self.identities.find_by_username(username))
            .await
        {
            Ok(Ok(record)) => Ok(record),
            Ok(Err(e)) => {
                tracing::warn!("Identity lookup failed: {}", e);
                Err(AuthError::LookupTimeout)
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.lookup_timeout, "Identity lookup timed out");
                Err(AuthError::LookupTimeout)
            }
        }
    }
}

fn principal_from(record: IdentityRecord) -> Principal {
    let roles = parse_roles(&record.roles);
    Principal::new(record.username, roles, record.active)
}
