// Authentication configuration
// Decision: Plain structs with defaults; loading from the environment lives in the gateway binary
// Decision: validate() is called once at startup and any error is fatal

use std::time::Duration;

use crate::error::ConfigError;

/// Minimum HS256 secret length in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// Longest accepted access token lifetime
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWTs
    pub secret: String,
    /// Access token lifetime
    pub token_ttl: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            token_ttl: Duration::from_secs(60 * 60), // 1 hour
        }
    }
}

impl JwtConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret {
                min: MIN_SECRET_LEN,
                actual: self.secret.len(),
            });
        }
        if self.token_ttl.is_zero() {
            return Err(ConfigError::ZeroTtl);
        }
        if self.token_ttl > MAX_TOKEN_TTL {
            return Err(ConfigError::TtlTooLong {
                max: MAX_TOKEN_TTL,
                actual: self.token_ttl,
            });
        }
        Ok(())
    }
}

/// Complete authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt: JwtConfig,
    /// Upper bound for a single identity store call
    pub lookup_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt: JwtConfig::default(),
            lookup_timeout: Duration::from_millis(2000),
        }
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.jwt.validate()?;
        if self.lookup_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(self.lookup_timeout));
        }
        Ok(())
    }
}
