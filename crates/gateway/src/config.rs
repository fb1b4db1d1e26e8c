// Gateway configuration loaded from environment variables
// Decision: AUTH_ prefix for token settings, CORS_ and GATEWAY_ for edge settings
// Decision: No insecure fallbacks; a missing secret or bad rule file stops startup

use anyhow::{anyhow, bail, Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use zakura_auth::{
    password::hash_password_blocking, AuthConfig, IdentityRecord, IdentityStore,
    InMemoryIdentityStore, JwtConfig, RemoteIdentityStore, RuleSet,
};

use crate::cors::CorsConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Admin account seeded into the in-memory identity store
#[derive(Clone)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where identities are resolved from
#[derive(Debug, Clone)]
pub enum IdentitySource {
    /// User service reached over HTTP
    Remote { base_url: String },
    /// Users file and/or a seeded admin held in memory
    Local {
        users_file: Option<PathBuf>,
        admin: Option<AdminSeed>,
    },
}

/// Complete gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub auth: AuthConfig,
    pub rules: RuleSet,
    pub cors: CorsConfig,
    pub identity: IdentitySource,
    /// Forwarding target for allowed requests the gateway does not answer itself
    pub upstream_url: Option<String>,
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = parse_or(&var, "GATEWAY_BIND_ADDR", DEFAULT_BIND_ADDR.parse::<SocketAddr>()?)?;

        let defaults = AuthConfig::default();
        let auth = AuthConfig {
            jwt: JwtConfig {
                secret: var("AUTH_JWT_SECRET").unwrap_or_default(),
                token_ttl: parse_or(&var, "AUTH_JWT_TTL", defaults.jwt.token_ttl.as_secs())
                    .map(Duration::from_secs)?,
            },
            lookup_timeout: parse_or(
                &var,
                "AUTH_LOOKUP_TIMEOUT_MS",
                defaults.lookup_timeout.as_millis() as u64,
            )
            .map(Duration::from_millis)?,
        };
        auth.validate().context("Invalid authentication configuration")?;

        let rules = match var("GATEWAY_RULES_FILE") {
            Some(path) => {
                let source = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read rules file {}", path))?;
                RuleSet::from_yaml(&source)
                    .with_context(|| format!("Invalid rules file {}", path))?
            }
            None => RuleSet::defaults().context("Invalid built-in authorization rules")?,
        };

        let cors_defaults = CorsConfig::default();
        let cors = CorsConfig {
            allowed_origins: var("CORS_ALLOWED_ORIGINS")
                .map(|s| split_list(&s))
                .unwrap_or(cors_defaults.allowed_origins),
            allowed_methods: var("CORS_ALLOWED_METHODS")
                .map(|s| split_list(&s))
                .unwrap_or(cors_defaults.allowed_methods),
            allowed_headers: var("CORS_ALLOWED_HEADERS")
                .map(|s| split_list(&s))
                .unwrap_or(cors_defaults.allowed_headers),
            allow_credentials: match var("CORS_ALLOW_CREDENTIALS") {
                Some(s) => parse_bool(&s)
                    .ok_or_else(|| anyhow!("Invalid CORS_ALLOW_CREDENTIALS: {}", s))?,
                None => cors_defaults.allow_credentials,
            },
            max_age: parse_or(&var, "CORS_MAX_AGE", cors_defaults.max_age.as_secs())
                .map(Duration::from_secs)?,
        };

        let admin = match (var("AUTH_ADMIN_USERNAME"), var("AUTH_ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminSeed { username, password }),
            (None, None) => None,
            _ => bail!("AUTH_ADMIN_USERNAME and AUTH_ADMIN_PASSWORD must be set together"),
        };
        let users_file = var("IDENTITY_USERS_FILE").map(PathBuf::from);

        let identity = match var("IDENTITY_SERVICE_URL") {
            Some(base_url) => {
                if users_file.is_some() || admin.is_some() {
                    tracing::warn!(
                        "IDENTITY_SERVICE_URL is set; IDENTITY_USERS_FILE and AUTH_ADMIN_* are ignored"
                    );
                }
                IdentitySource::Remote { base_url }
            }
            None if users_file.is_none() && admin.is_none() => bail!(
                "No identity source configured: set IDENTITY_SERVICE_URL, IDENTITY_USERS_FILE \
                 or AUTH_ADMIN_USERNAME/AUTH_ADMIN_PASSWORD"
            ),
            None => IdentitySource::Local { users_file, admin },
        };

        Ok(Self {
            bind_addr,
            auth,
            rules,
            cors,
            identity,
            upstream_url: var("GATEWAY_UPSTREAM_URL"),
        })
    }

    /// Build the identity store adapter. Seeded passwords are hashed here.
    pub async fn build_identity_store(&self) -> Result<Arc<dyn IdentityStore>> {
        match &self.identity {
            IdentitySource::Remote { base_url } => {
                let store = RemoteIdentityStore::new(base_url)
                    .with_context(|| format!("Invalid IDENTITY_SERVICE_URL {}", base_url))?;
                tracing::info!(url = %base_url, "Using remote identity service");
                Ok(Arc::new(store))
            }
            IdentitySource::Local { users_file, admin } => {
                let store = match users_file {
                    Some(path) => {
                        let source = tokio::fs::read_to_string(path).await.with_context(|| {
                            format!("Failed to read users file {}", path.display())
                        })?;
                        InMemoryIdentityStore::from_yaml(&source).with_context(|| {
                            format!("Invalid users file {}", path.display())
                        })?
                    }
                    None => InMemoryIdentityStore::new(),
                };

                if let Some(admin) = admin {
                    let hash = hash_password_blocking(admin.password.clone())
                        .await
                        .context("Failed to hash admin password")?;
                    store.insert(
                        IdentityRecord::new(admin.username.clone(), &["ADMIN", "USER"])
                            .with_password_hash(hash),
                    );
                    tracing::info!(username = %admin.username, "Seeded admin account");
                }

                tracing::info!(users = store.len(), "Using in-memory identity store");
                Ok(Arc::new(store))
            }
        }
    }
}

fn parse_or<V, T>(var: &V, key: &str, default: T) -> Result<T>
where
    V: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow!("Invalid {} '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
