// Identity lookup adapter
// Decision: The gateway only needs find-by-username; storage and query mechanics belong to the adapter
// Decision: Role names stay raw strings here; the engine parses them against the Role vocabulary

mod memory;
mod remote;

pub use memory::InMemoryIdentityStore;
pub use remote::RemoteIdentityStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::IdentityStoreError;

fn default_active() -> bool {
    true
}

/// Identity as known by the external user store
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub username: String,
    /// Argon2 PHC string; `None` for accounts that cannot log in with a password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl IdentityRecord {
    pub fn new(username: impl Into<String>, roles: &[&str]) -> Self {
        Self {
            username: username.into(),
            password_hash: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            active: true,
        }
    }

    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

impl fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("username", &self.username)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "<redacted>"))
            .field("roles", &self.roles)
            .field("active", &self.active)
            .finish()
    }
}

/// External user store capability consumed by the authentication engine
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Resolve a username. `Ok(None)` means the identity does not exist.
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<IdentityRecord>, IdentityStoreError>;
}
