// In-memory identity store for dev mode and tests
// Decision: Use parking_lot for thread-safe access
// Decision: Seeded once at startup; mutation helpers exist for admin tooling and tests

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use super::{IdentityRecord, IdentityStore};
use crate::error::{ConfigError, IdentityStoreError};

/// Shape of a users seed file
#[derive(Debug, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<IdentityRecord>,
}

/// Identity store backed by a HashMap. All data is lost on restart.
#[derive(Default)]
pub struct InMemoryIdentityStore {
    users: RwLock<HashMap<String, IdentityRecord>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(records: impl IntoIterator<Item = IdentityRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Load users from YAML:
    ///
    /// ```yaml
    /// users:
    ///   - username: admin@zakura.io
    ///     password_hash: "$argon2id$..."
    ///     roles: [ADMIN, USER]
    /// ```
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let file: UsersFile = serde_yaml::from_str(source)
            .map_err(|e| ConfigError::InvalidIdentitySeed(e.to_string()))?;

        let mut seen = HashSet::new();
        for record in &file.users {
            if record.username.trim().is_empty() {
                return Err(ConfigError::InvalidIdentitySeed(
                    "username must not be empty".to_string(),
                ));
            }
            if !seen.insert(record.username.as_str()) {
                return Err(ConfigError::InvalidIdentitySeed(format!(
                    "duplicate username '{}'",
                    record.username
                )));
            }
        }

        Ok(Self::with_users(file.users))
    }

    /// Insert or replace a record
    pub fn insert(&self, record: IdentityRecord) {
        self.users.write().insert(record.username.clone(), record);
    }

    pub fn remove(&self, username: &str) -> Option<IdentityRecord> {
        self.users.write().remove(username)
    }

    /// Returns false if the user does not exist
    pub fn set_active(&self, username: &str, active: bool) -> bool {
        match self.users.write().get_mut(username) {
            Some(record) => {
                record.active = active;
                true
            }
            None => false,
        }
    }

    /// Returns false if the user does not exist
    pub fn set_roles(&self, username: &str, roles: &[&str]) -> bool {
        match self.users.write().get_mut(username) {
            Some(record) => {
                record.roles = roles.iter().map(|r| r.to_string()).collect();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<IdentityRecord>, IdentityStoreError> {
        Ok(self.users.read().get(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_by_username() {
        let store = InMemoryIdentityStore::with_users([
            IdentityRecord::new("admin@zakura.io", &["ADMIN"]),
            IdentityRecord::new("user@zakura.io", &["USER"]),
        ]);

        let found = store.find_by_username("admin@zakura.io").await.unwrap();
        assert_eq!(found.unwrap().roles, vec!["ADMIN".to_string()]);

        assert!(store.find_by_username("ADMIN@zakura.io").await.unwrap().is_none());
        assert!(store.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mutations_are_visible_to_lookups() {
        let store = InMemoryIdentityStore::with_users([IdentityRecord::new("u", &["USER"])]);

        assert!(store.set_active("u", false));
        assert!(!store.find_by_username("u").await.unwrap().unwrap().active);

        assert!(store.set_roles("u", &["ADMIN"]));
        assert_eq!(
            store.find_by_username("u").await.unwrap().unwrap().roles,
            vec!["ADMIN".to_string()]
        );

        assert!(store.remove("u").is_some());
        assert!(store.is_empty());
        assert!(!store.set_active("u", true));
    }

    #[test]
    fn test_from_yaml() {
        let store = InMemoryIdentityStore::from_yaml(
            r#"
users:
  - username: admin@zakura.io
    password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
    roles: [ADMIN, USER]
  - username: retired@zakura.io
    roles: [USER]
    active: false
"#,
        )
        .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_from_yaml_rejects_duplicates_and_garbage() {
        let dup = InMemoryIdentityStore::from_yaml(
            "users:\n  - username: a\n  - username: a\n",
        );
        assert!(matches!(dup, Err(ConfigError::InvalidIdentitySeed(_))));

        let empty_name = InMemoryIdentityStore::from_yaml("users:\n  - username: ''\n");
        assert!(matches!(empty_name, Err(ConfigError::InvalidIdentitySeed(_))));

        let garbage = InMemoryIdentityStore::from_yaml("users: 42");
        assert!(matches!(garbage, Err(ConfigError::InvalidIdentitySeed(_))));
    }
}
