// Identity store backed by the user service over HTTP
// Decision: GET {base}/users/by-username/{name}; 404 means the identity does not exist
// Decision: No retries here; the engine bounds the call with its own timeout

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::{IdentityRecord, IdentityStore};
use crate::error::IdentityStoreError;

/// Role entry as returned by the user service: either a bare name or `{ "name": ... }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteRole {
    Name(String),
    Object { name: String },
}

impl RemoteRole {
    fn into_name(self) -> String {
        match self {
            RemoteRole::Name(name) | RemoteRole::Object { name } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    #[serde(alias = "email")]
    username: String,
    #[serde(default, alias = "password")]
    password_hash: Option<String>,
    #[serde(default)]
    roles: Vec<RemoteRole>,
    #[serde(default = "super::default_active")]
    active: bool,
}

impl From<RemoteUser> for IdentityRecord {
    fn from(user: RemoteUser) -> Self {
        IdentityRecord {
            username: user.username,
            password_hash: user.password_hash,
            roles: user.roles.into_iter().map(RemoteRole::into_name).collect(),
            active: user.active,
        }
    }
}

/// HTTP client for the user service
#[derive(Debug, Clone)]
pub struct RemoteIdentityStore {
    client: reqwest::Client,
    base_url: Url,
}

impl RemoteIdentityStore {
    pub fn new(base_url: &str) -> Result<Self, IdentityStoreError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, IdentityStoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| IdentityStoreError::Transport(format!("invalid base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(IdentityStoreError::Transport(format!(
                "URL cannot be used as a base: {}",
                base_url
            )));
        }
        Ok(Self { client, base_url })
    }

    fn lookup_url(&self, username: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["users", "by-username", username]);
        }
        url
    }
}

#[async_trait]
impl IdentityStore for RemoteIdentityStore {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<IdentityRecord>, IdentityStoreError> {
        let response = self
            .client
            .get(self.lookup_url(username))
            .send()
            .await
            .map_err(|e| IdentityStoreError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let user: RemoteUser = response
                    .json()
                    .await
                    .map_err(|e| IdentityStoreError::InvalidRecord(e.to_string()))?;
                Ok(Some(user.into()))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(IdentityStoreError::UnexpectedStatus(status.as_u16())),
        }
    }
}
