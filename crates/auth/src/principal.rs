// Identity types shared by the authentication and authorization engines
// Decision: Roles are a closed enum so rule matching is exhaustive at compile time
// Decision: Principal is immutable; a fresh one is built per request or login exchange

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Spring-style authority prefix accepted as an alias when parsing roles
const AUTHORITY_PREFIX: &str = "ROLE_";

/// Role held by an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role name is not part of the known vocabulary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Case-sensitive: `ADMIN` and `ROLE_ADMIN` parse, `admin` does not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix(AUTHORITY_PREFIX).unwrap_or(s);
        match name {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// Parse role names coming from an external source, dropping the ones we
/// don't know. Order is preserved and duplicates are removed.
pub fn parse_roles<I, S>(names: I) -> Vec<Role>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut roles = Vec::new();
    for name in names {
        match name.as_ref().parse::<Role>() {
            Ok(role) if !roles.contains(&role) => roles.push(role),
            Ok(_) => {}
            Err(e) => tracing::warn!(role = %e.0, "Ignoring unknown role"),
        }
    }
    roles
}

/// Authenticated identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    identity: String,
    roles: Vec<Role>,
    active: bool,
}

impl Principal {
    pub fn new(identity: impl Into<String>, roles: Vec<Role>, active: bool) -> Self {
        let mut ordered: Vec<Role> = Vec::with_capacity(roles.len());
        for role in roles {
            if !ordered.contains(&role) {
                ordered.push(role);
            }
        }
        Self {
            identity: identity.into(),
            roles: ordered,
            active,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Per-request security context
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SecurityContext {
    #[default]
    Anonymous,
    Authenticated(Principal),
}

impl SecurityContext {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            SecurityContext::Anonymous => None,
            SecurityContext::Authenticated(principal) => Some(principal),
        }
    }

    /// True only for an active principal; an inactive one never counts
    pub fn is_authenticated(&self) -> bool {
        self.principal().is_some_and(Principal::is_active)
    }
}

impl From<Principal> for SecurityContext {
    fn from(principal: Principal) -> Self {
        SecurityContext::Authenticated(principal)
    }
}

impl From<Option<Principal>> for SecurityContext {
    fn from(principal: Option<Principal>) -> Self {
        principal.map_or(SecurityContext::Anonymous, SecurityContext::Authenticated)
    }
}
