// Ordered authorization rules
// Decision: Rules are plain data built once at startup (defaults or YAML) and never mutated
// Decision: Rule order is preserved exactly as written; first match wins

use serde::Deserialize;
use std::sync::Arc;

use super::pattern::{MethodPattern, PathPattern};
use crate::error::ConfigError;
use crate::principal::Role;

/// Public GET endpoints: API docs, login-related reads, health checks
pub const AUTH_WHITELIST: &[&str] = &[
    "/swagger-ui.html",
    "/v3/api-docs/**",
    "/swagger-ui/**",
    "/auth/**",
    "/health-check/**",
];

/// Login and account endpoints
pub const AUTHENTICATION_PATHS: &[&str] = &["/auth/**"];

/// Everything, used for the preflight rule
const ALL_PATHS: &[&str] = &["/**"];

/// Common static resource locations
pub const STATIC_RESOURCES: &[&str] = &[
    "/css/**",
    "/js/**",
    "/images/**",
    "/webjars/**",
    "/favicon.*",
    "/*/icon-*",
];

/// What a matching rule requires of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anyone, including anonymous callers
    Public,
    /// Any active authenticated principal
    Authenticated,
    /// An active principal holding this role
    Role(Role),
}

/// One entry of the ordered rule list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRule {
    pub method: MethodPattern,
    pub paths: Vec<PathPattern>,
    pub access: Access,
}

impl AuthorizationRule {
    pub fn new(method: MethodPattern, paths: &[&str], access: Access) -> Result<Self, ConfigError> {
        if paths.is_empty() {
            return Err(ConfigError::InvalidRules(
                "a rule needs at least one path pattern".to_string(),
            ));
        }
        let paths = paths
            .iter()
            .map(|p| PathPattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            method,
            paths,
            access,
        })
    }

    pub fn matches(&self, method: &http::Method, path: &str) -> bool {
        self.method.matches(method) && self.paths.iter().any(|p| p.matches(path))
    }
}

/// Rule as written in the YAML rules file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    #[serde(default = "any_method")]
    method: String,
    paths: Vec<String>,
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

fn any_method() -> String {
    "*".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesFile {
    rules: Vec<RawRule>,
}

impl RawRule {
    fn into_rule(self, index: usize) -> Result<AuthorizationRule, ConfigError> {
        let access = match (self.access.as_deref(), self.role.as_deref()) {
            (None | Some("role"), Some(role)) => Access::Role(
                role.parse()
                    .map_err(|e| ConfigError::InvalidRules(format!("rule {}: {}", index, e)))?,
            ),
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidRules(format!(
                    "rule {}: declare either access or role, not both",
                    index
                )))
            }
            (Some("public"), None) => Access::Public,
            (Some("authenticated"), None) => Access::Authenticated,
            (Some("role"), None) => {
                return Err(ConfigError::InvalidRules(format!(
                    "rule {}: access 'role' needs a role name",
                    index
                )))
            }
            (Some(other), None) => {
                return Err(ConfigError::InvalidRules(format!(
                    "rule {}: unknown access '{}' (expected public, authenticated or role)",
                    index, other
                )))
            }
            (None, None) => {
                return Err(ConfigError::InvalidRules(format!(
                    "rule {}: must declare either access or role",
                    index
                )))
            }
        };

        let method: MethodPattern = self.method.parse()?;
        let paths: Vec<&str> = self.paths.iter().map(String::as_str).collect();
        AuthorizationRule::new(method, &paths, access)
            .map_err(|e| match e {
                ConfigError::InvalidRules(msg) => {
                    ConfigError::InvalidRules(format!("rule {}: {}", index, msg))
                }
                other => other,
            })
    }
}

/// Immutable ordered rule list, cheap to clone
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Arc<[AuthorizationRule]>,
}

impl RuleSet {
    pub fn new(rules: Vec<AuthorizationRule>) -> Self {
        Self {
            rules: rules.into(),
        }
    }

    /// Gateway defaults: docs, health and login are public, deleting
    /// accounts requires ADMIN, static assets and preflight are open.
    /// A built-in rule that fails to compile is an error, never a skipped rule.
    pub fn defaults() -> Result<Self, ConfigError> {
        let exact = |m: http::Method| MethodPattern::Exact(m);
        let rules = [
            (exact(http::Method::GET), AUTH_WHITELIST, Access::Public),
            (exact(http::Method::POST), AUTHENTICATION_PATHS, Access::Public),
            (
                exact(http::Method::DELETE),
                AUTHENTICATION_PATHS,
                Access::Role(Role::Admin),
            ),
            (MethodPattern::Any, STATIC_RESOURCES, Access::Public),
            (exact(http::Method::OPTIONS), ALL_PATHS, Access::Public),
        ];

        rules
            .into_iter()
            .map(|(method, paths, access)| AuthorizationRule::new(method, paths, access))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Parse an ordered rule list:
    ///
    /// ```yaml
    /// rules:
    ///   - method: GET
    ///     paths: ["/swagger-ui.html", "/auth/**"]
    ///     access: public
    ///   - method: DELETE
    ///     paths: ["/auth/**"]
    ///     role: ADMIN
    ///   - paths: ["/portfolio/**"]
    ///     access: authenticated
    /// ```
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let file: RulesFile =
            serde_yaml::from_str(source).map_err(|e| ConfigError::InvalidRules(e.to_string()))?;

        let rules = file
            .rules
            .into_iter()
            .enumerate()
            .map(|(index, raw)| raw.into_rule(index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[AuthorizationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule matching the request, with its position
    pub fn first_match(
        &self,
        method: &http::Method,
        path: &str,
    ) -> Option<(usize, &AuthorizationRule)> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(method, path))
    }
}
