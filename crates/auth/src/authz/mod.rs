// Authorization decision engine
// Decision: Preflight (OPTIONS) is allowed before any rule is consulted
// Decision: Unmatched requests fall back to "authenticated" - anonymous callers are denied,
//           any active principal is allowed

mod pattern;
mod rules;

pub use pattern::{is_normalized_path, MethodPattern, PathPattern};
pub use rules::{
    Access, AuthorizationRule, RuleSet, AUTHENTICATION_PATHS, AUTH_WHITELIST, STATIC_RESOURCES,
};

use http::Method;

use crate::error::AuthzError;
use crate::principal::{Role, SecurityContext};

/// Outcome of an authorization check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(AuthzError),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Role the caller would need for this request, if the denial is an escalation
    pub fn required_role(&self) -> Option<Role> {
        match self {
            Decision::Deny(AuthzError::InsufficientRole { required }) => Some(*required),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<(), AuthzError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(err) => Err(err),
        }
    }
}

/// Evaluates the ordered rule list for a request
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: RuleSet,
}

impl AccessPolicy {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn decide(&self, ctx: &SecurityContext, method: &Method, path: &str) -> Decision {
        if method == Method::OPTIONS {
            return Decision::Allow;
        }

        let decision = match self.rules.first_match(method, path) {
            Some((index, rule)) => {
                tracing::trace!(rule = index, access = ?rule.access, %method, path, "Matched rule");
                evaluate(rule.access, ctx)
            }
            None => evaluate(Access::Authenticated, ctx),
        };

        if let Decision::Deny(reason) = &decision {
            tracing::debug!(%method, path, %reason, "Request denied");
        }
        decision
    }
}

fn evaluate(access: Access, ctx: &SecurityContext) -> Decision {
    match access {
        Access::Public => Decision::Allow,
        Access::Authenticated if ctx.is_authenticated() => Decision::Allow,
        Access::Authenticated => Decision::Deny(AuthzError::Unauthenticated),
        Access::Role(required) => match ctx.principal() {
            Some(principal) if principal.is_active() && principal.has_role(required) => {
                Decision::Allow
            }
            Some(principal) if principal.is_active() => {
                Decision::Deny(AuthzError::InsufficientRole { required })
            }
            _ => Decision::Deny(AuthzError::Unauthenticated),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::Principal;

    fn policy() -> AccessPolicy {
        AccessPolicy::new(RuleSet::defaults().unwrap())
    }

    fn admin() -> SecurityContext {
        Principal::new("admin@zakura.io", vec![Role::Admin], true).into()
    }

    fn user() -> SecurityContext {
        Principal::new("user@zakura.io", vec![Role::User], true).into()
    }

    fn inactive_admin() -> SecurityContext {
        Principal::new("old@zakura.io", vec![Role::Admin], false).into()
    }

    #[test]
    fn test_public_rules_allow_everyone() {
        let policy = policy();
        let requests = [
            (Method::GET, "/swagger-ui.html"),
            (Method::GET, "/v3/api-docs/stock-service"),
            (Method::GET, "/swagger-ui/index.html"),
            (Method::GET, "/health-check"),
            (Method::POST, "/auth/login"),
            (Method::GET, "/css/app.css"),
            (Method::GET, "/favicon.ico"),
        ];
        for (method, path) in requests {
            for ctx in [SecurityContext::Anonymous, user(), admin()] {
                assert_eq!(
                    policy.decide(&ctx, &method, path),
                    Decision::Allow,
                    "{} {} should be public",
                    method,
                    path
                );
            }
        }
    }

    #[test]
    fn test_role_gated_rule() {
        let policy = policy();

        assert_eq!(
            policy.decide(&admin(), &Method::DELETE, "/auth/42"),
            Decision::Allow
        );

        let denied = policy.decide(&user(), &Method::DELETE, "/auth/42");
        assert_eq!(
            denied,
            Decision::Deny(AuthzError::InsufficientRole {
                required: Role::Admin
            })
        );
        assert_eq!(denied.required_role(), Some(Role::Admin));

        assert_eq!(
            policy.decide(&SecurityContext::Anonymous, &Method::DELETE, "/auth/42"),
            Decision::Deny(AuthzError::Unauthenticated)
        );
    }

    #[test]
    fn test_inactive_principal_is_never_authenticated() {
        let policy = policy();
        assert_eq!(
            policy.decide(&inactive_admin(), &Method::DELETE, "/auth/42"),
            Decision::Deny(AuthzError::Unauthenticated)
        );
        assert_eq!(
            policy.decide(&inactive_admin(), &Method::GET, "/portfolio/42"),
            Decision::Deny(AuthzError::Unauthenticated)
        );
    }

    #[test]
    fn test_unmatched_paths_require_authentication() {
        let policy = policy();
        assert_eq!(
            policy.decide(&SecurityContext::Anonymous, &Method::GET, "/portfolio/42"),
            Decision::Deny(AuthzError::Unauthenticated)
        );
        assert_eq!(
            policy.decide(&user(), &Method::GET, "/portfolio/42"),
            Decision::Allow
        );
        assert_eq!(
            policy.decide(&user(), &Method::PUT, "/auth/42"),
            Decision::Allow
        );
    }

    #[test]
    fn test_preflight_bypasses_rules() {
        let strict = AccessPolicy::new(
            RuleSet::from_yaml("rules:\n  - paths: ['/**']\n    role: ADMIN\n").unwrap(),
        );
        assert_eq!(
            strict.decide(&SecurityContext::Anonymous, &Method::OPTIONS, "/portfolio/42"),
            Decision::Allow
        );
        assert_eq!(
            strict.decide(&user(), &Method::GET, "/portfolio/42").required_role(),
            Some(Role::Admin)
        );
    }

    #[test]
    fn test_first_match_wins() {
        let rules = RuleSet::from_yaml(
            r#"
rules:
  - method: GET
    paths: ["/reports/public/**"]
    access: public
  - paths: ["/reports/**"]
    role: ADMIN
  - method: GET
    paths: ["/reports/public/secret"]
    role: ADMIN
"#,
        )
        .unwrap();
        let policy = AccessPolicy::new(rules);

        // The later, narrower rule never gets a chance
        assert_eq!(
            policy.decide(&SecurityContext::Anonymous, &Method::GET, "/reports/public/secret"),
            Decision::Allow
        );
        assert_eq!(
            policy.decide(&user(), &Method::POST, "/reports/public/secret"),
            Decision::Deny(AuthzError::InsufficientRole {
                required: Role::Admin
            })
        );
    }

    #[test]
    fn test_explicit_authenticated_rule() {
        let policy = AccessPolicy::new(
            RuleSet::from_yaml(
                "rules:\n  - paths: ['/portfolio/**']\n    access: authenticated\n",
            )
            .unwrap(),
        );
        assert!(policy
            .decide(&user(), &Method::GET, "/portfolio/1")
            .is_allowed());
        assert_eq!(
            policy
                .decide(&SecurityContext::Anonymous, &Method::GET, "/portfolio/1")
                .into_result(),
            Err(AuthzError::Unauthenticated)
        );
    }
}
