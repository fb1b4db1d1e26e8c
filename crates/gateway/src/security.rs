// Request security filter and extractors
// Decision: One middleware runs the whole per-request pipeline: token -> principal -> decision
// Decision: Failed token authentication downgrades to anonymous; the rule decides whether that matters
// Decision: Denials carry no authentication detail (bad signature and expiry look the same)

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use zakura_auth::{
    authz::is_normalized_path, AccessPolicy, AuthzError, Authenticator, Decision, Principal,
    SecurityContext,
};

/// Identity metadata header set on forwarded requests
pub const X_AUTH_USER: HeaderName = HeaderName::from_static("x-auth-user");
/// Comma-separated roles header set on forwarded requests
pub const X_AUTH_ROLES: HeaderName = HeaderName::from_static("x-auth-roles");

/// Rejection returned to the client
#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    pub error: String,
    #[serde(skip)]
    pub status: StatusCode,
}

impl Rejection {
    pub fn unauthenticated() -> Self {
        Self {
            error: "unauthenticated".to_string(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    pub fn forbidden() -> Self {
        Self {
            error: "forbidden".to_string(),
            status: StatusCode::FORBIDDEN,
        }
    }

    pub fn bad_request() -> Self {
        Self {
            error: "bad request".to_string(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn with_status(status: StatusCode, error: &str) -> Self {
        Self {
            error: error.to_string(),
            status,
        }
    }
}

impl From<AuthzError> for Rejection {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => Rejection::unauthenticated(),
            AuthzError::InsufficientRole { .. } => Rejection::forbidden(),
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status = self.status;
        let mut response = (status, Json(self)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

/// State shared by the security filter
#[derive(Clone)]
pub struct SecurityState {
    pub authenticator: Authenticator,
    pub policy: AccessPolicy,
}

impl SecurityState {
    pub fn new(authenticator: Authenticator, policy: AccessPolicy) -> Self {
        Self {
            authenticator,
            policy,
        }
    }

    /// Resolve the caller. Any authentication failure yields an anonymous context.
    async fn resolve_context(&self, headers: &HeaderMap) -> SecurityContext {
        let Some(token) = extract_bearer_token(headers) else {
            return SecurityContext::Anonymous;
        };

        match self.authenticator.authenticate_by_token(token).await {
            Ok(principal) => SecurityContext::Authenticated(principal),
            Err(e) => {
                tracing::debug!("Token authentication failed: {}", e);
                SecurityContext::Anonymous
            }
        }
    }
}

/// Per-request security pipeline
pub async fn security_filter(
    State(state): State<SecurityState>,
    mut req: Request,
    next: Next,
) -> Response {
    if !is_normalized_path(req.uri().path()) {
        tracing::debug!(path = %req.uri().path(), "Rejected non-normalized path");
        return Rejection::bad_request().into_response();
    }

    // Identity headers are only ever set by the gateway
    req.headers_mut().remove(X_AUTH_USER);
    req.headers_mut().remove(X_AUTH_ROLES);

    let ctx = state.resolve_context(req.headers()).await;

    match state.policy.decide(&ctx, req.method(), req.uri().path()) {
        Decision::Allow => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Decision::Deny(reason) => Rejection::from(reason).into_response(),
    }
}

/// Extract the bearer token from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Security context of the current request, anonymous if none was attached
fn context_from_parts(parts: &Parts) -> SecurityContext {
    parts
        .extensions
        .get::<SecurityContext>()
        .cloned()
        .unwrap_or_default()
}

/// Extractor for an authenticated principal. Returns 401 otherwise.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match context_from_parts(parts) {
            SecurityContext::Authenticated(principal) if principal.is_active() => {
                Ok(AuthUser(principal))
            }
            _ => Err(Rejection::unauthenticated()),
        }
    }
}

/// Optional principal extractor - never rejects
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<Principal>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = match context_from_parts(parts) {
            SecurityContext::Authenticated(principal) if principal.is_active() => Some(principal),
            _ => None,
        };
        Ok(OptionalAuthUser(principal))
    }
}

/// Identity metadata headers for a forwarded request
pub fn identity_headers(ctx: &SecurityContext) -> Vec<(HeaderName, HeaderValue)> {
    let Some(principal) = ctx.principal().filter(|p| p.is_active()) else {
        return Vec::new();
    };

    let mut headers = Vec::with_capacity(2);
    if let Ok(user) = HeaderValue::from_str(principal.identity()) {
        headers.push((X_AUTH_USER, user));
    }
    let roles = principal
        .roles()
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(",");
    if let Ok(roles) = HeaderValue::from_str(&roles) {
        headers.push((X_AUTH_ROLES, roles));
    }
    headers
}
