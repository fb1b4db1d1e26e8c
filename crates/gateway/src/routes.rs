// Gateway-owned HTTP routes
// Decision: Only login, the caller's own identity and health are answered locally; everything
//           else is forwarded upstream
// Decision: Login failures share one 401 body so callers cannot probe which usernames exist

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use zakura_auth::{AuthError, IssuedToken, TokenError};

use crate::proxy::forward;
use crate::security::{OptionalAuthUser, Rejection};
use crate::AppState;

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "email")]
    pub username: String,
    pub password: String,
}

/// Identity of the current caller
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Routes answered by the gateway itself. Other methods on these paths go upstream.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login).fallback(forward))
        .route("/auth/me", get(me).fallback(forward))
        .route("/health-check", get(health).fallback(forward))
}

/// POST /auth/login - exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<IssuedToken>, Rejection> {
    match state.authenticator.login(&req.username, &req.password).await {
        Ok(token) => {
            tracing::info!(username = %req.username, "Login succeeded");
            Ok(Json(token))
        }
        Err(AuthError::Token(TokenError::Signing(e))) => {
            tracing::error!("Failed to sign token: {}", e);
            Err(Rejection::with_status(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error",
            ))
        }
        Err(e) => {
            tracing::info!(username = %req.username, reason = %e, "Login rejected");
            Err(Rejection::unauthenticated())
        }
    }
}

/// GET /auth/me - identity attached to this request
pub async fn me(OptionalAuthUser(principal): OptionalAuthUser) -> Json<MeResponse> {
    Json(match principal {
        Some(principal) => MeResponse {
            authenticated: true,
            username: Some(principal.identity().to_string()),
            roles: principal
                .roles()
                .iter()
                .map(|r| r.as_str().to_string())
                .collect(),
        },
        None => MeResponse {
            authenticated: false,
            username: None,
            roles: Vec::new(),
        },
    })
}

/// GET /health-check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
