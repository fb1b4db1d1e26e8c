// Zakura API gateway
// Decision: Layer order (outermost first) is trace -> CORS -> security filter -> routes/forwarding
// Decision: An explicit fallback keeps unknown paths behind the security filter (401, not 404)

pub mod config;
pub mod cors;
pub mod proxy;
pub mod routes;
pub mod security;

use axum::{middleware, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use zakura_auth::{AccessPolicy, Authenticator};

pub use config::GatewayConfig;
pub use cors::CorsConfig;
pub use proxy::Upstream;
pub use security::{AuthUser, OptionalAuthUser, Rejection, SecurityState};

/// State shared by gateway handlers
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Authenticator,
    pub upstream: Option<Upstream>,
}

impl AppState {
    pub fn new(authenticator: Authenticator, upstream: Option<Upstream>) -> Self {
        Self {
            authenticator,
            upstream,
        }
    }
}

/// Assemble the gateway router with all layers applied
pub fn build_router(state: AppState, policy: AccessPolicy, cors: CorsLayer) -> Router {
    let security = SecurityState::new(state.authenticator.clone(), policy);

    Router::new()
        .merge(routes::routes())
        .fallback(proxy::forward)
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            security,
            security::security_filter,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
