// CORS policy for browser clients
// Decision: Preflight is answered by tower-http's CorsLayer, which sits outside the security filter,
//           so OPTIONS never reaches authentication
// Decision: "*" for methods/headers mirrors the request instead of sending a wildcard,
//           which browsers reject when credentials are allowed

use anyhow::{bail, Context, Result};
use axum::http::{HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Upper bound for Access-Control-Max-Age
pub const MAX_PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

const WILDCARD: &str = "*";

/// CORS configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age: Duration,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:4200".to_string()],
            allowed_methods: vec![WILDCARD.to_string()],
            allowed_headers: vec![WILDCARD.to_string()],
            allow_credentials: true,
            max_age: Duration::from_secs(3600),
        }
    }
}

impl CorsConfig {
    /// Build the tower-http layer. Invalid policies are startup errors.
    pub fn layer(&self) -> Result<CorsLayer> {
        let max_age = if self.max_age > MAX_PREFLIGHT_MAX_AGE {
            tracing::warn!(
                configured = ?self.max_age,
                cap = ?MAX_PREFLIGHT_MAX_AGE,
                "CORS max age capped"
            );
            MAX_PREFLIGHT_MAX_AGE
        } else {
            self.max_age
        };

        Ok(CorsLayer::new()
            .allow_origin(self.allow_origin()?)
            .allow_methods(self.allow_methods()?)
            .allow_headers(self.allow_headers()?)
            .allow_credentials(self.allow_credentials)
            .max_age(max_age))
    }

    fn allow_origin(&self) -> Result<AllowOrigin> {
        if self.allowed_origins.iter().any(|o| o == WILDCARD) {
            if self.allow_credentials {
                bail!("CORS wildcard origin cannot be combined with allow-credentials");
            }
            return Ok(AllowOrigin::any());
        }
        if self.allowed_origins.is_empty() {
            bail!("CORS requires at least one allowed origin");
        }
        let origins = self
            .allowed_origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin '{}'", o))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(AllowOrigin::list(origins))
    }

    fn allow_methods(&self) -> Result<AllowMethods> {
        if self.allowed_methods.iter().any(|m| m == WILDCARD) {
            return Ok(AllowMethods::mirror_request());
        }
        let methods = self
            .allowed_methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.as_bytes())
                    .with_context(|| format!("Invalid CORS method '{}'", m))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(AllowMethods::list(methods))
    }

    fn allow_headers(&self) -> Result<AllowHeaders> {
        if self.allowed_headers.iter().any(|h| h == WILDCARD) {
            return Ok(AllowHeaders::mirror_request());
        }
        let headers = self
            .allowed_headers
            .iter()
            .map(|h| {
                HeaderName::from_bytes(h.as_bytes())
                    .with_context(|| format!("Invalid CORS header '{}'", h))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(AllowHeaders::list(headers))
    }
}
