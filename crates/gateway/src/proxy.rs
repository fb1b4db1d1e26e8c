// Upstream forwarding
// Decision: Request bodies are buffered up to a fixed limit; responses are streamed back
// Decision: Identity reaches the upstream only through X-Auth-* headers written here

use anyhow::{bail, Context, Result};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use reqwest::{redirect, Url};
use zakura_auth::SecurityContext;

use crate::security::{identity_headers, Rejection};
use crate::AppState;

/// Largest request body forwarded upstream
pub const MAX_FORWARD_BODY_BYTES: usize = 10 * 1024 * 1024;

const HOP_BY_HOP: [header::HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named by Connection are hop-by-hop as well
    let named: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    for name in named {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// Upstream service that receives allowed requests
#[derive(Debug, Clone)]
pub struct Upstream {
    client: reqwest::Client,
    base_url: Url,
}

impl Upstream {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .context("Failed to build upstream HTTP client")?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid upstream URL: {}", base_url))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            bail!("Upstream URL must be an http(s) base URL: {}", base_url);
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Upstream URL for an inbound request URI
    fn target_url(&self, uri: &Uri) -> Url {
        let mut url = self.base_url.clone();
        let path = format!("{}{}", self.base_url.path().trim_end_matches('/'), uri.path());
        url.set_path(&path);
        url.set_query(uri.query());
        url
    }

    /// Forward an allowed request and stream the upstream response back
    pub async fn forward(&self, req: Request) -> Result<Response, Rejection> {
        let ctx = req
            .extensions()
            .get::<SecurityContext>()
            .cloned()
            .unwrap_or_default();
        let (parts, body) = req.into_parts();

        let body = axum::body::to_bytes(body, MAX_FORWARD_BODY_BYTES)
            .await
            .map_err(|_| {
                Rejection::with_status(StatusCode::PAYLOAD_TOO_LARGE, "payload too large")
            })?;

        let url = self.target_url(&parts.uri);
        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        for (name, value) in identity_headers(&ctx) {
            headers.insert(name, value);
        }

        tracing::debug!(method = %parts.method, %url, "Forwarding request upstream");

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Upstream request failed");
                Rejection::with_status(StatusCode::BAD_GATEWAY, "bad gateway")
            })?;

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        strip_hop_by_hop(&mut response_headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

/// Fallback handler: forward to the upstream, or 404 when none is configured
pub async fn forward(State(state): State<AppState>, req: Request) -> Response {
    let Some(upstream) = state.upstream.as_ref() else {
        return Rejection::with_status(StatusCode::NOT_FOUND, "not found").into_response();
    };
    match upstream.forward(req).await {
        Ok(response) => response,
        Err(rejection) => rejection.into_response(),
    }
}
