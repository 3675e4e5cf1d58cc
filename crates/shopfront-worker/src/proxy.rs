//! HTTP front for the worker host using Axum.
//!
//! Every request the browser sends here is handed to the worker's fetch
//! handler as a navigation. Cached responses never touch the upstream site.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use shopfront_core::net::is_hop_by_hop;
use shopfront_core::worker::RegistrationStatus;
use shopfront_core::{FetchRequest, FetchResponse, WorkerHost};
use tracing::{info, warn};

/// Path reserved for the worker's own status endpoint
pub const HEALTH_PATH: &str = "/__shopfront/health";

/// Reports whether a response came from the cache
pub const CACHE_STATUS_HEADER: &str = "x-shopfront-cache";

/// Largest request body forwarded upstream (form posts, image uploads)
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn router(host: Arc<WorkerHost>) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(handle_health))
        .fallback(handle_intercept)
        .with_state(host)
}

/// Start the interceptor in the background.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(host: Arc<WorkerHost>, listen: &str) -> anyhow::Result<SocketAddr> {
    let addr: SocketAddr = listen.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Interceptor listening on {}", actual_addr);

    let app = router(host);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "Interceptor stopped");
        }
    });

    Ok(actual_addr)
}

async fn handle_health(State(host): State<Arc<WorkerHost>>) -> Json<RegistrationStatus> {
    Json(host.status().await)
}

async fn handle_intercept(State(host): State<Arc<WorkerHost>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response(),
    };

    // Only the path and query are taken from the browser; the upstream
    // origin is fixed.
    let path = parts.uri.path();
    let mut fetch =
        FetchRequest::on_origin(parts.method.clone(), host.origin(), path, parts.uri.query())
            .with_body(body);
    for (name, value) in parts.headers.iter() {
        if !is_hop_by_hop(name.as_str()) {
            fetch.headers.push((
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            ));
        }
    }

    match host.handle_fetch(None, fetch).await {
        Ok(response) => into_response(response),
        Err(e) => {
            warn!(method = %parts.method, path, error = %e, "Fetch failed");
            let status = if e.is_network_failure() {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::BAD_REQUEST
            };
            (status, format!("Upstream fetch failed: {}", e)).into_response()
        }
    }
}

fn into_response(response: FetchResponse) -> Response {
    let mut builder = Response::builder().status(response.status);
    for (name, value) in &response.headers {
        if !is_hop_by_hop(name) {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }
    let cache_status = if response.from_cache { "hit" } else { "miss" };
    builder = builder.header(CACHE_STATUS_HEADER, cache_status);

    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response())
}
