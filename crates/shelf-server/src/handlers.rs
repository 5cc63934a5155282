//! The single request handler.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use shelf_site::{Producer, Site};

/// Served with status 404 when present.
const NOT_FOUND_PAGE: &str = "/404.html";

pub(crate) async fn serve_uri(State(site): State<Arc<Site>>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let path = uri.path();
    match lookup(&site, path) {
        Some(producer) => produce(path, producer, StatusCode::OK).await,
        None => {
            tracing::debug!(path, "No handler");
            match site.resolve(NOT_FOUND_PAGE) {
                Some(page) => produce(path, page, StatusCode::NOT_FOUND).await,
                None => StatusCode::NOT_FOUND.into_response(),
            }
        }
    }
}

/// Candidate URIs for a request path, most specific first.
///
/// `/go/` is served from `/go/index.html`, extensionless paths also try the
/// `.html` page.
pub(crate) fn candidates(path: &str) -> Vec<String> {
    if path.ends_with('/') {
        return vec![format!("{path}index.html")];
    }
    let mut out = vec![path.to_owned()];
    let last = path.rsplit('/').next().unwrap_or(path);
    if !last.contains('.') {
        out.push(format!("{path}.html"));
    }
    out
}

fn lookup(site: &Site, path: &str) -> Option<Producer> {
    candidates(path).iter().find_map(|uri| site.resolve(uri))
}

/// Run the producer off the async workers.
///
/// A panic inside the producer has already gone through the process panic
/// hook by the time the join error arrives here.
async fn produce(path: &str, producer: Producer, status: StatusCode) -> Response {
    let content_type = producer.content_type().to_owned();
    match tokio::task::spawn_blocking(move || producer.to_bytes()).await {
        Ok(Ok(bytes)) => (
            status,
            [(header::CONTENT_TYPE, content_type)],
            Body::from(bytes),
        )
            .into_response(),
        Ok(Err(e)) => {
            tracing::error!(path, "Failed to produce content: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) if e.is_panic() => {
            tracing::error!(path, "Content producer panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            tracing::error!(path, "Content task failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
