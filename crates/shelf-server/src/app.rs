//! Router construction.
//!
//! Every request goes through a single fallback handler that looks the path
//! up in the [`Site`].

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::http::header::HeaderName;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use shelf_site::Site;

use crate::handlers;

/// Create the application router.
pub fn create_router(site: Arc<Site>) -> Router {
    Router::new()
        .fallback(handlers::serve_uri)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(content_type_options_layer()),
        )
        .with_state(site)
}

fn content_type_options_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    )
}
