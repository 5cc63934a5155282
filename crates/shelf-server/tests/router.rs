//! Requests against the router, without a socket.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use pretty_assertions::assert_eq;
use shelf_server::{create_router, serve};
use shelf_site::{ContentError, DynamicHandler, Producer, Site, StaticContent};
use tower::ServiceExt;

fn site() -> Arc<Site> {
    let site = Arc::new(Site::new());
    site.push(Arc::new(
        StaticContent::new()
            .with("/index.html", b"home".to_vec())
            .with("/about.html", b"about".to_vec())
            .with("/go/index.html", b"go book".to_vec())
            .with("/s/shelf.css", b"body {}".to_vec()),
    ));
    site.push(Arc::new(DynamicHandler::new(
        |uri| match uri {
            "/broken.html" => Some(Producer::new("text/html", |_| {
                Err(ContentError::Render("template exploded".to_owned()))
            })),
            "/panics.html" => Some(Producer::new("text/html", |_| panic!("producer bug"))),
            _ => None,
        },
        || vec!["/broken.html".to_owned(), "/panics.html".to_owned()],
    )));
    site
}

async fn get(site: &Arc<Site>, path: &str) -> (StatusCode, String, Option<String>) {
    let response = create_router(Arc::clone(site))
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_owned());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap(), content_type)
}

#[tokio::test]
async fn serves_resolved_uris() {
    let site = site();
    let (status, body, ct) = get(&site, "/s/shelf.css").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "body {}");
    assert_eq!(ct.as_deref(), Some("text/css; charset=utf-8"));
}

#[tokio::test]
async fn directory_and_clean_urls() {
    let site = site();
    assert_eq!(get(&site, "/").await.1, "home");
    assert_eq!(get(&site, "/go/").await.1, "go book");
    assert_eq!(get(&site, "/about").await.1, "about");
}

#[tokio::test]
async fn unknown_uri_is_404() {
    let site = site();
    let (status, body, _) = get(&site, "/nope.html").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "");

    // With a not-found page, its content is served along the 404.
    site.push(Arc::new(StaticContent::new().with("/404.html", b"lost?".to_vec())));
    let (status, body, _) = get(&site, "/nope.html").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "lost?");

    // The server keeps answering.
    assert_eq!(get(&site, "/").await.0, StatusCode::OK);
}

#[tokio::test]
async fn producer_failures_are_500() {
    let site = site();
    assert_eq!(get(&site, "/broken.html").await.0, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(get(&site, "/panics.html").await.0, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(get(&site, "/index.html").await.0, StatusCode::OK);
}

#[tokio::test]
async fn rejects_writes() {
    let response = create_router(site())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/index.html")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn stops_on_shutdown_signal() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve(
        listener,
        site(),
        async move {
            let _ = rx.await;
        },
        Duration::from_millis(100),
    ));

    tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}
