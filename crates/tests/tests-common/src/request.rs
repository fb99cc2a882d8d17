//! Sending requests to a router without a server.

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use tower::ServiceExt;

/// A response with its body read.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn json(&self) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

pub async fn send(router: &axum::Router, request: Request<Body>) -> anyhow::Result<TestResponse> {
    let response = router.clone().oneshot(request).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = hyper::body::to_bytes(response.into_body()).await?;
    Ok(TestResponse {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec())?,
    })
}

pub async fn get(router: &axum::Router, uri: &str) -> anyhow::Result<TestResponse> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::HOST, "localhost:80")
        .body(Body::empty())?;
    send(router, request).await
}

/// Send `body` with a content type.
pub async fn send_body(
    router: &axum::Router,
    method: &str,
    uri: &str,
    content_type: &str,
    body: impl Into<String>,
) -> anyhow::Result<TestResponse> {
    let body: String = body.into();
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "localhost:80")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))?;
    send(router, request).await
}
