//! Common functions used across test cases.

use tests_common::database::TestDatabase;

pub use tests_common::request::{get, send_body, TestResponse};

/// The service lives under the first path segment.
pub const SERVICE_ROOT: &str = "/OData.svc";

/// The base URI the service reports for requests sent by the test helpers.
pub const BASE_URI: &str = "http://localhost:80/OData.svc/";

/// A router over a fresh copy of the sample database.
pub async fn create_router() -> (axum::Router, TestDatabase) {
    create_router_with(|_| {}).await
}

/// A router over a fresh copy of the sample database, with an adjusted configuration.
pub async fn create_router_with(
    customize: impl FnOnce(&mut odata_producer_configuration::ParsedConfiguration),
) -> (axum::Router, TestDatabase) {
    let database = TestDatabase::sample().await.unwrap();
    let (router, _) = tests_common::router::create_router_with(&database, customize)
        .await
        .unwrap();
    (router, database)
}

pub fn service_path(path: &str) -> String {
    format!("{SERVICE_ROOT}/{path}")
}
