//! `$batch` requests under the different batch settings.

pub mod common;

use axum::http::StatusCode;
use similar_asserts::assert_eq;

use common::{create_router, create_router_with, get, send_body, service_path, TestResponse};
use odata_producer::batch::BATCH_FAILED_MESSAGE;

const BOUNDARY: &str = "batch_36522ad7-fc75-4b56-8c71-56071383e77b";

/// A batch body holding one part per request line, each followed by its body.
fn batch_body(requests: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (request_line, payload) in requests {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Type: application/http\r\nContent-Transfer-Encoding: binary\r\n\r\n{request_line} HTTP/1.1\r\n"
        ));
        if payload.is_empty() {
            body.push_str("\r\n");
        } else {
            body.push_str(&format!("Content-Type: application/json\r\n\r\n{payload}\r\n"));
        }
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

async fn send_batch(router: &axum::Router, requests: &[(&str, &str)]) -> TestResponse {
    send_body(
        router,
        "POST",
        &service_path("$batch"),
        &format!("multipart/mixed; boundary={BOUNDARY}"),
        batch_body(requests),
    )
    .await
    .unwrap()
}

fn statuses(response: &TestResponse) -> Vec<&str> {
    response
        .body
        .lines()
        .filter_map(|line| line.strip_prefix("HTTP/1.1 "))
        .collect()
}

const DELETES: &[(&str, &str)] = &[
    ("DELETE /OData.svc/TableName1s(555)", ""),
    ("DELETE /OData.svc/TableName1s(1)", ""),
    ("DELETE /OData.svc/TableName1s(2)", ""),
];

#[tokio::test]
async fn transactional_batch_stops_at_the_first_failure() {
    let (router, database) = create_router().await;
    let response = send_batch(&router, DELETES).await;

    assert_eq!(response.status, StatusCode::ACCEPTED);
    let content_type = response.header("content-type").unwrap();
    assert!(content_type.starts_with("multipart/mixed; boundary=batchresponse_"));
    assert_eq!(
        statuses(&response),
        vec![
            "400 Bad Request",
            "412 Precondition Failed",
            "412 Precondition Failed"
        ]
    );
    assert_eq!(response.body.matches(BATCH_FAILED_MESSAGE).count(), 2);
    assert_eq!(database.count("Table_Name1").await.unwrap(), 3);

    assert_eq!(response.header("x-odata-batch-has-error"), Some("true"));
    assert_eq!(response.header("x-odata-batch-request-count"), Some("3"));
    assert_eq!(response.header("x-odata-batch-last-status"), Some("412"));
    assert_eq!(response.header("x-odata-batch-last-method"), Some("DELETE"));
    assert_eq!(response.header("x-odata-batch-last-entity-name"), Some("TableName1s"));
    assert_eq!(response.header("x-odata-batch-last-entity-id"), Some("2"));
}

#[tokio::test]
async fn failed_transactional_batch_rolls_back() {
    let (router, database) = create_router().await;
    let response = send_batch(
        &router,
        &[
            ("POST /OData.svc/TableName1s", r#"{"StrCol": "value4"}"#),
            ("DELETE /OData.svc/TableName1s(1)", ""),
            ("DELETE /OData.svc/TableName1s(555)", ""),
        ],
    )
    .await;

    assert_eq!(
        statuses(&response),
        vec!["201 Created", "204 No Content", "400 Bad Request"]
    );
    assert_eq!(database.count("Table_Name1").await.unwrap(), 3);
}

#[tokio::test]
async fn successful_transactional_batch_commits() {
    let (router, database) = create_router().await;
    let response = send_batch(
        &router,
        &[
            ("POST TableName1s", r#"{"StrCol": "value4"}"#),
            ("GET TableName1s/$count", ""),
            ("MERGE TableName1s(1)", r#"{"NumCol": 10}"#),
        ],
    )
    .await;

    assert_eq!(
        statuses(&response),
        vec!["201 Created", "200 OK", "204 No Content"]
    );
    assert!(response
        .body
        .contains("Location: http://localhost:80/OData.svc/TableName1s(4)\r\n"));
    assert!(response.body.contains("\r\n\r\n4\r\n"));
    assert_eq!(response.header("x-odata-batch-has-error"), Some("false"));
    assert_eq!(database.count("Table_Name1").await.unwrap(), 4);

    let entry = get(&router, &service_path("TableName1s(1)?$format=json"))
        .await
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(entry["d"]["NumCol"], serde_json::json!(10));
}

#[tokio::test]
async fn permissive_batch_applies_every_valid_operation() {
    let (router, database) = create_router_with(|configuration| {
        configuration.batch.transactional = false;
        configuration.batch.fast_fail = false;
    })
    .await;
    let response = send_batch(&router, DELETES).await;

    assert_eq!(
        statuses(&response),
        vec!["400 Bad Request", "204 No Content", "204 No Content"]
    );
    assert!(response.body.contains("Entity not deleted"));
    assert_eq!(database.count("Table_Name1").await.unwrap(), 1);
    assert_eq!(response.header("x-odata-batch-has-error"), Some("true"));
    assert_eq!(response.header("x-odata-batch-last-status"), Some("204"));
}

#[tokio::test]
async fn fast_fail_without_transaction_keeps_earlier_changes() {
    let (router, database) = create_router_with(|configuration| {
        configuration.batch.transactional = false;
    })
    .await;
    let response = send_batch(
        &router,
        &[
            ("DELETE /OData.svc/TableName1s(1)", ""),
            ("DELETE /OData.svc/TableName1s(555)", ""),
            ("DELETE /OData.svc/TableName1s(2)", ""),
        ],
    )
    .await;

    assert_eq!(
        statuses(&response),
        vec![
            "204 No Content",
            "400 Bad Request",
            "412 Precondition Failed"
        ]
    );
    assert_eq!(database.count("Table_Name1").await.unwrap(), 2);
}

#[tokio::test]
async fn fast_fail_is_forced_inside_transactions() {
    let (router, database) = create_router_with(|configuration| {
        configuration.batch.fast_fail = false;
    })
    .await;
    let response = send_batch(&router, DELETES).await;

    assert_eq!(statuses(&response)[2], "412 Precondition Failed");
    assert_eq!(database.count("Table_Name1").await.unwrap(), 3);
}

#[tokio::test]
async fn bodies_without_multipart_content_type() {
    let body = batch_body(&[("GET TableName1s/$count", "")]);

    let (router, _database) = create_router().await;
    let response = send_body(&router, "POST", &service_path("$batch"), "text/plain", body.clone())
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(statuses(&response), vec!["200 OK"]);

    let (router, _database) = create_router_with(|configuration| {
        configuration.batch.allow_any_request_body = false;
    })
    .await;
    let response = send_body(&router, "POST", &service_path("$batch"), "text/plain", body)
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response
        .body
        .contains("Expecting a valid multipart request and payload"));
}

#[tokio::test]
async fn batch_requires_post() {
    let (router, _database) = create_router().await;
    let response = get(&router, &service_path("$batch")).await.unwrap();
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}
