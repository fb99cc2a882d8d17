//! Reading feeds, entries and counts.

pub mod common;

use axum::http::StatusCode;
use serde_json::json;
use similar_asserts::assert_eq;

use common::{create_router, get, service_path, BASE_URI};

fn entry(id: i64, str_col: &str, num_col: i64) -> serde_json::Value {
    json!({
        "__metadata": {
            "uri": format!("{BASE_URI}TableName1s({id})"),
            "type": "JdbcModel.TableName1"
        },
        "Id": id,
        "StrCol": str_col,
        "NumCol": num_col
    })
}

#[tokio::test]
async fn json_feed_in_key_order() {
    let (router, _database) = create_router().await;
    let response = get(&router, &service_path("TableName1s?$format=json"))
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json().unwrap(),
        json!({"d": {"results": [
            entry(1, "value1", 1),
            entry(2, "value2", 2),
            entry(3, "xfoo", 3)
        ]}})
    );
}

#[tokio::test]
async fn json_feed_with_options() {
    let (router, _database) = create_router().await;
    let response = get(
        &router,
        &service_path(
            "TableName1s?$format=json&$filter=NumCol%20ge%202&$orderby=NumCol%20desc&$top=1&$inlinecount=allpages",
        ),
    )
    .await
    .unwrap();

    assert_eq!(
        response.json().unwrap(),
        json!({"d": {"results": [entry(3, "xfoo", 3)], "__count": "2"}})
    );
}

#[tokio::test]
async fn wildcards_in_filter_literals_are_plain_characters() {
    let (router, _database) = create_router().await;
    let response = get(
        &router,
        &service_path("TableName1s?$format=json&$filter=startswith(StrCol,'%25foo')"),
    )
    .await
    .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json().unwrap(), json!({"d": {"results": []}}));

    let response = get(
        &router,
        &service_path("TableName1s?$format=json&$filter=endswith(StrCol,'foo')"),
    )
    .await
    .unwrap();
    assert_eq!(
        response.json().unwrap(),
        json!({"d": {"results": [entry(3, "xfoo", 3)]}})
    );
}

#[tokio::test]
async fn selected_properties_only() {
    let (router, _database) = create_router().await;
    let response = get(&router, &service_path("TableName1s(2)?$format=json&$select=StrCol"))
        .await
        .unwrap();

    assert_eq!(
        response.json().unwrap(),
        json!({"d": {
            "__metadata": {
                "uri": format!("{BASE_URI}TableName1s(2)"),
                "type": "JdbcModel.TableName1"
            },
            "StrCol": "value2"
        }})
    );
}

#[tokio::test]
async fn atom_feed() {
    let (router, _database) = create_router().await;
    let response = get(&router, &service_path("TableName1s")).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header("content-type"),
        Some("application/atom+xml;charset=utf-8")
    );
    let body = &response.body;
    assert!(body.starts_with("<?xml version='1.0' encoding='utf-8'?><feed "));
    assert!(body.contains(&format!("xml:base=\"{BASE_URI}\"")));
    assert!(body.contains(&format!("<id>{BASE_URI}TableName1s(3)</id>")));
    assert!(body.contains("<d:StrCol>xfoo</d:StrCol>"));
    assert!(body.contains("<d:Id m:type=\"Edm.Int32\">1</d:Id>"));
    assert_eq!(body.matches("<entry>").count(), 3);
}

#[tokio::test]
async fn atom_entry_with_null_property() {
    let (router, database) = create_router().await;
    database
        .execute("INSERT INTO Table_Name1 (id, str_col) VALUES (7, NULL)")
        .await
        .unwrap();
    let response = get(&router, &service_path("TableName1s(7)")).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("<entry "));
    assert!(response.body.contains("<d:StrCol m:null=\"true\"/>"));
}

#[tokio::test]
async fn string_keys() {
    let (router, _database) = create_router().await;
    let response = get(&router, &service_path("TableName2s('a')?$format=json"))
        .await
        .unwrap();

    assert_eq!(
        response.json().unwrap()["d"]["RefName"],
        json!("ref name1")
    );
    assert_eq!(
        response.json().unwrap()["d"]["__metadata"]["uri"],
        json!(format!("{BASE_URI}TableName2s('a')"))
    );
}

#[tokio::test]
async fn counts() {
    let (router, _database) = create_router().await;

    let response = get(&router, &service_path("TableName1s/$count")).await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("text/plain;charset=utf-8"));
    assert_eq!(response.body, "3");

    let response = get(
        &router,
        &service_path("TableName1s/$count?$filter=NumCol%20lt%203"),
    )
    .await
    .unwrap();
    assert_eq!(response.body, "2");

    let response = get(&router, &service_path("TableName1s/$count?$format=json"))
        .await
        .unwrap();
    assert_eq!(response.json().unwrap(), json!(3));
}

#[tokio::test]
async fn jsonp_callback() {
    let (router, _database) = create_router().await;
    let response = get(
        &router,
        &service_path("TableName1s/$count?$format=json&$callback=show"),
    )
    .await
    .unwrap();

    assert_eq!(
        response.header("content-type"),
        Some("text/javascript;charset=utf-8")
    );
    assert_eq!(response.body, "show(3)");
}

#[tokio::test]
async fn accept_header_selects_json() {
    let (router, _database) = create_router().await;
    let request = axum::http::Request::builder()
        .uri(service_path("TableName1s/$count"))
        .header("host", "localhost:80")
        .header("accept", "application/json")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tests_common::request::send(&router, request).await.unwrap();

    assert_eq!(
        response.header("content-type"),
        Some("application/json;charset=utf-8")
    );
}
