//! `$batch`: parse the multipart body, run every operation on one connection, and
//! assemble a multipart response.

pub mod assemble;
pub mod parse;

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use sqlx::SqliteConnection;
use tracing::{info_span, Instrument};

use odata_producer_configuration::BatchFlags;

use crate::error::ODataError;
use crate::handler::{self, Operation, RequestContext};
use crate::request::{Method, QueryPairs, ResourcePath, METHOD_OVERRIDE_HEADER};
use crate::state::ServerState;
use parse::BatchPart;

/// Body of the operations skipped after a failure.
pub const BATCH_FAILED_MESSAGE: &str =
    "Cannot process due to previous error(s). Transaction and/or Fast fail flag is probably to true";

/// The result of one operation of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub method: Method,
    pub status: StatusCode,
    pub content_type: Option<&'static str>,
    pub location: Option<String>,
    /// The rendered document, the error message of a failure, or nothing.
    pub body: String,
    pub entity_set: Option<String>,
    pub entity_id: Option<String>,
    /// The request body of the operation.
    pub payload: String,
}

impl BatchOutcome {
    pub fn is_failure(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }
}

/// What happened to the last operation of a batch, and whether any failed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchSummary {
    pub last_entity_name: Option<String>,
    pub last_entity_id: Option<String>,
    pub last_method: Option<Method>,
    pub last_status: Option<StatusCode>,
    pub last_body: Option<String>,
    pub last_payload: Option<String>,
    pub has_error: bool,
    pub request_count: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[BatchOutcome]) -> Self {
        let last = outcomes.last();
        BatchSummary {
            last_entity_name: last.and_then(|outcome| outcome.entity_set.clone()),
            last_entity_id: last.and_then(|outcome| outcome.entity_id.clone()),
            last_method: last.map(|outcome| outcome.method),
            last_status: last.map(|outcome| outcome.status),
            last_body: last.map(|outcome| outcome.body.clone()),
            last_payload: last.map(|outcome| outcome.payload.clone()),
            has_error: outcomes.iter().any(BatchOutcome::is_failure),
            request_count: outcomes.len(),
        }
    }

    /// The `X-OData-Batch-*` response headers. Values that are not valid header text
    /// are left out.
    pub fn headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        let fields = [
            ("x-odata-batch-last-entity-name", self.last_entity_name.clone()),
            ("x-odata-batch-last-entity-id", self.last_entity_id.clone()),
            ("x-odata-batch-last-method", self.last_method.map(|method| method.to_string())),
            ("x-odata-batch-last-status", self.last_status.map(|status| status.as_u16().to_string())),
            ("x-odata-batch-has-error", Some(self.has_error.to_string())),
            ("x-odata-batch-request-count", Some(self.request_count.to_string())),
        ];
        fields
            .into_iter()
            .filter_map(|(name, value)| {
                let value = HeaderValue::from_str(&value?).ok()?;
                Some((HeaderName::from_static(name), value))
            })
            .collect()
    }
}

/// The assembled response of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResponse {
    pub boundary: String,
    pub body: String,
    pub summary: BatchSummary,
}

impl IntoResponse for BatchResponse {
    fn into_response(self) -> Response {
        let mut response = (
            StatusCode::ACCEPTED,
            [(
                header::CONTENT_TYPE,
                format!("multipart/mixed; boundary={}", self.boundary),
            )],
            self.body,
        )
            .into_response();
        response.headers_mut().extend(self.summary.headers());
        response
    }
}

/// Run a batch request. Operations run in order on one connection: a transaction
/// when the batch is transactional, otherwise a pooled connection in autocommit mode.
pub async fn process(
    state: &ServerState,
    context: &RequestContext<'_>,
    content_type: Option<&str>,
    body: &str,
) -> Result<BatchResponse, ODataError> {
    let flags = state.configuration.batch;
    let parts = parse::parse_batch(content_type, body, flags.allow_any_request_body)?;
    let path_index = state.configuration.service.path_index;

    let outcomes = if flags.transactional {
        let mut transaction = state.pool.begin().await?;
        let outcomes = run_operations(context, &mut *transaction, &parts, path_index, flags)
            .instrument(info_span!("Run batch operations", transactional = true))
            .await;
        if outcomes.iter().any(BatchOutcome::is_failure) {
            tracing::info!("batch failed, rolling back");
            transaction.rollback().await?;
        } else {
            transaction.commit().await?;
        }
        outcomes
    } else {
        let mut connection = state.pool.acquire().await?;
        run_operations(context, &mut *connection, &parts, path_index, flags)
            .instrument(info_span!("Run batch operations", transactional = false))
            .await
    };

    let summary = BatchSummary::from_outcomes(&outcomes);
    tracing::info!(
        requests = summary.request_count,
        has_error = summary.has_error,
        "processed batch"
    );
    let (boundary, changeset_boundary) = assemble::new_boundaries();
    let body = assemble::assemble(&outcomes, &boundary, &changeset_boundary);
    Ok(BatchResponse {
        boundary,
        body,
        summary,
    })
}

async fn run_operations(
    context: &RequestContext<'_>,
    connection: &mut SqliteConnection,
    parts: &[BatchPart],
    path_index: usize,
    flags: BatchFlags,
) -> Vec<BatchOutcome> {
    let mut outcomes = Vec::with_capacity(parts.len());
    let mut failed = false;
    for part in parts {
        let operation = to_operation(part, path_index);
        let method = operation
            .as_ref()
            .map_or_else(|_| Method::parse(&part.method).unwrap_or(Method::Get), |operation| operation.method);

        let outcome = if failed && flags.fast_fail {
            BatchOutcome {
                method,
                status: StatusCode::PRECONDITION_FAILED,
                content_type: None,
                location: None,
                body: BATCH_FAILED_MESSAGE.to_string(),
                entity_set: operation
                    .as_ref()
                    .ok()
                    .and_then(|operation| operation.path.entity_set().map(str::to_string)),
                entity_id: operation.as_ref().ok().and_then(Operation::path_entity_id),
                payload: part.body.clone(),
            }
        } else {
            let result = match &operation {
                Ok(operation) => handler::dispatch(context, connection, operation).await,
                Err(error) => Err(error.clone()),
            };
            context.metrics.record_batch_operation();
            to_outcome(part, method, operation.as_ref().ok(), result)
        };

        failed = failed || outcome.is_failure();
        outcomes.push(outcome);
    }
    outcomes
}

/// Interpret the request line and headers of a part. The URL may be absolute, start
/// at the server root, or be relative to the service root.
fn to_operation(part: &BatchPart, path_index: usize) -> Result<Operation, ODataError> {
    let method = Method::resolve(&part.method, part.header(METHOD_OVERRIDE_HEADER))?;

    let url = match part.url.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |slash| &rest[slash..]),
        None => part.url.as_str(),
    };
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    };
    let path = if path.starts_with('/') {
        ResourcePath::parse(path, path_index)?
    } else {
        ResourcePath::parse(path, 0)?
    };

    let query = QueryPairs::parse(query);
    Ok(Operation {
        method,
        path,
        format: query.format(part.header("Accept")),
        query,
        content_type: part.header("Content-Type").map(str::to_string),
        body: part.body.clone(),
    })
}

fn to_outcome(
    part: &BatchPart,
    method: Method,
    operation: Option<&Operation>,
    result: Result<handler::ODataResponse, ODataError>,
) -> BatchOutcome {
    match result {
        Ok(response) => BatchOutcome {
            method,
            status: response.status,
            content_type: response.document.as_ref().map(|document| document.content_type),
            location: response.location,
            body: response.document.map(|document| document.body).unwrap_or_default(),
            entity_set: response.entity_set,
            entity_id: response.entity_id,
            payload: part.body.clone(),
        },
        Err(error) => {
            error.log("Batch operation error");
            BatchOutcome {
                method,
                status: error.status(),
                content_type: None,
                location: None,
                body: error.to_string(),
                entity_set: operation.and_then(|operation| operation.path.entity_set().map(str::to_string)),
                entity_id: operation.and_then(Operation::path_entity_id),
                payload: part.body.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;

    fn part(method: &str, url: &str) -> BatchPart {
        BatchPart {
            method: method.to_string(),
            url: url.to_string(),
            headers: vec![],
            body: String::new(),
        }
    }

    #[test]
    fn part_urls() {
        let operation = to_operation(&part("DELETE", "/OData.svc/TableName1s('555')"), 1).unwrap();
        assert_eq!(
            operation.path,
            ResourcePath::Entity {
                entity_set: "TableName1s".to_string(),
                key: "'555'".to_string()
            }
        );
        assert_eq!(operation.path_entity_id().as_deref(), Some("555"));

        let operation = to_operation(&part("GET", "TableName1s?$format=json&$top=1"), 1).unwrap();
        assert_eq!(operation.format, Format::Json);
        assert_eq!(operation.query.get("$top"), Some("1"));

        let operation =
            to_operation(&part("GET", "http://localhost:8080/OData.svc/TableName1s/$count"), 1).unwrap();
        assert!(matches!(operation.path, ResourcePath::Count { .. }));

        let mut tunneled = part("POST", "TableName1s(1)");
        tunneled.headers.push(("X-HTTP-Method".to_string(), "MERGE".to_string()));
        assert_eq!(to_operation(&tunneled, 1).unwrap().method, Method::Merge);
    }

    #[test]
    fn summary_of_the_last_outcome() {
        let outcome = |status: StatusCode, id: &str| BatchOutcome {
            method: Method::Delete,
            status,
            content_type: None,
            location: None,
            body: String::new(),
            entity_set: Some("TableName1s".to_string()),
            entity_id: Some(id.to_string()),
            payload: String::new(),
        };
        let summary = BatchSummary::from_outcomes(&[
            outcome(StatusCode::BAD_REQUEST, "555"),
            outcome(StatusCode::PRECONDITION_FAILED, "1"),
        ]);
        assert_eq!(summary.last_entity_id.as_deref(), Some("1"));
        assert_eq!(summary.last_status, Some(StatusCode::PRECONDITION_FAILED));
        assert!(summary.has_error);
        assert_eq!(summary.request_count, 2);

        let headers = summary.headers();
        assert!(headers.contains(&(
            HeaderName::from_static("x-odata-batch-last-method"),
            HeaderValue::from_static("DELETE")
        )));
        assert!(headers.contains(&(
            HeaderName::from_static("x-odata-batch-last-status"),
            HeaderValue::from_static("412")
        )));

        let empty = BatchSummary::from_outcomes(&[]);
        assert!(!empty.has_error);
        assert_eq!(empty.headers().len(), 2);
    }
}
