//! Writing the multipart response of a batch.

use std::fmt::Write;

use super::BatchOutcome;
use crate::format::{DATA_SERVICE_VERSION, DATA_SERVICE_VERSION_HEADER};

const CRLF: &str = "\r\n";

/// `batchresponse_<uuid>` and `changesetresponse_<uuid>`.
pub fn new_boundaries() -> (String, String) {
    (
        format!("batchresponse_{}", uuid::Uuid::new_v4()),
        format!("changesetresponse_{}", uuid::Uuid::new_v4()),
    )
}

/// One changeset holding a part per outcome, in request order.
pub fn assemble(outcomes: &[BatchOutcome], batch_boundary: &str, changeset_boundary: &str) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "--{batch_boundary}{CRLF}Content-Type: multipart/mixed; boundary={changeset_boundary}{CRLF}{CRLF}"
    );
    for outcome in outcomes {
        let _ = write!(
            out,
            "--{changeset_boundary}{CRLF}Content-Type: application/http{CRLF}Content-Transfer-Encoding: binary{CRLF}{CRLF}HTTP/1.1 {} {}{CRLF}",
            outcome.status.as_u16(),
            outcome.status.canonical_reason().unwrap_or_default(),
        );
        if outcome.status.is_success() {
            if let Some(content_type) = outcome.content_type {
                let _ = write!(out, "Content-Type: {content_type}{CRLF}");
            }
            if let Some(location) = &outcome.location {
                let _ = write!(out, "Location: {location}{CRLF}");
            }
            let _ = write!(out, "{DATA_SERVICE_VERSION_HEADER}: {DATA_SERVICE_VERSION}{CRLF}");
        }
        let _ = write!(out, "{CRLF}{}{CRLF}", outcome.body);
    }
    let _ = write!(out, "--{changeset_boundary}--{CRLF}--{batch_boundary}--{CRLF}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BATCH_FAILED_MESSAGE;
    use crate::request::Method;
    use axum::http::StatusCode;

    fn outcome(status: StatusCode, body: &str) -> BatchOutcome {
        BatchOutcome {
            method: Method::Delete,
            status,
            content_type: None,
            location: None,
            body: body.to_string(),
            entity_set: Some("TableName1s".to_string()),
            entity_id: Some("555".to_string()),
            payload: String::new(),
        }
    }

    #[test]
    fn failed_and_skipped_parts() {
        let created = BatchOutcome {
            method: Method::Post,
            status: StatusCode::CREATED,
            content_type: Some("application/atom+xml;charset=utf-8"),
            location: Some("http://localhost/OData.svc/TableName1s(3)".to_string()),
            body: "<entry/>".to_string(),
            entity_set: Some("TableName1s".to_string()),
            entity_id: Some("3".to_string()),
            payload: String::new(),
        };
        let outcomes = vec![
            created,
            outcome(StatusCode::BAD_REQUEST, "Entity not deleted"),
            outcome(StatusCode::PRECONDITION_FAILED, BATCH_FAILED_MESSAGE),
        ];
        similar_asserts::assert_eq!(
            assemble(&outcomes, "batchresponse_1", "changesetresponse_2"),
            "--batchresponse_1\r\n\
Content-Type: multipart/mixed; boundary=changesetresponse_2\r\n\
\r\n\
--changesetresponse_2\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
HTTP/1.1 201 Created\r\n\
Content-Type: application/atom+xml;charset=utf-8\r\n\
Location: http://localhost/OData.svc/TableName1s(3)\r\n\
DataServiceVersion: 1.0\r\n\
\r\n\
<entry/>\r\n\
--changesetresponse_2\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
HTTP/1.1 400 Bad Request\r\n\
\r\n\
Entity not deleted\r\n\
--changesetresponse_2\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
HTTP/1.1 412 Precondition Failed\r\n\
\r\n\
Cannot process due to previous error(s). Transaction and/or Fast fail flag is probably to true\r\n\
--changesetresponse_2--\r\n\
--batchresponse_1--\r\n"
        );
    }

    #[test]
    fn boundaries_are_fresh() {
        let (batch, changeset) = new_boundaries();
        assert!(batch.starts_with("batchresponse_"));
        assert!(changeset.starts_with("changesetresponse_"));
        assert_ne!(new_boundaries().0, batch);
    }
}
