use axum::body::Bytes;
use axum::extract::State;
use axum::http::{self, header, HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use tracing::{info_span, Instrument};

use crate::batch;
use crate::error::ODataError;
use crate::format::{self, Format};
use crate::handler::{self, Operation, RequestContext};
use crate::request::{self, Method, QueryPairs, ResourcePath, METHOD_OVERRIDE_HEADER};
use crate::state::ServerState;

/// Serve any OData request. Failures are rendered as error documents in the format
/// the client asked for.
pub async fn handle_odata(
    State(state): State<ServerState>,
    method: http::Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let query = QueryPairs::parse(uri.query());
    let format = query.format(header_str(&headers, header::ACCEPT.as_str()));
    let callback = query.callback().map(str::to_string);

    let result = serve(&state, &method, &uri, &headers, &body, query, format)
        .instrument(info_span!("OData request", method = %method, path = %uri.path()))
        .await;
    match result {
        Ok(response) => response,
        Err(error) => {
            error.log("Request error");
            format::error::render(
                &error,
                format,
                callback.as_deref(),
                state.configuration.show_inline_error,
            )
            .into_response()
        }
    }
}

async fn serve(
    state: &ServerState,
    method: &http::Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
    query: QueryPairs,
    format: Format,
) -> Result<Response, ODataError> {
    let service = &state.configuration.service;
    let path = ResourcePath::parse(uri.path(), service.path_index)?;
    let method = Method::resolve(method.as_str(), header_str(headers, METHOD_OVERRIDE_HEADER))?;
    let body = std::str::from_utf8(body)
        .map_err(|_| ODataError::BadRequest("The request body is not valid UTF-8".to_string()))?;
    let content_type = header_str(headers, header::CONTENT_TYPE.as_str());

    let model = state.entity_model().await?;
    let base_uri = request::base_uri(
        service.root_uri.as_deref(),
        headers,
        uri.path(),
        service.path_index,
    );
    let context = RequestContext {
        model: &model,
        metrics: &state.metrics,
        base_uri: &base_uri,
    };

    if path == ResourcePath::Batch {
        if method != Method::Post {
            return Err(ODataError::MethodNotAllowed);
        }
        let response = batch::process(state, &context, content_type, body)
            .instrument(info_span!("Process batch"))
            .await?;
        return Ok(response.into_response());
    }

    let operation = Operation {
        method,
        path,
        query,
        format,
        content_type: content_type.map(str::to_string),
        body: body.to_string(),
    };
    let mut connection = state.pool.acquire().await?;
    let response = handler::dispatch(&context, &mut *connection, &operation).await?;
    Ok(response.into_response())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
