//! Run one OData operation against a connection: the unit both plain requests and
//! batch parts are made of.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use sqlx::SqliteConnection;
use tracing::{info_span, Instrument};

use query_engine_execution::{metrics, mutation, query as execute};
use query_engine_metadata::metadata::EntityModel;
use query_engine_translation::translation::key::EntityKey;
use query_engine_translation::translation::mutation as translate_mutation;
use query_engine_translation::translation::query::{self as translate, options::QueryOptions};
use query_engine_translation::translation::values;

use crate::error::ODataError;
use crate::format::{self, atom, json, service_document, Document, Format, Links};
use crate::payload;
use crate::request::{Method, QueryPairs, ResourcePath};

/// What every operation of a request shares.
pub struct RequestContext<'a> {
    pub model: &'a EntityModel,
    pub metrics: &'a metrics::Metrics,
    /// The service root, ending with `/`.
    pub base_uri: &'a str,
}

/// One operation: a plain request or a batch part.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub method: Method,
    pub path: ResourcePath,
    pub query: QueryPairs,
    pub format: Format,
    pub content_type: Option<String>,
    pub body: String,
}

impl Operation {
    fn callback(&self) -> Option<&str> {
        self.query.callback()
    }

    /// The raw key of the entity addressed by the path, without quotes.
    pub fn path_entity_id(&self) -> Option<String> {
        match &self.path {
            ResourcePath::Entity { key, .. } => {
                let key = key.trim();
                Some(values::parse_quoted(key).unwrap_or_else(|| key.to_string()))
            }
            _ => None,
        }
    }
}

/// The outcome of a successful operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ODataResponse {
    pub status: StatusCode,
    pub document: Option<Document>,
    pub location: Option<String>,
    /// The entity set and entity the operation touched, as reported in batch
    /// summaries.
    pub entity_set: Option<String>,
    pub entity_id: Option<String>,
}

impl ODataResponse {
    fn ok(document: Document) -> Self {
        ODataResponse {
            status: StatusCode::OK,
            document: Some(document),
            location: None,
            entity_set: None,
            entity_id: None,
        }
    }

    fn no_content() -> Self {
        ODataResponse {
            status: StatusCode::NO_CONTENT,
            document: None,
            location: None,
            entity_set: None,
            entity_id: None,
        }
    }

    fn for_entity(mut self, entity_set: &str, entity_id: Option<String>) -> Self {
        self.entity_set = Some(entity_set.to_string());
        self.entity_id = entity_id;
        self
    }
}

impl IntoResponse for ODataResponse {
    fn into_response(self) -> Response {
        let location = self.location.map(|location| [(header::LOCATION, location)]);
        match self.document {
            Some(document) => (self.status, location, document).into_response(),
            None => (
                self.status,
                location,
                [(
                    header::HeaderName::from_static("dataserviceversion"),
                    format::DATA_SERVICE_VERSION,
                )],
            )
                .into_response(),
        }
    }
}

/// The id of an entity as a plain value: `1`, `abc`, or `Id=1,Name=x` for compound
/// keys.
pub fn entity_id(key: &EntityKey) -> String {
    match key.0.as_slice() {
        [(_, value)] => atom::literal(value),
        pairs => pairs
            .iter()
            .map(|(name, value)| format!("{name}={}", atom::literal(value)))
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Run `operation` on `connection`.
pub async fn dispatch(
    context: &RequestContext<'_>,
    connection: &mut SqliteConnection,
    operation: &Operation,
) -> Result<ODataResponse, ODataError> {
    match (&operation.path, operation.method) {
        (ResourcePath::ServiceDocument, Method::Get) => Ok(ODataResponse::ok(match operation.format {
            Format::Json => Document::json(
                &service_document::json(context.model),
                operation.callback(),
            ),
            Format::Atom | Format::Text => Document::xml(service_document::atom(
                context.model,
                context.base_uri,
            )),
        })),
        (ResourcePath::Metadata, Method::Get) => Ok(ODataResponse::ok(Document::xml(
            format::metadata::render(context.model),
        ))),
        (ResourcePath::EntitySet { entity_set }, Method::Get) => {
            read_entity_set(context, connection, operation, entity_set)
                .instrument(info_span!("Read entity set", entity_set = %entity_set))
                .await
        }
        (ResourcePath::Count { entity_set }, Method::Get) => {
            count_entity_set(context, connection, operation, entity_set)
                .instrument(info_span!("Count entity set", entity_set = %entity_set))
                .await
        }
        (ResourcePath::Entity { entity_set, key }, Method::Get) => {
            read_entity(context, connection, operation, entity_set, key)
                .instrument(info_span!("Read entity", entity_set = %entity_set))
                .await
        }
        (ResourcePath::EntitySet { entity_set }, Method::Post) => {
            create_entity(context, connection, operation, entity_set)
                .instrument(info_span!("Create entity", entity_set = %entity_set))
                .await
        }
        (ResourcePath::Entity { entity_set, key }, method @ (Method::Post | Method::Merge | Method::Put)) => {
            let merge = method != Method::Put;
            update_entity(context, connection, operation, entity_set, key, merge)
                .instrument(info_span!("Update entity", entity_set = %entity_set, merge))
                .await
        }
        (ResourcePath::Entity { entity_set, key }, Method::Delete) => {
            delete_entity(context, connection, entity_set, key)
                .instrument(info_span!("Delete entity", entity_set = %entity_set))
                .await
        }
        (
            ResourcePath::EntitySet { .. } | ResourcePath::Count { .. },
            Method::Put | Method::Merge | Method::Delete,
        )
        | (ResourcePath::Unsupported, _) => Err(ODataError::NotImplemented),
        (ResourcePath::Batch, _) => Err(ODataError::BadRequest(
            "A batch request cannot contain another batch request".to_string(),
        )),
        _ => Err(ODataError::MethodNotAllowed),
    }
}

async fn read_entity_set(
    context: &RequestContext<'_>,
    connection: &mut SqliteConnection,
    operation: &Operation,
    entity_set: &str,
) -> Result<ODataResponse, ODataError> {
    let options = QueryOptions::parse(operation.query.iter())?;
    let plan = translate::translate(context.model, entity_set, &options, false)?;
    let entity_type = translate::lookup_entity_set(context.model, entity_set)?;
    let result = execute::execute(connection, context.metrics, entity_type, plan).await?;

    let links = Links {
        base_uri: context.base_uri,
    };
    let document = match operation.format {
        Format::Json => Document::json(
            &json::feed(&links, entity_type, &result.rows, &result.projection, result.count),
            operation.callback(),
        ),
        Format::Atom | Format::Text => Document::atom(atom::feed(
            &links,
            entity_type,
            &result.rows,
            &result.projection,
            result.count,
        )),
    };
    Ok(ODataResponse::ok(document).for_entity(entity_set, None))
}

async fn count_entity_set(
    context: &RequestContext<'_>,
    connection: &mut SqliteConnection,
    operation: &Operation,
    entity_set: &str,
) -> Result<ODataResponse, ODataError> {
    let options = QueryOptions::parse(operation.query.iter())?;
    let plan = translate::translate(context.model, entity_set, &options, true)?;
    let entity_type = translate::lookup_entity_set(context.model, entity_set)?;
    let result = execute::execute(connection, context.metrics, entity_type, plan).await?;
    let count = result.count.unwrap_or_default();

    let document = match operation.format {
        Format::Json => Document::json(&serde_json::Value::from(count), operation.callback()),
        Format::Atom | Format::Text => Document::text(count.to_string()),
    };
    Ok(ODataResponse::ok(document).for_entity(entity_set, None))
}

async fn read_entity(
    context: &RequestContext<'_>,
    connection: &mut SqliteConnection,
    operation: &Operation,
    entity_set: &str,
    key: &str,
) -> Result<ODataResponse, ODataError> {
    let entity_type = translate::lookup_entity_set(context.model, entity_set)?;
    let key = EntityKey::parse(entity_type, key)?;
    let options = QueryOptions::parse(operation.query.iter())?;
    let plan = translate::translate_read_by_key(
        context.model,
        entity_set,
        &key,
        options.select.as_deref(),
    )?;
    let (row, projection) =
        execute::execute_single(connection, context.metrics, entity_type, plan).await?;

    let links = Links {
        base_uri: context.base_uri,
    };
    let document = match operation.format {
        Format::Json => Document::json(
            &json::entry(&links, entity_type, &row, &projection),
            operation.callback(),
        ),
        Format::Atom | Format::Text => {
            Document::atom(atom::entry(&links, entity_type, &row, &projection))
        }
    };
    Ok(ODataResponse::ok(document).for_entity(entity_set, Some(entity_id(&key))))
}

async fn create_entity(
    context: &RequestContext<'_>,
    connection: &mut SqliteConnection,
    operation: &Operation,
    entity_set: &str,
) -> Result<ODataResponse, ODataError> {
    let payload = payload::decode(operation.content_type.as_deref(), &operation.body)?;
    let insert = translate_mutation::translate_insert(context.model, entity_set, &payload)?;
    let created = mutation::execute_insert(connection, context.metrics, context.model, insert).await?;
    let entity_type = translate::lookup_entity_set(context.model, entity_set)?;

    let links = Links {
        base_uri: context.base_uri,
    };
    let document = match operation.format {
        Format::Json => Document::json(
            &json::entry(&links, entity_type, &created.row, &created.projection),
            operation.callback(),
        ),
        Format::Atom | Format::Text => Document::atom(atom::entry(
            &links,
            entity_type,
            &created.row,
            &created.projection,
        )),
    };
    tracing::info!(entity_set, key = %entity_id(&created.key), "created entity");
    Ok(ODataResponse {
        status: StatusCode::CREATED,
        document: Some(document),
        location: Some(links.entity_uri(entity_type, &created.key)),
        entity_set: None,
        entity_id: None,
    }
    .for_entity(entity_set, Some(entity_id(&created.key))))
}

async fn update_entity(
    context: &RequestContext<'_>,
    connection: &mut SqliteConnection,
    operation: &Operation,
    entity_set: &str,
    key: &str,
    merge: bool,
) -> Result<ODataResponse, ODataError> {
    let entity_type = translate::lookup_entity_set(context.model, entity_set)?;
    let key = EntityKey::parse(entity_type, key)?;
    let payload = payload::decode(operation.content_type.as_deref(), &operation.body)?;
    let plan = translate_mutation::translate_update(context.model, entity_set, &key, &payload, merge)?;
    mutation::execute_update(connection, context.metrics, plan).await?;
    Ok(ODataResponse::no_content().for_entity(entity_set, Some(entity_id(&key))))
}

async fn delete_entity(
    context: &RequestContext<'_>,
    connection: &mut SqliteConnection,
    entity_set: &str,
    key: &str,
) -> Result<ODataResponse, ODataError> {
    let entity_type = translate::lookup_entity_set(context.model, entity_set)?;
    let key = EntityKey::parse(entity_type, key)?;
    let plan = translate_mutation::translate_delete(context.model, entity_set, &key)?;
    mutation::execute_delete(connection, context.metrics, plan).await?;
    Ok(ODataResponse::no_content().for_entity(entity_set, Some(entity_id(&key))))
}
