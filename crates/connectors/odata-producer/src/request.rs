//! Interpreting a request: the method, the resource path, the query options and the
//! service root.

use axum::http::{self, HeaderMap};
use percent_encoding::percent_decode_str;

use crate::error::ODataError;
use crate::format::Format;

/// Header clients use to tunnel MERGE, PUT and DELETE through POST.
pub const METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method";

/// The methods the service handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Merge,
    Delete,
}

impl Method {
    pub fn parse(name: &str) -> Option<Method> {
        match name.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "MERGE" | "PATCH" => Some(Method::Merge),
            "DELETE" => Some(Method::Delete),
            _ => None,
        }
    }

    /// The effective method of a request. A POST may be overridden by
    /// `X-HTTP-Method`.
    pub fn resolve(method: &str, override_header: Option<&str>) -> Result<Method, ODataError> {
        let method = Method::parse(method).ok_or(ODataError::MethodNotAllowed)?;
        match (method, override_header) {
            (Method::Post, Some(tunneled)) => {
                Method::parse(tunneled).ok_or(ODataError::MethodNotAllowed)
            }
            _ => Ok(method),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Merge => "MERGE",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a request path addresses, below the service root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourcePath {
    ServiceDocument,
    Metadata,
    Batch,
    /// `EntitySet` or `EntitySet()`.
    EntitySet { entity_set: String },
    /// `EntitySet/$count`.
    Count { entity_set: String },
    /// `EntitySet(key)`, with the key text still unparsed.
    Entity { entity_set: String, key: String },
    /// A shape we recognise but do not serve: links, navigation, `$value`, or the
    /// metadata of a single set.
    Unsupported,
}

impl ResourcePath {
    /// Parse a request path, skipping the first `path_index` segments, which name the
    /// service.
    pub fn parse(path: &str, path_index: usize) -> Result<ResourcePath, ODataError> {
        let segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                percent_decode_str(segment)
                    .decode_utf8()
                    .map(std::borrow::Cow::into_owned)
                    .map_err(|_| ODataError::bad_request())
            })
            .collect::<Result<Vec<String>, _>>()?;

        if segments.len() < path_index {
            return Err(ODataError::not_found());
        }
        let resource = &segments[path_index..];

        match resource {
            [] => Ok(ResourcePath::ServiceDocument),
            [only] if only == "$metadata" => Ok(ResourcePath::Metadata),
            [only] if only == "$batch" => Ok(ResourcePath::Batch),
            [only] => match parse_segment(only)? {
                (entity_set, None) => Ok(ResourcePath::EntitySet { entity_set }),
                (entity_set, Some(key)) => Ok(ResourcePath::Entity { entity_set, key }),
            },
            [first, second] => match parse_segment(first)? {
                (_, Some(_)) => Ok(ResourcePath::Unsupported),
                (entity_set, None) if second == "$count" => Ok(ResourcePath::Count { entity_set }),
                (_, None) if second == "$metadata" => Ok(ResourcePath::Unsupported),
                (_, None) => Err(ODataError::bad_request()),
            },
            _ => Err(ODataError::bad_request()),
        }
    }

    /// The entity set addressed, if any.
    pub fn entity_set(&self) -> Option<&str> {
        match self {
            ResourcePath::EntitySet { entity_set }
            | ResourcePath::Count { entity_set }
            | ResourcePath::Entity { entity_set, .. } => Some(entity_set),
            _ => None,
        }
    }
}

/// `Name`, `Name()` or `Name(key)`.
fn parse_segment(segment: &str) -> Result<(String, Option<String>), ODataError> {
    let Some(open) = segment.find('(') else {
        return Ok((segment.to_string(), None));
    };
    let name = segment[..open].trim_end().to_string();
    let key = segment[open + 1..]
        .strip_suffix(')')
        .ok_or_else(ODataError::bad_request)?;
    if key.trim().is_empty() {
        Ok((name, None))
    } else {
        Ok((name, Some(key.to_string())))
    }
}

/// Decoded query string pairs, in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryPairs(pub Vec<(String, String)>);

impl QueryPairs {
    pub fn parse(query: Option<&str>) -> QueryPairs {
        QueryPairs(
            query
                .map(|query| {
                    url::form_urlencoded::parse(query.as_bytes())
                        .into_owned()
                        .collect()
                })
                .unwrap_or_default(),
        )
    }

    /// The first value of an option.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn format(&self, accept: Option<&str>) -> Format {
        Format::negotiate(self.get("$format"), accept)
    }

    pub fn callback(&self) -> Option<&str> {
        self.get("$callback")
    }
}

/// The service root: the configured root URI, or `http://{Host}/{service segments}/`.
pub fn base_uri(
    root_uri: Option<&str>,
    headers: &HeaderMap,
    path: &str,
    path_index: usize,
) -> String {
    if let Some(root_uri) = root_uri {
        return if root_uri.ends_with('/') {
            root_uri.to_string()
        } else {
            format!("{root_uri}/")
        };
    }
    let host = headers
        .get(http::header::HOST)
        .and_then(|host| host.to_str().ok())
        .unwrap_or("localhost");
    let mut base = format!("http://{host}/");
    for segment in path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .take(path_index)
    {
        base.push_str(segment);
        base.push('/');
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str) -> Result<ResourcePath, ODataError> {
        ResourcePath::parse(path, 1)
    }

    #[test]
    fn resource_paths() {
        assert_eq!(parse("/OData.svc/"), Ok(ResourcePath::ServiceDocument));
        assert_eq!(parse("/OData.svc"), Ok(ResourcePath::ServiceDocument));
        assert_eq!(parse("/OData.svc/$metadata"), Ok(ResourcePath::Metadata));
        assert_eq!(parse("/OData.svc/$batch"), Ok(ResourcePath::Batch));
        let set = || ResourcePath::EntitySet {
            entity_set: "TableName1s".to_string(),
        };
        assert_eq!(parse("/OData.svc/TableName1s"), Ok(set()));
        assert_eq!(parse("/OData.svc/TableName1s()"), Ok(set()));
        assert_eq!(
            parse("/OData.svc/TableName1s/$count"),
            Ok(ResourcePath::Count {
                entity_set: "TableName1s".to_string()
            })
        );
        assert_eq!(
            parse("/OData.svc/TableName1s(%27a%20b%27)"),
            Ok(ResourcePath::Entity {
                entity_set: "TableName1s".to_string(),
                key: "'a b'".to_string()
            })
        );
    }

    #[test]
    fn unsupported_shapes() {
        assert_eq!(parse("/OData.svc/TableName1s(1)/$links/Other"), Err(ODataError::bad_request()));
        assert_eq!(parse("/OData.svc/TableName1s(1)/$links"), Ok(ResourcePath::Unsupported));
        assert_eq!(parse("/OData.svc/TableName1s/$metadata"), Ok(ResourcePath::Unsupported));
        assert_eq!(parse("/OData.svc/TableName1s/Other"), Err(ODataError::bad_request()));
        assert_eq!(parse("/OData.svc/TableName1s(1"), Err(ODataError::bad_request()));
        assert_eq!(parse("/"), Err(ODataError::not_found()));
    }

    #[test]
    fn method_override() {
        assert_eq!(Method::resolve("POST", Some("MERGE")), Ok(Method::Merge));
        assert_eq!(Method::resolve("POST", None), Ok(Method::Post));
        assert_eq!(Method::resolve("GET", Some("DELETE")), Ok(Method::Get));
        assert_eq!(Method::resolve("OPTIONS", None), Err(ODataError::MethodNotAllowed));
    }

    #[test]
    fn service_root() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::HOST, "example.org:8080".parse().unwrap());
        assert_eq!(
            base_uri(None, &headers, "/OData.svc/TableName1s", 1),
            "http://example.org:8080/OData.svc/"
        );
        assert_eq!(
            base_uri(Some("http://localhost:80/OData.svc"), &headers, "/x", 1),
            "http://localhost:80/OData.svc/"
        );
    }

    #[test]
    fn query_pairs_are_decoded() {
        let pairs = QueryPairs::parse(Some("$filter=startswith(StrCol,'%25foo')&$format=json"));
        assert_eq!(pairs.get("$filter"), Some("startswith(StrCol,'%foo')"));
        assert_eq!(pairs.format(None), Format::Json);
        assert_eq!(pairs.callback(), None);
    }
}
