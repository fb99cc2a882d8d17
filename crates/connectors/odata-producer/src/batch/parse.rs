//! Splitting a `$batch` body into the requests it carries.
//!
//! Parsing is lenient: part headers and the request line may be interleaved, the
//! HTTP version of a request line is optional, and the closing delimiter may be
//! missing.

use crate::error::ODataError;
use crate::request::Method;

pub const EXPECTING_MULTIPART: &str = "Expecting a valid multipart request and payload";

/// One request of a batch, before it is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPart {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl BatchPart {
    /// A request header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn expecting_multipart() -> ODataError {
    ODataError::BadRequest(EXPECTING_MULTIPART.to_string())
}

/// Split a batch body. Without a multipart content type the body is only accepted
/// when `allow_any_request_body` is set, and the boundary is taken from the body.
pub fn parse_batch(
    content_type: Option<&str>,
    body: &str,
    allow_any_request_body: bool,
) -> Result<Vec<BatchPart>, ODataError> {
    if body.trim().is_empty() {
        return Err(expecting_multipart());
    }
    let multipart = content_type.filter(|content_type| {
        content_type
            .trim_start()
            .to_ascii_lowercase()
            .starts_with("multipart/")
    });
    if multipart.is_none() && !allow_any_request_body {
        return Err(expecting_multipart());
    }
    let boundary = multipart
        .and_then(boundary_parameter)
        .or_else(|| {
            if allow_any_request_body {
                sniff_boundary(body)
            } else {
                None
            }
        })
        .ok_or_else(expecting_multipart)?;

    let lines: Vec<&str> = body.lines().collect();
    parse_multipart(&lines, &boundary, 0)
}

/// The `boundary` parameter of a content type, unquoted.
pub fn boundary_parameter(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|parameter| {
        let (name, value) = parameter.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("boundary") {
            let value = value.trim().trim_matches('"');
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

/// The first delimiter line of a body, `--boundary`.
fn sniff_boundary(body: &str) -> Option<String> {
    let first = body.lines().map(str::trim).find(|line| !line.is_empty())?;
    let boundary = first.strip_prefix("--")?;
    (!boundary.is_empty()).then(|| boundary.to_string())
}

fn parse_multipart(lines: &[&str], boundary: &str, depth: usize) -> Result<Vec<BatchPart>, ODataError> {
    let delimiter = format!("--{boundary}");
    let close = format!("--{boundary}--");

    let mut sections: Vec<Vec<&str>> = vec![];
    let mut current: Option<Vec<&str>> = None;
    for &line in lines {
        let trimmed = line.trim_end();
        if trimmed == close {
            break;
        } else if trimmed == delimiter {
            if let Some(section) = current.replace(vec![]) {
                sections.push(section);
            }
        } else if let Some(section) = current.as_mut() {
            section.push(line);
        }
    }
    if let Some(section) = current {
        sections.push(section);
    }
    if sections.is_empty() {
        return Err(expecting_multipart());
    }

    let mut parts = vec![];
    for section in sections {
        parts.extend(parse_section(&section, depth)?);
    }
    Ok(parts)
}

/// `GET /OData.svc/TableName1s HTTP/1.1` or `DELETE TableName1s(1)`.
fn request_line(line: &str) -> Option<(String, String)> {
    let mut tokens = line.split_whitespace();
    let method = tokens.next()?;
    let url = tokens.next()?;
    let is_method = method.chars().all(|c| c.is_ascii_uppercase()) && Method::parse(method).is_some();
    is_method.then(|| (method.to_string(), url.to_string()))
}

fn header_line(line: &str) -> Option<(String, String)> {
    let (name, value) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

fn invalid_part(reason: &str) -> ODataError {
    ODataError::BadRequest(format!("Invalid batch part: {reason}"))
}

/// One section between delimiters: either a changeset holding more sections, or a
/// single request.
fn parse_section(lines: &[&str], depth: usize) -> Result<Vec<BatchPart>, ODataError> {
    let mut index = 0;
    let mut section_headers = vec![];
    while let Some(line) = lines.get(index).map(|line| line.trim()) {
        if line.is_empty() {
            index += 1;
            if section_headers.is_empty() {
                continue;
            }
            break;
        }
        if request_line(line).is_some() {
            break;
        }
        let header = header_line(line).ok_or_else(|| invalid_part("malformed header"))?;
        section_headers.push(header);
        index += 1;
    }

    let changeset = section_headers.iter().find_map(|(name, value)| {
        (name.eq_ignore_ascii_case("Content-Type")
            && value.to_ascii_lowercase().starts_with("multipart/mixed"))
        .then_some(value.as_str())
    });
    if let Some(content_type) = changeset {
        if depth > 0 {
            return Err(ODataError::BadRequest(
                "Nested changesets are not supported".to_string(),
            ));
        }
        let boundary = boundary_parameter(content_type).ok_or_else(expecting_multipart)?;
        return parse_multipart(&lines[index..], &boundary, depth + 1);
    }

    while lines.get(index).is_some_and(|line| line.trim().is_empty()) {
        index += 1;
    }
    if index >= lines.len() {
        // a trailing empty section
        return Ok(vec![]);
    }
    let (method, url) = request_line(lines[index].trim()).ok_or_else(|| invalid_part("missing request line"))?;
    index += 1;

    let mut headers = vec![];
    while let Some(line) = lines.get(index).map(|line| line.trim()) {
        if line.is_empty() {
            index += 1;
            break;
        }
        match header_line(line) {
            Some(header) => {
                headers.push(header);
                index += 1;
            }
            None => break,
        }
    }

    let body = lines[index..].join("\n").trim().to_string();
    Ok(vec![BatchPart {
        method,
        url,
        headers,
        body,
    }])
}
