//! Read-only view of the incoming HTTP request

use crate::{WebError, WebResult};
use axum::http::{header, request::Parts, HeaderMap, Method, Uri};
use serde_json::Value;
use std::collections::HashMap;

/// Header set by XMLHttpRequest-based clients
pub const AJAX_HEADER: &str = "x-requested-with";
pub const AJAX_HEADER_VALUE: &str = "XMLHttpRequest";

/// Request parameters and headers for one request
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: HashMap<String, String>,
    body: HashMap<String, String>,
    secure: bool,
}

impl RequestContext {
    /// Build from request parts and the already collected body.
    ///
    /// Form and JSON object bodies become request parameters; any other
    /// content type is ignored. A malformed JSON body is a bad request.
    pub fn from_parts(parts: &Parts, body: &[u8], trust_forwarded_proto: bool) -> WebResult<Self> {
        let query = parts
            .uri
            .query()
            .map(|q| parse_urlencoded(q.as_bytes()))
            .unwrap_or_default();

        let body = parse_body(&parts.headers, body)?;
        let secure = is_secure_request(&parts.uri, &parts.headers, trust_forwarded_proto);

        Ok(Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            query,
            body,
            secure,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Whether the parameter is present in the query string or body
    pub fn has(&self, name: &str) -> bool {
        self.query.contains_key(name) || self.body.contains_key(name)
    }

    /// Query string first, then body
    pub fn get(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .or_else(|| self.body.get(name))
            .map(String::as_str)
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn body_params(&self) -> &HashMap<String, String> {
        &self.body
    }

    pub fn is_ajax(&self) -> bool {
        self.header(AJAX_HEADER)
            .is_some_and(|value| value.eq_ignore_ascii_case(AJAX_HEADER_VALUE))
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    /// Host header, falling back to the URI authority
    pub fn http_host(&self) -> &str {
        self.header(header::HOST.as_str())
            .or_else(|| self.uri.authority().map(|authority| authority.as_str()))
            .unwrap_or("localhost")
    }

    /// Path and query of the request URI
    pub fn uri(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }

    pub fn referer(&self) -> Option<&str> {
        self.header(header::REFERER.as_str())
            .filter(|value| !value.trim().is_empty())
    }
}

fn is_secure_request(uri: &Uri, headers: &HeaderMap, trust_forwarded_proto: bool) -> bool {
    if uri.scheme_str() == Some("https") {
        return true;
    }

    trust_forwarded_proto
        && headers
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

fn parse_urlencoded(input: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(input)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

fn parse_body(headers: &HeaderMap, body: &[u8]) -> WebResult<HashMap<String, String>> {
    if body.is_empty() {
        return Ok(HashMap::new());
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "application/x-www-form-urlencoded" => Ok(parse_urlencoded(body)),
        "application/json" => {
            let value: Value = serde_json::from_slice(body)
                .map_err(|e| WebError::BadRequest(format!("Invalid JSON body: {}", e)))?;
            Ok(json_params(value))
        }
        _ => Ok(HashMap::new()),
    }
}

/// Top-level fields of a JSON object as string parameters.
///
/// Strings are taken verbatim, other scalars use their JSON text, nested
/// values are kept as JSON and `null` fields are skipped.
fn json_params(value: Value) -> HashMap<String, String> {
    let Value::Object(object) = value else {
        return HashMap::new();
    };

    object
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}
