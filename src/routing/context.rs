//! Per-request context shared by every step of a route chain.

use std::fmt;

use axum::{
    body::{Body, Bytes},
    extract::{FromRequestParts, Query, RawPathParams, Request},
    http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value, json, map::Entry};

use crate::error::{AppError, AppResult, HttpError};

/// Key under which the preload step stores its result in [`RouteContext::locals`].
pub const PRELOAD_KEY: &str = "data";

/// Named part of an incoming request that a schema can validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestPart {
    Headers,
    Query,
    Params,
    Body,
}

impl RequestPart {
    /// Validation order used by route chains.
    pub const ORDERED: [RequestPart; 4] = [
        RequestPart::Headers,
        RequestPart::Query,
        RequestPart::Params,
        RequestPart::Body,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RequestPart::Headers => "headers",
            RequestPart::Query => "query",
            RequestPart::Params => "params",
            RequestPart::Body => "body",
        }
    }
}

impl fmt::Display for RequestPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a step can see and change while a request moves down the chain.
#[derive(Debug)]
pub struct RouteContext {
    pub req: RouteRequest,
    pub res: RouteResponse,
    /// Scratch data computed by earlier steps (e.g. preloaded records)
    pub locals: Map<String, Value>,
}

impl RouteContext {
    pub fn new(req: RouteRequest) -> Self {
        Self {
            req,
            res: RouteResponse::new(),
            locals: Map::new(),
        }
    }

    /// Value stored by the preload step, if one ran.
    pub fn preloaded(&self) -> Option<&Value> {
        self.locals.get(PRELOAD_KEY)
    }
}

/// Incoming request with its parts decoded into JSON values.
///
/// Header names are lowercase; query and path parameters are strings until a
/// schema converts them.
#[derive(Debug)]
pub struct RouteRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: Value,
    pub query: Value,
    pub params: Value,
    pub body: Value,
    /// Typed data attached by steps, e.g. the authenticated user
    pub extensions: Extensions,
}

impl RouteRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: Value::Object(Map::new()),
            query: Value::Object(Map::new()),
            params: Value::Object(Map::new()),
            body: Value::Object(Map::new()),
            extensions: Extensions::new(),
        }
    }

    pub fn with_part(mut self, part: RequestPart, value: Value) -> Self {
        *self.part_mut(part) = value;
        self
    }

    pub fn part(&self, part: RequestPart) -> &Value {
        match part {
            RequestPart::Headers => &self.headers,
            RequestPart::Query => &self.query,
            RequestPart::Params => &self.params,
            RequestPart::Body => &self.body,
        }
    }

    pub fn part_mut(&mut self, part: RequestPart) -> &mut Value {
        match part {
            RequestPart::Headers => &mut self.headers,
            RequestPart::Query => &mut self.query,
            RequestPart::Params => &mut self.params,
            RequestPart::Body => &mut self.body,
        }
    }

    /// Swaps a part for `value`, returning the previous one.
    pub fn replace_part(&mut self, part: RequestPart, value: Value) -> Value {
        std::mem::replace(self.part_mut(part), value)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name.to_ascii_lowercase())
            .and_then(Value::as_str)
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn url(&self) -> String {
        self.uri.to_string()
    }

    /// Decodes an axum request into its JSON parts.
    ///
    /// An empty body decodes to `{}`. Bodies over `body_limit` bytes fail with
    /// 413, malformed JSON with 400.
    pub(crate) async fn from_axum(request: Request, body_limit: usize) -> AppResult<Self> {
        let (mut parts, body) = request.into_parts();

        let params = match RawPathParams::from_request_parts(&mut parts, &()).await {
            Ok(raw) => raw
                .iter()
                .map(|(key, value)| (key.to_owned(), Value::String(value.to_owned())))
                .collect::<Map<_, _>>(),
            Err(_) => Map::new(),
        };

        let Query(pairs) =
            Query::<Vec<(String, String)>>::try_from_uri(&parts.uri).map_err(|rejection| {
                HttpError::bad_request("Invalid query string")
                    .with_data(json!({ "error": rejection.body_text() }))
            })?;

        let body = read_json_body(body, body_limit).await?;

        let mut request = Self::new(parts.method, parts.uri);
        request.headers = headers_to_json(&parts.headers);
        request.query = query_to_json(pairs);
        request.params = Value::Object(params);
        request.body = body;
        request.extensions = parts.extensions;
        Ok(request)
    }
}

/// Query pairs as an object; a key given more than once maps to an array.
fn query_to_json(pairs: Vec<(String, String)>) -> Value {
    let mut map = Map::new();
    for (key, value) in pairs {
        match map.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(Value::String(value));
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Array(values) => values.push(Value::String(value)),
                existing => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value)]);
                }
            },
        }
    }
    Value::Object(map)
}

fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");
        map.insert(name.as_str().to_owned(), Value::String(joined));
    }
    Value::Object(map)
}

async fn read_json_body(body: Body, limit: usize) -> AppResult<Value> {
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| HttpError::payload_too_large("Request body too large"))?;
    if bytes.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(&bytes).map_err(|error| {
        AppError::from(
            HttpError::bad_request("Invalid JSON body")
                .with_data(json!({ "error": error.to_string() })),
        )
    })
}

/// Response under construction.
///
/// Once [`json`](Self::json) or [`end`](Self::end) is called the response
/// counts as sent and later writes are rejected.
#[derive(Debug)]
pub struct RouteResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
    sent: bool,
}

impl RouteResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
            sent: false,
        }
    }

    pub fn headers_sent(&self) -> bool {
        self.sent
    }

    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Sends `body` as JSON with the current status.
    pub fn json<T: Serialize + ?Sized>(&mut self, body: &T) -> AppResult<()> {
        self.ensure_unsent()?;
        let bytes = serde_json::to_vec(body)
            .map_err(|error| anyhow::Error::new(error).context("serializing response body"))?;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(Bytes::from(bytes));
        self.sent = true;
        Ok(())
    }

    /// Sends the response with no body.
    pub fn end(&mut self) -> AppResult<()> {
        self.ensure_unsent()?;
        self.body = None;
        self.sent = true;
        Ok(())
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Parsed JSON body, if one was sent.
    pub fn json_body(&self) -> Option<Value> {
        self.body
            .as_ref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }

    fn ensure_unsent(&self) -> AppResult<()> {
        if self.sent {
            return Err(AppError::internal("response already sent"));
        }
        Ok(())
    }
}

impl Default for RouteResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoResponse for RouteResponse {
    fn into_response(self) -> Response {
        let body = self.body.map(Body::from).unwrap_or_else(Body::empty);
        let mut response = (self.status, body).into_response();
        response.headers_mut().extend(self.headers);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method(Method::POST)
            .uri("/users?page=2&sort=name")
            .header(header::CONTENT_TYPE, "application/json")
            .header("X-Trace", "abc")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_from_axum_decodes_parts() {
        let request = RouteRequest::from_axum(json_request(r#"{"name":"bob"}"#), 1024)
            .await
            .unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.query, json!({"page": "2", "sort": "name"}));
        assert_eq!(request.body, json!({"name": "bob"}));
        assert_eq!(request.header("x-trace"), Some("abc"));
        assert_eq!(request.header("X-Trace"), Some("abc"));
        assert_eq!(request.params, json!({}));
    }

    #[tokio::test]
    async fn test_repeated_query_keys_become_arrays() {
        let request = Request::builder()
            .uri("/search?tag=a&q=x&tag=b&tag=c")
            .body(Body::empty())
            .unwrap();
        let request = RouteRequest::from_axum(request, 1024).await.unwrap();
        assert_eq!(request.query, json!({"tag": ["a", "b", "c"], "q": "x"}));
    }

    #[tokio::test]
    async fn test_empty_body_is_empty_object() {
        let request = RouteRequest::from_axum(json_request(""), 1024).await.unwrap();
        assert_eq!(request.body, json!({}));
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let error = RouteRequest::from_axum(json_request("{nope"), 1024)
            .await
            .unwrap_err();
        match error {
            AppError::Http(http) => assert_eq!(http.status(), StatusCode::BAD_REQUEST),
            other => panic!("Expected Http error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oversized_body_is_payload_too_large() {
        let error = RouteRequest::from_axum(json_request(r#"{"name":"a long name"}"#), 4)
            .await
            .unwrap_err();
        match error {
            AppError::Http(http) => assert_eq!(http.status(), StatusCode::PAYLOAD_TOO_LARGE),
            other => panic!("Expected Http error, got {:?}", other),
        }
    }

    #[test]
    fn test_response_rejects_second_send() {
        let mut response = RouteResponse::new();
        response.status(StatusCode::CREATED).json(&json!({"id": 1})).unwrap();
        assert!(response.headers_sent());
        assert_eq!(response.status_code(), StatusCode::CREATED);
        assert_eq!(response.json_body(), Some(json!({"id": 1})));
        assert!(response.end().is_err());
    }

    #[test]
    fn test_replace_part_returns_previous() {
        let mut request = RouteRequest::new(Method::GET, Uri::from_static("/"))
            .with_part(RequestPart::Query, json!({"q": "1"}));
        let previous = request.replace_part(RequestPart::Query, json!({"q": 1}));
        assert_eq!(previous, json!({"q": "1"}));
        assert_eq!(request.query, json!({"q": 1}));
    }
}
