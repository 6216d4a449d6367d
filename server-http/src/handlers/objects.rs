use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use keeper::domain::{BlobMetadata, BlobObject, ByteRange};
use keeper::planes::data::operation::ObjectOperations;
use shared::Error;
use tracing::info;

/// Failure of an object request, rendered as a plain-text response
#[derive(Debug)]
pub struct ObjectError {
    key: String,
    error: Error,
}

impl ObjectError {
    fn new(key: &str, error: Error) -> Self {
        Self {
            key: key.to_string(),
            error,
        }
    }
}

impl IntoResponse for ObjectError {
    fn into_response(self) -> Response {
        match self.error {
            Error::InvalidKey(_) => (
                StatusCode::BAD_REQUEST,
                "A key in the URL path is required. e.g., /my-object-key",
            )
                .into_response(),
            Error::InvalidRequest(_) => {
                (StatusCode::BAD_REQUEST, "Request body is required for PUT.").into_response()
            }
            Error::InvalidRange(reason) => {
                (StatusCode::RANGE_NOT_SATISFIABLE, format!("Range not satisfiable: {reason}"))
                    .into_response()
            }
            Error::NotFound => (
                StatusCode::NOT_FOUND,
                format!("Object with key \"{}\" not found.", self.key),
            )
                .into_response(),
            error => {
                tracing::error!("Request for '{}' failed: {}", self.key, error);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

/// Parse a single-range `Range` header; anything else means "whole object"
fn parse_range(value: &str) -> Option<ByteRange> {
    let ranges = value.trim().strip_prefix("bytes=")?;
    if ranges.contains(',') {
        return None;
    }
    let (first, last) = ranges.split_once('-')?;
    match (first.trim(), last.trim()) {
        ("", "") => None,
        ("", suffix) => suffix.parse().ok().map(ByteRange::Suffix),
        (first, "") => first.parse().ok().map(ByteRange::From),
        (first, last) => {
            let (first, last): (u64, u64) = (first.parse().ok()?, last.parse().ok()?);
            (first <= last).then_some(ByteRange::Bounded { first, last })
        }
    }
}

fn metadata_from_headers(headers: &HeaderMap) -> BlobMetadata {
    let value = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    BlobMetadata {
        content_type: value(header::CONTENT_TYPE),
        content_encoding: value(header::CONTENT_ENCODING),
        content_language: value(header::CONTENT_LANGUAGE),
        content_disposition: value(header::CONTENT_DISPOSITION),
        cache_control: value(header::CACHE_CONTROL),
        expires: value(header::EXPIRES),
    }
}

fn object_headers(object: &BlobObject) -> HeaderMap {
    let metadata = &object.metadata;
    let replayed = [
        (header::CONTENT_TYPE, &metadata.content_type),
        (header::CONTENT_ENCODING, &metadata.content_encoding),
        (header::CONTENT_LANGUAGE, &metadata.content_language),
        (header::CONTENT_DISPOSITION, &metadata.content_disposition),
        (header::CACHE_CONTROL, &metadata.cache_control),
        (header::EXPIRES, &metadata.expires),
    ];

    let mut headers = HeaderMap::new();
    for (name, value) in replayed {
        if let Some(value) = value.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
            headers.insert(name, value);
        }
    }
    if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", object.etag)) {
        headers.insert(header::ETAG, etag);
    }
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Some(range) = object.range {
        let content_range = format!("bytes {}-{}/{}", range.offset, range.last(), object.size);
        if let Ok(content_range) = HeaderValue::from_str(&content_range) {
            headers.insert(header::CONTENT_RANGE, content_range);
        }
    }
    headers
}

/// GET /{key}
pub async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ObjectError> {
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range);
    info!("GET: key={}, range={:?}", key, range);

    let object = state
        .gateway
        .get(&key, range)
        .await
        .map_err(|e| ObjectError::new(&key, e))?
        .ok_or_else(|| ObjectError::new(&key, Error::NotFound))?;

    let status = if object.range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let headers = object_headers(&object);
    Ok((status, headers, object.body).into_response())
}

/// PUT /{key}
pub async fn put_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ObjectError> {
    info!("PUT: key={}, size={}", key, body.len());

    let stored = state
        .gateway
        .put(&key, body, metadata_from_headers(&headers))
        .await
        .map_err(|e| ObjectError::new(&key, e))?;

    let mut response = (
        StatusCode::OK,
        format!("Object with key \"{}\" stored successfully.", key),
    )
        .into_response();
    if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", stored.etag)) {
        response.headers_mut().insert(header::ETAG, etag);
    }
    Ok(response)
}

/// Any request to `/`
pub async fn missing_key() -> ObjectError {
    ObjectError::new("", Error::InvalidKey("empty key".to_string()))
}

pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "GET, PUT")],
        "Method Not Allowed",
    )
        .into_response()
}
