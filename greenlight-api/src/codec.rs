/// Strict JSON request decoding and enveloped response encoding
///
/// Request bodies are decoded fail-closed: exactly one JSON value, no unknown
/// keys, at most [`MAX_BODY_BYTES`]. Every failure is classified into one
/// [`DecodeError`] variant whose message is safe to return to the client.
///
/// Responses wrap the payload under a single top-level key and are written
/// as tab-indented JSON:
///
/// ```json
/// {
/// 	"movie": {
/// 		"id": 1,
/// 		"title": "Moana",
/// 		"version": 1
/// 	}
/// }
/// ```
///
/// # Example
///
/// ```
/// use greenlight_api::codec::{decode, DecodeError};
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// #[serde(deny_unknown_fields)]
/// struct Input {
///     title: String,
/// }
///
/// assert!(decode::<Input>(br#"{"title": "Moana"}"#).is_ok());
/// assert_eq!(
///     decode::<Input>(br#"{"title": "Moana", "rating": 5}"#).unwrap_err(),
///     DecodeError::UnknownField { name: "rating".to_string() }
/// );
/// assert_eq!(
///     decode::<Input>(br#"{"title": "Moana"} {}"#).unwrap_err(),
///     DecodeError::TrailingData
/// );
/// ```

use axum::{
    async_trait,
    body::{Body, Bytes},
    extract::{FromRequest, Request},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::error::Category;
use std::collections::HashMap;
use std::error::Error as StdError;
use validator::{ValidationError, ValidationErrors};

pub use greenlight_shared::json::{envelope, to_pretty};

use crate::error::{ApiError, SERVER_ERROR_MESSAGE};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 1_048_576;

/// Why a request body could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Not valid JSON; `offset` is the byte position of the problem
    #[error("body contains badly-formed JSON (at character {offset})")]
    MalformedSyntax { offset: usize },

    /// The body ended in the middle of a value
    #[error("body contains badly-formed JSON")]
    TruncatedBody,

    /// A key the target type does not declare
    #[error("body contains unknown key \"{name}\"")]
    UnknownField { name: String },

    /// Valid JSON, but a value of the wrong type
    #[error("{}", type_mismatch_message(.field, .offset))]
    TypeMismatch { field: Option<String>, offset: usize },

    /// The body exceeded the size limit
    #[error("body must not be larger than {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// Nothing but whitespace
    #[error("body must not be empty")]
    EmptyBody,

    /// Anything after the first value other than whitespace
    #[error("body must only contain a single JSON value")]
    TrailingData,

    /// Any other failure, message passed through
    #[error("{0}")]
    Other(String),
}

fn type_mismatch_message(field: &Option<String>, offset: &usize) -> String {
    match field {
        Some(field) => format!("body contains incorrect JSON type for field \"{field}\""),
        None => format!("body contains incorrect JSON type (at character {offset})"),
    }
}

/// Decodes exactly one JSON value from `body`
///
/// # Errors
///
/// One [`DecodeError`] describing the first problem found
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, DecodeError> {
    let mut de = serde_json::Deserializer::from_slice(body);

    let value = T::deserialize(&mut de).map_err(|e| classify(body, &e))?;
    de.end().map_err(|_| DecodeError::TrailingData)?;

    Ok(value)
}

/// Reads a request body, enforcing `limit`
pub async fn read_body(body: Body, limit: usize) -> Result<Bytes, DecodeError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        let inner = e.into_inner();
        if is_length_limit(inner.as_ref()) {
            DecodeError::BodyTooLarge { limit }
        } else {
            DecodeError::Other(inner.to_string())
        }
    })
}

fn is_length_limit(err: &(dyn StdError + Send + Sync + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

fn classify(body: &[u8], err: &serde_json::Error) -> DecodeError {
    let offset = byte_offset(body, err.line(), err.column());

    match err.classify() {
        Category::Eof if body.iter().all(u8::is_ascii_whitespace) => DecodeError::EmptyBody,
        Category::Eof => DecodeError::TruncatedBody,
        Category::Syntax => DecodeError::MalformedSyntax { offset },
        Category::Data => {
            let message = err.to_string();
            if let Some(name) = quoted_name(&message, "unknown field `") {
                DecodeError::UnknownField { name }
            } else if let Some(name) = quoted_name(&message, "missing field `") {
                DecodeError::Other(format!("body is missing key \"{name}\""))
            } else {
                DecodeError::TypeMismatch {
                    field: field_at(body, offset),
                    offset,
                }
            }
        }
        Category::Io => DecodeError::Other(err.to_string()),
    }
}

fn quoted_name(message: &str, prefix: &str) -> Option<String> {
    let rest = message.strip_prefix(prefix)?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}

/// Converts serde_json's 1-based line/column into a byte offset
fn byte_offset(body: &[u8], line: usize, column: usize) -> usize {
    let line_start: usize = body
        .split(|&b| b == b'\n')
        .take(line.saturating_sub(1))
        .map(|l| l.len() + 1)
        .sum();
    (line_start + column).min(body.len())
}

enum Frame {
    Object { key: Option<String>, expecting_key: bool },
    Array,
}

/// Dotted path of the object key whose value contains `offset`
///
/// Walks the (already known to be well-formed up to `offset`) body
/// tracking the keys of the enclosing objects.
fn field_at(body: &[u8], offset: usize) -> Option<String> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut i = 0;
    let end = offset.min(body.len());

    while i < end {
        match body[i] {
            b'{' => stack.push(Frame::Object {
                key: None,
                expecting_key: true,
            }),
            b'[' => stack.push(Frame::Array),
            b'}' | b']' => {
                stack.pop();
            }
            b',' => {
                if let Some(Frame::Object { expecting_key, .. }) = stack.last_mut() {
                    *expecting_key = true;
                }
            }
            b'"' => {
                let start = i + 1;
                i += 1;
                while i < body.len() && body[i] != b'"' {
                    if body[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                if let Some(Frame::Object { key, expecting_key }) = stack.last_mut() {
                    if *expecting_key {
                        let text = &body[start..i.min(body.len())];
                        *key = Some(String::from_utf8_lossy(text).into_owned());
                        *expecting_key = false;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    let path: Vec<&str> = stack
        .iter()
        .filter_map(|frame| match frame {
            Frame::Object { key, .. } => key.as_deref(),
            Frame::Array => None,
        })
        .collect();

    if path.is_empty() {
        None
    } else {
        Some(path.join("."))
    }
}

/// Request body extractor applying [`decode`] with the default size limit
///
/// Rejections are [`ApiError::BadRequest`] carrying the decode message.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for StrictJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let bytes = read_body(req.into_body(), MAX_BODY_BYTES).await?;
        Ok(StrictJson(decode(&bytes)?))
    }
}

/// Builds an enveloped JSON response
///
/// Caller headers are applied first and `Content-Type` is always set. A
/// payload that cannot be serialized turns into a logged 500; nothing else
/// can fail.
pub fn encode<T: Serialize + ?Sized>(
    status: StatusCode,
    key: &str,
    payload: &T,
    headers: HeaderMap,
) -> Response {
    respond(status, envelope(key, payload), headers)
}

/// Builds a JSON response whose top-level object has several keys
///
/// `document` must serialize to an object, such as a struct with one field
/// per envelope key.
pub fn encode_document<T: Serialize + ?Sized>(
    status: StatusCode,
    document: &T,
    headers: HeaderMap,
) -> Response {
    respond(status, to_pretty(document), headers)
}

fn respond(
    status: StatusCode,
    body: Result<Vec<u8>, serde_json::Error>,
    headers: HeaderMap,
) -> Response {
    let (status, body) = match body {
        Ok(body) => (status, body),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response");
            let fallback = format!("{{\n\t\"error\": \"{SERVER_ERROR_MESSAGE}\"\n}}\n");
            (StatusCode::INTERNAL_SERVER_ERROR, fallback.into_bytes())
        }
    };

    let mut response = (status, body).into_response();
    response.headers_mut().extend(headers);
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Query string parameters
pub type QueryParams = HashMap<String, String>;

/// String parameter, or `default` when absent or empty
pub fn read_string(qs: &QueryParams, key: &str, default: &str) -> String {
    match qs.get(key) {
        Some(value) if !value.is_empty() => value.clone(),
        _ => default.to_string(),
    }
}

/// Comma-separated parameter, or `default` when absent or empty
pub fn read_csv(qs: &QueryParams, key: &str, default: &[&str]) -> Vec<String> {
    match qs.get(key) {
        Some(value) if !value.is_empty() => value.split(',').map(str::to_string).collect(),
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}

/// Integer parameter, or `default` when absent or empty
///
/// A value that is present but not an integer is recorded in `errors` and
/// `default` is returned.
pub fn read_int(qs: &QueryParams, key: &'static str, default: i64, errors: &mut ValidationErrors) -> i64 {
    match qs.get(key) {
        Some(value) if !value.is_empty() => value.parse().unwrap_or_else(|_| {
            let mut error = ValidationError::new("integer");
            error.message = Some("must be an integer value".into());
            errors.add(key, error);
            default
        }),
        _ => default,
    }
}
