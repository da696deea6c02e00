//! Request payload normalization.
//!
//! Collects the raw body under a configurable size cap and decodes it into a
//! `serde_json::Value` according to the declared content type, so downstream
//! handlers see a parsed in-memory value instead of a byte stream. JSON and
//! form-encoded bodies are supported; form keys may nest with bracket
//! notation (`user[name]=x`, `tags[]=a&tags[]=b`). Business-level shape
//! validation stays with the route handlers.
use axum::body::Body;
use http_body_util::{BodyExt, Limited};
use serde_json::Value;

use crate::core::error::IngressError;

/// Bounds and decodes request bodies.
pub struct RequestNormalizer {
    max_body_bytes: usize,
}

impl RequestNormalizer {
    pub fn new(max_body_bytes: usize) -> Self {
        Self { max_body_bytes }
    }

    /// Collect the body under the size cap and decode it per content type.
    /// Returns `None` for empty bodies or content types the pipeline does
    /// not decode.
    pub async fn normalize(
        &self,
        content_type: Option<&str>,
        body: Body,
    ) -> Result<Option<Value>, IngressError> {
        let limited = Limited::new(body, self.max_body_bytes);
        let bytes = match limited.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(error) => {
                // Limited surfaces overflow as a LengthLimitError wrapped in
                // a boxed error; anything else is a transport-level failure.
                if error.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
                    return Err(IngressError::PayloadTooLarge {
                        limit: self.max_body_bytes,
                    });
                }
                return Err(IngressError::Validation(format!(
                    "failed to read request body: {error}"
                )));
            }
        };

        if bytes.is_empty() {
            return Ok(None);
        }

        // Parameters like "; charset=utf-8" do not affect the media type.
        let media_type = content_type
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase());

        match media_type.as_deref() {
            Some("application/json") => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| IngressError::Validation(format!("malformed JSON body: {e}"))),
            Some("application/x-www-form-urlencoded") => Ok(Some(decode_form(&bytes))),
            _ => Ok(None),
        }
    }
}

/// Decode a form-encoded body into a nested JSON value. Bracketed key
/// segments nest objects; an empty trailing segment (`tags[]`) appends to an
/// array. Repeated scalar keys keep the last value, matching common
/// querystring semantics.
fn decode_form(bytes: &[u8]) -> Value {
    let mut root = Value::Object(serde_json::Map::new());
    for (key, value) in url::form_urlencoded::parse(bytes) {
        let segments = split_key(&key);
        insert_path(&mut root, &segments, Value::String(value.into_owned()));
    }
    root
}

/// Split `a[b][c]` into `["a", "b", "c"]`; a trailing `[]` yields an empty
/// final segment, which signals array append.
fn split_key(key: &str) -> Vec<String> {
    match key.find('[') {
        None => vec![key.to_string()],
        Some(open) => {
            let mut segments = vec![key[..open].to_string()];
            let mut rest = &key[open..];
            while let Some(stripped) = rest.strip_prefix('[') {
                match stripped.find(']') {
                    Some(close) => {
                        segments.push(stripped[..close].to_string());
                        rest = &stripped[close + 1..];
                    }
                    None => {
                        // Unbalanced bracket: keep the remainder literally.
                        segments.push(stripped.to_string());
                        break;
                    }
                }
            }
            segments
        }
    }
}

fn insert_path(target: &mut Value, segments: &[String], value: Value) {
    let Some((head, tail)) = segments.split_first() else {
        return;
    };

    if head.is_empty() {
        // `[]` segment: append to an array at this level.
        if !target.is_array() {
            *target = Value::Array(Vec::new());
        }
        if let Some(items) = target.as_array_mut() {
            if tail.is_empty() {
                items.push(value);
            } else {
                let mut child = Value::Object(serde_json::Map::new());
                insert_path(&mut child, tail, value);
                items.push(child);
            }
        }
        return;
    }

    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    let map = target.as_object_mut().expect("target coerced to object above");
    if tail.is_empty() {
        map.insert(head.clone(), value);
    } else {
        let child = map
            .entry(head.clone())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        insert_path(child, tail, value);
    }
}
