//! Response normalization
//!
//! Turns a raw transport outcome into either the decoded success value or a
//! [`CanonicalError`]. Both error wire shapes are decoded here and nowhere
//! else:
//!
//! - legacy: `{ "response": "message" }`
//! - modern: `{ "error": "message" }` or `{ "errors": ["a", "b"] }`

use super::endpoint::Generation;
use super::error::{ApiResult, CanonicalError, ErrorKind};
use super::http::{ApiResponse, TransportError};
use serde::Deserialize;
use serde_json::Value;

/// Union of the known error body shapes
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    response: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    errors: Option<Value>,
}

impl ErrorBody {
    fn errors_message(&self) -> Option<String> {
        match self.errors.as_ref()? {
            Value::Array(items) => {
                let messages: Vec<String> = items.iter().filter_map(value_message).collect();
                (!messages.is_empty()).then(|| messages.join(", "))
            },
            other => value_message(other),
        }
    }

    fn error_message(&self) -> Option<String> {
        self.error.as_ref().and_then(value_message)
    }

    fn response_message(&self) -> Option<String> {
        self.response.as_ref().and_then(value_message)
    }

    /// Pick the message in the fixed priority order for `generation`
    fn message(&self, generation: Generation) -> Option<String> {
        match generation {
            Generation::Modern => self
                .errors_message()
                .or_else(|| self.error_message())
                .or_else(|| self.response_message()),
            Generation::Legacy => self
                .response_message()
                .or_else(|| self.errors_message())
                .or_else(|| self.error_message()),
        }
    }
}

fn value_message(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => return None,
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// Build the canonical error for a non-2xx response
pub fn decode_error(response: &ApiResponse, generation: Generation) -> CanonicalError {
    let status = response.status;
    let body = response.body.trim();

    let message = if body.is_empty() {
        None
    } else {
        let value: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => {
                return CanonicalError::new(
                    ErrorKind::ParseFailure,
                    format!("Failed to parse error response: {}", e),
                    status,
                )
            },
        };
        match value {
            Value::Object(_) => serde_json::from_value::<ErrorBody>(value)
                .unwrap_or_default()
                .message(generation),
            other => value_message(&other),
        }
    };

    let message = message.unwrap_or_else(|| CanonicalError::fallback_message(status));
    CanonicalError::new(ErrorKind::from_status(status), message, status)
}

/// Normalize the outcome of a single call.
///
/// `on_empty` is returned for a 2xx response without a body (204, or an
/// empty 200): the submitted payload for inserts/updates, `null` for deletes.
pub fn normalize(
    outcome: Result<ApiResponse, TransportError>,
    generation: Generation,
    on_empty: Value,
) -> ApiResult<Value> {
    let response = outcome.map_err(|e| CanonicalError::network(e.0))?;

    if !response.is_success() {
        return Err(decode_error(&response, generation));
    }

    if response.status == 204 || response.body.trim().is_empty() {
        return Ok(on_empty);
    }

    serde_json::from_str(&response.body).map_err(|e| {
        CanonicalError::new(
            ErrorKind::ParseFailure,
            format!("Failed to parse response JSON: {}", e),
            response.status,
        )
    })
}

/// Normalize a list fetch.
///
/// Legacy list endpoints answer 404 when there are no rows; that becomes an
/// empty list. The modern generation never uses 404 for this, so a modern 404
/// is a contract violation and fails as `Unknown`.
pub fn normalize_list(
    outcome: Result<ApiResponse, TransportError>,
    generation: Generation,
) -> ApiResult<Vec<Value>> {
    let response = outcome.map_err(|e| CanonicalError::network(e.0))?;

    if response.status == 404 {
        return match generation {
            Generation::Legacy => Ok(Vec::new()),
            Generation::Modern => {
                let decoded = decode_error(&response, generation);
                Err(CanonicalError::new(
                    ErrorKind::Unknown,
                    format!("Unexpected 404 from list endpoint: {}", decoded.message),
                    404,
                ))
            },
        };
    }

    let status = response.status;
    match normalize(Ok(response), generation, Value::Array(Vec::new()))? {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(CanonicalError::new(
            ErrorKind::ParseFailure,
            format!("Expected a JSON array, got {}", json_type(&other)),
            status,
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
