//! Response envelope normalization
//!
//! Every non-raw response is either an error envelope or
//! `{"result": {...}}`. [`parse_envelope`] turns a raw status/body pair into
//! the `result` value or a typed error; the `expect_*` helpers then check the
//! shape a given operation needs.

use crate::{ClientError, Result};
use serde_json::Value;
use tracing::warn;

/// Status codes at or below this mean no real HTTP response was obtained
pub const MIN_HTTP_STATUS: u16 = 100;

/// Interpret a raw response and return its `result` value
pub fn parse_envelope(status: u16, body: &[u8]) -> Result<Value> {
    let envelope = parse_json(status, body)?;

    if let Some(err) = ClientError::from_envelope(&envelope, status) {
        warn!("API error: {}", err);
        return Err(err);
    }

    if status >= 400 {
        let err = ClientError::Api {
            status,
            code: format!("HTTP{}", status),
            message: String::from_utf8_lossy(body).into_owned(),
        };
        warn!("API error: {}", err);
        return Err(err);
    }

    match envelope {
        Value::Object(mut obj) => match obj.remove("result") {
            Some(result) if !result.is_null() => Ok(result),
            _ => Err(ClientError::InvalidResponse(
                "response has no result".to_string(),
            )),
        },
        other => Err(ClientError::InvalidResponse(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

/// Check the status threshold and parse the body as JSON
pub fn parse_json(status: u16, body: &[u8]) -> Result<Value> {
    check_status(status, body)?;

    match serde_json::from_slice::<Value>(body) {
        Ok(value) => Ok(value),
        Err(_) if status >= 400 => Err(ClientError::Api {
            status,
            code: format!("HTTP{}", status),
            message: String::from_utf8_lossy(body).into_owned(),
        }),
        Err(e) => Err(ClientError::InvalidResponse(format!(
            "response is not JSON: {}",
            e
        ))),
    }
}

/// Reject statuses that mean the transport got no real answer
pub fn check_status(status: u16, body: &[u8]) -> Result<()> {
    if status <= MIN_HTTP_STATUS {
        warn!("No usable HTTP response (status {})", status);
        return Err(ClientError::Transport {
            status,
            message: if body.is_empty() {
                "no HTTP response received".to_string()
            } else {
                String::from_utf8_lossy(body).into_owned()
            },
        });
    }
    Ok(())
}

/// `result.items` as a sequence
pub fn expect_items(result: Value) -> Result<Vec<Value>> {
    match result {
        Value::Object(mut obj) => match obj.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Err(ClientError::InvalidResponse(
                "result has no items".to_string(),
            )),
            Some(other) => Err(ClientError::InvalidResponse(format!(
                "result.items is {}, expected an array",
                type_name(&other)
            ))),
        },
        other => Err(ClientError::InvalidResponse(format!(
            "result is {}, expected an object",
            type_name(&other)
        ))),
    }
}

/// `result.items[0]`
pub fn expect_first_item(result: Value) -> Result<Value> {
    expect_items(result)?
        .into_iter()
        .next()
        .ok_or_else(|| ClientError::InvalidResponse("result.items is empty".to_string()))
}

/// A list that may be sent bare (`result: [...]`) or wrapped (`result.items`)
pub fn expect_list(result: Value) -> Result<Vec<Value>> {
    match result {
        Value::Array(items) => Ok(items),
        other => expect_items(other),
    }
}

/// `result.success`
pub fn expect_success(result: &Value) -> Result<bool> {
    result
        .get("success")
        .and_then(Value::as_bool)
        .ok_or_else(|| ClientError::InvalidResponse("result has no success flag".to_string()))
}

/// `result.meta` when present, otherwise `result` itself
pub fn expect_meta(result: Value) -> Result<Value> {
    match result {
        Value::Object(mut obj) => match obj.remove("meta") {
            Some(meta @ Value::Object(_)) => Ok(meta),
            Some(_) => Err(ClientError::InvalidResponse(
                "result.meta is not an object".to_string(),
            )),
            None => Ok(Value::Object(obj)),
        },
        other => Err(ClientError::InvalidResponse(format!(
            "result is {}, expected an object",
            type_name(&other)
        ))),
    }
}

/// A share record: `result.share`, or `result` itself if it carries a key
pub fn expect_share(result: Value) -> Result<Value> {
    match result {
        Value::Object(mut obj) => match obj.remove("share") {
            Some(share @ Value::Object(_)) => Ok(share),
            Some(_) => Err(ClientError::InvalidResponse(
                "result.share is not an object".to_string(),
            )),
            None if obj.contains_key("share_key") => Ok(Value::Object(obj)),
            None => Err(ClientError::InvalidResponse(
                "result has no share record".to_string(),
            )),
        },
        other => Err(ClientError::InvalidResponse(format!(
            "result is {}, expected an object",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
