//! Maps failed responses onto [`ApiError`].

use crate::error::{ApiError, FieldError, RateLimit, REQUEST_FAILED};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Builds the structured error for a non-2xx response.
///
/// `body` is the parsed JSON payload, if the response declared one. Fields
/// with an unexpected shape are treated as absent.
#[must_use]
pub fn classify(status: StatusCode, headers: &HeaderMap, body: Option<&Value>) -> ApiError {
    let message = body
        .and_then(|b| b.get("error"))
        .and_then(Value::as_str)
        .map_or_else(|| REQUEST_FAILED.to_string(), str::to_string);
    let details = field::<Vec<FieldError>>(body, "details");
    let rate_limit = field::<RateLimit>(body, "rate_limit").or_else(|| header_rate_limit(headers));

    ApiError {
        message,
        status: status.as_u16(),
        details,
        rate_limit,
    }
}

fn field<T: DeserializeOwned>(body: Option<&Value>, key: &str) -> Option<T> {
    let value = body?.get(key)?;
    if value.is_null() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

/// Synthesizes rate-limit data from headers; all three must be finite numbers.
fn header_rate_limit(headers: &HeaderMap) -> Option<RateLimit> {
    let limit = header_number(headers, RATE_LIMIT_LIMIT_HEADER)?;
    let remaining = header_number(headers, RATE_LIMIT_REMAINING_HEADER)?;
    let reset_seconds = header_number(headers, RATE_LIMIT_RESET_HEADER)?;
    Some(RateLimit {
        limit,
        remaining,
        reset_seconds,
    })
}

#[allow(clippy::cast_possible_truncation)]
fn header_number(headers: &HeaderMap, name: &str) -> Option<i64> {
    let raw = headers.get(name)?.to_str().ok()?.trim();
    let value = raw.parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(value.trunc() as i64)
}
