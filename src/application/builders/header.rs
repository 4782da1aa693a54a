use crate::domain::errors::ProcessError;
use crate::expression::to_display_string;
use http::{HeaderName, HeaderValue};
use serde_json::Value;

/// Splits an evaluated header expression into a `(name, value)` pair.
///
/// The value is stringified first, then split on the first `:` only, so
/// `"X-Url: http://a:8080"` keeps the port in the value. Both halves are
/// trimmed and must form a legal HTTP header.
pub fn parse_header(evaluated: &Value) -> Result<(String, String), ProcessError> {
    let raw = to_display_string(evaluated);
    let Some((name, value)) = raw.split_once(':') else {
        return Err(ProcessError::HeaderFormat(raw));
    };
    let name = name.trim();
    let value = value.trim();

    if HeaderName::from_bytes(name.as_bytes()).is_err() {
        return Err(ProcessError::HeaderFormat(format!(
            "{raw} (illegal header name {name:?})"
        )));
    }
    if HeaderValue::from_str(value).is_err() {
        return Err(ProcessError::HeaderFormat(format!(
            "{raw} (illegal header value)"
        )));
    }

    Ok((name.to_string(), value.to_string()))
}
