use serde_json::Value;

use crate::error::{GatewayError, Result};

// First required query param that is absent or empty wins
pub fn require_query_params(query: &[(String, String)], params: &[&str]) -> Result<()> {
    for param in params {
        let present = query
            .iter()
            .any(|(key, value)| key == param && !value.is_empty());
        if !present {
            return Err(GatewayError::MissingQueryParam(param.to_string()));
        }
    }
    Ok(())
}

// Absent, null, false, 0 and "" all count as missing
pub fn require_body_params(body: &Value, params: &[&str]) -> Result<()> {
    for param in params {
        if body.get(param).is_none_or(is_blank) {
            return Err(GatewayError::MissingBodyParam(param.to_string()));
        }
    }
    Ok(())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

// JSON body, with an empty body read as {}
pub fn parse_body(raw: &[u8]) -> Result<Value> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(raw).map_err(|e| GatewayError::InvalidBody(e.to_string()))
}
