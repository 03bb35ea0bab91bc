//! Bridge request framing.
//!
//! One request per line:
//!
//! ```text
//! {"tool": "filter_elements_by_level", "payload": {"level_name": "Level 1"}}
//! ```
//!
//! `payload` may be omitted or `null`, in which case it is an empty object.
//! Responses are [`Response`](crate::dispatch::Response) envelopes, also one
//! per line.

use serde_json::{Map, Value};
use thiserror::Error;

/// A parsed request line.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Tool to invoke.
    pub tool: String,
    /// Tool arguments.
    pub payload: Value,
}

/// Framing errors. These are reported before any tool runs.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The line is not JSON.
    #[error("ValidationError: request is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The line is not UTF-8.
    #[error("ValidationError: request is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::string::FromUtf8Error),

    /// The line is JSON but not a request object.
    #[error("ValidationError: {0}")]
    InvalidRequest(&'static str),
}

/// Parses one request line.
///
/// # Errors
///
/// Returns an error if the line is not a JSON object with a non-empty string
/// `tool`.
pub fn parse_request(line: &str) -> Result<Request, ProtocolError> {
    let value: Value = serde_json::from_str(line)?;
    let Value::Object(mut obj) = value else {
        return Err(ProtocolError::InvalidRequest("request must be a JSON object"));
    };

    let tool = match obj.remove("tool") {
        Some(Value::String(tool)) if !tool.trim().is_empty() => tool,
        Some(Value::String(_)) => {
            return Err(ProtocolError::InvalidRequest("'tool' must not be empty"))
        }
        _ => return Err(ProtocolError::InvalidRequest("request is missing a string 'tool'")),
    };

    let payload = match obj.remove("payload") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(payload) => payload,
    };

    Ok(Request { tool, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_valid_request() {
        let req =
            parse_request(r#"{"tool": "get_hosted_elements", "payload": {"host_element_id": 4}}"#)
                .unwrap();
        assert_eq!(req.tool, "get_hosted_elements");
        assert_eq!(req.payload, json!({ "host_element_id": 4 }));
    }

    #[test]
    fn missing_payload_is_empty_object() {
        for line in [r#"{"tool": "list_tools"}"#, r#"{"tool": "list_tools", "payload": null}"#] {
            let req = parse_request(line).unwrap();
            assert_eq!(req.payload, json!({}));
        }
    }

    #[test]
    fn parse_invalid_json() {
        let err = parse_request("not valid json").unwrap_err();
        assert!(matches!(err, ProtocolError::Parse(_)));
        assert!(err.to_string().starts_with("ValidationError:"));
    }

    #[test]
    fn parse_missing_tool() {
        let err = parse_request(r#"{"payload": {}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidRequest(_)));
    }

    #[test]
    fn parse_non_object() {
        let err = parse_request("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidRequest(_)));
    }

    #[test]
    fn parse_empty_tool() {
        let err = parse_request(r#"{"tool": "  "}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidRequest(_)));
    }
}
