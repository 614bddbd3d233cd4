//! JSON text-frame encoding and response classification.
//!
//! # Wire Format
//!
//! One WebSocket text frame carries exactly one JSON object:
//!
//! ```text
//! {"type":"GetRow","table":"employees","key":1,"select":[],"request_id":"abc"}
//! ```
//!
//! Inbound frames are matched against the error schema first. Error tags and
//! success tags are disjoint, so a frame that parses as an error is never a
//! success; anything matching neither is undecodable.

use serde::Deserialize;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use super::error::RpcError;
use crate::protocol::Protocol;

/// Classification of one inbound frame.
#[derive(Debug)]
pub enum Decoded<P: Protocol> {
    /// Error-shaped frame. Carries no request id.
    Error(P::Error),
    /// Success-shaped frame.
    Response(P::Response),
    /// Neither schema matched; holds a human-readable reason.
    Undecodable(String),
}

/// Ensure `request` carries a request id, generating a UUID v4 when it is
/// missing or empty. Returns the id in effect.
pub fn stamp_request_id<P: Protocol>(request: &mut P::Request) -> String {
    match P::request_id(request) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            let id = Uuid::new_v4().to_string();
            P::set_request_id(request, id.clone());
            id
        }
    }
}

/// Serialize a request into a single text frame.
///
/// # Errors
///
/// Returns `RpcError::MissingRequestId` if the request was not stamped, or
/// `RpcError::Protocol` if serialization fails.
pub fn encode<P: Protocol>(request: &P::Request) -> Result<Message, RpcError> {
    match P::request_id(request) {
        Some(id) if !id.is_empty() => {}
        _ => return Err(RpcError::MissingRequestId),
    }

    let json = serde_json::to_string(request)
        .map_err(|e| RpcError::Protocol(format!("Failed to serialize request: {}", e)))?;

    Ok(Message::text(json))
}

/// Classify an inbound text frame.
pub fn decode<P: Protocol>(frame: &str) -> Decoded<P> {
    let value: Value = match serde_json::from_str(frame) {
        Ok(value) => value,
        Err(e) => return Decoded::Undecodable(format!("Frame is not valid JSON: {}", e)),
    };

    if let Ok(error) = P::Error::deserialize(&value) {
        return Decoded::Error(error);
    }

    match P::Response::deserialize(&value) {
        Ok(response) => Decoded::Response(response),
        Err(e) => {
            let tag = value.get("type").and_then(Value::as_str).unwrap_or("<none>");
            Decoded::Undecodable(format!("Unrecognized frame of type {}: {}", tag, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CalculatorRequest, CalculatorResponse, ErrorResponse, Request, Response};
    use crate::protocol::{CalculatorProtocol, TableProtocol};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_stamp_generates_missing_id() {
        let mut request = Request::list_rows("employees");
        let id = stamp_request_id::<TableProtocol>(&mut request);

        assert!(Uuid::parse_str(&id).is_ok(), "Expected a UUID, got: {}", id);
        assert_eq!(request.request_id(), Some(id.as_str()));
    }

    #[test]
    fn test_stamp_keeps_caller_id() {
        let mut request = Request::list_rows("employees").with_request_id("mine");
        assert_eq!(stamp_request_id::<TableProtocol>(&mut request), "mine");
    }

    #[test]
    fn test_stamp_replaces_empty_id() {
        let mut request = Request::list_rows("employees").with_request_id("");
        let id = stamp_request_id::<TableProtocol>(&mut request);
        assert!(!id.is_empty());
    }

    #[test]
    fn test_encode_requires_request_id() {
        let request = Request::get_row("employees", 1);
        let result = encode::<TableProtocol>(&request);
        assert!(matches!(result, Err(RpcError::MissingRequestId)));
    }

    #[test]
    fn test_encode_produces_one_text_frame() {
        let request = Request::get_row("employees", 1).with_request_id("abc");
        let message = encode::<TableProtocol>(&request).unwrap();

        let Message::Text(text) = message else {
            panic!("Expected a text frame");
        };
        let wire: Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(wire["type"], "GetRow");
        assert_eq!(wire["request_id"], "abc");
    }

    #[test]
    fn test_decode_error_frame() {
        let decoded = decode::<TableProtocol>(r#"{"type":"TableNotFound","table":"cats"}"#);
        match decoded {
            Decoded::Error(error) => {
                assert_eq!(error, ErrorResponse::TableNotFound { table: "cats".into() })
            }
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_success_frame() {
        let frame = json!({
            "type": "GetRow",
            "table": "employees",
            "row": {"FirstName": "Andrew"},
            "request_id": "abc"
        })
        .to_string();

        match decode::<TableProtocol>(&frame) {
            Decoded::Response(response) => assert_eq!(response.request_id(), Some("abc")),
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_error_tag_with_wrong_fields() {
        // Right tag, missing field: matches neither schema.
        let decoded = decode::<TableProtocol>(r#"{"type":"TableNotFound"}"#);
        assert!(matches!(decoded, Decoded::Undecodable(_)));
    }

    #[test]
    fn test_decode_unknown_tag() {
        match decode::<TableProtocol>(r#"{"type":"Frobnicate"}"#) {
            Decoded::Undecodable(reason) => {
                assert!(reason.contains("Frobnicate"), "Unexpected reason: {}", reason)
            }
            other => panic!("Expected undecodable, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_plain_text() {
        let decoded = decode::<TableProtocol>("failed to decode json body");
        match decoded {
            Decoded::Undecodable(reason) => assert!(reason.contains("not valid JSON")),
            other => panic!("Expected undecodable, got {:?}", other),
        }
    }

    #[test]
    fn test_request_and_expected_response_round_trip() {
        let request = Request::insert_row("employees", json!({"FirstName": "test"}))
            .with_request_id("ins-1");
        let Message::Text(text) = encode::<TableProtocol>(&request).unwrap() else {
            panic!("Expected a text frame");
        };

        // The peer echoes type, table and request_id and adds its own fields.
        let sent: Value = serde_json::from_str(text.as_str()).unwrap();
        let reply = json!({
            "type": sent["type"],
            "table": sent["table"],
            "inserted_rows": 1,
            "request_id": sent["request_id"]
        })
        .to_string();

        match decode::<TableProtocol>(&reply) {
            Decoded::Response(response) => assert_eq!(
                response,
                Response::InsertRow {
                    table: request.table().to_string(),
                    inserted_rows: 1,
                    request_id: request.request_id().map(str::to_string),
                }
            ),
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_calculator_vocabulary() {
        let mut request = CalculatorRequest::sub(0, 1);
        stamp_request_id::<CalculatorProtocol>(&mut request);
        assert!(encode::<CalculatorProtocol>(&request).is_ok());

        match decode::<CalculatorProtocol>(r#"{"type":"SubResult","result":255,"request_id":"s"}"#) {
            Decoded::Response(CalculatorResponse::SubResult { result, .. }) => assert_eq!(result, 255),
            other => panic!("Expected SubResult, got {:?}", other),
        }
    }
}
