//! RPC envelopes carried by every transport.
//!
//! A client sends [`Request`]s; the server answers each with exactly one
//! [`Response`] carrying the same `id`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Method names understood by a processing engine.
pub mod methods {
	/// Handshake; returns `{serverVersion, sessionId}`.
	pub const HELLO: &str = "hello";
	/// Registers a capability descriptor in the session.
	pub const LOAD_CAPABILITY: &str = "loadCapability";
	/// Instantiates a capability; returns `{object}`.
	pub const CREATE: &str = "create";
	/// Calls a method on a previously created object.
	pub const INVOKE: &str = "invoke";
	/// Drops a previously created object.
	pub const RELEASE: &str = "release";
	/// Ends the session.
	pub const GOODBYE: &str = "goodbye";
}

/// Request sent to a processing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	/// Correlation id, unique per session.
	pub id: u32,
	pub method: String,
	#[serde(default)]
	pub params: Value,
}

/// Response from a processing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	/// Id of the request this answers.
	pub id: u32,
	/// Success result (mutually exclusive with error)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Error result (mutually exclusive with result)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorWrapper>,
}

impl Response {
	pub fn ok(id: u32, result: Value) -> Self {
		Self {
			id,
			result: Some(result),
			error: None,
		}
	}

	pub fn err(id: u32, error: ErrorPayload) -> Self {
		Self {
			id,
			result: None,
			error: Some(ErrorWrapper { error }),
		}
	}
}

/// Wrapper for the error payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorWrapper {
	pub error: ErrorPayload,
}

/// Error details reported by a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
	pub message: String,
	/// Error type name (e.g. "UnknownCapability", "UnknownObject")
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}

impl ErrorPayload {
	pub fn new(name: &str, message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			name: Some(name.to_string()),
		}
	}
}

/// Discriminated union of inbound messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	/// Request (has `method`)
	Request(Request),
	/// Response (has `id`, no `method`)
	Response(Response),
	/// Forward-compatible catch-all
	Unknown(Value),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn response_deserializes_as_response() {
		let message: Message = serde_json::from_str(r#"{"id": 7, "result": {"object": 3}}"#).unwrap();
		match message {
			Message::Response(response) => {
				assert_eq!(response.id, 7);
				assert_eq!(response.result.unwrap()["object"], 3);
				assert!(response.error.is_none());
			}
			other => panic!("Expected Response, got {other:?}"),
		}
	}

	#[test]
	fn request_deserializes_as_request() {
		let message: Message = serde_json::from_str(r#"{"id": 1, "method": "create", "params": {"capability": "Widget"}}"#).unwrap();
		match message {
			Message::Request(request) => {
				assert_eq!(request.method, methods::CREATE);
				assert_eq!(request.params["capability"], "Widget");
			}
			other => panic!("Expected Request, got {other:?}"),
		}
	}

	#[test]
	fn error_response_wire_shape() {
		let response = Response::err(4, ErrorPayload::new("UnknownObject", "no object 9"));
		let value = serde_json::to_value(&response).unwrap();
		assert_eq!(value["id"], 4);
		assert_eq!(value["error"]["error"]["name"], "UnknownObject");
		assert!(value.get("result").is_none());
	}

	#[test]
	fn unrecognized_message_is_kept() {
		let message: Message = serde_json::from_str(r#"{"hello": "world"}"#).unwrap();
		assert!(matches!(message, Message::Unknown(_)));
	}
}
