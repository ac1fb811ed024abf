//! Error types for the mserv runtime.

use mserv_protocol::ErrorPayload;
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur below the connection registry.
#[derive(Debug, Error)]
pub enum Error {
	/// Failed to establish a session with a server.
	#[error("Failed to connect to {endpoint}: {reason}")]
	ConnectionFailed { endpoint: String, reason: String },

	/// Transport-level error (framing, socket).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Protocol-level error (unexpected or malformed RPC traffic).
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// Error reported by the processing engine on the other side.
	#[error("{name}: {message}")]
	Remote {
		/// Error type name (e.g., "UnknownCapability", "UnknownObject")
		name: String,
		message: String,
	},

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// Timeout waiting for a response.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// Session closed, or the channel to it went away.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,
}

impl Error {
	/// Returns the remote error name if this is a Remote error.
	pub fn error_name(&self) -> Option<&str> {
		match self {
			Error::Remote { name, .. } => Some(name),
			_ => None,
		}
	}

	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout(_))
	}

	/// Returns true if the session is no longer usable.
	pub fn is_closed(&self) -> bool {
		matches!(self, Error::ChannelClosed | Error::TransportError(_))
	}
}

/// Converts an [`ErrorPayload`] reported by an engine into [`Error::Remote`].
pub(crate) fn parse_remote_error(error: ErrorPayload) -> Error {
	Error::Remote {
		name: error.name.unwrap_or_else(|| "Error".to_string()),
		message: error.message,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remote_error_keeps_name() {
		let err = parse_remote_error(ErrorPayload::new("UnknownCapability", "Widget is not loaded"));
		assert_eq!(err.error_name(), Some("UnknownCapability"));
		assert_eq!(err.to_string(), "UnknownCapability: Widget is not loaded");
	}

	#[test]
	fn unnamed_remote_error_defaults() {
		let err = parse_remote_error(ErrorPayload {
			message: "boom".into(),
			name: None,
		});
		assert_eq!(err.error_name(), Some("Error"));
		assert!(!err.is_timeout());
	}
}
