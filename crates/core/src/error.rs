//! Typed failures of the session manager.

use serde::Serialize;
use thiserror::Error;

use crate::connection::ConnectionId;
use crate::object::ObjectId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// Endpoint unreachable, handshake failed, or identifiers exhausted.
	#[error("cannot connect to {endpoint}: {reason}")]
	Connection { endpoint: String, reason: String },

	/// The referenced connection is not (or no longer) open.
	#[error("connection {0} is not open")]
	UnknownConnection(ConnectionId),

	/// The binary locator did not resolve to a loadable plugin.
	#[error("cannot load plugin from {locator}: {reason}")]
	PluginLoad { locator: String, reason: String },

	/// A distributed load registered on the active connection but not on every
	/// other one. `loaded` keeps the capability; `failed` does not.
	#[error("'{capability}' did not load on connection(s) {}", failed_ids(.failed))]
	PartialLoad {
		capability: String,
		loaded: Vec<ConnectionId>,
		failed: Vec<(ConnectionId, String)>,
	},

	/// The capability is not reachable from the active connection.
	#[error("'{name}' is not available on connection {connection}")]
	UnknownCapability { name: String, connection: ConnectionId },

	/// A constructor symbol is bound to a connection other than the active one.
	#[error("'{name}' is bound to connection {bound}, but connection {active} is active")]
	WrongSession {
		name: String,
		bound: ConnectionId,
		active: ConnectionId,
	},

	/// The symbol refers to an object, not a constructor.
	#[error("'{0}' is not a constructor")]
	NotConstructor(String),

	/// The handle's object was released.
	#[error("object {object} is not live on connection {connection}")]
	UnknownObject { object: ObjectId, connection: ConnectionId },

	/// Transport or engine failure while talking to a session.
	#[error(transparent)]
	Runtime(#[from] mserv_runtime::Error),
}

/// Failure kinds, for branching without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
	Connection,
	UnknownConnection,
	PluginLoad,
	UnknownCapability,
	WrongSession,
	NotConstructor,
	UnknownObject,
	Runtime,
}

impl ErrorKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorKind::Connection => "CONNECTION",
			ErrorKind::UnknownConnection => "UNKNOWN_CONNECTION",
			ErrorKind::PluginLoad => "PLUGIN_LOAD",
			ErrorKind::UnknownCapability => "UNKNOWN_CAPABILITY",
			ErrorKind::WrongSession => "WRONG_SESSION",
			ErrorKind::NotConstructor => "NOT_CONSTRUCTOR",
			ErrorKind::UnknownObject => "UNKNOWN_OBJECT",
			ErrorKind::Runtime => "RUNTIME",
		}
	}
}

impl std::fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::Connection { .. } => ErrorKind::Connection,
			Error::UnknownConnection(_) => ErrorKind::UnknownConnection,
			Error::PluginLoad { .. } | Error::PartialLoad { .. } => ErrorKind::PluginLoad,
			Error::UnknownCapability { .. } => ErrorKind::UnknownCapability,
			Error::WrongSession { .. } => ErrorKind::WrongSession,
			Error::NotConstructor(_) => ErrorKind::NotConstructor,
			Error::UnknownObject { .. } => ErrorKind::UnknownObject,
			Error::Runtime(_) => ErrorKind::Runtime,
		}
	}

	/// True for failures that leave the registry usable (all of them, currently,
	/// except a transport that went away under a call).
	pub fn is_recoverable(&self) -> bool {
		!matches!(self, Error::Runtime(err) if err.is_closed())
	}
}

fn failed_ids(failed: &[(ConnectionId, String)]) -> String {
	failed.iter().map(|(id, _)| id.to_string()).collect::<Vec<_>>().join(", ")
}
