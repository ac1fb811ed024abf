//! Session-bound object handles.

use std::fmt;

use serde::Serialize;

use crate::connection::ConnectionId;

/// Object identifier assigned by the owning session's engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
	pub fn from_raw(raw: u64) -> Self {
		Self(raw)
	}

	pub fn as_u64(self) -> u64 {
		self.0
	}
}

impl fmt::Display for ObjectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Proxy for an object living in one session.
///
/// The handle remembers its connection; every operation on it is routed
/// there regardless of which connection is currently active.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectHandle {
	#[serde(rename = "object")]
	id: ObjectId,
	connection: ConnectionId,
	capability: String,
}

impl ObjectHandle {
	pub(crate) fn new(id: ObjectId, connection: ConnectionId, capability: impl Into<String>) -> Self {
		Self {
			id,
			connection,
			capability: capability.into(),
		}
	}

	pub fn id(&self) -> ObjectId {
		self.id
	}

	pub fn connection(&self) -> ConnectionId {
		self.connection
	}

	pub fn capability(&self) -> &str {
		&self.capability
	}
}

impl fmt::Display for ObjectHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}#{}@{}", self.capability, self.id, self.connection)
	}
}
