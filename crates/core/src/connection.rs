//! One logical session and its private state.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use mserv_protocol::{CapabilityDescriptor, ServerUrl};
use mserv_runtime::Session;
use serde::Serialize;

use crate::object::{ObjectHandle, ObjectId};

/// Process-unique connection identifier. The built-in connection is always 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(u32);

impl ConnectionId {
	pub const BUILTIN: ConnectionId = ConnectionId(0);

	pub fn from_raw(raw: u32) -> Self {
		Self(raw)
	}

	pub fn as_u32(self) -> u32 {
		self.0
	}

	pub fn is_builtin(self) -> bool {
		self == Self::BUILTIN
	}
}

impl fmt::Display for ConnectionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for ConnectionId {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.trim().parse().map(Self)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionKind {
	BuiltIn,
	Remote(ServerUrl),
}

impl ConnectionKind {
	pub fn endpoint(&self) -> Option<&ServerUrl> {
		match self {
			ConnectionKind::BuiltIn => None,
			ConnectionKind::Remote(url) => Some(url),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
	Open,
	Disconnected,
}

/// A live session plus the client-side view of what has been loaded and
/// created through it.
pub struct Connection {
	id: ConnectionId,
	kind: ConnectionKind,
	session: Arc<dyn Session>,
	capabilities: IndexMap<String, CapabilityDescriptor>,
	objects: BTreeMap<ObjectId, ObjectHandle>,
}

impl Connection {
	pub(crate) fn new(id: ConnectionId, kind: ConnectionKind, session: Arc<dyn Session>) -> Self {
		Self {
			id,
			kind,
			session,
			capabilities: IndexMap::new(),
			objects: BTreeMap::new(),
		}
	}

	pub fn id(&self) -> ConnectionId {
		self.id
	}

	pub fn kind(&self) -> &ConnectionKind {
		&self.kind
	}

	pub fn endpoint(&self) -> Option<&ServerUrl> {
		self.kind.endpoint()
	}

	pub fn is_builtin(&self) -> bool {
		matches!(self.kind, ConnectionKind::BuiltIn)
	}

	/// `Disconnected` once the session has closed, including when the
	/// server went away while the connection is still registered.
	pub fn state(&self) -> ConnectionState {
		if self.session.is_closed() { ConnectionState::Disconnected } else { ConnectionState::Open }
	}

	pub fn has_capability(&self, name: &str) -> bool {
		self.capabilities.contains_key(name)
	}

	pub fn capability(&self, name: &str) -> Option<&CapabilityDescriptor> {
		self.capabilities.get(name)
	}

	/// Capability names in load order.
	pub fn capability_names(&self) -> impl Iterator<Item = &str> {
		self.capabilities.keys().map(String::as_str)
	}

	pub fn objects(&self) -> impl Iterator<Item = &ObjectHandle> {
		self.objects.values()
	}

	pub fn object_count(&self) -> usize {
		self.objects.len()
	}

	pub(crate) fn session(&self) -> &Arc<dyn Session> {
		&self.session
	}

	/// Reloading a name replaces the previous descriptor in place.
	pub(crate) fn register_capability(&mut self, descriptor: CapabilityDescriptor) {
		self.capabilities.insert(descriptor.name.clone(), descriptor);
	}

	pub(crate) fn track_object(&mut self, handle: ObjectHandle) {
		self.objects.insert(handle.id(), handle);
	}

	pub(crate) fn forget_object(&mut self, object: ObjectId) -> Option<ObjectHandle> {
		self.objects.remove(&object)
	}

	pub(crate) fn owns_object(&self, object: ObjectId) -> bool {
		self.objects.contains_key(&object)
	}

	/// Closes the session and drops all client-side state.
	pub(crate) async fn close(&mut self) -> mserv_runtime::Result<()> {
		self.objects.clear();
		self.session.close().await
	}

	pub(crate) fn info(&self, active: bool) -> ConnectionInfo {
		ConnectionInfo {
			id: self.id,
			kind: if self.is_builtin() { "builtin" } else { "remote" },
			url: self.endpoint().map(ToString::to_string),
			active,
			state: self.state(),
			capabilities: self.capability_names().map(str::to_string).collect(),
			objects: self.objects.len(),
		}
	}
}

impl fmt::Debug for Connection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Connection")
			.field("id", &self.id)
			.field("kind", &self.kind)
			.field("state", &self.state())
			.field("capabilities", &self.capabilities.keys().collect::<Vec<_>>())
			.field("objects", &self.objects.len())
			.finish()
	}
}

/// Serializable snapshot of a connection, as returned by
/// [`ConnectionRegistry::list`](crate::ConnectionRegistry::list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
	pub id: ConnectionId,
	pub kind: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	pub active: bool,
	pub state: ConnectionState,
	pub capabilities: Vec<String>,
	pub objects: usize,
}
