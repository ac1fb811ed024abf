//! Object creation and routing of calls on handles.

use std::sync::Arc;

use mserv_protocol::methods;
use mserv_runtime::engine::error_names;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::connection::ConnectionId;
use crate::error::{Error, Result};
use crate::object::{ObjectHandle, ObjectId};
use crate::registry::ConnectionRegistry;
use crate::symbols::{Symbol, SymbolTable};

#[derive(Deserialize)]
struct Created {
	object: u64,
}

impl ConnectionRegistry {
	/// Creates an instance of `capability` in the active connection.
	///
	/// Only the active connection's registry is consulted; a capability
	/// loaded elsewhere is [`Error::UnknownCapability`] here.
	pub async fn create(&mut self, capability: &str) -> Result<ObjectHandle> {
		let active = self.active;
		let conn = self.connection(active)?;
		if !conn.has_capability(capability) {
			return Err(Error::UnknownCapability {
				name: capability.to_string(),
				connection: active,
			});
		}

		let session = Arc::clone(conn.session());
		let result = session
			.call(methods::CREATE, json!({ "capability": capability }))
			.await
			.map_err(|err| map_engine_error(err, capability, active))?;
		let Created { object } = serde_json::from_value(result)
			.map_err(|err| Error::Runtime(mserv_runtime::Error::ProtocolError(format!("bad create result: {err}"))))?;

		let handle = ObjectHandle::new(ObjectId::from_raw(object), active, capability);
		self.connection_mut(active)?.track_object(handle.clone());
		debug!(target = "mserv.factory", object = %handle, "object created");
		Ok(handle)
	}

	/// Invokes the symbol `name` from `symbols` as a constructor.
	///
	/// A missing symbol is [`Error::UnknownCapability`]. A constructor bound
	/// to a connection other than the active one is [`Error::WrongSession`],
	/// even if the active connection has the capability too.
	pub async fn call(&mut self, symbols: &SymbolTable, name: &str) -> Result<ObjectHandle> {
		match symbols.get(name) {
			None => Err(Error::UnknownCapability {
				name: name.to_string(),
				connection: self.active,
			}),
			Some(Symbol::Object(_)) => Err(Error::NotConstructor(name.to_string())),
			Some(Symbol::Constructor { connection, .. }) if *connection != self.active => Err(Error::WrongSession {
				name: name.to_string(),
				bound: *connection,
				active: self.active,
			}),
			Some(Symbol::Constructor { capability, .. }) => {
				let capability = capability.clone();
				self.create(&capability).await
			}
		}
	}

	/// Invokes `method` on the object behind `handle`, in its own connection.
	pub async fn invoke(&self, handle: &ObjectHandle, method: &str, args: Value) -> Result<Value> {
		let conn = self.live_owner(handle)?;
		let session = Arc::clone(conn.session());
		let result = session
			.call(
				methods::INVOKE,
				json!({ "object": handle.id(), "method": method, "args": args }),
			)
			.await?;
		Ok(result)
	}

	/// Releases the object behind `handle`.
	pub async fn release(&mut self, handle: &ObjectHandle) -> Result<()> {
		let session = Arc::clone(self.live_owner(handle)?.session());
		session.call(methods::RELEASE, json!({ "object": handle.id() })).await?;
		self.connection_mut(handle.connection())?.forget_object(handle.id());
		debug!(target = "mserv.factory", object = %handle, "object released");
		Ok(())
	}

	/// Capability names loaded into the active connection.
	pub fn available_capabilities(&self) -> Vec<String> {
		self.active().capability_names().map(str::to_string).collect()
	}

	fn live_owner(&self, handle: &ObjectHandle) -> Result<&crate::connection::Connection> {
		let conn = self.connection(handle.connection())?;
		if !conn.owns_object(handle.id()) {
			return Err(Error::UnknownObject {
				object: handle.id(),
				connection: handle.connection(),
			});
		}
		Ok(conn)
	}
}

fn map_engine_error(err: mserv_runtime::Error, capability: &str, connection: ConnectionId) -> Error {
	match err.error_name() {
		Some(error_names::UNKNOWN_CAPABILITY) => Error::UnknownCapability {
			name: capability.to_string(),
			connection,
		},
		_ => Error::Runtime(err),
	}
}
