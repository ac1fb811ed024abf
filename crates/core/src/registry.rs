//! The set of open connections and the active designation.

use std::sync::Arc;

use indexmap::IndexMap;
use mserv_protocol::ServerUrl;
use mserv_runtime::{BuiltinSession, Dialer, NetDialer};
use tracing::{info, warn};

use crate::config::RegistryConfig;
use crate::connection::{Connection, ConnectionId, ConnectionInfo, ConnectionKind};
use crate::error::{Error, Result};
use crate::plugin::{FsPluginLocator, PluginLocator};
use crate::symbols::SymbolTable;

/// Owns every open [`Connection`] and routes operations to the active one.
///
/// The built-in connection is created with the registry and stays open until
/// [`shutdown`](Self::shutdown), so `active` always names a member.
pub struct ConnectionRegistry {
	pub(crate) connections: IndexMap<ConnectionId, Connection>,
	pub(crate) active: ConnectionId,
	next_id: u32,
	dialer: Arc<dyn Dialer>,
	pub(crate) locator: Arc<dyn PluginLocator>,
	config: RegistryConfig,
}

impl ConnectionRegistry {
	/// Registry that dials over the network and discovers plugins on disk.
	pub fn new(config: RegistryConfig) -> Self {
		Self::with_collaborators(config, Arc::new(NetDialer::new(config.dial)), Arc::new(FsPluginLocator))
	}

	pub fn with_collaborators(config: RegistryConfig, dialer: Arc<dyn Dialer>, locator: Arc<dyn PluginLocator>) -> Self {
		let builtin = Connection::new(ConnectionId::BUILTIN, ConnectionKind::BuiltIn, Arc::new(BuiltinSession::new()));
		let mut connections = IndexMap::new();
		connections.insert(ConnectionId::BUILTIN, builtin);
		Self {
			connections,
			active: ConnectionId::BUILTIN,
			next_id: 1,
			dialer,
			locator,
			config,
		}
	}

	pub fn config(&self) -> &RegistryConfig {
		&self.config
	}

	/// Connects to `host:port` with the configured default scheme.
	pub async fn connect(&mut self, host: &str, port: u16) -> Result<ConnectionId> {
		let url = ServerUrl::new(self.config.default_scheme, host, port);
		self.connect_url(&url).await
	}

	/// Opens a remote connection, adds it, and makes it active.
	pub async fn connect_url(&mut self, url: &ServerUrl) -> Result<ConnectionId> {
		let id = ConnectionId::from_raw(self.next_id);
		let Some(next_id) = self.next_id.checked_add(1) else {
			return Err(Error::Connection {
				endpoint: url.to_string(),
				reason: "connection identifiers exhausted".to_string(),
			});
		};

		let session = self.dialer.dial(url).await.map_err(|err| Error::Connection {
			endpoint: url.to_string(),
			reason: err.to_string(),
		})?;

		self.next_id = next_id;
		self.connections
			.insert(id, Connection::new(id, ConnectionKind::Remote(url.clone()), session));
		self.active = id;
		info!(target = "mserv.registry", connection = %id, url = %url, "connected");
		Ok(id)
	}

	/// Disconnects `connection`, or the active connection when `None`.
	///
	/// Returns the id that was removed. The built-in connection and ids that
	/// are not open are ignored, so repeated calls never fail. When the
	/// active connection goes away the most recently connected remaining one
	/// becomes active; that is the built-in one once no remotes are left.
	pub async fn disconnect(&mut self, connection: Option<ConnectionId>) -> Option<ConnectionId> {
		let id = connection.unwrap_or(self.active);
		if id.is_builtin() {
			info!(target = "mserv.registry", "no remote connection to disconnect");
			return None;
		}
		let mut removed = self.connections.shift_remove(&id)?;
		if self.active == id {
			self.active = self.connections.last().map_or(ConnectionId::BUILTIN, |(last, _)| *last);
		}
		if let Err(err) = removed.close().await {
			warn!(target = "mserv.registry", connection = %id, error = %err, "session did not close cleanly");
		}
		info!(target = "mserv.registry", connection = %id, active = %self.active, "disconnected");
		Some(id)
	}

	/// Disconnects every remote connection, newest first.
	pub async fn disconnect_all(&mut self) -> Vec<ConnectionId> {
		let mut removed = Vec::new();
		while let Some(id) = self.connections.keys().rev().copied().find(|id| !id.is_builtin()) {
			if let Some(id) = self.disconnect(Some(id)).await {
				removed.push(id);
			}
		}
		removed
	}

	/// Makes `connection` active.
	///
	/// With a symbol table, every constructor symbol is rebound against the
	/// new active connection's capabilities. Without one nothing is rebound.
	pub fn switch_active(&mut self, connection: ConnectionId, symbols: Option<&mut SymbolTable>) -> Result<()> {
		let target = self
			.connections
			.get(&connection)
			.ok_or(Error::UnknownConnection(connection))?;

		if let Some(symbols) = symbols {
			symbols.rebind(connection, target.capability_names());
		}
		if self.active != connection {
			info!(target = "mserv.registry", from = %self.active, to = %connection, "switched active connection");
		}
		self.active = connection;
		Ok(())
	}

	/// Snapshot of open connections in insertion order, built-in first.
	pub fn list(&self) -> Vec<ConnectionInfo> {
		self.connections
			.values()
			.map(|conn| conn.info(conn.id() == self.active))
			.collect()
	}

	pub fn active(&self) -> &Connection {
		&self.connections[&self.active]
	}

	pub fn active_id(&self) -> ConnectionId {
		self.active
	}

	pub fn get(&self, connection: ConnectionId) -> Option<&Connection> {
		self.connections.get(&connection)
	}

	pub fn contains(&self, connection: ConnectionId) -> bool {
		self.connections.contains_key(&connection)
	}

	pub fn len(&self) -> usize {
		self.connections.len()
	}

	/// Always false while the registry is alive; the built-in connection is
	/// only closed by [`shutdown`](Self::shutdown).
	pub fn is_empty(&self) -> bool {
		self.connections.is_empty()
	}

	/// Closes every session, including the built-in one.
	pub async fn shutdown(mut self) {
		self.disconnect_all().await;
		if let Some(mut builtin) = self.connections.shift_remove(&ConnectionId::BUILTIN) {
			if let Err(err) = builtin.close().await {
				warn!(target = "mserv.registry", error = %err, "built-in session did not close cleanly");
			}
		}
		info!(target = "mserv.registry", "registry shut down");
	}

	pub(crate) fn connection(&self, connection: ConnectionId) -> Result<&Connection> {
		self.connections
			.get(&connection)
			.ok_or(Error::UnknownConnection(connection))
	}

	pub(crate) fn connection_mut(&mut self, connection: ConnectionId) -> Result<&mut Connection> {
		self.connections
			.get_mut(&connection)
			.ok_or(Error::UnknownConnection(connection))
	}

	#[cfg(test)]
	pub(crate) fn set_next_id(&mut self, next_id: u32) {
		self.next_id = next_id;
	}
}

impl std::fmt::Debug for ConnectionRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConnectionRegistry")
			.field("connections", &self.connections.values().collect::<Vec<_>>())
			.field("active", &self.active)
			.field("config", &self.config)
			.finish()
	}
}
