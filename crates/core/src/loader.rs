//! Capability loading into one connection or all open ones.

use std::sync::Arc;

use mserv_protocol::{CapabilityDescriptor, CapabilityScope, methods};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::connection::ConnectionId;
use crate::error::{Error, Result};
use crate::plugin::BinaryLocator;
use crate::registry::ConnectionRegistry;
use crate::symbols::SymbolTable;

impl ConnectionRegistry {
	/// Loads `capability` from `locator` into the active connection.
	///
	/// With `distribute`, the descriptor is also copied into every other
	/// connection open right now; connections opened later do not see it.
	/// With a symbol table, a constructor symbol named `capability` is bound
	/// to the active connection. Loading a name again replaces it.
	///
	/// A failure on the active connection changes nothing. Once the active
	/// connection has it, every other target is still tried and the symbol is
	/// bound; failures there are reported together as [`Error::PartialLoad`].
	pub async fn load(
		&mut self,
		capability: &str,
		locator: &BinaryLocator,
		distribute: bool,
		symbols: Option<&mut SymbolTable>,
	) -> Result<CapabilityDescriptor> {
		if capability.trim().is_empty() {
			return Err(Error::PluginLoad {
				locator: locator.to_string(),
				reason: "capability name is empty".to_string(),
			});
		}

		let scope = if distribute { CapabilityScope::Distributed } else { CapabilityScope::Local };
		let descriptor = self
			.locator
			.resolve(capability, locator, scope)
			.map_err(|err| Error::PluginLoad {
				locator: locator.to_string(),
				reason: err.to_string(),
			})?;

		let active = self.active;
		self.register(active, &descriptor).await?;
		if let Some(symbols) = symbols {
			symbols.bind_constructor(capability, active);
		}

		let mut loaded = vec![active];
		let mut failed = Vec::new();
		if distribute {
			let others: Vec<ConnectionId> = self.connections.keys().copied().filter(|id| *id != active).collect();
			for id in others {
				match self.register(id, &descriptor).await {
					Ok(()) => loaded.push(id),
					Err(err) => {
						warn!(target = "mserv.loader", capability, connection = %id, error = %err, "distributed load failed");
						failed.push((id, err.to_string()));
					}
				}
			}
		}

		if !failed.is_empty() {
			return Err(Error::PartialLoad {
				capability: capability.to_string(),
				loaded,
				failed,
			});
		}

		info!(
			target = "mserv.loader",
			capability,
			library = %descriptor.library.display(),
			connection = %active,
			distribute,
			connections = loaded.len(),
			"capability loaded"
		);
		Ok(descriptor)
	}

	async fn register(&mut self, id: ConnectionId, descriptor: &CapabilityDescriptor) -> Result<()> {
		let session = Arc::clone(self.connection(id)?.session());
		session
			.call(methods::LOAD_CAPABILITY, json!({ "descriptor": descriptor }))
			.await?;
		self.connection_mut(id)?.register_capability(descriptor.clone());
		debug!(target = "mserv.loader", capability = %descriptor.name, connection = %id, "registered");
		Ok(())
	}
}
