//! Caller-owned symbol namespace.
//!
//! The registry never holds a [`SymbolTable`]; operations that expose or
//! rebind symbols take one as an explicit `Option<&mut SymbolTable>`. A table
//! that is not passed in is never touched, which is what lets a constructor
//! symbol go stale after a switch.

use indexmap::IndexMap;
use serde::Serialize;

use crate::connection::ConnectionId;
use crate::object::ObjectHandle;

/// What a symbol name is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Symbol {
	/// Constructor for a capability, remembering the connection it was bound against.
	Constructor { capability: String, connection: ConnectionId },
	Object(ObjectHandle),
}

impl Symbol {
	/// The connection this binding refers to.
	pub fn connection(&self) -> ConnectionId {
		match self {
			Symbol::Constructor { connection, .. } => *connection,
			Symbol::Object(handle) => handle.connection(),
		}
	}

	pub fn is_constructor(&self) -> bool {
		matches!(self, Symbol::Constructor { .. })
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SymbolTable {
	symbols: IndexMap<String, Symbol>,
}

impl SymbolTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Binds `capability` under its own name.
	pub fn bind_constructor(&mut self, capability: impl Into<String>, connection: ConnectionId) {
		let capability = capability.into();
		self.symbols.insert(capability.clone(), Symbol::Constructor { capability, connection });
	}

	pub fn bind_object(&mut self, name: impl Into<String>, handle: ObjectHandle) {
		self.symbols.insert(name.into(), Symbol::Object(handle));
	}

	pub fn get(&self, name: &str) -> Option<&Symbol> {
		self.symbols.get(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.symbols.contains_key(name)
	}

	pub fn remove(&mut self, name: &str) -> Option<Symbol> {
		self.symbols.shift_remove(name)
	}

	/// Replaces every constructor binding with constructors for `capabilities`
	/// on `connection`. Object bindings are left alone.
	pub fn rebind<'a>(&mut self, connection: ConnectionId, capabilities: impl IntoIterator<Item = &'a str>) {
		self.symbols.retain(|_, symbol| !symbol.is_constructor());
		for capability in capabilities {
			self.bind_constructor(capability, connection);
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Symbol)> {
		self.symbols.iter().map(|(name, symbol)| (name.as_str(), symbol))
	}

	pub fn len(&self) -> usize {
		self.symbols.len()
	}

	pub fn is_empty(&self) -> bool {
		self.symbols.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::object::ObjectId;

	fn c(raw: u32) -> ConnectionId {
		ConnectionId::from_raw(raw)
	}

	#[test]
	fn rebind_replaces_constructors_and_keeps_objects() {
		let mut table = SymbolTable::new();
		table.bind_constructor("Widget", c(2));
		table.bind_constructor("Gadget", c(2));
		table.bind_object("w", ObjectHandle::new(ObjectId::from_raw(1), c(2), "Widget"));

		table.rebind(c(1), ["Gadget"]);

		assert!(!table.contains("Widget"));
		assert_eq!(
			table.get("Gadget"),
			Some(&Symbol::Constructor {
				capability: "Gadget".into(),
				connection: c(1),
			})
		);
		assert_eq!(table.get("w").map(Symbol::connection), Some(c(2)));
		assert_eq!(table.len(), 2);
	}

	#[test]
	fn serializes_tagged_bindings() {
		let mut table = SymbolTable::new();
		table.bind_constructor("Widget", c(0));
		let value = serde_json::to_value(&table).unwrap();
		assert_eq!(value["Widget"]["type"], "constructor");
		assert_eq!(value["Widget"]["connection"], 0);
	}
}
