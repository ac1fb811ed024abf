//! Capability descriptors exchanged with processing sessions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a capability was bound when it was loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CapabilityScope {
	/// Bound into a single connection.
	#[default]
	Local,
	/// Snapshotted into every connection open at load time.
	Distributed,
}

/// A named capability provided by a plugin library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDescriptor {
	/// Constructor name the capability is created by (e.g. `"Widget"`).
	pub name: String,
	/// Shared library the capability was resolved from.
	pub library: PathBuf,
	#[serde(default)]
	pub scope: CapabilityScope,
}

impl CapabilityDescriptor {
	pub fn new(name: impl Into<String>, library: impl Into<PathBuf>, scope: CapabilityScope) -> Self {
		Self {
			name: name.into(),
			library: library.into(),
			scope,
		}
	}
}
