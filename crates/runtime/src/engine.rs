//! In-process processing engine.
//!
//! One [`Engine`] backs every session: the built-in session owns one directly,
//! and a [`Server`](crate::Server) creates a fresh one per accepted client.
//! The engine keeps its own capability table, so a `create` for a capability
//! that was never loaded into *this* session fails here too.

use std::collections::HashMap;

use mserv_protocol::{CapabilityDescriptor, ErrorPayload, Request, Response, methods};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

/// Error names reported by the engine.
pub mod error_names {
	pub const UNKNOWN_CAPABILITY: &str = "UnknownCapability";
	pub const UNKNOWN_OBJECT: &str = "UnknownObject";
	pub const UNKNOWN_METHOD: &str = "UnknownMethod";
	pub const INVALID_PARAMS: &str = "InvalidParams";
}

struct EngineObject {
	capability: String,
	properties: Map<String, Value>,
}

#[derive(Deserialize)]
struct LoadParams {
	descriptor: CapabilityDescriptor,
}

#[derive(Deserialize)]
struct CreateParams {
	capability: String,
}

#[derive(Deserialize)]
struct InvokeParams {
	object: u64,
	method: String,
	#[serde(default)]
	args: Value,
}

#[derive(Deserialize)]
struct ReleaseParams {
	object: u64,
}

#[derive(Deserialize)]
struct PropertyArgs {
	name: String,
	#[serde(default)]
	value: Value,
}

/// A processing session's server-side state.
pub struct Engine {
	session_id: u64,
	capabilities: HashMap<String, CapabilityDescriptor>,
	objects: HashMap<u64, EngineObject>,
	next_object: u64,
	finished: bool,
}

impl Engine {
	pub fn new(session_id: u64) -> Self {
		Self {
			session_id,
			capabilities: HashMap::new(),
			objects: HashMap::new(),
			next_object: 1,
			finished: false,
		}
	}

	pub fn session_id(&self) -> u64 {
		self.session_id
	}

	/// True after a `goodbye` request.
	pub fn is_finished(&self) -> bool {
		self.finished
	}

	pub fn has_capability(&self, name: &str) -> bool {
		self.capabilities.contains_key(name)
	}

	pub fn object_count(&self) -> usize {
		self.objects.len()
	}

	/// Handles one request and produces its response.
	pub fn handle(&mut self, request: &Request) -> Response {
		debug!(
			target = "mserv.engine",
			session = self.session_id,
			id = request.id,
			method = %request.method,
			"handling request"
		);
		match self.dispatch(&request.method, &request.params) {
			Ok(result) => Response::ok(request.id, result),
			Err(error) => Response::err(request.id, error),
		}
	}

	fn dispatch(&mut self, method: &str, params: &Value) -> Result<Value, ErrorPayload> {
		match method {
			methods::HELLO => Ok(json!({
				"serverVersion": env!("CARGO_PKG_VERSION"),
				"sessionId": self.session_id,
			})),
			methods::LOAD_CAPABILITY => {
				let LoadParams { descriptor } = parse_params(params)?;
				debug!(target = "mserv.engine", session = self.session_id, capability = %descriptor.name, "capability loaded");
				self.capabilities.insert(descriptor.name.clone(), descriptor);
				Ok(Value::Null)
			}
			methods::CREATE => {
				let CreateParams { capability } = parse_params(params)?;
				self.create(capability)
			}
			methods::INVOKE => {
				let InvokeParams { object, method, args } = parse_params(params)?;
				self.invoke(object, &method, args)
			}
			methods::RELEASE => {
				let ReleaseParams { object } = parse_params(params)?;
				self.objects
					.remove(&object)
					.map(|_| Value::Null)
					.ok_or_else(|| unknown_object(object))
			}
			methods::GOODBYE => {
				self.finished = true;
				self.objects.clear();
				Ok(Value::Null)
			}
			other => Err(ErrorPayload::new(error_names::UNKNOWN_METHOD, format!("unknown method '{other}'"))),
		}
	}

	fn create(&mut self, capability: String) -> Result<Value, ErrorPayload> {
		if !self.capabilities.contains_key(&capability) {
			return Err(ErrorPayload::new(
				error_names::UNKNOWN_CAPABILITY,
				format!("capability '{capability}' is not loaded in session {}", self.session_id),
			));
		}

		let object = self.next_object;
		self.next_object += 1;
		self.objects.insert(
			object,
			EngineObject {
				capability,
				properties: Map::new(),
			},
		);
		Ok(json!({ "object": object }))
	}

	fn invoke(&mut self, object: u64, method: &str, args: Value) -> Result<Value, ErrorPayload> {
		let session_id = self.session_id;
		let entry = self.objects.get_mut(&object).ok_or_else(|| unknown_object(object))?;

		match method {
			"describe" => Ok(json!({
				"object": object,
				"capability": entry.capability,
				"session": session_id,
				"properties": entry.properties,
			})),
			"setProperty" => {
				let PropertyArgs { name, value } = parse_params(&args)?;
				entry.properties.insert(name, value);
				Ok(Value::Null)
			}
			"getProperty" => {
				let PropertyArgs { name, .. } = parse_params(&args)?;
				Ok(entry.properties.get(&name).cloned().unwrap_or(Value::Null))
			}
			other => Err(ErrorPayload::new(
				error_names::UNKNOWN_METHOD,
				format!("{} has no method '{other}'", entry.capability),
			)),
		}
	}
}

fn parse_params<T: for<'de> Deserialize<'de>>(params: &Value) -> Result<T, ErrorPayload> {
	T::deserialize(params).map_err(|e| ErrorPayload::new(error_names::INVALID_PARAMS, e.to_string()))
}

fn unknown_object(object: u64) -> ErrorPayload {
	ErrorPayload::new(error_names::UNKNOWN_OBJECT, format!("no object {object} in this session"))
}
