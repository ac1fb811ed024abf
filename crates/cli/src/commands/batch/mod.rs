//! Batch mode: drive one connection registry from NDJSON requests.
//!
//! # Protocol
//!
//! Each input line is `{"id"?, "op", "args"}`; each output line is
//!
//! ```json
//! {"schemaVersion":1,"id":"1","ok":true,"op":"connect","data":{"connection":1,"url":"cs://render-01:11111"}}
//! {"schemaVersion":1,"id":"2","ok":false,"op":"call","error":{"code":"WRONG_SESSION","message":"..."}}
//! ```
//!
//! The batch owns one symbol table, the namespace that `load`, `switch`,
//! `call` and `create ... as` read and write. Connections are addressed by
//! numeric id, by the alias given at connect time, or as `"builtin"`. An
//! alias outlives its connection: later ops on it fail with
//! `UNKNOWN_CONNECTION` until a new `connect` claims it.
//!
//! | Op | Args |
//! |----|------|
//! | `connect` | `url` \| `host`+`port?` \| `server` (config index), `alias?` |
//! | `disconnect` | `connection?` |
//! | `switch` | `connection`, `rebind?` (default true) |
//! | `load` | `name`, `path?` \| `fragment?`+`root?`, `distribute?`, `bind?` (default true) |
//! | `create` | `capability`, `as?` |
//! | `call` | `symbol`, `as?` |
//! | `invoke` | `object` (symbol), `method`, `args?` |
//! | `release` | `object` (symbol) |
//! | `list`, `capabilities`, `symbols`, `ping`, `quit` | - |

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use mserv::{BinaryLocator, ConnectionId, ConnectionRegistry, ObjectHandle, Symbol, SymbolTable};
use mserv_protocol::{DEFAULT_PORT, ServerUrl};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error};

use super::find_plugin::search_root;
use crate::config::CliConfig;
use crate::error::{CliError, Result};
use crate::output::{CommandError, ErrorCode, SCHEMA_VERSION};

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
	#[serde(default)]
	pub id: Option<String>,
	pub op: String,
	#[serde(default)]
	pub args: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
	pub schema_version: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	pub ok: bool,
	pub op: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
}

impl BatchResponse {
	fn success(id: Option<String>, op: &str, data: Option<Value>) -> Self {
		Self {
			schema_version: SCHEMA_VERSION,
			id,
			ok: true,
			op: op.to_string(),
			data,
			error: None,
		}
	}

	fn failure(id: Option<String>, op: &str, error: CommandError) -> Self {
		Self {
			schema_version: SCHEMA_VERSION,
			id,
			ok: false,
			op: op.to_string(),
			data: None,
			error: Some(error),
		}
	}
}

/// Whether the read loop keeps going after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
	Continue,
	Quit,
}

#[derive(Debug, Deserialize)]
struct ConnectArgs {
	url: Option<String>,
	host: Option<String>,
	port: Option<u16>,
	server: Option<usize>,
	alias: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DisconnectArgs {
	connection: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SwitchArgs {
	connection: Value,
	#[serde(default = "default_true")]
	rebind: bool,
}

#[derive(Debug, Deserialize)]
struct LoadArgs {
	name: String,
	path: Option<PathBuf>,
	fragment: Option<String>,
	root: Option<PathBuf>,
	#[serde(default)]
	distribute: bool,
	#[serde(default = "default_true")]
	bind: bool,
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
	capability: String,
	#[serde(rename = "as")]
	bind_as: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallArgs {
	symbol: String,
	#[serde(rename = "as")]
	bind_as: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvokeArgs {
	object: String,
	method: String,
	#[serde(default)]
	args: Value,
}

#[derive(Debug, Deserialize)]
struct ReleaseArgs {
	object: String,
}

fn default_true() -> bool {
	true
}

/// Registry, scripting namespace, and connection aliases for one batch run.
pub struct BatchSession {
	registry: ConnectionRegistry,
	symbols: SymbolTable,
	aliases: HashMap<String, ConnectionId>,
	config: CliConfig,
}

impl BatchSession {
	pub fn new(config: CliConfig) -> Self {
		let registry = ConnectionRegistry::new(config.registry_config());
		Self::with_registry(config, registry)
	}

	pub fn with_registry(config: CliConfig, registry: ConnectionRegistry) -> Self {
		Self {
			registry,
			symbols: SymbolTable::new(),
			aliases: HashMap::new(),
			config,
		}
	}

	pub fn registry(&self) -> &ConnectionRegistry {
		&self.registry
	}

	pub fn symbols(&self) -> &SymbolTable {
		&self.symbols
	}

	pub async fn handle(&mut self, request: BatchRequest) -> (BatchResponse, Flow) {
		let BatchRequest { id, op, args } = request;
		debug!(target = "mserv.batch", op = %op, id = ?id, "request");

		let flow = if matches!(op.as_str(), "quit" | "exit") { Flow::Quit } else { Flow::Continue };
		let response = match self.execute_op(&op, args).await {
			Ok(data) => BatchResponse::success(id, &op, data),
			Err(err) => BatchResponse::failure(id, &op, err.to_command_error()),
		};
		(response, flow)
	}

	async fn execute_op(&mut self, op: &str, args: Value) -> Result<Option<Value>> {
		let data = match op {
			"ping" | "quit" | "exit" => return Ok(None),
			"connect" => self.connect(parse_args(args)?).await?,
			"disconnect" => self.disconnect(parse_optional_args(args)?).await?,
			"switch" => self.switch(parse_args(args)?)?,
			"load" => self.load(parse_args(args)?).await?,
			"create" => {
				let CreateArgs { capability, bind_as } = parse_args(args)?;
				let handle = self.registry.create(&capability).await?;
				self.bind_handle(handle, bind_as)
			}
			"call" => {
				let CallArgs { symbol, bind_as } = parse_args(args)?;
				let handle = self.registry.call(&self.symbols, &symbol).await?;
				self.bind_handle(handle, bind_as)
			}
			"invoke" => {
				let InvokeArgs { object, method, args } = parse_args(args)?;
				let handle = self.object_symbol(&object)?;
				let result = self.registry.invoke(&handle, &method, args).await?;
				json!({ "object": handle, "result": result })
			}
			"release" => {
				let ReleaseArgs { object } = parse_args(args)?;
				let handle = self.object_symbol(&object)?;
				self.registry.release(&handle).await?;
				self.symbols.remove(&object);
				json!({ "released": object })
			}
			"list" => json!({
				"active": self.registry.active_id(),
				"connections": self.registry.list(),
			}),
			"capabilities" => json!({
				"connection": self.registry.active_id(),
				"capabilities": self.registry.available_capabilities(),
			}),
			"symbols" => serde_json::to_value(&self.symbols)?,
			other => return Err(CliError::UnknownOp(other.to_string())),
		};
		Ok(Some(data))
	}

	async fn connect(&mut self, args: ConnectArgs) -> Result<Value> {
		let url = match (args.url, args.host, args.server) {
			(Some(url), None, None) => url.parse::<ServerUrl>()?,
			(None, Some(host), None) => {
				ServerUrl::new(self.registry.config().default_scheme, host, args.port.unwrap_or(DEFAULT_PORT))
			}
			(None, None, Some(index)) => self.config.server(index)?,
			_ => return Err(CliError::invalid("connect takes exactly one of url, host, server")),
		};

		if let Some(alias) = &args.alias {
			validate_alias(alias)?;
			if self.aliases.get(alias).is_some_and(|id| self.registry.contains(*id)) {
				return Err(CliError::invalid(format!("alias '{alias}' is already in use")));
			}
		}

		let id = self.registry.connect_url(&url).await?;
		if let Some(alias) = &args.alias {
			self.aliases.insert(alias.clone(), id);
		}
		Ok(json!({ "connection": id, "url": url.to_string(), "alias": args.alias }))
	}

	async fn disconnect(&mut self, args: DisconnectArgs) -> Result<Value> {
		let target = args.connection.as_ref().map(|c| self.resolve_connection(c)).transpose()?;
		let removed = self.registry.disconnect(target).await;
		Ok(json!({ "disconnected": removed, "active": self.registry.active_id() }))
	}

	fn switch(&mut self, args: SwitchArgs) -> Result<Value> {
		let id = self.resolve_connection(&args.connection)?;
		let symbols = if args.rebind { Some(&mut self.symbols) } else { None };
		self.registry.switch_active(id, symbols)?;
		Ok(json!({ "active": id, "rebound": args.rebind }))
	}

	async fn load(&mut self, args: LoadArgs) -> Result<Value> {
		let locator = match (args.path, args.fragment) {
			(Some(path), None) => BinaryLocator::Path(path),
			(None, fragment) => BinaryLocator::Search {
				fragment: fragment.unwrap_or_else(|| args.name.clone()),
				root: search_root(&self.config, args.root.as_deref())?,
			},
			(Some(_), Some(_)) => return Err(CliError::invalid("load takes path or fragment, not both")),
		};

		let symbols = if args.bind { Some(&mut self.symbols) } else { None };
		let descriptor = self.registry.load(&args.name, &locator, args.distribute, symbols).await?;
		Ok(json!({
			"capability": descriptor.name,
			"library": descriptor.library,
			"scope": descriptor.scope,
			"connection": self.registry.active_id(),
		}))
	}

	fn bind_handle(&mut self, handle: ObjectHandle, bind_as: Option<String>) -> Value {
		let data = json!({ "object": handle, "symbol": bind_as });
		if let Some(name) = bind_as {
			self.symbols.bind_object(name, handle);
		}
		data
	}

	fn object_symbol(&self, name: &str) -> Result<ObjectHandle> {
		match self.symbols.get(name) {
			Some(Symbol::Object(handle)) => Ok(handle.clone()),
			Some(Symbol::Constructor { .. }) => Err(CliError::invalid(format!("'{name}' is a constructor, not an object"))),
			None => Err(CliError::UnknownSymbol(name.to_string())),
		}
	}

	/// `"builtin"`, a numeric id (number or string), or an alias.
	fn resolve_connection(&self, value: &Value) -> Result<ConnectionId> {
		match value {
			Value::Number(n) => n
				.as_u64()
				.and_then(|raw| u32::try_from(raw).ok())
				.map(ConnectionId::from_raw)
				.ok_or_else(|| CliError::invalid(format!("invalid connection id {n}"))),
			Value::String(s) if s == "builtin" => Ok(ConnectionId::BUILTIN),
			Value::String(s) => s
				.parse::<ConnectionId>()
				.ok()
				.or_else(|| self.aliases.get(s).copied())
				.ok_or_else(|| CliError::invalid(format!("unknown connection alias '{s}'"))),
			other => Err(CliError::invalid(format!("connection must be an id or alias, got {other}"))),
		}
	}

	pub async fn shutdown(self) {
		self.registry.shutdown().await;
	}
}

fn validate_alias(alias: &str) -> Result<()> {
	if alias.is_empty() || alias == "builtin" || alias.parse::<u32>().is_ok() {
		return Err(CliError::invalid(format!("'{alias}' cannot be used as a connection alias")));
	}
	Ok(())
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
	serde_json::from_value(args).map_err(|err| CliError::invalid(format!("invalid args: {err}")))
}

/// Like [`parse_args`], but missing args mean all defaults.
fn parse_optional_args<T: DeserializeOwned + Default>(args: Value) -> Result<T> {
	if args.is_null() { Ok(T::default()) } else { parse_args(args) }
}

/// Reads requests from `reader` until EOF or `quit`, writing one response per line.
pub async fn run<R, W>(session: &mut BatchSession, reader: R, out: &mut W) -> Result<()>
where
	R: AsyncBufRead + Unpin,
	W: Write,
{
	let mut lines = reader.lines();
	loop {
		let line = match lines.next_line().await {
			Ok(Some(line)) => line,
			Ok(None) => break,
			Err(err) => {
				error!(target = "mserv.batch", error = %err, "input read failed");
				return Err(err.into());
			}
		};

		let line = line.trim();
		if line.is_empty() {
			continue;
		}

		let request: BatchRequest = match serde_json::from_str(line) {
			Ok(request) => request,
			Err(err) => {
				let response = BatchResponse::failure(None, "unknown", CommandError::new(ErrorCode::ParseError, err.to_string()));
				write_response(out, &response)?;
				continue;
			}
		};

		let (response, flow) = session.handle(request).await;
		write_response(out, &response)?;
		if flow == Flow::Quit {
			break;
		}
	}
	Ok(())
}

fn write_response<W: Write>(out: &mut W, response: &BatchResponse) -> Result<()> {
	let json = serde_json::to_string(response)?;
	writeln!(out, "{json}")?;
	out.flush()?;
	Ok(())
}

/// Entry point for `mserv batch`.
pub async fn execute(config: &CliConfig, file: Option<&Path>) -> Result<()> {
	let mut session = BatchSession::new(config.clone());
	let mut stdout = std::io::stdout();

	let result = match file {
		Some(path) => {
			let input = tokio::fs::File::open(path).await?;
			run(&mut session, BufReader::new(input), &mut stdout).await
		}
		None => run(&mut session, BufReader::new(tokio::io::stdin()), &mut stdout).await,
	};

	session.shutdown().await;
	result
}
