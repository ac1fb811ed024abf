//! Structured output envelope for CLI commands.
//!
//! Every one-shot command prints a result envelope on stdout:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "ok": true,
//!   "command": "find-plugin",
//!   "data": { "path": "/opt/plugins/libWidget.so" },
//!   "timings": { "durationMs": 3 }
//! }
//! ```
//!
//! On failure `data` is replaced by `error: { code, message, details? }`.
//! Batch mode streams its own per-line responses, see
//! [`commands::batch`](crate::commands).


use std::io::{self, Write};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Bumped on breaking changes to the envelope.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// TOON output (default, compact)
	#[default]
	Toon,
	/// Pretty-printed JSON
	Json,
	/// One JSON document per line
	Ndjson,
	/// Human-readable text
	Text,
}

impl std::str::FromStr for OutputFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"toon" => Ok(OutputFormat::Toon),
			"json" => Ok(OutputFormat::Json),
			"ndjson" => Ok(OutputFormat::Ndjson),
			"text" => Ok(OutputFormat::Text),
			_ => Err(format!("unknown format: {s}")),
		}
	}
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			OutputFormat::Toon => "toon",
			OutputFormat::Json => "json",
			OutputFormat::Ndjson => "ndjson",
			OutputFormat::Text => "text",
		})
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub schema_version: Option<u32>,

	pub ok: bool,

	pub command: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
}

/// Error information for failed commands and batch requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

impl CommandError {
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
			details: None,
		}
	}

	pub fn with_details(mut self, details: serde_json::Value) -> Self {
		self.details = Some(details);
		self
	}
}

/// Stable error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// Server unreachable, handshake failed, or ids exhausted
	ConnectionFailed,
	/// Connection id or alias is not open
	UnknownConnection,
	/// Plugin binary could not be resolved
	PluginLoadFailed,
	/// Capability not available on the active connection
	UnknownCapability,
	/// Symbol bound to another connection than the active one
	WrongSession,
	/// Symbol names an object, not a constructor
	NotConstructor,
	/// Object was released or never existed
	UnknownObject,
	/// Transport or engine failure during a call
	SessionError,
	/// Call did not complete in time
	Timeout,
	/// Request line was not valid JSON
	ParseError,
	/// Unrecognized batch op
	UnknownCommand,
	/// Missing or invalid argument
	InvalidInput,
	/// Config file unreadable or malformed
	ConfigError,
	/// File I/O error
	IoError,
	/// Anything else
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			ErrorCode::ConnectionFailed => "CONNECTION_FAILED",
			ErrorCode::UnknownConnection => "UNKNOWN_CONNECTION",
			ErrorCode::PluginLoadFailed => "PLUGIN_LOAD_FAILED",
			ErrorCode::UnknownCapability => "UNKNOWN_CAPABILITY",
			ErrorCode::WrongSession => "WRONG_SESSION",
			ErrorCode::NotConstructor => "NOT_CONSTRUCTOR",
			ErrorCode::UnknownObject => "UNKNOWN_OBJECT",
			ErrorCode::SessionError => "SESSION_ERROR",
			ErrorCode::Timeout => "TIMEOUT",
			ErrorCode::ParseError => "PARSE_ERROR",
			ErrorCode::UnknownCommand => "UNKNOWN_COMMAND",
			ErrorCode::InvalidInput => "INVALID_INPUT",
			ErrorCode::ConfigError => "CONFIG_ERROR",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		})
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Self {
			duration_ms: duration.as_millis() as u64,
		}
	}
}

pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Option<Instant>,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			start_time: None,
		}
	}

	/// Records elapsed time from `start` into `timings`.
	pub fn started_at(mut self, start: Instant) -> Self {
		self.start_time = Some(start);
		self
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError::new(code, message));
		self
	}

	pub fn command_error(mut self, error: CommandError) -> Self {
		self.error = Some(error);
		self
	}

	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			schema_version: Some(SCHEMA_VERSION),
			ok: self.error.is_none(),
			command: self.command,
			data: self.data,
			error: self.error,
			timings: self.start_time.map(|start| Timings::from(start.elapsed())),
		}
	}
}

/// Prints a command result to stdout in `format`.
pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	let mut stdout = io::stdout().lock();
	let _ = write_result(&mut stdout, result, format);
}

pub fn write_result<T: Serialize>(out: &mut impl Write, result: &CommandResult<T>, format: OutputFormat) -> io::Result<()> {
	match format {
		OutputFormat::Toon => {
			if let Ok(value) = serde_json::to_value(result) {
				writeln!(out, "{}", toon::encode(&value, None))?;
			}
		}
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				writeln!(out, "{json}")?;
			}
		}
		OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(result) {
				writeln!(out, "{json}")?;
			}
		}
		OutputFormat::Text => write_result_text(out, result)?,
	}
	out.flush()
}

fn write_result_text<T: Serialize>(out: &mut impl Write, result: &CommandResult<T>) -> io::Result<()> {
	if result.ok {
		if let Some(data) = &result.data {
			if let Ok(json) = serde_json::to_string_pretty(data) {
				writeln!(out, "{json}")?;
			}
		}
	} else if let Some(error) = &result.error {
		writeln!(out, "Error [{}]: {}", error.code, error.message)?;
	}
	if let Some(timings) = &result.timings {
		writeln!(out, "Completed in {}ms", timings.duration_ms)?;
	}
	Ok(())
}

pub fn print_error_stderr(error: &CommandError) {
	eprintln!("Error [{}]: {}", error.code, error.message);
}
