use std::path::PathBuf;

use mserv::{DiscoveryError, ErrorKind};
use mserv_protocol::UrlError;
use serde_json::json;
use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Registry(#[from] mserv::Error),

	#[error(transparent)]
	Discovery(#[from] DiscoveryError),

	#[error(transparent)]
	Url(#[from] UrlError),

	#[error("invalid config at {path}: {reason}")]
	Config { path: PathBuf, reason: String },

	#[error("{0}")]
	InvalidInput(String),

	#[error("unknown op '{0}'")]
	UnknownOp(String),

	#[error("unknown symbol '{0}'")]
	UnknownSymbol(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	pub fn invalid(message: impl Into<String>) -> Self {
		CliError::InvalidInput(message.into())
	}

	pub fn to_command_error(&self) -> CommandError {
		match self {
			CliError::Registry(err) => registry_error(err),
			CliError::Discovery(err) => CommandError::new(ErrorCode::PluginLoadFailed, err.to_string()),
			CliError::Url(err) => CommandError::new(ErrorCode::InvalidInput, err.to_string()),
			CliError::Config { path, .. } => {
				CommandError::new(ErrorCode::ConfigError, self.to_string()).with_details(json!({ "path": path }))
			}
			CliError::InvalidInput(msg) => CommandError::new(ErrorCode::InvalidInput, msg.clone()),
			CliError::UnknownOp(_) => CommandError::new(ErrorCode::UnknownCommand, self.to_string()),
			CliError::UnknownSymbol(name) => {
				CommandError::new(ErrorCode::InvalidInput, self.to_string()).with_details(json!({ "symbol": name }))
			}
			CliError::Io(err) => CommandError::new(ErrorCode::IoError, err.to_string()),
			CliError::Json(err) => CommandError::new(ErrorCode::InternalError, format!("JSON error: {err}")),
			CliError::Anyhow(err) => CommandError::new(ErrorCode::InternalError, format!("{err:#}")),
		}
	}
}

fn registry_error(err: &mserv::Error) -> CommandError {
	let code = match err.kind() {
		ErrorKind::Connection => ErrorCode::ConnectionFailed,
		ErrorKind::UnknownConnection => ErrorCode::UnknownConnection,
		ErrorKind::PluginLoad => ErrorCode::PluginLoadFailed,
		ErrorKind::UnknownCapability => ErrorCode::UnknownCapability,
		ErrorKind::WrongSession => ErrorCode::WrongSession,
		ErrorKind::NotConstructor => ErrorCode::NotConstructor,
		ErrorKind::UnknownObject => ErrorCode::UnknownObject,
		ErrorKind::Runtime => match err {
			mserv::Error::Runtime(inner) if inner.is_timeout() => ErrorCode::Timeout,
			_ => ErrorCode::SessionError,
		},
	};

	let details = match err {
		mserv::Error::WrongSession { name, bound, active } => {
			Some(json!({ "symbol": name, "boundConnection": bound, "activeConnection": active }))
		}
		mserv::Error::UnknownCapability { name, connection } => Some(json!({ "capability": name, "connection": connection })),
		mserv::Error::PartialLoad { capability, loaded, failed } => Some(json!({
			"capability": capability,
			"loaded": loaded,
			"failed": failed
				.iter()
				.map(|(connection, reason)| json!({ "connection": connection, "reason": reason }))
				.collect::<Vec<_>>(),
		})),
		mserv::Error::Runtime(inner) => inner.error_name().map(|name| json!({ "remote": name })),
		_ => None,
	};

	CommandError {
		code,
		message: err.to_string(),
		details,
	}
}
