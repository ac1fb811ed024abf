//! CLI configuration file (`$XDG_CONFIG_HOME/mserv/config.json`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mserv::RegistryConfig;
use mserv_protocol::{ServerUrl, parse_url_list};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CliError, Result};

/// Schema version written into new config files.
pub const SCHEMA_VERSION: u32 = 1;

/// Overrides [`CliConfig::servers`] with a `|`-separated URL list.
pub const SERVER_URLS_ENV: &str = "MSERV_SERVER_URLS";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
	#[serde(default)]
	pub schema: u32,
	/// Server URLs addressable by index from batch `connect`.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub servers: Vec<String>,
	/// Default search root for plugin discovery.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub plugin_root: Option<PathBuf>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub connect_timeout_ms: Option<u64>,
	/// `0` disables the per-call timeout.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub call_timeout_ms: Option<u64>,
}

impl CliConfig {
	pub fn new() -> Self {
		Self {
			schema: SCHEMA_VERSION,
			..Default::default()
		}
	}

	/// Loads from `explicit`, or the default location when `None`.
	///
	/// A missing default file yields the default config; a missing explicit
	/// one is an error. [`SERVER_URLS_ENV`] is applied afterwards.
	pub fn load(explicit: Option<&Path>) -> Result<Self> {
		let mut config = match explicit {
			Some(path) => read_config(path)?.ok_or_else(|| CliError::Config {
				path: path.to_path_buf(),
				reason: "file not found".to_string(),
			})?,
			None => match default_config_path() {
				Some(path) => read_config(&path)?.unwrap_or_else(CliConfig::new),
				None => CliConfig::new(),
			},
		};

		if let Ok(urls) = std::env::var(SERVER_URLS_ENV) {
			config.override_servers(&urls);
		}
		Ok(config)
	}

	/// Replaces the server list with the non-empty entries of a `|`-separated list.
	pub fn override_servers(&mut self, urls: &str) {
		let servers: Vec<String> = urls
			.split('|')
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.map(str::to_string)
			.collect();
		if !servers.is_empty() {
			debug!(target = "mserv.config", count = servers.len(), "server list overridden from environment");
			self.servers = servers;
		}
	}

	pub fn server_urls(&self) -> Result<Vec<ServerUrl>> {
		Ok(parse_url_list(&self.servers.join("|"))?)
	}

	/// Server at `index` in the configured list.
	pub fn server(&self, index: usize) -> Result<ServerUrl> {
		let urls = self.server_urls()?;
		urls.get(index).cloned().ok_or_else(|| {
			CliError::invalid(format!("server index {index} out of range ({} configured)", urls.len()))
		})
	}

	pub fn registry_config(&self) -> RegistryConfig {
		let mut config = RegistryConfig::default();
		if let Some(ms) = self.connect_timeout_ms {
			config = config.with_connect_timeout(Duration::from_millis(ms));
		}
		if let Some(ms) = self.call_timeout_ms {
			config = config.with_call_timeout((ms > 0).then(|| Duration::from_millis(ms)));
		}
		config
	}
}

/// `$XDG_CONFIG_HOME/mserv/config.json`, falling back to the platform config dir.
pub fn default_config_path() -> Option<PathBuf> {
	std::env::var_os("XDG_CONFIG_HOME")
		.map(PathBuf::from)
		.or_else(dirs::config_dir)
		.map(|dir| dir.join("mserv").join("config.json"))
}

fn read_config(path: &Path) -> Result<Option<CliConfig>> {
	let content = match fs::read_to_string(path) {
		Ok(content) => content,
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(err) => return Err(err.into()),
	};
	serde_json::from_str(&content).map(Some).map_err(|err| CliError::Config {
		path: path.to_path_buf(),
		reason: err.to_string(),
	})
}

#[cfg(test)]
mod tests {
	use mserv::Scheme;
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn reads_camel_case_file() {
		let tmp = TempDir::new().unwrap();
		let path = tmp.path().join("config.json");
		fs::write(
			&path,
			r#"{"schema":1,"servers":["cs://render-01:11111","ws://render-02:9000"],"pluginRoot":"/opt/plugins","callTimeoutMs":0}"#,
		)
		.unwrap();

		let config = read_config(&path).unwrap().unwrap();
		assert_eq!(config.plugin_root.as_deref(), Some(Path::new("/opt/plugins")));

		let urls = config.server_urls().unwrap();
		assert_eq!(urls.len(), 2);
		assert_eq!(urls[1].scheme, Scheme::Ws);
		assert_eq!(config.server(1).unwrap().port, 9000);
		assert!(config.server(2).is_err());

		assert_eq!(config.registry_config().dial.call_timeout, None);
	}

	#[test]
	fn missing_file_is_none_and_garbage_is_config_error() {
		let tmp = TempDir::new().unwrap();
		assert!(read_config(&tmp.path().join("absent.json")).unwrap().is_none());

		let bad = tmp.path().join("bad.json");
		fs::write(&bad, "{ not json").unwrap();
		assert!(matches!(read_config(&bad), Err(CliError::Config { .. })));
	}

	#[test]
	fn explicit_missing_path_fails() {
		let tmp = TempDir::new().unwrap();
		let err = CliConfig::load(Some(&tmp.path().join("nope.json"))).unwrap_err();
		assert!(matches!(err, CliError::Config { .. }));
	}

	#[test]
	fn override_skips_empty_entries() {
		let mut config = CliConfig::new();
		config.servers = vec!["cs://old:1".into()];

		config.override_servers("");
		assert_eq!(config.servers, vec!["cs://old:1".to_string()]);

		config.override_servers("cs://a:11111||cs://b:11112|");
		assert_eq!(config.servers, vec!["cs://a:11111".to_string(), "cs://b:11112".to_string()]);
	}

	#[test]
	fn timeouts_flow_into_registry_config() {
		let config = CliConfig {
			connect_timeout_ms: Some(1500),
			call_timeout_ms: Some(250),
			..CliConfig::new()
		};
		let registry = config.registry_config();
		assert_eq!(registry.dial.connect_timeout, Duration::from_millis(1500));
		assert_eq!(registry.dial.call_timeout, Some(Duration::from_millis(250)));
	}
}
