//! Server addressing: `scheme://host:port`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port used when a URL omits one.
pub const DEFAULT_PORT: u16 = 11111;

/// Failure to parse a server URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
	#[error("missing '://' in server url '{0}'")]
	MissingSeparator(String),

	#[error("unsupported scheme '{0}' (expected cs or ws)")]
	UnsupportedScheme(String),

	#[error("missing host in server url '{0}'")]
	MissingHost(String),

	#[error("invalid port '{port}' in server url '{url}'")]
	InvalidPort { url: String, port: String },
}

/// Transport scheme of a remote server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
	/// Length-prefixed JSON frames over TCP.
	#[default]
	Cs,
	/// JSON text messages over WebSocket.
	Ws,
}

impl Scheme {
	pub fn as_str(&self) -> &'static str {
		match self {
			Scheme::Cs => "cs",
			Scheme::Ws => "ws",
		}
	}
}

impl fmt::Display for Scheme {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Scheme {
	type Err = UrlError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"cs" => Ok(Scheme::Cs),
			"ws" => Ok(Scheme::Ws),
			other => Err(UrlError::UnsupportedScheme(other.to_string())),
		}
	}
}

/// Address of a remote processing server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerUrl {
	pub scheme: Scheme,
	pub host: String,
	pub port: u16,
}

impl ServerUrl {
	pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
		Self {
			scheme,
			host: host.into(),
			port,
		}
	}

	/// `host:port`, suitable for socket connection.
	pub fn authority(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}

impl fmt::Display for ServerUrl {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
	}
}

impl FromStr for ServerUrl {
	type Err = UrlError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		let (scheme, rest) = s.split_once("://").ok_or_else(|| UrlError::MissingSeparator(s.to_string()))?;
		let scheme = scheme.parse::<Scheme>()?;
		let rest = rest.trim_end_matches('/');

		let (host, port) = match rest.rsplit_once(':') {
			Some((host, port)) => {
				let port = port.parse::<u16>().map_err(|_| UrlError::InvalidPort {
					url: s.to_string(),
					port: port.to_string(),
				})?;
				(host, port)
			}
			None => (rest, DEFAULT_PORT),
		};

		if host.is_empty() {
			return Err(UrlError::MissingHost(s.to_string()));
		}

		Ok(Self::new(scheme, host, port))
	}
}

/// Parses a `|`-separated list of server URLs, skipping empty entries.
pub fn parse_url_list(list: &str) -> Result<Vec<ServerUrl>, UrlError> {
	list.split('|').map(str::trim).filter(|s| !s.is_empty()).map(str::parse).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_scheme_host_and_port() {
		let url: ServerUrl = "cs://render-01:11112".parse().unwrap();
		assert_eq!(url.scheme, Scheme::Cs);
		assert_eq!(url.host, "render-01");
		assert_eq!(url.port, 11112);
		assert_eq!(url.to_string(), "cs://render-01:11112");
		assert_eq!(url.authority(), "render-01:11112");
	}

	#[test]
	fn missing_port_uses_default() {
		let url: ServerUrl = "ws://localhost".parse().unwrap();
		assert_eq!(url.scheme, Scheme::Ws);
		assert_eq!(url.port, DEFAULT_PORT);
	}

	#[test]
	fn rejects_malformed_urls() {
		assert_eq!("localhost:11111".parse::<ServerUrl>(), Err(UrlError::MissingSeparator("localhost:11111".into())));
		assert!(matches!("http://localhost:1".parse::<ServerUrl>(), Err(UrlError::UnsupportedScheme(_))));
		assert!(matches!("cs://:1".parse::<ServerUrl>(), Err(UrlError::MissingHost(_))));
		assert!(matches!("cs://localhost:http".parse::<ServerUrl>(), Err(UrlError::InvalidPort { .. })));
		assert!(matches!("cs://localhost:70000".parse::<ServerUrl>(), Err(UrlError::InvalidPort { .. })));
	}

	#[test]
	fn parses_pipe_separated_list() {
		let urls = parse_url_list("cs://a:1|cs://b:2| |ws://c:3").unwrap();
		assert_eq!(urls.len(), 3);
		assert_eq!(urls[1], ServerUrl::new(Scheme::Cs, "b", 2));
		assert_eq!(urls[2].scheme, Scheme::Ws);
		assert!(parse_url_list("").unwrap().is_empty());
	}
}
