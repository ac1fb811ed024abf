//! Registry configuration.

use std::time::Duration;

use mserv_protocol::Scheme;
use mserv_runtime::DialOptions;

/// Settings applied to every connection a [`ConnectionRegistry`](crate::ConnectionRegistry) opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryConfig {
	/// Scheme used by [`connect`](crate::ConnectionRegistry::connect) (host/port form).
	pub default_scheme: Scheme,
	pub dial: DialOptions,
}

impl RegistryConfig {
	pub fn with_default_scheme(mut self, scheme: Scheme) -> Self {
		self.default_scheme = scheme;
		self
	}

	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.dial.connect_timeout = timeout;
		self
	}

	/// Sets the per-call timeout for remote sessions; `None` waits indefinitely.
	pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.dial.call_timeout = timeout;
		self
	}
}
