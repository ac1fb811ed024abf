//! Turning a [`ServerUrl`] into a live [`Session`].

use std::sync::Arc;
use std::time::Duration;

use mserv_protocol::{Scheme, ServerUrl, methods};
use serde_json::Value;
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::rpc::RpcSession;
use crate::session::{Session, SessionFuture};
use crate::transport::{PipeTransport, WebSocketTransport};

/// Establishes sessions with remote servers.
pub trait Dialer: Send + Sync {
	fn dial<'a>(&'a self, url: &'a ServerUrl) -> SessionFuture<'a, Arc<dyn Session>>;
}

/// Timeouts applied when dialing and on every call of the resulting session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialOptions {
	pub connect_timeout: Duration,
	/// `None` waits indefinitely.
	pub call_timeout: Option<Duration>,
}

impl Default for DialOptions {
	fn default() -> Self {
		Self {
			connect_timeout: Duration::from_secs(10),
			call_timeout: Some(Duration::from_secs(30)),
		}
	}
}

/// Dials `cs://` over TCP and `ws://` over WebSocket, then performs the `hello` handshake.
#[derive(Debug, Clone, Default)]
pub struct NetDialer {
	options: DialOptions,
}

impl NetDialer {
	pub fn new(options: DialOptions) -> Self {
		Self { options }
	}

	pub fn options(&self) -> DialOptions {
		self.options
	}

	async fn open(&self, url: &ServerUrl) -> Result<Arc<RpcSession>> {
		let label = url.to_string();
		let call_timeout = self.options.call_timeout;

		let session = match url.scheme {
			Scheme::Cs => {
				let stream = TcpStream::connect(url.authority()).await?;
				stream.set_nodelay(true)?;
				let (read_half, write_half) = stream.into_split();
				let (transport, message_rx) = PipeTransport::new(write_half, read_half);
				RpcSession::spawn(transport.into_transport_parts(message_rx), call_timeout, label)
			}
			Scheme::Ws => {
				let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/", url.authority()))
					.await
					.map_err(|e| Error::TransportError(format!("WebSocket handshake failed: {e}")))?;
				let (transport, message_rx) = WebSocketTransport::new(ws);
				RpcSession::spawn(transport.into_transport_parts(message_rx), call_timeout, label)
			}
		};

		let hello = session.send_request(methods::HELLO, Value::Null).await?;
		tracing::debug!(
			target = "mserv.dialer",
			%url,
			server_version = hello["serverVersion"].as_str().unwrap_or("unknown"),
			session = hello["sessionId"].as_u64().unwrap_or_default(),
			"handshake complete"
		);
		Ok(session)
	}
}

impl Dialer for NetDialer {
	fn dial<'a>(&'a self, url: &'a ServerUrl) -> SessionFuture<'a, Arc<dyn Session>> {
		Box::pin(async move {
			let opened = tokio::time::timeout(self.options.connect_timeout, self.open(url)).await;
			match opened {
				Ok(Ok(session)) => Ok(session as Arc<dyn Session>),
				Ok(Err(err)) => Err(Error::ConnectionFailed {
					endpoint: url.to_string(),
					reason: err.to_string(),
				}),
				Err(_) => Err(Error::ConnectionFailed {
					endpoint: url.to_string(),
					reason: format!("timed out after {}ms", self.options.connect_timeout.as_millis()),
				}),
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::server::Server;

	#[tokio::test]
	async fn dials_cs_and_ws_servers() {
		for scheme in [Scheme::Cs, Scheme::Ws] {
			let server = Server::bind("127.0.0.1:0", scheme).await.unwrap();
			let url = server.url().unwrap();
			let shutdown = server.shutdown_handle();
			tokio::spawn(server.run());

			let session = NetDialer::default().dial(&url).await.unwrap();
			let err = session
				.call(methods::CREATE, serde_json::json!({ "capability": "Widget" }))
				.await
				.unwrap_err();
			assert_eq!(err.error_name(), Some("UnknownCapability"), "scheme {scheme}");

			session.close().await.unwrap();
			assert!(session.is_closed());
			shutdown.shutdown();
		}
	}

	#[tokio::test]
	async fn unreachable_endpoint_is_connection_failure() {
		let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();
		drop(listener);

		let url = ServerUrl::new(Scheme::Cs, "127.0.0.1", port);
		let err = NetDialer::default().dial(&url).await.err().unwrap();
		assert!(matches!(err, Error::ConnectionFailed { .. }), "got {err:?}");
	}
}
