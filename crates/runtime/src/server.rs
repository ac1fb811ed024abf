//! Processing server: hosts one [`Engine`] per accepted client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use mserv_protocol::{Request, Scheme, ServerUrl};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::transport::{PipeTransport, TransportParts, WebSocketTransport};

/// Stops a running [`Server`] from another task.
#[derive(Clone)]
pub struct ShutdownHandle {
	tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
	pub fn shutdown(&self) {
		let _ = self.tx.send(true);
	}
}

/// TCP listener speaking the `cs` or `ws` scheme.
pub struct Server {
	listener: TcpListener,
	scheme: Scheme,
	next_session: AtomicU64,
	shutdown_tx: Arc<watch::Sender<bool>>,
	shutdown_rx: watch::Receiver<bool>,
}

impl Server {
	/// Binds `addr` (e.g. `127.0.0.1:11111`, port 0 for ephemeral).
	pub async fn bind(addr: &str, scheme: Scheme) -> Result<Self> {
		let listener = TcpListener::bind(addr).await?;
		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		info!(target = "mserv.server", addr = %listener.local_addr()?, %scheme, "server listening");
		Ok(Self {
			listener,
			scheme,
			next_session: AtomicU64::new(1),
			shutdown_tx: Arc::new(shutdown_tx),
			shutdown_rx,
		})
	}

	pub fn local_addr(&self) -> Result<SocketAddr> {
		Ok(self.listener.local_addr()?)
	}

	/// URL clients use to reach this server.
	pub fn url(&self) -> Result<ServerUrl> {
		let addr = self.local_addr()?;
		Ok(ServerUrl::new(self.scheme, addr.ip().to_string(), addr.port()))
	}

	pub fn shutdown_handle(&self) -> ShutdownHandle {
		ShutdownHandle {
			tx: Arc::clone(&self.shutdown_tx),
		}
	}

	/// Accepts clients until shut down. Each client gets a fresh engine.
	pub async fn run(mut self) -> Result<()> {
		loop {
			tokio::select! {
				changed = self.shutdown_rx.changed() => {
					if changed.is_err() || *self.shutdown_rx.borrow() {
						info!(target = "mserv.server", "shutdown requested");
						break;
					}
				}
				accept = self.listener.accept() => {
					let (stream, peer) = accept?;
					let session_id = self.next_session.fetch_add(1, Ordering::SeqCst);
					let scheme = self.scheme;
					debug!(target = "mserv.server", %peer, session = session_id, "client connected");
					tokio::spawn(async move {
						match handle_client(stream, scheme, session_id).await {
							Ok(()) => debug!(target = "mserv.server", %peer, session = session_id, "client session ended"),
							Err(err) => warn!(target = "mserv.server", %peer, session = session_id, error = %err, "client session failed"),
						}
					});
				}
			}
		}
		Ok(())
	}
}

async fn handle_client(stream: TcpStream, scheme: Scheme, session_id: u64) -> Result<()> {
	let parts = match scheme {
		Scheme::Cs => {
			stream.set_nodelay(true)?;
			let (read_half, write_half) = stream.into_split();
			let (transport, message_rx) = PipeTransport::new(write_half, read_half);
			transport.into_transport_parts(message_rx)
		}
		Scheme::Ws => {
			let ws = tokio_tungstenite::accept_async(stream)
				.await
				.map_err(|e| Error::TransportError(format!("WebSocket handshake failed: {e}")))?;
			let (transport, message_rx) = WebSocketTransport::new(ws);
			transport.into_transport_parts(message_rx)
		}
	};
	serve_session(parts, Engine::new(session_id)).await
}

/// Serves requests from `parts` with `engine` until the client leaves or says goodbye.
pub async fn serve_session(parts: TransportParts, mut engine: Engine) -> Result<()> {
	let TransportParts {
		mut sender,
		receiver,
		mut message_rx,
	} = parts;
	let session_id = engine.session_id();

	let reader = tokio::spawn(async move {
		if let Err(e) = receiver.run().await {
			debug!(target = "mserv.server", session = session_id, error = %e, "reader stopped");
		}
	});

	while let Some(value) = message_rx.recv().await {
		let request: Request = match serde_json::from_value(value) {
			Ok(request) => request,
			Err(e) => {
				warn!(target = "mserv.server", session = session_id, error = %e, "dropping malformed request");
				continue;
			}
		};

		let response = engine.handle(&request);
		sender.send(serde_json::to_value(&response)?).await?;

		if engine.is_finished() {
			debug!(target = "mserv.server", session = session_id, "client said goodbye");
			break;
		}
	}

	reader.abort();
	Ok(())
}
