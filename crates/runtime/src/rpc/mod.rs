//! Request/response correlation over a transport.
//!
//! [`RpcSession`] is the client side of a remote session:
//! - Generating sequential request IDs
//! - Correlating responses with pending requests via oneshot channels
//! - Applying the optional per-call timeout
//! - Failing every pending request once the transport goes away
//!
//! # Message Flow
//!
//! 1. Caller invokes [`Session::call`] with a method and params
//! 2. A unique ID and a oneshot channel are registered
//! 3. The request is queued for the writer task
//! 4. The dispatch loop receives the response and completes the oneshot

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use mserv_protocol::{Message, Request, methods};
use parking_lot::Mutex as ParkingLotMutex;
use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::session::{Session, SessionFuture, response_into_result};
use crate::transport::{Transport, TransportParts, TransportReceiver};

/// Pending request callbacks keyed by request ID.
type CallbackMap = Arc<TokioMutex<HashMap<u32, oneshot::Sender<Result<Value>>>>>;

/// RAII guard ensuring callback cleanup when a request future is dropped.
struct CancelGuard {
	id: u32,
	callbacks: CallbackMap,
	completed: bool,
}

impl CancelGuard {
	fn new(id: u32, callbacks: CallbackMap) -> Self {
		Self {
			id,
			callbacks,
			completed: false,
		}
	}

	fn complete(&mut self) {
		self.completed = true;
	}
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}

		let id = self.id;
		let callbacks = Arc::clone(&self.callbacks);

		if let Ok(handle) = tokio::runtime::Handle::try_current() {
			handle.spawn(async move {
				if callbacks.lock().await.remove(&id).is_some() {
					tracing::debug!(target = "mserv.rpc", id, "removed orphaned callback");
				}
			});
		}
	}
}

/// Future returned by [`RpcSession::send_request`] with automatic cancellation cleanup.
struct ResponseFuture {
	rx: oneshot::Receiver<Result<Value>>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.complete();
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// Client side of a remote session.
pub struct RpcSession {
	/// Sequential request ID counter
	last_id: AtomicU32,
	callbacks: CallbackMap,
	/// Queue feeding the writer task; taken on close
	outbound_tx: ParkingLotMutex<Option<mpsc::UnboundedSender<Value>>>,
	/// Transport halves and queues, taken once by `run()`
	transport_sender: TokioMutex<Option<Box<dyn Transport>>>,
	transport_receiver: TokioMutex<Option<Box<dyn TransportReceiver>>>,
	message_rx: TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>,
	outbound_rx: TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>,
	call_timeout: Option<Duration>,
	closed: AtomicBool,
	label: String,
}

impl RpcSession {
	/// Creates a session over `parts`. Nothing is read or written until [`run`](Self::run).
	pub fn new(parts: TransportParts, call_timeout: Option<Duration>, label: impl Into<String>) -> Self {
		let TransportParts {
			sender,
			receiver,
			message_rx,
		} = parts;
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

		Self {
			last_id: AtomicU32::new(0),
			callbacks: Arc::new(TokioMutex::new(HashMap::new())),
			outbound_tx: ParkingLotMutex::new(Some(outbound_tx)),
			transport_sender: TokioMutex::new(Some(sender)),
			transport_receiver: TokioMutex::new(Some(receiver)),
			message_rx: TokioMutex::new(Some(message_rx)),
			outbound_rx: TokioMutex::new(Some(outbound_rx)),
			call_timeout,
			closed: AtomicBool::new(false),
			label: label.into(),
		}
	}

	/// Creates a session and spawns its dispatch loop on the current runtime.
	pub fn spawn(parts: TransportParts, call_timeout: Option<Duration>, label: impl Into<String>) -> Arc<Self> {
		let session = Arc::new(Self::new(parts, call_timeout, label));
		let runner = Arc::clone(&session);
		tokio::spawn(async move { runner.run().await });
		session
	}

	/// Sends a request and awaits the response, honoring the call timeout.
	pub async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(Error::ChannelClosed);
		}

		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		tracing::debug!(target = "mserv.rpc", session = %self.label, id, method, "sending request");

		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().await.insert(id, tx);
		let guard = CancelGuard::new(id, Arc::clone(&self.callbacks));

		let request = Request {
			id,
			method: method.to_string(),
			params,
		};
		let request_value = serde_json::to_value(&request)?;

		let queued = match self.outbound_tx.lock().as_ref() {
			Some(tx) => tx.send(request_value).is_ok(),
			None => false,
		};
		if !queued {
			tracing::debug!(target = "mserv.rpc", session = %self.label, id, "outbound channel closed");
			return Err(Error::ChannelClosed);
		}

		let response = ResponseFuture { rx, guard };
		match self.call_timeout {
			Some(limit) => tokio::time::timeout(limit, response)
				.await
				.map_err(|_| Error::Timeout(format!("{method} on {} after {}ms", self.label, limit.as_millis())))?,
			None => response.await,
		}
	}

	/// Runs the writer, reader, and dispatch loop until the transport closes.
	///
	/// Calling it a second time returns immediately.
	pub async fn run(self: &Arc<Self>) {
		let (Some(transport_receiver), Some(mut transport_sender), Some(mut outbound_rx), Some(mut message_rx)) = (
			self.transport_receiver.lock().await.take(),
			self.transport_sender.lock().await.take(),
			self.outbound_rx.lock().await.take(),
			self.message_rx.lock().await.take(),
		) else {
			tracing::warn!(target = "mserv.rpc", session = %self.label, "run() called twice; ignoring");
			return;
		};

		let label = self.label.clone();
		let reader_handle = tokio::spawn(async move {
			if let Err(e) = transport_receiver.run().await {
				tracing::debug!(target = "mserv.rpc", session = %label, error = %e, "transport reader stopped");
			}
		});

		let label = self.label.clone();
		let writer_handle = tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				if let Err(e) = transport_sender.send(message).await {
					tracing::error!(target = "mserv.rpc", session = %label, error = %e, "transport write error");
					break;
				}
			}
		});

		while let Some(message_value) = message_rx.recv().await {
			match serde_json::from_value::<Message>(message_value) {
				Ok(message) => {
					if let Err(e) = self.dispatch_internal(message).await {
						tracing::warn!(target = "mserv.rpc", session = %self.label, error = %e, "error dispatching message");
					}
				}
				Err(e) => {
					tracing::warn!(target = "mserv.rpc", session = %self.label, error = %e, "failed to parse message");
				}
			}
		}

		self.mark_closed().await;
		writer_handle.abort();
		let _ = reader_handle.await;
	}

	/// Dispatch an incoming message (test-only public version)
	#[cfg(test)]
	pub async fn dispatch(&self, message: Message) -> Result<()> {
		self.dispatch_internal(message).await
	}

	async fn dispatch_internal(&self, message: Message) -> Result<()> {
		match message {
			Message::Response(response) => {
				let callback = self
					.callbacks
					.lock()
					.await
					.remove(&response.id)
					.ok_or_else(|| Error::ProtocolError(format!("Cannot find request to respond: id={}", response.id)))?;

				let _ = callback.send(response_into_result(response));
				Ok(())
			}
			Message::Request(request) => Err(Error::ProtocolError(format!(
				"Server sent a request ('{}'), which clients do not serve",
				request.method
			))),
			Message::Unknown(value) => {
				tracing::debug!(target = "mserv.rpc", message = %value, "unknown message type (ignored)");
				Ok(())
			}
		}
	}

	/// Marks the session closed and fails every pending request.
	async fn mark_closed(&self) {
		self.closed.store(true, Ordering::SeqCst);
		self.outbound_tx.lock().take();
		let pending: Vec<_> = self.callbacks.lock().await.drain().collect();
		if !pending.is_empty() {
			tracing::debug!(target = "mserv.rpc", session = %self.label, count = pending.len(), "failing pending requests");
		}
		for (_, callback) in pending {
			let _ = callback.send(Err(Error::ChannelClosed));
		}
	}
}

impl Session for RpcSession {
	fn call(&self, method: &str, params: Value) -> SessionFuture<'_, Value> {
		let method = method.to_string();
		Box::pin(async move { self.send_request(&method, params).await })
	}

	fn close(&self) -> SessionFuture<'_, ()> {
		Box::pin(async move {
			if self.closed.load(Ordering::SeqCst) {
				return Ok(());
			}
			if let Err(e) = self.send_request(methods::GOODBYE, Value::Null).await {
				tracing::debug!(target = "mserv.rpc", session = %self.label, error = %e, "goodbye failed; closing anyway");
			}
			self.mark_closed().await;
			Ok(())
		})
	}

	fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}
