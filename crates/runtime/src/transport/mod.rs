//! Message transports.
//!
//! Both transports split into a sending half ([`Transport`]) and a receiving
//! half ([`TransportReceiver`]) that pushes decoded JSON values into an
//! unbounded channel. [`TransportParts`] bundles the two halves with that
//! channel's receiver so the RPC layer and the server loop can own them
//! independently.
//!
//! - [`PipeTransport`]: 4-byte little-endian length prefix + JSON body over
//!   any `AsyncRead`/`AsyncWrite` pair (TCP halves, duplex pipes).
//! - [`WebSocketTransport`]: one JSON text message per WebSocket frame.

#[cfg(test)]
mod tests;

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::{Error, Result};

/// Frames larger than this are rejected as corrupt.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Sending half of a transport.
pub trait Transport: Send {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Receiving half of a transport; `run` reads until the peer goes away.
pub trait TransportReceiver: Send {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// Both halves of a transport plus the channel decoded messages arrive on.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}

/// Length-prefixed JSON transport over a byte stream pair.
pub struct PipeTransport<W, R> {
	writer: W,
	reader: R,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl<W, R> PipeTransport<W, R>
where
	W: AsyncWrite + Unpin + Send + 'static,
	R: AsyncRead + Unpin + Send + 'static,
{
	/// Creates a transport writing to `writer` and reading from `reader`.
	///
	/// Returns the transport and the receiver decoded messages are delivered to.
	pub fn new(writer: W, reader: R) -> (Self, mpsc::UnboundedReceiver<Value>) {
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		(
			Self {
				writer,
				reader,
				message_tx,
			},
			message_rx,
		)
	}

	/// Writes one framed message.
	pub async fn send(&mut self, message: Value) -> Result<()> {
		write_frame(&mut self.writer, &message).await
	}

	/// Reads frames until EOF or the message channel closes.
	pub async fn run(&mut self) -> Result<()> {
		read_frames(&mut self.reader, &self.message_tx).await
	}

	pub fn into_parts(self) -> (PipeTransportSender<W>, PipeTransportReceiver<R>) {
		(
			PipeTransportSender { writer: self.writer },
			PipeTransportReceiver {
				reader: self.reader,
				message_tx: self.message_tx,
			},
		)
	}

	pub fn into_transport_parts(self, message_rx: mpsc::UnboundedReceiver<Value>) -> TransportParts {
		let (sender, receiver) = self.into_parts();
		TransportParts {
			sender: Box::new(sender),
			receiver: Box::new(receiver),
			message_rx,
		}
	}
}

/// Sending half of a [`PipeTransport`].
pub struct PipeTransportSender<W> {
	writer: W,
}

impl<W: AsyncWrite + Unpin + Send> Transport for PipeTransportSender<W> {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move { write_frame(&mut self.writer, &message).await })
	}
}

/// Receiving half of a [`PipeTransport`].
pub struct PipeTransportReceiver<R> {
	reader: R,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl<R: AsyncRead + Unpin + Send + 'static> TransportReceiver for PipeTransportReceiver<R> {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		let PipeTransportReceiver { mut reader, message_tx } = *self;
		Box::pin(async move { read_frames(&mut reader, &message_tx).await })
	}
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, message: &Value) -> Result<()> {
	let body = serde_json::to_vec(message)?;
	if body.len() > MAX_FRAME_LEN {
		return Err(Error::TransportError(format!("Frame of {} bytes exceeds limit", body.len())));
	}
	let length = body.len() as u32;

	writer
		.write_all(&length.to_le_bytes())
		.await
		.map_err(|e| Error::TransportError(format!("Failed to write length prefix: {e}")))?;
	writer
		.write_all(&body)
		.await
		.map_err(|e| Error::TransportError(format!("Failed to write frame body: {e}")))?;
	writer
		.flush()
		.await
		.map_err(|e| Error::TransportError(format!("Failed to flush frame: {e}")))?;
	Ok(())
}

async fn read_frames<R: AsyncRead + Unpin>(reader: &mut R, message_tx: &mpsc::UnboundedSender<Value>) -> Result<()> {
	loop {
		let mut len_buf = [0u8; 4];
		reader
			.read_exact(&mut len_buf)
			.await
			.map_err(|e| Error::TransportError(format!("Failed to read length prefix: {e}")))?;

		let length = u32::from_le_bytes(len_buf) as usize;
		if length > MAX_FRAME_LEN {
			return Err(Error::TransportError(format!("Frame of {length} bytes exceeds limit")));
		}

		let mut body = vec![0u8; length];
		reader
			.read_exact(&mut body)
			.await
			.map_err(|e| Error::TransportError(format!("Failed to read frame body: {e}")))?;

		let message: Value = serde_json::from_slice(&body)?;
		if message_tx.send(message).is_err() {
			tracing::debug!(target = "mserv.transport", "message channel closed; stopping reader");
			return Ok(());
		}
	}
}

/// JSON-over-WebSocket transport.
pub struct WebSocketTransport<S> {
	stream: WebSocketStream<S>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl<S> WebSocketTransport<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	pub fn new(stream: WebSocketStream<S>) -> (Self, mpsc::UnboundedReceiver<Value>) {
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		(Self { stream, message_tx }, message_rx)
	}

	pub fn into_parts(self) -> (WebSocketTransportSender<S>, WebSocketTransportReceiver<S>) {
		let (sink, stream) = self.stream.split();
		(
			WebSocketTransportSender { sink },
			WebSocketTransportReceiver {
				stream,
				message_tx: self.message_tx,
			},
		)
	}

	pub fn into_transport_parts(self, message_rx: mpsc::UnboundedReceiver<Value>) -> TransportParts {
		let (sender, receiver) = self.into_parts();
		TransportParts {
			sender: Box::new(sender),
			receiver: Box::new(receiver),
			message_rx,
		}
	}
}

/// Sending half of a [`WebSocketTransport`].
pub struct WebSocketTransportSender<S> {
	sink: SplitSink<WebSocketStream<S>, WsMessage>,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> Transport for WebSocketTransportSender<S> {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			let text = serde_json::to_string(&message)?;
			self.sink
				.send(WsMessage::Text(text))
				.await
				.map_err(|e| Error::TransportError(format!("WebSocket send failed: {e}")))
		})
	}
}

/// Receiving half of a [`WebSocketTransport`].
pub struct WebSocketTransportReceiver<S> {
	stream: SplitStream<WebSocketStream<S>>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send + 'static> TransportReceiver for WebSocketTransportReceiver<S> {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		let WebSocketTransportReceiver { mut stream, message_tx } = *self;
		Box::pin(async move {
			while let Some(frame) = stream.next().await {
				let frame = frame.map_err(|e| Error::TransportError(format!("WebSocket read failed: {e}")))?;
				let message: Value = match frame {
					WsMessage::Text(text) => serde_json::from_str(&text)?,
					WsMessage::Binary(bytes) => serde_json::from_slice(&bytes)?,
					WsMessage::Close(_) => break,
					_ => continue,
				};
				if message_tx.send(message).is_err() {
					break;
				}
			}
			Ok(())
		})
	}
}
