//! The opaque session a connection talks through.

use std::future::Future;
use std::pin::Pin;

use mserv_protocol::Response;
use serde_json::Value;

use crate::error::{Result, parse_remote_error};

/// Boxed future returned by [`Session`] methods.
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A live processing session, local or remote.
///
/// The connection registry only ever sees this trait, so the built-in
/// engine and network transports are interchangeable behind it.
pub trait Session: Send + Sync {
	/// Sends a request and awaits the matching response.
	fn call(&self, method: &str, params: Value) -> SessionFuture<'_, Value>;

	/// Ends the session. Calling it again is a no-op.
	fn close(&self) -> SessionFuture<'_, ()>;

	/// Returns true once the session can no longer serve calls.
	fn is_closed(&self) -> bool;
}

/// Unwraps a [`Response`] into its result or a [`crate::Error::Remote`].
pub(crate) fn response_into_result(response: Response) -> Result<Value> {
	match response.error {
		Some(wrapper) => Err(parse_remote_error(wrapper.error)),
		None => Ok(response.result.unwrap_or(Value::Null)),
	}
}
