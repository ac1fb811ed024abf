//! The built-in session: an [`Engine`] living in the client process.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use mserv_protocol::Request;
use parking_lot::Mutex;
use serde_json::Value;

use crate::engine::Engine;
use crate::error::Error;
use crate::session::{Session, SessionFuture, response_into_result};

/// Session served by an in-process engine, no transport involved.
pub struct BuiltinSession {
	engine: Mutex<Engine>,
	last_id: AtomicU32,
	closed: AtomicBool,
}

impl Default for BuiltinSession {
	fn default() -> Self {
		Self::new()
	}
}

impl BuiltinSession {
	pub fn new() -> Self {
		Self {
			engine: Mutex::new(Engine::new(0)),
			last_id: AtomicU32::new(0),
			closed: AtomicBool::new(false),
		}
	}
}

impl Session for BuiltinSession {
	fn call(&self, method: &str, params: Value) -> SessionFuture<'_, Value> {
		let request = Request {
			id: self.last_id.fetch_add(1, Ordering::SeqCst),
			method: method.to_string(),
			params,
		};
		Box::pin(async move {
			if self.closed.load(Ordering::SeqCst) {
				return Err(Error::ChannelClosed);
			}
			let response = self.engine.lock().handle(&request);
			response_into_result(response)
		})
	}

	fn close(&self) -> SessionFuture<'_, ()> {
		Box::pin(async move {
			if !self.closed.swap(true, Ordering::SeqCst) {
				tracing::debug!(target = "mserv.builtin", "built-in session closed");
			}
			Ok(())
		})
	}

	fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}
