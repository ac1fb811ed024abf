//! mserv runtime - session transports, RPC correlation, and engines
//!
//! This crate provides everything below the connection registry:
//!
//! - **Session**: the opaque handle a connection talks through
//! - **Engine**: the in-process processing engine (built-in session and server side)
//! - **Transport**: length-prefixed pipes (`cs://`) and WebSocket (`ws://`)
//! - **RPC**: request/response correlation with per-call timeouts
//! - **Dialer**: turns a [`ServerUrl`](mserv_protocol::ServerUrl) into a live session
//! - **Server**: hosts one engine per accepted client
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │    mserv    │  ConnectionRegistry, loader, factory
//! └──────┬──────┘
//!        │ Arc<dyn Session>
//! ┌──────▼────────────────────────┐
//! │ mserv-runtime                 │
//! │  BuiltinSession   RpcSession  │
//! │       │               │       │
//! │    Engine        Transport ───┼──► Server ──► Engine
//! └───────────────────────────────┘
//! ```

pub mod builtin;
pub mod dialer;
pub mod engine;
pub mod error;
pub mod rpc;
pub mod server;
pub mod session;
pub mod transport;

pub use builtin::BuiltinSession;
pub use dialer::{DialOptions, Dialer, NetDialer};
pub use engine::Engine;
pub use error::{Error, Result};
pub use rpc::RpcSession;
pub use server::{Server, ShutdownHandle, serve_session};
pub use session::{Session, SessionFuture};
pub use transport::{
	PipeTransport, PipeTransportReceiver, PipeTransportSender, Transport, TransportParts, TransportReceiver, WebSocketTransport,
	WebSocketTransportReceiver, WebSocketTransportSender,
};
