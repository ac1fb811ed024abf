use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use mserv_protocol::{CapabilityDescriptor, CapabilityScope, ErrorPayload, Response};
use serde_json::json;
use tokio::io::duplex;

use super::*;
use crate::engine::Engine;
use crate::server::serve_session;
use crate::transport::PipeTransport;

fn create_test_session(call_timeout: Option<Duration>) -> (RpcSession, tokio::io::DuplexStream, tokio::io::DuplexStream) {
	let (peer_read, session_write) = duplex(1024);
	let (session_read, peer_write) = duplex(1024);

	let (transport, message_rx) = PipeTransport::new(session_write, session_read);
	let session = RpcSession::new(transport.into_transport_parts(message_rx), call_timeout, "test");

	(session, peer_read, peer_write)
}

/// Session wired to an in-process engine through duplex pipes.
fn engine_backed_session() -> Arc<RpcSession> {
	let (server_read, client_write) = duplex(64 * 1024);
	let (client_read, server_write) = duplex(64 * 1024);

	let (server_transport, server_rx) = PipeTransport::new(server_write, server_read);
	tokio::spawn(serve_session(server_transport.into_transport_parts(server_rx), Engine::new(7)));

	let (client_transport, client_rx) = PipeTransport::new(client_write, client_read);
	RpcSession::spawn(client_transport.into_transport_parts(client_rx), Some(Duration::from_secs(5)), "engine")
}

#[test]
fn request_ids_are_sequential() {
	let (session, _, _) = create_test_session(None);

	let id1 = session.last_id.fetch_add(1, Ordering::SeqCst);
	let id2 = session.last_id.fetch_add(1, Ordering::SeqCst);

	assert_eq!(id1, 0);
	assert_eq!(id2, 1);
}

#[tokio::test]
async fn dispatch_completes_pending_request() {
	let (session, _, _) = create_test_session(None);

	let (tx, rx) = oneshot::channel();
	session.callbacks.lock().await.insert(3, tx);

	session
		.dispatch(Message::Response(Response::ok(3, json!({"object": 12}))))
		.await
		.unwrap();

	let result = rx.await.unwrap().unwrap();
	assert_eq!(result["object"], 12);
}

#[tokio::test]
async fn dispatch_maps_remote_error() {
	let (session, _, _) = create_test_session(None);

	let (tx, rx) = oneshot::channel();
	session.callbacks.lock().await.insert(0, tx);

	session
		.dispatch(Message::Response(Response::err(0, ErrorPayload::new("UnknownCapability", "Widget"))))
		.await
		.unwrap();

	let err = rx.await.unwrap().unwrap_err();
	assert_eq!(err.error_name(), Some("UnknownCapability"));
}

#[tokio::test]
async fn dispatch_rejects_uncorrelated_response() {
	let (session, _, _) = create_test_session(None);
	let err = session.dispatch(Message::Response(Response::ok(99, json!(null)))).await.unwrap_err();
	assert!(matches!(err, Error::ProtocolError(_)));
}

#[tokio::test]
async fn call_times_out_when_peer_is_silent() {
	let (session, _peer_read, _peer_write) = create_test_session(Some(Duration::from_millis(50)));
	let session = Arc::new(session);
	let runner = Arc::clone(&session);
	tokio::spawn(async move { runner.run().await });

	let err = session.send_request("hello", json!(null)).await.unwrap_err();
	assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[tokio::test]
async fn pending_requests_fail_when_transport_closes() {
	let (session, peer_read, peer_write) = create_test_session(None);
	let session = Arc::new(session);
	let runner = Arc::clone(&session);
	let run_task = tokio::spawn(async move { runner.run().await });

	let caller = Arc::clone(&session);
	let pending = tokio::spawn(async move { caller.send_request("hello", json!(null)).await });

	tokio::time::sleep(Duration::from_millis(20)).await;
	drop(peer_write);
	drop(peer_read);

	let result = pending.await.unwrap();
	assert!(matches!(result, Err(Error::ChannelClosed)), "got {result:?}");
	run_task.await.unwrap();
	assert!(session.is_closed());
}

#[tokio::test]
async fn round_trip_through_engine() {
	let session = engine_backed_session();

	let hello = session.call(methods::HELLO, Value::Null).await.unwrap();
	assert_eq!(hello["sessionId"], 7);

	let descriptor = CapabilityDescriptor::new("Widget", "libWidget.so", CapabilityScope::Local);
	session
		.call(methods::LOAD_CAPABILITY, json!({ "descriptor": descriptor }))
		.await
		.unwrap();
	let created = session.call(methods::CREATE, json!({ "capability": "Widget" })).await.unwrap();
	assert_eq!(created["object"], 1);

	session.close().await.unwrap();
	assert!(session.is_closed());
	assert!(matches!(session.call(methods::HELLO, Value::Null).await, Err(Error::ChannelClosed)));
}
