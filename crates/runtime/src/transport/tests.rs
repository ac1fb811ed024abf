use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::*;

async fn write_raw_frame(writer: &mut tokio::io::DuplexStream, message: &Value) {
	let body = serde_json::to_vec(message).unwrap();
	writer.write_all(&(body.len() as u32).to_le_bytes()).await.unwrap();
	writer.write_all(&body).await.unwrap();
	writer.flush().await.unwrap();
}

#[tokio::test]
async fn sender_writes_length_prefixed_frame() {
	let (mut peer_read, transport_write) = tokio::io::duplex(1024);
	let (transport_read, _peer_write) = tokio::io::duplex(1024);

	let (transport, _rx) = PipeTransport::new(transport_write, transport_read);
	let (mut sender, _receiver) = transport.into_parts();

	let message = json!({"id": 1, "method": "create", "params": {"capability": "Widget"}});
	sender.send(message.clone()).await.unwrap();

	let mut len_buf = [0u8; 4];
	peer_read.read_exact(&mut len_buf).await.unwrap();
	let length = u32::from_le_bytes(len_buf) as usize;

	let mut body = vec![0u8; length];
	peer_read.read_exact(&mut body).await.unwrap();

	let received: Value = serde_json::from_slice(&body).unwrap();
	assert_eq!(received, message);
}

#[tokio::test]
async fn receiver_delivers_frames_in_order() {
	let (_peer_read, transport_write) = tokio::io::duplex(4096);
	let (transport_read, mut peer_write) = tokio::io::duplex(4096);

	let (mut transport, mut rx) = PipeTransport::new(transport_write, transport_read);
	let read_task = tokio::spawn(async move { transport.run().await });

	let messages = vec![
		json!({"id": 0, "result": {"serverVersion": "1.0.0"}}),
		json!({"id": 1, "result": null}),
		json!({"id": 2, "result": {"object": 1}}),
	];
	for msg in &messages {
		write_raw_frame(&mut peer_write, msg).await;
	}

	for expected in &messages {
		assert_eq!(&rx.recv().await.unwrap(), expected);
	}

	drop(peer_write);
	drop(rx);
	let _ = read_task.await;
}

#[tokio::test]
async fn receiver_handles_frames_larger_than_pipe_buffer() {
	let (_peer_read, transport_write) = tokio::io::duplex(1024);
	let (transport_read, mut peer_write) = tokio::io::duplex(1024);

	let (mut transport, mut rx) = PipeTransport::new(transport_write, transport_read);
	let read_task = tokio::spawn(async move { transport.run().await });

	let large = json!({"id": 9, "result": {"blob": "x".repeat(100_000)}});
	let writer = tokio::spawn(async move {
		write_raw_frame(&mut peer_write, &large).await;
		peer_write
	});

	let received = rx.recv().await.unwrap();
	assert_eq!(received["result"]["blob"].as_str().unwrap().len(), 100_000);

	drop(writer.await.unwrap());
	drop(rx);
	let _ = read_task.await;
}

#[tokio::test]
async fn truncated_length_prefix_is_an_error() {
	let (_peer_read, transport_write) = tokio::io::duplex(1024);
	let (transport_read, mut peer_write) = tokio::io::duplex(1024);

	let (mut transport, _rx) = PipeTransport::new(transport_write, transport_read);

	peer_write.write_all(&[0x01, 0x02]).await.unwrap();
	peer_write.flush().await.unwrap();
	drop(peer_write);

	let err = transport.run().await.unwrap_err();
	assert!(err.to_string().contains("Failed to read length prefix"), "unexpected error: {err}");
}

#[tokio::test]
async fn oversized_frame_is_rejected() {
	let (_peer_read, transport_write) = tokio::io::duplex(1024);
	let (transport_read, mut peer_write) = tokio::io::duplex(1024);

	let (mut transport, _rx) = PipeTransport::new(transport_write, transport_read);

	peer_write.write_all(&u32::MAX.to_le_bytes()).await.unwrap();
	peer_write.flush().await.unwrap();

	let err = transport.run().await.unwrap_err();
	assert!(err.to_string().contains("exceeds limit"), "unexpected error: {err}");
}

#[tokio::test]
async fn reader_stops_cleanly_when_channel_dropped() {
	let (_peer_read, transport_write) = tokio::io::duplex(1024);
	let (transport_read, mut peer_write) = tokio::io::duplex(1024);

	let (transport, rx) = PipeTransport::new(transport_write, transport_read);
	let parts = transport.into_transport_parts(rx);
	let TransportParts { receiver, message_rx, .. } = parts;
	drop(message_rx);

	let read_task = tokio::spawn(receiver.run());
	write_raw_frame(&mut peer_write, &json!({"id": 0, "result": null})).await;

	assert!(read_task.await.unwrap().is_ok());
}

#[tokio::test]
async fn websocket_transport_exchanges_json() {
	let (client_io, server_io) = tokio::io::duplex(4096);

	let (client, server) = tokio::join!(
		tokio_tungstenite::client_async("ws://localhost/", client_io),
		tokio_tungstenite::accept_async(server_io)
	);
	let (client_ws, _) = client.unwrap();
	let server_ws = server.unwrap();

	let (client_transport, client_rx) = WebSocketTransport::new(client_ws);
	let (server_transport, server_rx) = WebSocketTransport::new(server_ws);

	let TransportParts {
		sender: mut client_tx,
		receiver: client_receiver,
		message_rx: mut client_rx,
	} = client_transport.into_transport_parts(client_rx);
	let TransportParts {
		sender: mut server_tx,
		receiver: server_receiver,
		message_rx: mut server_rx,
	} = server_transport.into_transport_parts(server_rx);

	tokio::spawn(client_receiver.run());
	tokio::spawn(server_receiver.run());

	client_tx.send(json!({"id": 0, "method": "hello"})).await.unwrap();
	let request = server_rx.recv().await.unwrap();
	assert_eq!(request["method"], "hello");

	server_tx.send(json!({"id": 0, "result": {"sessionId": 3}})).await.unwrap();
	let response = client_rx.recv().await.unwrap();
	assert_eq!(response["result"]["sessionId"], 3);
}
