use mserv::Scheme;
use mserv_runtime::{Server, ShutdownHandle};
use serde_json::{Value, json};
use tempfile::TempDir;

use super::*;

async fn start_server(scheme: Scheme) -> (String, ShutdownHandle) {
	let server = Server::bind("127.0.0.1:0", scheme).await.unwrap();
	let url = server.url().unwrap().to_string();
	let shutdown = server.shutdown_handle();
	tokio::spawn(server.run());
	(url, shutdown)
}

fn plugin_root() -> TempDir {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("libWidget.so"), b"").unwrap();
	dir
}

fn session_with_root(root: &Path) -> BatchSession {
	BatchSession::new(CliConfig {
		plugin_root: Some(root.to_path_buf()),
		connect_timeout_ms: Some(2000),
		call_timeout_ms: Some(5000),
		..CliConfig::new()
	})
}

async fn run_script(session: &mut BatchSession, script: &str) -> Vec<Value> {
	let mut out = Vec::new();
	run(session, script.as_bytes(), &mut out).await.unwrap();
	String::from_utf8(out)
		.unwrap()
		.lines()
		.map(|line| serde_json::from_str(line).unwrap())
		.collect()
}

fn request(id: &str, op: &str, args: Value) -> String {
	json!({ "id": id, "op": op, "args": args }).to_string()
}

#[tokio::test]
async fn ping_and_quit_stop_the_loop() {
	let root = plugin_root();
	let mut session = session_with_root(root.path());
	let script = [
		r#"{"id":"1","op":"ping"}"#,
		r#"{"op":"quit"}"#,
		r#"{"id":"never","op":"ping"}"#,
	]
	.join("\n");

	let responses = run_script(&mut session, &script).await;
	assert_eq!(responses.len(), 2);
	assert_eq!(responses[0]["id"], "1");
	assert_eq!(responses[0]["ok"], true);
	assert_eq!(responses[1]["op"], "quit");
	assert!(responses[1].get("id").is_none());
}

#[tokio::test]
async fn malformed_and_unknown_requests_are_reported() {
	let root = plugin_root();
	let mut session = session_with_root(root.path());
	let script = ["{ nope", "", r#"{"id":"2","op":"teleport"}"#, r#"{"id":"3","op":"switch","args":{}}"#].join("\n");

	let responses = run_script(&mut session, &script).await;
	assert_eq!(responses.len(), 3);
	assert_eq!(responses[0]["error"]["code"], "PARSE_ERROR");
	assert_eq!(responses[1]["error"]["code"], "UNKNOWN_COMMAND");
	assert_eq!(responses[2]["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn scoping_walkthrough() {
	let root = plugin_root();
	let (url1, stop1) = start_server(Scheme::Cs).await;
	let (url2, stop2) = start_server(Scheme::Ws).await;
	let mut session = session_with_root(root.path());

	let script = [
		request("c1", "connect", json!({ "url": url1, "alias": "left" })),
		request("c2", "connect", json!({ "url": url2, "alias": "right" })),
		request("load", "load", json!({ "name": "Widget" })),
		request("w", "call", json!({ "symbol": "Widget", "as": "w" })),
		request("sw", "switch", json!({ "connection": "left", "rebind": false })),
		request("stale", "call", json!({ "symbol": "Widget" })),
		request("direct", "create", json!({ "capability": "Widget" })),
		request("set", "invoke", json!({ "object": "w", "method": "setProperty", "args": { "name": "radius", "value": 3 } })),
		request("get", "invoke", json!({ "object": "w", "method": "getProperty", "args": { "name": "radius" } })),
		request("rebind", "switch", json!({ "connection": "left" })),
		request("gone", "call", json!({ "symbol": "Widget" })),
		request("list", "list", Value::Null),
	]
	.join("\n");

	let responses = run_script(&mut session, &script).await;
	let by_id = |id: &str| responses.iter().find(|r| r["id"] == id).unwrap().clone();

	assert_eq!(by_id("c1")["data"]["connection"], 1);
	assert_eq!(by_id("c2")["data"]["connection"], 2);
	assert_eq!(by_id("load")["data"]["connection"], 2);
	assert_eq!(by_id("w")["data"]["object"]["connection"], 2);

	let stale = by_id("stale");
	assert_eq!(stale["ok"], false);
	assert_eq!(stale["error"]["code"], "WRONG_SESSION");
	assert_eq!(stale["error"]["details"]["boundConnection"], 2);
	assert_eq!(by_id("direct")["error"]["code"], "UNKNOWN_CAPABILITY");

	assert_eq!(by_id("set")["ok"], true);
	assert_eq!(by_id("get")["data"]["result"], 3);

	assert_eq!(by_id("gone")["error"]["code"], "UNKNOWN_CAPABILITY");

	let list = by_id("list");
	assert_eq!(list["data"]["active"], 1);
	assert_eq!(list["data"]["connections"].as_array().unwrap().len(), 3);

	session.shutdown().await;
	stop1.shutdown();
	stop2.shutdown();
}

#[tokio::test]
async fn disconnect_past_last_connection_is_ok() {
	let root = plugin_root();
	let (url, stop) = start_server(Scheme::Cs).await;
	let mut session = session_with_root(root.path());

	let script = [
		request("c", "connect", json!({ "url": url, "alias": "only" })),
		request("d1", "disconnect", Value::Null),
		request("d2", "disconnect", Value::Null),
		request("d3", "disconnect", json!({ "connection": "builtin" })),
		request("sw", "switch", json!({ "connection": "only" })),
		request("d4", "disconnect", json!({ "connection": "only" })),
		request("again", "connect", json!({ "url": url, "alias": "only" })),
		request("sw2", "switch", json!({ "connection": "only" })),
	]
	.join("\n");

	let responses = run_script(&mut session, &script).await;
	assert_eq!(responses[1]["data"]["disconnected"], 1);
	assert_eq!(responses[1]["data"]["active"], 0);
	assert_eq!(responses[2]["ok"], true);
	assert_eq!(responses[2]["data"]["disconnected"], Value::Null);
	assert_eq!(responses[3]["ok"], true);
	assert_eq!(responses[4]["error"]["code"], "UNKNOWN_CONNECTION");
	assert_eq!(responses[5]["data"]["disconnected"], Value::Null);
	assert_eq!(responses[6]["data"]["connection"], 2);
	assert_eq!(responses[7]["ok"], true);
	assert_eq!(session.registry().active_id(), ConnectionId::from_raw(2));
	assert_eq!(session.registry().len(), 2);

	session.shutdown().await;
	stop.shutdown();
}

#[tokio::test]
async fn release_drops_the_symbol() {
	let root = plugin_root();
	let mut session = session_with_root(root.path());

	let script = [
		request("load", "load", json!({ "name": "Widget", "fragment": "Widget" })),
		request("make", "create", json!({ "capability": "Widget", "as": "w" })),
		request("rel", "release", json!({ "object": "w" })),
		request("again", "invoke", json!({ "object": "w", "method": "describe" })),
		request("ctor", "invoke", json!({ "object": "Widget", "method": "describe" })),
	]
	.join("\n");

	let responses = run_script(&mut session, &script).await;
	assert_eq!(responses[1]["data"]["object"]["connection"], 0);
	assert_eq!(responses[2]["data"]["released"], "w");
	assert!(!session.symbols().contains("w"));
	assert_eq!(responses[3]["error"]["details"]["symbol"], "w");
	assert_eq!(responses[4]["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn connect_by_config_index_and_bad_alias() {
	let root = plugin_root();
	let (url, stop) = start_server(Scheme::Cs).await;
	let mut session = BatchSession::new(CliConfig {
		servers: vec![url.clone()],
		plugin_root: Some(root.path().to_path_buf()),
		..CliConfig::new()
	});

	let script = [
		request("idx", "connect", json!({ "server": 0 })),
		request("oob", "connect", json!({ "server": 4 })),
		request("alias", "connect", json!({ "url": url, "alias": "builtin" })),
		request("both", "connect", json!({ "url": url, "host": "127.0.0.1" })),
		request("named", "connect", json!({ "url": url, "alias": "main" })),
		request("dup", "connect", json!({ "url": url, "alias": "main" })),
	]
	.join("\n");

	let responses = run_script(&mut session, &script).await;
	assert_eq!(responses[0]["data"]["url"], url);
	for response in &responses[1..4] {
		assert_eq!(response["error"]["code"], "INVALID_INPUT", "{response}");
	}
	assert_eq!(responses[4]["ok"], true);
	assert_eq!(responses[5]["error"]["code"], "INVALID_INPUT");
	assert_eq!(session.registry().len(), 3);

	session.shutdown().await;
	stop.shutdown();
}
