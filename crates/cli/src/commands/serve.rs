use anyhow::Context;
use mserv_protocol::Scheme;
use mserv_runtime::Server;
use serde_json::json;
use tracing::info;

use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, print_result};

/// Hosts a server until ctrl-c.
pub async fn execute(bind: &str, ws: bool, format: OutputFormat) -> Result<()> {
	let scheme = if ws { Scheme::Ws } else { Scheme::Cs };
	let server = Server::bind(bind, scheme)
		.await
		.with_context(|| format!("failed to bind {scheme}://{bind}"))?;
	let url = server.url().context("bound listener has no local address")?;
	let shutdown = server.shutdown_handle();

	let result = ResultBuilder::new("serve")
		.data(json!({ "url": url.to_string(), "scheme": scheme }))
		.build();
	print_result(&result, format);

	let run_task = tokio::spawn(server.run());

	tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
	info!(target = "mserv.server", "ctrl-c received, shutting down");
	shutdown.shutdown();

	run_task
		.await
		.context("server task panicked")?
		.context("server stopped with an error")?;
	Ok(())
}
