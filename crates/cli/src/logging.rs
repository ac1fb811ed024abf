use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Maps `-v` count to a default filter; `RUST_LOG` wins when set.
pub fn default_filter(verbosity: u8) -> &'static str {
	// 0 = errors only
	// 1 (-v) = registry/loader/server lifecycle, wire chatter stays at warn
	// 2+ (-vv) = everything
	match verbosity {
		0 => "error",
		1 => "info,mserv_runtime::rpc=warn,mserv_runtime::engine=warn,mserv_runtime::transport=warn",
		_ => "debug",
	}
}

pub fn init_logging(verbosity: u8) {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
