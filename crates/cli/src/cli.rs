use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use crate::styles::cli_styles;

#[derive(Parser, Debug)]
#[command(name = "mserv")]
#[command(about = "Multi-server session manager: host engines, drive sessions, locate plugins")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: toon (default), json, ndjson, or text
	#[arg(short = 'f', long, global = true, value_enum, default_value = "toon")]
	pub format: OutputFormat,

	/// Config file (default: $XDG_CONFIG_HOME/mserv/config.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Host a processing server, one engine per client
	Serve {
		/// Address to listen on
		#[arg(long, default_value = "127.0.0.1:11111", value_name = "ADDR")]
		bind: String,

		/// Accept WebSocket (ws://) clients instead of framed TCP (cs://)
		#[arg(long)]
		ws: bool,
	},

	/// Read NDJSON requests and drive a connection registry
	///
	/// Each line is `{"id"?, "op", "args"}`; one response line is written per
	/// request. Ops: connect, disconnect, switch, load, create, call, invoke,
	/// release, list, capabilities, symbols, ping, quit.
	Batch {
		/// Read requests from FILE instead of stdin
		#[arg(long, value_name = "FILE")]
		file: Option<PathBuf>,
	},

	/// Find the first shared library whose name contains FRAGMENT
	FindPlugin {
		fragment: String,

		/// Search root (default: config pluginRoot, then current directory)
		#[arg(long, value_name = "DIR")]
		root: Option<PathBuf>,
	},
}

#[cfg(test)]
mod tests {
	use clap::CommandFactory;

	use super::*;

	#[test]
	fn verify_cli() {
		Cli::command().debug_assert();
	}

	#[test]
	fn parses_serve_defaults() {
		let cli = Cli::try_parse_from(["mserv", "serve"]).unwrap();
		match cli.command {
			Commands::Serve { bind, ws } => {
				assert_eq!(bind, "127.0.0.1:11111");
				assert!(!ws);
			}
			other => panic!("unexpected command {other:?}"),
		}
		assert_eq!(cli.format, OutputFormat::Toon);
	}

	#[test]
	fn global_flags_after_subcommand() {
		let cli = Cli::try_parse_from(["mserv", "find-plugin", "Widget", "--root", "/opt", "-vv", "-f", "json"]).unwrap();
		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.format, OutputFormat::Json);
		assert!(matches!(cli.command, Commands::FindPlugin { ref fragment, .. } if fragment == "Widget"));
	}
}
