pub mod batch;
mod find_plugin;
mod serve;

use crate::cli::{Cli, Commands};
use crate::config::CliConfig;
use crate::error::Result;
use crate::output::OutputFormat;

pub async fn dispatch(cli: Cli, format: OutputFormat) -> Result<()> {
	let config = CliConfig::load(cli.config.as_deref())?;

	match cli.command {
		Commands::Serve { bind, ws } => serve::execute(&bind, ws, format).await,
		Commands::Batch { file } => batch::execute(&config, file.as_deref()).await,
		Commands::FindPlugin { fragment, root } => find_plugin::execute(&config, &fragment, root.as_deref(), format),
	}
}
