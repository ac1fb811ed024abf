use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use crate::config::CliConfig;
use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FindPluginData {
	fragment: String,
	root: PathBuf,
	path: PathBuf,
}

pub fn execute(config: &CliConfig, fragment: &str, root: Option<&Path>, format: OutputFormat) -> Result<()> {
	let start = Instant::now();
	let root = search_root(config, root)?;
	let path = mserv::find_plugin(&root, fragment)?;

	let result = ResultBuilder::new("find-plugin")
		.started_at(start)
		.data(FindPluginData {
			fragment: fragment.to_string(),
			root,
			path,
		})
		.build();
	print_result(&result, format);
	Ok(())
}

/// Explicit root, then config `pluginRoot`, then the working directory.
pub(crate) fn search_root(config: &CliConfig, explicit: Option<&Path>) -> Result<PathBuf> {
	match explicit.map(Path::to_path_buf).or_else(|| config.plugin_root.clone()) {
		Some(root) => Ok(root),
		None => Ok(std::env::current_dir()?),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn explicit_root_wins_over_config() {
		let config = CliConfig {
			plugin_root: Some(PathBuf::from("/opt/plugins")),
			..CliConfig::new()
		};
		assert_eq!(search_root(&config, Some(Path::new("/tmp/x"))).unwrap(), PathBuf::from("/tmp/x"));
		assert_eq!(search_root(&config, None).unwrap(), PathBuf::from("/opt/plugins"));
		assert_eq!(search_root(&CliConfig::new(), None).unwrap(), std::env::current_dir().unwrap());
	}
}
