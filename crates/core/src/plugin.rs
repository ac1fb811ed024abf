//! Plugin binary discovery.

use std::fmt;
use std::path::{Path, PathBuf};

use mserv_protocol::{CapabilityDescriptor, CapabilityScope};
use thiserror::Error;
use tracing::debug;

/// Platform shared-library suffixes recognized by discovery.
pub const SHARED_LIBRARY_SUFFIXES: &[&str] = &[".so", ".dylib", ".dll"];

#[derive(Debug, Error)]
pub enum DiscoveryError {
	#[error("search root {0} does not exist")]
	RootMissing(PathBuf),

	#[error("no shared library matching '{fragment}' under {root}")]
	NotFound { fragment: String, root: PathBuf },

	#[error("{0} is not a file")]
	NotAFile(PathBuf),

	#[error("empty search fragment")]
	EmptyFragment,
}

/// Where the shared library backing a capability lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryLocator {
	/// Explicit path to the library.
	Path(PathBuf),
	/// First library under `root` whose file name contains `fragment`.
	Search { fragment: String, root: PathBuf },
}

impl BinaryLocator {
	pub fn path(path: impl Into<PathBuf>) -> Self {
		Self::Path(path.into())
	}

	pub fn search(fragment: impl Into<String>, root: impl Into<PathBuf>) -> Self {
		Self::Search {
			fragment: fragment.into(),
			root: root.into(),
		}
	}
}

impl fmt::Display for BinaryLocator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BinaryLocator::Path(path) => write!(f, "{}", path.display()),
			BinaryLocator::Search { fragment, root } => write!(f, "*{fragment}* under {}", root.display()),
		}
	}
}

/// Resolves a [`BinaryLocator`] into a capability descriptor.
pub trait PluginLocator: Send + Sync {
	fn resolve(
		&self,
		capability: &str,
		locator: &BinaryLocator,
		scope: CapabilityScope,
	) -> Result<CapabilityDescriptor, DiscoveryError>;
}

/// Filesystem-backed locator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPluginLocator;

impl PluginLocator for FsPluginLocator {
	fn resolve(
		&self,
		capability: &str,
		locator: &BinaryLocator,
		scope: CapabilityScope,
	) -> Result<CapabilityDescriptor, DiscoveryError> {
		let library = match locator {
			BinaryLocator::Path(path) => {
				if !path.is_file() {
					return Err(DiscoveryError::NotAFile(path.clone()));
				}
				path.clone()
			}
			BinaryLocator::Search { fragment, root } => find_plugin(root, fragment)?,
		};
		Ok(CapabilityDescriptor::new(capability, library, scope))
	}
}

/// Walks `root` in file-name order and returns the first file whose name
/// contains `fragment` and carries a shared-library suffix.
///
/// Versioned names such as `libWidget.so.1` count as shared libraries.
pub fn find_plugin(root: &Path, fragment: &str) -> Result<PathBuf, DiscoveryError> {
	if fragment.is_empty() {
		return Err(DiscoveryError::EmptyFragment);
	}
	if !root.is_dir() {
		return Err(DiscoveryError::RootMissing(root.to_path_buf()));
	}

	let walker = walkdir::WalkDir::new(root).follow_links(true).sort_by_file_name();
	for entry in walker.into_iter() {
		let Ok(entry) = entry else { continue };
		if !entry.file_type().is_file() {
			continue;
		}
		let name = entry.file_name().to_string_lossy();
		if name.contains(fragment) && is_shared_library(&name) {
			debug!(target = "mserv.plugin", path = %entry.path().display(), fragment, "plugin found");
			return Ok(entry.into_path());
		}
	}

	Err(DiscoveryError::NotFound {
		fragment: fragment.to_string(),
		root: root.to_path_buf(),
	})
}

fn is_shared_library(file_name: &str) -> bool {
	SHARED_LIBRARY_SUFFIXES
		.iter()
		.any(|suffix| file_name.ends_with(suffix) || file_name.contains(&format!("{suffix}.")))
}
