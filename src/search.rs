use std::env;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::trace;

use crate::error::{ShellError, ShellResult};

pub const PATH_KEY: &'static str = "PATH";

/// Directories probed, in order, for program names without a `/`.
#[derive(Debug, Clone)]
pub struct SearchPath {
	dirs: Vec<PathBuf>,
}

impl SearchPath {
	pub fn new<S: AsRef<OsStr>>(path: S) -> SearchPath {
		let dirs = env::split_paths(path.as_ref())
			.map(|dir| if dir.as_os_str().is_empty() { PathBuf::from(".") } else { dir })
			.collect();
		SearchPath { dirs: dirs }
	}

	pub fn lookup(&self, name: &str) -> Option<PathBuf> {
		self.dirs.iter()
			.map(|dir| dir.join(name))
			.find(|candidate| {
				trace!("probing {}", candidate.display());
				is_executable(candidate)
			})
	}

	pub fn resolve(&self, name: &str) -> ShellResult<PathBuf> {
		if name.contains('/') {
			return Ok(PathBuf::from(name));
		}
		self.lookup(name).ok_or_else(|| ShellError::Resolution(name.to_string()))
	}
}

fn is_executable(path: &Path) -> bool {
	match fs::metadata(path) {
		Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
		Err(_) => false,
	}
}
