use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::path::Path;

use log::{debug, warn};
use nix::fcntl::{self, FcntlArg};
use nix::unistd;

use crate::error::{ShellError, ShellResult};
use crate::types::{RedirectType, Redirection};

/// Unbuffered writer on a raw descriptor. Builtins write through this so
/// their output follows whatever is currently bound to fd 1 and 2, and so a
/// forked child never touches the locks of `io::stdout()`.
pub struct FdWriter {
	fd: RawFd,
}

impl FdWriter {
	pub fn stdout() -> FdWriter {
		FdWriter { fd: libc::STDOUT_FILENO }
	}

	pub fn stderr() -> FdWriter {
		FdWriter { fd: libc::STDERR_FILENO }
	}
}

impl Write for FdWriter {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		loop {
			let n = unsafe { libc::write(self.fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
			if n >= 0 {
				return Ok(n as usize);
			}
			let err = io::Error::last_os_error();
			if err.kind() != io::ErrorKind::Interrupted {
				return Err(err);
			}
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

/// Files a stage asked for, opened and owned until handed to a process.
#[derive(Debug, Default)]
pub struct StageIo {
	pub input: Option<OwnedFd>,
	pub output: Option<OwnedFd>,
}

impl StageIo {
	pub fn open(redirection: &Redirection) -> ShellResult<StageIo> {
		StageIo::open_ends(redirection, true, true)
	}

	/// Opens only the sides a stage owns. Inside a pipeline the first stage
	/// owns its input and the last stage its output; the rest are pipes.
	pub fn open_ends(redirection: &Redirection, input: bool, output: bool) -> ShellResult<StageIo> {
		let input = match redirection.input {
			Some(ref path) if input => Some(open_target(path, RedirectType::Input)?),
			_ => None,
		};
		let output = match redirection.output() {
			Some((path, typ)) if output => Some(open_target(path, typ)?),
			_ => None,
		};
		Ok(StageIo { input: input, output: output })
	}
}

pub fn open_target(path: &Path, typ: RedirectType) -> ShellResult<OwnedFd> {
	let fail = |e: io::Error| ShellError::Redirection { path: path.to_path_buf(), source: e };
	let mut oopt = fs::OpenOptions::new();
	let _ = match typ {
		RedirectType::Input => oopt.read(true),
		RedirectType::Output => oopt.write(true).create(true).truncate(true).mode(0o644),
		RedirectType::Append => oopt.append(true).create(true).mode(0o644),
	};
	if typ != RedirectType::Input {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(fail)?;
		}
	}
	let file = oopt.open(path).map_err(fail)?;
	debug!("opened {} for {}", path.display(), typ.operator());
	Ok(OwnedFd::from(file))
}

/// Standard streams of the controller that were rebound for a builtin.
/// Dropping it puts the originals back and closes the saved copies.
pub struct SavedStdio {
	saved: Vec<(RawFd, OwnedFd)>,
}

impl SavedStdio {
	pub fn redirect(io: &StageIo) -> ShellResult<SavedStdio> {
		let _ = io::stdout().flush();
		let mut guard = SavedStdio { saved: vec![] };
		let bindings = [(libc::STDIN_FILENO, &io.input), (libc::STDOUT_FILENO, &io.output)];
		for (target, fd) in bindings {
			let fd = match *fd {
				Some(ref fd) => fd,
				None => continue,
			};
			let copy = fcntl::fcntl(target, FcntlArg::F_DUPFD_CLOEXEC(10))?;
			guard.saved.push((target, unsafe { OwnedFd::from_raw_fd(copy) }));
			unistd::dup2(fd.as_raw_fd(), target)?;
		}
		Ok(guard)
	}
}

impl Drop for SavedStdio {
	fn drop(&mut self) {
		let _ = io::stdout().flush();
		for (target, saved) in self.saved.drain(..).rev() {
			if let Err(e) = unistd::dup2(saved.as_raw_fd(), target) {
				warn!("could not restore fd {}: {}", target, e);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::fs;
	use std::io::Read;

	use super::*;

	#[test]
	fn truncate_then_append() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("f");
		fs::write(&path, "old contents\n").unwrap();

		let fd = open_target(&path, RedirectType::Output).unwrap();
		fs::File::from(fd).write_all(b"one\n").unwrap();
		let fd = open_target(&path, RedirectType::Append).unwrap();
		fs::File::from(fd).write_all(b"two\n").unwrap();

		assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
	}

	#[test]
	fn output_creates_missing_directories() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("a/b/c/out.txt");
		let fd = open_target(&path, RedirectType::Append).unwrap();
		drop(fd);
		assert!(path.is_file());
	}

	#[test]
	fn missing_input_is_a_redirection_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("missing");
		match open_target(&path, RedirectType::Input) {
			Err(ShellError::Redirection { path: p, .. }) => assert_eq!(p, path),
			other => panic!("unexpected {:?}", other),
		}
		assert!(!path.exists());
	}

	#[test]
	fn stage_io_opens_both_sides() {
		let dir = tempfile::tempdir().unwrap();
		let input = dir.path().join("in");
		fs::write(&input, "data").unwrap();
		let redirection = Redirection {
			input: Some(input),
			output_append: Some(dir.path().join("out")),
			..Redirection::default()
		};
		let io = StageIo::open(&redirection).unwrap();
		let mut contents = String::new();
		fs::File::from(io.input.unwrap()).read_to_string(&mut contents).unwrap();
		assert_eq!(contents, "data");
		assert!(io.output.is_some());
		assert!(dir.path().join("out").exists());
	}

	#[test]
	fn unowned_sides_are_left_closed() {
		let dir = tempfile::tempdir().unwrap();
		let input = dir.path().join("in");
		fs::write(&input, "data").unwrap();
		let redirection = Redirection {
			input: Some(input),
			output_truncate: Some(dir.path().join("out")),
			..Redirection::default()
		};
		let io = StageIo::open_ends(&redirection, false, false).unwrap();
		assert!(io.input.is_none());
		assert!(io.output.is_none());
		assert!(!dir.path().join("out").exists());

		let io = StageIo::open_ends(&redirection, true, false).unwrap();
		assert!(io.input.is_some());
		assert!(io.output.is_none());
	}
}
