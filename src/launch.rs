use std::env;
use std::ffi::{CString, OsString};
use std::io::Write;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::io::{AsRawFd, OwnedFd};
use std::path::Path;

use log::{debug, trace};
use nix::errno::Errno;
use nix::fcntl::{self, FcntlArg, FdFlag};
use nix::sys::signal::Signal;
use nix::sys::wait::{self, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use crate::error::{ShellError, ShellResult};
use crate::redirect::FdWriter;

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
	Exited(u8),
	Signaled(Signal),
}

impl Status {
	pub fn code(&self) -> u8 {
		match *self {
			Status::Exited(code) => code,
			Status::Signaled(signal) => 128u8.wrapping_add(signal as i32 as u8),
		}
	}

	pub fn success(&self) -> bool {
		*self == Status::Exited(0)
	}

	/// Turns a signal death into a `Runtime` error for reporting.
	pub fn check(self, name: &str) -> ShellResult<u8> {
		match self {
			Status::Exited(code) => Ok(code),
			Status::Signaled(signal) => Err(ShellError::Runtime { name: name.to_string(), signal: signal }),
		}
	}
}

/// Descriptors to put on a child's standard streams. `None` inherits the
/// shell's own. The parent's copies close when this is dropped.
#[derive(Debug, Default)]
pub struct Bindings {
	pub input: Option<OwnedFd>,
	pub output: Option<OwnedFd>,
	pub error: Option<OwnedFd>,
}

pub enum Launched {
	Finished(Status),
	Running(Pid),
}

/// Single-process launcher: spawn `path` with `argv`, then either wait for
/// it or hand back its pid.
pub fn launch(path: &Path, argv: &[String], bindings: Bindings, background: bool) -> ShellResult<Launched> {
	let pid = spawn(path, argv, &bindings)?;
	drop(bindings);
	if background {
		Ok(Launched::Running(pid))
	} else {
		wait_for(pid).map(Launched::Finished)
	}
}

pub fn spawn(path: &Path, argv: &[String], bindings: &Bindings) -> ShellResult<Pid> {
	let c_path = CString::new(path.as_os_str().as_bytes())?;
	let c_argv: Result<Vec<CString>, _> = argv.iter().map(|a| CString::new(a.as_str())).collect();
	let c_argv = c_argv?;
	let envp: Result<Vec<CString>, _> = env::vars_os().map(|(mut k, v)| CString::new({ k.push(OsString::from("=")); k.push(v); k.into_vec() })).collect();
	let envp = envp?;

	let name = argv.first().map(|s| s.as_str()).unwrap_or("");
	fork_child(name, bindings, || {
		let err = match unistd::execve(&c_path, &c_argv, &envp) {
			Ok(never) => match never {},
			Err(e) => e,
		};
		let mut stderr = FdWriter::stderr();
		let _ = stderr.write_all(c_path.as_bytes());
		let _ = stderr.write_all(b": ");
		let _ = stderr.write_all(err.desc().as_bytes());
		let _ = stderr.write_all(b"\n");
		127
	})
}

/// Forks, binds the standard streams in the child and runs `child` there.
/// The child never returns from this call; it exits with the code `child`
/// produced.
pub fn fork_child<F>(name: &str, bindings: &Bindings, child: F) -> ShellResult<Pid>
	where F: FnOnce() -> u8
{
	match unsafe { unistd::fork() } {
		Ok(ForkResult::Parent { child: pid }) => {
			debug!("spawned {} as pid {}", name, pid);
			Ok(pid)
		},
		Ok(ForkResult::Child) => {
			let code = match bind_stdio(bindings) {
				Ok(()) => child(),
				Err(e) => {
					let mut stderr = FdWriter::stderr();
					let _ = stderr.write_all(b"cannot bind standard streams: ");
					let _ = stderr.write_all(e.desc().as_bytes());
					let _ = stderr.write_all(b"\n");
					126
				},
			};
			unsafe { libc::_exit(code as libc::c_int) }
		},
		Err(e) => Err(ShellError::Launch { name: name.to_string(), source: e }),
	}
}

fn bind_stdio(bindings: &Bindings) -> nix::Result<()> {
	let streams = [
		(&bindings.input, libc::STDIN_FILENO),
		(&bindings.output, libc::STDOUT_FILENO),
		(&bindings.error, libc::STDERR_FILENO),
	];
	for (fd, target) in streams {
		if let Some(ref fd) = *fd {
			let fd = fd.as_raw_fd();
			if fd == target {
				// dup2 would be a no-op and leave close-on-exec set.
				fcntl::fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty()))?;
			} else {
				unistd::dup2(fd, target)?;
			}
		}
	}
	Ok(())
}

/// Blocks until `pid` has terminated.
pub fn wait_for(pid: Pid) -> ShellResult<Status> {
	loop {
		match wait::waitpid(pid, None) {
			Ok(WaitStatus::Exited(_, code)) => {
				trace!("pid {} exited with {}", pid, code);
				return Ok(Status::Exited(code as u8));
			},
			Ok(WaitStatus::Signaled(_, signal, _)) => {
				trace!("pid {} killed by {}", pid, signal);
				return Ok(Status::Signaled(signal));
			},
			Ok(_) => continue,
			Err(Errno::EINTR) => continue,
			Err(e) => return Err(ShellError::Wait { pid: pid.as_raw(), source: e }),
		}
	}
}
