use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::error::{ShellError, ShellResult};

pub type JobId = u32;

pub trait WaitStatusExt {
	/// Whether the process is gone for good.
	fn is_terminated(&self) -> bool;
}

impl WaitStatusExt for WaitStatus {
	fn is_terminated(&self) -> bool {
		match *self {
			WaitStatus::Exited(..) | WaitStatus::Signaled(..) => true,
			_ => false,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
	pub id: JobId,
	pub pid: Pid,
	pub command_text: String,
	pub active: bool,
}

/// Registry of background jobs.
///
/// Slots are recycled once a job has been reaped, ids never are. Only the
/// controlling thread touches the table, through `&mut`.
pub struct JobTable {
	slots: Vec<Option<Job>>,
	next_id: JobId,
	command_limit: usize,
	/// Pipeline members that are not jobs themselves but still need reaping.
	stragglers: Vec<Pid>,
	sink: Box<dyn Write>,
}

impl JobTable {
	pub fn new(capacity: usize, command_limit: usize) -> JobTable {
		JobTable::with_sink(capacity, command_limit, Box::new(io::stdout()))
	}

	pub fn with_sink(capacity: usize, command_limit: usize, sink: Box<dyn Write>) -> JobTable {
		JobTable {
			slots: vec![None; capacity],
			next_id: 1,
			command_limit: command_limit,
			stragglers: vec![],
			sink: sink,
		}
	}

	pub fn capacity(&self) -> usize {
		self.slots.len()
	}

	pub fn next_id(&self) -> JobId {
		self.next_id
	}

	pub fn register(&mut self, id: JobId, pid: Pid, command_text: &str) -> ShellResult<()> {
		let capacity = self.capacity();
		let command_text = truncate(command_text, self.command_limit);
		let slot = match self.slots.iter_mut().find(|s| s.as_ref().map_or(true, |job| !job.active)) {
			Some(slot) => slot,
			None => {
				warn!("no free job slot for pid {}", pid);
				return Err(ShellError::Capacity { capacity: capacity });
			},
		};
		*slot = Some(Job { id: id, pid: pid, command_text: command_text.to_string(), active: true });
		if id >= self.next_id {
			self.next_id = id + 1;
		}
		debug!("registered job {} (pid {})", id, pid);
		notify(&mut self.sink, format_args!("[{}] {}", id, pid));
		Ok(())
	}

	/// Hands over a process that must be waited for but is not reported.
	pub fn adopt(&mut self, pid: Pid) {
		self.stragglers.push(pid);
	}

	pub fn reap_nonblocking(&mut self) {
		let sink = &mut self.sink;
		for job in self.slots.iter_mut().filter_map(|s| s.as_mut()).filter(|job| job.active) {
			if has_terminated(job.pid) {
				job.active = false;
				debug!("job {} (pid {}) finished", job.id, job.pid);
				notify(sink, format_args!("[{}] + done {}", job.id, job.command_text));
			}
		}
		self.stragglers.retain(|&pid| !has_terminated(pid));
	}

	/// Polls until every job and straggler is gone.
	pub fn wait_all(&mut self, poll_interval: Duration) {
		loop {
			self.reap_nonblocking();
			if !self.has_active() && self.stragglers.is_empty() {
				return;
			}
			thread::sleep(poll_interval);
		}
	}

	pub fn has_active(&self) -> bool {
		self.active().next().is_some()
	}

	pub fn active(&self) -> impl Iterator<Item = &Job> {
		self.slots.iter().filter_map(|s| s.as_ref()).filter(|job| job.active)
	}

	pub fn print_active(&self, out: &mut dyn Write) -> io::Result<()> {
		let mut any = false;
		for job in self.active() {
			any = true;
			writeln!(out, "[{}]+ {} {}", job.id, job.pid, job.command_text)?;
		}
		if !any {
			writeln!(out, "no active background processes")?;
		}
		out.flush()
	}
}

fn notify(sink: &mut Box<dyn Write>, args: std::fmt::Arguments) {
	let _ = sink.write_fmt(args)
		.and_then(|_| sink.write_all(b"\n"))
		.and_then(|_| sink.flush());
}

fn has_terminated(pid: Pid) -> bool {
	loop {
		match wait::waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
			Ok(status) => return status.is_terminated(),
			Err(Errno::EINTR) => continue,
			// Somebody else already collected it.
			Err(Errno::ECHILD) => return true,
			Err(e) => {
				warn!("waitpid({}) failed: {}", pid, e);
				return false;
			},
		}
	}
}

fn truncate(text: &str, limit: usize) -> &str {
	match text.char_indices().nth(limit) {
		Some((end, _)) => &text[..end],
		None => text,
	}
}
