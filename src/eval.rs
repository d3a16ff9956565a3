use std::os::unix::io::OwnedFd;
use std::path::PathBuf;

use log::{debug, trace, warn};
use nix::fcntl::OFlag;
use nix::unistd::{self, Pid};

use crate::builtin::{self, Builtin, Flow, Streams};
use crate::error::ShellResult;
use crate::expand;
use crate::global;
use crate::job::JobId;
use crate::launch::{self, Bindings, Launched, Status};
use crate::redirect::{FdWriter, SavedStdio, StageIo};
use crate::types::{Pipeline, Stage};

#[derive(Debug)]
pub enum EvalResult {
	Done(Status),
	Running(JobId),
	Exit(u8),
}

enum Program {
	Builtin(Builtin),
	External(PathBuf),
}

/// Both ends of one pipe between adjacent stages. An end is taken out
/// when it is handed to its stage.
struct PipeEnds {
	read: Option<OwnedFd>,
	write: Option<OwnedFd>,
}

fn run_builtin(state: &mut global::State, builtin: Builtin, stage: &Stage) -> Flow {
	let mut out = FdWriter::stdout();
	let mut err = FdWriter::stderr();
	let mut streams = Streams { out: &mut out, err: &mut err };
	builtin.run(state, stage.arguments(), &mut streams)
}

/// Lone builtin: runs here, with the stage's redirection applied to the
/// shell's own streams for the duration of the call.
fn eval_builtin(state: &mut global::State, builtin: Builtin, stage: &Stage) -> ShellResult<EvalResult> {
	let io = StageIo::open(&stage.redirection)?;
	let flow = {
		let _saved = SavedStdio::redirect(&io)?;
		run_builtin(state, builtin, stage)
	};
	debug!("builtin {} returned {:?}", builtin.name(), flow);
	Ok(match flow {
		Flow::Continue(code) => EvalResult::Done(Status::Exited(code)),
		Flow::Exit(code) => EvalResult::Exit(code),
	})
}

fn register_job(state: &mut global::State, pid: Pid, text: &str) -> ShellResult<JobId> {
	let id = state.job_table.next_id();
	if let Err(e) = state.job_table.register(id, pid, text) {
		state.job_table.adopt(pid);
		return Err(e);
	}
	Ok(id)
}

fn eval_command(state: &mut global::State, pipeline: &Pipeline, stage: &Stage) -> ShellResult<EvalResult> {
	if let Some(builtin) = builtin::match_builtin(stage.name()) {
		return eval_builtin(state, builtin, stage);
	}
	let path = state.search_path.resolve(stage.name())?;
	let io = StageIo::open(&stage.redirection)?;
	let bindings = Bindings { input: io.input, output: io.output, error: None };
	let launched = launch::launch(&path, &stage.argv, bindings, pipeline.is_background)?;
	state.last_launch.processes = 1;
	match launched {
		Launched::Finished(status) => Ok(EvalResult::Done(status)),
		Launched::Running(pid) => register_job(state, pid, &pipeline.text).map(EvalResult::Running),
	}
}

/// Launches stage `i`, handing it its pipe ends. The parent's copies of
/// those ends are closed before this returns, whether or not the launch
/// worked.
fn spawn_stage(state: &mut global::State, stage: &Stage, i: usize, pipes: &mut Vec<PipeEnds>) -> ShellResult<Pid> {
	let pipe_in = if i > 0 { pipes[i - 1].read.take() } else { None };
	let pipe_out = if i < pipes.len() { pipes[i].write.take() } else { None };

	let program = match builtin::match_builtin(stage.name()) {
		Some(builtin) => Program::Builtin(builtin),
		None => Program::External(state.search_path.resolve(stage.name())?),
	};
	let (first, last) = (i == 0, i == pipes.len());
	if (!first && stage.redirection.input.is_some()) || (!last && stage.redirection.output().is_some()) {
		warn!("stage {} ('{}'): redirection on a piped stream ignored", i, stage.name());
	}
	let io = StageIo::open_ends(&stage.redirection, first, last)?;
	let bindings = Bindings {
		input: if first { io.input } else { pipe_in },
		output: if last { io.output } else { pipe_out },
		error: None,
	};

	let pid = match program {
		Program::Builtin(builtin) => launch::fork_child(stage.name(), &bindings, || {
			pipes.clear();
			match run_builtin(state, builtin, stage) {
				Flow::Continue(code) | Flow::Exit(code) => code,
			}
		})?,
		Program::External(path) => launch::spawn(&path, &stage.argv, &bindings)?,
	};
	drop(bindings);
	Ok(pid)
}

fn eval_pipeline(state: &mut global::State, pipeline: &Pipeline, stages: &[Stage]) -> ShellResult<EvalResult> {
	let mut pipes: Vec<PipeEnds> = Vec::with_capacity(stages.len() - 1);
	for _ in 1..stages.len() {
		let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC)?;
		pipes.push(PipeEnds { read: Some(read), write: Some(write) });
	}
	state.last_launch.pipes = pipes.len();
	debug!("created {} pipes for {} stages", pipes.len(), stages.len());

	let mut pids: Vec<Pid> = Vec::with_capacity(stages.len());
	for (i, stage) in stages.iter().enumerate() {
		match spawn_stage(state, stage, i, &mut pipes) {
			Ok(pid) => pids.push(pid),
			Err(e) => {
				drop(pipes);
				debug!("stage {} failed to launch, leaving {} running stages to the reaper", i, pids.len());
				for pid in pids {
					state.job_table.adopt(pid);
				}
				return Err(e);
			},
		}
		trace!("stage {} launched, pipe ends handed off", i);
	}
	state.last_launch.processes = pids.len();

	if pipeline.is_background {
		let last = pids.pop();
		for pid in pids {
			state.job_table.adopt(pid);
		}
		return match last {
			Some(pid) => register_job(state, pid, &pipeline.text).map(EvalResult::Running),
			None => Ok(EvalResult::Done(Status::Exited(0))),
		};
	}

	let mut status = Status::Exited(0);
	let mut failure = None;
	for pid in pids {
		match launch::wait_for(pid) {
			Ok(s) => status = s,
			Err(e) => if failure.is_none() {
				failure = Some(e);
			},
		}
	}
	match failure {
		Some(e) => Err(e),
		None => Ok(EvalResult::Done(status)),
	}
}

pub fn eval(state: &mut global::State, pipeline: &Pipeline) -> ShellResult<EvalResult> {
	state.last_launch = global::LaunchStats::default();
	let stages: Vec<Stage> = {
		let home = state.config.home.as_ref().map(|h| h.as_path());
		pipeline.stages.iter().map(|s| expand::expand_stage(s, home)).collect()
	};
	let result = if stages.len() == 1 {
		eval_command(state, pipeline, &stages[0])
	} else {
		eval_pipeline(state, pipeline, &stages)
	};
	debug!("'{}': {} pipes, {} processes", pipeline.text, state.last_launch.pipes, state.last_launch.processes);
	result
}
