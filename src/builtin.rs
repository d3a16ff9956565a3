use std::env;
use std::io::Write;
use std::path::PathBuf;

use crate::global;

/// Commands the shell runs itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin { Cd, Pwd, Exit, Jobs }

/// What the caller should do after a builtin ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
	Continue(u8),
	/// `exit` was called; the caller drains background jobs and ends.
	Exit(u8),
}

pub struct Streams<'a> {
	pub out: &'a mut dyn Write,
	pub err: &'a mut dyn Write,
}

type Handler = fn(&mut global::State, &[String], &mut Streams) -> Flow;

static BUILTINS: [(&str, Builtin, Handler); 4] = [
	("cd", Builtin::Cd, builtin_cd),
	("pwd", Builtin::Pwd, builtin_pwd),
	("exit", Builtin::Exit, builtin_exit),
	("jobs", Builtin::Jobs, builtin_jobs),
];

pub fn match_builtin(name: &str) -> Option<Builtin> {
	BUILTINS.iter().find(|&&(n, _, _)| n == name).map(|&(_, b, _)| b)
}

impl Builtin {
	fn entry(self) -> &'static (&'static str, Builtin, Handler) {
		// Every variant has exactly one row.
		&BUILTINS[self as usize]
	}

	pub fn name(self) -> &'static str {
		self.entry().0
	}

	pub fn run(self, state: &mut global::State, arguments: &[String], streams: &mut Streams) -> Flow {
		(self.entry().2)(state, arguments, streams)
	}
}

pub fn builtin_cd(state: &mut global::State, arguments: &[String], streams: &mut Streams) -> Flow {
	let target = match arguments.first() {
		Some(dir) => PathBuf::from(dir),
		None => match state.config.home {
			Some(ref home) => home.clone(),
			None => {
				let _ = writeln!(streams.err, "cd: HOME not set");
				return Flow::Continue(1);
			},
		},
	};
	match env::set_current_dir(&target) {
		Ok(()) => Flow::Continue(0),
		Err(e) => {
			let _ = writeln!(streams.err, "cd: {}: {}", target.display(), e);
			Flow::Continue(1)
		},
	}
}

pub fn builtin_pwd(_: &mut global::State, _: &[String], streams: &mut Streams) -> Flow {
	let written = env::current_dir().and_then(|dir| writeln!(streams.out, "{}", dir.display()));
	match written {
		Ok(()) => Flow::Continue(0),
		Err(e) => {
			let _ = writeln!(streams.err, "pwd: {}", e);
			Flow::Continue(1)
		},
	}
}

pub fn builtin_exit(_: &mut global::State, arguments: &[String], streams: &mut Streams) -> Flow {
	match arguments.first() {
		None => Flow::Exit(0),
		Some(arg) => match arg.trim().parse::<i64>() {
			Ok(code) => Flow::Exit((code & 0xff) as u8),
			Err(_) => {
				let _ = writeln!(streams.err, "exit: {}: numeric argument required", arg);
				Flow::Exit(2)
			},
		},
	}
}

pub fn builtin_jobs(state: &mut global::State, _: &[String], streams: &mut Streams) -> Flow {
	match state.job_table.print_active(streams.out) {
		Ok(()) => Flow::Continue(0),
		Err(e) => {
			let _ = writeln!(streams.err, "jobs: {}", e);
			Flow::Continue(1)
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::global::{Config, State};
	use crate::job::JobTable;
	use crate::job::tests::SharedBuf;

	fn state() -> State {
		State::with_job_table(Config::default(), JobTable::with_sink(4, 255, Box::new(SharedBuf::default())))
	}

	fn run(state: &mut State, name: &str, args: &[&str]) -> (Flow, String, String) {
		let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
		let mut out: Vec<u8> = vec![];
		let mut err: Vec<u8> = vec![];
		let flow = {
			let mut streams = Streams { out: &mut out, err: &mut err };
			match_builtin(name).unwrap().run(state, &args, &mut streams)
		};
		(flow, String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
	}

	#[test]
	fn lookup_covers_exactly_the_builtins() {
		for &(name, builtin, _) in BUILTINS.iter() {
			assert_eq!(match_builtin(name), Some(builtin));
			assert_eq!(builtin.name(), name);
		}
		assert_eq!(match_builtin("ls"), None);
		assert_eq!(match_builtin("CD"), None);
		assert_eq!(match_builtin("rehash"), None);
	}

	#[test]
	fn exit_codes() {
		let mut state = state();
		assert_eq!(run(&mut state, "exit", &[]).0, Flow::Exit(0));
		assert_eq!(run(&mut state, "exit", &["3"]).0, Flow::Exit(3));
		assert_eq!(run(&mut state, "exit", &["256"]).0, Flow::Exit(0));
		assert_eq!(run(&mut state, "exit", &["-1"]).0, Flow::Exit(255));
		let (flow, _, err) = run(&mut state, "exit", &["soon"]);
		assert_eq!(flow, Flow::Exit(2));
		assert!(err.contains("numeric argument required"));
	}

	#[test]
	fn cd_to_missing_directory_fails_without_moving() {
		let _lock = crate::test::CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
		let before = env::current_dir().unwrap();
		let mut state = state();
		let (flow, _, err) = run(&mut state, "cd", &["/nonexistent/directory/for/cd"]);
		assert_eq!(flow, Flow::Continue(1));
		assert!(err.starts_with("cd: /nonexistent/directory/for/cd: "));
		assert_eq!(env::current_dir().unwrap(), before);
	}

	#[test]
	fn cd_without_home() {
		let mut state = state();
		state.config.home = None;
		let (flow, _, err) = run(&mut state, "cd", &[]);
		assert_eq!(flow, Flow::Continue(1));
		assert_eq!(err, "cd: HOME not set\n");
	}

	#[test]
	fn pwd_prints_current_directory() {
		let _lock = crate::test::CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
		let mut state = state();
		let (flow, out, _) = run(&mut state, "pwd", &[]);
		assert_eq!(flow, Flow::Continue(0));
		assert_eq!(out, format!("{}\n", env::current_dir().unwrap().display()));
	}

	#[test]
	fn jobs_with_nothing_running() {
		let mut state = state();
		let (flow, out, _) = run(&mut state, "jobs", &[]);
		assert_eq!(flow, Flow::Continue(0));
		assert_eq!(out, "no active background processes\n");
	}
}
