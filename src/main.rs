use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use log::{debug, info};
use nix::unistd;

use pipesh::eval::{self, EvalResult};
use pipesh::global::{Config, State};
use pipesh::parser;

fn prompt() -> String {
	let user = env::var("USER").ok().filter(|u| !u.is_empty()).unwrap_or_else(|| "user".to_string());
	let host = unistd::gethostname().ok()
		.map(|h| h.to_string_lossy().into_owned())
		.filter(|h| !h.is_empty())
		.or_else(|| env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
		.unwrap_or_else(|| "machine".to_string());
	let cwd = env::current_dir()
		.map(|d| d.display().to_string())
		.unwrap_or_else(|_| "/".to_string());
	format!("{}@{}:{}> ", user, host, cwd)
}

fn run_line(state: &mut State, line: &str) -> Option<u8> {
	let pipeline = match parser::parse(line) {
		Ok(pipeline) => pipeline,
		Err(e) => {
			eprintln!("pipesh: {}", e);
			return None;
		},
	};
	debug!("parsed {:?}", pipeline);
	match eval::eval(state, &pipeline) {
		Ok(EvalResult::Done(status)) => {
			if !status.success() {
				debug!("'{}' finished with status {}", pipeline.text, status.code());
			}
			if let Some(last) = pipeline.stages.last() {
				if let Err(e) = status.check(last.name()) {
					eprintln!("pipesh: {}", e);
				}
			}
			None
		},
		Ok(EvalResult::Running(id)) => {
			debug!("job {} running", id);
			None
		},
		Ok(EvalResult::Exit(code)) => Some(code),
		Err(e) => {
			eprintln!("pipesh: {}", e);
			None
		},
	}
}

fn main() {
	env_logger::init();
	let mut state = State::new(Config::from_env());
	info!("starting with job capacity {}", state.config.job_capacity);

	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut stdin_locked = stdin.lock();
	loop {
		let _ = stdout.write_all(prompt().as_bytes());
		let _ = stdout.flush();
		let mut line = String::new();
		match stdin_locked.read_line(&mut line) {
			Ok(0) | Err(_) => {
				println!();
				state.shutdown();
				process::exit(0);
			},
			Ok(_) => {},
		}
		if !line.trim().is_empty() {
			if let Some(code) = run_line(&mut state, &line) {
				state.shutdown();
				process::exit(code as i32);
			}
		}
		state.job_table.reap_nonblocking();
	}
}
