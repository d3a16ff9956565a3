use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::job;
use crate::search;

pub const MAX_JOBS: usize = 32;
pub const MAX_COMMAND_TEXT: usize = 255;
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct Config {
	pub path: OsString,
	pub home: Option<PathBuf>,
	pub job_capacity: usize,
	pub command_limit: usize,
	pub poll_interval: Duration,
}

impl Default for Config {
	fn default() -> Config {
		Config {
			path: OsString::new(),
			home: None,
			job_capacity: MAX_JOBS,
			command_limit: MAX_COMMAND_TEXT,
			poll_interval: POLL_INTERVAL,
		}
	}
}

impl Config {
	pub fn from_env() -> Config {
		Config {
			path: env::var_os(search::PATH_KEY).unwrap_or_default(),
			home: env::var_os("HOME").map(PathBuf::from),
			..Config::default()
		}
	}
}

/// Tallies for the most recently evaluated pipeline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LaunchStats {
	pub pipes: usize,
	pub processes: usize,
}

pub struct State {
	pub config: Config,
	pub search_path: search::SearchPath,
	pub job_table: job::JobTable,
	pub last_launch: LaunchStats,
}

impl State {
	pub fn new(config: Config) -> State {
		let job_table = job::JobTable::new(config.job_capacity, config.command_limit);
		State::with_job_table(config, job_table)
	}

	pub fn with_job_table(config: Config, job_table: job::JobTable) -> State {
		let search_path = search::SearchPath::new(&config.path);
		State { config: config, search_path: search_path, job_table: job_table, last_launch: LaunchStats::default() }
	}

	/// Blocks until every background job is done. Called before the shell
	/// goes away.
	pub fn shutdown(&mut self) {
		let interval = self.config.poll_interval;
		self.job_table.wait_all(interval);
	}
}
