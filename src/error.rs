use std::{ffi, io};
use std::path::PathBuf;

use nix::sys::signal::Signal;
use thiserror::Error;

/// Why the tokenizer gave up on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LexError {
	#[error("unterminated {0} quote")]
	UnterminatedQuote(char),
	#[error("backslash at end of line")]
	DanglingEscape,
}

#[derive(Debug, Error)]
pub enum ShellError {
	#[error("lexical error: {0}")]
	Lexical(LexError),

	#[error("syntax error: {0}")]
	Syntax(String),

	#[error("{0}: command not found")]
	Resolution(String),

	#[error("{}: {source}", .path.display())]
	Redirection {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("{name}: failed to launch: {source}")]
	Launch {
		name: String,
		#[source]
		source: nix::Error,
	},

	/// A child was killed instead of exiting.
	#[error("{name}: terminated by signal {}", .signal.as_str())]
	Runtime { name: String, signal: Signal },

	#[error("job table full ({capacity} jobs)")]
	Capacity { capacity: usize },

	#[error("wait for pid {pid} failed: {source}")]
	Wait {
		pid: i32,
		#[source]
		source: nix::Error,
	},

	#[error(transparent)]
	Io(#[from] io::Error),

	#[error(transparent)]
	Nix(#[from] nix::Error),

	#[error(transparent)]
	Nul(#[from] ffi::NulError),
}

impl ShellError {
	pub fn syntax<S: Into<String>>(msg: S) -> ShellError {
		ShellError::Syntax(msg.into())
	}
}

pub type ShellResult<T> = Result<T, ShellError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lexical_messages() {
		assert_eq!(LexError::UnterminatedQuote('"').to_string(), "unterminated \" quote");
		let err = ShellError::Lexical(LexError::DanglingEscape);
		assert_eq!(err.to_string(), "lexical error: backslash at end of line");
	}
}
