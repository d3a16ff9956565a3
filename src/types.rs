use std::path::{Path, PathBuf};

use crate::error::{ShellError, ShellResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectType { Input, Output, Append }

impl RedirectType {
	pub fn operator(self) -> &'static str {
		match self {
			RedirectType::Input => "<",
			RedirectType::Output => ">",
			RedirectType::Append => ">>",
		}
	}
}

/// File rebinding of a stage's standard input and output.
///
/// Each slot is written at most once, and only one of the two output slots
/// may ever be set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Redirection {
	pub input: Option<PathBuf>,
	pub output_truncate: Option<PathBuf>,
	pub output_append: Option<PathBuf>,
}

impl Redirection {
	pub fn set(&mut self, typ: RedirectType, target: PathBuf) -> ShellResult<()> {
		let conflict = match typ {
			RedirectType::Input => self.input.is_some(),
			RedirectType::Output | RedirectType::Append =>
				self.output_truncate.is_some() || self.output_append.is_some(),
		};
		if conflict {
			return Err(ShellError::syntax(format!("redirection '{}' conflicts with an earlier one", typ.operator())));
		}
		let slot = match typ {
			RedirectType::Input => &mut self.input,
			RedirectType::Output => &mut self.output_truncate,
			RedirectType::Append => &mut self.output_append,
		};
		*slot = Some(target);
		Ok(())
	}

	/// The output target together with how it is opened.
	pub fn output(&self) -> Option<(&Path, RedirectType)> {
		match (&self.output_truncate, &self.output_append) {
			(Some(p), _) => Some((p, RedirectType::Output)),
			(None, Some(p)) => Some((p, RedirectType::Append)),
			(None, None) => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
	pub argv: Vec<String>,
	pub redirection: Redirection,
}

impl Stage {
	pub fn name(&self) -> &str {
		&self.argv[0]
	}

	pub fn arguments(&self) -> &[String] {
		&self.argv[1..]
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
	pub stages: Vec<Stage>,
	pub is_background: bool,
	/// The line this pipeline was parsed from, trimmed.
	pub text: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn redirection_slots_are_set_once() {
		let mut r = Redirection::default();
		r.set(RedirectType::Input, "a".into()).unwrap();
		assert!(r.set(RedirectType::Input, "b".into()).is_err());
		assert_eq!(r.input, Some(PathBuf::from("a")));
	}

	#[test]
	fn truncate_and_append_conflict() {
		let mut r = Redirection::default();
		r.set(RedirectType::Append, "log".into()).unwrap();
		assert!(r.set(RedirectType::Output, "log".into()).is_err());
		assert_eq!(r.output(), Some((Path::new("log"), RedirectType::Append)));
		assert!(r.output_truncate.is_none());
	}
}
