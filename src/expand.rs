use std::env;
use std::path::{Path, PathBuf};

use crate::types::{Redirection, Stage};

/// Expands `~`, `~/...` and whole-word `$NAME`. Anything else is returned
/// unchanged.
pub fn expand_word<F>(word: &str, home: Option<&Path>, lookup: F) -> String
	where F: Fn(&str) -> Option<String>
{
	if word == "~" || word.starts_with("~/") {
		let home = home.map(|h| h.to_string_lossy().into_owned()).unwrap_or_default();
		return format!("{}{}", home, &word[1..]);
	}
	if let Some(name) = word.strip_prefix('$') {
		let is_name = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
		if is_name {
			return lookup(name).unwrap_or_default();
		}
	}
	word.to_string()
}

pub fn expand_stage(stage: &Stage, home: Option<&Path>) -> Stage {
	let expand = |w: &str| expand_word(w, home, |name| env::var(name).ok());
	let expand_path = |p: &Option<PathBuf>| -> Option<PathBuf> {
		p.as_ref().map(|p| PathBuf::from(expand(&p.to_string_lossy())))
	};
	Stage {
		argv: stage.argv.iter().map(|w| expand(w)).collect(),
		redirection: Redirection {
			input: expand_path(&stage.redirection.input),
			output_truncate: expand_path(&stage.redirection.output_truncate),
			output_append: expand_path(&stage.redirection.output_append),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn vars(name: &str) -> Option<String> {
		match name {
			"USER" => Some("alice".to_string()),
			_ => None,
		}
	}

	#[test]
	fn tilde_becomes_home() {
		let home = Path::new("/home/alice");
		assert_eq!(expand_word("~", Some(home), vars), "/home/alice");
		assert_eq!(expand_word("~/src", Some(home), vars), "/home/alice/src");
		assert_eq!(expand_word("~bob", Some(home), vars), "~bob");
		assert_eq!(expand_word("a~", Some(home), vars), "a~");
	}

	#[test]
	fn variables_expand_whole_words() {
		assert_eq!(expand_word("$USER", None, vars), "alice");
		assert_eq!(expand_word("$MISSING", None, vars), "");
		assert_eq!(expand_word("$", None, vars), "$");
		assert_eq!(expand_word("x$USER", None, vars), "x$USER");
		assert_eq!(expand_word("$USER/x", None, vars), "$USER/x");
	}

	#[test]
	fn stage_paths_are_expanded() {
		let stage = Stage {
			argv: vec!["cat".to_string(), "~/a".to_string()],
			redirection: Redirection { input: Some("~/in".into()), ..Redirection::default() },
		};
		let expanded = expand_stage(&stage, Some(Path::new("/h")));
		assert_eq!(expanded.argv, vec!["cat", "/h/a"]);
		assert_eq!(expanded.redirection.input, Some("/h/in".into()));
		assert!(expanded.redirection.output().is_none());
	}
}
