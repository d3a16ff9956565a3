use std::iter::Peekable;
use std::str::Chars;

use crate::error::LexError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
	Word(String),
	Less,
	Greater,
	DoubleGreater,
	Pipe,
	Ampersand,
	End,
	Error(LexError),
}

impl Token {
	pub(crate) fn is_terminal(&self) -> bool {
		match *self {
			Token::End | Token::Error(_) => true,
			_ => false,
		}
	}
}

/// Splits a line into tokens on demand.
///
/// The sequence always finishes with exactly one `End` or `Error` token;
/// the iterator yields nothing after that.
pub struct Lexer<'a> {
	chars: Peekable<Chars<'a>>,
	finished: bool,
}

impl<'a> Lexer<'a> {
	pub fn new(line: &'a str) -> Lexer<'a> {
		Lexer { chars: line.chars().peekable(), finished: false }
	}

	fn is_whitespace(c: char) -> bool {
		c.is_whitespace()
	}

	fn is_operator(c: char) -> bool {
		match c {
			'<' | '>' | '|' | '&' => true,
			_ => false,
		}
	}

	fn is_letter(c: char) -> bool {
		!Lexer::is_whitespace(c) && !Lexer::is_operator(c)
	}

	fn skip_whitespaces(&mut self) {
		while let Some(&c) = self.chars.peek() {
			if !Lexer::is_whitespace(c) { break; }
			self.chars.next();
		}
	}

	fn read_quoted(&mut self, quote: char, word: &mut String) -> Result<(), LexError> {
		loop {
			match self.chars.next() {
				None => return Err(LexError::UnterminatedQuote(quote)),
				// Only the quote and the backslash itself are escapable
				// inside quotes; anything else keeps its backslash.
				Some('\\') => match self.chars.next() {
					Some(c) if c == quote || c == '\\' => word.push(c),
					Some(c) => { word.push('\\'); word.push(c); },
					None => return Err(LexError::UnterminatedQuote(quote)),
				},
				Some(c) if c == quote => return Ok(()),
				Some(c) => word.push(c),
			}
		}
	}

	fn read_word(&mut self) -> Result<String, LexError> {
		let mut word = String::new();
		while let Some(&c) = self.chars.peek() {
			if !Lexer::is_letter(c) { break; }
			self.chars.next();
			match c {
				'\\' => match self.chars.next() {
					Some(escaped) => word.push(escaped),
					None => return Err(LexError::DanglingEscape),
				},
				'\'' | '"' => self.read_quoted(c, &mut word)?,
				_ => word.push(c),
			}
		}
		Ok(word)
	}

	pub fn next_token(&mut self) -> Token {
		self.skip_whitespaces();
		let c = match self.chars.peek() {
			None => return Token::End,
			Some(&c) => c,
		};
		match c {
			'<' => { self.chars.next(); Token::Less },
			'>' => {
				self.chars.next();
				if self.chars.peek() == Some(&'>') {
					self.chars.next();
					Token::DoubleGreater
				} else {
					Token::Greater
				}
			},
			'|' => { self.chars.next(); Token::Pipe },
			'&' => { self.chars.next(); Token::Ampersand },
			_ => match self.read_word() {
				Ok(word) => Token::Word(word),
				Err(e) => Token::Error(e),
			},
		}
	}
}

impl<'a> Iterator for Lexer<'a> {
	type Item = Token;

	fn next(&mut self) -> Option<Token> {
		if self.finished {
			return None;
		}
		let token = self.next_token();
		self.finished = token.is_terminal();
		Some(token)
	}
}

pub fn tokenize(line: &str) -> Vec<Token> {
	Lexer::new(line).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use super::Token::*;

	fn word(s: &str) -> Token {
		Word(s.to_string())
	}

	#[test]
	fn operators_split_words() {
		assert_eq!(tokenize("cat<in|wc -l>>out&"), vec![
			word("cat"), Less, word("in"), Pipe, word("wc"), word("-l"),
			DoubleGreater, word("out"), Ampersand, End,
		]);
	}

	#[test]
	fn greater_followed_by_space_and_greater() {
		assert_eq!(tokenize("a > > b"), vec![word("a"), Greater, Greater, word("b"), End]);
	}

	#[test]
	fn quotes_join_adjacent_text() {
		assert_eq!(tokenize(r#"printf "%s\n" a"b c"'d|e'"#), vec![
			word("printf"), word(r"%s\n"), word("ab cd|e"), End,
		]);
	}

	#[test]
	fn backslash_escapes_quote_inside_quotes() {
		assert_eq!(tokenize(r#"echo "a\"b" 'c\\d'"#), vec![word("echo"), word("a\"b"), word(r"c\d"), End]);
	}

	#[test]
	fn empty_quotes_make_an_empty_word() {
		assert_eq!(tokenize("echo '' x"), vec![word("echo"), word(""), word("x"), End]);
	}

	#[test]
	fn backslash_escapes_operators_and_spaces() {
		assert_eq!(tokenize(r"a\|b c\ d \>"), vec![word("a|b"), word("c d"), word(">"), End]);
	}

	#[test]
	fn unterminated_quote_is_an_error() {
		assert_eq!(tokenize("echo 'abc"), vec![word("echo"), Error(LexError::UnterminatedQuote('\''))]);
		assert_eq!(tokenize("echo \"abc\\"), vec![word("echo"), Error(LexError::UnterminatedQuote('"'))]);
	}

	#[test]
	fn trailing_backslash_is_an_error() {
		assert_eq!(tokenize("ls \\"), vec![word("ls"), Error(LexError::DanglingEscape)]);
	}

	#[test]
	fn blank_line_is_just_end() {
		assert_eq!(tokenize(" \t\n"), vec![End]);
	}

	#[test]
	fn iteration_stops_after_end() {
		let mut lexer = Lexer::new("x");
		assert_eq!(lexer.next(), Some(word("x")));
		assert_eq!(lexer.next(), Some(End));
		assert_eq!(lexer.next(), None);
	}
}
