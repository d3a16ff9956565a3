use std::mem;

use crate::error::{ShellError, ShellResult};
use crate::lexer::{Lexer, Token};
use crate::types::*;

struct Parser<'a> {
	lexer: Lexer<'a>,
	lookahead: Token,
}

impl<'a> Parser<'a> {
	fn new(line: &'a str) -> Parser<'a> {
		let mut lexer = Lexer::new(line);
		let lookahead = lexer.next_token();
		Parser { lexer: lexer, lookahead: lookahead }
	}

	fn peek(&self) -> &Token {
		&self.lookahead
	}

	/// Takes the current token and moves on. Nothing is read past `End` or
	/// `Error`; those stay in the lookahead slot.
	fn advance(&mut self) -> Token {
		if self.lookahead.is_terminal() {
			return self.lookahead.clone();
		}
		let next = self.lexer.next_token();
		mem::replace(&mut self.lookahead, next)
	}

	fn parse_redirect(&mut self, typ: RedirectType, redirection: &mut Redirection) -> ShellResult<()> {
		match self.advance() {
			Token::Word(target) => redirection.set(typ, target.into()),
			Token::Error(e) => Err(ShellError::Lexical(e)),
			other => Err(ShellError::syntax(format!("expected a path after '{}', found {}", typ.operator(), describe(&other)))),
		}
	}

	fn parse_stage(&mut self) -> ShellResult<Stage> {
		let mut argv: Vec<String> = vec![];
		let mut redirection = Redirection::default();

		loop {
			let typ = match *self.peek() {
				Token::Word(_) => None,
				Token::Less => Some(RedirectType::Input),
				Token::Greater => Some(RedirectType::Output),
				Token::DoubleGreater => Some(RedirectType::Append),
				Token::Pipe | Token::Ampersand | Token::End => { break; },
				Token::Error(e) => { return Err(ShellError::Lexical(e)); },
			};
			let token = self.advance();
			match typ {
				Some(typ) => self.parse_redirect(typ, &mut redirection)?,
				None => if let Token::Word(word) = token {
					argv.push(word);
				},
			}
		}

		if argv.is_empty() {
			return Err(ShellError::syntax(format!("empty command before {}", describe(self.peek()))));
		}
		Ok(Stage { argv: argv, redirection: redirection })
	}

	fn parse_pipeline(&mut self, text: &str) -> ShellResult<Pipeline> {
		let mut stages: Vec<Stage> = vec![];
		let mut is_background = false;

		loop {
			stages.push(self.parse_stage()?);
			match self.advance() {
				Token::Pipe => {},
				Token::Ampersand => {
					is_background = true;
					match *self.peek() {
						Token::End => { break; },
						Token::Error(e) => { return Err(ShellError::Lexical(e)); },
						ref other => { return Err(ShellError::syntax(format!("unexpected {} after '&'", describe(other)))); },
					}
				},
				Token::End => { break; },
				other => { return Err(ShellError::syntax(format!("unexpected {}", describe(&other)))); },
			}
		}
		Ok(Pipeline { stages: stages, is_background: is_background, text: text.to_string() })
	}
}

fn describe(token: &Token) -> String {
	match *token {
		Token::Word(ref w) => format!("word '{}'", w),
		Token::Less => "'<'".to_string(),
		Token::Greater => "'>'".to_string(),
		Token::DoubleGreater => "'>>'".to_string(),
		Token::Pipe => "'|'".to_string(),
		Token::Ampersand => "'&'".to_string(),
		Token::End => "end of line".to_string(),
		Token::Error(e) => e.to_string(),
	}
}

pub fn parse(line: &str) -> ShellResult<Pipeline> {
	let mut parser = Parser::new(line);
	parser.parse_pipeline(line.trim())
}
