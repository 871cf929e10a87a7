// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Tokenizer for directive lines.
//!
//! A directive line is a sequence of space separated tokens. The first token
//! names the command, every following token is an argument of one of the
//! forms:
//!
//! ```text
//! key                 # no values
//! key=value           # one value, kept verbatim (also `key=a,b`)
//! key=                # one empty value
//! key=(a, b, c)       # a list of values, split on commas and trimmed
//! ```
//!
//! Keys and the command are made of `[-a-zA-Z0-9_./]`, bare values of
//! alphanumerics and `@=+/.,_-`. Repeated keys are kept in order; lookups
//! resolve to the first occurrence.

use std::fmt;

use crate::error::ParseError;

/// A `key` or `key=value(s)` argument of a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
	pub key: String,
	pub values: Vec<String>,
}

impl Argument {
	pub fn new(key: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self {
			key: key.into(),
			values: values.into_iter().map(Into::into).collect(),
		}
	}
}

impl fmt::Display for Argument {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.values.as_slice() {
			[] => write!(f, "{}", self.key),
			[value] => write!(f, "{}={}", self.key, value),
			values => write!(f, "{}=({})", self.key, values.join(", ")),
		}
	}
}

/// Parses a directive line into its command and arguments.
///
/// A blank line yields an empty command and no arguments.
pub fn parse_line(line: &str) -> Result<(String, Vec<Argument>), ParseError> {
	let mut tokenizer = Tokenizer::new(line);
	let mut tokens = Vec::new();
	while let Some(token) = tokenizer.next_token()? {
		tokens.push(token);
	}

	let mut tokens = tokens.into_iter();
	let Some(command) = tokens.next() else {
		return Ok((String::new(), Vec::new()));
	};

	let args = tokens
		.map(|token| Argument {
			key: token.key.to_string(),
			values: token.values,
		})
		.collect();

	Ok((command.raw.to_string(), args))
}

/// Renders a command and its arguments back into a directive line.
pub fn format_line(command: &str, args: &[Argument]) -> String {
	let mut line = command.to_string();
	for arg in args {
		line.push(' ');
		line.push_str(&arg.to_string());
	}
	line
}

struct Token<'a> {
	raw: &'a str,
	key: &'a str,
	values: Vec<String>,
}

struct Tokenizer<'a> {
	input: &'a str,
	pos: usize,
	column: usize,
}

impl<'a> Tokenizer<'a> {
	fn new(input: &'a str) -> Self {
		Tokenizer {
			input,
			pos: 0,
			column: 0,
		}
	}

	fn current_char(&self) -> Option<char> {
		self.input[self.pos..].chars().next()
	}

	fn advance(&mut self) -> Option<char> {
		let ch = self.current_char()?;
		self.pos += ch.len_utf8();
		self.column += 1;
		Some(ch)
	}

	fn advance_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
		let input = self.input;
		let start = self.pos;
		while let Some(ch) = self.current_char() {
			if !pred(ch) {
				break;
			}
			self.advance();
		}
		&input[start..self.pos]
	}

	fn is_at_end(&self) -> bool {
		self.pos >= self.input.len()
	}

	fn error(&self, column: usize) -> ParseError {
		ParseError {
			column: column + 1,
			line: self.input.to_string(),
		}
	}

	fn next_token(&mut self) -> Result<Option<Token<'a>>, ParseError> {
		let column = self.column;

		self.advance_while(|ch| ch == ' ');
		if self.is_at_end() {
			return Ok(None);
		}

		let start = self.pos;
		let key = self.advance_while(is_ident_char);
		if key.is_empty() {
			return Err(self.error(column));
		}

		let values = match self.current_char() {
			Some('=') => {
				self.advance();
				if self.current_char() == Some('(') {
					self.advance();
					let inner = self.advance_while(|ch| ch != ')');
					if self.advance() != Some(')') {
						return Err(self.error(column));
					}
					inner.split(',').map(|value| value.trim().to_string()).collect()
				} else {
					vec![self.advance_while(is_value_char).to_string()]
				}
			}
			_ => Vec::new(),
		};

		let input = self.input;
		let raw = &input[start..self.pos];
		match self.current_char() {
			None => {}
			Some(' ') => {
				self.advance();
			}
			Some(_) => return Err(self.error(column)),
		}

		Ok(Some(Token {
			raw,
			key,
			values,
		}))
	}
}

fn is_ident_char(ch: char) -> bool {
	ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/')
}

fn is_value_char(ch: char) -> bool {
	ch.is_ascii_alphanumeric() || matches!(ch, '@' | '=' | '+' | '/' | '.' | ',' | '_' | '-')
}
