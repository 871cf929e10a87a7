// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{fmt, io};

use crate::data::Pos;

/// A directive line that does not match the directive grammar.
///
/// `column` is the 1-based character column at which no further token could
/// be matched. `line` is the complete directive line as it was handed to the
/// tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot parse directive at column {column}: {line}")]
pub struct ParseError {
	pub column: usize,
	pub line: String,
}

/// Failure to run a registered driver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
	#[error("driver {0:?} not found")]
	NotFound(String),

	#[error("function does not take and return one value")]
	Signature,

	#[error("{0}")]
	Populate(String),

	#[error("{0}")]
	Panic(String),
}

/// The texts of a record whose actual output differs from the recorded one.
#[derive(Debug)]
pub struct Mismatch {
	pub input: String,
	pub expected: String,
	pub actual: String,
}

impl fmt::Display for Mismatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}\nexpected:\n{}\nfound:\n{}", self.input, self.expected, self.actual)
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{pos}: {error}")]
	Parse {
		pos: Pos,
		error: ParseError,
	},

	#[error("{pos}: argument {key:?} not found")]
	MissingArg {
		pos: Pos,
		key: String,
	},

	#[error("{pos}: argument {key:?}: cannot scan {value:?}: {message}")]
	Scan {
		pos: Pos,
		key: String,
		value: String,
		message: String,
	},

	#[error("{pos}: argument {key:?}: got {expected} destinations, but {found} values")]
	Arity {
		pos: Pos,
		key: String,
		expected: usize,
		found: usize,
	},

	#[error("{pos}: {message}")]
	Handler {
		pos: Pos,
		message: String,
	},

	#[error("\n{pos}: {mismatch}\n{diff}")]
	Mismatch {
		pos: Pos,
		mismatch: Mismatch,
		diff: String,
	},

	#[error("{pos}: output cannot be written back: it ends in or contains two consecutive {separator:?} lines")]
	Unrepresentable {
		pos: Pos,
		separator: &'static str,
	},

	#[error("{pos}: {error}")]
	Read {
		pos: Pos,
		#[source]
		error: io::Error,
	},

	#[error("{path}: {error}")]
	File {
		path: String,
		#[source]
		error: io::Error,
	},

	#[error("{name}: {message}")]
	Format {
		name: String,
		message: String,
	},

	#[error("{count} test case(s) failed:\n{report}")]
	Failed {
		count: usize,
		report: String,
	},

	#[error(transparent)]
	Io(#[from] io::Error),
}

impl Error {
	/// The position of the record the error belongs to, if any.
	pub fn pos(&self) -> Option<&Pos> {
		match self {
			Error::Parse {
				pos,
				..
			}
			| Error::MissingArg {
				pos,
				..
			}
			| Error::Scan {
				pos,
				..
			}
			| Error::Arity {
				pos,
				..
			}
			| Error::Handler {
				pos,
				..
			}
			| Error::Mismatch {
				pos,
				..
			}
			| Error::Unrepresentable {
				pos,
				..
			}
			| Error::Read {
				pos,
				..
			} => Some(pos),
			Error::Format {
				..
			}
			| Error::Failed {
				..
			}
			| Error::File {
				..
			}
			| Error::Io(_) => None,
		}
	}
}
