// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{fmt, str::FromStr};

use crate::{
	Result,
	directive::{Argument, format_line},
	error::Error,
};

/// Location of a directive: the source it was read from and its line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pos {
	pub source: String,
	pub line: usize,
}

impl Pos {
	pub fn new(source: impl Into<String>, line: usize) -> Self {
		Self {
			source: source.into(),
			line,
		}
	}
}

impl fmt::Display for Pos {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.source, self.line)
	}
}

/// How the expected output of a record was written down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
	/// No `----` separator followed the input.
	Missing,
	/// A single separator, terminated by a blank line or the end of the
	/// stream. `blank` is set when a terminating blank line was consumed.
	Single {
		blank: bool,
	},
	/// Two separators, terminated by two consecutive separator lines.
	Double,
}

/// One record of a test file: a directive, its input and the recorded
/// expected output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestData {
	pub pos: Pos,
	pub cmd: String,
	pub args: Vec<Argument>,
	pub input: String,
	pub expected: String,
	pub(crate) section: Section,
}

impl TestData {
	/// The way the expected output of this record is laid out in its file.
	pub fn section(&self) -> Section {
		self.section
	}

	/// The directive line of this record, normalized.
	pub fn directive(&self) -> String {
		format_line(&self.cmd, &self.args)
	}

	/// Returns the first argument with the given key.
	pub fn arg(&self, key: &str) -> Option<&Argument> {
		self.args.iter().find(|arg| arg.key == key)
	}

	pub fn has_arg(&self, key: &str) -> bool {
		self.arg(key).is_some()
	}

	/// Scans the first value of the argument `key`.
	pub fn scan_arg<T>(&self, key: &str) -> Result<T>
	where
		T: FromStr,
		T::Err: fmt::Display,
	{
		self.maybe_scan_arg(key)?.ok_or_else(|| self.missing(key))
	}

	/// Like [`scan_arg`](Self::scan_arg), but returns `None` if the argument
	/// is absent.
	pub fn maybe_scan_arg<T>(&self, key: &str) -> Result<Option<T>>
	where
		T: FromStr,
		T::Err: fmt::Display,
	{
		let Some(arg) = self.arg(key) else {
			return Ok(None);
		};
		let Some(value) = arg.values.first() else {
			return Err(Error::Arity {
				pos: self.pos.clone(),
				key: key.to_string(),
				expected: 1,
				found: 0,
			});
		};
		self.scan_value(key, value).map(Some)
	}

	/// Scans all values of the argument `key`.
	pub fn scan_args<T>(&self, key: &str) -> Result<Vec<T>>
	where
		T: FromStr,
		T::Err: fmt::Display,
	{
		self.maybe_scan_args(key)?.ok_or_else(|| self.missing(key))
	}

	/// Like [`scan_args`](Self::scan_args), but returns `None` if the
	/// argument is absent.
	pub fn maybe_scan_args<T>(&self, key: &str) -> Result<Option<Vec<T>>>
	where
		T: FromStr,
		T::Err: fmt::Display,
	{
		let Some(arg) = self.arg(key) else {
			return Ok(None);
		};
		arg.values.iter().map(|value| self.scan_value(key, value)).collect::<Result<Vec<_>>>().map(Some)
	}

	/// Scans exactly `N` values of the argument `key`.
	pub fn scan_exact<T, const N: usize>(&self, key: &str) -> Result<[T; N]>
	where
		T: FromStr,
		T::Err: fmt::Display,
	{
		let values = self.scan_args(key)?;
		let found = values.len();
		values.try_into().map_err(|_| Error::Arity {
			pos: self.pos.clone(),
			key: key.to_string(),
			expected: N,
			found,
		})
	}

	fn scan_value<T>(&self, key: &str, value: &str) -> Result<T>
	where
		T: FromStr,
		T::Err: fmt::Display,
	{
		value.parse().map_err(|err: T::Err| Error::Scan {
			pos: self.pos.clone(),
			key: key.to_string(),
			value: value.to_string(),
			message: err.to_string(),
		})
	}

	fn missing(&self, key: &str) -> Error {
		Error::MissingArg {
			pos: self.pos.clone(),
			key: key.to_string(),
		}
	}
}
