// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::io::{self, BufRead};

/// Reads a byte stream line by line, keeping track of the current line number.
///
/// Line terminators (`\n` or `\r\n`) are stripped. The stream must be valid
/// UTF-8.
pub struct LineScanner<R> {
	reader: R,
	line: usize,
	buf: String,
}

impl<R: BufRead> LineScanner<R> {
	pub fn new(reader: R) -> Self {
		Self {
			reader,
			line: 0,
			buf: String::new(),
		}
	}

	/// Advances to the next line, returning `None` at the end of the stream.
	pub fn scan(&mut self) -> io::Result<Option<&str>> {
		self.buf.clear();
		if self.reader.read_line(&mut self.buf)? == 0 {
			return Ok(None);
		}
		self.line += 1;

		if self.buf.ends_with('\n') {
			self.buf.pop();
			if self.buf.ends_with('\r') {
				self.buf.pop();
			}
		}
		Ok(Some(&self.buf))
	}

	/// The 1-based number of the line last returned by [`scan`](Self::scan),
	/// or 0 before the first call.
	pub fn line(&self) -> usize {
		self.line
	}
}
