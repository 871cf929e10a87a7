// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::io::BufRead;

use tracing::{debug, instrument};

use crate::{
	Result,
	data::{Pos, Section, TestData},
	directive::parse_line,
	error::Error,
	rewrite::{Rewriter, SEPARATOR},
	scanner::LineScanner,
};

/// Reads the records of a test file one at a time.
///
/// When rewriting, every line that is not part of an expected output section
/// is echoed into a [`Rewriter`]. The caller is expected to hand the actual
/// output of each record to [`Reader::rewriter`] before reading the next one.
pub struct Reader<R> {
	source: String,
	scanner: LineScanner<R>,
	rewrite: Option<Rewriter>,
}

impl<R: BufRead> Reader<R> {
	pub fn new(source: impl Into<String>, reader: R) -> Self {
		Self {
			source: source.into(),
			scanner: LineScanner::new(reader),
			rewrite: None,
		}
	}

	/// Echoes the file into a [`Rewriter`] while reading.
	pub fn rewriting(mut self) -> Self {
		self.rewrite = Some(Rewriter::new());
		self
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn rewriter(&mut self) -> Option<&mut Rewriter> {
		self.rewrite.as_mut()
	}

	/// Finishes reading, returning the rewritten file if rewriting.
	pub fn into_rewrite(self) -> Option<String> {
		self.rewrite.map(Rewriter::finish)
	}

	/// Reads the next record, or returns `None` at the end of the file.
	#[instrument(name = "datadriven::reader::next_record", level = "trace", skip(self), fields(source = %self.source))]
	pub fn next_record(&mut self) -> Result<Option<TestData>> {
		while let Some(line) = self.scan()? {
			self.emit(&line);

			let line_number = self.scanner.line();
			let mut directive = line.trim().to_string();
			if directive.starts_with('#') {
				continue;
			}

			// A trailing backslash continues the directive on the next
			// line.
			while directive.ends_with('\\') {
				let Some(next) = self.scan()? else {
					break;
				};
				self.emit(&next);
				directive.pop();
				directive = format!("{} {}", directive.trim_end(), next.trim());
			}

			let pos = Pos::new(self.source.as_str(), line_number);
			let (cmd, args) = parse_line(&directive).map_err(|error| Error::Parse {
				pos: pos.clone(),
				error,
			})?;
			if cmd.is_empty() {
				continue;
			}

			let mut input = String::new();
			let mut separator = false;
			while let Some(line) = self.scan()? {
				if line == SEPARATOR {
					separator = true;
					break;
				}
				self.emit(&line);
				input.push_str(&line);
				input.push('\n');
			}

			let (expected, section) = if separator {
				self.read_expected()?
			} else {
				(String::new(), Section::Missing)
			};

			debug!(%pos, %cmd, ?section, "read record");

			return Ok(Some(TestData {
				pos,
				cmd,
				args,
				input: input.trim().to_string(),
				expected,
				section,
			}));
		}
		Ok(None)
	}

	fn read_expected(&mut self) -> Result<(String, Section)> {
		let mut expected = String::new();
		let Some(mut line) = self.scan()? else {
			return Ok((
				expected,
				Section::Single {
					blank: false,
				},
			));
		};

		if line == SEPARATOR {
			// Only two consecutive separators end the section.
			while let Some(line) = self.scan()? {
				if line == SEPARATOR {
					match self.scan()? {
						Some(next) if next == SEPARATOR => break,
						Some(next) => {
							push_line(&mut expected, &line);
							push_line(&mut expected, &next);
						}
						None => push_line(&mut expected, &line),
					}
				} else {
					push_line(&mut expected, &line);
				}
			}
			return Ok((expected, Section::Double));
		}

		loop {
			if line.trim().is_empty() {
				return Ok((
					expected,
					Section::Single {
						blank: true,
					},
				));
			}
			push_line(&mut expected, &line);
			match self.scan()? {
				Some(next) => line = next,
				None => {
					return Ok((
						expected,
						Section::Single {
							blank: false,
						},
					));
				}
			}
		}
	}

	fn scan(&mut self) -> Result<Option<String>> {
		let line = self.scanner.line() + 1;
		match self.scanner.scan() {
			Ok(next) => Ok(next.map(str::to_string)),
			Err(error) => Err(Error::Read {
				pos: Pos::new(self.source.as_str(), line),
				error,
			}),
		}
	}

	fn emit(&mut self, line: &str) {
		if let Some(rewrite) = &mut self.rewrite {
			rewrite.echo(line);
		}
	}
}

fn push_line(buf: &mut String, line: &str) {
	buf.push_str(line);
	buf.push('\n');
}
