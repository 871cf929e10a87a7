// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use similar::TextDiff;

use crate::{
	Result,
	data::{Section, TestData},
	error::Error,
};

pub const SEPARATOR: &str = "----";

/// Accumulates a rewritten test file.
///
/// Everything outside of expected output sections is echoed verbatim while
/// the file is read. The expected sections are then written from the actual
/// output of each record, choosing the double separator form whenever the
/// output could not be read back in the single separator form.
#[derive(Debug, Default)]
pub struct Rewriter {
	buf: String,
	pending_blank: bool,
}

impl Rewriter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Echoes one line of the original file.
	pub fn echo(&mut self, line: &str) {
		self.flush_blank();
		self.buf.push_str(line);
		self.buf.push('\n');
	}

	/// Writes `actual` as the expected output of `data`, keeping the blank
	/// line layout around its original section.
	///
	/// Fails without writing anything if the output could not be read back
	/// unchanged.
	pub fn output(&mut self, data: &TestData, actual: &str) -> Result<()> {
		let actual = normalize(actual);
		let section = data.section();
		let consumed_blank = matches!(
			section,
			Section::Single {
				blank: true
			}
		);

		let double = needs_double(&actual);
		if double && !fits_double(&actual) {
			return Err(Error::Unrepresentable {
				pos: data.pos.clone(),
				separator: SEPARATOR,
			});
		}

		self.echo(SEPARATOR);
		if double {
			self.echo(SEPARATOR);
			self.buf.push_str(&actual);
			self.echo(SEPARATOR);
			self.echo(SEPARATOR);
			if consumed_blank {
				self.echo("");
			}
		} else {
			self.buf.push_str(&actual);
			match section {
				Section::Single {
					blank: true,
				} => self.echo(""),
				// A single section must be terminated by a blank line
				// if anything follows it.
				Section::Double => self.pending_blank = true,
				Section::Single {
					blank: false,
				}
				| Section::Missing => {}
			}
		}
		Ok(())
	}

	/// Writes the expected section of `data` back unchanged.
	pub fn preserve(&mut self, data: &TestData) {
		match data.section() {
			Section::Missing => {}
			Section::Single {
				blank,
			} => {
				self.echo(SEPARATOR);
				self.buf.push_str(&data.expected);
				if blank {
					self.echo("");
				}
			}
			Section::Double => {
				self.echo(SEPARATOR);
				self.echo(SEPARATOR);
				self.buf.push_str(&data.expected);
				self.echo(SEPARATOR);
				self.echo(SEPARATOR);
			}
		}
	}

	/// Returns the rewritten file.
	pub fn finish(self) -> String {
		self.buf
	}

	fn flush_blank(&mut self) {
		if self.pending_blank {
			self.pending_blank = false;
			self.buf.push('\n');
		}
	}
}

/// Appends a trailing newline to non-empty output that lacks one.
pub(crate) fn normalize(output: &str) -> String {
	let mut output = output.to_string();
	if !output.is_empty() && !output.ends_with('\n') {
		output.push('\n');
	}
	output
}

/// Output containing a blank line would terminate a single separator section
/// early, and output starting with a separator would be read as the double
/// separator form.
fn needs_double(output: &str) -> bool {
	let mut lines = output.lines();
	if lines.clone().next() == Some(SEPARATOR) {
		return true;
	}
	lines.any(|line| line.trim().is_empty())
}

/// A double section ends at the first two consecutive separator lines, so
/// its content can neither contain such a pair nor end in a separator line.
fn fits_double(output: &str) -> bool {
	let lines: Vec<&str> = output.lines().collect();
	if lines.last() == Some(&SEPARATOR) {
		return false;
	}
	!lines.windows(2).any(|pair| pair[0] == SEPARATOR && pair[1] == SEPARATOR)
}

/// Renders a unified diff between two versions of a file.
pub fn unified_diff(old: &str, new: &str) -> String {
	TextDiff::from_lines(old, new).unified_diff().context_radius(3).header("expected", "actual").to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::data::Pos;

	fn single(blank: bool) -> TestData {
		record(Section::Single {
			blank,
		})
	}

	fn double() -> TestData {
		record(Section::Double)
	}

	fn record(section: Section) -> TestData {
		TestData {
			pos: Pos::new("test", 3),
			cmd: "cmd".to_string(),
			args: Vec::new(),
			input: String::new(),
			expected: String::new(),
			section,
		}
	}

	#[test]
	fn test_single_output() {
		let mut rw = Rewriter::new();
		rw.output(&single(true), "foo\nbar").unwrap();
		rw.echo("next");
		assert_eq!(rw.finish(), "----\nfoo\nbar\n\nnext\n");
	}

	#[test]
	fn test_single_output_at_end() {
		let mut rw = Rewriter::new();
		rw.output(&single(false), "foo\n").unwrap();
		assert_eq!(rw.finish(), "----\nfoo\n");
	}

	#[test]
	fn test_empty_output() {
		let mut rw = Rewriter::new();
		rw.output(&single(true), "").unwrap();
		rw.echo("next");
		assert_eq!(rw.finish(), "----\n\nnext\n");

		let mut rw = Rewriter::new();
		rw.output(&record(Section::Missing), "").unwrap();
		assert_eq!(rw.finish(), "----\n");
	}

	#[test]
	fn test_blank_line_switches_to_double() {
		let mut rw = Rewriter::new();
		rw.output(&single(true), "a\n\nb\n").unwrap();
		rw.echo("next");
		assert_eq!(rw.finish(), "----\n----\na\n\nb\n----\n----\n\nnext\n");
	}

	#[test]
	fn test_whitespace_line_switches_to_double() {
		assert!(needs_double("a\n  \nb\n"));
		assert!(needs_double("\n"));
		assert!(!needs_double("a\nb\n"));
		assert!(!needs_double(""));
	}

	#[test]
	fn test_leading_separator_switches_to_double() {
		assert!(needs_double("----\nfoo\n"));
		assert!(!needs_double("foo\n----\n"));
	}

	#[test]
	fn test_double_to_single_needs_blank_before_next_line() {
		let mut rw = Rewriter::new();
		rw.output(&double(), "foo").unwrap();
		rw.echo("next");
		assert_eq!(rw.finish(), "----\nfoo\n\nnext\n");

		let mut rw = Rewriter::new();
		rw.output(&double(), "foo").unwrap();
		assert_eq!(rw.finish(), "----\nfoo\n");
	}

	#[test]
	fn test_separator_pairs_cannot_be_written_back() {
		assert!(fits_double("a\n\n----\nb\n"));
		assert!(!fits_double("a\n\n----\n"));
		assert!(!fits_double("----\n----\nb\n"));
		assert!(!fits_double("a\n\n----\n----\nb\n"));
	}

	#[test]
	fn test_unrepresentable_output_is_rejected() {
		let mut rw = Rewriter::new();
		rw.echo("cmd");
		let err = rw.output(&single(false), "a\n\n----").unwrap_err();
		assert!(matches!(&err, Error::Unrepresentable { pos, .. } if pos.line == 3));
		assert_eq!(rw.finish(), "cmd\n");
	}

	#[test]
	fn test_separator_in_single_form_is_kept() {
		let mut rw = Rewriter::new();
		rw.output(&single(false), "a\n----\n----").unwrap();
		assert_eq!(rw.finish(), "----\na\n----\n----\n");
	}

	#[test]
	fn test_unified_diff() {
		let diff = unified_diff("a\nb\nc\n", "a\nx\nc\n");
		assert!(diff.contains("--- expected"));
		assert!(diff.contains("+++ actual"));
		assert!(diff.contains("-b\n"));
		assert!(diff.contains("+x\n"));
		assert_eq!(unified_diff("same\n", "same\n"), "");
	}
}
