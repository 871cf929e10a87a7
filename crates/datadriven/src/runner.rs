// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	error::Error as StdError,
	fs,
	io::BufRead,
	panic::{AssertUnwindSafe, catch_unwind, resume_unwind},
	path::Path,
};

use tracing::{debug, error, info, instrument, warn};

use crate::{
	Result,
	config::Config,
	data::{Section, TestData},
	error::{Error, Mismatch},
	reader::Reader,
	rewrite::{normalize, unified_diff},
};

/// Produces the actual output of test file records.
pub trait Handler {
	/// Runs the directive of a record, returning its output.
	///
	/// Returning a [`Skip`] error skips the record: its output is not
	/// compared, and a rewrite keeps the recorded output. Any other error
	/// aborts the file.
	fn run(&mut self, data: &TestData) -> std::result::Result<String, Box<dyn StdError>>;
}

impl<F> Handler for F
where
	F: FnMut(&TestData) -> std::result::Result<String, Box<dyn StdError>>,
{
	fn run(&mut self, data: &TestData) -> std::result::Result<String, Box<dyn StdError>> {
		self(data)
	}
}

/// Signals that a record should be skipped.
#[derive(Debug, thiserror::Error)]
#[error("skipped: {0}")]
pub struct Skip(pub String);

impl Skip {
	pub fn new(reason: impl Into<String>) -> Self {
		Self(reason.into())
	}
}

/// Runs a test file, comparing the output of each record with the recorded
/// one.
///
/// If the environment variable `UPDATE_TESTFILES=1` is set, the recorded
/// output is replaced instead and the file is written back if it changed.
pub fn run_path<H: Handler, P: AsRef<Path>>(handler: &mut H, path: P) -> Result<()> {
	run_path_with(handler, path, Config::from_env())
}

#[instrument(name = "datadriven::runner::run_path", level = "debug", skip(handler, path), fields(path = %path.as_ref().display()))]
pub fn run_path_with<H: Handler, P: AsRef<Path>>(handler: &mut H, path: P, config: Config) -> Result<()> {
	let path = path.as_ref();
	let source = path.display().to_string();
	let original = fs::read_to_string(path).map_err(|error| Error::File {
		path: source.clone(),
		error,
	})?;

	let Some(rewritten) = run_source(handler, &source, original.as_bytes(), config)? else {
		return Ok(());
	};

	if rewritten == original {
		debug!("test file unchanged");
		return Ok(());
	}

	info!("rewriting test file:\n{}", unified_diff(&original, &rewritten));
	fs::write(path, rewritten)?;
	Ok(())
}

/// Runs a test script held in memory, comparing the output of each record
/// with the recorded one.
pub fn run_string<H: Handler>(handler: &mut H, input: &str) -> Result<()> {
	run_source(handler, "<string>", input.as_bytes(), Config::default())?;
	Ok(())
}

/// Returns the test script with each recorded output replaced by the actual
/// output of its record.
pub fn rewrite_string<H: Handler>(handler: &mut H, source: &str, input: &str) -> Result<String> {
	let rewritten = run_source(handler, source, input.as_bytes(), Config::rewrite())?;
	Ok(rewritten.unwrap_or_default())
}

fn run_source<H: Handler, R: BufRead>(
	handler: &mut H,
	source: &str,
	input: R,
	config: Config,
) -> Result<Option<String>> {
	let mut reader = Reader::new(source, input);
	if config.rewrite {
		reader = reader.rewriting();
	}

	while let Some(data) = reader.next_record()? {
		let actual = run_directive(handler, &data)?;

		if let Some(rewriter) = reader.rewriter() {
			match &actual {
				Some(actual) => rewriter.output(&data, actual)?,
				None => rewriter.preserve(&data),
			}
			continue;
		}

		match actual {
			// Without a separator there is nothing to compare against.
			Some(_) if data.section() == Section::Missing => debug!(pos = %data.pos, "no expected output"),
			Some(actual) if actual != data.expected => {
				let diff = unified_diff(&data.expected, &actual);
				return Err(Error::Mismatch {
					pos: data.pos.clone(),
					mismatch: Mismatch {
						input: data.input.clone(),
						expected: data.expected.clone(),
						actual,
					},
					diff,
				});
			}
			Some(_) => debug!(pos = %data.pos, "ok"),
			None => {}
		}
	}

	Ok(reader.into_rewrite())
}

/// Runs the handler for one record, returning `None` if it was skipped.
fn run_directive<H: Handler>(handler: &mut H, data: &TestData) -> Result<Option<String>> {
	match catch_unwind(AssertUnwindSafe(|| handler.run(data))) {
		Ok(Ok(output)) => Ok(Some(normalize(&output))),
		Ok(Err(err)) if err.is::<Skip>() => {
			warn!(pos = %data.pos, "{err}");
			Ok(None)
		}
		Ok(Err(err)) => match err.downcast::<Error>() {
			Ok(err) if err.pos().is_some() => Err(*err),
			Ok(err) => Err(Error::Handler {
				pos: data.pos.clone(),
				message: err.to_string(),
			}),
			Err(err) => Err(Error::Handler {
				pos: data.pos.clone(),
				message: err.to_string(),
			}),
		},
		Err(panic) => {
			error!(pos = %data.pos, input = %data.input, "panic while running {}", data.cmd);
			resume_unwind(panic)
		}
	}
}

#[cfg(test)]
mod tests {
	use std::fmt::Write as _;

	use super::*;
	use crate::directive::parse_line;

	type HandlerResult = std::result::Result<String, Box<dyn StdError>>;

	#[test]
	fn test_newline_between_directives() {
		run_string(
			&mut |d: &TestData| -> HandlerResult {
				if d.input != "sentence" {
					return Ok("unknown command".to_string());
				}
				Ok(String::new())
			},
			r#"
# Some testing of sensitivity to newlines
foo
----
unknown command

bar
----
unknown command




bar
----
unknown command
"#,
		)
		.unwrap();
	}

	#[test]
	fn test_parse_line() {
		run_string(
			&mut |d: &TestData| -> HandlerResult {
				match parse_line(&d.input) {
					Ok((cmd, args)) => {
						let args: Vec<String> = args.iter().map(ToString::to_string).collect();
						Ok(format!("{cmd:?} [{}]", args.join(" ")))
					}
					Err(err) => Ok(format!("here: {err}")),
				}
			},
			r#"
parse
xx =
----
here: cannot parse directive at column 4: xx =

parse
xx a=b a=c
----
"xx" [a=b a=c]

parse
xx a=b b=c c=(1,2,3)
----
"xx" [a=b b=c c=(1, 2, 3)]
"#,
		)
		.unwrap();
	}

	#[test]
	fn test_skip_masks_errors() {
		run_string(
			&mut |d: &TestData| -> HandlerResult {
				match d.cmd.as_str() {
					"skip" => Err(Skip::new("woo").into()),
					_ => Err("never reached".into()),
				}
			},
			r#"
skip
----
this output is never compared
"#,
		)
		.unwrap();
	}

	#[test]
	fn test_handler_error_aborts() {
		let err = run_string(
			&mut |_: &TestData| -> HandlerResult { Err("unknown directive".into()) },
			"\nfoo\n----\n",
		)
		.unwrap_err();
		assert_eq!(err.to_string(), "<string>:2: unknown directive");
	}

	#[test]
	fn test_mismatch() {
		let err = run_string(
			&mut |d: &TestData| -> HandlerResult { Ok(format!("{} was said", d.cmd)) },
			"hello\nworld\n----\ngoodbye was said\n",
		)
		.unwrap_err();

		let Error::Mismatch {
			pos,
			mismatch,
			diff,
		} = err
		else {
			panic!("unexpected error {err}");
		};
		assert_eq!(pos.line, 1);
		assert_eq!(mismatch.input, "world");
		assert_eq!(mismatch.expected, "goodbye was said\n");
		assert_eq!(mismatch.actual, "hello was said\n");
		assert!(diff.contains("-goodbye was said"));
		assert!(diff.contains("+hello was said"));
	}

	#[test]
	fn test_maybe_scan_noop() {
		run_string(
			&mut |d: &TestData| -> HandlerResult {
				let [x, y, z] = d.maybe_scan_args::<String>("vals")?.map_or_else(Default::default, |vals| {
					let mut vals = vals.into_iter();
					[
						vals.next().unwrap_or_default(),
						vals.next().unwrap_or_default(),
						vals.next().unwrap_or_default(),
					]
				});
				Ok(format!("{x:?}, {y:?}, {z:?}"))
			},
			"\ncmd\n----\n\"\", \"\", \"\"\n",
		)
		.unwrap();
	}

	#[test]
	fn test_scan_args_expansion() {
		run_string(
			&mut |d: &TestData| -> HandlerResult {
				let [x, y, z] = d.scan_exact::<String, 3>("vals")?;
				Ok(format!("{x:?}, {y:?}, {z:?}"))
			},
			r#"
cmd vals=(foo, bar, bax)
----
"foo", "bar", "bax"
"#,
		)
		.unwrap();
	}

	#[test]
	fn test_scan_args_typed() {
		run_string(
			&mut |d: &TestData| -> HandlerResult {
				let mut out = String::new();
				match d.cmd.as_str() {
					"strings" => write!(out, "{:?}", d.scan_args::<String>("vals")?)?,
					"ints" => write!(out, "{:?}", d.scan_args::<i64>("vals")?)?,
					"u64s" => write!(out, "{:?}", d.scan_args::<u64>("vals")?)?,
					"string" => write!(out, "{:?}", d.scan_arg::<String>("vals")?)?,
					"bool" => write!(out, "{:?}", d.scan_arg::<bool>("vals")?)?,
					other => write!(out, "unrecognized type {other}")?,
				}
				Ok(out)
			},
			r#"
strings vals=(foo, bar, bax)
----
["foo", "bar", "bax"]

ints vals=(1, 2, 3, 4)
----
[1, 2, 3, 4]

u64s vals=(1, 2, 3, 4)
----
[1, 2, 3, 4]

string vals=(foo)
----
"foo"

bool vals=true
----
true

float vals=1.5
----
unrecognized type float
"#,
		)
		.unwrap();
	}

	#[test]
	fn test_scan_error_keeps_its_position() {
		let err = run_string(
			&mut |d: &TestData| -> HandlerResult { Ok(d.scan_arg::<i64>("n")?.to_string()) },
			"cmd n=x\n----\n",
		)
		.unwrap_err();
		assert_eq!(
			err.to_string(),
			r#"<string>:1: argument "n": cannot scan "x": invalid digit found in string"#
		);
	}

	#[test]
	fn test_handler_error_without_position_is_wrapped() {
		let err = run_string(
			&mut |d: &TestData| -> HandlerResult {
				Err(Error::Format {
					name: d.cmd.clone(),
					message: "broken".to_string(),
				}
				.into())
			},
			"\n\ncmd\n----\n",
		)
		.unwrap_err();
		assert_eq!(err.to_string(), "<string>:3: cmd: broken");
	}

	#[test]
	fn test_record_without_separator_is_not_compared() {
		run_string(&mut |_: &TestData| -> HandlerResult { Ok("out".to_string()) }, "cmd\ninput\n").unwrap();
		run_string(
			&mut |d: &TestData| -> HandlerResult { Ok(d.input.clone()) },
			"first\none\n----\none\n\nlast\ntwo\n",
		)
		.unwrap();
	}

	#[test]
	fn test_unrepresentable_output_fails_rewrite() {
		let err = rewrite_string(
			&mut |_: &TestData| -> HandlerResult { Ok("a\n\n----".to_string()) },
			"test",
			"# header\ncmd\n----\nold\n",
		)
		.unwrap_err();
		assert!(matches!(&err, Error::Unrepresentable { pos, .. } if pos.line == 2));
		assert_eq!(
			err.to_string(),
			r#"test:2: output cannot be written back: it ends in or contains two consecutive "----" lines"#
		);
	}

	#[test]
	fn test_rewrite_with_trailing_separator_line_is_idempotent() {
		let mut handler = |_: &TestData| -> HandlerResult { Ok("----\na\n\nb".to_string()) };
		let once = rewrite_string(&mut handler, "test", "cmd\n----\nold\n").unwrap();
		assert_eq!(once, "cmd\n----\n----\n----\na\n\nb\n----\n----\n");
		assert_eq!(rewrite_string(&mut handler, "test", &once).unwrap(), once);
	}

	#[test]
	fn test_rewrite_string() {
		let rewritten = rewrite_string(
			&mut |d: &TestData| -> HandlerResult { Ok(d.input.to_uppercase()) },
			"test",
			"# header\nup\nfoo\n----\nstale\n\nup\nbar\n----\n----\nold\n\nstale\n----\n----\n",
		)
		.unwrap();
		assert_eq!(rewritten, "# header\nup\nfoo\n----\nFOO\n\nup\nbar\n----\nBAR\n");
	}

	#[test]
	fn test_rewrite_keeps_skipped_records() {
		let input = "skip\n----\n----\nkept\n\nas is\n----\n----\n\nrun\n----\nold\n";
		let rewritten = rewrite_string(
			&mut |d: &TestData| -> HandlerResult {
				match d.cmd.as_str() {
					"skip" => Err(Skip::new("not today").into()),
					_ => Ok("new".to_string()),
				}
			},
			"test",
			input,
		)
		.unwrap();
		assert_eq!(rewritten, "skip\n----\n----\nkept\n\nas is\n----\n----\n\nrun\n----\nnew\n");
	}

	#[test]
	#[should_panic(expected = "boom")]
	fn test_handler_panic_is_resumed() {
		let _ = run_string(&mut |_: &TestData| -> HandlerResult { panic!("boom") }, "cmd\n----\n");
	}
}
