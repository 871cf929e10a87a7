// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{fmt, fs, path::Path};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_yaml::Value;
use tracing::{debug, instrument, warn};

use crate::{
	Result,
	data::Pos,
	driver::{DriverMap, Slot},
	error::{DispatchError, Error},
};

static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^##[ \t]*(.*?)\s*$").unwrap());

/// A failed YAML test case.
#[derive(Debug)]
pub enum YamlFailure {
	Dispatch {
		pos: Pos,
		error: DispatchError,
	},
	Mismatch {
		pos: Pos,
		input: String,
		expected: String,
		actual: String,
	},
}

impl fmt::Display for YamlFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			YamlFailure::Dispatch {
				pos,
				error,
			} => write!(f, "{pos}: {error}"),
			YamlFailure::Mismatch {
				pos,
				input,
				expected,
				actual,
			} => write!(f, "{pos}: input: {input}\nexpected: {expected}\nactual: {actual}"),
		}
	}
}

/// The outcome of running a YAML test file.
#[derive(Debug, Default)]
pub struct YamlReport {
	pub name: String,
	pub cases: usize,
	pub failures: Vec<YamlFailure>,
}

impl YamlReport {
	pub fn passed(&self) -> bool {
		self.failures.is_empty()
	}

	/// Turns the failures of the report into an error.
	pub fn check(&self) -> Result<()> {
		if self.passed() {
			return Ok(());
		}
		let report = self.failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n");
		Err(Error::Failed {
			count: self.failures.len(),
			report,
		})
	}
}

/// Runs the YAML test file at `path` against `drivers`.
///
/// The file consists of test cases of the form
///
/// ```text
/// ## <driver>
/// <yaml input>
/// ---
/// <yaml expected output>
/// ---
/// ```
///
/// For every case the driver is called with the decoded input, and its
/// return value must equal the decoded expected output. Unknown fields are
/// handled as described on [`run_yaml_string`].
pub fn run_yaml_path<P: AsRef<Path>>(path: P, drivers: &mut DriverMap) -> Result<YamlReport> {
	let path = path.as_ref();
	let name = path.display().to_string();
	let input = fs::read_to_string(path).map_err(|error| Error::File {
		path: name.clone(),
		error,
	})?;
	run_yaml_string(&name, &input, drivers)
}

/// Like [`run_yaml_path`], reading the test cases from `input`. `name` is
/// used in positions.
///
/// Fields of a document that the driver's type does not know are ignored
/// unless the type opts into rejecting them with
/// `#[serde(deny_unknown_fields)]`.
#[instrument(name = "datadriven::yaml::run", level = "debug", skip(input, drivers))]
pub fn run_yaml_string(name: &str, input: &str, drivers: &mut DriverMap) -> Result<YamlReport> {
	if input.is_empty() {
		return Err(format_error(name, "no test cases found"));
	}

	let mut report = YamlReport {
		name: name.to_string(),
		..Default::default()
	};
	let mut documents = serde_yaml::Deserializer::from_str(input);

	for header in HEADER.captures_iter(input) {
		let Some(driver) = header.get(1) else {
			continue;
		};
		let pos = Pos::new(name, line_of(input, driver.start()));

		let Some(input_doc) = next_document(&mut documents, name)? else {
			return Err(format_error(name, format!("{pos}: missing input document")));
		};
		let Some(expected_doc) = next_document(&mut documents, name)? else {
			return Err(format_error(name, format!("{pos}: missing expected document")));
		};

		report.cases += 1;
		let result = drivers.dispatch(driver.as_str(), |input, expected| {
			fill(input, input_doc)?;
			fill(expected, expected_doc)?;
			Ok(())
		});

		match result {
			Ok(invocation) if invocation.matches() => debug!(%pos, "ok"),
			Ok(invocation) => {
				warn!(%pos, "mismatch");
				report.failures.push(YamlFailure::Mismatch {
					pos,
					input: format!("{:?}", invocation.input()),
					expected: format!("{:?}", invocation.expected()),
					actual: format!("{:?}", invocation.actual()),
				});
			}
			Err(error) => {
				warn!(%pos, %error, "dispatch failed");
				report.failures.push(YamlFailure::Dispatch {
					pos,
					error,
				});
			}
		}
	}

	// A file ending in `---` has a final empty document.
	while let Some(extra) = next_document(&mut documents, name)? {
		if !extra.is_null() {
			return Err(format_error(name, format!("decoded extraneous test case {extra:?}")));
		}
	}

	Ok(report)
}

fn next_document(documents: &mut serde_yaml::Deserializer<'_>, name: &str) -> Result<Option<Value>> {
	let Some(document) = documents.next() else {
		return Ok(None);
	};
	Value::deserialize(document).map(Some).map_err(|err| format_error(name, err.to_string()))
}

/// Decodes `value` into `slot`. Empty documents keep the zero value.
fn fill(slot: &mut dyn Slot, value: Value) -> std::result::Result<(), String> {
	if value.is_null() {
		return Ok(());
	}
	slot.fill(value)
}

fn line_of(input: &str, offset: usize) -> usize {
	input[..offset].matches('\n').count() + 1
}

fn format_error(name: &str, message: impl Into<String>) -> Error {
	Error::Format {
		name: name.to_string(),
		message: message.into(),
	}
}
