// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::env;

/// Environment variable switching test files into rewrite mode.
pub const REWRITE_ENV: &str = "UPDATE_TESTFILES";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
	/// Replace the recorded expected output with the actual output instead
	/// of comparing them.
	pub rewrite: bool,
}

impl Config {
	/// Reads the configuration from the environment. `UPDATE_TESTFILES=1`
	/// enables rewrite mode.
	pub fn from_env() -> Self {
		Self {
			rewrite: enabled(env::var(REWRITE_ENV).ok().as_deref()),
		}
	}

	pub fn rewrite() -> Self {
		Self {
			rewrite: true,
		}
	}
}

fn enabled(value: Option<&str>) -> bool {
	matches!(value.map(str::trim), Some("1") | Some("true") | Some("TRUE") | Some("yes"))
}
