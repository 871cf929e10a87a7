// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Data-driven golden file tests.
//!
//! A test file is a sequence of records. Each record consists of a directive
//! line, an optional input block and the expected output, separated by a
//! `----` line:
//!
//! ```text
//! # comments start with a hash
//! cmd arg key=value list=(a, b)
//! input
//! ----
//! expected output
//! ```
//!
//! Expected output containing blank lines is enclosed in two separator lines
//! on each side. A [`Handler`] computes the actual output of every record,
//! which is either compared with the recorded output or, with
//! `UPDATE_TESTFILES=1`, written back into the file.
//!
//! The [`yaml`](run_yaml_path) variant instead runs typed drivers registered
//! in a [`DriverMap`] against YAML encoded inputs and expected outputs.

mod config;
mod data;
mod directive;
mod driver;
mod error;
mod reader;
mod rewrite;
mod runner;
mod scanner;
mod yaml;

pub use config::{Config, REWRITE_ENV};
pub use data::{Pos, Section, TestData};
pub use directive::{Argument, format_line, parse_line};
pub use driver::{DriverMap, Invocation, Slot};
pub use error::{DispatchError, Error, Mismatch, ParseError};
pub use reader::Reader;
pub use rewrite::{Rewriter, SEPARATOR, unified_diff};
pub use runner::{Handler, Skip, rewrite_string, run_path, run_path_with, run_string};
pub use scanner::LineScanner;
pub use yaml::{YamlFailure, YamlReport, run_yaml_path, run_yaml_string};

pub type Result<T> = std::result::Result<T, Error>;
