// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	any::{Any, TypeId},
	collections::HashMap,
	error::Error as StdError,
	fmt,
	marker::PhantomData,
	panic::{AssertUnwindSafe, catch_unwind},
};

use serde::de::DeserializeOwned;
use tracing::{instrument, trace};

use crate::error::DispatchError;

/// A type-erased holder for a driver's input, expected or actual value.
pub trait Slot: Any + fmt::Debug {
	/// Replaces the held value with one decoded from `value`.
	fn fill(&mut self, value: serde_yaml::Value) -> Result<(), String>;

	fn as_any(&self) -> &dyn Any;

	fn as_any_mut(&mut self) -> &mut dyn Any;

	/// Structural equality with a value of the same concrete type.
	fn eq_slot(&self, other: &dyn Slot) -> bool;
}

impl<T> Slot for T
where
	T: DeserializeOwned + PartialEq + fmt::Debug + 'static,
{
	fn fill(&mut self, value: serde_yaml::Value) -> Result<(), String> {
		*self = serde_yaml::from_value(value).map_err(|err| err.to_string())?;
		Ok(())
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}

	fn eq_slot(&self, other: &dyn Slot) -> bool {
		other.as_any().downcast_ref::<T>().is_some_and(|other| self == other)
	}
}

impl dyn Slot {
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.as_any().downcast_ref()
	}

	pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
		self.as_any_mut().downcast_mut()
	}
}

trait Driver {
	/// Zero-valued holders for the input and expected output.
	fn holders(&self) -> (Box<dyn Slot>, Box<dyn Slot>);

	fn call(&mut self, input: &dyn Slot) -> Box<dyn Slot>;

	/// Whether the callable takes or returns nothing.
	fn is_unit(&self) -> bool;
}

struct FnDriver<F, I, O> {
	f: F,
	_marker: PhantomData<fn(I) -> O>,
}

impl<F, I, O> Driver for FnDriver<F, I, O>
where
	F: FnMut(I) -> O,
	I: Slot + Default + Clone,
	O: Slot + Default,
{
	fn holders(&self) -> (Box<dyn Slot>, Box<dyn Slot>) {
		(Box::new(I::default()), Box::new(O::default()))
	}

	fn call(&mut self, input: &dyn Slot) -> Box<dyn Slot> {
		let input = input.downcast_ref::<I>().cloned().unwrap_or_default();
		Box::new((self.f)(input))
	}

	fn is_unit(&self) -> bool {
		TypeId::of::<I>() == TypeId::of::<()>() || TypeId::of::<O>() == TypeId::of::<()>()
	}
}

/// Maps driver names to the functions that compute the actual output of a
/// test case from its input.
///
/// A driver is any `FnMut(I) -> O` whose input and output can be decoded
/// from YAML and compared for equality. Drivers may keep state between
/// calls.
#[derive(Default)]
pub struct DriverMap {
	drivers: HashMap<String, Box<dyn Driver>>,
}

impl DriverMap {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `f` under `name`, replacing any previous driver.
	pub fn register<F, I, O>(&mut self, name: impl Into<String>, f: F) -> &mut Self
	where
		F: FnMut(I) -> O + 'static,
		I: Slot + Default + Clone,
		O: Slot + Default,
	{
		self.drivers.insert(
			name.into(),
			Box::new(FnDriver {
				f,
				_marker: PhantomData,
			}),
		);
		self
	}

	pub fn with<F, I, O>(mut self, name: impl Into<String>, f: F) -> Self
	where
		F: FnMut(I) -> O + 'static,
		I: Slot + Default + Clone,
		O: Slot + Default,
	{
		self.register(name, f);
		self
	}

	pub fn contains(&self, name: &str) -> bool {
		self.drivers.contains_key(name)
	}

	/// Runs the driver `name`.
	///
	/// Zero-valued holders for the driver's input and expected output are
	/// handed to `populate`, which fills them in from the test case. The
	/// driver is then called with the populated input. Panics inside
	/// `populate` or the driver are returned as [`DispatchError::Panic`].
	#[instrument(name = "datadriven::driver::dispatch", level = "trace", skip(self, populate))]
	pub fn dispatch<P>(&mut self, name: &str, populate: P) -> Result<Invocation, DispatchError>
	where
		P: FnOnce(&mut dyn Slot, &mut dyn Slot) -> Result<(), Box<dyn StdError>>,
	{
		let driver = self.drivers.get_mut(name).ok_or_else(|| DispatchError::NotFound(name.to_string()))?;
		if driver.is_unit() {
			return Err(DispatchError::Signature);
		}

		let (mut input, mut expected) = driver.holders();
		let actual = catch_unwind(AssertUnwindSafe(|| -> Result<Box<dyn Slot>, DispatchError> {
			populate(&mut *input, &mut *expected).map_err(|err| DispatchError::Populate(err.to_string()))?;
			Ok(driver.call(&*input))
		}))
		.unwrap_or_else(|panic| Err(DispatchError::Panic(panic_message(panic))))?;

		trace!(?input, ?expected, ?actual, "dispatched");

		Ok(Invocation {
			input,
			expected,
			actual,
		})
	}
}

impl fmt::Debug for DriverMap {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut names: Vec<_> = self.drivers.keys().collect();
		names.sort();
		f.debug_struct("DriverMap").field("drivers", &names).finish()
	}
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
	if let Some(s) = panic.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = panic.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	}
}

/// The values of one driver call.
#[derive(Debug)]
pub struct Invocation {
	input: Box<dyn Slot>,
	expected: Box<dyn Slot>,
	actual: Box<dyn Slot>,
}

impl Invocation {
	pub fn input(&self) -> &dyn Slot {
		&*self.input
	}

	pub fn expected(&self) -> &dyn Slot {
		&*self.expected
	}

	pub fn actual(&self) -> &dyn Slot {
		&*self.actual
	}

	pub fn input_as<T: Any>(&self) -> Option<&T> {
		self.input.downcast_ref()
	}

	pub fn expected_as<T: Any>(&self) -> Option<&T> {
		self.expected.downcast_ref()
	}

	pub fn actual_as<T: Any>(&self) -> Option<&T> {
		self.actual.downcast_ref()
	}

	/// Whether the actual value equals the expected one.
	pub fn matches(&self) -> bool {
		self.expected.eq_slot(&*self.actual)
	}
}
