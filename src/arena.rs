//! Per-model memory accounting.
//!
//! Every model load opens an [`Arena`] with a budget picked from its file family. All of the model's
//! derived arrays are charged against it, and the total charged becomes the model's resident size.

use log::trace;

use crate::{ModelError, ModelResult};

/// Maximum bytes a single model may claim while loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaBudget(pub usize);

impl ArenaBudget {
	pub const LEGACY_BSP: Self = Self(16 * 1024 * 1024);
	pub const EXTENDED_BSP: Self = Self(96 * 1024 * 1024);
	pub const MD3: Self = Self(4 * 1024 * 1024);
	pub const SP2: Self = Self(64 * 1024);
}

/// Allocations are rounded up to this many bytes when charged.
const ALIGN: usize = 32;

#[derive(Debug)]
pub struct Arena {
	tag: String,
	budget: usize,
	used: usize,
}

impl Arena {
	/// Opens an arena for the model called `tag`.
	pub fn begin(budget: ArenaBudget, tag: impl Into<String>) -> Self {
		Self {
			tag: tag.into(),
			budget: budget.0,
			used: 0,
		}
	}

	/// Charges `bytes` against the budget.
	pub fn charge(&mut self, bytes: usize) -> ModelResult<()> {
		let rounded = bytes.checked_next_multiple_of(ALIGN).unwrap_or(usize::MAX);
		if self.used.saturating_add(rounded) > self.budget {
			return Err(ModelError::ArenaOverflow {
				tag: self.tag.clone(),
				budget: self.budget,
				used: self.used,
				requested: bytes,
			});
		}
		self.used += rounded;
		Ok(())
	}

	/// Charges room for `count` values of `T` and returns an empty vector with that capacity.
	pub fn alloc<T>(&mut self, count: usize) -> ModelResult<Vec<T>> {
		self.charge(count.saturating_mul(size_of::<T>()))?;
		Ok(Vec::with_capacity(count))
	}

	/// Charges for a copy of `bytes` and returns it.
	pub fn alloc_copy(&mut self, bytes: &[u8]) -> ModelResult<Vec<u8>> {
		self.charge(bytes.len())?;
		Ok(bytes.to_vec())
	}

	#[inline]
	pub fn used(&self) -> usize {
		self.used
	}

	/// Closes the arena and returns the total bytes charged.
	pub fn end(self) -> usize {
		trace!("Arena \"{}\" closed at {} of {} bytes", self.tag, self.used, self.budget);
		self.used
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn charges_are_rounded() {
		let mut arena = Arena::begin(ArenaBudget(1024), "test");
		arena.charge(1).unwrap();
		assert_eq!(arena.used(), 32);
		let v: Vec<u32> = arena.alloc(10).unwrap();
		assert!(v.capacity() >= 10);
		assert_eq!(arena.end(), 32 + 64);
	}

	#[test]
	fn overflow() {
		let mut arena = Arena::begin(ArenaBudget(64), "small");
		arena.charge(64).unwrap();
		assert!(matches!(
			arena.alloc::<u8>(1),
			Err(ModelError::ArenaOverflow { used: 64, requested: 1, .. })
		));
		assert_eq!(arena.used(), 64);
	}
}
