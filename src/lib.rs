//! Loading, caching and querying of the three model families a Quake 2 era renderer deals with: the BSP world
//! (in both the legacy `IBSP` and extended `QBSP` layouts), MD3 animated meshes and SP2 sprites.
//!
//! The [`registry::ModelRegistry`] is the entry point most users want. It resolves names to cached models, loads
//! them through a [`services::FileService`], and ages them out between world registrations.

// Lets the derive macros refer to `::q2model` from inside this crate.
extern crate self as q2model;

pub mod arena;
pub mod data;
pub mod interp;
pub mod md3;
pub mod prelude;
pub mod query;
pub mod reader;
pub mod registry;
pub mod services;
pub mod sprite;
pub mod surface;
pub mod util;
pub mod world;

#[cfg(test)]
pub(crate) mod test_util;

use thiserror::Error;

use crate::{
	arena::ArenaBudget,
	data::lump::{LumpEntry, LumpKind},
	reader::BspSchema,
	util::display_magic_number,
};

// Re-exports
pub use glam;
pub use smallvec;

#[derive(Debug, Clone, Error)]
pub enum ModelError {
	#[error("Tried to read bytes from {from} to {to} from buffer of size {size}")]
	BufferOutOfBounds { from: usize, to: usize, size: usize },
	#[error("{kind} lump ({entry:?}) out of bounds of data (file size {file_len})! Malformed/corrupted BSP?")]
	LumpOutOfBounds { kind: LumpKind, entry: LumpEntry, file_len: usize },
	#[error("{kind} lump has funny size {len}, not a multiple of the element size {element_size}")]
	LumpSizeNotMultiple { kind: LumpKind, len: usize, element_size: usize },
	#[error("{kind} lump has {count} elements, at least {min} required")]
	TooFewElements { kind: LumpKind, count: usize, min: usize },
	#[error("{kind} lump has {count} elements, the limit is {limit}")]
	TooManyElements { kind: LumpKind, count: usize, limit: usize },
	#[error("Wrong magic number! Expected {expected}, found \"{}\"", display_magic_number(found))]
	WrongMagicNumber { found: [u8; 4], expected: &'static str },
	#[error("Wrong version number {found}, expected {expected}")]
	WrongVersion { found: i32, expected: i32 },
	#[error("Declared end of data {declared} does not match file size {actual}")]
	SizeMismatch { declared: usize, actual: usize },
	#[error("{what} index {index} out of range (count {count})")]
	IndexOutOfRange { what: &'static str, index: i64, count: usize },
	#[error("Invalid value: {value}, acceptable:\n{acceptable}")]
	InvalidVariant { value: i64, acceptable: &'static str },
	#[error("Failed to parse string at index {index}, invalid utf-8 sequence: {sequence:?}")]
	InvalidString { index: usize, sequence: Vec<u8> },
	#[error("Model has no nodes to descend")]
	NoNodes,
	#[error("{what} {index} is reachable more than once, the node graph is not a tree")]
	CyclicTree { what: &'static str, index: usize },
	#[error("Arena \"{tag}\" exceeded its budget of {budget} bytes (requested {requested}, {used} already used)")]
	ArenaOverflow {
		tag: String,
		budget: usize,
		used: usize,
		requested: usize,
	},
	#[error("Couldn't load {0}")]
	NotFound(String),
	#[error("Model name is empty")]
	EmptyName,
	#[error("Bad inline model number {number}, {count} inline models loaded")]
	BadInlineModel { number: i64, count: usize },
	#[error("Model table full, {limit} models already loaded")]
	TooManyModels { limit: usize },
	#[error("{count} frames, the limit is {limit}")]
	TooManyFrames { count: i64, limit: usize },
	#[error("{count} vertices in surface \"{surface}\", the limit is {limit}")]
	TooManyVerts { surface: String, count: i64, limit: usize },
	#[error("{count} triangles in surface \"{surface}\", the limit is {limit}")]
	TooManyTriangles { surface: String, count: i64, limit: usize },
	#[error("{what} count {count} is out of range, the limit is {limit}")]
	BadCount { what: &'static str, count: i64, limit: usize },
	#[error("Model has no frames")]
	NoFrames,
	#[error("Loaded a brush model after the world")]
	BrushModelNotWorld,

	/// For telling the user exactly where the error occurred in the process.
	#[error("{0} - {1}")]
	DoingJob(String, Box<ModelError>),
}
impl ModelError {
	/// The error behind any [ModelError::DoingJob].
	pub fn root(&self) -> &ModelError {
		let mut err = self;
		loop {
			match err {
				Self::DoingJob(_, child) => err = child,
				_ => return err,
			}
		}
	}

	#[inline]
	pub fn map_utf8_error(data: &[u8]) -> impl FnOnce(std::str::Utf8Error) -> Self + '_ {
		|err| {
			let from = err.valid_up_to();
			let to = (from + err.error_len().unwrap_or(1)).min(data.len());
			ModelError::InvalidString {
				index: from,
				sequence: data[from..to].to_vec(),
			}
		}
	}
}

pub type ModelResult<T> = Result<T, ModelError>;

pub trait ModelResultDoingJobExt {
	/// Like `map_err`, but specifically for adding messages to model errors to tell the user exactly what was going on when the error occurred.
	fn job(self, job: impl ToString) -> Self;
}
impl<T> ModelResultDoingJobExt for ModelResult<T> {
	fn job(self, job: impl ToString) -> Self {
		match self {
			Ok(v) => Ok(v),
			Err(err) => Err(ModelError::DoingJob(job.to_string(), Box::new(err))),
		}
	}
}

/// File family of a model, sniffed from the first four bytes of its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFormat {
	Bsp(BspSchema),
	Md3,
	Sp2,
}
impl ModelFormat {
	pub fn from_magic_number(data: [u8; 4]) -> ModelResult<Self> {
		match &data {
			b"IBSP" => Ok(Self::Bsp(BspSchema::Legacy)),
			b"QBSP" => Ok(Self::Bsp(BspSchema::Extended)),
			b"IDP3" => Ok(Self::Md3),
			b"IDS2" => Ok(Self::Sp2),
			_ => Err(ModelError::WrongMagicNumber {
				found: data,
				expected: "IBSP, QBSP, IDP3 or IDS2",
			}),
		}
	}

	/// How much memory a single model of this format may claim while loading.
	pub const fn arena_budget(self) -> ArenaBudget {
		match self {
			Self::Bsp(BspSchema::Legacy) => ArenaBudget::LEGACY_BSP,
			Self::Bsp(BspSchema::Extended) => ArenaBudget::EXTENDED_BSP,
			Self::Md3 => ArenaBudget::MD3,
			Self::Sp2 => ArenaBudget::SP2,
		}
	}
}
