//! Module containing the core of reading binary model files and interpreting them into structured data.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::mem;

use crate::{ModelError, ModelResult};

use glam::{I16Vec3, IVec3, UVec3, Vec2, Vec3};

/// Like a [`Cursor`](std::io::Cursor), but i don't have to constantly juggle buffers.
#[derive(Clone)]
pub struct ByteReader<'a> {
	pub ctx: &'a ParseContext,
	bytes: &'a [u8],
	pos: usize,
}

impl<'a> ByteReader<'a> {
	#[inline]
	pub fn new(bytes: &'a [u8], ctx: &'a ParseContext) -> Self {
		Self { ctx, bytes, pos: 0 }
	}

	fn rest(&self) -> &[u8] {
		self.bytes.get(self.pos..).unwrap_or_default()
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.rest().len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.rest().is_empty()
	}

	#[inline]
	pub fn read<T: BspValue>(&mut self) -> ModelResult<T> {
		T::bsp_parse(self)
	}

	/// Reads `count` consecutive values of type `T`.
	pub fn read_many<T: BspValue>(&mut self, count: usize) -> ModelResult<Vec<T>> {
		let size = T::bsp_struct_size(self.ctx);
		if count.saturating_mul(size) > self.len() {
			return Err(ModelError::BufferOutOfBounds {
				from: self.pos,
				to: self.pos.saturating_add(count.saturating_mul(size)),
				size: self.bytes.len(),
			});
		}

		let mut out = Vec::with_capacity(count);
		for _ in 0..count {
			out.push(self.read()?);
		}
		Ok(out)
	}

	/// Consume the rest of the reader, returning all remaining bytes.
	#[inline]
	pub fn read_rest(&mut self) -> &[u8] {
		let pos = self.pos.min(self.bytes.len());
		self.pos = self.bytes.len();

		&self.bytes[pos..]
	}

	#[inline]
	pub fn read_bytes(&mut self, count: usize) -> ModelResult<&[u8]> {
		let (from, to) = (self.pos, self.pos.saturating_add(count));
		if to > self.bytes.len() {
			return Err(ModelError::BufferOutOfBounds {
				from,
				to,
				size: self.bytes.len(),
			});
		}
		let bytes = &self.bytes[from..to];
		self.pos += count;
		Ok(bytes)
	}

	#[inline]
	pub fn with_pos(&self, pos: usize) -> Self {
		Self {
			ctx: self.ctx,
			bytes: self.bytes,
			pos,
		}
	}

	#[inline]
	pub fn pos(&self) -> usize {
		self.pos
	}
}

/// Defines how a type should be read from a model file.
pub trait BspValue: Sized {
	fn bsp_parse(reader: &mut ByteReader) -> ModelResult<Self>;
	fn bsp_struct_size(ctx: &ParseContext) -> usize;
}

macro_rules! impl_bsp_parse_primitive {
	($ty:ty) => {
		impl BspValue for $ty {
			#[inline]
			fn bsp_parse(reader: &mut ByteReader) -> ModelResult<Self> {
				let mut bytes = [0; size_of::<$ty>()];
				bytes.copy_from_slice(reader.read_bytes(size_of::<$ty>())?);
				Ok(<$ty>::from_le_bytes(bytes))
			}
			#[inline]
			fn bsp_struct_size(_ctx: &ParseContext) -> usize {
				size_of::<$ty>()
			}
		}
	};
}

macro_rules! impl_bsp_parse_vector {
	($ty:ty : [$element:ty; $count:expr]) => {
		impl BspValue for $ty {
			fn bsp_parse(reader: &mut ByteReader) -> ModelResult<Self> {
				Ok(<$ty>::from_array(reader.read::<[$element; $count]>()?))
			}
			fn bsp_struct_size(_ctx: &ParseContext) -> usize {
				size_of::<$element>() * $count
			}
		}
	};
}

impl_bsp_parse_primitive!(u16);
impl_bsp_parse_primitive!(u32);

impl_bsp_parse_primitive!(i16);
impl_bsp_parse_primitive!(i32);

impl_bsp_parse_primitive!(f32);

impl BspValue for u8 {
	#[inline]
	fn bsp_parse(reader: &mut ByteReader) -> ModelResult<Self> {
		reader.read_bytes(1).map(|bytes| bytes[0])
	}
	#[inline]
	fn bsp_struct_size(_ctx: &ParseContext) -> usize {
		1
	}
}

impl_bsp_parse_vector!(Vec2: [f32; 2]);
impl_bsp_parse_vector!(Vec3: [f32; 3]);
impl_bsp_parse_vector!(IVec3: [i32; 3]);
impl_bsp_parse_vector!(UVec3: [u32; 3]);
impl_bsp_parse_vector!(I16Vec3: [i16; 3]);

impl<T: BspValue, const N: usize> BspValue for [T; N] {
	#[inline]
	fn bsp_parse(reader: &mut ByteReader) -> ModelResult<Self> {
		// Look ma, no heap allocations!
		let mut out = [(); N].map(|_| mem::MaybeUninit::uninit());
		for (i, slot) in out.iter_mut().enumerate() {
			match reader.read() {
				Ok(value) => {
					slot.write(value);
				}
				Err(err) => {
					// Drop what has been written so far before bailing.
					for written in &mut out[..i] {
						unsafe { written.assume_init_drop() };
					}
					return Err(err);
				}
			}
		}
		Ok(out.map(|v| unsafe { v.assume_init() }))
	}
	#[inline]
	fn bsp_struct_size(ctx: &ParseContext) -> usize {
		T::bsp_struct_size(ctx) * N
	}
}

/// A value in a BSP file where its size differs between schemas. Should be implemented for the "output type", that
/// will be the final type exposed after loading.
pub trait BspVariableValue: Sized {
	/// The on-disk type in the original IBSP layout, where most indices and bounds are 16-bit.
	type Legacy: BspValue + Into<Self>;
	/// The on-disk type in the QBSP layout, widened to 32-bit indices and float bounds.
	type Extended: BspValue + Into<Self>;
}

impl<T> BspValue for T
where
	T: BspVariableValue,
{
	fn bsp_parse(reader: &mut ByteReader) -> ModelResult<Self> {
		match reader.ctx.schema {
			BspSchema::Legacy => T::Legacy::bsp_parse(reader).map(Into::into),
			BspSchema::Extended => T::Extended::bsp_parse(reader).map(Into::into),
		}
	}

	fn bsp_struct_size(ctx: &ParseContext) -> usize {
		match ctx.schema {
			BspSchema::Legacy => T::Legacy::bsp_struct_size(ctx),
			BspSchema::Extended => T::Extended::bsp_struct_size(ctx),
		}
	}
}

/// Which record layout a BSP file uses. Fixed per file by its magic number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BspSchema {
	/// `IBSP`, 16-bit indices and short bounding boxes.
	#[default]
	Legacy,
	/// `QBSP`, 32-bit indices and float bounding boxes.
	Extended,
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParseContext {
	pub schema: BspSchema,
}

impl ParseContext {
	pub const fn new(schema: BspSchema) -> Self {
		Self { schema }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn variable_width_reads() {
		let bytes = [0x34, 0x12, 0x78, 0x56];
		let legacy = ParseContext::new(BspSchema::Legacy);
		let extended = ParseContext::new(BspSchema::Extended);

		let mut reader = ByteReader::new(&bytes, &legacy);
		assert_eq!(*reader.read::<crate::data::util::UBspValue>().unwrap(), 0x1234);
		assert_eq!(reader.len(), 2);

		let mut reader = ByteReader::new(&bytes, &extended);
		assert_eq!(*reader.read::<crate::data::util::UBspValue>().unwrap(), 0x5678_1234);
		assert!(reader.is_empty());
	}

	#[test]
	fn out_of_bounds_read() {
		let ctx = ParseContext::default();
		let mut reader = ByteReader::new(&[1, 2, 3], &ctx);
		assert!(matches!(
			reader.read::<u32>(),
			Err(ModelError::BufferOutOfBounds { from: 0, to: 4, size: 3 })
		));
		assert!(reader.read_many::<u16>(2).is_err());
		assert_eq!(reader.read_many::<u8>(3).unwrap(), vec![1, 2, 3]);
	}
}
