//! The lump directory at the start of a BSP file, and the checks every lump goes through before it is read.

use q2model_macros::BspValue;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator};

use crate::{
	reader::{BspSchema, BspValue, ByteReader, ParseContext},
	ModelError, ModelResult,
};

/// Every lump a Quake 2 BSP carries, in directory order.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumCount, strum::EnumIter, strum::IntoStaticStr, strum::FromRepr,
)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(usize)]
pub enum LumpKind {
	Entities = 0,
	Planes = 1,
	Vertices = 2,
	Visibility = 3,
	Nodes = 4,
	TexInfo = 5,
	Faces = 6,
	Lighting = 7,
	Leaves = 8,
	LeafFaces = 9,
	LeafBrushes = 10,
	Edges = 11,
	SurfEdges = 12,
	Models = 13,
	Brushes = 14,
	BrushSides = 15,
	Pop = 16,
	Areas = 17,
	AreaPortals = 18,
}

impl LumpKind {
	/// The fewest elements a loadable map may have in this lump.
	pub const fn min_count(self) -> usize {
		match self {
			Self::Vertices => 4,
			Self::Edges | Self::SurfEdges | Self::Planes | Self::TexInfo | Self::Faces | Self::Leaves | Self::Nodes | Self::Models => 1,
			_ => 0,
		}
	}

	/// Exclusive upper bound on the element count (bytes for lighting and visibility), or `None` for lumps that are never loaded.
	pub const fn limit(self, schema: BspSchema) -> Option<usize> {
		let legacy = matches!(schema, BspSchema::Legacy);
		Some(match self {
			Self::Models => if legacy { 1024 } else { 131072 },
			Self::Brushes => if legacy { 8192 } else { 1048576 },
			Self::BrushSides => if legacy { 65536 } else { 4194304 },
			Self::TexInfo => if legacy { 8192 } else { 1048576 },
			Self::Planes | Self::Nodes | Self::Leaves | Self::Faces | Self::LeafFaces | Self::LeafBrushes => {
				if legacy { 65536 } else { 1048576 }
			}
			Self::Vertices => if legacy { 65536 } else { 4194304 },
			Self::Edges => if legacy { 128000 } else { 1048576 },
			Self::SurfEdges => if legacy { 256000 } else { 4194304 },
			Self::Lighting => if legacy { 0x200000 } else { 54525952 },
			Self::Visibility => if legacy { 0x100000 } else { 0x8000000 },
			Self::Entities | Self::Pop | Self::Areas | Self::AreaPortals => return None,
		})
	}
}

/// Points to the chunk of data in the file a lump resides in.
#[derive(BspValue, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LumpEntry {
	pub offset: u32,
	pub len: u32,
}

impl LumpEntry {
	/// Checks this entry against the size of the file and the element layout of `kind`, returning the element count.
	///
	/// An `element_size` of 0 counts raw bytes.
	pub fn validate(&self, kind: LumpKind, schema: BspSchema, element_size: usize, file_len: usize) -> ModelResult<usize> {
		let (offset, len) = (self.offset as usize, self.len as usize);

		if offset.checked_add(len).is_none_or(|end| end > file_len) {
			return Err(ModelError::LumpOutOfBounds { kind, entry: *self, file_len });
		}

		let count = if element_size == 0 {
			len
		} else {
			if len % element_size != 0 {
				return Err(ModelError::LumpSizeNotMultiple { kind, len, element_size });
			}
			len / element_size
		};

		let min = kind.min_count();
		if count < min {
			return Err(ModelError::TooFewElements { kind, count, min });
		}
		if let Some(limit) = kind.limit(schema) {
			if count >= limit {
				return Err(ModelError::TooManyElements { kind, count, limit });
			}
		}

		Ok(count)
	}

	/// Returns the slice of `data` (BSP file input) that this entry points to.
	pub fn get<'a>(&self, kind: LumpKind, data: &'a [u8]) -> ModelResult<&'a [u8]> {
		let from = self.offset as usize;
		from.checked_add(self.len as usize)
			.and_then(|to| data.get(from..to))
			.ok_or(ModelError::LumpOutOfBounds {
				kind,
				entry: *self,
				file_len: data.len(),
			})
	}
}

/// Contains the list of lump entries, indexed by [`LumpKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LumpDirectory {
	pub entries: [LumpEntry; LumpKind::COUNT],
}

impl LumpDirectory {
	#[inline]
	pub fn get(&self, kind: LumpKind) -> LumpEntry {
		self.entries[kind as usize]
	}

	/// Iterates every lump along with its entry.
	pub fn iter(&self) -> impl Iterator<Item = (LumpKind, LumpEntry)> + '_ {
		LumpKind::iter().map(|kind| (kind, self.get(kind)))
	}
}

impl BspValue for LumpDirectory {
	fn bsp_parse(reader: &mut ByteReader) -> ModelResult<Self> {
		Ok(Self { entries: reader.read()? })
	}

	fn bsp_struct_size(ctx: &ParseContext) -> usize {
		LumpEntry::bsp_struct_size(ctx) * LumpKind::COUNT
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const PLANE_SIZE: usize = 20;

	#[test]
	fn directory_order() {
		assert_eq!(LumpKind::COUNT, 19);
		assert_eq!(LumpKind::from_repr(12), Some(LumpKind::SurfEdges));
		assert_eq!(LumpKind::iter().position(|kind| kind == LumpKind::Lighting), Some(7));
		let name: &'static str = LumpKind::AreaPortals.into();
		assert_eq!(name, "AreaPortals");
	}

	#[test]
	fn min_count_boundary() {
		let min = LumpKind::Vertices.min_count();
		let entry = |count: usize| LumpEntry { offset: 0, len: (count * 12) as u32 };

		assert_eq!(entry(min).validate(LumpKind::Vertices, BspSchema::Legacy, 12, 1024).unwrap(), min);
		assert!(matches!(
			entry(min - 1).validate(LumpKind::Vertices, BspSchema::Legacy, 12, 1024),
			Err(ModelError::TooFewElements { count: 3, min: 4, .. })
		));
	}

	#[test]
	fn ceiling_boundary() {
		for schema in [BspSchema::Legacy, BspSchema::Extended] {
			let limit = LumpKind::Planes.limit(schema).unwrap();
			let file_len = limit * PLANE_SIZE;

			let at_limit = LumpEntry { offset: 0, len: file_len as u32 };
			assert!(matches!(
				at_limit.validate(LumpKind::Planes, schema, PLANE_SIZE, file_len),
				Err(ModelError::TooManyElements { .. })
			));

			let below = LumpEntry { offset: 0, len: (file_len - PLANE_SIZE) as u32 };
			assert_eq!(below.validate(LumpKind::Planes, schema, PLANE_SIZE, file_len).unwrap(), limit - 1);
		}
	}

	#[test]
	fn funny_size_and_bounds() {
		let entry = LumpEntry { offset: 8, len: 30 };
		assert!(matches!(
			entry.validate(LumpKind::Planes, BspSchema::Legacy, PLANE_SIZE, 100),
			Err(ModelError::LumpSizeNotMultiple { len: 30, .. })
		));
		assert!(matches!(
			entry.validate(LumpKind::Planes, BspSchema::Legacy, PLANE_SIZE, 37),
			Err(ModelError::LumpOutOfBounds { .. })
		));
		// Ending exactly at the end of the file is fine.
		let entry = LumpEntry { offset: 60, len: 40 };
		assert_eq!(entry.validate(LumpKind::Planes, BspSchema::Legacy, PLANE_SIZE, 100).unwrap(), 2);

		let overflow = LumpEntry { offset: u32::MAX, len: u32::MAX };
		assert!(overflow.get(LumpKind::Planes, &[0; 16]).is_err());
	}

	#[test]
	fn byte_lumps() {
		let entry = LumpEntry { offset: 0, len: 7 };
		assert_eq!(entry.validate(LumpKind::Lighting, BspSchema::Legacy, 0, 7).unwrap(), 7);
		assert_eq!(entry.validate(LumpKind::Visibility, BspSchema::Extended, 1, 7).unwrap(), 7);
	}
}
