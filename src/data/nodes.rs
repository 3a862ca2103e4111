//! Data definitions for the BSP node tree.

use glam::{I16Vec3, Vec3};
use q2model_macros::BspValue;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use bitflags::bitflags;

use crate::{
	data::util::{IBspValue, UBspValue},
	reader::{BspValue, BspVariableValue, ByteReader, ParseContext},
	ModelResult,
};

/// A reference to a [`BspNode`] or a leaf.
///
/// Reads an `i32`. Negative indices are treated as a leaf index of `-1 - signed_node_ref`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BspNodeRef<T = u32> {
	/// A reference to a node.
	Node(T),
	/// A reference to a leaf.
	Leaf(T),
}

impl BspValue for BspNodeRef<u32> {
	fn bsp_parse(reader: &mut ByteReader) -> ModelResult<Self> {
		Ok(BspNodeRef::from_i32(i32::bsp_parse(reader)?))
	}

	fn bsp_struct_size(ctx: &ParseContext) -> usize {
		i32::bsp_struct_size(ctx)
	}
}

impl<T> BspNodeRef<T>
where
	T: Copy,
{
	/// If this reference points to a node, get the index of the node.
	pub fn node(&self) -> Option<T> {
		match *self {
			Self::Node(i) => Some(i),
			Self::Leaf(_) => None,
		}
	}

	/// If this reference points to a leaf, get the index of the leaf.
	pub fn leaf(&self) -> Option<T> {
		match *self {
			Self::Leaf(i) => Some(i),
			Self::Node(_) => None,
		}
	}
}

impl From<i32> for BspNodeRef {
	fn from(value: i32) -> Self {
		Self::from_i32(value)
	}
}

impl BspNodeRef<u32> {
	/// Create a `BspNodeRef` from an `i32`. Negative indices are treated as a leaf index of `-1 - signed_node_ref`.
	pub const fn from_i32(value: i32) -> Self {
		if value.is_negative() {
			// Bitwise not handles integer asymmetry and overflow.
			Self::Leaf(!value as u32)
		} else {
			Self::Node(value as u32)
		}
	}

	/// The signed on-disk encoding of this reference.
	pub const fn to_i32(self) -> i32 {
		match self {
			Self::Node(i) => i as i32,
			Self::Leaf(i) => !(i as i32),
		}
	}
}

bitflags! {
	/// Quake 2 leaf contents. Unknown bits are kept as they appear in the file.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
	#[repr(transparent)]
	pub struct BspLeafContentFlags: u32 {
		// An eye is never valid in a solid
		const SOLID = 0b0000_0000_0000_0000_0000_0000_0000_0001;
		const WINDOW = 0b0000_0000_0000_0000_0000_0000_0000_0010;
		const AUX = 0b0000_0000_0000_0000_0000_0000_0000_0100;
		const LAVA = 0b0000_0000_0000_0000_0000_0000_0000_1000;
		const SLIME = 0b0000_0000_0000_0000_0000_0000_0001_0000;
		const WATER = 0b0000_0000_0000_0000_0000_0000_0010_0000;
		const MIST = 0b0000_0000_0000_0000_0000_0000_0100_0000;

		const AREA_PORTAL = 0b0000_0000_0000_0000_1000_0000_0000_0000;

		const PLAYER_CLIP = 0b0000_0000_0000_0001_0000_0000_0000_0000;
		const MONSTER_CLIP = 0b0000_0000_0000_0010_0000_0000_0000_0000;

		const CURRENT_0 = 0b0000_0000_0000_0100_0000_0000_0000_0000;
		const CURRENT_90 = 0b0000_0000_0000_1000_0000_0000_0000_0000;
		const CURRENT_180 = 0b0000_0000_0001_0000_0000_0000_0000_0000;
		const CURRENT_270 = 0b0000_0000_0010_0000_0000_0000_0000_0000;
		const CURRENT_UP = 0b0000_0000_0100_0000_0000_0000_0000_0000;
		const CURRENT_DOWN = 0b0000_0000_1000_0000_0000_0000_0000_0000;

		// Removed before bsping an entity
		const ORIGIN = 0b0000_0001_0000_0000_0000_0000_0000_0000;

		// Should never be on a brush; only in game
		const MONSTER = 0b0000_0010_0000_0000_0000_0000_0000_0000;
		const DEAD_MONSTER = 0b0000_0100_0000_0000_0000_0000_0000_0000;
		// Brushes not used for the bsp
		const DETAIL = 0b0000_1000_0000_0000_0000_0000_0000_0000;
		// Don't consume surface fragments inside
		const TRANSLUCENT = 0b0001_0000_0000_0000_0000_0000_0000_0000;
		const LADDER = 0b0010_0000_0000_0000_0000_0000_0000_0000;

		const _ = !0;
	}
}

impl BspLeafContentFlags {
	/// Any of the liquid contents.
	pub const LIQUID: Self = Self::LAVA.union(Self::SLIME).union(Self::WATER);
}

impl BspValue for BspLeafContentFlags {
	fn bsp_parse(reader: &mut ByteReader) -> ModelResult<Self> {
		u32::bsp_parse(reader).map(Self::from_bits_retain)
	}

	fn bsp_struct_size(ctx: &ParseContext) -> usize {
		u32::bsp_struct_size(ctx)
	}
}

/// Parses a short-based bounding box in the legacy layout, and a float-based one in the extended layout.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
	pub min: Vec3,
	pub max: Vec3,
}

impl BoundingBox {
	/// Whether `point` lies inside or on the surface of this box.
	pub fn contains(&self, point: Vec3) -> bool {
		point.cmpge(self.min).all() && point.cmple(self.max).all()
	}
}

impl From<FloatBoundingBox> for BoundingBox {
	fn from(value: FloatBoundingBox) -> Self {
		Self {
			min: value.min,
			max: value.max,
		}
	}
}

impl From<ShortBoundingBox> for BoundingBox {
	fn from(value: ShortBoundingBox) -> Self {
		Self {
			min: value.min.as_vec3(),
			max: value.max.as_vec3(),
		}
	}
}

impl BspVariableValue for BoundingBox {
	type Legacy = ShortBoundingBox;
	type Extended = FloatBoundingBox;
}

#[derive(BspValue, Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FloatBoundingBox {
	pub min: Vec3,
	pub max: Vec3,
}

#[derive(BspValue, Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShortBoundingBox {
	pub min: I16Vec3,
	pub max: I16Vec3,
}

/// A node record as it appears in the node lump.
#[derive(BspValue, Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BspNode {
	/// Index of the [`BspPlane`] that splits the node.
	pub plane_idx: u32,

	pub front: BspNodeRef,
	pub back: BspNodeRef,

	/// Bounding box of the node and all its children.
	pub bound: BoundingBox,
	/// Index of the first face the node contains.
	pub face_idx: UBspValue,
	/// Number of faces this node contains.
	pub face_num: UBspValue,
}

/// A leaf record as it appears in the leaf lump.
#[derive(BspValue, Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BspLeaf {
	pub contents: BspLeafContentFlags,

	/// Leafs with the same cluster are considered potentially visible or not as a group. `-1` means no cluster.
	pub cluster: IBspValue,
	pub area: IBspValue,

	/// The AABB bounding box of this leaf.
	pub bound: BoundingBox,

	/// Index in the leaf face (mark surface) list.
	pub face_idx: UBspValue,
	/// Number of elements in the leaf face list.
	pub face_num: UBspValue,

	pub brush_idx: UBspValue,
	pub brush_num: UBspValue,
}

#[derive(BspValue, Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BspPlane {
	pub normal: Vec3,
	pub dist: f32,
	/// Axis classification of the normal, see [`BspPlaneType`]. Kept as stored.
	pub ty: u32,
}

impl BspPlane {
	/// `>0` = front, `<=0` = back
	pub fn point_side(&self, point: Vec3) -> f32 {
		point.dot(self.normal) - self.dist
	}

	/// The axis classification, if the stored value is one of the known ones.
	pub fn plane_type(&self) -> Option<BspPlaneType> {
		BspPlaneType::from_repr(self.ty)
	}

	/// One bit per axis, set when that component of the normal is negative.
	pub fn sign_bits(&self) -> u8 {
		(0..3).filter(|&axis| self.normal[axis] < 0.).fold(0, |bits, axis| bits | (1 << axis))
	}
}

/// Type of plane depending on normal vector.
#[derive(BspValue, Debug, Clone, Copy, PartialEq, Eq, strum::FromRepr)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u32)]
pub enum BspPlaneType {
	/// Axial plane, in X
	AxialX = 0,
	/// Axial plane, in Y
	AxialY = 1,
	/// Axial plane, in Z
	AxialZ = 2,
	/// Non axial plane, roughly toward X
	AroundX = 3,
	/// Non axial plane, roughly toward Y
	AroundY = 4,
	/// Non axial plane, roughly toward Z
	AroundZ = 5,
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::reader::BspSchema;

	#[test]
	fn node_ref_encoding() {
		assert_eq!(BspNodeRef::from_i32(5), BspNodeRef::Node(5));
		assert_eq!(BspNodeRef::from_i32(-1), BspNodeRef::Leaf(0));
		assert_eq!(BspNodeRef::from_i32(-3), BspNodeRef::Leaf(2));
		assert_eq!(BspNodeRef::from_i32(i32::MIN), BspNodeRef::Leaf(i32::MAX as u32));
		assert_eq!(BspNodeRef::Leaf(2).to_i32(), -3);
	}

	#[test]
	fn record_sizes() {
		let legacy = ParseContext::new(BspSchema::Legacy);
		let extended = ParseContext::new(BspSchema::Extended);

		assert_eq!(BspPlane::bsp_struct_size(&legacy), 20);
		assert_eq!(BspNode::bsp_struct_size(&legacy), 28);
		assert_eq!(BspNode::bsp_struct_size(&extended), 44);
		assert_eq!(BspLeaf::bsp_struct_size(&legacy), 28);
		assert_eq!(BspLeaf::bsp_struct_size(&extended), 52);
	}

	#[test]
	fn plane_sign_bits() {
		let plane = BspPlane {
			normal: Vec3::new(-0.6, 0.0, -0.8),
			dist: 0.,
			ty: 5,
		};
		assert_eq!(plane.sign_bits(), 0b101);
		assert_eq!(plane.plane_type(), Some(BspPlaneType::AroundZ));
		assert_eq!(BspPlane { ty: 9, ..plane }.plane_type(), None);
	}

	#[test]
	fn plane_type_parse() {
		let ctx = ParseContext::default();
		let parsed: BspPlaneType = ByteReader::new(&2u32.to_le_bytes(), &ctx).read().unwrap();
		assert_eq!(parsed, BspPlaneType::AxialZ);
		assert!(matches!(
			ByteReader::new(&7u32.to_le_bytes(), &ctx).read::<BspPlaneType>(),
			Err(crate::ModelError::InvalidVariant { value: 7, .. })
		));
	}

	#[test]
	fn unknown_contents_survive() {
		let ctx = ParseContext::default();
		let bits = 0x8000_0001u32;
		let contents: BspLeafContentFlags = ByteReader::new(&bits.to_le_bytes(), &ctx).read().unwrap();
		assert_eq!(contents.bits(), bits);
		assert!(contents.contains(BspLeafContentFlags::SOLID));
	}
}
