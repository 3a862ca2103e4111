//! Data definitions for faces, edges and inline models.

use glam::Vec3;
use q2model_macros::BspValue;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
	data::{
		nodes::FloatBoundingBox,
		util::{IBspValue, UBspValue},
	},
	reader::{BspValue, ByteReader, ParseContext},
	ModelResult,
};

/// A single model in the BSP file. Model 0 is the world, other models
/// are used for entities using `*N` where N is the model number.
#[derive(BspValue, Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BspModel {
	/// The bounding box of the model. Always floating-point-based.
	pub bound: FloatBoundingBox,

	/// Origin of model, usually (0,0,0)
	pub origin: Vec3,

	/// Root node of the model's subtree.
	pub head_node: i32,

	/// The first face in the model.
	pub first_face: i32,

	/// The total number of faces in the model.
	pub num_faces: i32,
}

/// A single edge in a BSP model.
#[derive(BspValue, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BspEdge {
	/// The index to the first vertex this edge connects
	pub a: UBspValue,
	/// The index to the second vertex this edge connects
	pub b: UBspValue,
}

/// A face record as it appears in the face lump.
#[derive(BspValue, Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BspFace {
	/// Index of the plane the face is parallel to
	pub plane_idx: UBspValue,
	/// If not zero, the face lies on the back of its plane
	pub plane_side: IBspValue,

	/// Index of the first edge (in the face edge array)
	pub first_edge: i32,
	/// Number of consecutive edges (in the face edge array)
	pub num_edges: IBspValue,

	/// Index of the texture info structure
	pub texture_info_idx: IBspValue,

	/// Each face can have up to 4 lightmaps, the additional 3 are positioned right after the lightmap at `lightmap_offset`.
	///
	/// You can short-circuit when looping through these styles, if `lightmap_styles[2]` is 255, there isn't a possibility that `lightmap_styles[3]` isn't.
	pub lightmap_styles: [LightmapStyle; 4],

	/// Byte offset of the lightmap in the lighting lump, or -1 if no lightmap.
	pub lightmap_offset: i32,
}

/// Lightmap animation style of a face.
///
/// - 255 means there is no lightmap.
/// - 0 means normal, unanimated lightmap.
/// - 1 through 254 are programmer-defined animated styles, including togglable lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LightmapStyle(pub u8);

impl LightmapStyle {
	/// Unanimated lightmap.
	pub const NORMAL: Self = Self(0);
	/// No lightmap.
	pub const NONE: Self = Self(u8::MAX);
}

impl BspValue for LightmapStyle {
	#[inline]
	fn bsp_parse(reader: &mut ByteReader) -> ModelResult<Self> {
		reader.read().map(Self)
	}

	#[inline]
	fn bsp_struct_size(_ctx: &ParseContext) -> usize {
		1
	}
}

impl std::fmt::Display for LightmapStyle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.0 {
			0 => write!(f, "0 (normal)"),
			255 => write!(f, "255 (no lightmap)"),
			n => n.fmt(f),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::reader::BspSchema;

	#[test]
	fn record_sizes() {
		let legacy = ParseContext::new(BspSchema::Legacy);
		let extended = ParseContext::new(BspSchema::Extended);

		assert_eq!(BspFace::bsp_struct_size(&legacy), 20);
		assert_eq!(BspFace::bsp_struct_size(&extended), 28);
		assert_eq!(BspEdge::bsp_struct_size(&legacy), 4);
		assert_eq!(BspEdge::bsp_struct_size(&extended), 8);
		assert_eq!(BspModel::bsp_struct_size(&legacy), 48);
		assert_eq!(BspModel::bsp_struct_size(&extended), 48);
	}

	#[test]
	fn style_display() {
		assert_eq!(LightmapStyle::NORMAL.to_string(), "0 (normal)");
		assert_eq!(LightmapStyle::NONE.to_string(), "255 (no lightmap)");
		assert_eq!(LightmapStyle(3).to_string(), "3");
	}
}
