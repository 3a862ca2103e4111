//! Data definitions for texture projections and surface flags.

use bitflags::bitflags;
use glam::{dvec2, Vec2, Vec3};
use q2model_macros::BspValue;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
	data::util::FixedStr,
	reader::{BspValue, ByteReader, ParseContext},
	ModelResult,
};

/// A texture info record as it appears in the texinfo lump.
#[derive(BspValue, Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BspTexInfo {
	pub projection: PlanarTextureProjection,

	pub flags: BspSurfaceFlags,

	/// Light emission value, mostly meaningful with [`BspSurfaceFlags::LIGHT`].
	pub value: i32,

	/// The name of the texture, relative to `textures/` and without extension.
	pub texture: FixedStr<32>,

	/// Next texinfo in an animation chain, or `<= 0` for none.
	pub next: i32,
}

bitflags! {
	/// Quake 2 surface flags, plus the common engine extensions.
	#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
	#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
	#[repr(transparent)]
	pub struct BspSurfaceFlags: u32 {
		/// Value will hold the light strength
		const LIGHT = 0x1;
		/// Affects game physics
		const SLICK = 0x2;
		/// Don't draw, but add to skybox
		const SKY = 0x4;
		/// Turbulent water warp
		const WARP = 0x8;
		const TRANS33 = 0x10;
		const TRANS66 = 0x20;
		/// Scroll towards angle
		const FLOWING = 0x40;
		/// Don't bother referencing the texture
		const NO_DRAW = 0x80;
		/// Make a primary bsp splitter
		const HINT = 0x100;
		/// Completely ignore, allowing non-closed brushes
		const SKIP = 0x200;

		const ALPHA_TEST = 1 << 25;
		const N64_UV = 1 << 28;
		const SCROLL_X = 1 << 29;
		const SCROLL_Y = 1 << 30;
		const SCROLL_FLIP = 1 << 31;

		const _ = !0;
	}
}

impl BspSurfaceFlags {
	/// Surfaces with any of these flags never get a lightmap.
	pub const UNLIT: Self = Self::SKY.union(Self::TRANS33).union(Self::TRANS66).union(Self::WARP);
}

impl BspValue for BspSurfaceFlags {
	fn bsp_parse(reader: &mut ByteReader) -> ModelResult<Self> {
		u32::bsp_parse(reader).map(BspSurfaceFlags::from_bits_retain)
	}

	fn bsp_struct_size(ctx: &ParseContext) -> usize {
		u32::bsp_struct_size(ctx)
	}
}

/// Texture projection information.
#[derive(BspValue, Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlanarTextureProjection {
	pub u_axis: Vec3,
	pub u_offset: f32,

	pub v_axis: Vec3,
	pub v_offset: f32,
}

impl PlanarTextureProjection {
	/// Projects a position onto this plane.
	///
	/// Converts to double for calculation to minimise floating-point imprecision.
	pub fn project(&self, point: Vec3) -> Vec2 {
		self.project_f64(point).as_vec2()
	}

	/// Like [`Self::project`], without rounding the result back down to `f32`.
	pub fn project_f64(&self, point: Vec3) -> glam::DVec2 {
		dvec2(
			point.as_dvec3().dot(self.u_axis.as_dvec3()) + self.u_offset as f64,
			point.as_dvec3().dot(self.v_axis.as_dvec3()) + self.v_offset as f64,
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::reader::BspSchema;

	#[test]
	fn texinfo_size() {
		assert_eq!(BspTexInfo::bsp_struct_size(&ParseContext::new(BspSchema::Legacy)), 76);
		assert_eq!(BspTexInfo::bsp_struct_size(&ParseContext::new(BspSchema::Extended)), 76);
	}

	#[test]
	fn projection() {
		let projection = PlanarTextureProjection {
			u_axis: Vec3::X,
			u_offset: 8.,
			v_axis: Vec3::NEG_Z,
			v_offset: 0.,
		};
		assert_eq!(projection.project(Vec3::new(16., 5., 32.)), Vec2::new(24., -32.));
	}

	#[test]
	fn extension_bits() {
		let flags = BspSurfaceFlags::from_bits_retain(0x8000_0008);
		assert!(flags.contains(BspSurfaceFlags::WARP | BspSurfaceFlags::SCROLL_FLIP));
		assert!(flags.intersects(BspSurfaceFlags::UNLIT));
	}
}
