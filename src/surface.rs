//! Per-surface data derived while loading the face lump.

use bitflags::bitflags;
use glam::{IVec2, Vec3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
	world::{Edge, Plane, Surface, TexInfo},
	ModelError, ModelResult,
};

bitflags! {
	/// Render-time surface flags, set while loading.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
	pub struct SurfaceFlags: u32 {
		/// The surface faces the back of its plane.
		const PLANE_BACK = 0x2;
		const DRAW_SKY = 0x4;
		/// Warped liquid, drawn with turbulence instead of a lightmap.
		const DRAW_TURB = 0x10;
		const DRAW_TRANSLUCENT = 0x20;
	}
}

/// Lightmap-space rectangle of a surface, in texels, snapped to 16-unit cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SurfaceExtents {
	pub texture_mins: IVec2,
	pub extents: IVec2,
}

impl SurfaceExtents {
	/// Extents given to warped surfaces, large enough to never be clipped.
	pub const WARP: Self = Self {
		texture_mins: IVec2::splat(-8192),
		extents: IVec2::splat(16384),
	};

	/// Size of the surface's lightmap in luxels, one per 16 texels plus the edge.
	pub fn lightmap_size(&self) -> IVec2 {
		(self.extents >> 4) + 1
	}
}

/// Borrowed view of the already loaded world arrays, given to the [`SurfaceBuilder`](crate::services::SurfaceBuilder)
/// while surfaces are still being created.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceContext<'a> {
	pub vertices: &'a [Vec3],
	pub edges: &'a [Edge],
	pub surface_edges: &'a [i32],
	pub planes: &'a [Plane],
	pub tex_info: &'a [TexInfo],
	pub light_data: Option<&'a [u8]>,
}

impl<'a> SurfaceContext<'a> {
	/// The vertex a surface edge starts at. Negative surface edges walk their edge backwards.
	pub fn surface_edge_vertex(&self, surface_edge: i32) -> Option<Vec3> {
		let edge = self.edges.get(surface_edge.unsigned_abs() as usize)?;
		let vertex = if surface_edge.is_negative() { edge.v[1] } else { edge.v[0] };
		self.vertices.get(vertex as usize).copied()
	}

	/// The vertex positions around a run of surface edges, in winding order.
	pub fn winding(&self, first_edge: u32, num_edges: u32) -> impl Iterator<Item = Vec3> + 'a {
		let ctx = *self;
		let surface_edges = ctx
			.surface_edges
			.get(first_edge as usize..(first_edge as usize).saturating_add(num_edges as usize))
			.unwrap_or_default();
		surface_edges.iter().filter_map(move |e| ctx.surface_edge_vertex(*e))
	}

	/// The vertex positions of a loaded surface, in winding order.
	pub fn surface_vertices(&self, surface: &Surface) -> impl Iterator<Item = Vec3> + 'a {
		self.winding(surface.first_edge, surface.num_edges)
	}

	/// The raw lighting samples of `surface`, from its first style on.
	pub fn samples(&self, surface: &Surface) -> Option<&'a [u8]> {
		self.light_data?.get(surface.samples?..)
	}
}

/// Computes the texture-space extents of the polygon formed by `num_edges` surface edges starting at `first_edge`.
///
/// Projections are evaluated in double precision and stored back as single, then snapped outward to multiples of 16.
pub fn calc_surface_extents(ctx: &SurfaceContext, first_edge: u32, num_edges: u32, tex_info: &TexInfo) -> ModelResult<SurfaceExtents> {
	let mut mins = [999999f32; 2];
	let mut maxs = [-99999f32; 2];

	for i in 0..num_edges as usize {
		let index = first_edge as usize + i;
		let surface_edge = *ctx.surface_edges.get(index).ok_or(ModelError::IndexOutOfRange {
			what: "surface edge",
			index: index as i64,
			count: ctx.surface_edges.len(),
		})?;
		let vertex = ctx.surface_edge_vertex(surface_edge).ok_or(ModelError::IndexOutOfRange {
			what: "edge",
			index: surface_edge as i64,
			count: ctx.edges.len(),
		})?;

		let projected = tex_info.projection.project_f64(vertex);
		for j in 0..2 {
			let val = projected[j];
			if val < mins[j] as f64 {
				mins[j] = val as f32;
			}
			if val > maxs[j] as f64 {
				maxs[j] = val as f32;
			}
		}
	}

	let bmins = IVec2::new((mins[0] / 16.).floor() as i32, (mins[1] / 16.).floor() as i32);
	let bmaxs = IVec2::new((maxs[0] / 16.).ceil() as i32, (maxs[1] / 16.).ceil() as i32);

	Ok(SurfaceExtents {
		texture_mins: bmins * 16,
		extents: (bmaxs - bmins) * 16,
	})
}
