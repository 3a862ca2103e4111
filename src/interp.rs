//! Keyframe interpolation for MD3 meshes: packed normal decoding, vertex and tag blending, and vertex shading.

use std::{f32::consts::PI, sync::LazyLock};

use glam::Vec3;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::md3::{Md3Tag, Md3XyzNormal};

pub const FUNC_TABLE_SIZE: usize = 1024;
pub const FUNC_TABLE_MASK: usize = FUNC_TABLE_SIZE - 1;

/// Scale from stored MD3 vertex units to world units.
pub const XYZ_SCALE: f32 = 1. / 64.;

/// One period of `sin`, sampled so the last entry lands on a full turn.
pub static SIN_TABLE: LazyLock<[f32; FUNC_TABLE_SIZE]> = LazyLock::new(|| {
	std::array::from_fn(|i| (i as f32 * 360. / (FUNC_TABLE_SIZE - 1) as f32).to_radians().sin())
});

/// Splits a packed normal into its latitude and longitude bytes.
#[inline]
fn lat_lng(packed: i16) -> (usize, usize) {
	let packed = packed as u16;
	(((packed >> 8) & 0xff) as usize, (packed & 0xff) as usize)
}

/// Decodes a packed lat/long normal through [`SIN_TABLE`].
pub fn decode_normal_fast(packed: i16) -> Vec3 {
	let (lat, lng) = lat_lng(packed);
	let (lat, lng) = (lat * (FUNC_TABLE_SIZE / 256), lng * (FUNC_TABLE_SIZE / 256));
	let sin = &*SIN_TABLE;

	Vec3::new(
		sin[(lat + FUNC_TABLE_SIZE / 4) & FUNC_TABLE_MASK] * sin[lng],
		sin[lat] * sin[lng],
		sin[(lng + FUNC_TABLE_SIZE / 4) & FUNC_TABLE_MASK],
	)
}

/// Decodes a packed lat/long normal with real trigonometry.
pub fn decode_normal_exact(packed: i16) -> Vec3 {
	let (lat, lng) = lat_lng(packed);
	let (lat, lng) = (lat as f32 * PI / 128., lng as f32 * PI / 128.);

	Vec3::new(lat.cos() * lng.sin(), lat.sin() * lng.sin(), lng.cos())
}

/// A vertex blended between two keyframes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LerpedVertex {
	/// In world units.
	pub position: Vec3,
	/// Not renormalized after blending.
	pub normal: Vec3,
}

/// Blends a vertex from `old` at `t = 0` to `new` at `t = 1`.
pub fn lerp_vertex(t: f32, old: &Md3XyzNormal, new: &Md3XyzNormal) -> LerpedVertex {
	let p1 = old.xyz.as_vec3();
	let p2 = new.xyz.as_vec3();
	let n1 = decode_normal_fast(old.normal);
	let n2 = decode_normal_fast(new.normal);

	LerpedVertex {
		position: (p1 + t * (p2 - p1)) / 64.,
		normal: n1 + t * (n2 - n1),
	}
}

/// An attachment point: origin plus three axes.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Orientation {
	pub origin: Vec3,
	pub axis: [Vec3; 3],
}

impl Orientation {
	pub const IDENTITY: Self = Self {
		origin: Vec3::ZERO,
		axis: [Vec3::X, Vec3::Y, Vec3::Z],
	};
}

impl Default for Orientation {
	fn default() -> Self {
		Self::IDENTITY
	}
}

/// Blends two tags, renormalizing each axis afterwards.
pub fn lerp_tag(start: &Md3Tag, end: &Md3Tag, frac: f32) -> Orientation {
	let back = 1. - frac;
	let blend = |a: Vec3, b: Vec3| a * back + b * frac;

	Orientation {
		origin: blend(start.origin, end.origin),
		axis: std::array::from_fn(|i| blend(start.axis[i], end.axis[i]).normalize_or_zero()),
	}
}

/// Half-lambert shading term, keeping models from going fully dark on their unlit side.
#[inline]
pub fn half_lambert(normal: Vec3, shade_vector: Vec3) -> f32 {
	(1. + normal.dot(shade_vector)).clamp(0., 1.)
}

#[cfg(test)]
mod tests {
	use super::*;
	use glam::I16Vec3;

	fn pack(lat: u8, lng: u8) -> i16 {
		(((lat as u16) << 8) | lng as u16) as i16
	}

	#[test]
	fn sin_table_shape() {
		assert_eq!(SIN_TABLE[0], 0.);
		assert!((SIN_TABLE[FUNC_TABLE_SIZE / 4] - 1.).abs() < 0.01);
		assert!(SIN_TABLE[FUNC_TABLE_MASK].abs() < 1e-5);
	}

	#[test]
	fn decoders_agree() {
		for (lat, lng) in [(0, 0), (0, 64), (64, 64), (128, 32), (200, 100), (255, 255)] {
			let fast = decode_normal_fast(pack(lat, lng));
			let exact = decode_normal_exact(pack(lat, lng));
			assert!(fast.distance(exact) < 0.02, "{lat} {lng}: {fast} vs {exact}");
		}

		// Straight up.
		assert!(decode_normal_exact(pack(0, 0)).distance(Vec3::Z) < 1e-6);
		// lng = 64 lies on the equator, lat = 0 points along +X.
		assert!(decode_normal_exact(pack(0, 64)).distance(Vec3::X) < 1e-6);
	}

	#[test]
	fn vertex_endpoints_are_exact() {
		let old = Md3XyzNormal {
			xyz: I16Vec3::new(64, -128, 1000),
			normal: pack(0, 0),
		};
		let new = Md3XyzNormal {
			xyz: I16Vec3::new(-3200, 17, i16::MAX),
			normal: pack(64, 64),
		};

		let start = lerp_vertex(0., &old, &new);
		assert_eq!(start.position, old.xyz.as_vec3() / 64.);
		assert_eq!(start.normal, decode_normal_fast(old.normal));

		let end = lerp_vertex(1., &old, &new);
		assert_eq!(end.position, new.xyz.as_vec3() / 64.);
		assert_eq!(end.position * 64., new.xyz.as_vec3());
	}

	#[test]
	fn tag_axes_stay_unit() {
		let start = Md3Tag {
			name: "tag_weapon".into(),
			origin: Vec3::ZERO,
			axis: [Vec3::X, Vec3::Y, Vec3::Z],
		};
		// Rotated 90 degrees about Z.
		let end = Md3Tag {
			name: "tag_weapon".into(),
			origin: Vec3::new(10., 0., 4.),
			axis: [Vec3::Y, Vec3::NEG_X, Vec3::Z],
		};

		for i in 0..=10 {
			let t = i as f32 / 10.;
			let orientation = lerp_tag(&start, &end, t);
			for axis in orientation.axis {
				assert!((axis.length() - 1.).abs() < 1e-5, "t = {t}: {axis}");
			}
		}
		assert_eq!(lerp_tag(&start, &end, 0.5).origin, Vec3::new(5., 0., 2.));
	}

	#[test]
	fn shading_is_clamped() {
		assert_eq!(half_lambert(Vec3::Z, Vec3::Z), 1.);
		assert_eq!(half_lambert(Vec3::Z, Vec3::NEG_Z), 0.);
		assert_eq!(half_lambert(Vec3::Z, Vec3::new(0., 0., -0.5)), 0.5);
		assert_eq!(half_lambert(Vec3::Z, Vec3::X), 1.);
	}
}
