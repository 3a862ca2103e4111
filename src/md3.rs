//! MD3 keyframed meshes, parsed eagerly into owned frames, tags and surfaces.

use glam::{I16Vec3, Vec2, Vec3};
use log::{debug, warn};
use q2model_macros::BspValue;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
	arena::Arena,
	data::util::FixedStr,
	interp::{self, LerpedVertex, Orientation},
	reader::{BspValue, ByteReader, ParseContext},
	services::{ImageHandle, ImageKind, ImageService},
	ModelError, ModelResult, ModelResultDoingJobExt,
};

pub const MD3_MAGIC: [u8; 4] = *b"IDP3";
pub const MD3_VERSION: i32 = 15;

pub const MAX_TRIANGLES: usize = 8192;
pub const MAX_VERTS: usize = 4096;
pub const MAX_SHADERS: usize = 256;
pub const MAX_FRAMES: usize = 1024;
pub const MAX_SURFACES: usize = 8;
pub const MAX_TAGS: usize = 16;

/// Level of detail. Only [`Lod::High`] is loaded by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::EnumCount, strum::EnumIter, strum::FromRepr)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(usize)]
pub enum Lod {
	#[default]
	High = 0,
	Medium = 1,
	Low = 2,
}

#[derive(BspValue, Debug, Clone)]
pub struct Md3Header {
	pub magic: [u8; 4],
	pub version: i32,
	pub name: FixedStr<64>,
	pub flags: i32,
	pub num_frames: i32,
	pub num_tags: i32,
	pub num_surfaces: i32,
	pub num_skins: i32,
	pub ofs_frames: i32,
	pub ofs_tags: i32,
	pub ofs_surfaces: i32,
	pub ofs_end: i32,
}

#[derive(BspValue, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Md3Frame {
	pub mins: Vec3,
	pub maxs: Vec3,
	pub local_origin: Vec3,
	pub radius: f32,
	pub name: FixedStr<16>,
}

#[derive(BspValue, Debug, Clone)]
struct Md3TagRecord {
	name: FixedStr<64>,
	origin: Vec3,
	axis: [Vec3; 3],
}

/// A named attachment point in one frame. Names are lowercase.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Md3Tag {
	pub name: String,
	pub origin: Vec3,
	pub axis: [Vec3; 3],
}

#[derive(BspValue, Debug, Clone)]
struct Md3SurfaceHeader {
	magic: [u8; 4],
	name: FixedStr<64>,
	flags: i32,
	num_frames: i32,
	num_shaders: i32,
	num_verts: i32,
	num_triangles: i32,
	ofs_triangles: i32,
	ofs_shaders: i32,
	ofs_st: i32,
	ofs_xyz_normals: i32,
	ofs_end: i32,
}

#[derive(BspValue, Debug, Clone)]
struct Md3ShaderRecord {
	name: FixedStr<64>,
	_shader_index: i32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Md3Shader {
	pub name: String,
	pub image: ImageHandle,
}

/// Compressed vertex: position in 1/64 units and a packed lat/long normal.
#[derive(BspValue, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Md3XyzNormal {
	pub xyz: I16Vec3,
	pub normal: i16,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Md3Surface {
	/// Lowercase, without a trailing `_N` variant suffix.
	pub name: String,
	pub flags: i32,
	pub num_frames: usize,
	pub num_verts: usize,
	pub shaders: Vec<Md3Shader>,
	/// Vertex indices, each checked against `num_verts`.
	pub triangles: Vec<[u32; 3]>,
	/// Texture coordinates, shared by every frame.
	pub st: Vec<Vec2>,
	/// `num_frames * num_verts` vertices, frame by frame.
	pub xyz_normals: Vec<Md3XyzNormal>,
	/// Normals of frame 0, decoded with [`interp::decode_normal_exact`].
	pub normals: Vec<Vec3>,
}

impl Md3Surface {
	/// The vertices of `frame`, or `None` if the frame doesn't exist.
	pub fn frame_vertices(&self, frame: usize) -> Option<&[Md3XyzNormal]> {
		if frame >= self.num_frames {
			return None;
		}
		self.xyz_normals.get(frame * self.num_verts..(frame + 1) * self.num_verts)
	}

	/// Blends vertex `index` between two frames.
	pub fn lerp_vertex(&self, old_frame: usize, frame: usize, t: f32, index: usize) -> Option<LerpedVertex> {
		let old = self.frame_vertices(old_frame)?.get(index)?;
		let new = self.frame_vertices(frame)?.get(index)?;
		Some(interp::lerp_vertex(t, old, new))
	}
}

/// One level of detail of an MD3 model.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Md3Mesh {
	pub name: String,
	pub flags: i32,
	pub num_skins: i32,
	pub frames: Vec<Md3Frame>,
	pub num_tags: usize,
	/// `frames.len() * num_tags` tags, frame by frame.
	pub tags: Vec<Md3Tag>,
	pub surfaces: Vec<Md3Surface>,
}

/// Converts a count or offset read from the file, rejecting negative values.
fn non_negative(what: &'static str, value: i32, limit: usize) -> ModelResult<usize> {
	usize::try_from(value).map_err(|_| ModelError::BadCount {
		what,
		count: value as i64,
		limit,
	})
}

fn check_count(what: &'static str, value: i32, limit: usize) -> ModelResult<usize> {
	let count = non_negative(what, value, limit)?;
	if count > limit {
		return Err(ModelError::BadCount {
			what,
			count: value as i64,
			limit,
		});
	}
	Ok(count)
}

/// A reader at `offset` bytes past the start of `reader`, which is where surface sections are measured from.
fn section<'a>(reader: &ByteReader<'a>, what: &'static str, offset: i32) -> ModelResult<ByteReader<'a>> {
	Ok(reader.with_pos(reader.pos() + non_negative(what, offset, reader.len())?))
}

/// Lowercases a surface name and strips a trailing `_N`.
fn surface_name(name: &str) -> String {
	let mut name = name.to_ascii_lowercase();
	if name.len() > 2 && name.as_bytes()[name.len() - 2] == b'_' {
		name.truncate(name.len() - 2);
	}
	name
}

impl Md3Mesh {
	/// Parses one LOD from `data`, resolving shader images through `images`.
	pub fn parse(model_name: &str, data: &[u8], arena: &mut Arena, images: &mut dyn ImageService) -> ModelResult<Self> {
		let ctx = ParseContext::default();
		let reader = ByteReader::new(data, &ctx);
		let header: Md3Header = reader.clone().read().job("Reading header")?;

		if header.magic != MD3_MAGIC {
			return Err(ModelError::WrongMagicNumber {
				found: header.magic,
				expected: "IDP3",
			});
		}
		if header.version != MD3_VERSION {
			return Err(ModelError::WrongVersion {
				found: header.version,
				expected: MD3_VERSION,
			});
		}
		if header.ofs_end < 0 || header.ofs_end as usize != data.len() {
			return Err(ModelError::SizeMismatch {
				declared: header.ofs_end.max(0) as usize,
				actual: data.len(),
			});
		}

		arena.charge(data.len())?;

		let num_frames = non_negative("frame", header.num_frames, MAX_FRAMES)?;
		if num_frames < 1 {
			return Err(ModelError::NoFrames);
		}
		if num_frames > MAX_FRAMES {
			return Err(ModelError::TooManyFrames {
				count: header.num_frames as i64,
				limit: MAX_FRAMES,
			});
		}
		let num_tags = check_count("tag", header.num_tags, MAX_TAGS)?;
		let num_surfaces = check_count("surface", header.num_surfaces, MAX_SURFACES)?;

		let frames: Vec<Md3Frame> = reader
			.with_pos(non_negative("frame offset", header.ofs_frames, data.len())?)
			.read_many(num_frames)
			.job("Reading frames")?;

		let tags = reader
			.with_pos(non_negative("tag offset", header.ofs_tags, data.len())?)
			.read_many::<Md3TagRecord>(num_frames * num_tags)
			.job("Reading tags")?
			.into_iter()
			.map(|tag| Md3Tag {
				name: tag.name.as_str().to_ascii_lowercase(),
				origin: tag.origin,
				axis: tag.axis,
			})
			.collect();

		let mut surfaces = Vec::with_capacity(num_surfaces);
		let mut surface_pos = non_negative("surface offset", header.ofs_surfaces, data.len())?;
		for i in 0..num_surfaces {
			let (surface, size) =
				Self::parse_surface(model_name, reader.with_pos(surface_pos), images).job(format!("Reading surface {i}"))?;
			surfaces.push(surface);
			surface_pos += size;
		}

		debug!("Loaded {model_name}: {num_frames} frames, {num_tags} tags, {num_surfaces} surfaces");

		Ok(Self {
			name: header.name.as_str().to_owned(),
			flags: header.flags,
			num_skins: header.num_skins,
			frames,
			num_tags,
			tags,
			surfaces,
		})
	}

	/// Reads the surface at the start of `reader`, returning it and its size in bytes.
	fn parse_surface(model_name: &str, reader: ByteReader, images: &mut dyn ImageService) -> ModelResult<(Md3Surface, usize)> {
		let available = reader.len();
		let header: Md3SurfaceHeader = reader.clone().read()?;
		let name = surface_name(header.name.as_str());

		if header.magic != MD3_MAGIC {
			return Err(ModelError::WrongMagicNumber {
				found: header.magic,
				expected: "IDP3",
			});
		}

		let num_frames = check_count("surface frame", header.num_frames, MAX_FRAMES)?;
		let num_shaders = check_count("shader", header.num_shaders, MAX_SHADERS)?;
		let num_verts = non_negative("vertex", header.num_verts, MAX_VERTS)?;
		if num_verts > MAX_VERTS {
			return Err(ModelError::TooManyVerts {
				surface: name,
				count: header.num_verts as i64,
				limit: MAX_VERTS,
			});
		}
		let num_triangles = non_negative("triangle", header.num_triangles, MAX_TRIANGLES)?;
		if num_triangles > MAX_TRIANGLES {
			return Err(ModelError::TooManyTriangles {
				surface: name,
				count: header.num_triangles as i64,
				limit: MAX_TRIANGLES,
			});
		}

		let size = non_negative("surface end", header.ofs_end, available)?;
		if size > available {
			return Err(ModelError::BufferOutOfBounds {
				from: reader.pos(),
				to: reader.pos() + size,
				size: reader.pos() + available,
			});
		}

		let shaders = section(&reader, "shader offset", header.ofs_shaders)?
			.read_many::<Md3ShaderRecord>(num_shaders)
			.job("Reading shaders")?
			.into_iter()
			.map(|shader| {
				let name = shader.name.as_str().to_owned();
				let image = images.find_or_load(&name, ImageKind::Model, true).unwrap_or_else(|| {
					warn!("Cannot load \"{name}\" for model \"{model_name}\"");
					images.missing_image()
				});
				Md3Shader { name, image }
			})
			.collect();

		let triangles = section(&reader, "triangle offset", header.ofs_triangles)?
			.read_many::<[i32; 3]>(num_triangles)
			.job("Reading triangles")?
			.into_iter()
			.enumerate()
			.map(|(i, indices)| {
				let mut out = [0; 3];
				for (slot, index) in out.iter_mut().zip(indices) {
					if index < 0 || index as usize >= num_verts {
						return Err(ModelError::IndexOutOfRange {
							what: "vertex",
							index: index as i64,
							count: num_verts,
						})
						.job(format!("Validating triangle {i}"));
					}
					*slot = index as u32;
				}
				Ok(out)
			})
			.collect::<ModelResult<Vec<_>>>()?;

		let st = section(&reader, "texture coordinate offset", header.ofs_st)?
			.read_many::<Vec2>(num_verts)
			.job("Reading texture coordinates")?;

		let xyz_normals: Vec<Md3XyzNormal> = section(&reader, "vertex offset", header.ofs_xyz_normals)?
			.read_many(num_verts * num_frames)
			.job("Reading vertices")?;

		let normals = xyz_normals
			.iter()
			.take(num_verts)
			.map(|vertex| interp::decode_normal_exact(vertex.normal))
			.collect();

		Ok((
			Md3Surface {
				name,
				flags: header.flags,
				num_frames,
				num_verts,
				shaders,
				triangles,
				st,
				xyz_normals,
				normals,
			},
			size,
		))
	}

	/// Index of the tag called `name` (case-insensitive), looked up in frame 0.
	pub fn tag_index(&self, name: &str) -> Option<usize> {
		self.tags[..self.num_tags.min(self.tags.len())]
			.iter()
			.position(|tag| tag.name.eq_ignore_ascii_case(name))
	}

	/// Tag `index` in `frame`. Out of range frames are clamped, since a bad frame is possible while changing models.
	pub fn tag(&self, frame: i32, index: usize) -> Option<&Md3Tag> {
		if index >= self.num_tags {
			return None;
		}
		let frame = (frame.max(0) as usize).min(self.frames.len().saturating_sub(1));
		self.tags.get(frame * self.num_tags + index)
	}

	/// Blends tag `index` between two frames, or `None` if the tag doesn't exist.
	pub fn lerp_tag(&self, start_frame: i32, end_frame: i32, frac: f32, index: usize) -> Option<Orientation> {
		let start = self.tag(start_frame, index)?;
		let end = self.tag(end_frame, index)?;
		Some(interp::lerp_tag(start, end, frac))
	}

	/// Bounds of frame 0.
	pub fn bounds(&self) -> (Vec3, Vec3) {
		self.frames.first().map(|frame| (frame.mins, frame.maxs)).unwrap_or_default()
	}

	pub fn num_frames(&self) -> usize {
		self.frames.len()
	}
}

/// An MD3 model with up to one mesh per [`Lod`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Md3Model {
	/// Indexed by [`Lod`].
	pub lods: SmallVec<[Md3Mesh; 3]>,
	/// Render bounds, a fixed box around the origin.
	pub mins: Vec3,
	pub maxs: Vec3,
}

impl Md3Model {
	/// Wraps the high detail mesh.
	pub fn new(high: Md3Mesh) -> Self {
		let mut lods = SmallVec::new();
		lods.push(high);
		Self {
			lods,
			mins: Vec3::splat(-32.),
			maxs: Vec3::splat(32.),
		}
	}

	pub fn lod(&self, lod: Lod) -> Option<&Md3Mesh> {
		self.lods.get(lod as usize)
	}

	/// Shorthand for the [`Lod::High`] mesh every model has.
	pub fn high(&self) -> &Md3Mesh {
		&self.lods[0]
	}

	pub fn num_frames(&self) -> usize {
		self.high().num_frames()
	}

	pub fn tag_index(&self, name: &str) -> Option<usize> {
		self.high().tag_index(name)
	}

	/// See [`Md3Mesh::lerp_tag`]. Callers use [`Orientation::IDENTITY`] when this returns `None`.
	pub fn lerp_tag(&self, start_frame: i32, end_frame: i32, frac: f32, index: usize) -> Option<Orientation> {
		self.high().lerp_tag(start_frame, end_frame, frac, index)
	}

	pub fn bounds(&self) -> (Vec3, Vec3) {
		self.high().bounds()
	}
}
