//! Builders for synthetic model files, so loading can be tested without shipping game data.

use glam::{Vec2, Vec3};
use strum::IntoEnumIterator;

use crate::{
	data::lump::LumpKind,
	md3::{Md3Tag, Md3XyzNormal, MD3_MAGIC, MD3_VERSION},
	reader::BspSchema,
	services::SurfaceBuilder,
	sprite::{SP2_MAGIC, SP2_VERSION},
	surface::SurfaceContext,
	world::{Surface, BSP_VERSION},
};

/// Little-endian byte sink that knows which BSP layout it's writing.
pub struct Writer {
	pub schema: BspSchema,
	pub bytes: Vec<u8>,
}

impl Writer {
	pub fn new(schema: BspSchema) -> Self {
		Self { schema, bytes: Vec::new() }
	}

	pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
		self.bytes.extend_from_slice(bytes);
		self
	}

	pub fn i16(&mut self, v: i16) -> &mut Self {
		self.bytes(&v.to_le_bytes())
	}

	pub fn i32(&mut self, v: i32) -> &mut Self {
		self.bytes(&v.to_le_bytes())
	}

	pub fn u32(&mut self, v: u32) -> &mut Self {
		self.bytes(&v.to_le_bytes())
	}

	pub fn f32(&mut self, v: f32) -> &mut Self {
		self.bytes(&v.to_le_bytes())
	}

	pub fn vec2(&mut self, v: Vec2) -> &mut Self {
		self.f32(v.x).f32(v.y)
	}

	pub fn vec3(&mut self, v: Vec3) -> &mut Self {
		self.f32(v.x).f32(v.y).f32(v.z)
	}

	/// Zero-padded to `len` bytes.
	pub fn str(&mut self, s: &str, len: usize) -> &mut Self {
		let mut bytes = s.as_bytes().to_vec();
		bytes.resize(len, 0);
		self.bytes(&bytes)
	}

	/// u16 in the legacy layout, u32 in the extended one.
	pub fn uvar(&mut self, v: u32) -> &mut Self {
		match self.schema {
			BspSchema::Legacy => self.bytes(&(v as u16).to_le_bytes()),
			BspSchema::Extended => self.u32(v),
		}
	}

	/// i16 in the legacy layout, i32 in the extended one.
	pub fn ivar(&mut self, v: i32) -> &mut Self {
		match self.schema {
			BspSchema::Legacy => self.i16(v as i16),
			BspSchema::Extended => self.i32(v),
		}
	}

	/// Short bounds in the legacy layout, float in the extended one.
	pub fn bound(&mut self, mins: Vec3, maxs: Vec3) -> &mut Self {
		match self.schema {
			BspSchema::Legacy => {
				for v in mins.to_array().into_iter().chain(maxs.to_array()) {
					self.i16(v as i16);
				}
				self
			}
			BspSchema::Extended => self.vec3(mins).vec3(maxs),
		}
	}
}

#[derive(Debug, Clone)]
pub struct PlaneDef {
	pub normal: Vec3,
	pub dist: f32,
	pub ty: u32,
}

#[derive(Debug, Clone)]
pub struct TexInfoDef {
	pub u_axis: Vec3,
	pub u_offset: f32,
	pub v_axis: Vec3,
	pub v_offset: f32,
	pub flags: u32,
	pub value: i32,
	pub texture: String,
	pub next: i32,
}

impl TexInfoDef {
	pub fn new(texture: &str) -> Self {
		Self {
			u_axis: Vec3::X,
			u_offset: 0.,
			v_axis: Vec3::Y,
			v_offset: 0.,
			flags: 0,
			value: 0,
			texture: texture.to_owned(),
			next: 0,
		}
	}
}

#[derive(Debug, Clone)]
pub struct FaceDef {
	pub plane: u32,
	pub side: i32,
	pub first_edge: i32,
	pub num_edges: i32,
	pub tex_info: i32,
	pub styles: [u8; 4],
	pub light_offset: i32,
}

#[derive(Debug, Clone)]
pub struct LeafDef {
	pub contents: u32,
	pub cluster: i32,
	pub area: i32,
	pub mins: Vec3,
	pub maxs: Vec3,
	pub first_face: u32,
	pub num_faces: u32,
}

#[derive(Debug, Clone)]
pub struct NodeDef {
	pub plane: u32,
	pub children: [i32; 2],
	pub mins: Vec3,
	pub maxs: Vec3,
	pub first_face: u32,
	pub num_faces: u32,
}

#[derive(Debug, Clone)]
pub struct ModelDef {
	pub mins: Vec3,
	pub maxs: Vec3,
	pub origin: Vec3,
	pub head_node: i32,
	pub first_face: i32,
	pub num_faces: i32,
}

/// Describes a BSP by its records and writes it in either layout.
#[derive(Debug, Clone)]
pub struct BspBuilder {
	pub version: i32,
	pub vertices: Vec<Vec3>,
	pub edges: Vec<[u32; 2]>,
	pub surface_edges: Vec<i32>,
	pub planes: Vec<PlaneDef>,
	pub tex_info: Vec<TexInfoDef>,
	pub faces: Vec<FaceDef>,
	pub lighting: Vec<u8>,
	pub leaf_faces: Vec<i32>,
	pub visibility: Vec<u8>,
	pub leaves: Vec<LeafDef>,
	pub nodes: Vec<NodeDef>,
	pub models: Vec<ModelDef>,
	/// Raw lump contents written instead of the records above.
	pub overrides: Vec<(LumpKind, Vec<u8>)>,
}

impl BspBuilder {
	/// The smallest loadable world: a square floor face in one leaf under one node.
	pub fn minimal() -> Self {
		let (mins, maxs) = (Vec3::splat(-64.), Vec3::splat(64.));
		Self {
			version: BSP_VERSION,
			vertices: vec![
				Vec3::new(0., 0., 0.),
				Vec3::new(64., 0., 0.),
				Vec3::new(64., 64., 0.),
				Vec3::new(0., 64., 0.),
			],
			edges: vec![[0, 1]],
			surface_edges: vec![0],
			planes: vec![PlaneDef {
				normal: Vec3::Z,
				dist: 0.,
				ty: 2,
			}],
			tex_info: vec![TexInfoDef::new("e1u1/floor1_1")],
			faces: vec![FaceDef {
				plane: 0,
				side: 0,
				first_edge: 0,
				num_edges: 1,
				tex_info: 0,
				styles: [0, 255, 255, 255],
				light_offset: -1,
			}],
			lighting: Vec::new(),
			leaf_faces: vec![0],
			visibility: Vec::new(),
			leaves: vec![LeafDef {
				contents: 0,
				cluster: -1,
				area: 0,
				mins,
				maxs,
				first_face: 0,
				num_faces: 1,
			}],
			nodes: vec![NodeDef {
				plane: 0,
				children: [-1, -1],
				mins,
				maxs,
				first_face: 0,
				num_faces: 1,
			}],
			models: vec![ModelDef {
				mins,
				maxs,
				origin: Vec3::ZERO,
				head_node: 0,
				first_face: 0,
				num_faces: 1,
			}],
			overrides: Vec::new(),
		}
	}

	/// Like [`Self::minimal`], with the square closed by four edges so it has real extents.
	pub fn quad() -> Self {
		let mut builder = Self::minimal();
		builder.edges = vec![[0, 0], [0, 1], [1, 2], [2, 3], [3, 0]];
		builder.surface_edges = vec![1, 2, 3, 4];
		builder.faces[0].num_edges = 4;
		builder
	}

	fn lump(&self, kind: LumpKind, schema: BspSchema) -> Vec<u8> {
		if let Some((_, bytes)) = self.overrides.iter().find(|(k, _)| *k == kind) {
			return bytes.clone();
		}

		let mut w = Writer::new(schema);
		match kind {
			LumpKind::Vertices => {
				for v in &self.vertices {
					w.vec3(*v);
				}
			}
			LumpKind::Edges => {
				for [a, b] in &self.edges {
					w.uvar(*a).uvar(*b);
				}
			}
			LumpKind::SurfEdges => {
				for e in &self.surface_edges {
					w.i32(*e);
				}
			}
			LumpKind::Planes => {
				for plane in &self.planes {
					w.vec3(plane.normal).f32(plane.dist).u32(plane.ty);
				}
			}
			LumpKind::TexInfo => {
				for info in &self.tex_info {
					w.vec3(info.u_axis)
						.f32(info.u_offset)
						.vec3(info.v_axis)
						.f32(info.v_offset)
						.u32(info.flags)
						.i32(info.value)
						.str(&info.texture, 32)
						.i32(info.next);
				}
			}
			LumpKind::Faces => {
				for face in &self.faces {
					w.uvar(face.plane)
						.ivar(face.side)
						.i32(face.first_edge)
						.ivar(face.num_edges)
						.ivar(face.tex_info)
						.bytes(&face.styles)
						.i32(face.light_offset);
				}
			}
			LumpKind::Lighting => {
				w.bytes(&self.lighting);
			}
			LumpKind::LeafFaces => {
				for face in &self.leaf_faces {
					w.ivar(*face);
				}
			}
			LumpKind::Visibility => {
				w.bytes(&self.visibility);
			}
			LumpKind::Leaves => {
				for leaf in &self.leaves {
					w.u32(leaf.contents)
						.ivar(leaf.cluster)
						.ivar(leaf.area)
						.bound(leaf.mins, leaf.maxs)
						.uvar(leaf.first_face)
						.uvar(leaf.num_faces)
						.uvar(0)
						.uvar(0);
				}
			}
			LumpKind::Nodes => {
				for node in &self.nodes {
					w.u32(node.plane)
						.i32(node.children[0])
						.i32(node.children[1])
						.bound(node.mins, node.maxs)
						.uvar(node.first_face)
						.uvar(node.num_faces);
				}
			}
			LumpKind::Models => {
				for model in &self.models {
					w.vec3(model.mins)
						.vec3(model.maxs)
						.vec3(model.origin)
						.i32(model.head_node)
						.i32(model.first_face)
						.i32(model.num_faces);
				}
			}
			_ => {}
		}
		w.bytes
	}

	pub fn build(&self, schema: BspSchema) -> Vec<u8> {
		let lumps: Vec<Vec<u8>> = LumpKind::iter().map(|kind| self.lump(kind, schema)).collect();

		let mut w = Writer::new(schema);
		w.bytes(match schema {
			BspSchema::Legacy => b"IBSP",
			BspSchema::Extended => b"QBSP",
		})
		.i32(self.version);

		let mut offset = 8 + lumps.len() * 8;
		for lump in &lumps {
			w.u32(offset as u32).u32(lump.len() as u32);
			offset += lump.len();
		}
		for lump in &lumps {
			w.bytes(lump);
		}
		w.bytes
	}
}

/// A visibility lump where every cluster's potentially visible and audible sets are the given compressed rows.
pub fn vis_lump(rows: &[&[u8]]) -> Vec<u8> {
	let mut w = Writer::new(BspSchema::Legacy);
	w.i32(rows.len() as i32);
	let mut offset = 4 + rows.len() * 8;
	for row in rows {
		w.u32(offset as u32).u32(offset as u32);
		offset += row.len();
	}
	for row in rows {
		w.bytes(row);
	}
	w.bytes
}

#[derive(Debug, Clone)]
pub struct Md3SurfaceDef {
	pub name: String,
	pub shaders: Vec<String>,
	pub triangles: Vec<[i32; 3]>,
	pub num_verts: usize,
	/// One vertex list per frame.
	pub frames: Vec<Vec<Md3XyzNormal>>,
}

impl Md3SurfaceDef {
	/// A surface of `num_verts` vertices at the origin, with one triangle.
	pub fn new(name: &str, num_frames: usize, num_verts: usize) -> Self {
		let vertex = Md3XyzNormal {
			xyz: Default::default(),
			normal: 0,
		};
		Self {
			name: name.to_owned(),
			shaders: vec!["models/test/skin.tga".to_owned()],
			triangles: vec![[0, 1, 2]],
			num_verts,
			frames: vec![vec![vertex; num_verts]; num_frames],
		}
	}
}

#[derive(Debug, Clone)]
pub struct Md3Builder {
	pub version: i32,
	pub name: String,
	/// Bounds of each frame.
	pub frames: Vec<(Vec3, Vec3)>,
	pub num_tags: usize,
	/// `frames.len() * num_tags` tags, frame by frame.
	pub tags: Vec<Md3Tag>,
	pub surfaces: Vec<Md3SurfaceDef>,
	/// Added to the declared end of file.
	pub size_error: i32,
}

impl Md3Builder {
	pub fn new(num_frames: usize) -> Self {
		Self {
			version: MD3_VERSION,
			name: "models/test/tris.md3".to_owned(),
			frames: (0..num_frames).map(|i| (Vec3::splat(-16. - i as f32), Vec3::splat(16. + i as f32))).collect(),
			num_tags: 0,
			tags: Vec::new(),
			surfaces: Vec::new(),
			size_error: 0,
		}
	}

	fn surface_bytes(surface: &Md3SurfaceDef) -> Vec<u8> {
		let ofs_shaders = 108;
		let ofs_triangles = ofs_shaders + 68 * surface.shaders.len();
		let ofs_st = ofs_triangles + 12 * surface.triangles.len();
		let ofs_xyz = ofs_st + 8 * surface.num_verts;
		let ofs_end = ofs_xyz + 8 * surface.frames.iter().map(Vec::len).sum::<usize>();

		let mut w = Writer::new(BspSchema::Legacy);
		w.bytes(&MD3_MAGIC)
			.str(&surface.name, 64)
			.i32(0)
			.i32(surface.frames.len() as i32)
			.i32(surface.shaders.len() as i32)
			.i32(surface.num_verts as i32)
			.i32(surface.triangles.len() as i32)
			.i32(ofs_triangles as i32)
			.i32(ofs_shaders as i32)
			.i32(ofs_st as i32)
			.i32(ofs_xyz as i32)
			.i32(ofs_end as i32);
		for (i, shader) in surface.shaders.iter().enumerate() {
			w.str(shader, 64).i32(i as i32);
		}
		for triangle in &surface.triangles {
			for index in triangle {
				w.i32(*index);
			}
		}
		for i in 0..surface.num_verts {
			w.vec2(Vec2::new(i as f32, 0.));
		}
		for vertex in surface.frames.iter().flatten() {
			w.i16(vertex.xyz.x).i16(vertex.xyz.y).i16(vertex.xyz.z).i16(vertex.normal);
		}
		w.bytes
	}

	pub fn build(&self) -> Vec<u8> {
		let surfaces: Vec<Vec<u8>> = self.surfaces.iter().map(Self::surface_bytes).collect();
		let ofs_frames = 108;
		let ofs_tags = ofs_frames + 56 * self.frames.len();
		let ofs_surfaces = ofs_tags + 112 * self.tags.len();
		let ofs_end = ofs_surfaces + surfaces.iter().map(Vec::len).sum::<usize>();

		let mut w = Writer::new(BspSchema::Legacy);
		w.bytes(&MD3_MAGIC)
			.i32(self.version)
			.str(&self.name, 64)
			.i32(0)
			.i32(self.frames.len() as i32)
			.i32(self.num_tags as i32)
			.i32(self.surfaces.len() as i32)
			.i32(0)
			.i32(ofs_frames as i32)
			.i32(ofs_tags as i32)
			.i32(ofs_surfaces as i32)
			.i32(ofs_end as i32 + self.size_error);
		for (i, (mins, maxs)) in self.frames.iter().enumerate() {
			w.vec3(*mins).vec3(*maxs).vec3(Vec3::ZERO).f32(maxs.length()).str(&format!("frame{i}"), 16);
		}
		for tag in &self.tags {
			w.str(&tag.name, 64).vec3(tag.origin);
			for axis in tag.axis {
				w.vec3(axis);
			}
		}
		for surface in &surfaces {
			w.bytes(surface);
		}
		w.bytes
	}
}

/// Writes an SP2 with frames of `(image name, width, height)`.
pub fn build_sp2(num_frames: i32, frames: &[(&str, i32, i32)]) -> Vec<u8> {
	let mut w = Writer::new(BspSchema::Legacy);
	w.bytes(&SP2_MAGIC).i32(SP2_VERSION).i32(num_frames);
	for (name, width, height) in frames {
		w.i32(*width).i32(*height).i32(width / 2).i32(height / 2).str(name, 64);
	}
	w.bytes
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
	Begin(String),
	Lightmap(usize),
	Polygon(usize),
	Subdivide(usize),
	End,
}

/// Remembers every call made to it.
#[derive(Debug, Default)]
pub struct RecordingBuilder {
	pub events: Vec<BuildEvent>,
}

impl SurfaceBuilder for RecordingBuilder {
	fn begin_lightmaps(&mut self, model_name: &str) {
		self.events.push(BuildEvent::Begin(model_name.to_owned()));
	}

	fn create_surface_lightmap(&mut self, _ctx: &SurfaceContext, index: usize, _surface: &Surface) {
		self.events.push(BuildEvent::Lightmap(index));
	}

	fn build_polygon(&mut self, _ctx: &SurfaceContext, index: usize, _surface: &Surface) {
		self.events.push(BuildEvent::Polygon(index));
	}

	fn subdivide_surface(&mut self, _ctx: &SurfaceContext, index: usize, _surface: &Surface) {
		self.events.push(BuildEvent::Subdivide(index));
	}

	fn end_lightmaps(&mut self) {
		self.events.push(BuildEvent::End);
	}
}
