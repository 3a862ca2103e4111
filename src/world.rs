//! The loaded form of a BSP world, and the loader that builds it lump by lump.

use glam::Vec3;
use log::{debug, trace, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
	arena::Arena,
	data::{
		lump::{LumpDirectory, LumpKind},
		models::{BspEdge, BspFace, BspModel, LightmapStyle},
		nodes::{BoundingBox, BspLeaf, BspLeafContentFlags, BspNode, BspNodeRef, BspPlane},
		texture::{BspSurfaceFlags, BspTexInfo, PlanarTextureProjection},
		util::{FixedStr, IBspValue},
		visdata::BspVisData,
	},
	reader::{BspSchema, BspValue, ByteReader, ParseContext},
	services::{ImageHandle, ImageKind, ImageService, SurfaceBuilder},
	surface::{calc_surface_extents, SurfaceContext, SurfaceExtents, SurfaceFlags},
	ModelError, ModelResult, ModelResultDoingJobExt,
};

/// Version number every supported BSP carries after its magic.
pub const BSP_VERSION: i32 = 38;

/// Contents value every node carries, so code walking the tree can tell nodes from leaves without matching.
pub const NODE_CONTENTS: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Plane {
	pub normal: Vec3,
	pub dist: f32,
	/// Axis classification as stored in the file.
	pub ty: u32,
	/// Bit `j` is set when `normal[j] < 0`.
	pub sign_bits: u8,
}

impl Plane {
	/// `>0` = front, `<=0` = back
	#[inline]
	pub fn point_side(&self, point: Vec3) -> f32 {
		point.dot(self.normal) - self.dist
	}
}

impl From<BspPlane> for Plane {
	fn from(plane: BspPlane) -> Self {
		Self {
			normal: plane.normal,
			dist: plane.dist,
			ty: plane.ty,
			sign_bits: plane.sign_bits(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Edge {
	pub v: [u32; 2],
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TexInfo {
	pub projection: PlanarTextureProjection,
	pub flags: BspSurfaceFlags,
	pub value: i32,
	pub texture: FixedStr<32>,
	/// Resolved image, or the missing placeholder.
	pub image: ImageHandle,
	/// Next texinfo in the animation chain.
	pub next: Option<u32>,
	/// Length of the animation chain starting here, including this one.
	pub num_frames: u32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Surface {
	pub plane: u32,
	pub flags: SurfaceFlags,
	pub first_edge: u32,
	pub num_edges: u32,
	pub tex_info: u32,
	pub extents: SurfaceExtents,
	pub styles: [LightmapStyle; 4],
	/// Byte offset of this surface's samples in the lighting data.
	pub samples: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
	/// Always [`NODE_CONTENTS`].
	pub contents: i32,
	pub plane: u32,
	pub children: [BspNodeRef; 2],
	pub bound: BoundingBox,
	pub first_surface: u32,
	pub num_surfaces: u32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Leaf {
	pub contents: BspLeafContentFlags,
	/// `-1` for leaves outside any cluster.
	pub cluster: i32,
	pub area: i32,
	pub bound: BoundingBox,
	pub first_mark_surface: u32,
	pub num_mark_surfaces: u32,
}

/// A brush model embedded in the map, referenced by entities as `*N`. Model 0 is the world itself.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InlineModel {
	pub mins: Vec3,
	pub maxs: Vec3,
	pub origin: Vec3,
	pub radius: f32,
	pub head_node: u32,
	pub first_face: u32,
	pub num_faces: u32,
}

/// Radius of the sphere around the origin containing both corners of a box.
pub fn radius_from_bounds(mins: Vec3, maxs: Vec3) -> f32 {
	mins.abs().max(maxs.abs()).length()
}

/// A fully loaded BSP world.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct World {
	pub name: String,
	pub schema: BspSchema,

	pub vertices: Vec<Vec3>,
	pub edges: Vec<Edge>,
	pub surface_edges: Vec<i32>,
	pub light_data: Option<Vec<u8>>,
	pub planes: Vec<Plane>,
	pub tex_info: Vec<TexInfo>,
	pub surfaces: Vec<Surface>,
	pub mark_surfaces: Vec<u32>,
	pub vis: Option<BspVisData>,
	pub leaves: Vec<Leaf>,
	pub nodes: Vec<Node>,
	/// Parent of each node, `None` for subtree roots.
	pub node_parents: Vec<Option<u32>>,
	/// Parent of each leaf, `None` for leaves not under any root.
	pub leaf_parents: Vec<Option<u32>>,
	pub inline_models: Vec<InlineModel>,

	/// Model 0's surface range and root.
	pub first_model_surface: u32,
	pub num_model_surfaces: u32,
	pub first_node: u32,
	pub mins: Vec3,
	pub maxs: Vec3,
	pub radius: f32,
}

impl World {
	/// Parses a BSP from `data`, which must start with the `IBSP` or `QBSP` magic.
	pub fn load(
		name: &str,
		data: &[u8],
		schema: BspSchema,
		arena: &mut Arena,
		images: &mut dyn ImageService,
		builder: &mut dyn SurfaceBuilder,
	) -> ModelResult<Self> {
		let ctx = ParseContext::new(schema);
		let mut reader = ByteReader::new(data, &ctx);
		let _magic: [u8; 4] = reader.read().job("Reading magic number")?;
		let version: i32 = reader.read().job("Reading version")?;
		if version != BSP_VERSION {
			return Err(ModelError::WrongVersion {
				found: version,
				expected: BSP_VERSION,
			});
		}
		let dir: LumpDirectory = reader.read().job("Reading lump directory")?;

		WorldLoader { data, ctx: &ctx, dir, arena }.load(name, images, builder)
	}

	/// The loaded arrays as a [`SurfaceContext`], as seen by the surface builder during loading.
	pub fn surface_context(&self) -> SurfaceContext<'_> {
		SurfaceContext {
			vertices: &self.vertices,
			edges: &self.edges,
			surface_edges: &self.surface_edges,
			planes: &self.planes,
			tex_info: &self.tex_info,
			light_data: self.light_data.as_deref(),
		}
	}

	/// Surfaces of inline model `index`.
	pub fn model_surfaces(&self, index: usize) -> &[Surface] {
		self.inline_models
			.get(index)
			.and_then(|model| self.surfaces.get(model.first_face as usize..(model.first_face + model.num_faces) as usize))
			.unwrap_or_default()
	}

	/// Surfaces marked visible from `leaf`.
	pub fn leaf_surfaces(&self, leaf: &Leaf) -> impl Iterator<Item = &Surface> + '_ {
		let range = leaf.first_mark_surface as usize..(leaf.first_mark_surface + leaf.num_mark_surfaces) as usize;
		self.mark_surfaces
			.get(range)
			.unwrap_or_default()
			.iter()
			.filter_map(|index| self.surfaces.get(*index as usize))
	}
}

struct WorldLoader<'a> {
	data: &'a [u8],
	ctx: &'a ParseContext,
	dir: LumpDirectory,
	arena: &'a mut Arena,
}

impl WorldLoader<'_> {
	/// Validates a lump and reads every record in it.
	fn read_lump<T: BspValue>(&self, kind: LumpKind) -> ModelResult<Vec<T>> {
		let entry = self.dir.get(kind);
		let count = entry.validate(kind, self.ctx.schema, T::bsp_struct_size(self.ctx), self.data.len())?;
		let mut reader = ByteReader::new(entry.get(kind, self.data)?, self.ctx);
		trace!("{kind}: {count} entries");

		(0..count).map(|i| reader.read().job(format!("Parsing {kind} lump entry {i}"))).collect()
	}

	/// Validates a byte lump, returning `None` if it is empty.
	fn read_bytes(&mut self, kind: LumpKind) -> ModelResult<Option<Vec<u8>>> {
		let entry = self.dir.get(kind);
		let len = entry.validate(kind, self.ctx.schema, 1, self.data.len())?;
		if len == 0 {
			return Ok(None);
		}
		self.arena.alloc_copy(entry.get(kind, self.data)?).map(Some)
	}

	fn load(&mut self, name: &str, images: &mut dyn ImageService, builder: &mut dyn SurfaceBuilder) -> ModelResult<World> {
		let vertices = self.load_vertices().job("Loading vertices")?;
		let edges = self.load_edges(vertices.len()).job("Loading edges")?;
		let surface_edges = self.load_surface_edges(edges.len()).job("Loading surface edges")?;
		let light_data = self.read_bytes(LumpKind::Lighting).job("Loading lighting")?;
		let planes = self.load_planes().job("Loading planes")?;
		let tex_info = self.load_tex_info(images).job("Loading texture info")?;

		let ctx = SurfaceContext {
			vertices: &vertices,
			edges: &edges,
			surface_edges: &surface_edges,
			planes: &planes,
			tex_info: &tex_info,
			light_data: light_data.as_deref(),
		};
		builder.begin_lightmaps(name);
		let surfaces = self.load_faces(&ctx, builder);
		builder.end_lightmaps();
		let surfaces = surfaces.job("Loading faces")?;

		let mark_surfaces = self.load_mark_surfaces(surfaces.len()).job("Loading leaf faces")?;
		let vis = self.load_visibility().job("Loading visibility")?;
		let leaves = self
			.load_leaves(mark_surfaces.len(), vis.as_ref().map(BspVisData::num_clusters))
			.job("Loading leaves")?;
		let nodes = self.load_nodes(planes.len(), surfaces.len(), leaves.len()).job("Loading nodes")?;
		let inline_models = self.load_inline_models(nodes.len(), surfaces.len()).job("Loading inline models")?;

		let roots = inline_models.iter().map(|model| model.head_node);
		let (node_parents, leaf_parents) = link_parents(&nodes, leaves.len(), roots).job("Linking node parents")?;

		let world_model = &inline_models[0];
		debug!(
			"Loaded {name}: {} surfaces, {} nodes, {} leaves, {} inline models",
			surfaces.len(),
			nodes.len(),
			leaves.len(),
			inline_models.len()
		);

		Ok(World {
			name: name.to_owned(),
			schema: self.ctx.schema,
			first_model_surface: world_model.first_face,
			num_model_surfaces: world_model.num_faces,
			first_node: world_model.head_node,
			mins: world_model.mins,
			maxs: world_model.maxs,
			radius: world_model.radius,
			vertices,
			edges,
			surface_edges,
			light_data,
			planes,
			tex_info,
			surfaces,
			mark_surfaces,
			vis,
			leaves,
			nodes,
			node_parents,
			leaf_parents,
			inline_models,
		})
	}

	fn load_vertices(&mut self) -> ModelResult<Vec<Vec3>> {
		let raw: Vec<Vec3> = self.read_lump(LumpKind::Vertices)?;
		let mut out = self.arena.alloc(raw.len())?;
		out.extend(raw);
		Ok(out)
	}

	fn load_edges(&mut self, num_vertices: usize) -> ModelResult<Vec<Edge>> {
		let raw: Vec<BspEdge> = self.read_lump(LumpKind::Edges)?;
		let mut out = self.arena.alloc(raw.len())?;
		for (i, edge) in raw.into_iter().enumerate() {
			for v in [*edge.a, *edge.b] {
				check_index("vertex", v as i64, num_vertices).job(format!("Validating edge {i}"))?;
			}
			out.push(Edge { v: [*edge.a, *edge.b] });
		}
		Ok(out)
	}

	fn load_surface_edges(&mut self, num_edges: usize) -> ModelResult<Vec<i32>> {
		let raw: Vec<i32> = self.read_lump(LumpKind::SurfEdges)?;
		let mut out = self.arena.alloc(raw.len())?;
		for (i, surface_edge) in raw.into_iter().enumerate() {
			check_index("edge", surface_edge.unsigned_abs() as i64, num_edges).job(format!("Validating surface edge {i}"))?;
			out.push(surface_edge);
		}
		Ok(out)
	}

	fn load_planes(&mut self) -> ModelResult<Vec<Plane>> {
		let raw: Vec<BspPlane> = self.read_lump(LumpKind::Planes)?;
		let mut out = self.arena.alloc(raw.len())?;
		out.extend(raw.into_iter().map(Plane::from));
		Ok(out)
	}

	fn load_tex_info(&mut self, images: &mut dyn ImageService) -> ModelResult<Vec<TexInfo>> {
		let raw: Vec<BspTexInfo> = self.read_lump(LumpKind::TexInfo)?;
		let count = raw.len();
		let mut out: Vec<TexInfo> = self.arena.alloc(count)?;

		for (i, info) in raw.into_iter().enumerate() {
			let next = if info.next > 0 {
				check_index("texinfo", info.next as i64, count).job(format!("Validating animation chain of texinfo {i}"))?;
				Some(info.next as u32)
			} else {
				None
			};

			let path = format!("textures/{}.tga", info.texture);
			let image = images.find_or_load(&path, ImageKind::Wall, true).unwrap_or_else(|| {
				warn!("Couldn't load {path}");
				images.missing_image()
			});

			out.push(TexInfo {
				projection: info.projection,
				flags: info.flags,
				value: info.value,
				texture: info.texture,
				image,
				next,
				num_frames: 1,
			});
		}

		// Count animation frames. Chains that loop back without reaching their start are cut off after every texinfo was visited once.
		for i in 0..count {
			let mut num_frames = 1;
			let mut step = out[i].next;
			while let Some(next) = step {
				if next as usize == i || num_frames as usize >= count {
					break;
				}
				num_frames += 1;
				step = out[next as usize].next;
			}
			out[i].num_frames = num_frames;
		}

		Ok(out)
	}

	fn load_faces(&mut self, ctx: &SurfaceContext, builder: &mut dyn SurfaceBuilder) -> ModelResult<Vec<Surface>> {
		let raw: Vec<BspFace> = self.read_lump(LumpKind::Faces)?;
		let mut out = self.arena.alloc(raw.len())?;

		for (i, face) in raw.into_iter().enumerate() {
			let surface = self.load_face(ctx, &face).job(format!("Loading face {i}"))?;

			let tex_flags = ctx.tex_info[surface.tex_info as usize].flags;
			if tex_flags.contains(BspSurfaceFlags::WARP) {
				builder.subdivide_surface(ctx, i, &surface);
			}
			if !tex_flags.intersects(BspSurfaceFlags::UNLIT) {
				builder.create_surface_lightmap(ctx, i, &surface);
			}
			if !tex_flags.contains(BspSurfaceFlags::WARP) {
				builder.build_polygon(ctx, i, &surface);
			}

			out.push(surface);
		}

		Ok(out)
	}

	fn load_face(&self, ctx: &SurfaceContext, face: &BspFace) -> ModelResult<Surface> {
		let plane = *face.plane_idx;
		check_index("plane", plane as i64, ctx.planes.len())?;

		let tex_info = *face.texture_info_idx;
		check_index("texinfo", tex_info as i64, ctx.tex_info.len())?;
		let info = &ctx.tex_info[tex_info as usize];

		let num_edges = *face.num_edges;
		if face.first_edge < 0 || num_edges < 0 || face.first_edge as i64 + num_edges as i64 > ctx.surface_edges.len() as i64 {
			return Err(ModelError::IndexOutOfRange {
				what: "surface edge",
				index: face.first_edge as i64 + num_edges as i64,
				count: ctx.surface_edges.len(),
			});
		}
		let (first_edge, num_edges) = (face.first_edge as u32, num_edges as u32);

		let mut flags = SurfaceFlags::empty();
		if *face.plane_side != 0 {
			flags |= SurfaceFlags::PLANE_BACK;
		}
		if info.flags.contains(BspSurfaceFlags::SKY) {
			flags |= SurfaceFlags::DRAW_SKY;
		}
		if info.flags.intersects(BspSurfaceFlags::TRANS33 | BspSurfaceFlags::TRANS66) {
			flags |= SurfaceFlags::DRAW_TRANSLUCENT;
		}

		let extents = if info.flags.contains(BspSurfaceFlags::WARP) {
			flags |= SurfaceFlags::DRAW_TURB;
			SurfaceExtents::WARP
		} else {
			calc_surface_extents(ctx, first_edge, num_edges, info)?
		};

		let samples = match (face.lightmap_offset, ctx.light_data) {
			(-1, _) | (_, None) => None,
			(offset, Some(light_data)) => {
				check_index("lighting offset", offset as i64, light_data.len())?;
				Some(offset as usize)
			}
		};

		Ok(Surface {
			plane,
			flags,
			first_edge,
			num_edges,
			tex_info: tex_info as u32,
			extents,
			styles: face.lightmap_styles,
			samples,
		})
	}

	fn load_mark_surfaces(&mut self, num_surfaces: usize) -> ModelResult<Vec<u32>> {
		let raw: Vec<IBspValue> = self.read_lump(LumpKind::LeafFaces)?;
		let mut out = self.arena.alloc(raw.len())?;
		for (i, index) in raw.into_iter().enumerate() {
			check_index("surface", *index as i64, num_surfaces).job(format!("Validating leaf face {i}"))?;
			out.push(*index as u32);
		}
		Ok(out)
	}

	fn load_visibility(&mut self) -> ModelResult<Option<BspVisData>> {
		let Some(bytes) = self.read_bytes(LumpKind::Visibility)? else {
			trace!("No visibility data");
			return Ok(None);
		};
		BspVisData::parse(&bytes).map(Some)
	}

	fn load_leaves(&mut self, num_mark_surfaces: usize, num_clusters: Option<usize>) -> ModelResult<Vec<Leaf>> {
		let raw: Vec<BspLeaf> = self.read_lump(LumpKind::Leaves)?;
		let mut out = self.arena.alloc(raw.len())?;

		for (i, leaf) in raw.into_iter().enumerate() {
			let (first, num) = (*leaf.face_idx, *leaf.face_num);
			check_span("leaf face", first, num, num_mark_surfaces).job(format!("Validating leaf {i}"))?;

			let cluster = *leaf.cluster;
			if let Some(num_clusters) = num_clusters {
				if cluster < -1 || cluster >= num_clusters as i32 {
					return Err(ModelError::IndexOutOfRange {
						what: "cluster",
						index: cluster as i64,
						count: num_clusters,
					})
					.job(format!("Validating leaf {i}"));
				}
			}

			out.push(Leaf {
				contents: leaf.contents,
				cluster,
				area: *leaf.area,
				bound: leaf.bound,
				first_mark_surface: first,
				num_mark_surfaces: num,
			});
		}

		Ok(out)
	}

	fn load_nodes(&mut self, num_planes: usize, num_surfaces: usize, num_leaves: usize) -> ModelResult<Vec<Node>> {
		let raw: Vec<BspNode> = self.read_lump(LumpKind::Nodes)?;
		let num_nodes = raw.len();
		let mut out = self.arena.alloc(num_nodes)?;

		for (i, node) in raw.into_iter().enumerate() {
			let validate = || -> ModelResult<()> {
				check_index("plane", node.plane_idx as i64, num_planes)?;
				check_span("surface", *node.face_idx, *node.face_num, num_surfaces)?;
				for child in [node.front, node.back] {
					match child {
						BspNodeRef::Node(index) => check_index("node", index as i64, num_nodes)?,
						BspNodeRef::Leaf(index) => check_index("leaf", index as i64, num_leaves)?,
					}
				}
				Ok(())
			};
			validate().job(format!("Validating node {i}"))?;

			out.push(Node {
				contents: NODE_CONTENTS,
				plane: node.plane_idx,
				children: [node.front, node.back],
				bound: node.bound,
				first_surface: *node.face_idx,
				num_surfaces: *node.face_num,
			});
		}

		Ok(out)
	}

	fn load_inline_models(&mut self, num_nodes: usize, num_surfaces: usize) -> ModelResult<Vec<InlineModel>> {
		let raw: Vec<BspModel> = self.read_lump(LumpKind::Models)?;
		let mut out = self.arena.alloc(raw.len())?;

		for (i, model) in raw.into_iter().enumerate() {
			let validate = || -> ModelResult<()> {
				check_index("head node", model.head_node as i64, num_nodes)?;
				if model.first_face < 0 || model.num_faces < 0 {
					return Err(ModelError::IndexOutOfRange {
						what: "surface",
						index: model.first_face.min(model.num_faces) as i64,
						count: num_surfaces,
					});
				}
				check_span("surface", model.first_face as u32, model.num_faces as u32, num_surfaces)
			};
			validate().job(format!("Validating inline model {i}"))?;

			// Spread the bounds by one unit in every direction.
			let mins = model.bound.min - Vec3::ONE;
			let maxs = model.bound.max + Vec3::ONE;

			out.push(InlineModel {
				mins,
				maxs,
				origin: model.origin,
				radius: radius_from_bounds(mins, maxs),
				head_node: model.head_node as u32,
				first_face: model.first_face as u32,
				num_faces: model.num_faces as u32,
			});
		}

		Ok(out)
	}
}

fn check_index(what: &'static str, index: i64, count: usize) -> ModelResult<()> {
	if index < 0 || index >= count as i64 {
		return Err(ModelError::IndexOutOfRange { what, index, count });
	}
	Ok(())
}

/// Checks that `first..first + num` lies within `0..count`.
fn check_span(what: &'static str, first: u32, num: u32, count: usize) -> ModelResult<()> {
	let end = first as u64 + num as u64;
	if end > count as u64 {
		return Err(ModelError::IndexOutOfRange {
			what,
			index: end as i64,
			count,
		});
	}
	Ok(())
}

/// Gives every node and leaf reachable from `roots` a parent link, rejecting node graphs where a node is reachable twice.
///
/// Roots that were already reached from an earlier root are skipped, so model 0 sharing the world's root is fine.
pub(crate) fn link_parents(
	nodes: &[Node],
	num_leaves: usize,
	roots: impl IntoIterator<Item = u32>,
) -> ModelResult<(Vec<Option<u32>>, Vec<Option<u32>>)> {
	let mut node_parents = vec![None; nodes.len()];
	let mut leaf_parents = vec![None; num_leaves];
	let mut visited = vec![false; nodes.len()];
	let mut stack = Vec::new();

	for root in roots {
		if visited.get(root as usize).copied().unwrap_or(true) {
			continue;
		}
		visited[root as usize] = true;
		stack.push(root);

		while let Some(index) = stack.pop() {
			for child in nodes[index as usize].children {
				match child {
					BspNodeRef::Node(child) => {
						let child_idx = child as usize;
						if visited[child_idx] {
							return Err(ModelError::CyclicTree { what: "node", index: child_idx });
						}
						visited[child_idx] = true;
						node_parents[child_idx] = Some(index);
						stack.push(child);
					}
					BspNodeRef::Leaf(leaf) => {
						if let Some(parent) = leaf_parents.get_mut(leaf as usize) {
							*parent = Some(index);
						}
					}
				}
			}
		}
	}

	Ok((node_parents, leaf_parents))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::data::nodes::BoundingBox;

	fn node(front: i32, back: i32) -> Node {
		Node {
			contents: NODE_CONTENTS,
			plane: 0,
			children: [BspNodeRef::from_i32(front), BspNodeRef::from_i32(back)],
			bound: BoundingBox::default(),
			first_surface: 0,
			num_surfaces: 0,
		}
	}

	#[test]
	fn parents() {
		let nodes = [node(1, -1), node(-2, -3)];
		let (node_parents, leaf_parents) = link_parents(&nodes, 3, [0, 0]).unwrap();
		assert_eq!(node_parents, [None, Some(0)]);
		assert_eq!(leaf_parents, [Some(0), Some(1), Some(1)]);
	}

	#[test]
	fn separate_subtrees() {
		// Node 2 heads an inline model that isn't reachable from the world root.
		let nodes = [node(1, -1), node(-2, -3), node(-4, -5)];
		let (node_parents, leaf_parents) = link_parents(&nodes, 5, [0, 2]).unwrap();
		assert_eq!(node_parents, [None, Some(0), None]);
		assert_eq!(leaf_parents, [Some(0), Some(1), Some(1), Some(2), Some(2)]);
	}

	#[test]
	fn cycles_are_rejected() {
		let nodes = [node(1, -1), node(0, -1)];
		assert!(matches!(
			link_parents(&nodes, 1, [0]),
			Err(ModelError::CyclicTree { what: "node", index: 0 })
		));

		let shared_node = [node(1, 1), node(-1, -2)];
		assert!(matches!(
			link_parents(&shared_node, 2, [0]),
			Err(ModelError::CyclicTree { what: "node", index: 1 })
		));

		// Leaves may be shared, the last link wins.
		let (_, leaf_parents) = link_parents(&[node(1, -1), node(-1, -1)], 1, [0]).unwrap();
		assert_eq!(leaf_parents, [Some(1)]);
	}

	#[test]
	fn radius() {
		assert_eq!(radius_from_bounds(Vec3::new(-3., -1., 0.), Vec3::new(1., 4., 0.)), 5.);
	}
}
