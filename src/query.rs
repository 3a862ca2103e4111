//! Spatial queries against a loaded [`World`]: point classification, visibility and line traces.

use derive_more::{Deref, DerefMut, IntoIterator};
use glam::Vec3;

use crate::{
	data::{
		nodes::{BspLeafContentFlags, BspNodeRef},
		visdata::decompress_vis,
	},
	world::World,
	ModelError, ModelResult,
};

/// A decompressed visibility row, one bit per cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, DerefMut, IntoIterator)]
pub struct Pvs(#[into_iterator(owned, ref)] pub Vec<u8>);

impl Pvs {
	/// Whether `cluster` is set. Clusters past the end of the row and `-1` are not visible.
	pub fn contains(&self, cluster: i32) -> bool {
		let Ok(cluster) = usize::try_from(cluster) else { return false };
		self.0.get(cluster >> 3).is_some_and(|byte| byte & (1 << (cluster & 7)) != 0)
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RaycastResult {
	pub impact: Option<RaycastImpact>,
	/// The index of the leaf the ray ended up in.
	pub leaf_idx: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RaycastImpact {
	pub fraction: f32,
	pub position: Vec3,
	pub normal: Vec3,

	/// The index of the node whose plane was hit.
	pub node_idx: u32,
}

impl World {
	/// Returns the index of the leaf `point` is in.
	pub fn point_in_leaf(&self, point: Vec3) -> ModelResult<usize> {
		self.point_in_leaf_from(BspNodeRef::Node(self.first_node), point)
	}

	/// Returns the index of the leaf `point` is in, descending from `node_ref` instead of the world root.
	/// Inline models pass their head node here.
	pub fn point_in_leaf_from(&self, mut node_ref: BspNodeRef, point: Vec3) -> ModelResult<usize> {
		if self.nodes.is_empty() {
			return Err(ModelError::NoNodes);
		}

		loop {
			match node_ref {
				BspNodeRef::Leaf(leaf_idx) => return Ok(leaf_idx as usize),
				BspNodeRef::Node(node_idx) => {
					let node = self.nodes.get(node_idx as usize).ok_or(ModelError::IndexOutOfRange {
						what: "node",
						index: node_idx as i64,
						count: self.nodes.len(),
					})?;
					let plane = &self.planes[node.plane as usize];

					node_ref = if plane.point_side(point) > 0. { node.children[0] } else { node.children[1] };
				}
			}
		}
	}

	/// Bytes in one visibility row. Worlds without visibility data use one bit per leaf.
	pub fn pvs_row_len(&self) -> usize {
		match &self.vis {
			Some(vis) => vis.row_len(),
			None => self.leaves.len().div_ceil(8),
		}
	}

	/// Decompresses the potentially visible set of `cluster` into `out`.
	///
	/// Cluster `-1`, unknown clusters, or a world without visibility data see everything.
	pub fn cluster_pvs_into(&self, cluster: i32, out: &mut Vec<u8>) {
		let row_len = self.pvs_row_len();
		let input = self
			.vis
			.as_ref()
			.zip(usize::try_from(cluster).ok())
			.and_then(|(vis, cluster)| vis.pvs(cluster));
		decompress_vis(input, row_len, out);
	}

	/// Like [`Self::cluster_pvs_into`], returning a freshly allocated row.
	pub fn cluster_pvs(&self, cluster: i32) -> Pvs {
		let mut out = Vec::new();
		self.cluster_pvs_into(cluster, &mut out);
		Pvs(out)
	}

	/// The potentially audible set of `cluster`, with the same fallbacks as [`Self::cluster_pvs`].
	pub fn cluster_phs(&self, cluster: i32) -> Pvs {
		let mut out = Vec::new();
		let input = self
			.vis
			.as_ref()
			.zip(usize::try_from(cluster).ok())
			.and_then(|(vis, cluster)| vis.phs(cluster));
		decompress_vis(input, self.pvs_row_len(), &mut out);
		Pvs(out)
	}

	/// Indices of leaves whose cluster is set in `pvs`. Leaves outside any cluster are never included.
	pub fn visible_leaf_indices<'a>(&'a self, pvs: &'a Pvs) -> impl Iterator<Item = usize> + 'a {
		self.leaves
			.iter()
			.enumerate()
			.filter(|(_, leaf)| leaf.cluster != -1 && pvs.contains(leaf.cluster))
			.map(|(idx, _)| idx)
	}

	/// The potentially visible set of the cluster `point` is in.
	pub fn pvs_at_point(&self, point: Vec3) -> ModelResult<Pvs> {
		let leaf = self.point_in_leaf(point)?;
		Ok(self.cluster_pvs(self.leaves[leaf].cluster))
	}

	/// Iterative form of Quake's `SV_RecursiveHullCheck` function.
	/// Traces a line through inline model `model_idx`, returning the leaf it ends up in and the first solid it hits, if any.
	pub fn raycast(&self, model_idx: usize, from: Vec3, to: Vec3) -> ModelResult<RaycastResult> {
		let model = self.inline_models.get(model_idx).ok_or(ModelError::BadInlineModel {
			number: model_idx as i64,
			count: self.inline_models.len(),
		})?;
		let root = BspNodeRef::Node(model.head_node);

		if from == to {
			return Ok(RaycastResult {
				impact: None,
				leaf_idx: self.point_in_leaf_from(root, from)?,
			});
		}

		const DIST_EPSILON: f32 = 0.03125;

		/// The far half of a split segment, traced once the near half comes out empty.
		struct FarSide {
			node_ref: BspNodeRef,
			mid: Vec3,
			to: Vec3,
			impact: RaycastImpact,
		}

		let solid = |leaf_idx: usize| self.leaves[leaf_idx].contents.contains(BspLeafContentFlags::SOLID);
		let travel = to - from;
		let mut pending: Vec<FarSide> = Vec::new();
		let (mut node_ref, mut seg_from, mut seg_to) = (root, from, to);

		loop {
			let leaf_idx = match node_ref {
				BspNodeRef::Leaf(leaf_idx) => leaf_idx as usize,
				BspNodeRef::Node(node_idx) => {
					let node = &self.nodes[node_idx as usize];
					let plane = &self.planes[node.plane as usize];
					let [front, back] = node.children;

					let from_dist = plane.point_side(seg_from);
					let to_dist = plane.point_side(seg_to);

					if from_dist >= 0. && to_dist >= 0. {
						node_ref = front;
						continue;
					} else if from_dist < 0. && to_dist < 0. {
						node_ref = back;
						continue;
					}

					// Points lie on different sides of the plane.
					let front_side = from_dist >= 0.;
					let (near, far) = if front_side { (front, back) } else { (back, front) };

					let frac = if front_side { from_dist + DIST_EPSILON } else { from_dist - DIST_EPSILON } / (from_dist - to_dist);
					let mid = seg_from.lerp(seg_to, frac);
					let real_mid = seg_from.lerp(seg_to, from_dist / (from_dist - to_dist));

					pending.push(FarSide {
						node_ref: far,
						mid,
						to: seg_to,
						impact: RaycastImpact {
							fraction: (real_mid - from).dot(travel) / travel.length_squared(),
							position: real_mid,
							normal: if front_side { plane.normal } else { -plane.normal },
							node_idx,
						},
					});
					(node_ref, seg_to) = (near, mid);
					continue;
				}
			};

			// A solid leaf ends the trace without an impact plane.
			if solid(leaf_idx) {
				return Ok(RaycastResult { impact: None, leaf_idx });
			}
			let Some(far) = pending.pop() else {
				return Ok(RaycastResult { impact: None, leaf_idx });
			};

			let mid_leaf_idx = self.point_in_leaf_from(far.node_ref, far.mid)?;
			if !solid(mid_leaf_idx) {
				(node_ref, seg_from, seg_to) = (far.node_ref, far.mid, far.to);
				continue;
			}

			// The far side is solid at mid, this is the impact point.
			return Ok(RaycastResult {
				impact: Some(far.impact),
				leaf_idx: mid_leaf_idx,
			});
		}
	}
}
