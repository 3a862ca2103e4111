//! Data definitions for visibility data, storing which clusters of the map can be seen from any given cluster.

use q2model_macros::BspValue;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
	reader::{ByteReader, ParseContext},
	ModelError, ModelResult, ModelResultDoingJobExt,
};

/// Offsets for each of the potentially-visible set and potentially-audible set.
#[derive(BspValue, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BspClusterOffsets {
	/// Index into the visibility lump where the compressed potentially visible set starts.
	pub pvs: u32,
	/// Index into the visibility lump where the compressed potentially audible set starts.
	pub phs: u32,
}

/// The visibility lump: a cluster count, one [`BspClusterOffsets`] per cluster, then run-length compressed rows.
///
/// Offsets are relative to the start of the lump, so the header is kept in `bytes`.
#[derive(Default, Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BspVisData {
	pub offsets: Vec<BspClusterOffsets>,
	pub bytes: Vec<u8>,
}

impl BspVisData {
	pub fn parse(lump: &[u8]) -> ModelResult<Self> {
		let ctx = ParseContext::default();
		let mut reader = ByteReader::new(lump, &ctx);

		let num_clusters: i32 = reader.read().job("Reading cluster count")?;
		let num_clusters = usize::try_from(num_clusters).map_err(|_| ModelError::BadCount {
			what: "cluster",
			count: num_clusters as i64,
			limit: lump.len() / 8,
		})?;
		let offsets: Vec<BspClusterOffsets> = reader.read_many(num_clusters).job("Reading cluster offsets")?;

		for (cluster, offset) in offsets.iter().enumerate() {
			for value in [offset.pvs, offset.phs] {
				if value as usize >= lump.len() {
					return Err(ModelError::IndexOutOfRange {
						what: "visibility offset",
						index: value as i64,
						count: lump.len(),
					})
					.job(format!("Validating cluster {cluster}"));
				}
			}
		}

		Ok(Self {
			offsets,
			bytes: lump.to_vec(),
		})
	}

	#[inline]
	pub fn num_clusters(&self) -> usize {
		self.offsets.len()
	}

	/// Bytes in one decompressed row, one bit per cluster.
	#[inline]
	pub fn row_len(&self) -> usize {
		self.num_clusters().div_ceil(8)
	}

	/// The compressed potentially visible set of `cluster`, running to the end of the lump.
	pub fn pvs(&self, cluster: usize) -> Option<&[u8]> {
		let BspClusterOffsets { pvs, .. } = self.offsets.get(cluster)?;
		self.bytes.get(*pvs as usize..)
	}

	/// The compressed potentially audible set of `cluster`, running to the end of the lump.
	pub fn phs(&self, cluster: usize) -> Option<&[u8]> {
		let BspClusterOffsets { phs, .. } = self.offsets.get(cluster)?;
		self.bytes.get(*phs as usize..)
	}
}

/// Expands a run-length compressed visibility row into `out`, which is resized to `row_len` bytes.
///
/// A nonzero byte is copied through, a zero byte is followed by a count of zero bytes to emit.
/// With no input every cluster is visible.
pub fn decompress_vis(input: Option<&[u8]>, row_len: usize, out: &mut Vec<u8>) {
	out.clear();

	let Some(input) = input else {
		out.resize(row_len, 0xff);
		return;
	};

	let mut bytes = input.iter().copied();
	while out.len() < row_len {
		match bytes.next() {
			Some(0) => {
				let run = bytes.next().unwrap_or(0) as usize;
				let run = run.min(row_len - out.len());
				out.resize(out.len() + run, 0);
			}
			Some(byte) => out.push(byte),
			None => break,
		}
	}

	// Rows cut short by the end of the lump see nothing past that point.
	out.resize(row_len, 0);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decompress_null_is_all_visible() {
		let mut out = Vec::new();
		for clusters in [1, 7, 8, 9, 17] {
			let row_len = usize::div_ceil(clusters, 8);
			decompress_vis(None, row_len, &mut out);
			assert_eq!(out.len(), row_len);
			assert!(out.iter().all(|b| *b == 0xff));
		}
	}

	#[test]
	fn decompress_runs() {
		let mut out = Vec::new();
		decompress_vis(Some(&[0b101, 0, 3, 0xf0, 0xaa]), 5, &mut out);
		assert_eq!(out, [0b101, 0, 0, 0, 0xf0]);
	}

	#[test]
	fn decompress_overlong_run_is_clamped() {
		let mut out = Vec::new();
		decompress_vis(Some(&[1, 0, 200]), 4, &mut out);
		assert_eq!(out, [1, 0, 0, 0]);
	}

	#[test]
	fn decompress_truncated() {
		let mut out = Vec::new();
		decompress_vis(Some(&[0xff]), 3, &mut out);
		assert_eq!(out, [0xff, 0, 0]);
	}

	#[test]
	fn parse_lump() {
		let mut lump = Vec::new();
		lump.extend_from_slice(&2i32.to_le_bytes());
		for offset in [20u32, 21, 22, 23] {
			lump.extend_from_slice(&offset.to_le_bytes());
		}
		lump.extend_from_slice(&[0b01, 0b10, 0b11, 0b11]);

		let vis = BspVisData::parse(&lump).unwrap();
		assert_eq!(vis.num_clusters(), 2);
		assert_eq!(vis.row_len(), 1);
		assert_eq!(vis.pvs(1).unwrap()[0], 0b11);
		assert_eq!(vis.phs(0).unwrap()[0], 0b10);
		assert!(vis.pvs(2).is_none());

		lump[4] = 200;
		assert!(matches!(
			BspVisData::parse(&lump).unwrap_err().root(),
			ModelError::IndexOutOfRange { index: 200, .. }
		));
	}
}
