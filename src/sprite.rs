//! SP2 sprites: a short list of billboard frames, each pointing at an image.

use glam::IVec2;
use log::warn;
use q2model_macros::BspValue;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
	arena::Arena,
	data::util::FixedStr,
	reader::{ByteReader, ParseContext},
	services::{ImageHandle, ImageKind, ImageService},
	ModelError, ModelResult, ModelResultDoingJobExt,
};

pub const SP2_MAGIC: [u8; 4] = *b"IDS2";
pub const SP2_VERSION: i32 = 2;
pub const MAX_FRAMES: usize = 32;

#[derive(BspValue, Debug, Clone)]
struct Sp2Header {
	magic: [u8; 4],
	version: i32,
	num_frames: i32,
}

#[derive(BspValue, Debug, Clone)]
struct Sp2FrameRecord {
	width: i32,
	height: i32,
	origin_x: i32,
	origin_y: i32,
	name: FixedStr<64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpriteFrame {
	pub width: i32,
	pub height: i32,
	/// Raster coordinates of the sprite's origin inside the image.
	pub origin: IVec2,
	pub name: FixedStr<64>,
	pub image: ImageHandle,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sprite {
	pub frames: Vec<SpriteFrame>,
}

impl Sprite {
	pub fn parse(model_name: &str, data: &[u8], arena: &mut Arena, images: &mut dyn ImageService) -> ModelResult<Self> {
		let ctx = ParseContext::default();
		let mut reader = ByteReader::new(data, &ctx);
		let header: Sp2Header = reader.read().job("Reading header")?;

		if header.magic != SP2_MAGIC {
			return Err(ModelError::WrongMagicNumber {
				found: header.magic,
				expected: "IDS2",
			});
		}
		if header.version != SP2_VERSION {
			return Err(ModelError::WrongVersion {
				found: header.version,
				expected: SP2_VERSION,
			});
		}
		let num_frames = usize::try_from(header.num_frames)
			.ok()
			.filter(|count| *count <= MAX_FRAMES)
			.ok_or(ModelError::TooManyFrames {
				count: header.num_frames as i64,
				limit: MAX_FRAMES,
			})?;

		arena.charge(data.len())?;

		let records: Vec<Sp2FrameRecord> = reader.read_many(num_frames).job("Reading frames")?;
		let mut frames = arena.alloc(num_frames)?;
		for record in records {
			let image = images.find_or_load(record.name.as_str(), ImageKind::Sprite, true).unwrap_or_else(|| {
				warn!("Cannot load \"{}\" for sprite \"{model_name}\"", record.name);
				images.missing_image()
			});

			frames.push(SpriteFrame {
				width: record.width,
				height: record.height,
				origin: IVec2::new(record.origin_x, record.origin_y),
				name: record.name,
				image,
			});
		}

		Ok(Self { frames })
	}

	#[inline]
	pub fn num_frames(&self) -> usize {
		self.frames.len()
	}
}
