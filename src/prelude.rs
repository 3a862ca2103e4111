//! The types most users of the registry need, for glob importing.

pub use crate::{
	interp::Orientation,
	md3::{Lod, Md3Model},
	query::{Pvs, RaycastResult},
	registry::{Model, ModelData, ModelHandle, ModelKind, ModelRegistry, RegistryLimits},
	services::{DirFileService, FileService, ImageCache, ImageHandle, ImageKind, ImageService, MemoryFileService, NullSurfaceBuilder, SurfaceBuilder},
	sprite::Sprite,
	world::World,
	ModelError, ModelResult,
};
