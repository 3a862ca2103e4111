//! Collaborators the loaders call out to: file access, image lookup, and the renderer's surface preparation.
//!
//! Each is a trait so an engine can plug in its own filesystem, texture cache and GPU upload path.
//! A plain implementation of each is provided for tools and tests.

use std::{
	collections::{HashMap, HashSet},
	fs, io,
	path::PathBuf,
};

use log::{debug, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{surface::SurfaceContext, world::Surface};

/// Loads whole files by game path, e.g. `maps/base1.bsp`.
pub trait FileService {
	/// Returns the file's bytes, or `None` if it doesn't exist or can't be read.
	fn load_file(&mut self, path: &str) -> Option<Vec<u8>>;
}

/// Reads files relative to a directory on disk.
#[derive(Debug, Clone)]
pub struct DirFileService {
	pub root: PathBuf,
}

impl DirFileService {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}
}

impl FileService for DirFileService {
	fn load_file(&mut self, path: &str) -> Option<Vec<u8>> {
		match fs::read(self.root.join(path)) {
			Ok(bytes) => Some(bytes),
			Err(err) if err.kind() == io::ErrorKind::NotFound => {
				debug!("Reading {path}: {err}");
				None
			}
			Err(err) => {
				warn!("Couldn't read {path}: {err}");
				None
			}
		}
	}
}

/// Serves files from memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileService {
	pub files: HashMap<String, Vec<u8>>,
}

impl MemoryFileService {
	pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) -> &mut Self {
		self.files.insert(path.into(), bytes);
		self
	}
}

impl FileService for MemoryFileService {
	fn load_file(&mut self, path: &str) -> Option<Vec<u8>> {
		self.files.get(path).cloned()
	}
}

/// Opaque reference to an image owned by an [`ImageService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageHandle(pub u32);

/// What an image is going to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ImageKind {
	/// World surface texture.
	Wall,
	/// Animated mesh skin.
	Model,
	/// Sprite frame.
	Sprite,
}

pub trait ImageService {
	/// Finds an already loaded image by name, or loads it. Returns `None` if the image doesn't exist,
	/// or isn't loaded and `create_if_missing` is false.
	fn find_or_load(&mut self, name: &str, kind: ImageKind, create_if_missing: bool) -> Option<ImageHandle>;

	/// Placeholder to use wherever an image couldn't be found.
	fn missing_image(&self) -> ImageHandle;

	/// Marks an image as still in use as of registration `generation`.
	fn touch(&mut self, _image: ImageHandle, _generation: u32) {}

	/// Releases images that weren't touched during registration `generation`.
	fn free_unused(&mut self, _generation: u32) {}
}

/// Hands out handles by name without decoding anything. Handle 0 is the missing placeholder.
#[derive(Debug, Clone, Default)]
pub struct ImageCache {
	/// When set, only these names exist.
	pub available: Option<HashSet<String>>,
	handles: HashMap<String, ImageHandle>,
	/// Last generation each handle was touched in, indexed by handle.
	generations: Vec<u32>,
}

impl ImageCache {
	pub fn new() -> Self {
		Self {
			generations: vec![0],
			..Default::default()
		}
	}

	/// A cache where only `names` can be found.
	pub fn with_available<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
		Self {
			available: Some(names.into_iter().map(Into::into).collect()),
			..Self::new()
		}
	}

	pub fn get(&self, name: &str) -> Option<ImageHandle> {
		self.handles.get(name).copied()
	}

	/// Number of loaded images, not counting the placeholder.
	pub fn len(&self) -> usize {
		self.handles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handles.is_empty()
	}
}

impl ImageService for ImageCache {
	fn find_or_load(&mut self, name: &str, _kind: ImageKind, create_if_missing: bool) -> Option<ImageHandle> {
		if let Some(handle) = self.get(name) {
			return Some(handle);
		}
		if !create_if_missing || self.available.as_ref().is_some_and(|available| !available.contains(name)) {
			return None;
		}

		if self.generations.is_empty() {
			self.generations.push(0);
		}
		let handle = ImageHandle(self.generations.len() as u32);
		self.generations.push(0);
		self.handles.insert(name.to_owned(), handle);
		Some(handle)
	}

	fn missing_image(&self) -> ImageHandle {
		ImageHandle(0)
	}

	fn touch(&mut self, image: ImageHandle, generation: u32) {
		if let Some(slot) = self.generations.get_mut(image.0 as usize) {
			*slot = generation;
		}
	}

	fn free_unused(&mut self, generation: u32) {
		let generations = &self.generations;
		self.handles.retain(|name, handle| {
			let keep = generations.get(handle.0 as usize) == Some(&generation);
			if !keep {
				debug!("Freeing unused image {name}");
			}
			keep
		});
	}
}

/// The renderer's side of world loading: lightmap allocation, polygon building and warp subdivision.
///
/// Called once per surface while the face lump is read, between [`Self::begin_lightmaps`] and [`Self::end_lightmaps`].
pub trait SurfaceBuilder {
	fn begin_lightmaps(&mut self, _model_name: &str) {}

	/// Called for surfaces that aren't sky, translucent or warped.
	fn create_surface_lightmap(&mut self, _ctx: &SurfaceContext, _index: usize, _surface: &Surface) {}

	/// Called for every surface that isn't warped.
	fn build_polygon(&mut self, _ctx: &SurfaceContext, _index: usize, _surface: &Surface) {}

	/// Called for warped surfaces, which are cut into smaller polygons instead.
	fn subdivide_surface(&mut self, _ctx: &SurfaceContext, _index: usize, _surface: &Surface) {}

	fn end_lightmaps(&mut self) {}
}

/// A [`SurfaceBuilder`] that does nothing, for loading worlds without a renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSurfaceBuilder;

impl SurfaceBuilder for NullSurfaceBuilder {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn image_cache_lookup() {
		let mut cache = ImageCache::with_available(["textures/e1u1/floor1_1.tga"]);
		let floor = cache.find_or_load("textures/e1u1/floor1_1.tga", ImageKind::Wall, true).unwrap();
		assert_ne!(floor, cache.missing_image());
		assert_eq!(cache.find_or_load("textures/e1u1/floor1_1.tga", ImageKind::Wall, false), Some(floor));
		assert_eq!(cache.find_or_load("textures/nope.tga", ImageKind::Wall, true), None);
		assert_eq!(cache.len(), 1);
	}

	#[test]
	fn image_cache_no_create() {
		let mut cache = ImageCache::new();
		assert_eq!(cache.find_or_load("a.tga", ImageKind::Model, false), None);
		assert!(cache.find_or_load("a.tga", ImageKind::Model, true).is_some());
	}

	#[test]
	fn image_cache_frees_untouched() {
		let mut cache = ImageCache::new();
		let a = cache.find_or_load("a", ImageKind::Sprite, true).unwrap();
		cache.find_or_load("b", ImageKind::Sprite, true).unwrap();
		cache.touch(a, 3);
		cache.free_unused(3);
		assert_eq!(cache.get("a"), Some(a));
		assert_eq!(cache.get("b"), None);
	}

	#[test]
	fn memory_files() {
		let mut files = MemoryFileService::default();
		files.insert("maps/q2dm1.bsp", vec![1, 2, 3]);
		assert_eq!(files.load_file("maps/q2dm1.bsp"), Some(vec![1, 2, 3]));
		assert_eq!(files.load_file("maps/q2dm2.bsp"), None);
	}

	#[test]
	fn dir_files() {
		let root = std::env::temp_dir().join(format!("q2model-dir-files-{}", std::process::id()));
		fs::create_dir_all(root.join("maps/sub")).unwrap();
		fs::write(root.join("maps/q2dm1.bsp"), [1, 2, 3]).unwrap();

		let mut files = DirFileService::new(&root);
		assert_eq!(files.load_file("maps/q2dm1.bsp"), Some(vec![1, 2, 3]));
		assert_eq!(files.load_file("maps/q2dm2.bsp"), None);
		// Errors other than a missing file are also reported as absent.
		assert_eq!(files.load_file("maps/sub"), None);

		fs::remove_dir_all(&root).unwrap();
	}
}
