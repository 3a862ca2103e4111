//! The model table: name lookup, loading by format, inline brush models, and registration generations.
//!
//! A level load calls [`ModelRegistry::begin_world_registration`], registers everything the level uses with
//! [`ModelRegistry::register_model`], then [`ModelRegistry::end_world_registration`] frees whatever wasn't registered again.

use std::{fmt, sync::Arc};

use glam::Vec3;
use log::{debug, warn};

use crate::{
	arena::Arena,
	data::nodes::BspNodeRef,
	md3::{Md3Mesh, Md3Model},
	reader::BspSchema,
	services::{FileService, ImageHandle, ImageService, SurfaceBuilder},
	sprite::Sprite,
	util::leading_int,
	world::{InlineModel, World},
	ModelError, ModelFormat, ModelResult, ModelResultDoingJobExt,
};

pub const MAX_MODELS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryLimits {
	/// Size of the slot table.
	pub max_models: usize,
}

impl Default for RegistryLimits {
	fn default() -> Self {
		Self { max_models: MAX_MODELS }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ModelKind {
	Bad,
	#[strum(serialize = "BSP")]
	Brush,
	Sprite,
	Md3,
}

/// A brush model: the world itself or one of its inline models.
#[derive(Debug, Clone)]
pub struct BrushModel {
	pub world: Arc<World>,
	/// Index into [`World::inline_models`], 0 for the world.
	pub submodel: usize,
}

impl BrushModel {
	pub fn inline_model(&self) -> &InlineModel {
		&self.world.inline_models[self.submodel]
	}

	/// The leaf `point` is in, descending from this model's head node.
	pub fn point_in_leaf(&self, point: Vec3) -> ModelResult<usize> {
		self.world.point_in_leaf_from(BspNodeRef::Node(self.inline_model().head_node), point)
	}
}

#[derive(Debug, Clone, Default)]
pub enum ModelData {
	#[default]
	Bad,
	Brush(BrushModel),
	Sprite(Sprite),
	Md3(Md3Model),
}

#[derive(Debug, Clone, Default)]
pub struct Model {
	/// Empty for a free slot.
	pub name: String,
	/// Generation this model was last registered in.
	pub registration_sequence: u32,
	pub data: ModelData,
	/// Bytes charged to the model's arena while loading.
	pub extradata_size: usize,
	pub mins: Vec3,
	pub maxs: Vec3,
	pub radius: f32,
}

/// Handed out by [`ModelRegistry::by_index`] before any model is loaded.
static EMPTY_MODEL: Model = Model {
	name: String::new(),
	registration_sequence: 0,
	data: ModelData::Bad,
	extradata_size: 0,
	mins: Vec3::ZERO,
	maxs: Vec3::ZERO,
	radius: 0.,
};

impl Model {
	pub fn kind(&self) -> ModelKind {
		match self.data {
			ModelData::Bad => ModelKind::Bad,
			ModelData::Brush(_) => ModelKind::Brush,
			ModelData::Sprite(_) => ModelKind::Sprite,
			ModelData::Md3(_) => ModelKind::Md3,
		}
	}

	pub fn num_frames(&self) -> usize {
		match &self.data {
			ModelData::Bad => 0,
			ModelData::Brush(_) => 2,
			ModelData::Sprite(sprite) => sprite.num_frames(),
			ModelData::Md3(md3) => md3.num_frames(),
		}
	}

	/// Fails with [`ModelError::NoNodes`] for models without a node tree.
	pub fn point_in_leaf(&self, point: Vec3) -> ModelResult<usize> {
		match &self.data {
			ModelData::Brush(brush) => brush.point_in_leaf(point),
			_ => Err(ModelError::NoNodes),
		}
	}

	#[inline]
	pub fn is_free(&self) -> bool {
		self.name.is_empty()
	}

	/// Every image this model draws with.
	pub fn images(&self) -> Vec<ImageHandle> {
		match &self.data {
			ModelData::Bad => Vec::new(),
			ModelData::Brush(brush) => brush.world.tex_info.iter().map(|info| info.image).collect(),
			ModelData::Sprite(sprite) => sprite.frames.iter().map(|frame| frame.image).collect(),
			ModelData::Md3(md3) => md3
				.lods
				.iter()
				.flat_map(|mesh| &mesh.surfaces)
				.flat_map(|surface| &surface.shaders)
				.map(|shader| shader.image)
				.collect(),
		}
	}

	fn brush(name: String, world: &Arc<World>, submodel: usize) -> Self {
		let inline = &world.inline_models[submodel];
		Self {
			name,
			data: ModelData::Brush(BrushModel {
				world: world.clone(),
				submodel,
			}),
			mins: inline.mins,
			maxs: inline.maxs,
			radius: inline.radius,
			..Default::default()
		}
	}
}

/// Refers to a model owned by a [`ModelRegistry`]. Invalidated when the model is freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelHandle {
	/// Index into the slot table.
	Slot(usize),
	/// Inline model `*N` of the current world.
	Inline(usize),
}

/// One row of [`ModelRegistry::model_list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelListEntry {
	pub index: usize,
	pub kind: ModelKind,
	pub name: String,
	pub num_frames: usize,
	pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelList {
	pub entries: Vec<ModelListEntry>,
	pub total_bytes: usize,
	pub in_use: usize,
	pub capacity: usize,
}

impl fmt::Display for ModelList {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "Loaded models:")?;
		for entry in &self.entries {
			if entry.kind == ModelKind::Brush {
				writeln!(f, "{}: {} '{}' [{} bytes]", entry.index, entry.kind, entry.name, entry.size)?;
			} else {
				writeln!(
					f,
					"{}: {} '{}' [{} frames, {} bytes]",
					entry.index, entry.kind, entry.name, entry.num_frames, entry.size
				)?;
			}
		}
		writeln!(f)?;
		writeln!(f, "Total resident: {}", self.total_bytes)?;
		write!(f, "Total {} out of {} models in use", self.in_use, self.capacity)
	}
}

pub struct ModelRegistry<F, I, B> {
	pub files: F,
	pub images: I,
	pub builder: B,
	pub limits: RegistryLimits,
	models: Vec<Model>,
	/// Inline models of the world in slot 0, index 0 being the world itself.
	inline_models: Vec<Model>,
	registration_sequence: u32,
}

impl<F: FileService, I: ImageService, B: SurfaceBuilder> ModelRegistry<F, I, B> {
	pub fn new(files: F, images: I, builder: B) -> Self {
		Self::with_limits(files, images, builder, RegistryLimits::default())
	}

	pub fn with_limits(files: F, images: I, builder: B, limits: RegistryLimits) -> Self {
		Self {
			files,
			images,
			builder,
			limits,
			models: Vec::new(),
			inline_models: Vec::new(),
			registration_sequence: 0,
		}
	}

	#[inline]
	pub fn registration_sequence(&self) -> u32 {
		self.registration_sequence
	}

	pub fn get(&self, handle: ModelHandle) -> Option<&Model> {
		let model = match handle {
			ModelHandle::Slot(index) => self.models.get(index)?,
			ModelHandle::Inline(index) => self.inline_models.get(index)?,
		};
		(!model.is_free()).then_some(model)
	}

	/// The model in slot `index`. Slot 0 and out of range indices give the world slot, or an empty model if there is none.
	pub fn by_index(&self, index: usize) -> &Model {
		self.models
			.get(index)
			.filter(|_| index >= 1)
			.or_else(|| self.models.first())
			.unwrap_or(&EMPTY_MODEL)
	}

	/// The world in slot 0, if one is loaded.
	pub fn world(&self) -> Option<&Arc<World>> {
		match &self.models.first()?.data {
			ModelData::Brush(brush) => Some(&brush.world),
			_ => None,
		}
	}

	/// Resolves `name` to a loaded model, loading it if necessary.
	///
	/// Returns `Ok(None)` when the file doesn't exist and `must_exist` is false. Any other failure is an error,
	/// and leaves no model behind.
	pub fn find(&mut self, name: &str, must_exist: bool) -> ModelResult<Option<ModelHandle>> {
		if name.is_empty() {
			return Err(ModelError::EmptyName);
		}

		// Inline models are only taken from the current world.
		if let Some(number) = name.strip_prefix('*') {
			let number = leading_int(number);
			if number < 1 || self.world().is_none() || number as usize >= self.inline_models.len() {
				return Err(ModelError::BadInlineModel {
					number,
					count: self.inline_models.len(),
				});
			}
			return Ok(Some(ModelHandle::Inline(number as usize)));
		}

		if let Some(index) = self.models.iter().position(|model| model.name == name) {
			return Ok(Some(ModelHandle::Slot(index)));
		}

		let index = match self.models.iter().position(Model::is_free) {
			Some(index) => index,
			None if self.models.len() >= self.limits.max_models => {
				return Err(ModelError::TooManyModels {
					limit: self.limits.max_models,
				});
			}
			None => {
				self.models.push(Model::default());
				self.models.len() - 1
			}
		};

		let Some(data) = self.files.load_file(name) else {
			if must_exist {
				return Err(ModelError::NotFound(name.to_owned()));
			}
			return Ok(None);
		};

		let model = self.load(index, name, &data).job(format!("Loading {name}"))?;
		self.models[index] = model;
		Ok(Some(ModelHandle::Slot(index)))
	}

	/// Parses `data` as whichever format its magic number says, for slot `index`.
	fn load(&mut self, index: usize, name: &str, data: &[u8]) -> ModelResult<Model> {
		let magic: [u8; 4] = data
			.get(..4)
			.and_then(|magic| magic.try_into().ok())
			.ok_or(ModelError::BufferOutOfBounds {
				from: 0,
				to: 4,
				size: data.len(),
			})?;
		let format = ModelFormat::from_magic_number(magic)?;
		let mut arena = Arena::begin(format.arena_budget(), name);

		let mut model = match format {
			ModelFormat::Bsp(schema) => return self.load_world(index, name, data, schema, arena),
			ModelFormat::Md3 => {
				let mesh = Md3Mesh::parse(name, data, &mut arena, &mut self.images)?;
				let md3 = Md3Model::new(mesh);
				Model {
					mins: md3.mins,
					maxs: md3.maxs,
					data: ModelData::Md3(md3),
					..Default::default()
				}
			}
			ModelFormat::Sp2 => Model {
				data: ModelData::Sprite(Sprite::parse(name, data, &mut arena, &mut self.images)?),
				..Default::default()
			},
		};

		model.name = name.to_owned();
		model.registration_sequence = self.registration_sequence;
		model.extradata_size = arena.end();
		debug!("Loaded {} {name} into slot {index}, {} bytes", model.kind(), model.extradata_size);
		Ok(model)
	}

	fn load_world(&mut self, index: usize, name: &str, data: &[u8], schema: BspSchema, mut arena: Arena) -> ModelResult<Model> {
		if index != 0 {
			return Err(ModelError::BrushModelNotWorld);
		}

		let world = Arc::new(World::load(name, data, schema, &mut arena, &mut self.images, &mut self.builder)?);

		self.inline_models = (0..world.inline_models.len())
			.map(|i| Model::brush(format!("*{i}"), &world, i))
			.collect();

		let mut model = Model::brush(name.to_owned(), &world, 0);
		model.registration_sequence = self.registration_sequence;
		model.extradata_size = arena.end();
		debug!("Loaded world {name} ({schema:?}), {} bytes", model.extradata_size);
		Ok(model)
	}

	/// Resolves `name` without failing on a missing file, and marks it and its images as used in this generation.
	pub fn register_model(&mut self, name: &str) -> ModelResult<Option<ModelHandle>> {
		let Some(handle) = self.find(name, false)? else {
			warn!("Couldn't register {name}");
			return Ok(None);
		};

		let generation = self.registration_sequence;
		let model = match handle {
			ModelHandle::Slot(index) => {
				let model = &mut self.models[index];
				model.registration_sequence = generation;
				&*model
			}
			ModelHandle::Inline(index) => &self.inline_models[index],
		};
		for image in model.images() {
			self.images.touch(image, generation);
		}

		Ok(Some(handle))
	}

	/// Starts a new registration generation and makes sure `maps/{world_name}.bsp` is loaded in slot 0.
	///
	/// The world is reloaded only if it changed, or if `flush_map` is set.
	pub fn begin_world_registration(&mut self, world_name: &str, flush_map: bool) -> ModelResult<ModelHandle> {
		self.registration_sequence = self.registration_sequence.wrapping_add(1);
		let full_name = format!("maps/{world_name}.bsp");

		if self.models.first().is_some_and(|world| world.name != full_name || flush_map) {
			self.free(0);
		}

		let handle = self.find(&full_name, true)?.ok_or(ModelError::NotFound(full_name))?;
		let generation = self.registration_sequence;
		if let ModelHandle::Slot(index) = handle {
			self.models[index].registration_sequence = generation;
			for image in self.models[index].images() {
				self.images.touch(image, generation);
			}
		}

		Ok(handle)
	}

	/// Frees every model that wasn't registered in the current generation, then the images nothing uses anymore.
	pub fn end_world_registration(&mut self) {
		let generation = self.registration_sequence;
		for index in 0..self.models.len() {
			let model = &self.models[index];
			if !model.is_free() && model.registration_sequence != generation {
				debug!("Freeing unused model {}", model.name);
				self.free(index);
			}
		}
		self.images.free_unused(generation);
	}

	/// Frees the model in slot `index`, and the inline models with it if it's the world.
	pub fn free(&mut self, index: usize) {
		let Some(model) = self.models.get_mut(index) else { return };
		if matches!(model.data, ModelData::Brush(_)) {
			self.inline_models.clear();
		}
		*model = Model::default();
	}

	pub fn free_all(&mut self) {
		for index in 0..self.models.len() {
			self.free(index);
		}
	}

	pub fn model_list(&self) -> ModelList {
		let entries: Vec<ModelListEntry> = self
			.models
			.iter()
			.enumerate()
			.filter(|(_, model)| !model.is_free())
			.map(|(index, model)| ModelListEntry {
				index,
				kind: model.kind(),
				name: model.name.clone(),
				num_frames: model.num_frames(),
				size: model.extradata_size,
			})
			.collect();

		ModelList {
			total_bytes: entries.iter().map(|entry| entry.size).sum(),
			in_use: entries.len(),
			capacity: self.limits.max_models,
			entries,
		}
	}
}
