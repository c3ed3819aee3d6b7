//! Top-level engine handle (§6.1): the single entry point a host links
//! against, composing device bring-up, the scene, the frame scheduler, and
//! the delegated material store behind one set of inherent methods.
//!
//! `create_instance`/`destroy_instance` become [`Engine::new`]/
//! [`Engine::destroy`] — ownership does the handle-lifetime bookkeeping the
//! original's opaque `RgInstance` needed a matching `rgDestroyInstance` for.
//! Grounded on `original_source/Include/RTGL1/RTGL1.h`'s top-level call
//! list, restated without its C ABI (§1) as `Result`-returning methods.

use crate::config::Config;
use crate::error::{RtError, RtResult};
use crate::geometry::{GeometryUploadInfo, TexCoordUpdate, TransformUpdate};
use crate::gpu::{Device, DeviceCreateInfo};
use crate::math::Vec3;
use crate::pipeline::ShaderSource;
use crate::raster::{RasterCollector, RasterVertex};
use crate::scene::Scene;
use crate::scheduler::{DrawFrameInfo, FrameCompositor, FrameScheduler};
use crate::sector::SectorId;
use crate::util::FxHashMap;

use ash::vk;

/// Recursion depth passed to [`crate::pipeline::Pipeline::new`]. Shadow rays
/// don't recurse further, so two levels (primary hit, shadow/secondary ray)
/// cover every raygen stage in the fixed sequence (§4.7 step 4).
const MAX_RECURSION_DEPTH: u32 = 2;

/// `RG_NO_MATERIAL` in the original — destroying it is a no-op.
pub const NO_MATERIAL: u64 = 0;

/// `RgStaticMaterialCreateInfo`, narrowed to what this crate's contract with
/// the (external) texture store needs: a path to resolve and the override
/// postfixes in [`Config`] to apply, or raw pixel data if no file exists.
#[derive(Debug, Clone, Default)]
pub struct StaticMaterialInfo {
	pub relative_path: Option<String>,
	pub width: u32,
	pub height: u32,
	pub pixels: Option<Vec<u8>>,
	pub is_srgb: bool,
	pub use_mipmaps: bool,
}

/// `RgAnimatedMaterialCreateInfo`: a fixed sequence of static-material
/// frames, switched between by [`MaterialStore::change_animated_material_frame`].
#[derive(Debug, Clone, Default)]
pub struct AnimatedMaterialInfo {
	pub frames: Vec<StaticMaterialInfo>,
}

/// `RgDynamicMaterialCreateInfo`/`RgDynamicMaterialUpdateInfo`: a texture the
/// host rewrites at runtime (e.g. a video frame or UI render target).
#[derive(Debug, Clone, Default)]
pub struct DynamicMaterialInfo {
	pub width: u32,
	pub height: u32,
	pub pixels: Option<Vec<u8>>,
	pub is_srgb: bool,
}

/// `RgCubemapCreateInfo`, paths-only variant (`RgCubemapFacePaths`).
#[derive(Debug, Clone, Default)]
pub struct CubemapInfo {
	pub positive_x: Option<String>,
	pub negative_x: Option<String>,
	pub positive_y: Option<String>,
	pub negative_y: Option<String>,
	pub positive_z: Option<String>,
	pub negative_z: Option<String>,
}

/// Materials/textures/cubemaps (§6.1, delegated): texture file handling and
/// the memory allocator backing them are external collaborators (§1), so
/// this crate only fixes the contract — ids in, ids out, error kinds — and
/// leaves storing the actual texel data to the host's implementation of
/// this trait.
pub trait MaterialStore {
	fn create_static_material(&mut self, info: StaticMaterialInfo) -> RtResult<u64>;
	fn create_animated_material(&mut self, info: AnimatedMaterialInfo) -> RtResult<u64>;
	fn change_animated_material_frame(&mut self, material_id: u64, frame_index: u32) -> RtResult<()>;
	fn create_dynamic_material(&mut self, info: DynamicMaterialInfo) -> RtResult<u64>;
	fn update_dynamic_material(&mut self, material_id: u64, info: DynamicMaterialInfo) -> RtResult<()>;
	fn destroy_material(&mut self, material_id: u64) -> RtResult<()>;
	fn create_cubemap(&mut self, info: CubemapInfo) -> RtResult<u64>;
	fn destroy_cubemap(&mut self, cubemap_id: u64) -> RtResult<()>;
}

enum MaterialKind {
	Static,
	Animated { frame_count: u32 },
	Dynamic,
}

/// Default [`MaterialStore`]: records the call shape (ids, kinds) without
/// backing any actual texture storage, enough for a host that doesn't need
/// materials at all, or as a reference for a host writing its own store.
#[derive(Default)]
pub struct DefaultMaterialStore {
	next_id: u64,
	materials: FxHashMap<u64, MaterialKind>,
	cubemaps: FxHashMap<u64, ()>,
}

impl DefaultMaterialStore {
	fn allocate_id(&mut self) -> u64 {
		self.next_id += 1;
		self.next_id
	}
}

impl MaterialStore for DefaultMaterialStore {
	fn create_static_material(&mut self, _info: StaticMaterialInfo) -> RtResult<u64> {
		let id = self.allocate_id();
		self.materials.insert(id, MaterialKind::Static);
		Ok(id)
	}

	fn create_animated_material(&mut self, info: AnimatedMaterialInfo) -> RtResult<u64> {
		let id = self.allocate_id();
		self.materials.insert(id, MaterialKind::Animated { frame_count: info.frames.len() as u32 });
		Ok(id)
	}

	fn change_animated_material_frame(&mut self, material_id: u64, frame_index: u32) -> RtResult<()> {
		match self.materials.get(&material_id) {
			Some(MaterialKind::Animated { frame_count }) if frame_index < *frame_count => Ok(()),
			Some(MaterialKind::Animated { .. }) => {
				Err(RtError::WrongArgument(format!("animated material {material_id} has no frame {frame_index}")))
			}
			Some(_) => Err(RtError::CannotUpdateAnimatedMaterial(material_id)),
			None => Err(RtError::WrongInstance),
		}
	}

	fn create_dynamic_material(&mut self, _info: DynamicMaterialInfo) -> RtResult<u64> {
		let id = self.allocate_id();
		self.materials.insert(id, MaterialKind::Dynamic);
		Ok(id)
	}

	fn update_dynamic_material(&mut self, material_id: u64, _info: DynamicMaterialInfo) -> RtResult<()> {
		match self.materials.get(&material_id) {
			Some(MaterialKind::Dynamic) => Ok(()),
			Some(_) => Err(RtError::CannotUpdateDynamicMaterial(material_id)),
			None => Err(RtError::WrongInstance),
		}
	}

	fn destroy_material(&mut self, material_id: u64) -> RtResult<()> {
		if material_id == NO_MATERIAL {
			return Ok(());
		}
		self.materials.remove(&material_id).map(|_| ()).ok_or(RtError::WrongInstance)
	}

	fn create_cubemap(&mut self, _info: CubemapInfo) -> RtResult<u64> {
		let id = self.allocate_id();
		self.cubemaps.insert(id, ());
		Ok(id)
	}

	fn destroy_cubemap(&mut self, cubemap_id: u64) -> RtResult<()> {
		self.cubemaps.remove(&cubemap_id).map(|_| ()).ok_or(RtError::WrongInstance)
	}
}

/// `create_instance`/`destroy_instance` (§6.1): the engine's single entry
/// point, composing device bring-up (§9), the scene (§2.10), the frame
/// scheduler (§2.13), and the delegated material store (§6.1).
pub struct Engine {
	device: Device,
	config: Config,
	scene: Scene,
	shaders: Box<dyn ShaderSource>,
	scheduler: Option<FrameScheduler>,
	surface: vk::SurfaceKHR,
	material_store: Box<dyn MaterialStore>,
	rasterized: RasterCollector,
	current_frame: Option<usize>,
}

impl Engine {
	/// `create_instance(config) -> handle` (§6.1). `shaders` is the host's
	/// [`ShaderSource`] implementation — shader compilation itself is out of
	/// scope (§1), so this is the one extra parameter the language-neutral
	/// signature doesn't name.
	pub fn new(config: Config, shaders: Box<dyn ShaderSource>) -> RtResult<Self> {
		let callback = config
			.surface_creation_callback
			.as_ref()
			.ok_or_else(|| RtError::WrongArgument("Config::surface_creation_callback is required".into()))?;

		let device_info = DeviceCreateInfo {
			application_name: "rtcore",
			enable_validation: config.validation_on,
			window_surface_extensions: &config.window_surface_extensions,
		};
		let mut device = Device::new(&device_info)?;
		let surface = callback(device.instance().handle());

		let scene = Scene::new(&mut device, &config)?;
		let rasterized = RasterCollector::new(&mut device, config.rasterized_vertex_cap, config.rasterized_index_cap)?;

		Ok(Self {
			device,
			config,
			scene,
			shaders,
			scheduler: None,
			surface,
			material_store: Box::new(DefaultMaterialStore::default()),
			rasterized,
			current_frame: None,
		})
	}

	/// Swaps in a host-supplied [`MaterialStore`], e.g. one backed by real
	/// texture storage, in place of the no-op [`DefaultMaterialStore`].
	pub fn set_material_store(&mut self, store: Box<dyn MaterialStore>) {
		self.material_store = store;
	}

	/// `destroy_instance` (§6.1).
	pub fn destroy(mut self) {
		let _ = self.device.wait_idle();
		if let Some(scheduler) = self.scheduler.take() {
			scheduler.destroy(&mut self.device);
		}
		self.rasterized.destroy(&mut self.device);
		self.scene.destroy(&mut self.device);

		let surface_ext = ash::extensions::khr::Surface::new(self.device.entry(), self.device.instance());
		unsafe { surface_ext.destroy_surface(self.surface, None) };
	}

	// --- Scene (§6.1) ---------------------------------------------------

	pub fn start_new_scene(&mut self) {
		self.scene.start_new_scene();
	}

	pub fn upload_geometry(&mut self, info: &GeometryUploadInfo) -> RtResult<usize> {
		self.scene.upload_geometry(info)
	}

	pub fn update_geometry_transform(&mut self, update: &TransformUpdate) -> RtResult<()> {
		self.scene.update_geometry_transform(update)
	}

	pub fn update_geometry_tex_coords(&mut self, update: &TexCoordUpdate) -> RtResult<()> {
		let frame = self.current_frame.ok_or(RtError::FrameNotStarted)?;
		self.scene.update_geometry_tex_coords(frame, update)
	}

	pub fn submit_static_geometries(&mut self) -> RtResult<()> {
		self.scene.submit_static_geometries(&mut self.device)
	}

	pub fn declare_sector(&mut self, sector: SectorId) -> RtResult<()> {
		self.scene.declare_sector(sector)
	}

	pub fn set_sector_visible(&mut self, a: SectorId, b: SectorId) -> RtResult<()> {
		self.scene.set_sector_visible(a, b)
	}

	// --- Lights (§6.1) ---------------------------------------------------
	// Per-frame, like dynamic geometry uploads (§4.2): only valid between
	// `start_frame` and `draw_frame`.

	#[allow(clippy::too_many_arguments)]
	pub fn upload_directional_light(
		&mut self,
		unique_id: u64,
		sector: SectorId,
		direction: Vec3,
		angular_radius: f32,
		color: Vec3,
	) -> RtResult<()> {
		let frame = self.current_frame.ok_or(RtError::FrameNotStarted)?;
		self.scene.light_manager.add_directional(frame, unique_id, sector, direction, angular_radius, color)
	}

	pub fn upload_spherical_light(
		&mut self,
		unique_id: u64,
		sector: SectorId,
		center: Vec3,
		radius: f32,
		color: Vec3,
	) -> RtResult<()> {
		let frame = self.current_frame.ok_or(RtError::FrameNotStarted)?;
		self.scene.light_manager.add_spherical(frame, unique_id, sector, center, radius, color)
	}

	pub fn upload_polygonal_light(
		&mut self,
		unique_id: u64,
		sector: SectorId,
		positions: [Vec3; 3],
		color: Vec3,
	) -> RtResult<()> {
		let frame = self.current_frame.ok_or(RtError::FrameNotStarted)?;
		self.scene.light_manager.add_polygonal(frame, unique_id, sector, positions, color)
	}

	#[allow(clippy::too_many_arguments)]
	pub fn upload_spot_light(
		&mut self,
		unique_id: u64,
		sector: SectorId,
		center: Vec3,
		radius: f32,
		direction: Vec3,
		cos_inner: f32,
		cos_outer: f32,
		color: Vec3,
	) -> RtResult<()> {
		let frame = self.current_frame.ok_or(RtError::FrameNotStarted)?;
		self.scene.light_manager.add_spot(frame, unique_id, sector, center, radius, direction, cos_inner, cos_outer, color)
	}

	// --- Materials/textures/cubemaps (§6.1, delegated) -------------------

	pub fn create_static_material(&mut self, info: StaticMaterialInfo) -> RtResult<u64> {
		self.material_store.create_static_material(info)
	}

	pub fn create_animated_material(&mut self, info: AnimatedMaterialInfo) -> RtResult<u64> {
		self.material_store.create_animated_material(info)
	}

	pub fn change_animated_material_frame(&mut self, material_id: u64, frame_index: u32) -> RtResult<()> {
		self.material_store.change_animated_material_frame(material_id, frame_index)
	}

	pub fn create_dynamic_material(&mut self, info: DynamicMaterialInfo) -> RtResult<u64> {
		self.material_store.create_dynamic_material(info)
	}

	pub fn update_dynamic_material(&mut self, material_id: u64, info: DynamicMaterialInfo) -> RtResult<()> {
		self.material_store.update_dynamic_material(material_id, info)
	}

	pub fn destroy_material(&mut self, material_id: u64) -> RtResult<()> {
		self.material_store.destroy_material(material_id)
	}

	pub fn create_cubemap(&mut self, info: CubemapInfo) -> RtResult<u64> {
		self.material_store.create_cubemap(info)
	}

	pub fn destroy_cubemap(&mut self, cubemap_id: u64) -> RtResult<()> {
		self.material_store.destroy_cubemap(cubemap_id)
	}

	// --- Frame (§6.1) -----------------------------------------------------

	/// `start_frame(surface_w, surface_h, vsync, reload_shaders)`. Builds
	/// the frame scheduler lazily, on the first call, once the surface
	/// dimensions the swapchain needs are actually known.
	pub fn start_frame(&mut self, surface_w: u32, surface_h: u32, vsync: bool, reload_shaders: bool) -> RtResult<()> {
		if self.current_frame.is_some() {
			return Err(RtError::FrameNotEnded);
		}

		if self.scheduler.is_none() {
			let scheduler = FrameScheduler::new(
				&mut self.device,
				self.surface,
				surface_w,
				surface_h,
				vsync,
				&self.config,
				self.shaders.as_ref(),
				MAX_RECURSION_DEPTH,
			)?;
			self.scheduler = Some(scheduler);
		}

		let frame = self.scheduler.as_mut().unwrap().start_frame(
			&mut self.device,
			&mut self.scene,
			surface_w,
			surface_h,
			vsync,
			reload_shaders,
			self.shaders.as_ref(),
			MAX_RECURSION_DEPTH,
		)?;
		self.current_frame = Some(frame);
		Ok(())
	}

	/// `upload_rasterized_geometry` (§6.1). Valid only within a started
	/// frame (§4.2's per-frame lifetime); the buffer is rewritten from the
	/// start on every call, matching the original's discard-per-frame note.
	pub fn upload_rasterized_geometry(&mut self, vertices: &[RasterVertex], indices: &[u32]) -> RtResult<()> {
		if self.current_frame.is_none() {
			return Err(RtError::FrameNotStarted);
		}
		self.rasterized.upload(vertices, indices)
	}

	/// Requests a pipeline rebuild on the next `start_frame` (§4.7 step 2),
	/// independent of the `reload_shaders` flag passed there.
	pub fn request_shader_reload(&mut self) {
		if let Some(scheduler) = self.scheduler.as_mut() {
			scheduler.request_shader_reload();
		}
	}

	/// `draw_frame(draw_info)` (§6.1).
	pub fn draw_frame(&mut self, compositor: &dyn FrameCompositor, draw_info: DrawFrameInfo) -> RtResult<()> {
		let scheduler = self.scheduler.as_mut().ok_or(RtError::FrameNotStarted)?;
		scheduler.draw_frame(&mut self.device, &mut self.scene, compositor, draw_info)?;
		self.current_frame = None;
		Ok(())
	}
}
