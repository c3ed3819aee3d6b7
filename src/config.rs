//! Recognized configuration options (§6.2).

use log::Level;

/// Minimum sphere-light radius (§3.4); smaller radii are clamped up to this.
pub const MIN_SPHERE_RADIUS: f32 = 0.02;
/// Lights whose summed color is below this are dropped silently (§3.4).
pub const MIN_COLOR_SUM: f32 = 0.0001;

pub const LIGHT_GRID_SIZE_X: u32 = 16;
pub const LIGHT_GRID_SIZE_Y: u32 = 16;
pub const LIGHT_GRID_SIZE_Z: u32 = 16;
pub const LIGHT_GRID_CELL_SIZE: u32 = 8;

pub const MAX_SECTOR_COUNT: usize = 256;
pub const MAX_LIGHT_LIST_SIZE: usize = 256;

/// Callback used to surface engine log messages to the host (§6.2, §7).
pub type DebugPrintCallback = Box<dyn Fn(Level, &str) + Send + Sync>;

/// Engine-wide configuration, recognized at [`crate::Engine::new`] time.
/// Host callback that creates the native `VkSurfaceKHR` given the raw
/// instance handle, per §9's callback-style surface-creation note — a
/// one-shot construction step, not an ongoing registration.
pub type SurfaceCreationCallback = Box<dyn Fn(ash::vk::Instance) -> ash::vk::SurfaceKHR + Send + Sync>;

pub struct Config {
	pub device_index: Option<u32>,
	pub validation_on: bool,
	pub debug_print_callback: Option<DebugPrintCallback>,

	/// Platform surface instance extensions the host's window system
	/// requires (e.g. `VK_KHR_win32_surface`); `VK_KHR_surface` itself is
	/// always enabled and need not be listed here.
	pub window_surface_extensions: Vec<String>,
	pub surface_creation_callback: Option<SurfaceCreationCallback>,

	pub rasterized_vertex_cap: usize,
	pub rasterized_index_cap: usize,

	/// Vertex/index capacity of the shared static ray-traced collector
	/// (§4.2), and geometry-table capacity reserved for `STATIC*` geometries.
	pub static_vertex_cap: usize,
	pub static_index_cap: usize,
	pub max_static_geometries: usize,

	/// Same, for the per-frame dynamic collector (§4.2).
	pub dynamic_vertex_cap: usize,
	pub dynamic_index_cap: usize,
	pub max_dynamic_geometries: usize,

	/// TLAS instance-buffer capacity; exceeding it on `prepare_for_building_tlas`
	/// is [`crate::RtError::TooManyInstances`] (§4.5.1).
	pub max_top_level_instances: usize,

	pub max_sector_count: usize,

	pub textures_override_folder: Option<String>,
	pub albedo_postfix: String,
	pub normal_postfix: String,
	pub emission_postfix: String,

	pub default_roughness: f32,
	pub default_metallic: f32,

	pub vertex_position_stride: usize,
	pub vertex_normal_stride: usize,
	pub vertex_texcoord_stride: usize,
	pub vertex_color_stride: usize,
	pub vertex_array_of_structs: bool,

	pub disable_geometry_skybox: bool,

	pub cell_world_size: f32,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			device_index: None,
			validation_on: cfg!(debug_assertions),
			debug_print_callback: None,

			window_surface_extensions: Vec::new(),
			surface_creation_callback: None,

			rasterized_vertex_cap: 1 << 20,
			rasterized_index_cap: 1 << 21,

			static_vertex_cap: 1 << 20,
			static_index_cap: 1 << 21,
			max_static_geometries: 1 << 14,

			dynamic_vertex_cap: 1 << 18,
			dynamic_index_cap: 1 << 19,
			max_dynamic_geometries: 1 << 12,

			max_top_level_instances: 1 << 12,

			max_sector_count: MAX_SECTOR_COUNT,

			textures_override_folder: None,
			albedo_postfix: String::new(),
			normal_postfix: "_n".to_string(),
			emission_postfix: "_e".to_string(),

			default_roughness: 1.0,
			default_metallic: 0.0,

			vertex_position_stride: std::mem::size_of::<[f32; 3]>(),
			vertex_normal_stride: std::mem::size_of::<[f32; 3]>(),
			vertex_texcoord_stride: std::mem::size_of::<[f32; 2]>(),
			vertex_color_stride: std::mem::size_of::<u32>(),
			vertex_array_of_structs: false,

			disable_geometry_skybox: false,

			cell_world_size: 4.0,
		}
	}
}

impl Config {
	pub(crate) fn log(&self, level: Level, message: &str) {
		if let Some(cb) = &self.debug_print_callback {
			cb(level, message);
		}
		log::log!(level, "{message}");
	}
}
