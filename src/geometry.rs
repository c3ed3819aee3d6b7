//! Geometry record (§3.2): the host-facing description of an uploaded
//! triangle mesh, and its lifecycle rules.

use crate::filter::Filter;
use crate::math::{Mat4, Vec2, Vec3};

/// Per-layer material/blend assignment (§3.2 `layer_materials`/`layer_colors`/`layer_blend`).
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialLayer {
	pub material_id: Option<u64>,
	pub color_factor: [f32; 4],
	pub blend: LayerBlend,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LayerBlend {
	#[default]
	Opaque,
	Alpha,
	Additive,
	Shade,
}

/// A single uploaded triangle mesh (§3.2).
#[derive(Debug, Clone)]
pub struct GeometryUploadInfo {
	/// Globally unique among currently-live geometries; re-registering an
	/// id already live is `id_not_unique` (§4.5.2).
	pub unique_id: u64,
	pub filter: Filter,

	pub vertex_count: usize,
	pub positions: Vec<Vec3>,
	pub normals: Vec<Vec3>,
	pub tex_coord_layers: [Option<Vec<Vec2>>; 3],
	pub colors: Option<Vec<u32>>,
	pub indices: Option<Vec<u32>>,

	pub layers: [MaterialLayer; 3],

	pub default_roughness: f32,
	pub default_metallic: f32,
	pub default_emission: f32,

	pub transform: Mat4,
}

impl GeometryUploadInfo {
	/// Number of triangles: indexed count/3, else vertex_count/3.
	pub fn primitive_count(&self) -> usize {
		match &self.indices {
			Some(indices) => indices.len() / 3,
			None => self.vertex_count / 3,
		}
	}
}

/// A request to update the transform of a `STATIC_MOVABLE` geometry (§3.2, §4.2).
#[derive(Debug, Clone, Copy)]
pub struct TransformUpdate {
	pub unique_id: u64,
	pub transform: Mat4,
}

/// A request to update texture coordinates of a `STATIC*` geometry (§3.2, §4.2).
#[derive(Debug, Clone)]
pub struct TexCoordUpdate {
	pub unique_id: u64,
	pub offset: usize,
	pub layers: [Option<Vec<Vec2>>; 3],
}
