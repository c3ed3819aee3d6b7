//! Vertex collector (§2.3, §4.2): filter-flag-indexed packing of triangle
//! data into shared typed buffers, and the geometry-instance table each
//! uploaded mesh contributes a record to (§3.3).
//!
//! One instance of this type serves as the static collector (fed only
//! during scene recording, §4.5) and `MAX_FRAMES_IN_FLIGHT` more instances
//! serve as the per-frame dynamic collectors; both share the same
//! packing logic, differing only in who calls `begin_collecting`/
//! `end_collecting` and how often.

use crate::auto_buffer::AutoBuffer;
use crate::error::{RtError, RtResult};
use crate::filter::Filter;
use crate::geometry::GeometryUploadInfo;
use crate::gpu::{AsTriangleGeometry, BufferUsage, Device, GpuPtr};
use crate::math::{Mat3x4, Vec2, Vec3};
use crate::util::{encode_normal_oct, pack_layer_materials};

use ash::vk;

/// One packed vertex, interleaved per §3.3's "static/dynamic vertex buffer"
/// contract.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct Vertex {
	pub position: Vec3,
	pub normal_oct: u32,
	pub tex_coords: [Vec2; 3],
	pub color: u32,
	pub layer_materials: u32,
}

impl Default for Vertex {
	fn default() -> Self {
		Self {
			position: Vec3::new(0.0, 0.0, 0.0),
			normal_oct: 0,
			tex_coords: [Vec2::new(0.0, 0.0); 3],
			color: 0xFFFF_FFFF,
			layer_materials: 0,
		}
	}
}

/// One record in the geometry-instance table (§3.3).
#[derive(Clone, Copy)]
#[repr(C)]
pub struct GeometryInstanceRecord {
	pub model: Mat3x4,
	pub prev_model: Mat3x4,
	pub flags: u32,
	pub base_vertex: u32,
	pub base_index: u32,
	pub vertex_count: u32,
	pub index_count: u32,
	pub material_ids: [u32; 3],
	pub layer_color_factors: [[f32; 4]; 3],
	pub roughness: f32,
	pub metallic: f32,
	pub emission_mult: f32,
}

/// `(first_index, primitive_count, first_vertex)` build-range entry (§4.2 #2).
#[derive(Clone, Copy)]
pub struct BuildRange {
	pub first_index: u32,
	pub primitive_count: u32,
	pub first_vertex: u32,
}

struct PendingGeometry {
	local_index: usize,
	vertices: Vec<Vertex>,
	indices: Vec<u32>,
}

#[derive(Default)]
struct FilterBucket {
	pending: Vec<PendingGeometry>,
	geometries: Vec<AsTriangleGeometry>,
	build_ranges: Vec<BuildRange>,
	primitive_counts: Vec<u32>,
	/// Offset of this filter's first geometry within [`VertexCollector::table_order`],
	/// i.e. the BLAS-local geometry index base a raygen/hit shader adds to
	/// `gl_GeometryIndexEXT` to reach this BLAS's records in the
	/// geometry-instance table (§4.5.1's `geom_info_offset`).
	geom_info_offset: u32,
}

/// Owns one shared vertex/index buffer (via [`AutoBuffer`]) plus the
/// per-filter build bookkeeping described in §4.2.
pub struct VertexCollector {
	vertex_buffer: AutoBuffer<Vertex>,
	index_buffer: AutoBuffer<u32>,
	buckets: Vec<FilterBucket>,
	geometry_instances: Vec<GeometryInstanceRecord>,
	/// `local_index` values in the same contiguous per-filter order as the
	/// BLAS geometry arrays, i.e. the permutation the geometry-instance
	/// table must be written in for `gl_GeometryIndexEXT` lookups to line up
	/// with a BLAS's `geom_info_offset` (§3.3, §4.5.1).
	table_order: Vec<usize>,
	vertex_cursor: u32,
	index_cursor: u32,
	collecting: bool,
}

impl VertexCollector {
	pub fn new(device: &mut Device, vertex_capacity: usize, index_capacity: usize) -> RtResult<Self> {
		let vertex_buffer = AutoBuffer::new(device, vertex_capacity, BufferUsage::SHADER_RESOURCE)?;
		let index_buffer = AutoBuffer::new(device, index_capacity, BufferUsage::SHADER_RESOURCE | BufferUsage::INDEX)?;

		Ok(Self {
			vertex_buffer,
			index_buffer,
			buckets: (0..Filter::COUNT).map(|_| FilterBucket::default()).collect(),
			geometry_instances: Vec::new(),
			table_order: Vec::new(),
			vertex_cursor: 0,
			index_cursor: 0,
			collecting: false,
		})
	}

	pub fn begin_collecting(&mut self) {
		for bucket in &mut self.buckets {
			bucket.pending.clear();
			bucket.geometries.clear();
			bucket.build_ranges.clear();
			bucket.primitive_counts.clear();
			bucket.geom_info_offset = 0;
		}
		self.geometry_instances.clear();
		self.table_order.clear();
		self.vertex_cursor = 0;
		self.index_cursor = 0;
		self.collecting = true;
	}

	/// Packs one geometry's vertices/indices into its filter's bucket and
	/// appends a placeholder geometry-instance record (base_vertex/
	/// base_index are filled in by `end_collecting`). Returns the local
	/// index used by `update_transform`/`update_tex_coords`.
	pub fn add_geometry(&mut self, info: &GeometryUploadInfo) -> usize {
		let vertex_count = info.vertex_count;
		let mut vertices = Vec::with_capacity(vertex_count);

		for i in 0..vertex_count {
			let (layers, flags) = layer_materials_for(info);
			vertices.push(Vertex {
				position: info.positions[i],
				normal_oct: encode_normal_oct(info.normals.get(i).copied().unwrap_or(Vec3::new(0.0, 1.0, 0.0))),
				tex_coords: std::array::from_fn(|l| info.tex_coord_layers[l].as_ref().and_then(|v| v.get(i)).copied().unwrap_or(Vec2::new(0.0, 0.0))),
				color: info.colors.as_ref().and_then(|c| c.get(i)).copied().unwrap_or(0xFFFF_FFFF),
				layer_materials: pack_layer_materials(layers, flags),
			});
		}

		let indices = info.indices.clone().unwrap_or_else(|| (0..vertex_count as u32).collect());

		let local_index = self.geometry_instances.len();

		let record = GeometryInstanceRecord {
			model: info.transform.into(),
			prev_model: info.transform.into(),
			flags: 0,
			base_vertex: 0,
			base_index: 0,
			vertex_count: vertex_count as u32,
			index_count: indices.len() as u32,
			material_ids: std::array::from_fn(|l| info.layers[l].material_id.unwrap_or(u64::MAX) as u32),
			layer_color_factors: std::array::from_fn(|l| info.layers[l].color_factor),
			roughness: info.default_roughness,
			metallic: info.default_metallic,
			emission_mult: info.default_emission,
		};

		self.geometry_instances.push(record);

		let bucket = &mut self.buckets[info.filter.index()];
		bucket.pending.push(PendingGeometry { local_index, vertices, indices });

		local_index
	}

	/// Finalizes offsets: lays out each filter's pending geometries
	/// contiguously into the shared buffer (in filter-enumeration order),
	/// fills in base_vertex/base_index on the instance records, and emits
	/// build ranges/AS geometry descriptors. Writes the packed vertex/index
	/// data into the given frame's staging.
	pub fn end_collecting(&mut self, frame: usize) {
		debug_assert!(self.collecting, "end_collecting called without begin_collecting");

		let vertex_staging = self.vertex_buffer.map(frame, self.vertex_buffer.capacity());
		let index_staging = self.index_buffer.map(frame, self.index_buffer.capacity());

		for &filter in Filter::all() {
			let bucket = &mut self.buckets[filter.index()];
			if bucket.pending.is_empty() {
				continue;
			}

			bucket.geom_info_offset = self.table_order.len() as u32;

			for pending in &bucket.pending {
				self.table_order.push(pending.local_index);
				let base_vertex = self.vertex_cursor;
				let base_index = self.index_cursor;

				vertex_staging[base_vertex as usize..base_vertex as usize + pending.vertices.len()]
					.copy_from_slice(&pending.vertices);
				index_staging[base_index as usize..base_index as usize + pending.indices.len()]
					.copy_from_slice(&pending.indices);

				let record = &mut self.geometry_instances[pending.local_index];
				record.base_vertex = base_vertex;
				record.base_index = base_index;

				bucket.build_ranges.push(BuildRange {
					first_index: base_index,
					primitive_count: (pending.indices.len() / 3) as u32,
					first_vertex: base_vertex,
				});
				bucket.primitive_counts.push((pending.indices.len() / 3) as u32);
				bucket.geometries.push(AsTriangleGeometry {
					vertex_buffer: self.vertex_buffer.device_local().device_address(),
					vertex_stride: std::mem::size_of::<Vertex>() as u64,
					max_vertex: base_vertex + pending.vertices.len() as u32,
					index_buffer: GpuPtr(
						self.index_buffer.device_local().device_address().0 + base_index as u64 * 4,
					),
					primitive_count: (pending.indices.len() / 3) as u32,
					primitive_offset: 0,
					first_vertex: base_vertex,
					flags: if bucket_is_alpha_tested(filter) {
						vk::GeometryFlagsKHR::empty()
					} else {
						vk::GeometryFlagsKHR::OPAQUE
					},
				});

				self.vertex_cursor += pending.vertices.len() as u32;
				self.index_cursor += pending.indices.len() as u32;
			}
		}

		self.collecting = false;
	}

	pub fn copy_to_device(&self, device: &Device, cmd: &crate::gpu::CmdList, frame: usize) {
		if self.vertex_cursor > 0 {
			self.vertex_buffer.copy_from_staging(device, cmd, frame, &[0..self.vertex_cursor as usize]);
			self.index_buffer.copy_from_staging(device, cmd, frame, &[0..self.index_cursor as usize]);
		}
	}

	/// Copies only the given vertex-element ranges, for patching in-place
	/// texture-coordinate updates without re-uploading the whole buffer
	/// (§4.2 #5, §4.5 step 4).
	pub fn copy_vertex_ranges(&self, device: &Device, cmd: &crate::gpu::CmdList, frame: usize, ranges: &[std::ops::Range<usize>]) {
		self.vertex_buffer.copy_from_staging(device, cmd, frame, ranges);
	}

	pub fn as_geometries(&self, filter: Filter) -> &[AsTriangleGeometry] {
		&self.buckets[filter.index()].geometries
	}

	pub fn as_build_ranges(&self, filter: Filter) -> &[BuildRange] {
		&self.buckets[filter.index()].build_ranges
	}

	pub fn primitive_counts(&self, filter: Filter) -> &[u32] {
		&self.buckets[filter.index()].primitive_counts
	}

	pub fn are_geometries_empty(&self, filters: &[Filter]) -> bool {
		filters.iter().all(|f| self.buckets[f.index()].geometries.is_empty())
	}

	pub fn geometry_instances(&self) -> &[GeometryInstanceRecord] {
		&self.geometry_instances
	}

	/// `local_index` values in table-write order (§4.5.1): writing
	/// `geometry_instances()[table_order()[k]]` to slot `k` of a combined
	/// geometry-instance table makes `geom_info_range(filter)` a contiguous
	/// range into that table.
	pub fn table_order(&self) -> &[usize] {
		&self.table_order
	}

	/// `(offset, count)` of `filter`'s geometries within [`Self::table_order`].
	pub fn geom_info_range(&self, filter: Filter) -> (u32, u32) {
		let bucket = &self.buckets[filter.index()];
		(bucket.geom_info_offset, bucket.pending.len() as u32)
	}

	/// Rewrites the transform of an already-submitted `STATIC_MOVABLE`
	/// geometry without touching its vertex data (§3.2, §4.2 #5).
	pub fn update_transform(&mut self, local_index: usize, new_transform: Mat3x4) -> RtResult<()> {
		let record = self.geometry_instances.get_mut(local_index).ok_or(RtError::WrongInstance)?;
		record.prev_model = record.model;
		record.model = new_transform;
		Ok(())
	}

	/// Patches texture coordinates of an already-submitted `STATIC*`
	/// geometry in place (§3.2, §4.2 #5).
	pub fn update_tex_coords(&mut self, frame: usize, local_index: usize, offset: usize, layers: &[Option<Vec<Vec2>>; 3]) -> RtResult<()> {
		let record = *self.geometry_instances.get(local_index).ok_or(RtError::WrongInstance)?;
		let staging = self.vertex_buffer.map(frame, self.vertex_buffer.capacity());

		for (layer_idx, layer) in layers.iter().enumerate() {
			let Some(values) = layer else { continue };
			for (i, &value) in values.iter().enumerate() {
				let vertex_idx = record.base_vertex as usize + offset + i;
				if vertex_idx < record.base_vertex as usize + record.vertex_count as usize {
					staging[vertex_idx].tex_coords[layer_idx] = value;
				}
			}
		}

		Ok(())
	}

	pub fn destroy(self, device: &mut Device) {
		self.vertex_buffer.destroy(device);
		self.index_buffer.destroy(device);
	}
}

fn bucket_is_alpha_tested(filter: Filter) -> bool {
	filter.pass_through == crate::filter::PassThrough::AlphaTested
}

fn layer_materials_for(info: &GeometryUploadInfo) -> ([u16; 3], u8) {
	let layers = std::array::from_fn(|l| info.layers[l].material_id.map(|id| (id % (1 << 10)) as u16).unwrap_or(0));
	(layers, 0)
}
