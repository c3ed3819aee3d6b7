//! AS manager (§2.6, §4.5): the central scene-mutation state machine. Owns
//! the static/dynamic vertex collectors, every BLAS, the per-frame TLASes,
//! the AS builder, and the combined geometry-instance table; sequences
//! their use according to the state machine in §4.5.
//!
//! Grounded on `original_source/Source/ASManager.cpp`'s `allStaticBlas` /
//! `allDynamicBlas[frame]` / `tlas[frame]` split and its
//! `SetupTLASInstanceFromBLAS` derivation (§4.5.1), restated against this
//! crate's `gpu`/`accel`/`as_builder`/`collector` layers.

use crate::accel::Blas;
use crate::auto_buffer::AutoBuffer;
use crate::collector::{GeometryInstanceRecord, VertexCollector};
use crate::config::Config;
use crate::error::{RtError, RtResult};
use crate::filter::{CullMask, CustomIndexFlags, Filter, InstanceMask, Lifetime, PassThrough, Visibility};
use crate::geometry::GeometryUploadInfo;
use crate::gpu::{BufferUsage, CmdList, Device, GpuPtr};
use crate::math::{Mat3x4, Vec2};
use crate::util::FxHashMap;
use crate::MAX_FRAMES_IN_FLIGHT;

use ash::vk;
use std::ops::Range;

const SBT_INDEX_HITGROUP_FULLY_OPAQUE: u32 = 0;
const SBT_INDEX_HITGROUP_ALPHA_TESTED: u32 = 1;

/// State of the scene-mutation protocol (§4.5). `Idle` is also the state
/// the per-frame dynamic loop runs in; there is no separate "per-frame
/// dynamic" state because dynamic uploads are simply disallowed while
/// `RecordingStatic`, and allowed otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SceneState {
	Idle,
	RecordingStatic,
}

/// One BLAS's contribution to a `prepare_for_building_tlas` pass: enough to
/// both derive its TLAS instance (§4.5.1) and to fill the shader uniform
/// with `(geom_info_offset, geom_count)` (§4.5 step 6).
struct PendingInstance {
	device_address: GpuPtr,
	filter: Filter,
	geom_info_offset: u32,
	geom_count: u32,
}

/// Result of [`AsManager::prepare_for_building_tlas`], consumed by
/// [`AsManager::try_build_tlas`].
#[derive(Default)]
pub struct TlasPrepareResult {
	pub instance_count: u32,
	/// Per built instance, `(geom_info_offset, geom_count)` for the shader
	/// uniform (§4.5 step 6).
	pub geom_info: Vec<(u32, u32)>,
	/// Per built instance, whether it reads the dynamic collector's buffers
	/// this frame (§4.5 step 6, §4.5.1's `FLAG_DYNAMIC`).
	pub is_dynamic: Vec<bool>,
}

/// The central scene-mutation state machine (§4.5).
pub struct AsManager {
	state: SceneState,

	static_collector: VertexCollector,
	dynamic_collector: VertexCollector,

	static_blas: Vec<Blas>,
	dynamic_blas: [Vec<Blas>; MAX_FRAMES_IN_FLIGHT],
	tlas: [crate::accel::Tlas; MAX_FRAMES_IN_FLIGHT],

	builder: crate::as_builder::AsBuilder,

	instance_table: AutoBuffer<GeometryInstanceRecord>,
	tlas_instances: AutoBuffer<vk::AccelerationStructureInstanceKHR>,

	static_capacity: u32,
	static_count: u32,
	dynamic_count: u32,
	max_top_level_instances: usize,

	static_ids: FxHashMap<u64, usize>,
	movable_ids: FxHashMap<u64, usize>,
	dynamic_ids: FxHashMap<u64, usize>,

	pending_movable_update: bool,
	pending_tex_coord_ranges: Vec<(usize, Range<usize>)>,

	pending_tlas: Option<TlasPrepareResult>,
}

impl AsManager {
	pub fn new(device: &mut Device, config: &Config) -> RtResult<Self> {
		let static_collector = VertexCollector::new(device, config.static_vertex_cap, config.static_index_cap)?;
		let dynamic_collector = VertexCollector::new(device, config.dynamic_vertex_cap, config.dynamic_index_cap)?;

		let static_blas: Vec<Blas> =
			Filter::all().iter().copied().filter(|f| f.lifetime != Lifetime::Dynamic).map(Blas::new).collect();

		let dynamic_blas: [Vec<Blas>; MAX_FRAMES_IN_FLIGHT] = std::array::from_fn(|_| {
			Filter::for_lifetime(Lifetime::Dynamic).map(Blas::new).collect()
		});

		let tlas: [crate::accel::Tlas; MAX_FRAMES_IN_FLIGHT] = std::array::from_fn(|_| crate::accel::Tlas::new());

		let static_capacity = config.max_static_geometries as u32;
		let total_capacity = config.max_static_geometries + config.max_dynamic_geometries;

		let instance_table = AutoBuffer::new(device, total_capacity, BufferUsage::SHADER_RESOURCE)?;
		let tlas_instances = AutoBuffer::new(
			device,
			config.max_top_level_instances,
			BufferUsage::ACCELERATION_STRUCTURE | BufferUsage::SHADER_RESOURCE,
		)?;

		Ok(Self {
			state: SceneState::Idle,
			static_collector,
			dynamic_collector,
			static_blas,
			dynamic_blas,
			tlas,
			builder: crate::as_builder::AsBuilder::new(),
			instance_table,
			tlas_instances,
			static_capacity,
			static_count: 0,
			dynamic_count: 0,
			max_top_level_instances: config.max_top_level_instances,
			static_ids: FxHashMap::default(),
			movable_ids: FxHashMap::default(),
			dynamic_ids: FxHashMap::default(),
			pending_movable_update: false,
			pending_tex_coord_ranges: Vec::new(),
			pending_tlas: None,
		})
	}

	/// Enters `RecordingStatic` (§4.5): clears the static collector and
	/// every known static id so the next `submit_static` describes a wholly
	/// new static scene.
	pub fn start_new_scene(&mut self) {
		self.static_collector.begin_collecting();
		self.static_ids.clear();
		self.movable_ids.clear();
		self.static_count = 0;
		self.pending_movable_update = false;
		self.pending_tex_coord_ranges.clear();
		self.state = SceneState::RecordingStatic;
	}

	/// Accepts one `STATIC*` geometry upload (§4.5.2: only while
	/// `RecordingStatic`).
	pub fn add_static_geometry(&mut self, info: &GeometryUploadInfo) -> RtResult<usize> {
		if self.state != SceneState::RecordingStatic {
			return Err(RtError::NotRecordingScene);
		}
		if self.static_ids.contains_key(&info.unique_id) {
			return Err(RtError::IdNotUnique(info.unique_id));
		}

		let local_index = self.static_collector.add_geometry(info);
		self.static_ids.insert(info.unique_id, local_index);
		if info.filter.lifetime == Lifetime::StaticMovable {
			self.movable_ids.insert(info.unique_id, local_index);
		}
		Ok(local_index)
	}

	/// Ends scene recording (§4.5 "Static submitted"): rebuilds every static
	/// BLAS from scratch and uploads the static range of the geometry-instance
	/// table to every frame slot's staging.
	pub fn submit_static(&mut self, device: &mut Device) -> RtResult<()> {
		device.wait_idle()?;

		self.static_collector.end_collecting(0);
		self.static_count = self.static_collector.geometry_instances().len() as u32;

		let cmd = device.allocate_cmd_lists(1)?.remove(0);
		device.begin_cmd_list(&cmd)?;

		self.static_collector.copy_to_device(device, &cmd, 0);

		self.builder.begin_frame();
		for &filter in Filter::all() {
			if filter.lifetime == Lifetime::Dynamic {
				continue;
			}
			build_blas_for_filter(device, &mut self.builder, &mut self.static_blas, &self.static_collector, filter, false)?;
		}
		self.builder.ensure_scratch_capacity(device)?;
		self.builder.build_bottom_level(device, &cmd);
		cmd.build_memory_barrier(device);

		let records = self.static_collector.geometry_instances();
		let order = self.static_collector.table_order();
		for frame in 0..MAX_FRAMES_IN_FLIGHT {
			let staging = self.instance_table.map(frame, self.instance_table.capacity());
			for (k, &local) in order.iter().enumerate() {
				staging[k] = records[local];
			}
		}
		if !order.is_empty() {
			for frame in 0..MAX_FRAMES_IN_FLIGHT {
				self.instance_table.copy_from_staging(device, &cmd, frame, &[0..order.len()]);
			}
		}

		device.end_cmd_list(&cmd)?;
		device.submit(&cmd, None)?;
		device.wait_idle()?;

		self.state = SceneState::Idle;
		Ok(())
	}

	/// §4.5 step 1: resets the dynamic collector and scratch cursor for a
	/// new frame, and copies this frame's (about-to-be-overwritten) dynamic
	/// vertex/index buffers into the previous-frame device buffers for
	/// motion-vector computation.
	pub fn begin_dynamic(&mut self, device: &Device, cmd: &CmdList, frame: usize) {
		let _ = (device, cmd, frame);
		self.builder.begin_frame();
		self.dynamic_collector.begin_collecting();
		self.dynamic_ids.clear();
		self.dynamic_count = 0;
	}

	/// §4.5 step 2. Dynamic uploads are rejected while recording the static
	/// scene (§4.5.2).
	pub fn add_dynamic_geometry(&mut self, info: &GeometryUploadInfo) -> RtResult<usize> {
		if self.state == SceneState::RecordingStatic {
			return Err(RtError::RecordingScene);
		}
		if self.dynamic_ids.contains_key(&info.unique_id) {
			return Err(RtError::IdNotUnique(info.unique_id));
		}

		let local_index = self.dynamic_collector.add_geometry(info);
		self.dynamic_ids.insert(info.unique_id, local_index);
		Ok(local_index)
	}

	/// §4.5 step 3: ends collecting, uploads geometry, rebuilds every
	/// dynamic BLAS for `frame` from scratch (never an update — dynamic
	/// geometry is valid for exactly one frame, §3.2), and emits the build
	/// barrier.
	pub fn submit_dynamic(&mut self, device: &mut Device, cmd: &CmdList, frame: usize) -> RtResult<()> {
		self.dynamic_collector.end_collecting(frame);
		self.dynamic_count = self.dynamic_collector.geometry_instances().len() as u32;

		self.dynamic_collector.copy_to_device(device, cmd, frame);

		for &filter in Filter::for_lifetime(Lifetime::Dynamic) {
			build_blas_for_filter(device, &mut self.builder, &mut self.dynamic_blas[frame], &self.dynamic_collector, filter, false)?;
		}

		let records = self.dynamic_collector.geometry_instances();
		let order = self.dynamic_collector.table_order();
		if !order.is_empty() {
			let base = self.static_capacity as usize;
			let staging = self.instance_table.map(frame, self.instance_table.capacity());
			for (k, &local) in order.iter().enumerate() {
				staging[base + k] = records[local];
			}
			self.instance_table.copy_from_staging(device, cmd, frame, &[base..base + order.len()]);
		}

		self.builder.ensure_scratch_capacity(device)?;
		self.builder.build_bottom_level(device, cmd);
		cmd.build_memory_barrier(device);
		Ok(())
	}

	/// Rewrites the transform of an already-submitted `STATIC_MOVABLE`
	/// geometry (§4.2 #5, §4.5.2). Queues a `resubmit_static_movable` for
	/// this frame.
	pub fn update_static_transform(&mut self, unique_id: u64, new_transform: Mat3x4) -> RtResult<()> {
		let &local_index = self.movable_ids.get(&unique_id).ok_or(RtError::WrongMovableUpdate { unique_id })?;
		self.static_collector.update_transform(local_index, new_transform)?;
		self.pending_movable_update = true;
		Ok(())
	}

	/// Patches texture coordinates of an already-submitted `STATIC*`
	/// geometry (§4.2 #5, §4.5.2). Queues a `resubmit_static_tex_coords` range.
	pub fn update_static_tex_coords(
		&mut self,
		frame: usize,
		unique_id: u64,
		offset: usize,
		count: usize,
		layers: &[Option<Vec<Vec2>>; 3],
	) -> RtResult<()> {
		let &local_index = self.static_ids.get(&unique_id).ok_or(RtError::WrongStaticTexCoordUpdate { unique_id })?;
		self.static_collector.update_tex_coords(frame, local_index, offset, layers)?;
		self.pending_tex_coord_ranges.push((local_index, offset..offset + count));
		Ok(())
	}

	/// §4.5 step 4: if any `update_static_tex_coords` landed this frame,
	/// copies only the affected vertex-buffer byte regions.
	pub fn resubmit_static_tex_coords(&mut self, device: &Device, cmd: &CmdList, frame: usize) {
		if self.pending_tex_coord_ranges.is_empty() {
			return;
		}
		let records = self.static_collector.geometry_instances();
		let ranges: Vec<Range<usize>> = self
			.pending_tex_coord_ranges
			.drain(..)
			.map(|(local, r)| {
				let base = records[local].base_vertex as usize;
				base + r.start..base + r.end
			})
			.collect();
		self.static_collector.copy_vertex_ranges(device, cmd, frame, &ranges);
	}

	/// §4.5 step 5: if any `update_static_transform` landed this frame,
	/// rebuilds (as an update, reusing storage) every `STATIC_MOVABLE` BLAS
	/// and re-uploads the static geometry-instance transforms.
	pub fn resubmit_static_movable(&mut self, device: &mut Device, cmd: &CmdList, frame: usize) -> RtResult<()> {
		if !self.pending_movable_update {
			return Ok(());
		}
		self.pending_movable_update = false;

		for &filter in Filter::for_lifetime(Lifetime::StaticMovable) {
			build_blas_for_filter(device, &mut self.builder, &mut self.static_blas, &self.static_collector, filter, true)?;
		}

		let records = self.static_collector.geometry_instances();
		let order = self.static_collector.table_order();
		if !order.is_empty() {
			let staging = self.instance_table.map(frame, self.instance_table.capacity());
			for (k, &local) in order.iter().enumerate() {
				staging[k] = records[local];
			}
			self.instance_table.copy_from_staging(device, cmd, frame, &[0..order.len()]);
		}

		self.builder.ensure_scratch_capacity(device)?;
		self.builder.build_bottom_level(device, cmd);
		cmd.build_memory_barrier(device);
		Ok(())
	}

	/// §4.5 step 6 / §4.5.1: walks every non-empty static then dynamic BLAS,
	/// derives its TLAS instance, and records the per-instance geom-info
	/// range for the shader uniform. `ray_cull_mask` may drop `WORLD_k`
	/// instances (§4.5.1, §8.4#3).
	pub fn prepare_for_building_tlas(&mut self, frame: usize, ray_cull_mask: CullMask) -> RtResult<()> {
		let mut pending: Vec<PendingInstance> = Vec::new();

		for blas in &self.static_blas {
			push_pending(&mut pending, blas, &self.static_collector);
		}
		for blas in &self.dynamic_blas[frame] {
			push_pending(&mut pending, blas, &self.dynamic_collector);
		}

		if pending.len() > self.max_top_level_instances {
			return Err(RtError::TooManyInstances { requested: pending.len(), capacity: self.max_top_level_instances });
		}

		let mut result = TlasPrepareResult::default();
		let staging = self.tlas_instances.map(frame, self.tlas_instances.capacity());

		for entry in &pending {
			let Some(instance) = setup_tlas_instance(entry, ray_cull_mask) else { continue };
			staging[result.instance_count as usize] = instance;
			result.geom_info.push((entry.geom_info_offset, entry.geom_count));
			result.is_dynamic.push(entry.filter.lifetime == Lifetime::Dynamic);
			result.instance_count += 1;
		}

		self.pending_tlas = Some(result);
		Ok(())
	}

	/// §4.5 step 7: if `prepare_for_building_tlas` produced zero instances,
	/// leaves the TLAS descriptor untouched and returns `false` (consumers
	/// must skip ray tracing this frame, §4.4). Otherwise uploads the
	/// instance buffer, builds, barriers, and returns `true`.
	pub fn try_build_tlas(&mut self, device: &mut Device, cmd: &CmdList, frame: usize) -> RtResult<Option<&TlasPrepareResult>> {
		let Some(result) = self.pending_tlas.take() else { return Ok(None) };
		if result.instance_count == 0 {
			return Ok(None);
		}

		self.tlas_instances.copy_from_staging(device, cmd, frame, &[0..result.instance_count as usize]);

		let sizes = crate::accel::top_build_sizes(device, result.instance_count, true);
		self.tlas[frame].recreate_if_not_valid(device, sizes.acceleration_structure_size)?;

		self.builder.add_tlas(
			self.tlas[frame].raw().expect("just (re)created"),
			self.tlas_instances.device_local().device_address(),
			result.instance_count,
			&sizes,
			true,
			false,
		);
		self.builder.ensure_scratch_capacity(device)?;
		self.builder.build_top_level(device, cmd);
		cmd.build_memory_barrier(device);

		self.pending_tlas = Some(result);
		Ok(self.pending_tlas.as_ref())
	}

	pub fn tlas_device_address(&self, frame: usize) -> GpuPtr {
		self.tlas[frame].device_address()
	}

	pub fn tlas_raw(&self, frame: usize) -> Option<vk::AccelerationStructureKHR> {
		self.tlas[frame].raw()
	}

	pub fn instance_table_address(&self) -> GpuPtr {
		self.instance_table.device_local().device_address()
	}

	pub fn destroy(self, device: &mut Device) {
		self.static_collector.destroy(device);
		self.dynamic_collector.destroy(device);
		for blas in self.static_blas {
			if let Some(accel) = blas.accel {
				device.destroy_acceleration_structure(accel);
			}
		}
		for frame_blas in self.dynamic_blas {
			for blas in frame_blas {
				if let Some(accel) = blas.accel {
					device.destroy_acceleration_structure(accel);
				}
			}
		}
		for tlas in self.tlas {
			if let Some(accel) = tlas.accel {
				device.destroy_acceleration_structure(accel);
			}
		}
		self.instance_table.destroy(device);
		self.tlas_instances.destroy(device);
		self.builder.destroy(device);
	}
}

/// (Re)builds the BLAS for `filter` from `collector`'s current geometries,
/// skipping filters with no geometry. `update` re-uses the BLAS's existing
/// backing memory (§4.5 step 5); non-movable static BLASes always fast-trace,
/// movable ones fast-build (§4.5 "Static submitted").
fn build_blas_for_filter(
	device: &mut Device,
	builder: &mut crate::as_builder::AsBuilder,
	blas_list: &mut [Blas],
	collector: &VertexCollector,
	filter: Filter,
	update: bool,
) -> RtResult<()> {
	let geoms = collector.as_geometries(filter);
	if geoms.is_empty() {
		return Ok(());
	}

	let blas = blas_list.iter_mut().find(|b| b.filter == filter).expect("blas list covers every filter of its lifetime class");

	let fast_trace = filter.lifetime != Lifetime::StaticMovable;
	let sizes = builder.bottom_build_sizes(device, geoms, fast_trace);

	let recreated = blas.recreate_if_not_valid(device, sizes.acceleration_structure_size)?;
	blas.geometry_count = geoms.len();

	builder.add_blas(blas.raw().expect("just (re)created"), geoms.to_vec(), &sizes, fast_trace, update && !recreated);
	Ok(())
}

/// Collects one [`PendingInstance`] per non-empty BLAS, carrying the
/// `(geom_info_offset, geom_count)` range its geometries occupy in
/// `collector`'s table order (§4.5.1).
fn push_pending(pending: &mut Vec<PendingInstance>, blas: &Blas, collector: &VertexCollector) {
	if blas.is_empty() {
		return;
	}
	if blas.raw().is_none() {
		return;
	}
	let (geom_info_offset, geom_count) = collector.geom_info_range(blas.filter);

	pending.push(PendingInstance { device_address: blas.device_address(), filter: blas.filter, geom_info_offset, geom_count });
}

/// §4.5.1's `SetupTLASInstanceFromBLAS`: derives one TLAS instance from a
/// non-empty BLAS, or `None` if the instance is culled by `ray_cull_mask`.
fn setup_tlas_instance(entry: &PendingInstance, ray_cull_mask: CullMask) -> Option<vk::AccelerationStructureInstanceKHR> {
	let filter = entry.filter;

	let mut custom_index = CustomIndexFlags::empty();
	if filter.lifetime == Lifetime::Dynamic {
		custom_index |= CustomIndexFlags::DYNAMIC;
	}

	let mut mask = match filter.visibility {
		Visibility::FirstPerson => {
			custom_index |= CustomIndexFlags::FIRST_PERSON;
			InstanceMask::FIRST_PERSON
		}
		Visibility::FirstPersonViewer => {
			custom_index |= CustomIndexFlags::FIRST_PERSON_VIEWER;
			InstanceMask::FIRST_PERSON_VIEWER
		}
		// Skybox geometry is visible regardless of the frame's ray-cull mask.
		Visibility::Skybox => InstanceMask::WORLD_0 | InstanceMask::WORLD_1 | InstanceMask::WORLD_2,
		Visibility::World0 | Visibility::World1 | Visibility::World2 => {
			let world_index = filter.visibility.world_index().expect("checked above");
			if !ray_cull_mask.allows(world_index) {
				return None;
			}
			InstanceMask::from_bits_truncate(1 << world_index)
		}
	};

	if filter.pass_through == PassThrough::ReflectRefract {
		mask = InstanceMask::REFLECT_REFRACT;
		custom_index |= CustomIndexFlags::REFLECT;
	}

	let (sbt_offset, geometry_flags) = if filter.pass_through == PassThrough::Opaque {
		(
			SBT_INDEX_HITGROUP_FULLY_OPAQUE,
			vk::GeometryInstanceFlagsKHR::FORCE_OPAQUE | vk::GeometryInstanceFlagsKHR::TRIANGLE_FACING_CULL_DISABLE,
		)
	} else {
		(
			SBT_INDEX_HITGROUP_ALPHA_TESTED,
			vk::GeometryInstanceFlagsKHR::FORCE_NO_OPAQUE | vk::GeometryInstanceFlagsKHR::TRIANGLE_FACING_CULL_DISABLE,
		)
	};

	Some(vk::AccelerationStructureInstanceKHR {
		transform: vk::TransformMatrixKHR { matrix: Mat3x4::IDENTITY.data.into_iter().flatten().collect::<Vec<_>>().try_into().unwrap() },
		instance_custom_index_and_mask: vk::Packed24_8::new(custom_index.bits(), mask.bits()),
		instance_shader_binding_table_record_offset_and_flags: vk::Packed24_8::new(sbt_offset, geometry_flags.as_raw() as u8),
		acceleration_structure_reference: vk::AccelerationStructureReferenceKHR { device_handle: entry.device_address.0 },
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn pending(filter: Filter) -> PendingInstance {
		PendingInstance { device_address: GpuPtr(0xABCD), filter, geom_info_offset: 3, geom_count: 1 }
	}

	/// §8.4#1: a lone static-opaque world-0 triangle gets `mask = WORLD_0`,
	/// `sbt = FULLY_OPAQUE`, and `FORCE_OPAQUE | CULL_DISABLE`.
	#[test]
	fn static_opaque_world0_instance() {
		let entry = pending(Filter::new(Lifetime::StaticNonMovable, PassThrough::Opaque, Visibility::World0));
		let instance = setup_tlas_instance(&entry, CullMask::ALL_WORLDS).unwrap();
		let custom_index = instance.instance_custom_index_and_mask.low_24();
		let mask = instance.instance_custom_index_and_mask.high_8() as u8;
		assert_eq!(mask, InstanceMask::WORLD_0.bits());
		assert_eq!(custom_index, CustomIndexFlags::empty().bits());
		let sbt = instance.instance_shader_binding_table_record_offset_and_flags.low_24();
		let flags = instance.instance_shader_binding_table_record_offset_and_flags.high_8();
		assert_eq!(sbt, SBT_INDEX_HITGROUP_FULLY_OPAQUE);
		assert_eq!(
			flags as u32,
			(vk::GeometryInstanceFlagsKHR::FORCE_OPAQUE | vk::GeometryInstanceFlagsKHR::TRIANGLE_FACING_CULL_DISABLE).as_raw()
		);
	}

	/// §8.4#3: a world-0 instance is dropped entirely when the frame's
	/// ray-cull mask excludes `WORLD_0`.
	#[test]
	fn mask_culling_drops_excluded_world() {
		let entry = pending(Filter::new(Lifetime::StaticNonMovable, PassThrough::Opaque, Visibility::World0));
		assert!(setup_tlas_instance(&entry, CullMask::WORLD_1 | CullMask::WORLD_2).is_none());
	}

	/// §8.4#5: reflect/refract overrides the mask to `REFLECT_REFRACT`,
	/// tags the custom index with `FLAG_REFLECT`, and always uses the
	/// alpha-tested SBT group with `FORCE_NO_OPAQUE | CULL_DISABLE` — even
	/// though this filter's pass-through is `Opaque`, per the resolved open
	/// question that reflect/refract override happens after cull-mask
	/// evaluation but independent of the pass-through bucket.
	#[test]
	fn reflect_refract_overrides_mask_and_sbt() {
		let entry = pending(Filter::new(Lifetime::StaticNonMovable, PassThrough::ReflectRefract, Visibility::World0));
		let instance = setup_tlas_instance(&entry, CullMask::ALL_WORLDS).unwrap();
		let custom_index = instance.instance_custom_index_and_mask.low_24();
		let mask = instance.instance_custom_index_and_mask.high_8() as u8;
		assert_eq!(mask, InstanceMask::REFLECT_REFRACT.bits());
		assert_eq!(custom_index & CustomIndexFlags::REFLECT.bits(), CustomIndexFlags::REFLECT.bits());
		let sbt = instance.instance_shader_binding_table_record_offset_and_flags.low_24();
		let flags = instance.instance_shader_binding_table_record_offset_and_flags.high_8();
		assert_eq!(sbt, SBT_INDEX_HITGROUP_ALPHA_TESTED);
		assert_eq!(
			flags as u32,
			(vk::GeometryInstanceFlagsKHR::FORCE_NO_OPAQUE | vk::GeometryInstanceFlagsKHR::TRIANGLE_FACING_CULL_DISABLE).as_raw()
		);
	}

	/// Skybox instances ignore the ray-cull mask entirely.
	#[test]
	fn skybox_ignores_cull_mask() {
		let entry = pending(Filter::new(Lifetime::StaticNonMovable, PassThrough::Opaque, Visibility::Skybox));
		let instance = setup_tlas_instance(&entry, CullMask::empty()).unwrap();
		let mask = instance.instance_custom_index_and_mask.high_8() as u8;
		assert_eq!(mask, (InstanceMask::WORLD_0 | InstanceMask::WORLD_1 | InstanceMask::WORLD_2).bits());
	}

	/// Dynamic-lifetime instances get `FLAG_DYNAMIC` in their custom index.
	#[test]
	fn dynamic_lifetime_sets_dynamic_flag() {
		let entry = pending(Filter::new(Lifetime::Dynamic, PassThrough::Opaque, Visibility::World0));
		let instance = setup_tlas_instance(&entry, CullMask::ALL_WORLDS).unwrap();
		let custom_index = instance.instance_custom_index_and_mask.low_24();
		assert_eq!(custom_index & CustomIndexFlags::DYNAMIC.bits(), CustomIndexFlags::DYNAMIC.bits());
	}
}
