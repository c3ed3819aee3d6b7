//! BLAS / TLAS components (§2.5, §4.4). Grounded directly on
//! `src/graphics/acceleration_structure.rs` of the teacher, restated
//! against the concrete Vulkan `gpu` layer instead of the teacher's
//! generic `DeviceImpl`/`AccelerationStructureImpl` traits.

use crate::error::RtResult;
use crate::filter::Filter;
use crate::gpu::{AccelerationStructure, AsBuildInputs, AsTriangleGeometry, Buffer, Device, GpuPtr};
use crate::util::align_pow2;

use ash::vk;

/// A bottom-level structure for one filter class. Handles stay stable while
/// the backing buffer fits; `recreate_if_not_valid` grows it on first use and
/// on size regressions (§4.4).
pub struct Blas {
	pub filter: Filter,
	pub accel: Option<AccelerationStructure>,
	pub geometry_count: usize,
	capacity: u64,
}

impl Blas {
	pub fn new(filter: Filter) -> Self {
		Self { filter, accel: None, geometry_count: 0, capacity: 0 }
	}

	pub fn is_empty(&self) -> bool {
		self.geometry_count == 0
	}

	pub fn device_address(&self) -> GpuPtr {
		self.accel.as_ref().map(|a| a.device_address()).unwrap_or(GpuPtr::NULL)
	}

	pub fn raw(&self) -> Option<vk::AccelerationStructureKHR> {
		self.accel.as_ref().map(|a| a.raw())
	}

	pub fn buffer(&self) -> Option<&Buffer> {
		self.accel.as_ref().map(|a| a.buffer())
	}

	/// Ensures the backing buffer is at least `size` bytes; (re)creates the
	/// acceleration structure object if it grew past its current capacity.
	/// A build immediately after this call is always a full rebuild, never
	/// an update, when this returns `true`.
	pub fn recreate_if_not_valid(&mut self, device: &mut Device, size: u64) -> RtResult<bool> {
		if self.accel.is_some() && align_pow2(size, 256) <= self.capacity {
			return Ok(false);
		}

		if let Some(old) = self.accel.take() {
			device.destroy_acceleration_structure(old);
		}

		self.accel = Some(device.create_acceleration_structure(vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL, size)?);
		self.capacity = align_pow2(size, 256);
		Ok(true)
	}
}

/// The single per-frame top-level structure (§4.4). The descriptor set that
/// references it is `None` whenever `try_build_tlas` built zero instances;
/// consumers must treat that as "skip ray tracing this frame".
pub struct Tlas {
	pub accel: Option<AccelerationStructure>,
	capacity: u64,
}

impl Default for Tlas {
	fn default() -> Self {
		Self { accel: None, capacity: 0 }
	}
}

impl Tlas {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn device_address(&self) -> GpuPtr {
		self.accel.as_ref().map(|a| a.device_address()).unwrap_or(GpuPtr::NULL)
	}

	pub fn raw(&self) -> Option<vk::AccelerationStructureKHR> {
		self.accel.as_ref().map(|a| a.raw())
	}

	pub fn recreate_if_not_valid(&mut self, device: &mut Device, size: u64) -> RtResult<bool> {
		if self.accel.is_some() && align_pow2(size, 256) <= self.capacity {
			return Ok(false);
		}

		if let Some(old) = self.accel.take() {
			device.destroy_acceleration_structure(old);
		}

		self.accel = Some(device.create_acceleration_structure(vk::AccelerationStructureTypeKHR::TOP_LEVEL, size)?);
		self.capacity = align_pow2(size, 256);
		Ok(true)
	}
}

/// Build-size query for a BLAS holding `geoms` triangle sets (§4.3
/// `bottom_build_sizes`).
pub fn bottom_build_sizes(device: &Device, geoms: &[AsTriangleGeometry], fast_trace: bool) -> crate::gpu::AsBuildSizes {
	let primitive_counts: Vec<u32> = geoms.iter().map(|g| g.primitive_count).collect();
	let flags = build_flags(fast_trace);
	device.acceleration_structure_sizes(
		vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL,
		flags,
		&AsBuildInputs::Triangles(geoms.to_vec()),
		&primitive_counts,
	)
}

/// Build-size query for the TLAS holding `instance_count` instances (§4.3
/// `top_build_sizes`).
pub fn top_build_sizes(device: &Device, instance_count: u32, fast_trace: bool) -> crate::gpu::AsBuildSizes {
	let flags = build_flags(fast_trace);
	device.acceleration_structure_sizes(
		vk::AccelerationStructureTypeKHR::TOP_LEVEL,
		flags,
		&AsBuildInputs::Instances { data: GpuPtr::NULL, count: instance_count },
		&[instance_count],
	)
}

fn build_flags(fast_trace: bool) -> vk::BuildAccelerationStructureFlagsKHR {
	if fast_trace {
		vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE
	} else {
		vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_BUILD
	}
}
