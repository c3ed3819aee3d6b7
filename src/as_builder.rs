//! AS builder (§2.4, §4.3): queues pending bottom/top-level builds against
//! one scratch buffer shared by all builds in a frame, and flushes them with
//! greedily packed scratch offsets.

use crate::error::RtResult;
use crate::gpu::{
	AsBuild, AsBuildInputs, AsBuildSizes, AsTriangleGeometry, Buffer, BufferDesc, BufferUsage, CmdList, Device, GpuPtr,
	Memory,
};

use ash::vk;

struct BottomEntry {
	dst: vk::AccelerationStructureKHR,
	geoms: Vec<AsTriangleGeometry>,
	fast_trace: bool,
	update: bool,
	scratch_offset: u64,
}

struct TopEntry {
	dst: vk::AccelerationStructureKHR,
	instance_data: GpuPtr,
	instance_count: u32,
	fast_trace: bool,
	update: bool,
	scratch_offset: u64,
}

/// One scratch buffer shared by every build queued in a frame; grows lazily
/// and its greedy offset cursor resets at the top of each frame.
pub struct AsBuilder {
	scratch: Option<Buffer>,
	scratch_capacity: u64,
	scratch_cursor: u64,
	bottom_queue: Vec<BottomEntry>,
	top_queue: Vec<TopEntry>,
}

impl Default for AsBuilder {
	fn default() -> Self {
		Self { scratch: None, scratch_capacity: 0, scratch_cursor: 0, bottom_queue: Vec::new(), top_queue: Vec::new() }
	}
}

impl AsBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Resets the greedy scratch-offset cursor for a new frame.
	pub fn begin_frame(&mut self) {
		self.scratch_cursor = 0;
		debug_assert!(self.bottom_queue.is_empty() && self.top_queue.is_empty(), "previous frame's queues were not flushed");
	}

	pub fn bottom_build_sizes(&self, device: &Device, geoms: &[AsTriangleGeometry], fast_trace: bool) -> AsBuildSizes {
		crate::accel::bottom_build_sizes(device, geoms, fast_trace)
	}

	pub fn top_build_sizes(&self, device: &Device, instance_count: u32, fast_trace: bool) -> AsBuildSizes {
		crate::accel::top_build_sizes(device, instance_count, fast_trace)
	}

	/// Queues a bottom-level build. `sizes.build_scratch_size`
	/// (`update_scratch_size` if `update`) is reserved at the current
	/// greedy scratch cursor.
	pub fn add_blas(
		&mut self,
		dst: vk::AccelerationStructureKHR,
		geoms: Vec<AsTriangleGeometry>,
		sizes: &AsBuildSizes,
		fast_trace: bool,
		update: bool,
	) {
		let needed = if update { sizes.update_scratch_size } else { sizes.build_scratch_size };
		let offset = self.reserve_scratch(needed);
		self.bottom_queue.push(BottomEntry { dst, geoms, fast_trace, update, scratch_offset: offset });
	}

	pub fn add_tlas(
		&mut self,
		dst: vk::AccelerationStructureKHR,
		instance_data: GpuPtr,
		instance_count: u32,
		sizes: &AsBuildSizes,
		fast_trace: bool,
		update: bool,
	) {
		let needed = if update { sizes.update_scratch_size } else { sizes.build_scratch_size };
		let offset = self.reserve_scratch(needed);
		self.top_queue.push(TopEntry { dst, instance_data, instance_count, fast_trace, update, scratch_offset: offset });
	}

	fn reserve_scratch(&mut self, size: u64) -> u64 {
		let aligned = crate::util::align_pow2(size, 256);
		let offset = self.scratch_cursor;
		self.scratch_cursor += aligned;
		offset
	}

	/// Ensures the scratch buffer can hold everything reserved so far.
	/// Called once per frame before the first flush.
	pub fn ensure_scratch_capacity(&mut self, device: &mut Device) -> RtResult<()> {
		if self.scratch_cursor == 0 || self.scratch_cursor <= self.scratch_capacity {
			return Ok(());
		}

		if let Some(old) = self.scratch.take() {
			device.destroy_buffer(old);
		}

		let buffer = device.create_buffer(&BufferDesc {
			size: self.scratch_cursor,
			usage: BufferUsage::UNORDERED_ACCESS,
			memory: Memory::GpuOnly,
		})?;

		self.scratch_capacity = self.scratch_cursor;
		self.scratch = Some(buffer);
		Ok(())
	}

	fn scratch_address(&self, offset: u64) -> GpuPtr {
		self.scratch.as_ref().expect("scratch buffer not allocated").device_address().offset(offset)
	}

	/// Flushes every queued bottom-level build; the queue is empty
	/// afterward.
	pub fn build_bottom_level(&mut self, device: &Device, cmd: &CmdList) {
		for entry in self.bottom_queue.drain(..) {
			let build = AsBuild {
				kind: vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL,
				flags: build_flags(entry.fast_trace),
				update: entry.update,
				dst: entry.dst,
				scratch: self.scratch_address(entry.scratch_offset),
				inputs: AsBuildInputs::Triangles(entry.geoms),
			};
			cmd.build_acceleration_structure(device, &build);
		}
	}

	/// Flushes every queued top-level build; the queue is empty afterward.
	pub fn build_top_level(&mut self, device: &Device, cmd: &CmdList) {
		for entry in self.top_queue.drain(..) {
			let build = AsBuild {
				kind: vk::AccelerationStructureTypeKHR::TOP_LEVEL,
				flags: build_flags(entry.fast_trace),
				update: entry.update,
				dst: entry.dst,
				scratch: self.scratch_address(entry.scratch_offset),
				inputs: AsBuildInputs::Instances { data: entry.instance_data, count: entry.instance_count },
			};
			cmd.build_acceleration_structure(device, &build);
		}
	}

	pub fn destroy(self, device: &mut Device) {
		if let Some(scratch) = self.scratch {
			device.destroy_buffer(scratch);
		}
	}
}

fn build_flags(fast_trace: bool) -> vk::BuildAccelerationStructureFlagsKHR {
	if fast_trace {
		vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE
	} else {
		vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_BUILD
	}
}
